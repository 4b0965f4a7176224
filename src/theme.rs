use ratatui::style::Color;
use serde::Deserialize;

use crate::report::ScoreTier;

#[derive(Debug, Clone, PartialEq)]
pub struct Theme {
    pub pane_bg: Color,
    pub result_bg: Color,
    pub input_bg: Color,
    pub status_bg: Color,
    pub text_fg: Color,
    pub muted_fg: Color,
    pub active_fg: Color,
    pub gauge_fg: Color,
    pub success_fg: Color,
    pub warning_fg: Color,
    pub error_fg: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            pane_bg: Color::Rgb(44, 44, 44),
            result_bg: Color::Rgb(48, 48, 48),
            input_bg: Color::Rgb(62, 62, 62),
            status_bg: Color::Rgb(36, 36, 36),
            text_fg: Color::Rgb(225, 225, 225),
            muted_fg: Color::Rgb(150, 150, 150),
            active_fg: Color::Rgb(255, 255, 255),
            gauge_fg: Color::Rgb(74, 144, 217),
            success_fg: Color::Rgb(102, 187, 106),
            warning_fg: Color::Rgb(255, 202, 40),
            error_fg: Color::Rgb(239, 83, 80),
        }
    }
}

impl Theme {
    /// Defaults with every color present in `[colors]` swapped in.
    pub(crate) fn with_overrides(colors: Option<&ColorsToml>) -> Self {
        let mut theme = Self::default();
        let Some(colors) = colors else {
            return theme;
        };
        let slots = [
            (&mut theme.pane_bg, colors.pane_bg),
            (&mut theme.result_bg, colors.result_bg),
            (&mut theme.input_bg, colors.input_bg),
            (&mut theme.status_bg, colors.status_bg),
            (&mut theme.text_fg, colors.text_fg),
            (&mut theme.muted_fg, colors.muted_fg),
            (&mut theme.active_fg, colors.active_fg),
            (&mut theme.gauge_fg, colors.gauge_fg),
            (&mut theme.success_fg, colors.success_fg),
            (&mut theme.warning_fg, colors.warning_fg),
            (&mut theme.error_fg, colors.error_fg),
        ];
        for (slot, value) in slots {
            if let Some(rgb) = value {
                *slot = rgb.to_color();
            }
        }
        theme
    }

    pub fn tier_fg(&self, tier: ScoreTier) -> Color {
        match tier {
            ScoreTier::Excellent => self.success_fg,
            ScoreTier::Good => self.gauge_fg,
            ScoreTier::Fair => self.warning_fg,
            ScoreTier::Poor => self.error_fg,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct ColorsToml {
    pane_bg: Option<RgbToml>,
    result_bg: Option<RgbToml>,
    input_bg: Option<RgbToml>,
    status_bg: Option<RgbToml>,
    text_fg: Option<RgbToml>,
    muted_fg: Option<RgbToml>,
    active_fg: Option<RgbToml>,
    gauge_fg: Option<RgbToml>,
    success_fg: Option<RgbToml>,
    warning_fg: Option<RgbToml>,
    error_fg: Option<RgbToml>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct RgbToml {
    r: u8,
    g: u8,
    b: u8,
}

impl RgbToml {
    fn to_color(self) -> Color {
        Color::Rgb(self.r, self.g, self.b)
    }
}
