use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use anyhow::Context;
use chrono::Local;
use clap::{Parser, Subcommand};
use crossterm::cursor::SetCursorStyle;
use crossterm::event::{DisableMouseCapture, EnableMouseCapture};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::prelude::*;
use tracing::info;

mod app;
mod attachment;
mod clipboard;
mod composer;
mod config;
mod connection;
mod error;
mod events;
mod export;
mod headless;
mod logging;
mod markdown;
mod progress;
mod protocol;
mod report;
mod text_layout;
mod theme;
mod ui;

use app::{App, Command, Pane, Ports};
use attachment::AttachmentReader;
use clipboard::SystemClipboard;
use config::{ClientConfig, DEFAULT_CONFIG_FILE};
use connection::{ConnectionManager, endpoint_url};
use events::AppEvent;
use headless::{AskOptions, reconnect_policy};
use theme::Theme;

const GLOBAL_RESULT_SCROLL_LINES: u16 = 5;
const MAX_CONNECTION_EVENTS_PER_LOOP: usize = 128;
const EVENT_POLL: Duration = Duration::from_millis(16);

#[derive(Debug, Parser)]
#[command(name = "research-console", version, about = "Terminal client for the research assistant")]
struct LaunchOptions {
    /// Config file; defaults to research-console.toml when present.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Origin the server is hosted at, e.g. https://research.example.com
    #[arg(long)]
    origin: Option<String>,
    /// `report` or `transcript`.
    #[arg(long)]
    variant: Option<String>,
    #[arg(long)]
    log_file: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<LaunchCommand>,
}

#[derive(Debug, Subcommand)]
enum LaunchCommand {
    /// Ask one question and print the report without the terminal UI.
    Ask {
        question: String,
        #[arg(long)]
        attach: Option<PathBuf>,
        #[arg(long)]
        searches: Option<String>,
        #[arg(long)]
        rewordings: Option<String>,
        #[arg(long)]
        output_dir: Option<PathBuf>,
        #[arg(long)]
        html: Option<PathBuf>,
        #[arg(short, long)]
        verbose: bool,
    },
}

fn main() -> ExitCode {
    let options = LaunchOptions::parse();
    match run(options) {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(options: LaunchOptions) -> anyhow::Result<u8> {
    let config = load_config(&options)?;
    logging::init_logging(config.log_file.as_deref(), &config.log_level)?;
    info!(origin = %config.origin, variant = config.variant.label(), "starting");

    match options.command {
        Some(LaunchCommand::Ask {
            question,
            attach,
            searches,
            rewordings,
            output_dir,
            html,
            verbose,
        }) => {
            let ask = AskOptions {
                question,
                attach,
                searches,
                rewordings,
                output_dir,
                html,
                verbose,
            };
            let mut stdout = io::stdout().lock();
            let outcome = headless::run_ask(&config, &ask, &mut stdout)?;
            stdout.flush()?;
            Ok(outcome.exit_code())
        }
        None => {
            run_terminal(&config)?;
            Ok(0)
        }
    }
}

fn load_config(options: &LaunchOptions) -> anyhow::Result<ClientConfig> {
    let mut config = match &options.config {
        Some(path) => ClientConfig::load(path)
            .with_context(|| format!("failed to load config '{}'", path.display()))?,
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
            ClientConfig::load_or_default(DEFAULT_CONFIG_FILE)
        }
        None => ClientConfig::default(),
    };
    if let Some(origin) = &options.origin {
        config.origin = origin.clone();
    }
    if let Some(variant) = &options.variant {
        config.variant = variant.parse()?;
    }
    if let Some(log_file) = &options.log_file {
        config.log_file = Some(log_file.clone());
    }
    Ok(config)
}

fn run_terminal(config: &ClientConfig) -> anyhow::Result<()> {
    let endpoint = endpoint_url(&config.origin, &config.endpoint_path)?;

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(
        stdout,
        EnterAlternateScreen,
        EnableMouseCapture,
        SetCursorStyle::SteadyBar
    )?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;
    let result = run_app(&mut terminal, config, endpoint);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        SetCursorStyle::DefaultUserShape,
        DisableMouseCapture,
        LeaveAlternateScreen
    )?;
    terminal.show_cursor()?;

    result
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    config: &ClientConfig,
    endpoint: String,
) -> anyhow::Result<()> {
    let theme = &config.theme;
    let mut app = App::new(config);
    let mut connection = ConnectionManager::new(endpoint, reconnect_policy(config));
    info!(endpoint = connection.endpoint(), "opening channel");
    connection.connect();
    let attachments = AttachmentReader::default();
    let mut clipboard = SystemClipboard;

    while app.running {
        for event in connection.drain_events_limited(MAX_CONNECTION_EVENTS_PER_LOOP) {
            app.apply_connection(event);
        }
        for read in attachments.drain() {
            app.apply_attachment(read);
        }

        let size = terminal.size()?;
        let screen = Rect::new(0, 0, size.width, size.height);
        app.sync_feed_scroll(ui::feed_max_scroll(screen, &app, theme));
        terminal.draw(|frame| ui::render(frame, &app, theme))?;

        let event = events::next_event(EVENT_POLL)?;
        let mut ports = Ports {
            channel: &connection,
            clipboard: &mut clipboard,
            attachments: &attachments,
        };
        handle_event(&mut app, event, screen, theme, &mut ports);
    }

    Ok(())
}

fn handle_event(app: &mut App, event: AppEvent, screen: Rect, theme: &Theme, ports: &mut Ports<'_>) {
    let now = Instant::now();
    if app.modal().is_some() {
        match event {
            AppEvent::Quit => app.quit(),
            AppEvent::Dismiss | AppEvent::Submit => {
                app.dismiss_modal();
            }
            AppEvent::Tick => app.on_tick(now),
            _ => {}
        }
        return;
    }

    match event {
        AppEvent::Tick => app.on_tick(now),
        AppEvent::Quit => app.quit(),
        AppEvent::NextPane => {
            if app.active_pane == Pane::Composer && app.autocomplete_top_command() {
                // keep focus in the composer when a command was completed
            } else {
                app.next_pane();
            }
        }
        AppEvent::PrevPane => app.prev_pane(),
        AppEvent::Dismiss => {
            app.dismiss_modal();
        }
        AppEvent::MoveUp => match app.active_pane {
            Pane::Composer => {
                app.composer.move_cursor_up(ui::composer_text_width(screen));
            }
            Pane::Feed => app.scroll_feed_up(),
            Pane::Result => app.select_prev_step(),
        },
        AppEvent::MoveDown => match app.active_pane {
            Pane::Composer => {
                app.composer.move_cursor_down(ui::composer_text_width(screen));
            }
            Pane::Feed => {
                let max_scroll = ui::feed_max_scroll(screen, app, theme);
                app.scroll_feed_down(max_scroll);
            }
            Pane::Result => app.select_next_step(),
        },
        AppEvent::CursorLeft => match app.active_pane {
            Pane::Composer => app.composer.move_cursor_left(),
            Pane::Result => app.select_prev_code(),
            Pane::Feed => {}
        },
        AppEvent::CursorRight => match app.active_pane {
            Pane::Composer => app.composer.move_cursor_right(),
            Pane::Result => app.select_next_code(),
            Pane::Feed => {}
        },
        AppEvent::PageUp => {
            for _ in 0..GLOBAL_RESULT_SCROLL_LINES {
                app.scroll_result_up();
            }
        }
        AppEvent::PageDown => {
            let max_scroll = ui::result_max_scroll(screen, app, theme);
            for _ in 0..GLOBAL_RESULT_SCROLL_LINES {
                app.scroll_result_down(max_scroll);
            }
        }
        AppEvent::MouseScrollUp => match app.active_pane {
            Pane::Feed => app.scroll_feed_up(),
            Pane::Result => app.scroll_result_up(),
            Pane::Composer => {}
        },
        AppEvent::MouseScrollDown => match app.active_pane {
            Pane::Feed => {
                let max_scroll = ui::feed_max_scroll(screen, app, theme);
                app.scroll_feed_down(max_scroll);
            }
            Pane::Result => {
                let max_scroll = ui::result_max_scroll(screen, app, theme);
                app.scroll_result_down(max_scroll);
            }
            Pane::Composer => {}
        },
        AppEvent::MouseLeftClick(column, row) => {
            if let Some(pane) = ui::pane_hit_test(screen, column, row) {
                app.active_pane = pane;
            }
        }
        AppEvent::InputChar(' ') if app.active_pane == Pane::Result => {
            app.toggle_selected_step();
        }
        AppEvent::InputChar(c) => {
            app.active_pane = Pane::Composer;
            app.composer.input_char(c);
        }
        AppEvent::Backspace => {
            if app.active_pane == Pane::Composer {
                app.composer.backspace();
            }
        }
        AppEvent::Submit => match app.active_pane {
            Pane::Result => {
                app.toggle_selected_step();
            }
            _ => app.submit(ports, now, Local::now().naive_local()),
        },
        AppEvent::CopyCode => {
            app.copy_selected_code(ports.clipboard, now);
        }
        AppEvent::Share => app.share(ports.clipboard),
        AppEvent::Download => {
            app.download(Local::now().naive_local());
        }
        AppEvent::Detach => app.run_command(Command::Detach, ports, now, Local::now().naive_local()),
    }
}
