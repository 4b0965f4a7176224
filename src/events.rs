use std::io;
use std::time::Duration;

use crossterm::event::{
    self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent,
    MouseEventKind,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEvent {
    Tick,
    Quit,
    NextPane,
    PrevPane,
    MoveUp,
    MoveDown,
    CursorLeft,
    CursorRight,
    PageUp,
    PageDown,
    InputChar(char),
    Backspace,
    Submit,
    CopyCode,
    Share,
    Download,
    Detach,
    Dismiss,
    MouseScrollUp,
    MouseScrollDown,
    MouseLeftClick(u16, u16),
}

fn map_key_event(key_event: KeyEvent) -> AppEvent {
    if key_event.kind != KeyEventKind::Press {
        return AppEvent::Tick;
    }

    if key_event.modifiers.contains(KeyModifiers::CONTROL) {
        match key_event.code {
            KeyCode::Char('c') => return AppEvent::Quit,
            KeyCode::Char('y') => return AppEvent::CopyCode,
            KeyCode::Char('l') => return AppEvent::Share,
            KeyCode::Char('s') => return AppEvent::Download,
            KeyCode::Char('x') => return AppEvent::Detach,
            KeyCode::Char('u') => return AppEvent::PageUp,
            KeyCode::Char('d') => return AppEvent::PageDown,
            _ => {}
        }
    }

    match key_event.code {
        KeyCode::Tab => AppEvent::NextPane,
        KeyCode::BackTab => AppEvent::PrevPane,
        KeyCode::Esc => AppEvent::Dismiss,
        KeyCode::PageUp => AppEvent::PageUp,
        KeyCode::PageDown => AppEvent::PageDown,
        KeyCode::Up => AppEvent::MoveUp,
        KeyCode::Down => AppEvent::MoveDown,
        KeyCode::Left => AppEvent::CursorLeft,
        KeyCode::Right => AppEvent::CursorRight,
        KeyCode::Backspace => AppEvent::Backspace,
        KeyCode::Enter => AppEvent::Submit,
        KeyCode::Char(c) => AppEvent::InputChar(c),
        _ => AppEvent::Tick,
    }
}

fn map_mouse_event(mouse_event: MouseEvent) -> AppEvent {
    match mouse_event.kind {
        MouseEventKind::ScrollUp => AppEvent::MouseScrollUp,
        MouseEventKind::ScrollDown => AppEvent::MouseScrollDown,
        MouseEventKind::Down(MouseButton::Left) => {
            AppEvent::MouseLeftClick(mouse_event.column, mouse_event.row)
        }
        _ => AppEvent::Tick,
    }
}

/// Waits up to `timeout` for one terminal event; nothing pending reads as a tick.
pub fn next_event(timeout: Duration) -> io::Result<AppEvent> {
    if event::poll(timeout)? {
        match event::read()? {
            Event::Key(key_event) => return Ok(map_key_event(key_event)),
            Event::Mouse(mouse_event) => return Ok(map_mouse_event(mouse_event)),
            _ => {}
        }
    }

    Ok(AppEvent::Tick)
}
