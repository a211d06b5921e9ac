//! Terminal event translation
//!
//! Maps crossterm events onto what the app does with them. Navigation keys
//! drive the local viewport (or the menu while one is open); everything
//! else that looks like a key press is forwarded to the coordinator.

use crossterm::event::{
    Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};

use panorama_protocol::ButtonKind;

use crate::ui::Scroll;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Quit,
    /// `r`: reconnect when unavailable, otherwise an ordinary key
    Retry,
    Resize { width: u16, height: u16 },
    Scroll(Scroll),
    Click { row: u16, col: u16, button: ButtonKind },
    Key(String),
    MenuUp,
    MenuDown,
    MenuConfirm,
    MenuCancel,
    Ignore,
}

pub fn translate(event: &Event, menu_open: bool, scroll_lines: u32) -> Command {
    match event {
        Event::Key(key) => translate_key(key, menu_open, scroll_lines as i64),
        Event::Mouse(mouse) => translate_mouse(mouse, scroll_lines as i64),
        Event::Resize(width, height) => Command::Resize {
            width: *width,
            height: *height,
        },
        Event::FocusGained | Event::FocusLost | Event::Paste(_) => Command::Ignore,
    }
}

fn translate_key(key: &KeyEvent, menu_open: bool, lines: i64) -> Command {
    if key.kind == KeyEventKind::Release {
        return Command::Ignore;
    }
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return Command::Quit;
    }

    if menu_open {
        return match key.code {
            KeyCode::Up | KeyCode::Char('k') => Command::MenuUp,
            KeyCode::Down | KeyCode::Char('j') => Command::MenuDown,
            KeyCode::Enter => Command::MenuConfirm,
            KeyCode::Esc => Command::MenuCancel,
            KeyCode::Char('q') => Command::Quit,
            _ => Command::Ignore,
        };
    }

    match key.code {
        KeyCode::Char('q') => Command::Quit,
        KeyCode::Char('r') => Command::Retry,
        KeyCode::Up => Command::Scroll(Scroll::Lines(-lines)),
        KeyCode::Down => Command::Scroll(Scroll::Lines(lines)),
        KeyCode::PageUp => Command::Scroll(Scroll::PageUp),
        KeyCode::PageDown => Command::Scroll(Scroll::PageDown),
        KeyCode::Home => Command::Scroll(Scroll::Top),
        KeyCode::End => Command::Scroll(Scroll::Bottom),
        code => match key_name(code, key.modifiers) {
            Some(name) => Command::Key(name),
            None => Command::Ignore,
        },
    }
}

/// tmux-style key name (`a`, `C-a`, `Enter`, `F5`)
fn key_name(code: KeyCode, modifiers: KeyModifiers) -> Option<String> {
    let base = match code {
        KeyCode::Char(c) => c.to_string(),
        KeyCode::Enter => "Enter".into(),
        KeyCode::Tab => "Tab".into(),
        KeyCode::BackTab => "BTab".into(),
        KeyCode::Backspace => "BSpace".into(),
        KeyCode::Esc => "Escape".into(),
        KeyCode::Left => "Left".into(),
        KeyCode::Right => "Right".into(),
        KeyCode::Delete => "DC".into(),
        KeyCode::Insert => "IC".into(),
        KeyCode::F(n) => format!("F{}", n),
        _ => return None,
    };
    let mut name = String::new();
    if modifiers.contains(KeyModifiers::CONTROL) {
        name.push_str("C-");
    }
    if modifiers.contains(KeyModifiers::ALT) {
        name.push_str("M-");
    }
    name.push_str(&base);
    Some(name)
}

fn translate_mouse(mouse: &MouseEvent, lines: i64) -> Command {
    let click = |button| Command::Click {
        row: mouse.row,
        col: mouse.column,
        button,
    };
    match mouse.kind {
        MouseEventKind::Down(MouseButton::Left) => click(ButtonKind::Left),
        MouseEventKind::Down(MouseButton::Right) => click(ButtonKind::Right),
        MouseEventKind::Down(MouseButton::Middle) => click(ButtonKind::Middle),
        MouseEventKind::ScrollUp => Command::Scroll(Scroll::Lines(-lines)),
        MouseEventKind::ScrollDown => Command::Scroll(Scroll::Lines(lines)),
        _ => Command::Ignore,
    }
}
