//! Frame drawing
//!
//! Content and pinned blocks are pre-formatted ANSI text; each is fed
//! through its own vt100 parser and drawn with tui-term so the
//! coordinator's colors survive untouched.

use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::Frame;
use tui_term::vt100::Parser;
use tui_term::widget::PseudoTerminal;

use crate::connection::LinkStatus;

use super::state::ViewState;

/// Hide the emulated cursor
const HIDE_CURSOR: &[u8] = b"\x1b[?25l";

/// Feed `lines` into a parser sized to `area`
fn screen_for(lines: &[&str], area: Rect) -> Parser {
    let mut parser = Parser::new(area.height.max(1), area.width.max(1), 0);
    parser.process(HIDE_CURSOR);
    parser.process(lines.join("\r\n").as_bytes());
    parser
}

/// Rows of `content` visible from `offset`
pub fn visible_lines(content: &str, offset: u32, rows: u16) -> Vec<&str> {
    content
        .split('\n')
        .skip(offset as usize)
        .take(rows as usize)
        .collect()
}

pub fn draw(frame: &mut Frame, view: &ViewState, status: &LinkStatus) {
    let (width, height) = view.size();
    let area = Rect::new(0, 0, width, height).intersection(frame.area());

    let Some(payload) = view.frame() else {
        let text = format!("panorama: {}", status);
        frame.render_widget(Paragraph::new(text).wrap(Wrap { trim: true }), area);
        return;
    };

    let content_height = view.content_height();
    if content_height > 0 {
        let content_area = Rect::new(area.x, area.y, area.width, content_height);
        let parser = screen_for(
            &visible_lines(&payload.content, view.offset(), content_height),
            content_area,
        );
        frame.render_widget(PseudoTerminal::new(parser.screen()), content_area);
    }

    let pinned_height = view.pinned_height();
    if pinned_height > 0 {
        let pinned_area = Rect::new(
            area.x,
            area.y + content_height,
            area.width,
            pinned_height,
        );
        let parser = screen_for(
            &visible_lines(&payload.pinned_content, 0, pinned_height),
            pinned_area,
        );
        frame.render_widget(PseudoTerminal::new(parser.screen()), pinned_area);
    }

    draw_menu(frame, view);
}

fn draw_menu(frame: &mut Frame, view: &ViewState) {
    let (Some(menu), Some(area)) = (view.menu(), view.menu_area()) else {
        return;
    };

    let items: Vec<ListItem> = menu
        .payload
        .items
        .iter()
        .map(|item| ListItem::new(item.label.clone()))
        .collect();
    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(menu.payload.title.clone()),
        )
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED));
    let mut state = ListState::default().with_selected(Some(menu.selected));

    frame.render_widget(Clear, area);
    frame.render_stateful_widget(list, area, &mut state);
}
