//! Local view state: the applied frame, scroll position and menu overlay
//!
//! Everything here is synchronous so the click and scroll rules can be
//! tested without a terminal.

use ratatui::layout::Rect;

use panorama_protocol::{
    hit_test, ButtonKind, FrameTracker, InputPayload, InputType, MenuPayload, MenuSelectPayload,
    RenderPayload, Viewport,
};

/// Local viewport movement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scroll {
    Lines(i64),
    PageUp,
    PageDown,
    Top,
    Bottom,
}

/// Open context menu
#[derive(Debug, Clone, PartialEq)]
pub struct MenuState {
    pub payload: MenuPayload,
    pub selected: usize,
}

/// Outcome of a click while the menu is open
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuClick {
    Select(MenuSelectPayload),
    /// Clicked outside the items; the menu closed
    Dismiss,
    /// Clicked the border or title
    Ignore,
}

#[derive(Debug)]
pub struct ViewState {
    tracker: FrameTracker,
    viewport: Viewport,
    menu: Option<MenuState>,
    width: u16,
    height: u16,
}

impl ViewState {
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            tracker: FrameTracker::new(),
            viewport: Viewport::new(0, height as u32),
            menu: None,
            width,
            height,
        }
    }

    pub fn size(&self) -> (u16, u16) {
        (self.width, self.height)
    }

    pub fn frame(&self) -> Option<&RenderPayload> {
        self.tracker.current()
    }

    pub fn last_sequence(&self) -> u64 {
        self.tracker.last_sequence().unwrap_or(0)
    }

    pub fn offset(&self) -> u32 {
        self.viewport.offset()
    }

    pub fn pinned_height(&self) -> u16 {
        self.frame()
            .map(|f| f.pinned_height.min(self.height))
            .unwrap_or(0)
    }

    /// Rows available to scrollable content
    pub fn content_height(&self) -> u16 {
        self.height - self.pinned_height()
    }

    fn rebound(&mut self) {
        let total = self.frame().map(|f| f.total_lines).unwrap_or(0);
        self.viewport.set_bounds(total, self.content_height() as u32);
    }

    /// Apply a render frame; `false` when it was stale and dropped
    pub fn apply_render(&mut self, payload: RenderPayload) -> bool {
        let first = self.tracker.current().is_none();
        let suggested = payload.viewport_offset;
        if !self.tracker.apply(payload) {
            return false;
        }
        self.rebound();
        if first {
            self.viewport.set_offset(suggested);
        }
        true
    }

    /// Forget the frame and its regions (connection lost)
    pub fn invalidate(&mut self) {
        self.tracker.invalidate();
        self.menu = None;
        self.rebound();
    }

    pub fn resize(&mut self, width: u16, height: u16) {
        self.width = width;
        self.height = height;
        self.rebound();
    }

    /// Move the viewport; the new offset when it changed
    pub fn scroll(&mut self, scroll: Scroll) -> Option<u32> {
        let moved = match scroll {
            Scroll::Lines(delta) => self.viewport.scroll_by(delta),
            Scroll::PageUp => self.viewport.page_up(),
            Scroll::PageDown => self.viewport.page_down(),
            Scroll::Top => self.viewport.to_top(),
            Scroll::Bottom => self.viewport.to_bottom(),
        };
        moved.then(|| self.viewport.offset())
    }

    /// Translate a mouse press on screen cell (`row`, `col`) into input.
    ///
    /// Content rows map to `row + offset`; pinned rows map past the end of
    /// the content, to `total_lines + pinned_row`. A click that hits no
    /// region, including one with no frame applied yet, still carries its
    /// raw coordinates.
    pub fn click(&self, row: u16, col: u16, button: ButtonKind) -> InputPayload {
        let total_lines = self.frame().map(|f| f.total_lines).unwrap_or(0);
        let content_height = self.content_height();

        let (line, region) = if row < content_height {
            let line = row as u32 + self.viewport.offset();
            let region = if line < total_lines {
                hit_test::resolve(self.tracker.regions(), line, col as u32)
            } else {
                None
            };
            (line, region)
        } else {
            let pinned_row = (row - content_height) as u32;
            (
                total_lines + pinned_row,
                hit_test::resolve(self.tracker.pinned_regions(), pinned_row, col as u32),
            )
        };

        InputPayload {
            sequence_number: self.last_sequence(),
            input_type: InputType::Mouse,
            button: Some(button),
            x: col as u32,
            y: line,
            key: None,
            resolved_action: region.map(|r| r.action.clone()),
            resolved_target: region.map(|r| r.target.clone()),
        }
    }

    // ==================== Menu ====================

    pub fn menu(&self) -> Option<&MenuState> {
        self.menu.as_ref()
    }

    pub fn menu_open(&self) -> bool {
        self.menu.is_some()
    }

    /// Open (or, for an empty item list, close) the menu
    pub fn open_menu(&mut self, payload: MenuPayload) {
        self.menu = if payload.is_close() {
            None
        } else {
            Some(MenuState {
                payload,
                selected: 0,
            })
        };
    }

    pub fn close_menu(&mut self) {
        self.menu = None;
    }

    pub fn menu_move(&mut self, delta: i32) {
        if let Some(menu) = self.menu.as_mut() {
            let count = menu.payload.items.len() as i32;
            menu.selected = (menu.selected as i32 + delta).rem_euclid(count) as usize;
        }
    }

    /// Close the menu, returning the highlighted item
    pub fn confirm_menu(&mut self) -> Option<MenuSelectPayload> {
        let menu = self.menu.take()?;
        let item = menu.payload.items.get(menu.selected)?;
        Some(MenuSelectPayload {
            action: item.action.clone(),
            target: item.target.clone(),
        })
    }

    /// Screen area of the open menu, anchored below its anchor line and
    /// kept on screen
    pub fn menu_area(&self) -> Option<Rect> {
        let menu = self.menu.as_ref()?;
        let widest = menu
            .payload
            .items
            .iter()
            .map(|i| i.label.chars().count())
            .chain(std::iter::once(menu.payload.title.chars().count()))
            .max()
            .unwrap_or(0);
        let width = ((widest + 4) as u16).min(self.width);
        let height = ((menu.payload.items.len() + 2) as u16).min(self.height);

        let anchor_row = menu
            .payload
            .anchor_line
            .saturating_sub(self.viewport.offset())
            .saturating_add(1)
            .min(u16::MAX as u32) as u16;
        let x = (menu.payload.anchor_col.min(u16::MAX as u32) as u16).min(self.width - width);
        let y = anchor_row.min(self.height - height);
        Some(Rect::new(x, y, width, height))
    }

    pub fn menu_click(&mut self, row: u16, col: u16) -> MenuClick {
        let Some(area) = self.menu_area() else {
            return MenuClick::Dismiss;
        };
        let inside = col >= area.x
            && col < area.x + area.width
            && row >= area.y
            && row < area.y + area.height;
        if !inside {
            self.menu = None;
            return MenuClick::Dismiss;
        }
        if row == area.y || row + 1 == area.y + area.height {
            return MenuClick::Ignore;
        }
        let index = (row - area.y - 1) as usize;
        if let Some(menu) = self.menu.as_mut() {
            menu.selected = index;
        }
        match self.confirm_menu() {
            Some(selection) => MenuClick::Select(selection),
            None => MenuClick::Dismiss,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use panorama_protocol::{ClickableRegion, MenuItem};

    fn frame(seq: u64, total_lines: u32) -> RenderPayload {
        RenderPayload {
            sequence_number: seq,
            content: (0..total_lines)
                .map(|i| format!("line {}", i))
                .collect::<Vec<_>>()
                .join("\n"),
            pinned_content: "+ new window".into(),
            width: 20,
            height: 10,
            total_lines,
            pinned_height: 1,
            viewport_offset: 0,
            regions: vec![
                ClickableRegion::lines(0, 0, "select_window", "@1"),
                ClickableRegion::lines(5, 5, "select_window", "@2"),
            ],
            pinned_regions: vec![ClickableRegion::lines(0, 0, "new_window", "")],
        }
    }

    fn menu() -> MenuPayload {
        MenuPayload {
            title: "@1".into(),
            items: vec![
                MenuItem {
                    label: "Select".into(),
                    action: "select_window".into(),
                    target: "@1".into(),
                },
                MenuItem {
                    label: "Close window".into(),
                    action: "close_window".into(),
                    target: "@1".into(),
                },
            ],
            anchor_line: 2,
            anchor_col: 0,
        }
    }

    // ==================== Frames ====================

    #[test]
    fn test_out_of_order_frames_keep_highest() {
        let mut view = ViewState::new(20, 10);
        assert!(view.apply_render(frame(3, 30)));
        assert!(!view.apply_render(frame(1, 5)));
        assert!(!view.apply_render(frame(3, 5)));
        assert_eq!(view.frame().unwrap().total_lines, 30);
        assert!(view.apply_render(frame(4, 12)));
        assert_eq!(view.last_sequence(), 4);
    }

    #[test]
    fn test_first_frame_adopts_suggested_offset_then_clamps() {
        let mut view = ViewState::new(20, 10);
        let mut first = frame(1, 30);
        first.viewport_offset = 15;
        view.apply_render(first);
        assert_eq!(view.offset(), 15);

        // Shorter content: 12 lines over 9 content rows clamps to 3
        view.apply_render(frame(2, 12));
        assert_eq!(view.offset(), 3);
    }

    #[test]
    fn test_invalidate_forgets_frame() {
        let mut view = ViewState::new(20, 10);
        view.apply_render(frame(7, 30));
        view.open_menu(menu());
        view.invalidate();
        assert!(view.frame().is_none());
        assert!(!view.menu_open());
        let raw = view.click(0, 0, ButtonKind::Left);
        assert!(!raw.is_resolved());
        assert_eq!(raw.sequence_number, 0);
        // A restarted stream is accepted from the beginning
        assert!(view.apply_render(frame(1, 30)));
    }

    // ==================== Scrolling ====================

    #[test]
    fn test_scroll_is_clamped() {
        let mut view = ViewState::new(20, 10);
        view.apply_render(frame(1, 30));
        // 9 content rows, 30 lines: max offset 21
        assert_eq!(view.scroll(Scroll::Lines(-3)), None);
        assert_eq!(view.scroll(Scroll::Lines(3)), Some(3));
        assert_eq!(view.scroll(Scroll::Bottom), Some(21));
        assert_eq!(view.scroll(Scroll::PageDown), None);
        assert_eq!(view.scroll(Scroll::Top), Some(0));
    }

    #[test]
    fn test_resize_reclamps() {
        let mut view = ViewState::new(20, 10);
        view.apply_render(frame(1, 30));
        view.scroll(Scroll::Bottom);
        view.resize(20, 31);
        assert_eq!(view.offset(), 0);
        assert_eq!(view.content_height(), 30);
    }

    // ==================== Clicks ====================

    #[test]
    fn test_click_resolves_with_offset() {
        let mut view = ViewState::new(20, 10);
        view.apply_render(frame(4, 30));
        view.scroll(Scroll::Lines(3));

        let input = view.click(2, 7, ButtonKind::Left);
        assert_eq!(input.sequence_number, 4);
        assert_eq!((input.x, input.y), (7, 5));
        assert_eq!(input.resolved_action.as_deref(), Some("select_window"));
        assert_eq!(input.resolved_target.as_deref(), Some("@2"));
    }

    #[test]
    fn test_unmatched_click_sends_raw_coordinates() {
        let mut view = ViewState::new(20, 10);
        view.apply_render(frame(1, 30));
        let input = view.click(1, 0, ButtonKind::Right);
        assert_eq!(input.y, 1);
        assert_eq!(input.button, Some(ButtonKind::Right));
        assert!(!input.is_resolved());
    }

    #[test]
    fn test_pinned_click() {
        let mut view = ViewState::new(20, 10);
        view.apply_render(frame(1, 30));
        let input = view.click(9, 3, ButtonKind::Left);
        assert_eq!(input.y, 30);
        assert_eq!(input.resolved_action.as_deref(), Some("new_window"));
    }

    #[test]
    fn test_click_in_gap_below_content() {
        let mut view = ViewState::new(20, 10);
        view.apply_render(frame(1, 4));
        let input = view.click(6, 0, ButtonKind::Left);
        assert_eq!((input.x, input.y), (0, 6));
        assert!(!input.is_resolved());
    }

    #[test]
    fn test_click_without_frame_sends_raw_coordinates() {
        let view = ViewState::new(20, 10);
        let input = view.click(3, 5, ButtonKind::Left);
        assert_eq!((input.x, input.y), (5, 3));
        assert_eq!(input.button, Some(ButtonKind::Left));
        assert_eq!(input.resolved_action, None);
        assert_eq!(input.resolved_target, None);
    }

    // ==================== Menu ====================

    #[test]
    fn test_menu_keyboard_selection() {
        let mut view = ViewState::new(20, 10);
        view.open_menu(menu());
        view.menu_move(1);
        view.menu_move(1);
        view.menu_move(-1);
        let selection = view.confirm_menu().unwrap();
        assert_eq!(selection.action, "close_window");
        assert!(!view.menu_open());
    }

    #[test]
    fn test_empty_menu_closes() {
        let mut view = ViewState::new(20, 10);
        view.open_menu(menu());
        view.open_menu(MenuPayload::close());
        assert!(!view.menu_open());
    }

    #[test]
    fn test_menu_click() {
        let mut view = ViewState::new(40, 10);
        view.open_menu(menu());
        let area = view.menu_area().unwrap();
        assert_eq!((area.x, area.y, area.height), (0, 3, 4));

        assert_eq!(view.menu_click(area.y, 1), MenuClick::Ignore);
        match view.menu_click(area.y + 2, 1) {
            MenuClick::Select(sel) => assert_eq!(sel.action, "close_window"),
            other => panic!("expected selection, got {:?}", other),
        }

        view.open_menu(menu());
        assert_eq!(view.menu_click(0, 39), MenuClick::Dismiss);
        assert!(!view.menu_open());
    }
}
