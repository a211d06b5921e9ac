//! Scroll position over the scrollable part of a render frame

/// Viewport offset clamped to `[0, total_lines - visible_height]`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Viewport {
    offset: u32,
    total_lines: u32,
    visible_height: u32,
}

impl Viewport {
    pub fn new(total_lines: u32, visible_height: u32) -> Self {
        Self {
            offset: 0,
            total_lines,
            visible_height,
        }
    }

    pub fn offset(&self) -> u32 {
        self.offset
    }

    pub fn visible_height(&self) -> u32 {
        self.visible_height
    }

    pub fn max_offset(&self) -> u32 {
        self.total_lines.saturating_sub(self.visible_height)
    }

    /// Update the bounds after a new frame or a resize, re-clamping the offset
    pub fn set_bounds(&mut self, total_lines: u32, visible_height: u32) {
        self.total_lines = total_lines;
        self.visible_height = visible_height;
        self.offset = self.offset.min(self.max_offset());
    }

    /// Set the offset; returns `true` when it changed
    pub fn set_offset(&mut self, offset: u32) -> bool {
        let clamped = offset.min(self.max_offset());
        let changed = clamped != self.offset;
        self.offset = clamped;
        changed
    }

    /// Scroll by `delta` lines (negative scrolls up)
    pub fn scroll_by(&mut self, delta: i64) -> bool {
        let target = (self.offset as i64 + delta).clamp(0, u32::MAX as i64) as u32;
        self.set_offset(target)
    }

    pub fn page_up(&mut self) -> bool {
        self.scroll_by(-(self.page_size() as i64))
    }

    pub fn page_down(&mut self) -> bool {
        self.scroll_by(self.page_size() as i64)
    }

    pub fn to_top(&mut self) -> bool {
        self.set_offset(0)
    }

    pub fn to_bottom(&mut self) -> bool {
        self.set_offset(self.max_offset())
    }

    fn page_size(&self) -> u32 {
        self.visible_height.max(1)
    }
}
