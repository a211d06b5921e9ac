//! Sidebar rendering
//!
//! A [`Renderer`] turns a session snapshot into the text and clickable
//! regions of one render frame. The coordinator stamps sequence numbers and
//! viewport offsets; renderers only describe content.

mod plain;

pub use plain::PlainRenderer;

use panorama_mux::{Focus, SessionSnapshot};
use panorama_protocol::{ClickableRegion, ColorProfile, RenderPayload};

/// What a renderer knows about the subscriber it renders for
#[derive(Debug, Clone)]
pub struct ViewContext<'a> {
    pub width: u16,
    pub height: u16,
    pub color_profile: ColorProfile,
    /// Window the subscriber sits next to, if it told us
    pub window_id: Option<&'a str>,
    pub focus: Option<&'a Focus>,
    /// Window option that names a window's group
    pub group_attribute: &'a str,
}

/// Content of one frame
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderOutput {
    pub content: String,
    pub pinned_content: String,
    pub total_lines: u32,
    pub pinned_height: u16,
    pub regions: Vec<ClickableRegion>,
    pub pinned_regions: Vec<ClickableRegion>,
}

impl RenderOutput {
    /// Frame payload with sequence number and viewport left for the registry
    pub fn into_payload(self, width: u16, height: u16) -> RenderPayload {
        RenderPayload {
            sequence_number: 0,
            content: self.content,
            pinned_content: self.pinned_content,
            width,
            height,
            total_lines: self.total_lines,
            pinned_height: self.pinned_height,
            viewport_offset: 0,
            regions: self.regions,
            pinned_regions: self.pinned_regions,
        }
    }
}

/// Produces frame content from session state
pub trait Renderer: Send + Sync {
    fn render(&self, snapshot: &SessionSnapshot, ctx: &ViewContext<'_>) -> RenderOutput;
}
