//! Built-in minimal renderer
//!
//! ```text
//!   0: editor *
//!      %1 vim
//!      %2 zsh
//! [ops]
//! > 1: logs
//!      %3 tail
//! ----
//! + new window      (pinned)
//! ```

use panorama_mux::{SessionSnapshot, WindowInfo};
use panorama_protocol::{ClickableRegion, ColorProfile};

use super::{RenderOutput, Renderer, ViewContext};

const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";

/// Windows grouped by the group attribute, panes indented under each window
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainRenderer;

impl PlainRenderer {
    pub fn new() -> Self {
        Self
    }
}

/// Truncate to `width` characters; 0 means unlimited
fn fit(text: &str, width: u16) -> String {
    if width == 0 {
        return text.to_string();
    }
    text.chars().take(width as usize).collect()
}

fn styled(text: String, style: &str, profile: ColorProfile) -> String {
    if profile == ColorProfile::None {
        text
    } else {
        format!("{}{}{}", style, text, RESET)
    }
}

/// Windows bucketed by group, ungrouped first, groups in order of first
/// appearance
fn group_windows<'a>(
    snapshot: &'a SessionSnapshot,
    attribute: &str,
) -> Vec<(Option<&'a str>, Vec<&'a WindowInfo>)> {
    let mut groups: Vec<(Option<&'a str>, Vec<&'a WindowInfo>)> = vec![(None, Vec::new())];
    for window in &snapshot.windows {
        let group = window.attribute(attribute);
        match groups.iter_mut().find(|(g, _)| *g == group) {
            Some((_, members)) => members.push(window),
            None => groups.push((group, vec![window])),
        }
    }
    groups.retain(|(_, members)| !members.is_empty());
    groups
}

impl Renderer for PlainRenderer {
    fn render(&self, snapshot: &SessionSnapshot, ctx: &ViewContext<'_>) -> RenderOutput {
        let mut lines: Vec<String> = Vec::new();
        let mut regions = Vec::new();

        let focused_window = ctx.focus.map(|f| f.window_id.as_str());
        let focused_pane = ctx.focus.map(|f| f.pane_id.as_str());

        for (group, windows) in group_windows(snapshot, ctx.group_attribute) {
            if let Some(name) = group {
                lines.push(styled(fit(&format!("[{}]", name), ctx.width), DIM, ctx.color_profile));
            }
            for window in windows {
                let here = ctx.window_id == Some(window.id.as_str());
                let focused = focused_window.map_or(window.active, |f| f == window.id);
                let text = fit(
                    &format!(
                        "{}{}: {}{}",
                        if here { "> " } else { "  " },
                        window.index,
                        window.name,
                        if focused { " *" } else { "" }
                    ),
                    ctx.width,
                );
                let line = lines.len() as u32;
                lines.push(if focused {
                    styled(text, BOLD, ctx.color_profile)
                } else {
                    text
                });
                regions.push(ClickableRegion::lines(line, line, "select_window", &window.id));

                for pane in snapshot.panes_of(&window.id) {
                    let marker = if focused_pane == Some(pane.id.as_str()) { ">" } else { " " };
                    let label = if pane.command.is_empty() { &pane.title } else { &pane.command };
                    let line = lines.len() as u32;
                    lines.push(fit(&format!("   {} {} {}", marker, pane.id, label), ctx.width));
                    regions.push(ClickableRegion::lines(line, line, "select_pane", &pane.id));
                }
            }
        }

        let pinned_content = fit("+ new window", ctx.width);
        RenderOutput {
            total_lines: lines.len() as u32,
            content: lines.join("\n"),
            pinned_content,
            pinned_height: 1,
            regions,
            pinned_regions: vec![ClickableRegion::lines(0, 0, "new_window", "")],
        }
    }
}
