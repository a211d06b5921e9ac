//! Session model

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A multiplexer window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowInfo {
    /// Stable id (`@N` for tmux)
    pub id: String,
    pub index: u32,
    pub name: String,
    pub active: bool,
    /// Configured user options, empty values omitted
    pub attributes: BTreeMap<String, String>,
}

impl WindowInfo {
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }
}

/// A multiplexer pane
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaneInfo {
    /// Stable id (`%N` for tmux)
    pub id: String,
    pub window_id: String,
    pub index: u32,
    pub title: String,
    pub command: String,
    pub active: bool,
}

/// Windows and panes of one session, in multiplexer order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub windows: Vec<WindowInfo>,
    pub panes: Vec<PaneInfo>,
}

impl SessionSnapshot {
    pub fn window(&self, window_id: &str) -> Option<&WindowInfo> {
        self.windows.iter().find(|w| w.id == window_id)
    }

    pub fn pane(&self, pane_id: &str) -> Option<&PaneInfo> {
        self.panes.iter().find(|p| p.id == pane_id)
    }

    pub fn panes_of<'a>(&'a self, window_id: &'a str) -> impl Iterator<Item = &'a PaneInfo> + 'a {
        self.panes.iter().filter(move |p| p.window_id == window_id)
    }

    /// Whether a window or pane with this id exists
    pub fn contains(&self, target: &str) -> bool {
        self.window(target).is_some() || self.pane(target).is_some()
    }
}

/// Focused window and pane
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Focus {
    pub window_id: String,
    pub pane_id: String,
}

/// Direction of a pane split
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitDirection {
    /// Side by side
    Horizontal,
    /// Stacked
    Vertical,
}
