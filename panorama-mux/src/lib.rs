//! panorama-mux: Access to the terminal multiplexer
//!
//! The coordinator and the bridge never shell out directly; they go through
//! the [`Multiplexer`] trait so tests can swap in a scripted fake.

pub mod tmux;
pub mod types;

#[cfg(any(test, feature = "test-support"))]
pub mod fake;

use async_trait::async_trait;
use panorama_utils::{PanoramaError, Result};

pub use tmux::TmuxCli;
pub use types::{Focus, PaneInfo, SessionSnapshot, SplitDirection, WindowInfo};

#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeMultiplexer, MuxCommand};

/// Operations panorama needs from a multiplexer session
#[async_trait]
pub trait Multiplexer: Send + Sync {
    /// Windows and panes of the session
    async fn snapshot(&self) -> Result<SessionSnapshot>;

    /// Currently focused window and pane
    async fn focus(&self) -> Result<Focus>;

    /// Full-screen capture of a pane, escape sequences included
    async fn capture_pane(&self, pane_id: &str) -> Result<Vec<u8>>;

    async fn select_window(&self, window_id: &str) -> Result<()>;

    async fn select_pane(&self, pane_id: &str) -> Result<()>;

    async fn new_window(&self) -> Result<()>;

    async fn split_pane(&self, pane_id: &str, direction: SplitDirection) -> Result<()>;

    async fn rename_window(&self, window_id: &str, name: &str) -> Result<()>;

    async fn kill_window(&self, window_id: &str) -> Result<()>;

    async fn kill_pane(&self, pane_id: &str) -> Result<()>;

    /// Set a user option (such as a group attribute) on a window, pane or
    /// the session
    async fn set_option(&self, target: &str, key: &str, value: &str) -> Result<()>;

    /// Window that owns `pane_id`
    async fn window_of_pane(&self, pane_id: &str) -> Result<String> {
        let snapshot = self.snapshot().await?;
        snapshot
            .pane(pane_id)
            .map(|p| p.window_id.clone())
            .ok_or_else(|| PanoramaError::PaneNotFound(pane_id.to_string()))
    }
}
