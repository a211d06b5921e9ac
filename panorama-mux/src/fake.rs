//! Scripted in-memory multiplexer for tests

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use panorama_utils::{PanoramaError, Result};

use crate::types::{Focus, PaneInfo, SessionSnapshot, SplitDirection, WindowInfo};
use crate::Multiplexer;

/// A mutation issued against the fake
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MuxCommand {
    SelectWindow(String),
    SelectPane(String),
    NewWindow,
    SplitPane(String, SplitDirection),
    RenameWindow(String, String),
    KillWindow(String),
    KillPane(String),
    SetOption {
        target: String,
        key: String,
        value: String,
    },
}

#[derive(Debug, Default)]
struct State {
    snapshot: SessionSnapshot,
    focus: Focus,
    captures: HashMap<String, Vec<u8>>,
    commands: Vec<MuxCommand>,
    next_id: u32,
    fail_focus: bool,
}

/// In-memory [`Multiplexer`] whose focus and captures are set by the test
#[derive(Debug, Default)]
pub struct FakeMultiplexer {
    state: Mutex<State>,
    captures_taken: AtomicUsize,
}

impl FakeMultiplexer {
    pub fn new(snapshot: SessionSnapshot, focus: Focus) -> Self {
        let next_id = 100;
        Self {
            state: Mutex::new(State {
                snapshot,
                focus,
                next_id,
                ..Default::default()
            }),
            captures_taken: AtomicUsize::new(0),
        }
    }

    /// Two windows (`@1` with `%1`, `@2` with `%2`), focus on `@1`/`%1`
    pub fn two_windows() -> Self {
        let window = |id: &str, index: u32, name: &str, active: bool| WindowInfo {
            id: id.into(),
            index,
            name: name.into(),
            active,
            attributes: BTreeMap::new(),
        };
        let pane = |id: &str, window_id: &str, active: bool| PaneInfo {
            id: id.into(),
            window_id: window_id.into(),
            index: 0,
            title: id.into(),
            command: "sh".into(),
            active,
        };
        Self::new(
            SessionSnapshot {
                windows: vec![window("@1", 0, "one", true), window("@2", 1, "two", false)],
                panes: vec![pane("%1", "@1", true), pane("%2", "@2", true)],
            },
            Focus {
                window_id: "@1".into(),
                pane_id: "%1".into(),
            },
        )
    }

    pub fn set_focus(&self, window_id: &str, pane_id: &str) {
        let mut state = self.state.lock();
        state.focus = Focus {
            window_id: window_id.into(),
            pane_id: pane_id.into(),
        };
        for w in &mut state.snapshot.windows {
            w.active = w.id == window_id;
        }
    }

    pub fn set_capture(&self, pane_id: &str, capture: impl Into<Vec<u8>>) {
        self.state.lock().captures.insert(pane_id.into(), capture.into());
    }

    pub fn set_snapshot(&self, snapshot: SessionSnapshot) {
        self.state.lock().snapshot = snapshot;
    }

    /// Make `focus()` fail until cleared
    pub fn fail_focus(&self, fail: bool) {
        self.state.lock().fail_focus = fail;
    }

    /// Commands issued so far, in order
    pub fn commands(&self) -> Vec<MuxCommand> {
        self.state.lock().commands.clone()
    }

    pub fn clear_commands(&self) {
        self.state.lock().commands.clear();
    }

    /// Number of `capture_pane` calls served
    pub fn captures_taken(&self) -> usize {
        self.captures_taken.load(Ordering::SeqCst)
    }

    fn record(&self, command: MuxCommand) {
        self.state.lock().commands.push(command);
    }
}

#[async_trait]
impl Multiplexer for FakeMultiplexer {
    async fn snapshot(&self) -> Result<SessionSnapshot> {
        Ok(self.state.lock().snapshot.clone())
    }

    async fn focus(&self) -> Result<Focus> {
        let state = self.state.lock();
        if state.fail_focus {
            return Err(PanoramaError::mux("focus query failed"));
        }
        Ok(state.focus.clone())
    }

    async fn capture_pane(&self, pane_id: &str) -> Result<Vec<u8>> {
        self.captures_taken.fetch_add(1, Ordering::SeqCst);
        self.state
            .lock()
            .captures
            .get(pane_id)
            .cloned()
            .ok_or_else(|| PanoramaError::PaneNotFound(pane_id.to_string()))
    }

    async fn select_window(&self, window_id: &str) -> Result<()> {
        self.record(MuxCommand::SelectWindow(window_id.into()));
        let pane_id = {
            let state = self.state.lock();
            if state.snapshot.window(window_id).is_none() {
                return Err(PanoramaError::WindowNotFound(window_id.into()));
            }
            let pane_id = state
                .snapshot
                .panes_of(window_id)
                .find(|p| p.active)
                .or_else(|| state.snapshot.panes_of(window_id).next())
                .map(|p| p.id.clone())
                .unwrap_or_default();
            pane_id
        };
        self.set_focus(window_id, &pane_id);
        Ok(())
    }

    async fn select_pane(&self, pane_id: &str) -> Result<()> {
        self.record(MuxCommand::SelectPane(pane_id.into()));
        let window_id = self
            .state
            .lock()
            .snapshot
            .pane(pane_id)
            .map(|p| p.window_id.clone())
            .ok_or_else(|| PanoramaError::PaneNotFound(pane_id.into()))?;
        self.set_focus(&window_id, pane_id);
        Ok(())
    }

    async fn new_window(&self) -> Result<()> {
        self.record(MuxCommand::NewWindow);
        let mut state = self.state.lock();
        state.next_id += 1;
        let n = state.next_id;
        let index = state.snapshot.windows.len() as u32;
        state.snapshot.windows.push(WindowInfo {
            id: format!("@{}", n),
            index,
            name: "sh".into(),
            active: false,
            attributes: BTreeMap::new(),
        });
        state.snapshot.panes.push(PaneInfo {
            id: format!("%{}", n),
            window_id: format!("@{}", n),
            index: 0,
            title: String::new(),
            command: "sh".into(),
            active: true,
        });
        Ok(())
    }

    async fn split_pane(&self, pane_id: &str, direction: SplitDirection) -> Result<()> {
        self.record(MuxCommand::SplitPane(pane_id.into(), direction));
        let mut state = self.state.lock();
        let window_id = state
            .snapshot
            .pane(pane_id)
            .map(|p| p.window_id.clone())
            .ok_or_else(|| PanoramaError::PaneNotFound(pane_id.into()))?;
        state.next_id += 1;
        let n = state.next_id;
        let index = state.snapshot.panes_of(&window_id).count() as u32;
        state.snapshot.panes.push(PaneInfo {
            id: format!("%{}", n),
            window_id,
            index,
            title: String::new(),
            command: "sh".into(),
            active: false,
        });
        Ok(())
    }

    async fn rename_window(&self, window_id: &str, name: &str) -> Result<()> {
        self.record(MuxCommand::RenameWindow(window_id.into(), name.into()));
        let mut state = self.state.lock();
        let window = state
            .snapshot
            .windows
            .iter_mut()
            .find(|w| w.id == window_id)
            .ok_or_else(|| PanoramaError::WindowNotFound(window_id.into()))?;
        window.name = name.into();
        Ok(())
    }

    async fn kill_window(&self, window_id: &str) -> Result<()> {
        self.record(MuxCommand::KillWindow(window_id.into()));
        let mut state = self.state.lock();
        state.snapshot.windows.retain(|w| w.id != window_id);
        state.snapshot.panes.retain(|p| p.window_id != window_id);
        Ok(())
    }

    async fn kill_pane(&self, pane_id: &str) -> Result<()> {
        self.record(MuxCommand::KillPane(pane_id.into()));
        self.state.lock().snapshot.panes.retain(|p| p.id != pane_id);
        Ok(())
    }

    async fn set_option(&self, target: &str, key: &str, value: &str) -> Result<()> {
        self.record(MuxCommand::SetOption {
            target: target.into(),
            key: key.into(),
            value: value.into(),
        });
        let mut state = self.state.lock();
        if let Some(window) = state.snapshot.windows.iter_mut().find(|w| w.id == target) {
            window.attributes.insert(key.into(), value.into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_select_window_moves_focus() {
        let mux = FakeMultiplexer::two_windows();
        mux.select_window("@2").await.unwrap();
        let focus = mux.focus().await.unwrap();
        assert_eq!(focus.window_id, "@2");
        assert_eq!(focus.pane_id, "%2");
        assert_eq!(mux.commands(), vec![MuxCommand::SelectWindow("@2".into())]);
    }

    #[tokio::test]
    async fn test_select_missing_window_fails() {
        let mux = FakeMultiplexer::two_windows();
        assert!(mux.select_window("@9").await.is_err());
    }

    #[tokio::test]
    async fn test_new_window_and_split() {
        let mux = FakeMultiplexer::two_windows();
        mux.new_window().await.unwrap();
        mux.split_pane("%1", SplitDirection::Vertical).await.unwrap();
        let snap = mux.snapshot().await.unwrap();
        assert_eq!(snap.windows.len(), 3);
        assert_eq!(snap.panes_of("@1").count(), 2);
    }

    #[tokio::test]
    async fn test_kill_window_removes_panes() {
        let mux = FakeMultiplexer::two_windows();
        mux.kill_window("@2").await.unwrap();
        let snap = mux.snapshot().await.unwrap();
        assert!(snap.window("@2").is_none());
        assert!(snap.pane("%2").is_none());
    }

    #[tokio::test]
    async fn test_capture_counts() {
        let mux = FakeMultiplexer::two_windows();
        mux.set_capture("%1", b"hello".to_vec());
        assert_eq!(mux.capture_pane("%1").await.unwrap(), b"hello");
        assert!(mux.capture_pane("%2").await.is_err());
        assert_eq!(mux.captures_taken(), 2);
    }

    #[tokio::test]
    async fn test_set_option_updates_attributes() {
        let mux = FakeMultiplexer::two_windows();
        mux.set_option("@1", "@panorama-group", "work").await.unwrap();
        let snap = mux.snapshot().await.unwrap();
        assert_eq!(snap.window("@1").unwrap().attribute("@panorama-group"), Some("work"));
    }

    #[tokio::test]
    async fn test_fail_focus() {
        let mux = FakeMultiplexer::two_windows();
        mux.fail_focus(true);
        assert!(mux.focus().await.is_err());
        mux.fail_focus(false);
        assert!(mux.focus().await.is_ok());
    }
}
