//! tmux adapter driven through the command line client
//!
//! Every query uses a `-F` format with fields separated by `\x1f` (unit
//! separator), which never appears in window names or pane titles.

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use panorama_utils::{PanoramaError, Result};

use crate::types::{Focus, PaneInfo, SessionSnapshot, SplitDirection, WindowInfo};
use crate::Multiplexer;

const SEP: char = '\x1f';

/// [`Multiplexer`] for one tmux session
#[derive(Debug, Clone)]
pub struct TmuxCli {
    tmux_bin: PathBuf,
    session: String,
    /// Window user options read into [`WindowInfo::attributes`]
    attributes: Vec<String>,
}

impl TmuxCli {
    pub fn new(session: impl Into<String>) -> Self {
        Self {
            tmux_bin: PathBuf::from("tmux"),
            session: session.into(),
            attributes: Vec::new(),
        }
    }

    /// Use a specific tmux binary
    pub fn with_binary(mut self, bin: impl Into<PathBuf>) -> Self {
        self.tmux_bin = bin.into();
        self
    }

    /// Read these user options (e.g. `@panorama-group`) for every window
    pub fn with_attributes(mut self, attributes: Vec<String>) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn session(&self) -> &str {
        &self.session
    }

    /// Name of the session the calling process runs inside (`$TMUX`)
    pub async fn current_session() -> Result<String> {
        let output = Command::new("tmux")
            .args(["display-message", "-p", "#S"])
            .output()
            .await
            .map_err(|e| PanoramaError::mux(format!("failed to run tmux: {}", e)))?;
        let name = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if !output.status.success() || name.is_empty() {
            return Err(PanoramaError::mux(
                "not inside a tmux session; pass --session",
            ));
        }
        Ok(name)
    }

    /// Window id (`@N`) that contains `pane_id`, e.g. the caller's `$TMUX_PANE`
    pub async fn window_containing(pane_id: &str) -> Result<String> {
        let output = Command::new("tmux")
            .args(["display-message", "-p", "-t", pane_id, "#{window_id}"])
            .output()
            .await
            .map_err(|e| PanoramaError::mux(format!("failed to run tmux: {}", e)))?;
        let id = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if !output.status.success() || id.is_empty() {
            return Err(PanoramaError::PaneNotFound(pane_id.to_string()));
        }
        Ok(id)
    }

    pub fn tmux_bin(&self) -> &PathBuf {
        &self.tmux_bin
    }

    async fn run_raw(&self, args: &[&str]) -> Result<Vec<u8>> {
        debug!(args = ?args, "tmux");
        let output = Command::new(&self.tmux_bin)
            .args(args)
            .output()
            .await
            .map_err(|e| PanoramaError::mux(format!("failed to run tmux: {}", e)))?;
        if !output.status.success() {
            return Err(PanoramaError::mux(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        Ok(output.stdout)
    }

    async fn run(&self, args: &[&str]) -> Result<String> {
        let out = self.run_raw(args).await?;
        Ok(String::from_utf8_lossy(&out).into_owned())
    }

    fn window_format(&self) -> String {
        let mut fields = vec![
            "#{window_id}".to_string(),
            "#{window_index}".to_string(),
            "#{window_name}".to_string(),
            "#{window_active}".to_string(),
        ];
        fields.extend(self.attributes.iter().map(|a| format!("#{{{}}}", a)));
        fields.join(&SEP.to_string())
    }
}

const PANE_FORMAT: &str = "#{pane_id}\x1f#{window_id}\x1f#{pane_index}\x1f#{pane_title}\x1f#{pane_current_command}\x1f#{pane_active}";
const FOCUS_FORMAT: &str = "#{window_id}\x1f#{pane_id}";

/// Parse `list-windows` output produced with [`TmuxCli::window_format`]
pub fn parse_windows(output: &str, attributes: &[String]) -> Result<Vec<WindowInfo>> {
    output
        .lines()
        .filter(|l| !l.is_empty())
        .map(|line| {
            let fields: Vec<&str> = line.split(SEP).collect();
            if fields.len() < 4 + attributes.len() {
                return Err(PanoramaError::mux(format!("unexpected window line: {:?}", line)));
            }
            let attrs = attributes
                .iter()
                .zip(&fields[4..])
                .filter(|(_, v)| !v.is_empty())
                .map(|(k, v)| (k.clone(), v.to_string()))
                .collect::<BTreeMap<_, _>>();
            Ok(WindowInfo {
                id: fields[0].to_string(),
                index: parse_index(fields[1], line)?,
                name: fields[2].to_string(),
                active: fields[3] == "1",
                attributes: attrs,
            })
        })
        .collect()
}

/// Parse `list-panes -s` output produced with the pane format
pub fn parse_panes(output: &str) -> Result<Vec<PaneInfo>> {
    output
        .lines()
        .filter(|l| !l.is_empty())
        .map(|line| {
            let fields: Vec<&str> = line.split(SEP).collect();
            if fields.len() != 6 {
                return Err(PanoramaError::mux(format!("unexpected pane line: {:?}", line)));
            }
            Ok(PaneInfo {
                id: fields[0].to_string(),
                window_id: fields[1].to_string(),
                index: parse_index(fields[2], line)?,
                title: fields[3].to_string(),
                command: fields[4].to_string(),
                active: fields[5] == "1",
            })
        })
        .collect()
}

/// Parse `display-message -p` output produced with the focus format
pub fn parse_focus(output: &str) -> Result<Focus> {
    let line = output.trim_end_matches('\n');
    let (window_id, pane_id) = line
        .split_once(SEP)
        .ok_or_else(|| PanoramaError::mux(format!("unexpected focus line: {:?}", line)))?;
    if window_id.is_empty() || pane_id.is_empty() {
        return Err(PanoramaError::mux("session has no focused pane"));
    }
    Ok(Focus {
        window_id: window_id.to_string(),
        pane_id: pane_id.to_string(),
    })
}

fn parse_index(field: &str, line: &str) -> Result<u32> {
    field
        .parse()
        .map_err(|_| PanoramaError::mux(format!("bad index in {:?}", line)))
}

#[async_trait]
impl Multiplexer for TmuxCli {
    async fn snapshot(&self) -> Result<SessionSnapshot> {
        let window_format = self.window_format();
        let windows = self
            .run(&["list-windows", "-t", &self.session, "-F", &window_format])
            .await?;
        let panes = self
            .run(&["list-panes", "-s", "-t", &self.session, "-F", PANE_FORMAT])
            .await?;
        Ok(SessionSnapshot {
            windows: parse_windows(&windows, &self.attributes)?,
            panes: parse_panes(&panes)?,
        })
    }

    async fn focus(&self) -> Result<Focus> {
        let out = self
            .run(&["display-message", "-p", "-t", &self.session, FOCUS_FORMAT])
            .await?;
        parse_focus(&out)
    }

    async fn capture_pane(&self, pane_id: &str) -> Result<Vec<u8>> {
        self.run_raw(&["capture-pane", "-p", "-e", "-t", pane_id])
            .await
    }

    async fn select_window(&self, window_id: &str) -> Result<()> {
        self.run(&["select-window", "-t", window_id]).await.map(drop)
    }

    async fn select_pane(&self, pane_id: &str) -> Result<()> {
        self.run(&["select-pane", "-t", pane_id]).await.map(drop)
    }

    async fn new_window(&self) -> Result<()> {
        let target = format!("{}:", self.session);
        self.run(&["new-window", "-t", &target]).await.map(drop)
    }

    async fn split_pane(&self, pane_id: &str, direction: SplitDirection) -> Result<()> {
        let flag = match direction {
            SplitDirection::Horizontal => "-h",
            SplitDirection::Vertical => "-v",
        };
        self.run(&["split-window", flag, "-t", pane_id]).await.map(drop)
    }

    async fn rename_window(&self, window_id: &str, name: &str) -> Result<()> {
        self.run(&["rename-window", "-t", window_id, name])
            .await
            .map(drop)
    }

    async fn kill_window(&self, window_id: &str) -> Result<()> {
        self.run(&["kill-window", "-t", window_id]).await.map(drop)
    }

    async fn kill_pane(&self, pane_id: &str) -> Result<()> {
        self.run(&["kill-pane", "-t", pane_id]).await.map(drop)
    }

    async fn set_option(&self, target: &str, key: &str, value: &str) -> Result<()> {
        let scope = option_scope(target);
        let mut args = vec!["set-option", "-q"];
        if let Some(flag) = scope {
            args.push(flag);
        }
        args.extend(["-t", target, key, value]);
        self.run(&args).await.map(drop)
    }
}

/// Option scope flag implied by the target's id prefix
fn option_scope(target: &str) -> Option<&'static str> {
    match target.chars().next() {
        Some('@') => Some("-w"),
        Some('%') => Some("-p"),
        _ => None,
    }
}
