//! Command-line argument parsing for the render client

use std::path::PathBuf;

use clap::Parser;

/// panorama - clickable sidebar for a tmux session
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// tmux session whose coordinator to join (default: the current session)
    #[arg(long, short = 's', env = "PANORAMA_SESSION")]
    pub session: Option<String>,

    /// Coordinator socket path
    ///
    /// Overrides the per-session socket under the runtime directory.
    #[arg(long, short = 'S')]
    pub socket: Option<PathBuf>,

    /// Window to render for (default: the window holding $TMUX_PANE)
    #[arg(long, short = 'w')]
    pub window: Option<String>,

    /// Config file (default: $XDG_CONFIG_HOME/panorama/config.toml)
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,
}

impl Args {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
