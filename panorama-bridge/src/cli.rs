//! Command-line argument parsing for the bridge

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

/// panorama-bridge - mirror a tmux session to browsers and remote clients
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// tmux session to mirror (default: the session this process runs in)
    #[arg(long, short = 's', env = "PANORAMA_SESSION")]
    pub session: Option<String>,

    /// Coordinator socket for sidebar links
    ///
    /// Overrides the per-session socket under the runtime directory.
    #[arg(long, short = 'S')]
    pub socket: Option<PathBuf>,

    /// Listen address (must be loopback)
    #[arg(long, short = 'l')]
    pub listen: Option<SocketAddr>,

    /// Config file (default: $XDG_CONFIG_HOME/panorama/config.toml)
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,

    /// tmux binary
    #[arg(long, default_value = "tmux")]
    pub tmux: PathBuf,

    /// Run without sidebar links
    #[arg(long, default_value_t = false)]
    pub no_sidebar: bool,

    /// Log verbosely to stderr instead of the log file
    #[arg(long, default_value_t = false)]
    pub verbose: bool,
}
