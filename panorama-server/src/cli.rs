//! Command-line argument parsing for the coordinator

use std::path::PathBuf;

use clap::Parser;

/// panorama-server - sidebar coordinator for a tmux session
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// tmux session to serve (default: the session this process runs in)
    #[arg(long, short = 's', env = "PANORAMA_SESSION")]
    pub session: Option<String>,

    /// Custom socket path
    ///
    /// Overrides the per-session socket under the runtime directory.
    #[arg(long, short = 'S')]
    pub socket: Option<PathBuf>,

    /// Config file (default: $XDG_CONFIG_HOME/panorama/config.toml)
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,

    /// Log verbosely to stderr instead of the log file
    #[arg(long, default_value_t = false)]
    pub verbose: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_args() {
        let args = Args::parse_from(["panorama-server"]);
        assert!(args.socket.is_none());
        assert!(args.config.is_none());
        assert!(!args.verbose);
    }

    #[test]
    fn test_overrides() {
        let args = Args::parse_from([
            "panorama-server",
            "--session",
            "work",
            "-S",
            "/tmp/p.sock",
            "--config",
            "/tmp/c.toml",
        ]);
        assert_eq!(args.session.as_deref(), Some("work"));
        assert_eq!(args.socket, Some(PathBuf::from("/tmp/p.sock")));
        assert_eq!(args.config, Some(PathBuf::from("/tmp/c.toml")));
    }
}
