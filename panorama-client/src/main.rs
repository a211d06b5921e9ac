//! panorama - sidebar render client
//!
//! Connects to the session's coordinator, draws the frames it pushes and
//! reports clicks, scrolling and keys back.

use panorama_protocol::SubscribePayload;
use panorama_utils::{init_logging_with_config, socket_path_for_session, LogConfig, Result};
use uuid::Uuid;

mod cli;
mod config;
mod connection;
mod detect;
mod input;
mod ui;

use cli::Args;
use config::ClientConfig;
use connection::Link;
use ui::App;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse_args();

    // The TUI owns the terminal, so logs go to a file
    init_logging_with_config(LogConfig::client())?;
    ui::install_panic_hook();
    tracing::info!("panorama client starting");

    match run_app(args).await {
        Ok(()) => {
            tracing::info!("panorama client exiting normally");
            Ok(())
        }
        Err(e) => {
            tracing::error!("panorama client error: {}", e);
            eprintln!("Error: {}", e);
            Err(e)
        }
    }
}

async fn run_app(args: Args) -> Result<()> {
    let config = ClientConfig::load(args.config.as_deref())?;

    let socket = match args.socket {
        Some(path) => path,
        None => {
            let session = match args.session {
                Some(session) => session,
                None => panorama_mux::TmuxCli::current_session().await?,
            };
            socket_path_for_session(&session)
        }
    };

    let subscribe = SubscribePayload {
        width: 0,
        height: 0,
        color_profile: detect::color_profile_from_env(),
        window_id: detect::window_id(args.window).await,
    };
    let client_id = format!("panorama-{}", Uuid::new_v4());
    tracing::debug!(%client_id, socket = %socket.display(), ?subscribe, "subscribing");

    let link = Link::new(socket, client_id, subscribe, &config);
    App::new(config, link).run().await
}
