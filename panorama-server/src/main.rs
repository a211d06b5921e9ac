//! panorama-server - sidebar coordinator daemon

use std::sync::Arc;

use clap::Parser;
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use panorama_mux::TmuxCli;
use panorama_server::cli::Args;
use panorama_server::config::ConfigLoader;
use panorama_server::{listener, Coordinator, PlainRenderer};
use panorama_utils::{socket_path_for_session, LogConfig, Result};

/// Cancel `token` on SIGINT, SIGTERM or SIGHUP
fn spawn_signal_handler(token: CancellationToken) -> Result<()> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sighup = signal(SignalKind::hangup())?;
    tokio::spawn(async move {
        tokio::select! {
            _ = sigint.recv() => info!("SIGINT received"),
            _ = sigterm.recv() => info!("SIGTERM received"),
            _ = sighup.recv() => info!("SIGHUP received"),
        }
        token.cancel();
    });
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_config = if args.verbose {
        LogConfig::development()
    } else {
        LogConfig::coordinator()
    };
    panorama_utils::init_logging_with_config(log_config)?;

    let config = ConfigLoader::load_and_validate(args.config.as_deref())?;

    let session = match args.session {
        Some(session) => session,
        None => TmuxCli::current_session().await?,
    };
    let socket_path = args
        .socket
        .unwrap_or_else(|| socket_path_for_session(&session));

    let mux = TmuxCli::new(&session).with_attributes(vec![config.group_attribute.clone()]);
    let coordinator = Arc::new(Coordinator::new(
        Arc::new(mux),
        Arc::new(PlainRenderer::new()),
        config,
    ));

    let listener = listener::bind_socket(&socket_path).await?;
    info!(%session, socket = %socket_path.display(), "coordinator starting");

    let cancel = CancellationToken::new();
    spawn_signal_handler(cancel.clone())?;

    let refresh = tokio::spawn(Arc::clone(&coordinator).run_refresh(cancel.clone()));
    listener::run_accept_loop(listener, coordinator, cancel).await;

    if let Err(e) = refresh.await {
        warn!(error = %e, "refresh task ended abnormally");
    }
    if let Err(e) = std::fs::remove_file(&socket_path) {
        warn!(error = %e, "failed to remove socket file");
    }
    info!("coordinator stopped");
    Ok(())
}
