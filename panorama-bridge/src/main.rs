//! panorama-bridge - raw-output bridge daemon

use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use panorama_bridge::auth::{self, Credentials};
use panorama_bridge::cli::Args;
use panorama_bridge::config::ConfigLoader;
use panorama_bridge::control::ControlLineCodec;
use panorama_bridge::fanout::run_output_pump;
use panorama_bridge::{pairing, server};
use panorama_bridge::{BridgeState, ClientRegistry, ControlSession, PaneIo, Reconciler};
use panorama_mux::{Multiplexer, TmuxCli};
use panorama_utils::{socket_path_for_session, token_file, LogConfig, Result};

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
            _ = token.cancelled() => return,
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
        LogConfig::bridge()
    };
    panorama_utils::init_logging_with_config(log_config)?;

    let mut config = ConfigLoader::load_and_validate(args.config.as_deref())?;
    if let Some(listen) = args.listen {
        config.listen = listen;
        ConfigLoader::validate(&config)?;
    }

    let session = match args.session {
        Some(session) => session,
        None => TmuxCli::current_session().await?,
    };
    let coordinator_socket = if args.no_sidebar {
        None
    } else {
        Some(
            args.socket
                .unwrap_or_else(|| socket_path_for_session(&session)),
        )
    };

    let token = auth::load_or_create_token(&token_file())?;
    let credentials = Credentials::new(token.clone(), config.basic_credentials());
    let connect_url = pairing::connect_url(
        config.public_url.as_deref(),
        &config.listen.to_string(),
        &token,
    )?;

    let listener = TcpListener::bind(config.listen).await?;

    let codec = ControlLineCodec::new(config.initial_line_bytes, config.max_line_bytes);
    let (control, events) = ControlSession::spawn(&args.tmux, &session, codec)?;
    let control = Arc::new(control);
    let mux: Arc<dyn Multiplexer> = Arc::new(TmuxCli::new(&session).with_binary(&args.tmux));

    let registry = Arc::new(ClientRegistry::new(config.write_timeout()));
    let reconciler = Reconciler::new(
        Arc::clone(&registry),
        mux,
        Arc::clone(&control) as Arc<dyn PaneIo>,
        config.quiet_threshold(),
    );

    let cancel = CancellationToken::new();
    spawn_signal_handler(cancel.clone())?;

    let focus_hint = Arc::new(Notify::new());
    let pump = tokio::spawn(run_output_pump(
        events,
        Arc::clone(&registry),
        Arc::clone(&focus_hint),
        cancel.clone(),
    ));
    let reconcile = tokio::spawn(reconciler.clone().run(
        config.reconcile_interval(),
        focus_hint,
        cancel.clone(),
    ));

    info!(%session, listen = %config.listen, "bridge starting");
    println!(
        "panorama-bridge: mirroring '{}' on http://{}/ (pair at http://{}/connect)",
        session, config.listen, config.listen
    );

    let state = BridgeState {
        registry,
        reconciler,
        panes: Arc::clone(&control) as Arc<dyn PaneIo>,
        credentials: Arc::new(credentials),
        coordinator_socket,
        connect_url,
        cancel: cancel.clone(),
    };
    let served = server::serve(listener, state).await;

    cancel.cancel();
    let pumped = match pump.await {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!(task = "output pump", error = %e, "task ended abnormally");
            Ok(())
        }
    };
    if let Err(e) = reconcile.await {
        warn!(task = "reconciler", error = %e, "task ended abnormally");
    }
    control.shutdown().await;
    info!("bridge stopped");

    // A failed control session needs an external restart
    pumped?;
    served
}
