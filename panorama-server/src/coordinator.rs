//! Coordinator state and render push
//!
//! Renders are produced under one async lock so that a frame computed from
//! an older snapshot can never be numbered after a frame computed from a
//! newer one.

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use panorama_mux::{Focus, Multiplexer, SessionSnapshot};
use panorama_utils::Result;

use crate::config::CoordinatorConfig;
use crate::registry::{Delivery, SubscriberRegistry};
use crate::render::{Renderer, ViewContext};

/// Session state the last push was rendered from
#[derive(Debug, Clone, Default, PartialEq)]
struct RenderedState {
    snapshot: SessionSnapshot,
    focus: Option<Focus>,
}

/// Shared coordinator state
pub struct Coordinator {
    mux: Arc<dyn Multiplexer>,
    registry: Arc<SubscriberRegistry>,
    renderer: Arc<dyn Renderer>,
    config: Arc<CoordinatorConfig>,
    last_rendered: Mutex<Option<RenderedState>>,
}

impl Coordinator {
    pub fn new(
        mux: Arc<dyn Multiplexer>,
        renderer: Arc<dyn Renderer>,
        config: CoordinatorConfig,
    ) -> Self {
        Self {
            mux,
            registry: Arc::new(SubscriberRegistry::new()),
            renderer,
            config: Arc::new(config),
            last_rendered: Mutex::new(None),
        }
    }

    pub fn mux(&self) -> &Arc<dyn Multiplexer> {
        &self.mux
    }

    pub fn registry(&self) -> &Arc<SubscriberRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    async fn current_state(&self) -> Result<RenderedState> {
        let snapshot = self.mux.snapshot().await?;
        let focus = match self.mux.focus().await {
            Ok(focus) => Some(focus),
            Err(e) => {
                debug!(error = %e, "no focus information");
                None
            }
        };
        Ok(RenderedState { snapshot, focus })
    }

    fn render_and_deliver(&self, client_id: &str, state: &RenderedState) -> Delivery {
        let Some(view) = self.registry.view(client_id) else {
            return Delivery::UnknownSubscriber;
        };
        let ctx = ViewContext {
            width: view.width,
            height: view.height,
            color_profile: view.color_profile,
            window_id: view.window_id.as_deref(),
            focus: state.focus.as_ref(),
            group_attribute: &self.config.group_attribute,
        };
        let frame = self
            .renderer
            .render(&state.snapshot, &ctx)
            .into_payload(view.width, view.height);
        let delivery = self.registry.deliver(client_id, frame);
        trace!(client_id, ?delivery, "render pushed");
        delivery
    }

    /// Push a fresh frame to one subscriber
    pub async fn push_to(&self, client_id: &str) -> Result<()> {
        let mut last = self.last_rendered.lock().await;
        let state = self.current_state().await?;
        self.render_and_deliver(client_id, &state);
        *last = Some(state);
        Ok(())
    }

    /// Push a fresh frame to every subscriber
    pub async fn push_all(&self) -> Result<()> {
        let mut last = self.last_rendered.lock().await;
        let state = self.current_state().await?;
        self.push_state(&state);
        *last = Some(state);
        Ok(())
    }

    fn push_state(&self, state: &RenderedState) {
        for client_id in self.registry.client_ids() {
            self.render_and_deliver(&client_id, state);
        }
    }

    /// Poll the session once; push to everyone when it changed.
    ///
    /// Returns whether a push happened.
    pub async fn refresh(&self) -> Result<bool> {
        if self.registry.is_empty() {
            return Ok(false);
        }
        let mut last = self.last_rendered.lock().await;
        let state = self.current_state().await?;
        if last.as_ref() == Some(&state) {
            return Ok(false);
        }
        self.push_state(&state);
        *last = Some(state);
        Ok(true)
    }

    /// Periodic refresh until cancelled
    pub async fn run_refresh(self: Arc<Self>, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.config.refresh_interval());
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!(interval_ms = self.config.refresh_interval_ms, "refresh loop started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("refresh loop cancelled");
                    break;
                }
                _ = interval.tick() => {
                    if let Err(e) = self.refresh().await {
                        warn!(error = %e, "session refresh failed");
                    }
                }
            }
        }
    }
}
