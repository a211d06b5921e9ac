//! Input-related message handlers
//!
//! Handles: Input, MenuSelect

use tracing::{debug, info, trace, warn};

use panorama_mux::{SessionSnapshot, SplitDirection};
use panorama_protocol::{
    ButtonKind, InputPayload, InputType, MenuItem, MenuPayload, Message, Payload,
};

use super::{HandlerContext, HandlerResult};

/// Action named by a clickable region or menu item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    SelectWindow(String),
    SelectPane(String),
    NewWindow,
    Split(String, SplitDirection),
    CloseWindow(String),
    ClosePane(String),
    /// Open the context menu for a window or pane
    Menu(String),
}

impl Action {
    /// Parse a wire action; `None` for unknown actions
    pub fn parse(action: &str, target: &str) -> Option<Self> {
        let target = target.to_string();
        Some(match action {
            "select_window" => Self::SelectWindow(target),
            "select_pane" => Self::SelectPane(target),
            "new_window" => Self::NewWindow,
            "split_horizontal" => Self::Split(target, SplitDirection::Horizontal),
            "split_vertical" => Self::Split(target, SplitDirection::Vertical),
            "close_window" => Self::CloseWindow(target),
            "close_pane" => Self::ClosePane(target),
            "menu" => Self::Menu(target),
            _ => return None,
        })
    }

    /// Window or pane the action operates on
    pub fn target(&self) -> Option<&str> {
        match self {
            Self::NewWindow => None,
            Self::SelectWindow(t)
            | Self::SelectPane(t)
            | Self::Split(t, _)
            | Self::CloseWindow(t)
            | Self::ClosePane(t)
            | Self::Menu(t) => Some(t),
        }
    }
}

/// Context menu for a window or pane; `None` when the target is gone
pub fn build_menu(
    snapshot: &SessionSnapshot,
    target: &str,
    anchor_line: u32,
    anchor_col: u32,
) -> Option<MenuPayload> {
    let item = |label: &str, action: &str| MenuItem {
        label: label.into(),
        action: action.into(),
        target: target.into(),
    };

    let (title, items) = if let Some(window) = snapshot.window(target) {
        (
            format!("{}: {}", window.index, window.name),
            vec![
                item("Select", "select_window"),
                item("Split horizontal", "split_horizontal"),
                item("Split vertical", "split_vertical"),
                item("Close window", "close_window"),
            ],
        )
    } else if let Some(pane) = snapshot.pane(target) {
        (
            format!("{} {}", pane.id, pane.command),
            vec![
                item("Select", "select_pane"),
                item("Split horizontal", "split_horizontal"),
                item("Split vertical", "split_vertical"),
                item("Close pane", "close_pane"),
            ],
        )
    } else {
        return None;
    };

    Some(MenuPayload {
        title,
        items,
        anchor_line,
        anchor_col,
    })
}

/// Pane a split applies to: the pane itself, or the window's active pane
fn split_target(snapshot: &SessionSnapshot, target: &str) -> Option<String> {
    if snapshot.pane(target).is_some() {
        return Some(target.to_string());
    }
    snapshot.window(target)?;
    snapshot
        .panes_of(target)
        .find(|p| p.active)
        .or_else(|| snapshot.panes_of(target).next())
        .map(|p| p.id.clone())
}

impl HandlerContext {
    /// Handle Input message
    pub async fn handle_input(&self, client_id: &str, input: InputPayload) -> HandlerResult {
        match input.input_type {
            InputType::Key => {
                debug!(client_id, key = ?input.key, "key input has no binding");
                HandlerResult::NoResponse
            }
            InputType::Action => match (&input.resolved_action, input.is_resolved()) {
                (Some(action), true) => {
                    let target = input.resolved_target.as_deref().unwrap_or_default();
                    self.apply_action(client_id, action, target, Some((input.y, input.x)))
                        .await
                }
                _ => {
                    debug!(client_id, "action input without an action");
                    HandlerResult::NoResponse
                }
            },
            InputType::Mouse => self.handle_click(client_id, input).await,
        }
    }

    async fn handle_click(&self, client_id: &str, input: InputPayload) -> HandlerResult {
        let button = input.button.unwrap_or_default();
        if !matches!(button, ButtonKind::Left | ButtonKind::Right) {
            // Wheel scrolling is local to the client
            return HandlerResult::NoResponse;
        }

        let (action, target) = if input.is_resolved() {
            (
                input.resolved_action.clone().unwrap_or_default(),
                input.resolved_target.clone().unwrap_or_default(),
            )
        } else {
            match self.coordinator.registry().resolve_click(
                client_id,
                input.sequence_number,
                input.y,
                input.x,
            ) {
                Some(region) => (region.action, region.target),
                None => {
                    trace!(
                        client_id,
                        sequence = input.sequence_number,
                        "unresolved click ignored"
                    );
                    return HandlerResult::NoResponse;
                }
            }
        };

        if button == ButtonKind::Right {
            return match action.as_str() {
                "select_window" | "select_pane" | "menu" => {
                    self.open_menu(client_id, &target, input.y, input.x).await
                }
                _ => HandlerResult::NoResponse,
            };
        }
        self.apply_action(client_id, &action, &target, Some((input.y, input.x)))
            .await
    }

    async fn open_menu(&self, client_id: &str, target: &str, line: u32, col: u32) -> HandlerResult {
        let snapshot = match self.coordinator.mux().snapshot().await {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "snapshot for menu failed");
                return HandlerResult::NoResponse;
            }
        };
        match build_menu(&snapshot, target, line, col) {
            Some(menu) => HandlerResult::Response(Message::new(client_id, Payload::Menu(menu))),
            None => {
                info!(client_id, target, "menu target no longer exists");
                HandlerResult::NoResponse
            }
        }
    }

    /// Apply an action, vetoed when its target no longer exists
    pub async fn apply_action(
        &self,
        client_id: &str,
        action: &str,
        target: &str,
        anchor: Option<(u32, u32)>,
    ) -> HandlerResult {
        let Some(action) = Action::parse(action, target) else {
            debug!(client_id, action, "unknown action ignored");
            return HandlerResult::NoResponse;
        };

        if let Action::Menu(target) = &action {
            let (line, col) = anchor.unwrap_or_default();
            return self.open_menu(client_id, target, line, col).await;
        }

        let mux = self.coordinator.mux();
        let snapshot = match mux.snapshot().await {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "snapshot before action failed");
                return HandlerResult::NoResponse;
            }
        };
        if let Some(target) = action.target() {
            if !snapshot.contains(target) {
                info!(client_id, ?action, "action vetoed, target is gone");
                return HandlerResult::NoResponse;
            }
        }

        let result = match &action {
            Action::SelectWindow(w) => mux.select_window(w).await,
            Action::SelectPane(p) => mux.select_pane(p).await,
            Action::NewWindow => mux.new_window().await,
            Action::Split(t, direction) => match split_target(&snapshot, t) {
                Some(pane) => mux.split_pane(&pane, *direction).await,
                None => {
                    info!(client_id, target = %t, "window has no pane to split");
                    return HandlerResult::NoResponse;
                }
            },
            Action::CloseWindow(w) => mux.kill_window(w).await,
            Action::ClosePane(p) => mux.kill_pane(p).await,
            Action::Menu(_) => return HandlerResult::NoResponse,
        };

        match result {
            Ok(()) => {
                info!(client_id, ?action, "action applied");
                HandlerResult::Mutated
            }
            Err(e) => {
                warn!(client_id, ?action, error = %e, "action failed");
                HandlerResult::NoResponse
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use panorama_mux::{FakeMultiplexer, MuxCommand};
    use panorama_protocol::SubscribePayload;
    use tokio::sync::mpsc;

    use crate::config::CoordinatorConfig;
    use crate::coordinator::Coordinator;
    use crate::render::PlainRenderer;

    fn context(mux: Arc<FakeMultiplexer>) -> (HandlerContext, mpsc::Receiver<Message>) {
        let coordinator = Arc::new(Coordinator::new(
            mux,
            Arc::new(PlainRenderer::new()),
            CoordinatorConfig::default(),
        ));
        let conn = coordinator.registry().next_conn_id();
        let (tx, rx) = mpsc::channel(16);
        (HandlerContext::new(coordinator, conn, tx), rx)
    }

    fn click(sequence: u64, button: ButtonKind, line: u32) -> InputPayload {
        InputPayload {
            sequence_number: sequence,
            input_type: InputType::Mouse,
            button: Some(button),
            x: 2,
            y: line,
            ..Default::default()
        }
    }

    fn resolved(action: &str, target: &str) -> InputPayload {
        InputPayload {
            resolved_action: Some(action.into()),
            resolved_target: Some(target.into()),
            ..click(1, ButtonKind::Left, 0)
        }
    }

    async fn subscribed(ctx: &HandlerContext) {
        ctx.coordinator.registry().subscribe(
            "a",
            ctx.conn,
            ctx.sender.clone(),
            &SubscribePayload {
                width: 30,
                height: 10,
                ..Default::default()
            },
        );
        ctx.coordinator.push_to("a").await.unwrap();
    }

    // ==================== Action Parsing ====================

    #[test]
    fn test_action_parse() {
        assert_eq!(
            Action::parse("select_window", "@1"),
            Some(Action::SelectWindow("@1".into()))
        );
        assert_eq!(Action::parse("new_window", ""), Some(Action::NewWindow));
        assert_eq!(
            Action::parse("split_vertical", "%1"),
            Some(Action::Split("%1".into(), SplitDirection::Vertical))
        );
        assert_eq!(Action::parse("rename_window", "@1"), None);
        assert_eq!(Action::NewWindow.target(), None);
    }

    // ==================== Resolved Input ====================

    #[tokio::test]
    async fn test_resolved_action_is_trusted() {
        let mux = Arc::new(FakeMultiplexer::two_windows());
        let (ctx, _rx) = context(mux.clone());

        let result = ctx.handle_input("a", resolved("select_window", "@2")).await;
        assert_eq!(result, HandlerResult::Mutated);
        assert_eq!(mux.commands(), vec![MuxCommand::SelectWindow("@2".into())]);
    }

    #[tokio::test]
    async fn test_resolved_action_vetoed_when_target_gone() {
        let mux = Arc::new(FakeMultiplexer::two_windows());
        let (ctx, _rx) = context(mux.clone());

        let result = ctx.handle_input("a", resolved("close_pane", "%42")).await;
        assert_eq!(result, HandlerResult::NoResponse);
        assert!(mux.commands().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_action_ignored() {
        let mux = Arc::new(FakeMultiplexer::two_windows());
        let (ctx, _rx) = context(mux.clone());
        let result = ctx.handle_input("a", resolved("launch_rockets", "@1")).await;
        assert_eq!(result, HandlerResult::NoResponse);
        assert!(mux.commands().is_empty());
    }

    // ==================== Unresolved Clicks ====================

    #[tokio::test]
    async fn test_unresolved_click_with_current_sequence() {
        let mux = Arc::new(FakeMultiplexer::two_windows());
        let (ctx, _rx) = context(mux.clone());
        subscribed(&ctx).await;

        // Line 2 of the plain layout is window @2
        let result = ctx.handle_input("a", click(1, ButtonKind::Left, 2)).await;
        assert_eq!(result, HandlerResult::Mutated);
        assert_eq!(mux.commands(), vec![MuxCommand::SelectWindow("@2".into())]);
    }

    #[tokio::test]
    async fn test_stale_unresolved_click_ignored() {
        let mux = Arc::new(FakeMultiplexer::two_windows());
        let (ctx, _rx) = context(mux.clone());
        subscribed(&ctx).await;
        ctx.coordinator.push_to("a").await.unwrap();

        let result = ctx.handle_input("a", click(1, ButtonKind::Left, 2)).await;
        assert_eq!(result, HandlerResult::NoResponse);
        assert!(mux.commands().is_empty());
    }

    #[tokio::test]
    async fn test_pinned_click_creates_window() {
        let mux = Arc::new(FakeMultiplexer::two_windows());
        let (ctx, _rx) = context(mux.clone());
        subscribed(&ctx).await;

        // Four content lines, so line 4 is the first pinned row
        let result = ctx.handle_input("a", click(1, ButtonKind::Left, 4)).await;
        assert_eq!(result, HandlerResult::Mutated);
        assert_eq!(mux.commands(), vec![MuxCommand::NewWindow]);
    }

    #[tokio::test]
    async fn test_wheel_is_local() {
        let mux = Arc::new(FakeMultiplexer::two_windows());
        let (ctx, _rx) = context(mux.clone());
        subscribed(&ctx).await;
        let result = ctx.handle_input("a", click(1, ButtonKind::WheelDown, 0)).await;
        assert_eq!(result, HandlerResult::NoResponse);
    }

    // ==================== Menus ====================

    #[tokio::test]
    async fn test_right_click_opens_menu() {
        let mux = Arc::new(FakeMultiplexer::two_windows());
        let (ctx, _rx) = context(mux.clone());
        subscribed(&ctx).await;

        let result = ctx.handle_input("a", click(1, ButtonKind::Right, 1)).await;
        match result {
            HandlerResult::Response(msg) => match msg.payload {
                Payload::Menu(menu) => {
                    assert_eq!(menu.anchor_line, 1);
                    assert_eq!(menu.items.len(), 4);
                    assert!(menu.items.iter().all(|i| i.target == "%1"));
                    assert_eq!(menu.items[3].action, "close_pane");
                }
                other => panic!("expected menu, got {:?}", other),
            },
            other => panic!("expected response, got {:?}", other),
        }
        assert!(mux.commands().is_empty());
    }

    #[tokio::test]
    async fn test_menu_select_applies_action() {
        let mux = Arc::new(FakeMultiplexer::two_windows());
        let (ctx, _rx) = context(mux.clone());

        let select = Message::new(
            "a",
            Payload::MenuSelect(panorama_protocol::MenuSelectPayload {
                action: "split_horizontal".into(),
                target: "@2".into(),
            }),
        );
        assert_eq!(ctx.route_message(select).await, HandlerResult::Mutated);
        assert_eq!(
            mux.commands(),
            vec![MuxCommand::SplitPane("%2".into(), SplitDirection::Horizontal)]
        );
    }

    #[test]
    fn test_build_menu_for_missing_target() {
        let snapshot = SessionSnapshot::default();
        assert!(build_menu(&snapshot, "@1", 0, 0).is_none());
    }
}
