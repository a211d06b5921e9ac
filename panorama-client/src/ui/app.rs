//! Main application loop
//!
//! One task drives everything: terminal events, coordinator messages, the
//! keep-alive timer, the link's retry timers and quit signals all meet in a
//! single `select!`.

use crossterm::event::EventStream;
use futures::StreamExt;
use tokio::signal::unix::{signal, SignalKind};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace, warn};

use panorama_protocol::{
    InputPayload, InputType, Payload, ResizePayload, ViewportPayload,
};
use panorama_utils::Result;

use crate::config::ClientConfig;
use crate::connection::{Link, LinkEvent, LinkStatus};
use crate::input::{translate, Command};

use super::render;
use super::state::{MenuClick, ViewState};
use super::terminal::Terminal;

/// What the loop does after handling one event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Idle,
    Redraw,
    Quit,
}

pub struct App {
    config: ClientConfig,
    link: Link,
    view: ViewState,
}

impl App {
    pub fn new(config: ClientConfig, link: Link) -> Self {
        Self {
            config,
            link,
            view: ViewState::new(0, 0),
        }
    }

    pub async fn run(mut self) -> Result<()> {
        let mut terminal = Terminal::new()?;
        let (width, height) = terminal.size()?;
        self.view.resize(width, height);
        self.link.set_size(width, height);

        let mut events = EventStream::new();
        let mut ping = tokio::time::interval(self.config.ping_interval());
        ping.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sighup = signal(SignalKind::hangup())?;

        self.draw(&mut terminal)?;

        loop {
            let flow = tokio::select! {
                event = events.next() => match event {
                    Some(Ok(event)) => {
                        let command = translate(&event, self.view.menu_open(), self.config.scroll_lines);
                        self.handle_command(command).await
                    }
                    Some(Err(e)) => {
                        warn!("terminal event error: {}", e);
                        Flow::Quit
                    }
                    None => Flow::Quit,
                },

                event = self.link.next_event() => self.handle_link_event(event),

                _ = ping.tick(), if self.link.is_connected() => {
                    self.send(Payload::Ping).await;
                    Flow::Idle
                }

                _ = sigint.recv() => Flow::Quit,
                _ = sigterm.recv() => Flow::Quit,
                _ = sighup.recv() => Flow::Quit,
            };

            match flow {
                Flow::Idle => {}
                Flow::Redraw => self.draw(&mut terminal)?,
                Flow::Quit => break,
            }
        }

        info!("render client quitting");
        self.link.close().await;
        drop(terminal);
        Ok(())
    }

    fn draw(&self, terminal: &mut Terminal) -> Result<()> {
        let status = self.link.status();
        terminal
            .terminal_mut()
            .draw(|frame| render::draw(frame, &self.view, status))?;
        Ok(())
    }

    /// Send best-effort; a failure surfaces as a link status change
    async fn send(&self, payload: Payload) {
        if let Err(e) = self.link.send(payload).await {
            debug!(error = %e, "send skipped");
        }
    }

    fn handle_link_event(&mut self, event: LinkEvent) -> Flow {
        match event {
            LinkEvent::Status(LinkStatus::Disconnected) => {
                self.view.invalidate();
                Flow::Redraw
            }
            LinkEvent::Status(_) => Flow::Redraw,
            LinkEvent::Message(msg) => match msg.payload {
                Payload::Render(frame) => {
                    if self.view.apply_render(frame) {
                        Flow::Redraw
                    } else {
                        trace!("stale frame ignored");
                        Flow::Idle
                    }
                }
                Payload::Menu(menu) => {
                    self.view.open_menu(menu);
                    Flow::Redraw
                }
                _ => Flow::Idle,
            },
        }
    }

    async fn handle_command(&mut self, command: Command) -> Flow {
        match command {
            Command::Quit => Flow::Quit,
            Command::Retry => {
                if self.link.retry_now() {
                    Flow::Redraw
                } else {
                    self.send_key("r").await;
                    Flow::Idle
                }
            }
            Command::Resize { width, height } => {
                self.view.resize(width, height);
                if self.link.set_size(width, height) {
                    self.send(Payload::Resize(ResizePayload { width, height }))
                        .await;
                }
                Flow::Redraw
            }
            Command::Scroll(scroll) => match self.view.scroll(scroll) {
                Some(viewport_offset) => {
                    self.send(Payload::ViewportUpdate(ViewportPayload { viewport_offset }))
                        .await;
                    Flow::Redraw
                }
                None => Flow::Idle,
            },
            Command::Click { row, col, button } => {
                if self.view.menu_open() {
                    return match self.view.menu_click(row, col) {
                        MenuClick::Select(selection) => {
                            self.send(Payload::MenuSelect(selection)).await;
                            Flow::Redraw
                        }
                        MenuClick::Dismiss => Flow::Redraw,
                        MenuClick::Ignore => Flow::Idle,
                    };
                }
                let input = self.view.click(row, col, button);
                debug!(
                    line = input.y,
                    action = ?input.resolved_action,
                    "click"
                );
                self.send(Payload::Input(input)).await;
                Flow::Idle
            }
            Command::Key(name) => {
                self.send_key(&name).await;
                Flow::Idle
            }
            Command::MenuUp => {
                self.view.menu_move(-1);
                Flow::Redraw
            }
            Command::MenuDown => {
                self.view.menu_move(1);
                Flow::Redraw
            }
            Command::MenuConfirm => {
                if let Some(selection) = self.view.confirm_menu() {
                    self.send(Payload::MenuSelect(selection)).await;
                }
                Flow::Redraw
            }
            Command::MenuCancel => {
                self.view.close_menu();
                Flow::Redraw
            }
            Command::Ignore => Flow::Idle,
        }
    }

    async fn send_key(&self, key: &str) {
        if !self.link.is_connected() {
            return;
        }
        self.send(Payload::Input(InputPayload {
            sequence_number: self.view.last_sequence(),
            input_type: InputType::Key,
            key: Some(key.to_string()),
            ..Default::default()
        }))
        .await;
    }
}
