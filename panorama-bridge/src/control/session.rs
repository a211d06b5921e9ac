//! The control-mode client process
//!
//! Commands go out on stdin one per line. tmux answers each with a
//! `%begin`/`%end` block in the order the commands were sent, so replies are
//! matched to waiters first in, first out.

use std::collections::VecDeque;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};
use tokio_util::codec::FramedRead;
use tracing::{debug, error, info, warn};

use super::parser::{ControlEvent, ControlParser};
use super::{ControlError, ControlLineCodec};

/// Bytes per `send-keys -H` command
const INPUT_CHUNK: usize = 256;

/// Queue between the reader task and the output pump
const EVENT_QUEUE: usize = 1024;

type Reply = Result<Vec<String>, ControlError>;

/// Pane I/O the fan-out server needs
#[async_trait]
pub trait PaneIo: Send + Sync {
    /// Write raw input bytes to a pane
    async fn send_input(&self, pane_id: &str, data: &[u8]) -> Result<(), ControlError>;

    /// Size the control client's view of the session
    async fn resize(&self, cols: u16, rows: u16) -> Result<(), ControlError>;

    /// Visible screen of a pane with escape sequences, lines joined by `\n`
    async fn capture(&self, pane_id: &str) -> Result<Vec<u8>, ControlError>;
}

#[derive(Default)]
struct Pending {
    waiters: VecDeque<oneshot::Sender<Reply>>,
    ended: bool,
}

/// A running `tmux -C` client
pub struct ControlSession {
    writer: tokio::sync::Mutex<Box<dyn AsyncWrite + Send + Unpin>>,
    pending: Arc<Mutex<Pending>>,
    child: Mutex<Option<Child>>,
}

impl ControlSession {
    /// Attach a control client to `session`.
    ///
    /// The returned receiver yields pane output and focus hints, then one
    /// final [`ControlEvent::Exit`] when the session ends for any reason.
    pub fn spawn(
        tmux_bin: &Path,
        session: &str,
        codec: ControlLineCodec,
    ) -> Result<(Self, mpsc::Receiver<ControlEvent>), ControlError> {
        let mut child = Command::new(tmux_bin)
            .args(["-C", "attach-session", "-t", session])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;
        let stdin = child.stdin.take().ok_or(ControlError::SessionEnded)?;
        let stdout = child.stdout.take().ok_or(ControlError::SessionEnded)?;
        info!(%session, pid = ?child.id(), "control session started");

        // The attach itself is answered with a %begin/%end block
        let (control, events) = Self::from_io(stdout, stdin, codec, 1);
        *control.child.lock() = Some(child);
        Ok((control, events))
    }

    /// Run over arbitrary pipes.
    ///
    /// `unsolicited_replies` replies are discarded before matching starts.
    pub fn from_io<R, W>(
        reader: R,
        writer: W,
        codec: ControlLineCodec,
        unsolicited_replies: usize,
    ) -> (Self, mpsc::Receiver<ControlEvent>)
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let pending = Arc::new(Mutex::new(Pending::default()));
        let (tx, rx) = mpsc::channel(EVENT_QUEUE);
        tokio::spawn(read_loop(
            reader,
            codec,
            Arc::clone(&pending),
            tx,
            unsolicited_replies,
        ));
        let control = Self {
            writer: tokio::sync::Mutex::new(Box::new(writer)),
            pending,
            child: Mutex::new(None),
        };
        (control, rx)
    }

    /// Run one command and wait for its reply body
    pub async fn command(&self, command: &str) -> Reply {
        let (tx, rx) = oneshot::channel();
        {
            let mut writer = self.writer.lock().await;
            {
                let mut pending = self.pending.lock();
                if pending.ended {
                    return Err(ControlError::SessionEnded);
                }
                pending.waiters.push_back(tx);
            }
            debug!(%command, "control command");
            let written = async {
                writer.write_all(command.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                writer.flush().await
            }
            .await;
            if let Err(e) = written {
                // Replies can no longer be matched to commands
                error!(%command, error = %e, "control session write failed");
                let mut pending = self.pending.lock();
                pending.ended = true;
                pending.waiters.clear();
                return Err(ControlError::Io(e));
            }
        }
        rx.await.map_err(|_| ControlError::SessionEnded)?
    }

    /// Kill the child process, if this session owns one
    pub async fn shutdown(&self) {
        let child = self.child.lock().take();
        if let Some(mut child) = child {
            if let Err(e) = child.kill().await {
                warn!(error = %e, "failed to kill control session");
            } else {
                info!("control session stopped");
            }
        }
    }
}

#[async_trait]
impl PaneIo for ControlSession {
    async fn send_input(&self, pane_id: &str, data: &[u8]) -> Result<(), ControlError> {
        for chunk in data.chunks(INPUT_CHUNK) {
            let hex: Vec<String> = chunk.iter().map(|b| format!("{:02x}", b)).collect();
            self.command(&format!("send-keys -t {} -H {}", pane_id, hex.join(" ")))
                .await?;
        }
        Ok(())
    }

    async fn resize(&self, cols: u16, rows: u16) -> Result<(), ControlError> {
        self.command(&format!("refresh-client -C {}x{}", cols, rows))
            .await
            .map(|_| ())
    }

    async fn capture(&self, pane_id: &str) -> Result<Vec<u8>, ControlError> {
        let lines = self
            .command(&format!("capture-pane -p -e -t {}", pane_id))
            .await?;
        Ok(lines.join("\n").into_bytes())
    }
}

async fn read_loop<R>(
    reader: R,
    codec: ControlLineCodec,
    pending: Arc<Mutex<Pending>>,
    events: mpsc::Sender<ControlEvent>,
    mut unsolicited: usize,
) where
    R: AsyncRead + Unpin,
{
    let capacity = codec.initial_capacity();
    let mut lines = FramedRead::with_capacity(reader, codec, capacity);
    let mut parser = ControlParser::new();

    let reason = loop {
        let line = match lines.next().await {
            Some(Ok(line)) => line,
            Some(Err(e)) => {
                error!(error = %e, "control session failed");
                break Some(e.to_string());
            }
            None => break None,
        };

        match parser.feed(&line) {
            Some(ControlEvent::Reply(result)) => {
                if unsolicited > 0 {
                    unsolicited -= 1;
                    continue;
                }
                let waiter = pending.lock().waiters.pop_front();
                match waiter {
                    Some(waiter) => {
                        let _ = waiter.send(result.map_err(ControlError::CommandFailed));
                    }
                    None => debug!("reply without a waiting command"),
                }
            }
            Some(ControlEvent::Exit(reason)) => {
                info!(?reason, "control session exited");
                break reason;
            }
            Some(event) => {
                if events.send(event).await.is_err() {
                    debug!("control event receiver dropped");
                    break None;
                }
            }
            None => {}
        }
    };

    {
        let mut pending = pending.lock();
        pending.ended = true;
        // Dropping the senders fails every waiter with SessionEnded
        pending.waiters.clear();
    }
    let _ = events.send(ControlEvent::Exit(reason)).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, AsyncBufReadExt, BufReader, DuplexStream};

    struct FakeTmux {
        /// What tmux prints
        out: DuplexStream,
        /// What tmux reads
        commands: tokio::io::Lines<BufReader<DuplexStream>>,
    }

    fn session(max: usize, unsolicited: usize) -> (ControlSession, mpsc::Receiver<ControlEvent>, FakeTmux) {
        let (tmux_out, bridge_in) = duplex(64 * 1024);
        let (bridge_out, tmux_in) = duplex(64 * 1024);
        let (control, events) =
            ControlSession::from_io(bridge_in, bridge_out, ControlLineCodec::new(16, max), unsolicited);
        let fake = FakeTmux {
            out: tmux_out,
            commands: BufReader::new(tmux_in).lines(),
        };
        (control, events, fake)
    }

    impl FakeTmux {
        async fn print(&mut self, text: &str) {
            self.out.write_all(text.as_bytes()).await.unwrap();
        }

        async fn next_command(&mut self) -> String {
            self.commands.next_line().await.unwrap().unwrap()
        }

        async fn reply(&mut self, number: u32, body: &str) {
            let text = format!("%begin 100 {n} 1\n{body}%end 100 {n} 1\n", n = number, body = body);
            self.print(&text).await;
        }
    }

    // ==================== Output ====================

    #[tokio::test]
    async fn test_output_events_are_forwarded() {
        let (_control, mut events, mut tmux) = session(1024, 0);
        tmux.print("%output %1 hello\\015\\012\n%window-pane-changed @1 %2\n").await;

        assert_eq!(
            events.recv().await.unwrap(),
            ControlEvent::Output {
                pane_id: "%1".into(),
                data: b"hello\r\n".to_vec()
            }
        );
        assert_eq!(events.recv().await.unwrap(), ControlEvent::FocusHint);
    }

    // ==================== Commands ====================

    #[tokio::test]
    async fn test_replies_resolve_in_fifo_order() {
        let (control, _events, mut tmux) = session(1024, 1);
        let control = Arc::new(control);

        // The attach reply arrives before any command
        tmux.reply(0, "").await;

        let first = tokio::spawn({
            let control = Arc::clone(&control);
            async move { control.command("display-message -p one").await }
        });
        assert_eq!(tmux.next_command().await, "display-message -p one");
        let second = tokio::spawn({
            let control = Arc::clone(&control);
            async move { control.command("display-message -p two").await }
        });
        assert_eq!(tmux.next_command().await, "display-message -p two");

        tmux.reply(1, "one\n").await;
        tmux.reply(2, "two\n").await;

        assert_eq!(first.await.unwrap().unwrap(), vec!["one".to_string()]);
        assert_eq!(second.await.unwrap().unwrap(), vec!["two".to_string()]);
    }

    #[tokio::test]
    async fn test_failed_write_ends_session() {
        let (control, _events, tmux) = session(1024, 0);
        let FakeTmux { out: _out, commands } = tmux;
        drop(commands);

        assert!(matches!(
            control.command("display-message -p one").await,
            Err(ControlError::Io(_))
        ));
        assert!(matches!(
            control.command("display-message -p two").await,
            Err(ControlError::SessionEnded)
        ));
    }

    #[tokio::test]
    async fn test_error_reply_is_command_failed() {
        let (control, _events, mut tmux) = session(1024, 0);
        let control = Arc::new(control);
        let call = tokio::spawn({
            let control = Arc::clone(&control);
            async move { control.capture("%9").await }
        });
        assert_eq!(tmux.next_command().await, "capture-pane -p -e -t %9");
        tmux.print("%begin 1 1 1\ncan't find pane: %9\n%error 1 1 1\n").await;

        match call.await.unwrap() {
            Err(ControlError::CommandFailed(msg)) => assert!(msg.contains("%9")),
            other => panic!("expected CommandFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_send_input_resize_and_capture_commands() {
        let (control, _events, mut tmux) = session(1024, 0);
        let control = Arc::new(control);

        let call = tokio::spawn({
            let control = Arc::clone(&control);
            async move {
                control.send_input("%1", b"ls\r").await.unwrap();
                control.resize(120, 40).await.unwrap();
                control.capture("%1").await.unwrap()
            }
        });

        assert_eq!(tmux.next_command().await, "send-keys -t %1 -H 6c 73 0d");
        tmux.reply(1, "").await;
        assert_eq!(tmux.next_command().await, "refresh-client -C 120x40");
        tmux.reply(2, "").await;
        assert_eq!(tmux.next_command().await, "capture-pane -p -e -t %1");
        tmux.reply(3, "$ ls\nfile\n").await;

        assert_eq!(call.await.unwrap(), b"$ ls\nfile".to_vec());
    }

    #[tokio::test]
    async fn test_large_input_is_chunked() {
        let (control, _events, mut tmux) = session(1024, 0);
        let control = Arc::new(control);
        let call = tokio::spawn({
            let control = Arc::clone(&control);
            async move { control.send_input("%1", &[b'a'; 300]).await }
        });

        let first = tmux.next_command().await;
        assert_eq!(first.split(' ').count(), 4 + INPUT_CHUNK);
        tmux.reply(1, "").await;
        let second = tmux.next_command().await;
        assert_eq!(second.split(' ').count(), 4 + 300 - INPUT_CHUNK);
        tmux.reply(2, "").await;
        call.await.unwrap().unwrap();
    }

    // ==================== Teardown ====================

    #[tokio::test]
    async fn test_line_too_long_ends_session() {
        let (control, mut events, mut tmux) = session(32, 0);
        let control = Arc::new(control);
        let waiting = tokio::spawn({
            let control = Arc::clone(&control);
            async move { control.command("list-windows").await }
        });
        tmux.next_command().await;

        let long = format!("%output %1 {}\n", "x".repeat(64));
        tmux.print(&long).await;

        match events.recv().await.unwrap() {
            ControlEvent::Exit(Some(reason)) => assert!(reason.contains("32 bytes")),
            other => panic!("expected exit, got {:?}", other),
        }
        assert!(matches!(
            waiting.await.unwrap(),
            Err(ControlError::SessionEnded)
        ));
        assert!(matches!(
            control.command("list-windows").await,
            Err(ControlError::SessionEnded)
        ));
    }

    #[tokio::test]
    async fn test_exit_notification_ends_session() {
        let (_control, mut events, mut tmux) = session(1024, 0);
        tmux.print("%exit detached\n").await;
        assert_eq!(
            events.recv().await.unwrap(),
            ControlEvent::Exit(Some("detached".into()))
        );
        assert!(events.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_shutdown_without_child_is_noop() {
        let (control, _events, _tmux) = session(1024, 0);
        control.shutdown().await;
    }
}
