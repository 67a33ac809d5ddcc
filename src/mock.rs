//! Scripted mock shell for testing without a real bastion.
//!
//! [`MockShell`] implements `AsyncRead`/`AsyncWrite` over shared state: it
//! emits an initial banner, then answers written keystrokes according to a
//! script of input/response steps. Pending reads are woken when a write
//! triggers a response, so driver code runs against it exactly as it would
//! against a live channel.

use std::collections::VecDeque;
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, Waker};
use std::time::Duration;

use crate::client::ShellConnector;
use crate::config::SessionConfig;
use crate::error::{JumpError, Result};

/// One scripted step: when the written input contains `expect`, the shell
/// answers with `response`.
#[derive(Debug, Clone)]
struct ScriptStep {
    expect: String,
    response: String,
}

#[derive(Debug, Default)]
struct ShellState {
    /// Bytes queued for the client to read.
    output: VecDeque<u8>,
    /// Everything the client has written, in order.
    written: Vec<u8>,
    /// Unconsumed input since the last step match.
    pending_input: String,
    /// Remaining script steps, consumed front to back.
    steps: VecDeque<ScriptStep>,
    /// Waker for a read that found the output queue empty.
    read_waker: Option<Waker>,
    /// Whether the stream has ended.
    eof: bool,
    /// Error injected for the next read.
    error: Option<String>,
}

impl ShellState {
    fn wake_reader(&mut self) {
        if let Some(waker) = self.read_waker.take() {
            waker.wake();
        }
    }

    /// Fire every leading step whose pattern is present in the pending
    /// input.
    fn run_script(&mut self) {
        while self
            .steps
            .front()
            .is_some_and(|step| self.pending_input.contains(&step.expect))
        {
            if let Some(step) = self.steps.pop_front() {
                self.pending_input.clear();
                self.output.extend(step.response.as_bytes());
            }
        }
        if !self.output.is_empty() || self.eof {
            self.wake_reader();
        }
    }
}

/// A scripted in-memory shell stream.
#[derive(Debug, Clone, Default)]
pub struct MockShell {
    state: Arc<Mutex<ShellState>>,
}

impl MockShell {
    /// Create an empty shell with no banner and no script.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ShellState> {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Queue output for the client to read immediately.
    pub fn push_output(&self, text: &str) {
        let mut state = self.lock();
        state.output.extend(text.as_bytes());
        state.wake_reader();
    }

    /// Append a scripted input/response step.
    pub fn on_input(&self, expect: impl Into<String>, response: impl Into<String>) {
        self.lock().steps.push_back(ScriptStep {
            expect: expect.into(),
            response: response.into(),
        });
    }

    /// Signal end of stream.
    pub fn signal_eof(&self) {
        let mut state = self.lock();
        state.eof = true;
        state.wake_reader();
    }

    /// Inject an error for the next read.
    pub fn inject_error(&self, msg: impl Into<String>) {
        let mut state = self.lock();
        state.error = Some(msg.into());
        state.wake_reader();
    }

    /// Everything the client has written so far.
    #[must_use]
    pub fn written(&self) -> String {
        String::from_utf8_lossy(&self.lock().written).into_owned()
    }

    /// How many times `keystroke` was written.
    #[must_use]
    pub fn count_writes(&self, keystroke: &str) -> usize {
        self.written().matches(keystroke).count()
    }
}

impl tokio::io::AsyncRead for MockShell {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut tokio::io::ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let mut state = self.lock();

        if let Some(error) = state.error.take() {
            return Poll::Ready(Err(io::Error::other(error)));
        }

        if !state.output.is_empty() {
            let to_read = buf.remaining().min(state.output.len());
            let data: Vec<u8> = state.output.drain(..to_read).collect();
            buf.put_slice(&data);
            return Poll::Ready(Ok(()));
        }

        if state.eof {
            return Poll::Ready(Ok(()));
        }

        state.read_waker = Some(cx.waker().clone());
        Poll::Pending
    }
}

impl tokio::io::AsyncWrite for MockShell {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let mut state = self.lock();
        state.written.extend_from_slice(buf);
        state
            .pending_input
            .push_str(&String::from_utf8_lossy(buf));
        state.run_script();
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let mut state = self.lock();
        state.eof = true;
        state.wake_reader();
        Poll::Ready(Ok(()))
    }
}

/// How a [`MockConnector`] behaves when asked to open a shell.
#[derive(Debug, Clone)]
enum ConnectOutcome {
    /// Hand out a clone of the scripted shell.
    Shell(MockShell),
    /// Fail as if the bastion rejected the credentials.
    AuthFailure(String),
    /// Fail as if the host were unreachable.
    ConnectFailure(String),
}

/// A [`ShellConnector`] that yields a scripted [`MockShell`].
#[derive(Debug, Clone)]
pub struct MockConnector {
    outcome: ConnectOutcome,
}

impl MockConnector {
    /// Connect successfully to the given scripted shell.
    #[must_use]
    pub fn new(shell: MockShell) -> Self {
        Self {
            outcome: ConnectOutcome::Shell(shell),
        }
    }

    /// Always fail authentication.
    #[must_use]
    pub fn auth_failure(reason: impl Into<String>) -> Self {
        Self {
            outcome: ConnectOutcome::AuthFailure(reason.into()),
        }
    }

    /// Always fail to reach the host.
    #[must_use]
    pub fn connect_failure(reason: impl Into<String>) -> Self {
        Self {
            outcome: ConnectOutcome::ConnectFailure(reason.into()),
        }
    }
}

impl ShellConnector for MockConnector {
    type Stream = MockShell;

    async fn open_shell(
        &self,
        config: &SessionConfig,
        _connect_timeout: Duration,
    ) -> Result<MockShell> {
        match &self.outcome {
            ConnectOutcome::Shell(shell) => Ok(shell.clone()),
            ConnectOutcome::AuthFailure(reason) => {
                Err(JumpError::auth(config.username.clone(), reason.clone()))
            }
            ConnectOutcome::ConnectFailure(reason) => Err(JumpError::connection(
                config.host.clone(),
                config.port,
                reason.clone(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn shell_reads_and_records_writes() {
        let shell = MockShell::new();
        shell.push_output("hello");

        let mut stream = shell.clone();
        let mut buf = [0u8; 16];
        let n = stream.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"hello");

        stream.write_all(b"p\r").await.unwrap();
        assert_eq!(shell.written(), "p\r");
    }

    #[tokio::test]
    async fn script_answers_matching_input() {
        let shell = MockShell::new();
        shell.on_input("p\r", "page one\n[Host]>");

        let mut stream = shell.clone();
        stream.write_all(b"p\r").await.unwrap();

        let mut buf = [0u8; 64];
        let n = stream.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"page one\n[Host]>");
    }

    #[tokio::test]
    async fn script_wakes_pending_read() {
        let shell = MockShell::new();
        shell.on_input("n\r", "answer\n");

        let mut reader = shell.clone();
        let read_task = tokio::spawn(async move {
            let mut buf = [0u8; 32];
            let n = reader.read(&mut buf).await.unwrap();
            String::from_utf8_lossy(&buf[..n]).into_owned()
        });

        // Let the read park itself before the script fires.
        tokio::time::sleep(Duration::from_millis(20)).await;
        let mut writer = shell.clone();
        writer.write_all(b"n\r").await.unwrap();

        assert_eq!(read_task.await.unwrap(), "answer\n");
    }

    #[tokio::test]
    async fn eof_read_returns_zero() {
        let shell = MockShell::new();
        shell.signal_eof();

        let mut stream = shell.clone();
        let mut buf = [0u8; 8];
        assert_eq!(stream.read(&mut buf).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn connector_failure_modes() {
        let config = SessionConfig::new("h", "u").password("pw");

        let err = MockConnector::auth_failure("denied")
            .open_shell(&config, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(err.is_auth());

        let err = MockConnector::connect_failure("unreachable")
            .open_shell(&config, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, JumpError::Connection { .. }));
    }
}
