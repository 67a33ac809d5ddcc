//! Session lifecycle management.
//!
//! A [`MenuSession`] owns the exchange correlator for one shell stream and
//! walks the lifecycle: wait for the initial menu with bounded polling,
//! serve exchanges while `Ready`, and tear down idempotently. The
//! connect/authenticate sequencing that produces the stream lives in
//! [`crate::client`]; this type picks up from the moment a shell exists.

use std::fmt;

use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::config::{DriverConfig, MenuDialect};
use crate::error::{JumpError, Result};
use crate::exchange::ExchangeCorrelator;

/// Lifecycle states of a bastion session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No transport exists.
    Disconnected,
    /// Opening and authenticating the transport.
    Connecting,
    /// Requesting the interactive shell channel.
    ShellOpening,
    /// Polling for the menu-ready sentinel.
    AwaitingInitialMenu,
    /// The menu answered; exchanges may run.
    Ready,
    /// A connect-phase step failed; terminal.
    Failed,
    /// Torn down; terminal.
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::ShellOpening => "shell-opening",
            Self::AwaitingInitialMenu => "awaiting-initial-menu",
            Self::Ready => "ready",
            Self::Failed => "failed",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// One live menu session over an open shell stream.
pub struct MenuSession<T: AsyncReadExt + AsyncWriteExt + Unpin + Send> {
    correlator: ExchangeCorrelator<T>,
    state: SessionState,
    poll_interval: std::time::Duration,
    poll_attempts: u32,
}

impl<T: AsyncReadExt + AsyncWriteExt + Unpin + Send> MenuSession<T> {
    /// Wrap a freshly opened shell stream.
    pub fn new(stream: T, dialect: MenuDialect, driver: &DriverConfig) -> Self {
        Self {
            correlator: ExchangeCorrelator::new(stream, dialect, driver.exchange_timeout),
            state: SessionState::AwaitingInitialMenu,
            poll_interval: driver.menu_poll_interval,
            poll_attempts: driver.menu_poll_attempts,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Menu dialect in effect for this session.
    #[must_use]
    pub const fn dialect(&self) -> &MenuDialect {
        self.correlator.dialect()
    }

    /// Poll for the menu-ready sentinel on a fixed interval, up to the
    /// configured attempt budget.
    ///
    /// On success the accumulated banner/MOTD text is discarded and the
    /// session becomes `Ready`. Exhausting the budget is fatal.
    ///
    /// # Errors
    ///
    /// [`JumpError::InitialMenuTimeout`] when polling is exhausted,
    /// [`JumpError::Eof`] if the remote hangs up before the menu appears.
    pub async fn wait_for_menu(&mut self) -> Result<()> {
        if self.state != SessionState::AwaitingInitialMenu {
            return Err(JumpError::NotReady {
                state: self.state.to_string(),
            });
        }

        for attempt in 1..=self.poll_attempts {
            let eof = match self.correlator.pump_for(self.poll_interval).await {
                Ok(eof) => eof,
                Err(e) => {
                    self.state = SessionState::Failed;
                    return Err(e);
                }
            };

            let buffer = self.correlator.buffer_snapshot();
            if self.dialect().has_menu_ready(&buffer) {
                tracing::debug!(attempt, "initial menu prompt detected");
                self.correlator.clear_buffer();
                self.state = SessionState::Ready;
                return Ok(());
            }

            if eof {
                self.state = SessionState::Failed;
                return Err(JumpError::eof(buffer));
            }

            tracing::debug!(attempt, buffered = buffer.len(), "menu prompt not seen yet");
        }

        self.state = SessionState::Failed;
        let sentinel = self.dialect().menu_ready.clone();
        Err(JumpError::initial_menu_timeout(
            self.poll_attempts,
            sentinel,
            self.correlator.buffer_snapshot(),
        ))
    }

    /// Run one keystroke/sentinel exchange. Only legal while `Ready`.
    ///
    /// A timeout leaves the session `Ready`; retrying is the caller's call.
    ///
    /// # Errors
    ///
    /// [`JumpError::Closed`] after teardown, [`JumpError::NotReady`] in any
    /// other non-`Ready` state, otherwise whatever the correlator reports.
    pub async fn exchange(&self, keystroke: &str) -> Result<String> {
        if self.state == SessionState::Closed {
            return Err(JumpError::Closed);
        }
        if self.state != SessionState::Ready {
            return Err(JumpError::NotReady {
                state: self.state.to_string(),
            });
        }
        self.correlator.run_exchange(keystroke).await
    }

    /// Tear the session down. Idempotent: safe after a failed handshake and
    /// safe to call twice.
    pub async fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        self.correlator.shutdown().await;
        self.state = SessionState::Closed;
        tracing::debug!("menu session closed");
    }
}

impl<T: AsyncReadExt + AsyncWriteExt + Unpin + Send> fmt::Debug for MenuSession<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MenuSession")
            .field("state", &self.state)
            .field("correlator", &self.correlator)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use tokio::io::AsyncWriteExt as _;

    fn test_driver() -> DriverConfig {
        DriverConfig::default()
            .menu_poll_interval(Duration::from_millis(20))
            .menu_poll_attempts(3)
            .exchange_timeout(Duration::from_millis(200))
    }

    #[tokio::test]
    async fn handshake_discards_banner() {
        let (near, mut far) = tokio::io::duplex(4096);
        let mut session = MenuSession::new(near, MenuDialect::default(), &test_driver());

        far.write_all(b"Last login: yesterday\nMOTD here\nOpt>")
            .await
            .unwrap();

        session.wait_for_menu().await.unwrap();
        assert_eq!(session.state(), SessionState::Ready);

        // Banner must not leak into the first exchange.
        far.write_all(b"rows\n[Host]>").await.unwrap();
        let page = session.exchange("p").await.unwrap();
        assert!(!page.contains("MOTD"));
        assert!(page.contains("rows"));
    }

    #[tokio::test]
    async fn handshake_exhausts_poll_budget() {
        let (near, mut far) = tokio::io::duplex(4096);
        let mut session = MenuSession::new(near, MenuDialect::default(), &test_driver());

        far.write_all(b"a banner that never offers a prompt")
            .await
            .unwrap();

        let err = session.wait_for_menu().await.unwrap_err();
        assert!(matches!(err, JumpError::InitialMenuTimeout { attempts: 3, .. }));
        assert_eq!(session.state(), SessionState::Failed);
    }

    #[tokio::test]
    async fn exchange_requires_ready() {
        let (near, _far) = tokio::io::duplex(4096);
        let session = MenuSession::new(near, MenuDialect::default(), &test_driver());

        let err = session.exchange("p").await.unwrap_err();
        assert!(matches!(err, JumpError::NotReady { .. }));
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let (near, _far) = tokio::io::duplex(4096);
        let mut session = MenuSession::new(near, MenuDialect::default(), &test_driver());

        session.close().await;
        assert_eq!(session.state(), SessionState::Closed);
        session.close().await;
        assert_eq!(session.state(), SessionState::Closed);

        let err = session.exchange("p").await.unwrap_err();
        assert!(matches!(err, JumpError::Closed));
    }

    #[tokio::test]
    async fn timeout_leaves_session_ready() {
        let (near, mut far) = tokio::io::duplex(4096);
        let mut session = MenuSession::new(near, MenuDialect::default(), &test_driver());

        far.write_all(b"Opt>").await.unwrap();
        session.wait_for_menu().await.unwrap();

        // No response to the keystroke: the exchange times out but the
        // session itself stays usable.
        let err = session.exchange("p").await.unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(session.state(), SessionState::Ready);

        far.write_all(b"late\n[Host]>").await.unwrap();
        let page = session.exchange("p").await.unwrap();
        assert!(page.contains("late"));
    }
}
