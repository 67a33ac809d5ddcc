//! The client surface: connect, enumerate, close.
//!
//! [`JumpClient`] owns one session at a time and wires the pieces
//! together: a [`ShellConnector`] produces the authenticated shell stream,
//! [`MenuSession`] performs the initial-menu handshake, and the pagination
//! driver walks the inventory. Enumeration is all-or-nothing: any hard
//! failure surfaces as an error and no partial list escapes.

use std::future::Future;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::config::{DriverConfig, MenuDialect, SessionConfig};
use crate::error::Result;
use crate::page::{AssetRecord, PageParser};
use crate::paginate::enumerate_assets;
use crate::session::{MenuSession, SessionState};

/// Opens an authenticated interactive shell for a [`SessionConfig`].
///
/// Implementations map transport failures to [`crate::JumpError::Connection`]
/// and credential rejections to [`crate::JumpError::Auth`] so callers can
/// tell them apart.
pub trait ShellConnector {
    /// The duplex shell stream this connector produces.
    type Stream: AsyncReadExt + AsyncWriteExt + Unpin + Send;

    /// Connect, authenticate, and open an interactive shell.
    fn open_shell(
        &self,
        config: &SessionConfig,
        connect_timeout: Duration,
    ) -> impl Future<Output = Result<Self::Stream>> + Send;
}

/// A bastion-menu client: one session, one enumeration at a time.
pub struct JumpClient<C: ShellConnector, P: PageParser> {
    config: SessionConfig,
    driver: DriverConfig,
    dialect: MenuDialect,
    connector: C,
    parser: P,
    session: Option<MenuSession<C::Stream>>,
}

impl<C: ShellConnector, P: PageParser> JumpClient<C, P> {
    /// Create a client with default dialect and driver timing.
    pub fn new(config: SessionConfig, connector: C, parser: P) -> Self {
        Self {
            config,
            driver: DriverConfig::default(),
            dialect: MenuDialect::default(),
            connector,
            parser,
            session: None,
        }
    }

    /// Override the driver timing configuration.
    #[must_use]
    pub fn driver_config(mut self, driver: DriverConfig) -> Self {
        self.driver = driver;
        self
    }

    /// Override the menu dialect.
    #[must_use]
    pub fn dialect(mut self, dialect: MenuDialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.session
            .as_ref()
            .map_or(SessionState::Disconnected, MenuSession::state)
    }

    /// Connect, authenticate, open the shell, and wait for the menu.
    ///
    /// A no-op when the session is already `Ready`.
    ///
    /// # Errors
    ///
    /// [`crate::JumpError::Config`] before any I/O when the credentials are
    /// incomplete; otherwise connection, authentication, or initial-menu
    /// failures from the phases they occur in.
    pub async fn connect(&mut self) -> Result<()> {
        if self.state() == SessionState::Ready {
            return Ok(());
        }

        // Fail fast on bad config before touching the network.
        self.config.credential()?;

        tracing::info!(
            host = %self.config.host,
            port = self.config.port,
            user = %self.config.username,
            "connecting to bastion"
        );
        let stream = self
            .connector
            .open_shell(&self.config, self.driver.connect_timeout)
            .await?;

        let mut session = MenuSession::new(stream, self.dialect.clone(), &self.driver);
        if let Err(e) = session.wait_for_menu().await {
            session.close().await;
            return Err(e);
        }

        tracing::info!(host = %self.config.host, "bastion menu ready");
        self.session = Some(session);
        Ok(())
    }

    /// Enumerate every asset the menu lists, connecting first if needed.
    ///
    /// # Errors
    ///
    /// Propagates connect-phase errors and any exchange failure. On an
    /// exchange timeout the session stays connected, so a caller may retry
    /// with a fresh call.
    pub async fn get_all_assets(&mut self) -> Result<Vec<AssetRecord>> {
        self.connect().await?;

        let Some(session) = self.session.as_ref() else {
            return Err(crate::JumpError::NotReady {
                state: SessionState::Disconnected.to_string(),
            });
        };
        let assets = enumerate_assets(session, &self.parser).await?;

        tracing::info!(count = assets.len(), "asset enumeration complete");
        Ok(assets.into_records())
    }

    /// Tear down the session. Idempotent; safe after failed connects.
    pub async fn close(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.close().await;
        }
    }
}

impl<C: ShellConnector, P: PageParser> std::fmt::Debug for JumpClient<C, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JumpClient")
            .field("address", &self.config.address())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
