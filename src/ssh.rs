//! SSH transport built on russh.
//!
//! [`SshConnector`] establishes the TCP connection, authenticates with the
//! configured credential, and opens an interactive shell channel with a
//! PTY. The resulting [`SshShellStream`] adapts the russh channel to
//! `AsyncRead`/`AsyncWrite` so the rest of the crate never sees SSH
//! details.

use std::collections::VecDeque;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use russh::client;
use russh::keys::{PrivateKeyWithHashAlg, PublicKey};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use crate::client::ShellConnector;
use crate::config::{Credential, SessionConfig};
use crate::error::{JumpError, Result};

const TERM: &str = "xterm-256color";
const TERM_COLS: u32 = 200;
const TERM_ROWS: u32 = 50;

/// Accepts every server key. Bastion inventories are typically reached
/// from trusted networks; callers needing strict verification should
/// front this with their own known-hosts tooling.
struct AcceptingHandler {
    host: String,
}

impl client::Handler for AcceptingHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        tracing::warn!(host = %self.host, "accepting server host key without verification");
        Ok(true)
    }
}

/// Opens interactive shells on a bastion over SSH.
#[derive(Debug, Clone, Copy, Default)]
pub struct SshConnector;

impl SshConnector {
    /// Create a connector.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    async fn authenticate(
        handle: &mut client::Handle<AcceptingHandler>,
        config: &SessionConfig,
        credential: Credential<'_>,
    ) -> Result<()> {
        let username = &config.username;
        match credential {
            Credential::Password(password) => {
                tracing::debug!(user = %username, "attempting password authentication");
                let outcome = handle
                    .authenticate_password(username, password)
                    .await
                    .map_err(|e| JumpError::auth(username.clone(), e.to_string()))?;
                if !outcome.success() {
                    return Err(JumpError::auth(
                        username.clone(),
                        "password rejected by server",
                    ));
                }
            }
            Credential::PrivateKey { path, passphrase } => {
                tracing::debug!(user = %username, key = %path.display(), "attempting public key authentication");
                let key_str = tokio::fs::read_to_string(path).await.map_err(|e| {
                    JumpError::auth(
                        username.clone(),
                        format!("failed to read key file {}: {e}", path.display()),
                    )
                })?;
                let key = russh::keys::decode_secret_key(&key_str, passphrase).map_err(|e| {
                    JumpError::auth(
                        username.clone(),
                        format!("failed to decode key {}: {e}", path.display()),
                    )
                })?;

                // best_supported_rsa_hash returns Result<Option<Option<HashAlg>>, _>
                let rsa_hash = handle
                    .best_supported_rsa_hash()
                    .await
                    .ok()
                    .flatten()
                    .flatten();
                let key_with_hash = PrivateKeyWithHashAlg::new(Arc::new(key), rsa_hash);

                let outcome = handle
                    .authenticate_publickey(username, key_with_hash)
                    .await
                    .map_err(|e| JumpError::auth(username.clone(), e.to_string()))?;
                if !outcome.success() {
                    return Err(JumpError::auth(
                        username.clone(),
                        "public key rejected by server",
                    ));
                }
            }
        }

        tracing::info!(user = %username, "authentication successful");
        Ok(())
    }
}

impl ShellConnector for SshConnector {
    type Stream = SshShellStream;

    async fn open_shell(
        &self,
        config: &SessionConfig,
        connect_timeout: Duration,
    ) -> Result<SshShellStream> {
        let credential = config.credential()?;

        let ssh_config = Arc::new(client::Config::default());
        let handler = AcceptingHandler {
            host: config.host.clone(),
        };

        tracing::info!(host = %config.host, port = config.port, "connecting to SSH server");
        let addr = (config.host.as_str(), config.port);
        let mut handle = tokio::time::timeout(
            connect_timeout,
            client::connect(ssh_config, addr, handler),
        )
        .await
        .map_err(|_| {
            JumpError::connection(
                config.host.clone(),
                config.port,
                format!("connect timed out after {connect_timeout:?}"),
            )
        })?
        .map_err(|e| JumpError::connection(config.host.clone(), config.port, e.to_string()))?;

        Self::authenticate(&mut handle, config, credential).await?;

        let channel = handle
            .channel_open_session()
            .await
            .map_err(|e| JumpError::channel(e.to_string()))?;
        channel
            .request_pty(false, TERM, TERM_COLS, TERM_ROWS, 0, 0, &[])
            .await
            .map_err(|e| JumpError::channel(format!("PTY request failed: {e}")))?;
        channel
            .request_shell(false)
            .await
            .map_err(|e| JumpError::channel(format!("shell request failed: {e}")))?;

        tracing::debug!(host = %config.host, "interactive shell channel open");
        Ok(SshShellStream::new(channel, handle))
    }
}

/// A russh shell channel adapted to `AsyncRead`/`AsyncWrite`.
pub struct SshShellStream {
    channel: russh::Channel<client::Msg>,
    // Held so the connection outlives the channel.
    _handle: client::Handle<AcceptingHandler>,
    read_buffer: VecDeque<u8>,
    eof_received: bool,
}

impl SshShellStream {
    fn new(channel: russh::Channel<client::Msg>, handle: client::Handle<AcceptingHandler>) -> Self {
        Self {
            channel,
            _handle: handle,
            read_buffer: VecDeque::with_capacity(32768),
            eof_received: false,
        }
    }
}

impl std::fmt::Debug for SshShellStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshShellStream")
            .field("read_buffer_len", &self.read_buffer.len())
            .field("eof_received", &self.eof_received)
            .finish_non_exhaustive()
    }
}

impl AsyncRead for SshShellStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();

        if !this.read_buffer.is_empty() {
            let len = std::cmp::min(buf.remaining(), this.read_buffer.len());
            let data: Vec<u8> = this.read_buffer.drain(..len).collect();
            buf.put_slice(&data);
            return Poll::Ready(Ok(()));
        }

        if this.eof_received {
            return Poll::Ready(Ok(()));
        }

        let wait_future = this.channel.wait();
        tokio::pin!(wait_future);

        match wait_future.poll(cx) {
            Poll::Ready(Some(msg)) => match msg {
                russh::ChannelMsg::Data { data } => {
                    let len = std::cmp::min(buf.remaining(), data.len());
                    buf.put_slice(&data[..len]);
                    if len < data.len() {
                        this.read_buffer.extend(&data[len..]);
                    }
                    Poll::Ready(Ok(()))
                }
                russh::ChannelMsg::ExtendedData { data, ext } => {
                    // ext 1 is stderr; fold it into the same stream. Other
                    // ext codes carry no bytes for us, and a zero-fill
                    // return would read as EOF, so keep polling.
                    if ext == 1 {
                        let len = std::cmp::min(buf.remaining(), data.len());
                        buf.put_slice(&data[..len]);
                        if len < data.len() {
                            this.read_buffer.extend(&data[len..]);
                        }
                        Poll::Ready(Ok(()))
                    } else {
                        cx.waker().wake_by_ref();
                        Poll::Pending
                    }
                }
                russh::ChannelMsg::Eof | russh::ChannelMsg::Close => {
                    this.eof_received = true;
                    Poll::Ready(Ok(()))
                }
                _ => {
                    cx.waker().wake_by_ref();
                    Poll::Pending
                }
            },
            Poll::Ready(None) => {
                this.eof_received = true;
                Poll::Ready(Ok(()))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl AsyncWrite for SshShellStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();

        if this.eof_received {
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "channel is closed",
            )));
        }

        let data_future = this.channel.data(buf);
        tokio::pin!(data_future);

        match data_future.poll(cx) {
            Poll::Ready(Ok(())) => Poll::Ready(Ok(buf.len())),
            Poll::Ready(Err(e)) => {
                Poll::Ready(Err(io::Error::other(format!("SSH write error: {e}"))))
            }
            Poll::Pending => Poll::Pending,
        }
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        // SSH channels have no explicit flush.
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();

        let eof_future = this.channel.eof();
        tokio::pin!(eof_future);

        match eof_future.poll(cx) {
            Poll::Ready(Ok(())) => {
                this.eof_received = true;
                Poll::Ready(Ok(()))
            }
            Poll::Ready(Err(e)) => {
                Poll::Ready(Err(io::Error::other(format!("SSH shutdown error: {e}"))))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}
