//! Exchange correlation over the shared shell channel.
//!
//! The bastion menu has no framing: one logical request is a keystroke
//! written to the stream, and its response is "whatever accumulates until a
//! known prompt substring shows up". [`ExchangeCorrelator`] serializes these
//! exchanges: at most one may be in flight, the sanitized output buffer is
//! scanned after every inbound chunk, and resolution (match, timeout, or
//! transport failure) clears the buffer exactly once so nothing leaks into
//! the next exchange.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::Instant;

use crate::config::MenuDialect;
use crate::error::{JumpError, Result};
use crate::sanitize::sanitize;

/// Outcome of one bounded read from the transport.
enum ReadOutcome {
    /// Data arrived and was appended to the buffer.
    Data,
    /// The transport reported end of stream.
    Eof,
    /// The read window elapsed with nothing to read.
    TimedOut,
}

/// Serializes command/sentinel exchanges over one duplex shell stream.
pub struct ExchangeCorrelator<T: AsyncReadExt + AsyncWriteExt + Unpin + Send> {
    /// The underlying shell stream (SSH channel, mock, etc.).
    transport: tokio::sync::Mutex<T>,
    /// Sanitized output accumulated since the last resolution boundary.
    buffer: Mutex<String>,
    /// Single-flight slot: true while an exchange is pending.
    in_flight: AtomicBool,
    /// Menu dialect (sentinels, line ending).
    dialect: MenuDialect,
    /// Per-exchange deadline.
    exchange_timeout: Duration,
}

impl<T: AsyncReadExt + AsyncWriteExt + Unpin + Send> ExchangeCorrelator<T> {
    /// Create a correlator over the given stream.
    pub fn new(transport: T, dialect: MenuDialect, exchange_timeout: Duration) -> Self {
        Self {
            transport: tokio::sync::Mutex::new(transport),
            buffer: Mutex::new(String::new()),
            in_flight: AtomicBool::new(false),
            dialect,
            exchange_timeout,
        }
    }

    /// Get the menu dialect.
    #[must_use]
    pub const fn dialect(&self) -> &MenuDialect {
        &self.dialect
    }

    /// Run one exchange: write `keystroke` plus the line terminator, then
    /// wait until the accumulated buffer contains an exchange sentinel.
    ///
    /// Resolves with the full buffer content and clears it. On timeout the
    /// buffer is also cleared, and the stale content travels in the error.
    ///
    /// # Errors
    ///
    /// - [`JumpError::ExchangeInFlight`] if a previous exchange is pending.
    /// - [`JumpError::ExchangeTimeout`] if no sentinel appears in time.
    /// - [`JumpError::Eof`] or an I/O error if the transport fails.
    pub async fn run_exchange(&self, keystroke: &str) -> Result<String> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(JumpError::ExchangeInFlight);
        }
        let _guard = FlightGuard { slot: self };

        self.write_line(keystroke).await?;

        let deadline = Instant::now() + self.exchange_timeout;
        loop {
            if let Some(page) = self.take_if_complete() {
                tracing::debug!(keystroke, bytes = page.len(), "exchange resolved");
                return Ok(page);
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                let stale = self.take_buffer();
                return Err(JumpError::exchange_timeout(
                    self.exchange_timeout,
                    self.dialect.sentinel_display(),
                    stale,
                ));
            }

            match self.read_chunk(remaining).await? {
                ReadOutcome::Data => {}
                ReadOutcome::Eof => {
                    // Give a sentinel that arrived with the final chunk a
                    // chance before declaring the stream dead.
                    if let Some(page) = self.take_if_complete() {
                        return Ok(page);
                    }
                    return Err(JumpError::eof(self.take_buffer()));
                }
                ReadOutcome::TimedOut => {}
            }
        }
    }

    /// Drain inbound data into the buffer for up to `window`.
    ///
    /// Used by the initial-menu poll loop, which inspects the buffer itself;
    /// no exchange is pending and nothing is cleared here. Returns `true`
    /// if the transport reached end of stream.
    pub async fn pump_for(&self, window: Duration) -> Result<bool> {
        let deadline = Instant::now() + window;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(false);
            }
            match self.read_chunk(remaining).await? {
                ReadOutcome::Data => {}
                ReadOutcome::Eof => return Ok(true),
                ReadOutcome::TimedOut => return Ok(false),
            }
        }
    }

    /// Snapshot the current buffer contents.
    #[must_use]
    pub fn buffer_snapshot(&self) -> String {
        self.buffer
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Clear the buffer (used to discard banner/MOTD text).
    pub fn clear_buffer(&self) {
        self.buffer
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clear();
    }

    /// Shut the transport down, ignoring failures (teardown path).
    pub async fn shutdown(&self) {
        let mut transport = self.transport.lock().await;
        if let Err(e) = transport.shutdown().await {
            tracing::debug!(error = %e, "shutdown of shell channel failed");
        }
    }

    /// Write `keystroke` plus the dialect line terminator.
    async fn write_line(&self, keystroke: &str) -> Result<()> {
        let data = format!("{keystroke}{}", self.dialect.line_ending);
        let mut transport = self.transport.lock().await;
        transport
            .write_all(data.as_bytes())
            .await
            .map_err(|e| JumpError::io_context("writing to shell channel", e))?;
        transport
            .flush()
            .await
            .map_err(|e| JumpError::io_context("flushing shell channel", e))?;
        Ok(())
    }

    /// One bounded read; sanitizes and appends whatever arrives.
    async fn read_chunk(&self, window: Duration) -> Result<ReadOutcome> {
        let mut buf = [0u8; 4096];
        let mut transport = self.transport.lock().await;

        match tokio::time::timeout(window, transport.read(&mut buf)).await {
            Ok(Ok(0)) => Ok(ReadOutcome::Eof),
            Ok(Ok(n)) => {
                let text = String::from_utf8_lossy(&buf[..n]);
                let clean = sanitize(&text);
                self.buffer
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner)
                    .push_str(&clean);
                Ok(ReadOutcome::Data)
            }
            Ok(Err(e)) => Err(JumpError::io_context("reading from shell channel", e)),
            Err(_) => Ok(ReadOutcome::TimedOut),
        }
    }

    /// Take the whole buffer if it contains an exchange sentinel.
    fn take_if_complete(&self) -> Option<String> {
        let mut buffer = self
            .buffer
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if self.dialect.has_exchange_sentinel(&buffer) {
            Some(std::mem::take(&mut *buffer))
        } else {
            None
        }
    }

    /// Take the whole buffer unconditionally.
    fn take_buffer(&self) -> String {
        std::mem::take(
            &mut *self
                .buffer
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner),
        )
    }
}

impl<T: AsyncReadExt + AsyncWriteExt + Unpin + Send> std::fmt::Debug for ExchangeCorrelator<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExchangeCorrelator")
            .field("in_flight", &self.in_flight.load(Ordering::SeqCst))
            .field("exchange_timeout", &self.exchange_timeout)
            .finish_non_exhaustive()
    }
}

/// Clears pending-exchange state exactly once, including when the exchange
/// future is dropped mid-flight.
struct FlightGuard<'a, T: AsyncReadExt + AsyncWriteExt + Unpin + Send> {
    slot: &'a ExchangeCorrelator<T>,
}

impl<T: AsyncReadExt + AsyncWriteExt + Unpin + Send> Drop for FlightGuard<'_, T> {
    fn drop(&mut self) {
        self.slot.clear_buffer();
        self.slot.in_flight.store(false, Ordering::SeqCst);
    }
}
