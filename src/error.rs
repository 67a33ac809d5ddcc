//! Error types for jumpgate.
//!
//! Errors are designed so a caller can tell authentication failures,
//! timeouts, and protocol problems apart without string matching, and the
//! timeout variants carry the buffer contents that had accumulated when the
//! deadline fired.

use std::time::Duration;

use thiserror::Error;

/// Maximum length of buffer content to display in error messages.
const MAX_BUFFER_DISPLAY: usize = 500;

/// Context lines to show before/after truncation point.
const CONTEXT_LINES: usize = 3;

/// Format buffer content for display, truncating if necessary.
fn format_buffer_snippet(buffer: &str) -> String {
    if buffer.is_empty() {
        return "(empty buffer)".to_string();
    }

    let buffer_len = buffer.len();

    if buffer_len <= MAX_BUFFER_DISPLAY {
        return format!(
            "┌─ buffer ({} bytes) ──────────────────────\n│ {}\n└────────────────────────────────────────",
            buffer_len,
            buffer.lines().collect::<Vec<_>>().join("\n│ ")
        );
    }

    let lines: Vec<&str> = buffer.lines().collect();
    let total_lines = lines.len();

    // Oversized but with few lines (one long row, say): show everything.
    if total_lines <= CONTEXT_LINES * 2 {
        return format!(
            "┌─ buffer ({} bytes, {} lines) ─────────────\n│ {}\n└────────────────────────────────────────",
            buffer_len,
            total_lines,
            lines.join("\n│ ")
        );
    }

    let tail_lines = &lines[total_lines - CONTEXT_LINES * 2..];
    let hidden = total_lines - tail_lines.len();

    format!(
        "┌─ buffer ({} bytes, {} lines) ─────────────\n│ ... ({} lines hidden)\n│ {}\n└────────────────────────────────────────",
        buffer_len,
        total_lines,
        hidden,
        tail_lines.join("\n│ ")
    )
}

/// Format an exchange timeout message with the sentinels that were awaited.
fn format_exchange_timeout(duration: Duration, sentinels: &str, buffer: &str) -> String {
    let buffer_snippet = format_buffer_snippet(buffer);

    format!(
        "exchange timed out after {duration:?} waiting for a menu prompt\n\
         \n\
         Sentinels: {sentinels}\n\
         \n\
         {buffer_snippet}\n\
         \n\
         Tip: the remote menu never produced its prompt. Check that the\n\
         dialect's prompt strings match what this bastion actually prints."
    )
}

/// Format an initial-menu timeout message.
fn format_menu_timeout(attempts: u32, sentinel: &str, buffer: &str) -> String {
    let buffer_snippet = format_buffer_snippet(buffer);

    format!(
        "could not obtain initial prompt after {attempts} polls\n\
         \n\
         Sentinel: '{sentinel}'\n\
         \n\
         {buffer_snippet}"
    )
}

/// The main error type for jumpgate operations.
#[derive(Debug, Error)]
pub enum JumpError {
    /// Invalid session configuration, detected before any I/O.
    #[error("configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// The transport could not reach the bastion.
    #[error("failed to connect to {host}:{port}: {reason}")]
    Connection {
        /// The host that could not be connected to.
        host: String,
        /// The port that was used.
        port: u16,
        /// The reason for the failure.
        reason: String,
    },

    /// The bastion rejected our credentials.
    #[error("authentication failed for user '{user}': {reason}")]
    Auth {
        /// The user that failed to authenticate.
        user: String,
        /// The reason for the failure.
        reason: String,
    },

    /// Shell channel error on an established transport.
    #[error("shell channel error: {reason}")]
    Channel {
        /// The reason for the channel error.
        reason: String,
    },

    /// Bounded polling exhausted without seeing the menu-ready sentinel.
    #[error("{}", format_menu_timeout(*attempts, sentinel, buffer))]
    InitialMenuTimeout {
        /// Number of polls performed before giving up.
        attempts: u32,
        /// The sentinel that was being searched for.
        sentinel: String,
        /// Buffer contents when polling was exhausted.
        buffer: String,
    },

    /// A single exchange did not see its sentinel within the deadline.
    #[error("{}", format_exchange_timeout(*duration, sentinels, buffer))]
    ExchangeTimeout {
        /// The timeout duration that elapsed.
        duration: Duration,
        /// The sentinels that were being searched for.
        sentinels: String,
        /// Buffer contents at the time of timeout.
        buffer: String,
    },

    /// `run_exchange` was invoked while a previous exchange was pending.
    #[error("an exchange is already in flight on this session")]
    ExchangeInFlight,

    /// An operation was attempted in the wrong lifecycle state.
    #[error("session is not ready (state: {state})")]
    NotReady {
        /// The state the session was actually in.
        state: String,
    },

    /// The remote closed the stream while an exchange was pending.
    #[error("remote closed the session unexpectedly\n\n{}", format_buffer_snippet(buffer))]
    Eof {
        /// Buffer contents when EOF was reached.
        buffer: String,
    },

    /// The session has already been torn down.
    #[error("session is closed")]
    Closed,

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An I/O error occurred with additional context.
    #[error("{context}: {source}")]
    IoWithContext {
        /// What operation was being performed.
        context: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias for jumpgate operations.
pub type Result<T> = std::result::Result<T, JumpError>;

impl JumpError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a connection error.
    pub fn connection(host: impl Into<String>, port: u16, reason: impl Into<String>) -> Self {
        Self::Connection {
            host: host.into(),
            port,
            reason: reason.into(),
        }
    }

    /// Create an authentication error.
    pub fn auth(user: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Auth {
            user: user.into(),
            reason: reason.into(),
        }
    }

    /// Create a channel error.
    pub fn channel(reason: impl Into<String>) -> Self {
        Self::Channel {
            reason: reason.into(),
        }
    }

    /// Create an exchange timeout error.
    pub fn exchange_timeout(
        duration: Duration,
        sentinels: impl Into<String>,
        buffer: impl Into<String>,
    ) -> Self {
        Self::ExchangeTimeout {
            duration,
            sentinels: sentinels.into(),
            buffer: buffer.into(),
        }
    }

    /// Create an initial-menu timeout error.
    pub fn initial_menu_timeout(
        attempts: u32,
        sentinel: impl Into<String>,
        buffer: impl Into<String>,
    ) -> Self {
        Self::InitialMenuTimeout {
            attempts,
            sentinel: sentinel.into(),
            buffer: buffer.into(),
        }
    }

    /// Create an EOF error.
    pub fn eof(buffer: impl Into<String>) -> Self {
        Self::Eof {
            buffer: buffer.into(),
        }
    }

    /// Create an I/O error with context.
    pub fn io_context(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::IoWithContext {
            context: context.into(),
            source,
        }
    }

    /// Check if this is a timeout error (exchange or initial menu).
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::ExchangeTimeout { .. } | Self::InitialMenuTimeout { .. }
        )
    }

    /// Check if this is an authentication error.
    #[must_use]
    pub const fn is_auth(&self) -> bool {
        matches!(self, Self::Auth { .. })
    }

    /// Get the buffer contents if this error contains them.
    #[must_use]
    pub fn buffer(&self) -> Option<&str> {
        match self {
            Self::ExchangeTimeout { buffer, .. }
            | Self::InitialMenuTimeout { buffer, .. }
            | Self::Eof { buffer, .. } => Some(buffer),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exchange_timeout_display() {
        let err = JumpError::exchange_timeout(
            Duration::from_secs(5),
            "'[Host]>' | 'Opt>'",
            "1) web-01 10.0.0.1\n",
        );
        let msg = err.to_string();
        assert!(msg.contains("timed out"));
        assert!(msg.contains("[Host]>"));
        assert!(msg.contains("web-01"));
        assert!(msg.contains("Sentinels:"));
    }

    #[test]
    fn timeout_display_empty_buffer() {
        let err = JumpError::exchange_timeout(Duration::from_secs(1), "'Opt>'", "");
        assert!(err.to_string().contains("empty buffer"));
    }

    #[test]
    fn timeout_display_large_buffer_truncation() {
        let large_buffer: String = (0..50).fold(String::new(), |mut acc, i| {
            use std::fmt::Write;
            let _ = writeln!(acc, "row {i}: host-{i} 10.0.0.{i}");
            acc
        });

        let err = JumpError::exchange_timeout(Duration::from_secs(1), "'Opt>'", &large_buffer);
        let msg = err.to_string();
        assert!(msg.contains("lines hidden"));
    }

    #[test]
    fn timeout_display_large_buffer_few_lines() {
        // Over the display cap but only two lines: nothing should be hidden.
        let buffer = format!("{}\n{}", "x".repeat(400), "y".repeat(400));
        let err = JumpError::exchange_timeout(Duration::from_secs(1), "'Opt>'", &buffer);
        let msg = err.to_string();
        assert!(!msg.contains("lines hidden"));
        assert!(msg.contains("2 lines"));
    }

    #[test]
    fn error_classification() {
        let timeout = JumpError::exchange_timeout(Duration::from_secs(1), "'Opt>'", "buf");
        assert!(timeout.is_timeout());
        assert!(!timeout.is_auth());

        let auth = JumpError::auth("admin", "bad password");
        assert!(auth.is_auth());
        assert!(!auth.is_timeout());

        let menu = JumpError::initial_menu_timeout(10, "Opt>", "banner text");
        assert!(menu.is_timeout());
    }

    #[test]
    fn error_buffer_access() {
        let err = JumpError::exchange_timeout(Duration::from_secs(1), "'Opt>'", "the buffer");
        assert_eq!(err.buffer(), Some("the buffer"));

        let io_err = JumpError::Io(std::io::Error::other("test"));
        assert!(io_err.buffer().is_none());
    }

    #[test]
    fn initial_menu_timeout_display() {
        let err = JumpError::initial_menu_timeout(10, "Opt>", "Welcome banner");
        let msg = err.to_string();
        assert!(msg.contains("initial prompt"));
        assert!(msg.contains("10 polls"));
        assert!(msg.contains("Opt>"));
    }
}
