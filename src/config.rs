//! Configuration types for jumpgate.
//!
//! This module defines the session configuration (host, credentials), the
//! menu dialect (keystrokes and sentinel substrings), and the driver timing
//! knobs. The dialect is the single place the two keystrokes and the prompt
//! strings are spelled out; the correlator and the initial-menu detector
//! both read them from here.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{JumpError, Result};

/// Default SSH port.
pub const DEFAULT_PORT: u16 = 22;

/// Default per-exchange timeout.
pub const DEFAULT_EXCHANGE_TIMEOUT: Duration = Duration::from_secs(5);

/// Default transport connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default interval between initial-menu polls.
pub const DEFAULT_MENU_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Default number of initial-menu polls before giving up.
pub const DEFAULT_MENU_POLL_ATTEMPTS: u32 = 10;

/// Connection and credential settings for one bastion session.
///
/// Immutable once the session starts. Exactly one credential kind must be
/// supplied; [`SessionConfig::credential`] checks this before any I/O.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Host to connect to.
    pub host: String,
    /// Port (default 22).
    pub port: u16,
    /// Username.
    pub username: String,
    /// Password, if using password authentication.
    pub password: Option<String>,
    /// Private key path, if using key authentication.
    pub private_key: Option<PathBuf>,
    /// Passphrase for the private key (if encrypted).
    pub passphrase: Option<String>,
}

impl SessionConfig {
    /// Create a new config for a host.
    #[must_use]
    pub fn new(host: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            username: username.into(),
            password: None,
            private_key: None,
            passphrase: None,
        }
    }

    /// Set the port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Use password authentication.
    #[must_use]
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Use private-key authentication.
    #[must_use]
    pub fn private_key(mut self, path: impl Into<PathBuf>) -> Self {
        self.private_key = Some(path.into());
        self
    }

    /// Set the passphrase for an encrypted private key.
    #[must_use]
    pub fn passphrase(mut self, passphrase: impl Into<String>) -> Self {
        self.passphrase = Some(passphrase.into());
        self
    }

    /// Get the address string.
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Resolve the configured credential.
    ///
    /// Key material wins over a password when both are present, matching
    /// how bastion operators usually deploy the two.
    ///
    /// # Errors
    ///
    /// Returns [`JumpError::Config`] when neither a password nor a private
    /// key was supplied.
    pub fn credential(&self) -> Result<Credential<'_>> {
        if let Some(key) = &self.private_key {
            return Ok(Credential::PrivateKey {
                path: key,
                passphrase: self.passphrase.as_deref(),
            });
        }
        if let Some(password) = &self.password {
            return Ok(Credential::Password(password));
        }
        Err(JumpError::config(
            "neither a password nor a private key was supplied",
        ))
    }
}

/// A resolved credential, borrowed from a [`SessionConfig`].
#[derive(Debug, Clone, Copy)]
pub enum Credential<'a> {
    /// Password authentication.
    Password(&'a str),
    /// Private-key authentication.
    PrivateKey {
        /// Path to the private key file.
        path: &'a PathBuf,
        /// Passphrase for the key (if encrypted).
        passphrase: Option<&'a str>,
    },
}

/// Keystrokes and sentinel substrings for one bastion menu dialect.
///
/// These are configuration, not protocol: a different bastion build prints
/// different prompts, and swapping the dialect must not touch the
/// correlator.
#[derive(Debug, Clone)]
pub struct MenuDialect {
    /// Substring whose appearance means the top-level menu is ready.
    pub menu_ready: String,
    /// The host-list command prompt.
    pub host_prompt: String,
    /// The secondary "options" prompt.
    pub options_prompt: String,
    /// Keystroke that requests the asset list.
    pub list_key: String,
    /// Keystroke that requests the next page.
    pub next_page_key: String,
    /// Line terminator appended to every keystroke.
    pub line_ending: String,
}

impl Default for MenuDialect {
    fn default() -> Self {
        Self {
            menu_ready: "Opt>".to_string(),
            host_prompt: "[Host]>".to_string(),
            options_prompt: "Opt>".to_string(),
            list_key: "p".to_string(),
            next_page_key: "n".to_string(),
            line_ending: "\r".to_string(),
        }
    }
}

impl MenuDialect {
    /// Check whether `text` contains any exchange-completion sentinel.
    #[must_use]
    pub fn has_exchange_sentinel(&self, text: &str) -> bool {
        text.contains(&self.host_prompt) || text.contains(&self.options_prompt)
    }

    /// Check whether `text` contains the menu-ready sentinel.
    #[must_use]
    pub fn has_menu_ready(&self, text: &str) -> bool {
        text.contains(&self.menu_ready)
    }

    /// Human-readable description of the exchange sentinels, for errors.
    #[must_use]
    pub fn sentinel_display(&self) -> String {
        format!("'{}' | '{}'", self.host_prompt, self.options_prompt)
    }
}

/// Timing configuration for the driver.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Timeout for one command/sentinel exchange.
    pub exchange_timeout: Duration,
    /// Timeout for opening the transport session.
    pub connect_timeout: Duration,
    /// Interval between initial-menu polls.
    pub menu_poll_interval: Duration,
    /// Number of initial-menu polls before giving up.
    pub menu_poll_attempts: u32,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            exchange_timeout: DEFAULT_EXCHANGE_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            menu_poll_interval: DEFAULT_MENU_POLL_INTERVAL,
            menu_poll_attempts: DEFAULT_MENU_POLL_ATTEMPTS,
        }
    }
}

impl DriverConfig {
    /// Set the per-exchange timeout.
    #[must_use]
    pub const fn exchange_timeout(mut self, timeout: Duration) -> Self {
        self.exchange_timeout = timeout;
        self
    }

    /// Set the transport connect timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the initial-menu poll interval.
    #[must_use]
    pub const fn menu_poll_interval(mut self, interval: Duration) -> Self {
        self.menu_poll_interval = interval;
        self
    }

    /// Set the initial-menu poll attempt budget.
    #[must_use]
    pub const fn menu_poll_attempts(mut self, attempts: u32) -> Self {
        self.menu_poll_attempts = attempts;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_config_builder() {
        let config = SessionConfig::new("bastion.example.com", "admin")
            .port(2222)
            .password("secret");

        assert_eq!(config.host, "bastion.example.com");
        assert_eq!(config.port, 2222);
        assert_eq!(config.address(), "bastion.example.com:2222");
        assert!(matches!(
            config.credential().unwrap(),
            Credential::Password("secret")
        ));
    }

    #[test]
    fn credential_requires_one_kind() {
        let config = SessionConfig::new("h", "u");
        let err = config.credential().unwrap_err();
        assert!(matches!(err, JumpError::Config { .. }));
    }

    #[test]
    fn key_wins_over_password() {
        let config = SessionConfig::new("h", "u")
            .password("pw")
            .private_key("/home/u/.ssh/id_ed25519")
            .passphrase("hunter2");

        match config.credential().unwrap() {
            Credential::PrivateKey { path, passphrase } => {
                assert_eq!(path, &PathBuf::from("/home/u/.ssh/id_ed25519"));
                assert_eq!(passphrase, Some("hunter2"));
            }
            Credential::Password(_) => panic!("expected key credential"),
        }
    }

    #[test]
    fn dialect_sentinels() {
        let dialect = MenuDialect::default();
        assert!(dialect.has_exchange_sentinel("1) web 10.0.0.1\n[Host]>"));
        assert!(dialect.has_exchange_sentinel("back at Opt>"));
        assert!(!dialect.has_exchange_sentinel("still printing rows"));
        assert!(dialect.has_menu_ready("banner\nOpt>"));
    }

    #[test]
    fn driver_config_defaults() {
        let config = DriverConfig::default();
        assert_eq!(config.exchange_timeout, Duration::from_secs(5));
        assert_eq!(config.menu_poll_attempts, 10);
        assert_eq!(config.menu_poll_interval, Duration::from_millis(500));
    }
}
