//! jumpgate: asset enumeration through interactive bastion menus
//!
//! Some bastion hosts expose no API: after SSH login they drop the user
//! into a captive text menu, and the only way to list the assets behind
//! them is to drive that menu like a human would. This crate automates
//! the exchange: it sanitizes terminal output, correlates keystrokes with
//! sentinel prompts, walks the paginated asset list defensively, and
//! returns a deduplicated inventory.
//!
//! # Features
//!
//! - **Async-first design** with the Tokio runtime
//! - **Generic transport**: anything `AsyncRead + AsyncWrite` drives a session
//! - **SSH transport** via russh (feature: `ssh`)
//! - **Mock transport** for testing (feature: `mock`, on by default)
//! - **Defensive pagination** tolerant of missing and lying page metadata
//!
//! # Example
//!
//! ```ignore
//! use jumpgate::{JumpClient, SessionConfig, SshConnector, TableParser};
//!
//! #[tokio::main]
//! async fn main() -> jumpgate::Result<()> {
//!     let config = SessionConfig::new("bastion.example.com", "auditor")
//!         .password("secret");
//!     let mut client = JumpClient::new(config, SshConnector::new(), TableParser::new());
//!     let assets = client.get_all_assets().await?;
//!     for asset in &assets {
//!         println!("{} {}", asset.name, asset.address);
//!     }
//!     client.close().await;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod exchange;
pub mod page;
pub mod paginate;
pub mod sanitize;
pub mod session;

/// Mock shell transport for testing.
#[cfg(feature = "mock")]
pub mod mock;

/// SSH transport via russh.
#[cfg(feature = "ssh")]
pub mod ssh;

pub use client::{JumpClient, ShellConnector};
pub use config::{Credential, DriverConfig, MenuDialect, SessionConfig};
pub use error::{JumpError, Result};
pub use page::{AssetRecord, AssetSet, PageParser, Pagination, ParsedPage, TableParser};
pub use paginate::enumerate_assets;
pub use sanitize::{sanitize, strip_ansi};
pub use session::{MenuSession, SessionState};

#[cfg(feature = "mock")]
pub use mock::{MockConnector, MockShell};
#[cfg(feature = "ssh")]
pub use ssh::{SshConnector, SshShellStream};
