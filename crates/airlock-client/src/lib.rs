//! Airlock Client Library
//!
//! Establishes and maintains an encrypted, authenticated session with a
//! local launcher daemon over HTTP and carries application requests through
//! it:
//!
//! - a one-shot asymmetric key exchange that bootstraps the symmetric
//!   session key ([`handshake`])
//! - secretbox-sealed request/response envelopes ([`transport`])
//! - a reauthentication state machine over cached sessions ([`client`])
//! - a typed error taxonomy separating transport failures from launcher
//!   failures ([`error`])
//!
//! Resource-level APIs (directories, files, registered names) are thin
//! wrappers the embedding application layers on top of
//! [`LauncherClient::execute`]; this crate stops at the transport boundary.
//!
//! ```no_run
//! use airlock_client::{AppDescriptor, LauncherClient, Permission};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let app = AppDescriptor::new("Demo", "0.1.0", "Acme", "com.acme.demo")?;
//! let client = LauncherClient::new(app, vec![Permission::DriveAccess])?;
//! client.authenticate().await?;
//! # Ok(())
//! # }
//! ```

mod classify;
mod codec;

pub mod client;
pub mod config;
pub mod error;
pub mod handshake;
pub mod session;
pub mod storage;
pub mod transport;

pub use client::{AuthState, LauncherClient};
pub use config::{ClientConfig, DEFAULT_BASE_URL};
pub use error::{Error, ErrorKind, Result};
pub use handshake::{AppDescriptor, InvalidAppDescriptor, Permission, PermissionSet};
pub use session::{Session, SessionStore};
pub use storage::{FileStorage, MemoryStorage, SessionStorage};
pub use transport::{EncryptedTransport, RequestDescriptor, ResponseValue};
