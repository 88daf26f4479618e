//! Error taxonomy for launcher communication.
//!
//! Every failure a call can surface is one of four kinds. The kind tells the
//! caller what was touched: a `Network` failure never reached the daemon, an
//! `Http` failure reached it but carried no decryptable application error,
//! a `Launcher` failure is the daemon speaking through the encrypted
//! envelope, and `Generic` covers decoding and crypto failures local to the
//! call.

use thiserror::Error;

/// Result type alias using the launcher client [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// The four failure classes, matched exhaustively by callers deciding
/// whether to retry, re-authenticate, or surface the error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Network,
    Http,
    Launcher,
    Generic,
}

/// A classified launcher communication failure.
#[derive(Debug, Error)]
pub enum Error {
    /// The daemon could not be reached at all. No session state was touched.
    #[error("network error: {message}")]
    Network { message: String },

    /// Non-2xx response with no decryptable structured body. The session is
    /// left untouched.
    #[error("http error ({status}): {message}")]
    Http { status: u16, message: String },

    /// Structured application error decrypted from the launcher's response.
    /// `raw` keeps the undecrypted body text for diagnostics.
    #[error("launcher error ({status}): {message}")]
    Launcher {
        status: u16,
        message: String,
        raw: Option<String>,
    },

    /// Unexpected failure: decoding, a cryptographic open that did not
    /// verify, a malformed response. Fatal to the call, not to the session.
    #[error("{message}")]
    Generic { message: String },
}

impl Error {
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Network { .. } => ErrorKind::Network,
            Self::Http { .. } => ErrorKind::Http,
            Self::Launcher { .. } => ErrorKind::Launcher,
            Self::Generic { .. } => ErrorKind::Generic,
        }
    }

    /// Numeric status carried by the error; `0` when none applies.
    pub const fn status(&self) -> u16 {
        match self {
            Self::Http { status, .. } | Self::Launcher { status, .. } => *status,
            Self::Network { .. } | Self::Generic { .. } => 0,
        }
    }

    /// Whether this failure is an authorization rejection.
    pub const fn is_unauthorized(&self) -> bool {
        self.status() == 401
    }

    pub(crate) fn generic(message: impl Into<String>) -> Self {
        Self::Generic {
            message: message.into(),
        }
    }
}

impl From<airlock_crypto::CryptoError> for Error {
    fn from(err: airlock_crypto::CryptoError) -> Self {
        Self::generic(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::generic(format!("JSON error: {err}"))
    }
}
