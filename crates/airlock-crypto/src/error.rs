//! Crypto error types.

/// Errors from cryptographic operations.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("Sealing failed: {0}")]
    SealFailed(String),

    #[error("Opening failed: authentication tag mismatch or corrupted ciphertext")]
    OpenFailed,

    #[error("Invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    #[error("Invalid session secret length: expected {expected}, got {actual}")]
    InvalidSecretLength { expected: usize, actual: usize },
}
