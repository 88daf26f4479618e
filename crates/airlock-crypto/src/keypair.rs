//! Ephemeral keypair and nonce generation for the handshake.
//!
//! Every handshake attempt generates a fresh X25519 keypair and a fresh
//! 24-byte nonce. Both are consumed by that one attempt and then dropped;
//! reusing either across attempts would weaken the box construction.

use crypto_box::{PublicKey, SecretKey};
use rand::RngCore;
use rand::rngs::OsRng;

use crate::NONCE_SIZE;

/// An ephemeral X25519 keypair for a single handshake attempt.
///
/// The secret key is zeroized on drop by the underlying `crypto_box` type.
pub struct EphemeralKeyPair {
    secret: SecretKey,
    public: PublicKey,
}

impl std::fmt::Debug for EphemeralKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EphemeralKeyPair")
            .field("public", &self.public)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

impl Default for EphemeralKeyPair {
    fn default() -> Self {
        Self::generate()
    }
}

impl EphemeralKeyPair {
    /// Generate a new random ephemeral keypair.
    pub fn generate() -> Self {
        let secret = SecretKey::generate(&mut OsRng);
        let public = secret.public_key();
        Self { secret, public }
    }

    /// Get the public key as raw bytes, for the handshake payload.
    pub fn public_bytes(&self) -> [u8; 32] {
        *self.public.as_bytes()
    }

    /// Get the secret key reference for box operations.
    pub(crate) const fn secret(&self) -> &SecretKey {
        &self.secret
    }
}

/// Generate a fresh random 24-byte nonce.
pub fn random_nonce() -> [u8; NONCE_SIZE] {
    let mut nonce = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce);
    nonce
}
