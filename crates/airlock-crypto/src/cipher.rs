//! Box and secretbox operations.
//!
//! The handshake envelope is opened with box (X25519 + XSalsa20-Poly1305);
//! everything after the handshake is sealed and opened with secretbox under
//! the session key. A failed open means the authentication tag did not
//! verify and no plaintext is ever returned.

use crypto_box::aead::Aead;
use crypto_box::{Nonce as BoxNonce, PublicKey, SalsaBox};
use crypto_secretbox::aead::KeyInit;
use crypto_secretbox::{Key, Nonce as SecretboxNonce, XSalsa20Poly1305};

use crate::error::CryptoError;
use crate::keypair::EphemeralKeyPair;
use crate::{KEY_SIZE, NONCE_SIZE};

fn public_key_from(bytes: &[u8]) -> Result<PublicKey, CryptoError> {
    if bytes.len() != KEY_SIZE {
        return Err(CryptoError::InvalidKeyLength {
            expected: KEY_SIZE,
            actual: bytes.len(),
        });
    }
    let mut arr = [0u8; KEY_SIZE];
    arr.copy_from_slice(bytes);
    Ok(PublicKey::from(arr))
}

/// Open a box ciphertext sealed by the peer.
///
/// `peer_public` is the peer's raw 32-byte public key; our side of the
/// exchange comes from the ephemeral keypair generated for this handshake.
pub fn box_open(
    ciphertext: &[u8],
    nonce: &[u8; NONCE_SIZE],
    peer_public: &[u8],
    keypair: &EphemeralKeyPair,
) -> Result<Vec<u8>, CryptoError> {
    let peer = public_key_from(peer_public)?;
    let salsa_box = SalsaBox::new(&peer, keypair.secret());
    salsa_box
        .decrypt(&BoxNonce::from(*nonce), ciphertext)
        .map_err(|_| CryptoError::OpenFailed)
}

/// Seal a box ciphertext for the peer.
///
/// This is the launcher's side of the handshake; the client only ever opens.
/// Exposed for tests and mock launchers.
#[cfg(any(test, feature = "test-utils"))]
pub fn box_seal(
    plaintext: &[u8],
    nonce: &[u8; NONCE_SIZE],
    peer_public: &[u8],
    keypair: &EphemeralKeyPair,
) -> Result<Vec<u8>, CryptoError> {
    let peer = public_key_from(peer_public)?;
    let salsa_box = SalsaBox::new(&peer, keypair.secret());
    salsa_box
        .encrypt(&BoxNonce::from(*nonce), plaintext)
        .map_err(|e| CryptoError::SealFailed(e.to_string()))
}

/// Seal plaintext with the session's symmetric key and nonce.
pub fn secretbox_seal(
    plaintext: &[u8],
    nonce: &[u8; NONCE_SIZE],
    key: &[u8; KEY_SIZE],
) -> Result<Vec<u8>, CryptoError> {
    let cipher = XSalsa20Poly1305::new(&Key::from(*key));
    cipher
        .encrypt(&SecretboxNonce::from(*nonce), plaintext)
        .map_err(|e| CryptoError::SealFailed(e.to_string()))
}

/// Open ciphertext sealed with the session's symmetric key and nonce.
pub fn secretbox_open(
    ciphertext: &[u8],
    nonce: &[u8; NONCE_SIZE],
    key: &[u8; KEY_SIZE],
) -> Result<Vec<u8>, CryptoError> {
    let cipher = XSalsa20Poly1305::new(&Key::from(*key));
    cipher
        .decrypt(&SecretboxNonce::from(*nonce), ciphertext)
        .map_err(|_| CryptoError::OpenFailed)
}
