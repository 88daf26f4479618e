//! Airlock Crypto Library
//!
//! Wraps the NaCl-style primitives the launcher protocol is built on:
//!
//! - **Box**: X25519 + XSalsa20-Poly1305 public-key authenticated encryption,
//!   used once per handshake to open the envelope carrying the session secret
//! - **Secretbox**: XSalsa20-Poly1305 symmetric authenticated encryption,
//!   used for every request/response body on an authenticated session
//!
//! Both constructions take a 24-byte nonce. The primitives themselves come
//! from the RustCrypto `crypto_box` / `crypto_secretbox` crates; this crate
//! only adds length checking, error mapping, and keypair hygiene.

pub mod cipher;
pub mod error;
pub mod keypair;

/// Size of a box/secretbox key in bytes.
pub const KEY_SIZE: usize = 32;

/// Size of a box/secretbox nonce in bytes.
pub const NONCE_SIZE: usize = 24;

/// Size of the opened handshake envelope: a symmetric key followed by a
/// symmetric nonce.
pub const SESSION_SECRET_SIZE: usize = KEY_SIZE + NONCE_SIZE;

#[cfg(any(test, feature = "test-utils"))]
pub use cipher::box_seal;
pub use cipher::{box_open, secretbox_open, secretbox_seal};
pub use error::CryptoError;
pub use keypair::{EphemeralKeyPair, random_nonce};
