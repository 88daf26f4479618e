//! The one-shot key exchange that bootstraps a session.
//!
//! The client generates a fresh ephemeral keypair and nonce, posts them in
//! the clear (no shared secret exists yet; this is the only request ever
//! sent unencrypted), and opens the returned box envelope to recover the
//! symmetric key and nonce every later call is sealed with. The ephemeral
//! material is consumed by the one attempt and dropped.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use airlock_crypto::{
    EphemeralKeyPair, KEY_SIZE, NONCE_SIZE, SESSION_SECRET_SIZE, box_open, random_nonce,
};

use crate::codec;
use crate::error::{Error, Result};
use crate::session::Session;
use crate::transport::{EncryptedTransport, RequestDescriptor};

/// Auth endpoint, shared by the handshake, the probe, and deauthorization.
pub(crate) const AUTH_PATH: &str = "/auth";

/// Identity an application presents to the launcher during the handshake.
///
/// Immutable for the process lifetime; every field must be non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppDescriptor {
    name: String,
    version: String,
    vendor: String,
    id: String,
}

/// Rejected [`AppDescriptor`] construction. This is a caller error, not a
/// protocol error, and deliberately lives outside the transport taxonomy.
#[derive(Debug, Error)]
#[error("app descriptor field `{field}` must be non-empty")]
pub struct InvalidAppDescriptor {
    field: &'static str,
}

impl AppDescriptor {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        vendor: impl Into<String>,
        id: impl Into<String>,
    ) -> std::result::Result<Self, InvalidAppDescriptor> {
        let descriptor = Self {
            name: name.into(),
            version: version.into(),
            vendor: vendor.into(),
            id: id.into(),
        };
        for (field, value) in [
            ("name", &descriptor.name),
            ("version", &descriptor.version),
            ("vendor", &descriptor.vendor),
            ("id", &descriptor.id),
        ] {
            if value.is_empty() {
                return Err(InvalidAppDescriptor { field });
            }
        }
        Ok(descriptor)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

/// Elevated permissions an application can request during the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Permission {
    /// Access to the user's shared drive.
    DriveAccess,
}

/// Ordered set of requested permissions; empty means no elevated
/// permissions.
pub type PermissionSet = Vec<Permission>;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HandshakeRequest<'a> {
    app: &'a AppDescriptor,
    public_key: String,
    nonce: String,
    permissions: &'a [Permission],
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct HandshakeResponse {
    public_key: String,
    token: String,
    encrypted_key: String,
}

/// Run the handshake against the launcher and produce a fresh session.
///
/// The caller (the reauthentication machine) is responsible for persisting
/// the session and for serializing concurrent attempts.
pub(crate) async fn perform(
    transport: &EncryptedTransport,
    app: &AppDescriptor,
    permissions: &[Permission],
) -> Result<Session> {
    let keypair = EphemeralKeyPair::generate();
    let nonce = random_nonce();

    let payload = HandshakeRequest {
        app,
        public_key: codec::b64_encode(&keypair.public_bytes()),
        nonce: codec::b64_encode(&nonce),
        permissions,
    };

    debug!(app = app.name(), "starting launcher handshake");
    let value = transport
        .execute(RequestDescriptor::post(AUTH_PATH).body(serde_json::to_value(&payload)?))
        .await?
        .into_json()?;
    let response: HandshakeResponse = serde_json::from_value(value)?;

    let (sym_key, sym_nonce) = open_session_secret(&response, &keypair, &nonce)?;
    debug!("handshake complete, session established");

    Ok(Session {
        token: response.token,
        sym_key,
        sym_nonce,
    })
}

/// Open the handshake envelope and split it into session key material.
///
/// The envelope must open to exactly 56 bytes: a 32-byte symmetric key
/// followed by a 24-byte symmetric nonce. A failed open or a wrong-sized
/// buffer is fatal to the handshake; nothing is ever salvaged from
/// unverified data.
fn open_session_secret(
    response: &HandshakeResponse,
    keypair: &EphemeralKeyPair,
    nonce: &[u8; NONCE_SIZE],
) -> Result<([u8; KEY_SIZE], [u8; NONCE_SIZE])> {
    let launcher_public = codec::b64_decode(&response.public_key)
        .map_err(|e| Error::generic(format!("launcher public key is not valid base64: {e}")))?;
    let envelope = codec::b64_decode(&response.encrypted_key)
        .map_err(|e| Error::generic(format!("encrypted key is not valid base64: {e}")))?;

    let opened = box_open(&envelope, nonce, &launcher_public, keypair)?;
    if opened.len() != SESSION_SECRET_SIZE {
        return Err(Error::generic(format!(
            "session secret must be {SESSION_SECRET_SIZE} bytes, got {}",
            opened.len()
        )));
    }

    let mut sym_key = [0u8; KEY_SIZE];
    sym_key.copy_from_slice(&opened[..KEY_SIZE]);
    let mut sym_nonce = [0u8; NONCE_SIZE];
    sym_nonce.copy_from_slice(&opened[KEY_SIZE..]);
    Ok((sym_key, sym_nonce))
}
