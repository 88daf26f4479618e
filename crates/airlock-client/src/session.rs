//! Session material and the store that owns it.

use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use zeroize::{Zeroize, ZeroizeOnDrop};

use airlock_crypto::{KEY_SIZE, NONCE_SIZE};

use crate::codec;
use crate::storage::SessionStorage;

/// Live session material: the bearer token plus the symmetric key/nonce the
/// launcher derived for this session.
///
/// A session is always fully populated; "no session" is the absence of the
/// whole value, never a partially filled one. Replaced wholesale, never
/// field-patched.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Session {
    pub token: String,
    pub sym_key: [u8; KEY_SIZE],
    pub sym_nonce: [u8; NONCE_SIZE],
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("token", &self.token)
            .field("sym_key", &"[REDACTED]")
            .field("sym_nonce", &"[REDACTED]")
            .finish()
    }
}

/// Storage layout: `{token, symKey, symNonce}` with key material
/// base64-encoded.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedSession {
    token: String,
    sym_key: String,
    sym_nonce: String,
}

/// Owns the one live session per client instance.
///
/// Reads hand out snapshots; writes replace the whole value. The storage
/// collaborator receives a serialized copy on `persist` and a delete on
/// `clear`, and its failures never affect the in-memory state.
pub struct SessionStore {
    current: RwLock<Option<Session>>,
    storage: Arc<dyn SessionStorage>,
}

impl SessionStore {
    pub fn new(storage: Arc<dyn SessionStorage>) -> Self {
        Self {
            current: RwLock::new(None),
            storage,
        }
    }

    /// Snapshot of the live session. In-memory state is authoritative.
    pub fn current(&self) -> Option<Session> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Pull a previously persisted session from storage into memory.
    ///
    /// Absent or malformed stored bytes yield `None` and leave the in-memory
    /// state untouched.
    pub fn load_persisted(&self) -> Option<Session> {
        let bytes = self.storage.get()?;
        let Some(session) = Self::decode(&bytes) else {
            warn!("stored session is malformed, ignoring it");
            return None;
        };
        debug!("loaded persisted session");
        *self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(session.clone());
        Some(session)
    }

    /// Replace the in-memory session and hand a serialized copy to storage.
    ///
    /// The in-memory session is updated even when persistence fails; a
    /// storage failure is logged and swallowed.
    pub fn persist(&self, session: Session) {
        let bytes = Self::encode(&session);
        *self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(session);
        if let Err(e) = self.storage.set(&bytes) {
            warn!("failed to persist session: {e}");
        }
    }

    /// Drop the in-memory session and delete the stored copy.
    ///
    /// Idempotent; never fails, even when nothing was persisted.
    pub fn clear(&self) {
        *self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
        if let Err(e) = self.storage.clear() {
            debug!("failed to clear stored session: {e}");
        }
    }

    /// Serialize a session into its storage layout.
    pub fn encode(session: &Session) -> Vec<u8> {
        let persisted = PersistedSession {
            token: session.token.clone(),
            sym_key: codec::b64_encode(&session.sym_key),
            sym_nonce: codec::b64_encode(&session.sym_nonce),
        };
        serde_json::to_vec(&persisted).unwrap_or_default()
    }

    /// Deserialize a session from its storage layout. Malformed input is
    /// `None`, never a crash.
    pub fn decode(bytes: &[u8]) -> Option<Session> {
        let persisted: PersistedSession = serde_json::from_slice(bytes).ok()?;
        let sym_key: [u8; KEY_SIZE] = codec::b64_decode(&persisted.sym_key).ok()?.try_into().ok()?;
        let sym_nonce: [u8; NONCE_SIZE] =
            codec::b64_decode(&persisted.sym_nonce).ok()?.try_into().ok()?;
        Some(Session {
            token: persisted.token,
            sym_key,
            sym_nonce,
        })
    }
}
