//! Shared test harness: a fake launcher implemented on wiremock.
//!
//! The launcher side of the protocol (sealing the session secret against the
//! client's handshake key, secretbox-sealing response bodies) comes from
//! airlock-crypto's `test-utils` feature.

#![allow(dead_code)]
#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::{Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use airlock_client::{
    AppDescriptor, ClientConfig, LauncherClient, Permission, Session, SessionStorage, SessionStore,
    storage::MemoryStorage,
};
use airlock_crypto::{
    EphemeralKeyPair, KEY_SIZE, NONCE_SIZE, SESSION_SECRET_SIZE, box_seal, secretbox_open,
    secretbox_seal,
};

pub fn b64(bytes: impl AsRef<[u8]>) -> String {
    BASE64.encode(bytes)
}

pub fn b64d(text: &str) -> Vec<u8> {
    BASE64.decode(text).unwrap()
}

/// Launcher-side state: its box keypair, the session secret it hands out,
/// and the token it mints.
pub struct LauncherState {
    keypair: EphemeralKeyPair,
    secret: [u8; SESSION_SECRET_SIZE],
    pub token: String,
}

impl LauncherState {
    pub fn new(token: &str) -> Self {
        let mut secret = [0u8; SESSION_SECRET_SIZE];
        for (i, byte) in secret.iter_mut().enumerate() {
            *byte = (i as u8).wrapping_mul(3).wrapping_add(1);
        }
        Self {
            keypair: EphemeralKeyPair::generate(),
            secret,
            token: token.to_owned(),
        }
    }

    pub fn sym_key(&self) -> [u8; KEY_SIZE] {
        let mut key = [0u8; KEY_SIZE];
        key.copy_from_slice(&self.secret[..KEY_SIZE]);
        key
    }

    pub fn sym_nonce(&self) -> [u8; NONCE_SIZE] {
        let mut nonce = [0u8; NONCE_SIZE];
        nonce.copy_from_slice(&self.secret[KEY_SIZE..]);
        nonce
    }

    /// The session a client holds after handshaking against this launcher.
    pub fn session(&self) -> Session {
        Session {
            token: self.token.clone(),
            sym_key: self.sym_key(),
            sym_nonce: self.sym_nonce(),
        }
    }

    /// Seal a JSON value the way the launcher encrypts response bodies.
    pub fn seal_json(&self, value: &Value) -> String {
        let sealed =
            secretbox_seal(value.to_string().as_bytes(), &self.sym_nonce(), &self.sym_key())
                .unwrap();
        b64(sealed)
    }

    /// Open an encrypted client request body (base64 text of sealed bytes).
    pub fn open_text(&self, body: &[u8]) -> String {
        let text = String::from_utf8(body.to_vec()).unwrap();
        let opened = secretbox_open(&b64d(&text), &self.sym_nonce(), &self.sym_key()).unwrap();
        String::from_utf8(opened).unwrap()
    }
}

/// Answers the handshake POST by sealing the session secret against the
/// public key and nonce the client just sent.
pub struct HandshakeResponder(pub Arc<LauncherState>);

impl Respond for HandshakeResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let payload: Value = serde_json::from_slice(&request.body).unwrap();
        let client_public = b64d(payload["publicKey"].as_str().unwrap());
        let nonce: [u8; NONCE_SIZE] = b64d(payload["nonce"].as_str().unwrap()).try_into().unwrap();

        let envelope = box_seal(&self.0.secret, &nonce, &client_public, &self.0.keypair).unwrap();
        ResponseTemplate::new(200).set_body_json(json!({
            "publicKey": b64(self.0.keypair.public_bytes()),
            "token": self.0.token,
            "encryptedKey": b64(envelope),
        }))
    }
}

pub async fn mount_handshake(server: &MockServer, launcher: &Arc<LauncherState>) {
    Mock::given(method("POST"))
        .and(path("/auth"))
        .respond_with(HandshakeResponder(Arc::clone(launcher)))
        .mount(server)
        .await;
}

/// Gate that accepts exactly one bearer token: anything else is a 401 with
/// the plaintext sentinel body, like the real daemon.
pub struct TokenGate {
    pub launcher: Arc<LauncherState>,
    pub valid_token: String,
    pub body: Value,
}

impl Respond for TokenGate {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let bearer = request
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if bearer == format!("Bearer {}", self.valid_token) {
            ResponseTemplate::new(200).set_body_string(self.launcher.seal_json(&self.body))
        } else {
            ResponseTemplate::new(401).set_body_string("Unauthorized")
        }
    }
}

/// Opens the client's encrypted request body and echoes it back, sealed.
pub struct EchoSealed(pub Arc<LauncherState>);

impl Respond for EchoSealed {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let decrypted = self.0.open_text(&request.body);
        let value: Value = serde_json::from_str(&decrypted).unwrap();
        ResponseTemplate::new(200).set_body_string(self.0.seal_json(&json!({ "echo": value })))
    }
}

pub fn test_app() -> AppDescriptor {
    AppDescriptor::new("Test App", "0.1.0", "Acme", "com.acme.test").unwrap()
}

pub fn test_client(server_uri: &str, storage: Arc<dyn SessionStorage>) -> LauncherClient {
    LauncherClient::with_storage(
        test_app(),
        vec![Permission::DriveAccess],
        ClientConfig::with_base_url(server_uri),
        storage,
    )
    .unwrap()
}

/// Storage pre-seeded with a persisted copy of `session`.
pub fn storage_with_session(session: &Session) -> Arc<MemoryStorage> {
    let storage = Arc::new(MemoryStorage::default());
    storage.set(&SessionStore::encode(session)).unwrap();
    storage
}
