//! Request construction and the encrypted transport.
//!
//! Every call against the launcher is described by a [`RequestDescriptor`]
//! and carried by [`EncryptedTransport::execute`], which seals the request
//! under the current session, interprets the response envelope, and maps
//! failures into the error taxonomy. A request reads one session snapshot
//! at submit time; a concurrent rotation never affects a call in flight.

use std::sync::Arc;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde_json::Value;
use tracing::debug;

use airlock_crypto::{secretbox_open, secretbox_seal};

use crate::classify;
use crate::codec;
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::session::{Session, SessionStore};

/// Plaintext bodies the launcher may return even on an authenticated call.
/// Matched exactly and case-sensitively against the full body; anything else
/// on an authenticated call is ciphertext.
const PLAINTEXT_SENTINELS: [&str; 4] = ["OK", "Accepted", "Unauthorized", "Server Error"];

fn is_sentinel(text: &str) -> bool {
    PLAINTEXT_SENTINELS.contains(&text)
}

/// A single request against the launcher.
///
/// Built fresh per call; immutable once submitted to
/// [`EncryptedTransport::execute`].
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    method: Method,
    path: String,
    body: Option<Value>,
    query: Option<Vec<(String, String)>>,
    needs_auth: bool,
    wants_metadata: bool,
}

impl RequestDescriptor {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            query: None,
            needs_auth: false,
            wants_metadata: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Attach a body. A string value is sent verbatim; any other value is
    /// serialized to its JSON text.
    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Require the bearer token and request/response encryption. The two are
    /// coupled: authentication implies the encrypted envelope.
    pub fn auth(mut self) -> Self {
        self.needs_auth = true;
        self
    }

    /// Attach query parameters. Entries are percent-encoded and joined; on
    /// an authenticated call the whole query string is encrypted as a unit.
    pub fn query<I, K, V>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.query = Some(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    /// Also return the response headers alongside the decoded body.
    pub fn with_metadata(mut self) -> Self {
        self.wants_metadata = true;
        self
    }
}

/// Decoded response payload.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseValue {
    /// The call succeeded and carries no payload (a literal `"OK"` body).
    None,
    /// Decoded JSON value; non-JSON response text surfaces as a JSON string.
    Json(Value),
    /// Payload plus response headers, for requests built with
    /// [`RequestDescriptor::with_metadata`].
    WithMeta {
        body: Box<ResponseValue>,
        meta: Vec<(String, String)>,
    },
}

impl ResponseValue {
    /// The inner JSON value; an empty payload is an error.
    pub fn into_json(self) -> Result<Value> {
        match self {
            Self::Json(value) => Ok(value),
            Self::WithMeta { body, .. } => body.into_json(),
            Self::None => Err(Error::generic("response carried no payload")),
        }
    }

    pub const fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

/// Builds, sends, and interprets individual requests against the session.
pub struct EncryptedTransport {
    http: reqwest::Client,
    base_url: String,
    store: Arc<SessionStore>,
}

impl EncryptedTransport {
    pub(crate) fn new(config: &ClientConfig, store: Arc<SessionStore>) -> Result<Self> {
        if config.base_url.is_empty() {
            return Err(Error::generic("base_url is empty"));
        }
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| Error::generic(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            store,
        })
    }

    /// Execute a request and decode its response.
    pub async fn execute(&self, req: RequestDescriptor) -> Result<ResponseValue> {
        // One snapshot for the whole call; see the module docs.
        let session = self.store.current();
        let url = self.build_url(&req, session.as_ref())?;

        let mut builder = self.http.request(req.method.clone(), &url);

        if req.needs_auth {
            // An absent session still sends an empty bearer token: the probe
            // endpoint answers 401 in that case, which callers rely on.
            let token = session.as_ref().map(|s| s.token.clone()).unwrap_or_default();
            builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
        }

        if req.method == Method::POST || req.method == Method::PUT {
            // JSON when plaintext, opaque text when the body is ciphertext.
            let content_type = if req.needs_auth {
                "text/plain"
            } else {
                "application/json"
            };
            builder = builder.header(CONTENT_TYPE, content_type);
        }

        if let Some(body) = &req.body {
            let text = body_text(body);
            let payload = if req.needs_auth {
                let session = session
                    .as_ref()
                    .ok_or_else(|| Error::generic("no active session to encrypt with"))?;
                encrypt_text(&text, session)?
            } else {
                text
            };
            builder = builder.body(payload);
        }

        debug!(method = %req.method, path = %req.path, auth = req.needs_auth, "sending launcher request");

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                return Err(Error::Network {
                    message: format!("could not connect to the launcher: {e}"),
                });
            }
        };

        let status = response.status();
        let meta: Vec<(String, String)> = if req.wants_metadata {
            response
                .headers()
                .iter()
                .map(|(name, value)| {
                    (
                        name.to_string(),
                        String::from_utf8_lossy(value.as_bytes()).into_owned(),
                    )
                })
                .collect()
        } else {
            Vec::new()
        };
        let text = response
            .text()
            .await
            .map_err(|e| Error::generic(format!("failed to read response body: {e}")))?;

        debug!(status = status.as_u16(), "launcher responded");

        if status.is_success() {
            let body = decode_success(&req, session.as_ref(), &text)?;
            if req.wants_metadata {
                Ok(ResponseValue::WithMeta {
                    body: Box::new(body),
                    meta,
                })
            } else {
                Ok(body)
            }
        } else {
            Err(decode_failure(&req, session.as_ref(), status, text))
        }
    }

    fn build_url(&self, req: &RequestDescriptor, session: Option<&Session>) -> Result<String> {
        let mut url = format!("{}{}", self.base_url, req.path);
        if let Some(query) = &req.query {
            if query.is_empty() {
                return Ok(url);
            }
            let joined = query
                .iter()
                .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
                .collect::<Vec<_>>()
                .join("&");
            let component = if req.needs_auth {
                let session =
                    session.ok_or_else(|| Error::generic("no active session to encrypt with"))?;
                encrypt_text(&joined, session)?
            } else {
                joined
            };
            url.push('?');
            url.push_str(&component);
        }
        Ok(url)
    }
}

/// Decode a 2xx response body per the envelope rules.
fn decode_success(
    req: &RequestDescriptor,
    session: Option<&Session>,
    text: &str,
) -> Result<ResponseValue> {
    if !req.needs_auth || is_sentinel(text) {
        if text == "OK" {
            return Ok(ResponseValue::None);
        }
        return Ok(ResponseValue::Json(codec::parse_json_or_text(text)));
    }
    let session = session.ok_or_else(|| Error::generic("no active session to decrypt with"))?;
    let decrypted = decrypt_text(text, session)?;
    Ok(ResponseValue::Json(codec::parse_json_or_text(&decrypted)))
}

/// Turn a non-2xx response into the matching error kind.
fn decode_failure(
    req: &RequestDescriptor,
    session: Option<&Session>,
    status: StatusCode,
    text: String,
) -> Error {
    if req.needs_auth && !is_sentinel(&text) {
        if let Some(session) = session {
            return match decrypt_text(&text, session) {
                Ok(decrypted) => {
                    let body = codec::parse_json_or_text(&decrypted);
                    let fault = classify::normalize(&body, status.as_u16());
                    Error::Launcher {
                        status: fault.status,
                        message: fault.message,
                        raw: Some(text),
                    }
                }
                // An error body that fails to open is a failure of this
                // call, not a launcher-reported error.
                Err(err) => err,
            };
        }
    }
    // Plaintext failure. A structured body is still a launcher-reported
    // error (the handshake endpoint answers in the clear); anything else is
    // a plain HTTP failure with the raw text as message.
    let body = codec::parse_json_or_text(&text);
    if body.get("description").is_some() {
        let fault = classify::normalize(&body, status.as_u16());
        return Error::Launcher {
            status: fault.status,
            message: fault.message,
            raw: Some(text),
        };
    }
    Error::Http {
        status: status.as_u16(),
        message: text,
    }
}

/// A string body is sent verbatim; any other value becomes its JSON text.
fn body_text(body: &Value) -> String {
    match body {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn encrypt_text(text: &str, session: &Session) -> Result<String> {
    let sealed = secretbox_seal(text.as_bytes(), &session.sym_nonce, &session.sym_key)?;
    Ok(codec::b64_encode(&sealed))
}

fn decrypt_text(text: &str, session: &Session) -> Result<String> {
    let raw = codec::b64_decode(text)
        .map_err(|e| Error::generic(format!("response body is not valid base64: {e}")))?;
    let opened = secretbox_open(&raw, &session.sym_nonce, &session.sym_key)?;
    String::from_utf8(opened).map_err(|e| Error::generic(format!("decrypted body is not UTF-8: {e}")))
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use airlock_crypto::{KEY_SIZE, NONCE_SIZE};
    use serde_json::json;

    fn test_session() -> Session {
        Session {
            token: "tok".to_owned(),
            sym_key: [7u8; KEY_SIZE],
            sym_nonce: [9u8; NONCE_SIZE],
        }
    }

    fn seal_body(value: &Value, session: &Session) -> String {
        let text = serde_json::to_string(value).unwrap();
        encrypt_text(&text, session).unwrap()
    }

    #[test]
    fn sentinel_match_is_exact_and_case_sensitive() {
        assert!(is_sentinel("OK"));
        assert!(is_sentinel("Accepted"));
        assert!(is_sentinel("Unauthorized"));
        assert!(is_sentinel("Server Error"));

        assert!(!is_sentinel("ok"));
        assert!(!is_sentinel("OK "));
        assert!(!is_sentinel("OKAY"));
        assert!(!is_sentinel("Accepted: yes"));
    }

    #[test]
    fn body_text_keeps_strings_verbatim() {
        assert_eq!(body_text(&json!("raw text")), "raw text");
        assert_eq!(body_text(&json!({"a": 1})), r#"{"a":1}"#);
    }

    #[test]
    fn encrypt_decrypt_text_roundtrip() {
        let session = test_session();
        let sealed = encrypt_text("offset=0&length=10", &session).unwrap();
        assert_eq!(decrypt_text(&sealed, &session).unwrap(), "offset=0&length=10");
    }

    #[test]
    fn ok_sentinel_collapses_to_none() {
        let req = RequestDescriptor::get("/x").auth();
        let value = decode_success(&req, Some(&test_session()), "OK").unwrap();
        assert!(value.is_none());
    }

    #[test]
    fn sentinel_bypasses_decryption() {
        // "Accepted" would not be valid ciphertext; the sentinel check must
        // short-circuit before any decode attempt.
        let req = RequestDescriptor::get("/x").auth();
        let value = decode_success(&req, Some(&test_session()), "Accepted").unwrap();
        assert_eq!(value, ResponseValue::Json(json!("Accepted")));
    }

    #[test]
    fn unauthenticated_success_parses_json() {
        let req = RequestDescriptor::get("/x");
        let value = decode_success(&req, None, r#"{"token": "t"}"#).unwrap();
        assert_eq!(value, ResponseValue::Json(json!({"token": "t"})));
    }

    #[test]
    fn authenticated_success_decrypts() {
        let session = test_session();
        let req = RequestDescriptor::get("/x").auth();
        let sealed = seal_body(&json!({"names": ["a", "b"]}), &session);

        let value = decode_success(&req, Some(&session), &sealed).unwrap();
        assert_eq!(value, ResponseValue::Json(json!({"names": ["a", "b"]})));
    }

    #[test]
    fn authenticated_failure_decrypts_and_classifies() {
        let session = test_session();
        let req = RequestDescriptor::get("/x").auth();
        let sealed = seal_body(&json!({"description": "bad token", "errorCode": 401}), &session);

        let err = decode_failure(&req, Some(&session), StatusCode::INTERNAL_SERVER_ERROR, sealed);
        match err {
            Error::Launcher { status, message, raw } => {
                assert_eq!(status, 401);
                assert_eq!(message, "bad token");
                assert!(raw.is_some());
            }
            other => panic!("expected launcher error, got {other:?}"),
        }
    }

    #[test]
    fn plaintext_structured_failure_is_launcher_error() {
        // The handshake endpoint reports errors in the clear; a structured
        // body still gets the launcher classification.
        let req = RequestDescriptor::post("/auth");
        let err = decode_failure(
            &req,
            None,
            StatusCode::BAD_REQUEST,
            r#"{"description": "app id rejected", "errorCode": 400}"#.to_owned(),
        );
        match err {
            Error::Launcher { status, message, .. } => {
                assert_eq!(status, 400);
                assert_eq!(message, "app id rejected");
            }
            other => panic!("expected launcher error, got {other:?}"),
        }
    }

    #[test]
    fn sentinel_failure_is_http_error() {
        let req = RequestDescriptor::get("/x").auth();
        let err = decode_failure(
            &req,
            Some(&test_session()),
            StatusCode::UNAUTHORIZED,
            "Unauthorized".to_owned(),
        );
        match err {
            Error::Http { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message, "Unauthorized");
            }
            other => panic!("expected http error, got {other:?}"),
        }
    }

    #[test]
    fn undecryptable_failure_body_is_generic() {
        let req = RequestDescriptor::get("/x").auth();
        let err = decode_failure(
            &req,
            Some(&test_session()),
            StatusCode::INTERNAL_SERVER_ERROR,
            codec::b64_encode(b"garbage that will not open"),
        );
        assert_eq!(err.kind(), crate::error::ErrorKind::Generic);
    }

    #[test]
    fn build_url_percent_encodes_query() {
        let store = Arc::new(SessionStore::new(Arc::new(
            crate::storage::MemoryStorage::default(),
        )));
        let transport =
            EncryptedTransport::new(&ClientConfig::with_base_url("http://localhost:8100"), store)
                .unwrap();

        let req = RequestDescriptor::get("/files").query([("path", "dir/a b.txt")]);
        let url = transport.build_url(&req, None).unwrap();
        assert_eq!(url, "http://localhost:8100/files?path=dir%2Fa%20b.txt");
    }

    #[test]
    fn build_url_encrypts_query_as_unit_when_authed() {
        let store = Arc::new(SessionStore::new(Arc::new(
            crate::storage::MemoryStorage::default(),
        )));
        let transport =
            EncryptedTransport::new(&ClientConfig::with_base_url("http://localhost:8100"), store)
                .unwrap();
        let session = test_session();

        let req = RequestDescriptor::get("/files")
            .query([("offset", "0"), ("length", "10")])
            .auth();
        let url = transport.build_url(&req, Some(&session)).unwrap();

        let (_, component) = url.split_once('?').unwrap();
        assert_eq!(
            decrypt_text(component, &session).unwrap(),
            "offset=0&length=10"
        );
    }

    #[test]
    fn authed_query_without_session_is_generic_error() {
        let store = Arc::new(SessionStore::new(Arc::new(
            crate::storage::MemoryStorage::default(),
        )));
        let transport =
            EncryptedTransport::new(&ClientConfig::with_base_url("http://localhost:8100"), store)
                .unwrap();

        let req = RequestDescriptor::get("/files").query([("a", "1")]).auth();
        let err = transport.build_url(&req, None).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Generic);
    }

    #[test]
    fn into_json_unwraps_meta() {
        let wrapped = ResponseValue::WithMeta {
            body: Box::new(ResponseValue::Json(json!(1))),
            meta: vec![("content-length".into(), "1".into())],
        };
        assert_eq!(wrapped.into_json().unwrap(), json!(1));
        assert!(ResponseValue::None.into_json().is_err());
    }
}
