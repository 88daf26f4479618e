//! The launcher client: construction, authentication lifecycle, and the
//! request entry point.

use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::handshake::{self, AUTH_PATH, AppDescriptor, Permission};
use crate::session::SessionStore;
use crate::storage::{MemoryStorage, SessionStorage};
use crate::transport::{EncryptedTransport, RequestDescriptor, ResponseValue};

/// Authentication lifecycle state.
///
/// `Authenticated` is entered on a successful probe or handshake; a 401 on
/// the authorization probe drops back to `Unauthenticated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Unauthenticated,
    Authenticating,
    Authenticated,
}

/// Client for a local launcher daemon.
///
/// Holds at most one live session. All requests go through
/// [`execute`](Self::execute); the session lifecycle is driven by
/// [`authenticate`](Self::authenticate), [`is_authorized`](Self::is_authorized)
/// and [`deauthorize`](Self::deauthorize).
pub struct LauncherClient {
    app: AppDescriptor,
    permissions: Vec<Permission>,
    store: Arc<SessionStore>,
    transport: EncryptedTransport,
    state: RwLock<AuthState>,
    /// Serializes handshakes: concurrent `authenticate()` calls coalesce on
    /// the first caller's session instead of racing the key exchange.
    handshake_lock: Mutex<()>,
}

impl LauncherClient {
    /// Client with default configuration and in-memory session storage.
    pub fn new(app: AppDescriptor, permissions: Vec<Permission>) -> Result<Self> {
        Self::with_storage(
            app,
            permissions,
            ClientConfig::default(),
            Arc::new(MemoryStorage::default()),
        )
    }

    /// Client with explicit configuration and in-memory session storage.
    pub fn with_config(
        app: AppDescriptor,
        permissions: Vec<Permission>,
        config: ClientConfig,
    ) -> Result<Self> {
        Self::with_storage(app, permissions, config, Arc::new(MemoryStorage::default()))
    }

    /// Client with explicit configuration and session storage.
    pub fn with_storage(
        app: AppDescriptor,
        permissions: Vec<Permission>,
        config: ClientConfig,
        storage: Arc<dyn SessionStorage>,
    ) -> Result<Self> {
        let store = Arc::new(SessionStore::new(storage));
        let transport = EncryptedTransport::new(&config, Arc::clone(&store))?;
        Ok(Self {
            app,
            permissions,
            store,
            transport,
            state: RwLock::new(AuthState::Unauthenticated),
            handshake_lock: Mutex::new(()),
        })
    }

    /// Current lifecycle state.
    pub fn auth_state(&self) -> AuthState {
        *self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether a session is currently held (live or loaded from storage).
    pub fn has_session(&self) -> bool {
        self.store.current().is_some()
    }

    /// The session store owning this client's live session.
    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Execute a request against the launcher.
    ///
    /// A 401 surfacing here is reported as-is; only the authorization probe
    /// inside [`authenticate`](Self::authenticate) / [`is_authorized`](Self::is_authorized)
    /// is allowed to clear the session.
    pub async fn execute(&self, req: RequestDescriptor) -> Result<ResponseValue> {
        self.transport.execute(req).await
    }

    /// Authenticate with the launcher, reusing a cached session when one
    /// still holds.
    ///
    /// No cached session goes straight to the key exchange. A cached session
    /// is probed first: success keeps it, a 401 clears it and re-runs the
    /// exchange, and any other failure propagates without clearing —
    /// transient failures must not destroy valid credentials.
    pub async fn authenticate(&self) -> Result<()> {
        let _guard = self.handshake_lock.lock().await;

        // Re-check under the lock; a racing caller may already have
        // established the session.
        let cached = self.store.current().is_some() || self.store.load_persisted().is_some();
        if !cached {
            debug!("no stored session, authorizing from scratch");
            return self.run_handshake().await;
        }

        debug!("stored session found, probing validity");
        match self.probe().await {
            Ok(()) => {
                self.set_state(AuthState::Authenticated);
                Ok(())
            }
            Err(e) if e.is_unauthorized() => {
                debug!("stored session rejected, clearing and re-authorizing");
                self.store.clear();
                self.set_state(AuthState::Unauthenticated);
                self.run_handshake().await
            }
            Err(e) => Err(e),
        }
    }

    /// Run a fresh key exchange unconditionally, replacing any session.
    pub async fn authorize(&self) -> Result<()> {
        let _guard = self.handshake_lock.lock().await;
        self.run_handshake().await
    }

    /// Probe the launcher with the current session, resolving to a bool.
    ///
    /// A 401 clears the stored session and resolves `false` instead of
    /// propagating; any other failure propagates untouched.
    pub async fn is_authorized(&self) -> Result<bool> {
        match self.probe().await {
            Ok(()) => {
                self.set_state(AuthState::Authenticated);
                Ok(true)
            }
            Err(e) if e.is_unauthorized() => {
                debug!("not authorized, removing stored session");
                self.store.clear();
                self.set_state(AuthState::Unauthenticated);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Delete the session on the launcher, then clear the local copy.
    ///
    /// The local session is cleared on any HTTP outcome, success or error;
    /// only a network-level failure (the daemon was never reached) leaves
    /// it in place.
    pub async fn deauthorize(&self) -> Result<()> {
        let result = self
            .transport
            .execute(RequestDescriptor::delete(AUTH_PATH).auth())
            .await;
        match result {
            Ok(_) => {
                self.clear_session();
                info!("deauthorized and cleared stored session");
                Ok(())
            }
            Err(e @ Error::Network { .. }) => Err(e),
            Err(e) => {
                self.clear_session();
                Err(e)
            }
        }
    }

    async fn run_handshake(&self) -> Result<()> {
        self.set_state(AuthState::Authenticating);
        match handshake::perform(&self.transport, &self.app, &self.permissions).await {
            Ok(session) => {
                self.store.persist(session);
                self.set_state(AuthState::Authenticated);
                info!(app = self.app.name(), "authorized with the launcher");
                Ok(())
            }
            Err(e) => {
                self.set_state(AuthState::Unauthenticated);
                Err(e)
            }
        }
    }

    async fn probe(&self) -> Result<()> {
        self.transport
            .execute(RequestDescriptor::get(AUTH_PATH).auth())
            .await
            .map(|_| ())
    }

    fn clear_session(&self) {
        self.store.clear();
        self.set_state(AuthState::Unauthenticated);
    }

    fn set_state(&self, state: AuthState) {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = state;
    }
}
