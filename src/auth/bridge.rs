// Cross-Environment Session Bridge
// The identity computed once on the server is re-derived independently in
// the browser after hydration. The two resolutions are reconciled through
// an explicit invalidation signal rather than assumed to stay in sync.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use super::provider::IdentityApi;
use super::session::{Session, User};
use super::tokens::{ClientTokenStore, CookieEntry, SetCookie};

/// Dependency key signaled whenever the identity changes.
pub const AUTH_DEPENDENCY: &str = "auth";

/// Where a load is executing. Always passed in explicitly; the bridge has
/// no ambient is-this-a-browser probe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Environment {
    Browser,
    Server,
}

/// What the server-side layout load exposes across the boundary: the
/// session half of the verified identity (the user is re-derived, never
/// trusted across it) plus the raw credential entries, so the browser can
/// reconstruct an equivalent client without re-reading transport state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LayoutServerData {
    pub session: Option<Session>,
    pub cookies: Vec<CookieEntry>,
}

/// Result of the client-side load.
#[derive(Debug)]
pub struct ClientLoadData {
    pub session: Option<Session>,
    pub user: Option<User>,
    /// Subscription to [`AUTH_DEPENDENCY`]; resolves whenever the identity
    /// changes, at which point the load should be re-executed.
    pub ticket: InvalidationTicket,
}

/// Registry of invalidation keys. Data loads declare dependencies on keys;
/// application actions (login, logout, token refresh) signal them, forcing
/// every dependent load to re-execute.
#[derive(Clone, Default)]
pub struct AuthInvalidation {
    channels: Arc<Mutex<HashMap<String, watch::Sender<u64>>>>,
}

impl AuthInvalidation {
    pub fn new() -> Self {
        Self::default()
    }

    fn sender(&self, key: &str) -> watch::Sender<u64> {
        let mut channels = self.channels.lock().expect("invalidation lock poisoned");
        channels
            .entry(key.to_string())
            .or_insert_with(|| watch::channel(0).0)
            .clone()
    }

    /// Declare a dependency on `key`. The ticket resolves on the next
    /// signal after subscription.
    pub fn depends(&self, key: &str) -> InvalidationTicket {
        let sender = self.sender(key);
        InvalidationTicket {
            key: key.to_string(),
            rx: sender.subscribe(),
        }
    }

    /// Signal `key`: every outstanding ticket for it resolves.
    pub fn invalidate(&self, key: &str) {
        self.sender(key).send_modify(|version| *version += 1);
    }

    /// Stream view of a key's version counter, for consumers that prefer
    /// a `Stream` over awaiting a ticket.
    pub fn stream(&self, key: &str) -> WatchStream<u64> {
        WatchStream::new(self.sender(key).subscribe())
    }
}

/// A single load's subscription to an invalidation key.
#[derive(Debug)]
pub struct InvalidationTicket {
    key: String,
    rx: watch::Receiver<u64>,
}

impl InvalidationTicket {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn version(&self) -> u64 {
        *self.rx.borrow()
    }

    /// Wait until the key is signaled. Returns the new version.
    pub async fn changed(&mut self) -> u64 {
        // The sender side lives in the registry for the process lifetime,
        // so this only fails during shutdown.
        let _ = self.rx.changed().await;
        *self.rx.borrow_and_update()
    }
}

/// Client-side counterpart of the server's session establishment: an
/// independent resolution of the same logical session.
pub struct SessionBridge {
    env: Environment,
    cookie_name: String,
    api: Arc<dyn IdentityApi>,
    browser_tokens: ClientTokenStore,
}

impl SessionBridge {
    pub fn new(env: Environment, cookie_name: &str, api: Arc<dyn IdentityApi>) -> Self {
        Self {
            env,
            cookie_name: cookie_name.to_string(),
            api,
            browser_tokens: ClientTokenStore::new(),
        }
    }

    pub fn environment(&self) -> Environment {
        self.env
    }

    /// The browser-managed credential store. Login and logout flows apply
    /// their `Set-Cookie` effects here, the way a real browser would.
    pub fn browser_tokens(&self) -> &ClientTokenStore {
        &self.browser_tokens
    }

    pub fn apply_set_cookies(&self, cookies: &[SetCookie]) {
        self.browser_tokens.apply(cookies);
    }

    /// Run the client-side load: declare the auth dependency, re-derive
    /// the session for this environment, and re-verify the user against
    /// the provider.
    ///
    /// In the browser the bridge reads its own credential store. During
    /// server-side rendering it must source credentials from the data the
    /// server load already produced; re-reading transport here would let
    /// the two environments diverge within one logical page render.
    ///
    /// A failed re-verification leaves `user` empty: the client identity
    /// drives client-rendered behavior only, and protected actions are
    /// always re-validated server-side by the pipeline.
    pub async fn load(
        &self,
        server_data: &LayoutServerData,
        invalidation: &AuthInvalidation,
    ) -> ClientLoadData {
        let ticket = invalidation.depends(AUTH_DEPENDENCY);

        let raw = match self.env {
            Environment::Browser => self.browser_tokens.get(&self.cookie_name),
            Environment::Server => server_data
                .cookies
                .iter()
                .find(|entry| entry.name == self.cookie_name)
                .map(|entry| entry.value.clone()),
        };

        let session = raw.and_then(|value| Session::from_cookie_value(&value).ok());

        let user = match &session {
            Some(session) => self.api.revalidate(&session.access_token).await.ok(),
            None => None,
        };

        ClientLoadData {
            session,
            user,
            ticket,
        }
    }
}
