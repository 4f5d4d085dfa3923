// Token Store Adapter
// Per-request view of the cookie jar: reads the incoming credential set,
// buffers writes, and flushes them onto the response. Transport only:
// token content is never inspected for trust here.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::http::{HeaderMap, HeaderValue, header};
use serde::{Deserialize, Serialize};

use super::config::{CookieConfig, SameSitePolicy};
use super::error::AuthError;

/// A single `(name, value)` pair from the incoming request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CookieEntry {
    pub name: String,
    pub value: String,
}

/// Transport attributes for an outgoing cookie. The scope path is not
/// listed: the adapter forces `Path=/` on every write so that credentials
/// set anywhere remain visible to every route.
#[derive(Debug, Clone, PartialEq)]
pub struct CookieAttributes {
    pub max_age: Option<u64>,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: SameSitePolicy,
}

impl CookieAttributes {
    pub fn from_config(config: &CookieConfig) -> Self {
        Self {
            max_age: Some(config.max_age),
            secure: config.secure,
            http_only: config.http_only,
            same_site: config.same_site,
        }
    }
}

/// An outgoing cookie write.
#[derive(Debug, Clone, PartialEq)]
pub struct SetCookie {
    pub name: String,
    pub value: String,
    pub attributes: CookieAttributes,
}

impl SetCookie {
    /// Render as a `Set-Cookie` header value, with the scope forced to the
    /// application root.
    fn to_header_string(&self) -> String {
        let mut out = format!("{}={}; Path=/", self.name, self.value);

        if let Some(max_age) = self.attributes.max_age {
            out.push_str(&format!("; Max-Age={}", max_age));
        }
        if self.attributes.http_only {
            out.push_str("; HttpOnly");
        }
        if self.attributes.secure {
            out.push_str("; Secure");
        }
        out.push_str(&format!("; SameSite={}", self.attributes.same_site.as_str()));

        out
    }
}

#[derive(Debug, Default)]
struct Inner {
    incoming: Vec<CookieEntry>,
    pending: Mutex<Vec<SetCookie>>,
}

/// Request-scoped cookie jar adapter. Cheap to clone; one instance per
/// request, shared between the pipeline stages and the page handlers.
#[derive(Debug, Clone, Default)]
pub struct CookieTokenStore {
    inner: Arc<Inner>,
}

impl CookieTokenStore {
    /// Build the per-request view from the incoming request headers.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let mut incoming = Vec::new();
        for header_value in headers.get_all(header::COOKIE) {
            let Ok(raw) = header_value.to_str() else {
                continue;
            };
            for pair in raw.split(';') {
                if let Some((name, value)) = pair.trim().split_once('=') {
                    incoming.push(CookieEntry {
                        name: name.to_string(),
                        value: value.to_string(),
                    });
                }
            }
        }

        Self {
            inner: Arc::new(Inner {
                incoming,
                pending: Mutex::new(Vec::new()),
            }),
        }
    }

    /// All incoming `(name, value)` pairs, in header order.
    pub fn read_all(&self) -> Vec<CookieEntry> {
        self.inner.incoming.clone()
    }

    /// Value of a single incoming cookie.
    pub fn get(&self, name: &str) -> Option<String> {
        self.inner
            .incoming
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| entry.value.clone())
    }

    /// Buffer an outgoing write. Applied to the response when the session
    /// stage flushes the jar.
    pub fn write(&self, cookie: SetCookie) {
        self.inner
            .pending
            .lock()
            .expect("cookie jar lock poisoned")
            .push(cookie);
    }

    pub fn write_all(&self, cookies: impl IntoIterator<Item = SetCookie>) {
        let mut pending = self
            .inner
            .pending
            .lock()
            .expect("cookie jar lock poisoned");
        pending.extend(cookies);
    }

    /// Buffer a removal: empty value, zero lifetime.
    pub fn expire(&self, name: &str, config: &CookieConfig) {
        self.write(SetCookie {
            name: name.to_string(),
            value: String::new(),
            attributes: CookieAttributes {
                max_age: Some(0),
                ..CookieAttributes::from_config(config)
            },
        });
    }

    /// Flush buffered writes into the outgoing response headers. A value
    /// that cannot be encoded as a header is fatal to identity persistence
    /// for this request.
    pub fn apply_to(&self, headers: &mut HeaderMap) -> Result<(), AuthError> {
        let pending: Vec<SetCookie> = self
            .inner
            .pending
            .lock()
            .expect("cookie jar lock poisoned")
            .drain(..)
            .collect();

        for cookie in pending {
            let rendered = cookie.to_header_string();
            let value = HeaderValue::from_str(&rendered).map_err(|_| {
                AuthError::CookieTransport(format!(
                    "cookie '{}' cannot be encoded as a response header",
                    cookie.name
                ))
            })?;
            headers.append(header::SET_COOKIE, value);
        }

        Ok(())
    }

    /// Number of buffered writes. Test hook.
    pub fn pending_len(&self) -> usize {
        self.inner
            .pending
            .lock()
            .expect("cookie jar lock poisoned")
            .len()
    }
}

/// Browser-side credential store used by the session bridge: the client
/// environment manages its own jar instead of re-reading server transport.
#[derive(Debug, Clone, Default)]
pub struct ClientTokenStore {
    cookies: Arc<Mutex<HashMap<String, String>>>,
}

impl ClientTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply writes the way a browser applies `Set-Cookie` headers: empty
    /// zero-lifetime values remove the entry.
    pub fn apply(&self, cookies: &[SetCookie]) {
        let mut jar = self.cookies.lock().expect("client jar lock poisoned");
        for cookie in cookies {
            if cookie.value.is_empty() && cookie.attributes.max_age == Some(0) {
                jar.remove(&cookie.name);
            } else {
                jar.insert(cookie.name.clone(), cookie.value.clone());
            }
        }
    }

    pub fn set(&self, name: &str, value: &str) {
        self.cookies
            .lock()
            .expect("client jar lock poisoned")
            .insert(name.to_string(), value.to_string());
    }

    pub fn get(&self, name: &str) -> Option<String> {
        self.cookies
            .lock()
            .expect("client jar lock poisoned")
            .get(name)
            .cloned()
    }

    pub fn entries(&self) -> Vec<CookieEntry> {
        self.cookies
            .lock()
            .expect("client jar lock poisoned")
            .iter()
            .map(|(name, value)| CookieEntry {
                name: name.clone(),
                value: value.clone(),
            })
            .collect()
    }
}
