// Identity Verifier
// Two-step trust check: a cheap local decode of the session cookie, then a
// mandatory revalidation round-trip before the claim is trusted. The local
// decode proves nothing; only provider revalidation proves identity.

use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::debug;

use super::provider::IdentityApi;
use super::session::{Session, VerifiedIdentity};
use super::tokens::CookieTokenStore;

/// Per-request verifier. The result of the first `verify` call is cached
/// for the lifetime of the request, so repeated callers share one
/// round-trip.
#[derive(Clone)]
pub struct SessionVerifier {
    tokens: CookieTokenStore,
    cookie_name: String,
    api: Arc<dyn IdentityApi>,
    cache: Arc<OnceCell<VerifiedIdentity>>,
}

impl SessionVerifier {
    pub fn new(tokens: CookieTokenStore, cookie_name: &str, api: Arc<dyn IdentityApi>) -> Self {
        Self {
            tokens,
            cookie_name: cookie_name.to_string(),
            api,
            cache: Arc::new(OnceCell::new()),
        }
    }

    /// Resolve the request's identity. Idempotent within a request.
    ///
    /// Verification failures are not errors: an expired, tampered, or
    /// provider-rejected credential resolves to the anonymous identity and
    /// the request proceeds. Raw provider errors never leave this layer.
    pub async fn verify(&self) -> VerifiedIdentity {
        self.cache
            .get_or_init(|| self.verify_uncached())
            .await
            .clone()
    }

    async fn verify_uncached(&self) -> VerifiedIdentity {
        // Step 1: local decode. Absent or undecodable credential means
        // anonymous, with no network call.
        let Some(raw) = self.tokens.get(&self.cookie_name) else {
            return VerifiedIdentity::anonymous();
        };

        let session = match Session::from_cookie_value(&raw) {
            Ok(session) => session,
            Err(e) => {
                debug!("session cookie did not decode: {}", e);
                return VerifiedIdentity::anonymous();
            }
        };

        // Step 2: mandatory revalidation. A decodable-but-unverifiable
        // claim must never be treated as authenticated, so any failure
        // here resolves to anonymous. No retry: fail closed.
        match self.api.revalidate(&session.access_token).await {
            Ok(user) => VerifiedIdentity {
                session: Some(session),
                user: Some(user),
            },
            Err(e) => {
                debug!(subject = %session.claims.sub, "revalidation failed: {}", e);
                VerifiedIdentity::anonymous()
            }
        }
    }
}
