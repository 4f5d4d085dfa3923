// Route Guard
// Pure access policy: a function of the request path and the verified
// identity, nothing else. Side effects (the actual redirect) live in the
// pipeline stage that applies the decision.

use super::config::GuardPaths;
use super::session::VerifiedIdentity;

/// Access decision for one request.
#[derive(Debug, Clone, PartialEq)]
pub enum GuardAction {
    /// Let the pipeline continue to the next stage.
    Continue,
    /// Short-circuit with a 303 redirect to the given path.
    RedirectTo(String),
}

/// Evaluate the guard policy. First match wins:
///
/// 1. no session and the path is under the protected prefix -> login page
/// 2. a session and the path is exactly the login page -> landing page
/// 3. otherwise -> continue
pub fn route_guard(path: &str, identity: &VerifiedIdentity, paths: &GuardPaths) -> GuardAction {
    if identity.session.is_none() && path.starts_with(&paths.protected_prefix) {
        return GuardAction::RedirectTo(paths.login_path.clone());
    }

    if identity.session.is_some() && path == paths.login_path {
        return GuardAction::RedirectTo(paths.landing_path.clone());
    }

    GuardAction::Continue
}
