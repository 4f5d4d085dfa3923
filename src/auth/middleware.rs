// Request Pipeline Stages
// Two ordered stages wrap every route. Stage 1 establishes the per-request
// auth context and flushes cookie writes onto the response; it never
// short-circuits. Stage 2 resolves the verified identity and applies the
// route guard, short-circuiting with a redirect when the guard says so.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tracing::{debug, error};

use crate::AppState;

use super::guard::{GuardAction, route_guard};
use super::tokens::CookieTokenStore;
use super::verifier::SessionVerifier;

/// Per-request authentication context, created by the session stage and
/// read by everything downstream. One instance per request; never shared
/// across requests.
#[derive(Clone)]
pub struct RequestAuth {
    pub tokens: CookieTokenStore,
    pub verifier: SessionVerifier,
}

/// Stage 1: attach the token store adapter and the verifier to the request,
/// run the rest of the pipeline, then flush buffered cookie writes onto the
/// response. A write that cannot be encoded fails the request: identity
/// changes that cannot persist must not appear to succeed.
pub async fn establish_session(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let tokens = CookieTokenStore::from_headers(request.headers());
    let verifier = SessionVerifier::new(
        tokens.clone(),
        &state.config.auth.cookie.name,
        state.provider.clone(),
    );

    request.extensions_mut().insert(RequestAuth {
        tokens: tokens.clone(),
        verifier,
    });

    let mut response = next.run(request).await;

    if let Err(e) = tokens.apply_to(response.headers_mut()) {
        error!("failed to persist cookie writes: {}", e);
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    response
}

/// Stage 2: resolve the verified identity once, expose it to the handlers,
/// and enforce the route guard.
pub async fn guard_stage(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(auth) = request.extensions().get::<RequestAuth>().cloned() else {
        // The session stage always runs first; a missing context means the
        // pipeline was assembled wrong.
        error!("guard stage ran without a session stage");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    };

    let identity = auth.verifier.verify().await;
    let path = request.uri().path().to_string();

    let action = route_guard(&path, &identity, &state.config.auth.paths);
    request.extensions_mut().insert(identity);

    match action {
        GuardAction::Continue => next.run(request).await,
        GuardAction::RedirectTo(target) => {
            debug!(%path, %target, "guard redirect");
            // See Other: the browser re-issues as GET.
            Redirect::to(&target).into_response()
        }
    }
}
