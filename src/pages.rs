// Server-Rendered Pages
// Request/response glue around the auth pipeline: the page handlers, the
// form actions that drive the session lifecycle, and the layout data each
// page embeds for the browser-side hydration step.

use axum::{
    Extension, Form, Json,
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::AppState;
use crate::auth::{
    AUTH_DEPENDENCY, AuthError, CookieAttributes, IdentityApi, LayoutServerData, OtpType,
    RequestAuth, SetCookie, VerifiedIdentity,
};

/// JSON error body for hard failures (transport, internal).
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub status: u16,
}

impl From<AuthError> for ErrorResponse {
    fn from(error: AuthError) -> Self {
        Self {
            status: error.status_code(),
            error: error.to_string(),
        }
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(json!({ "error": self.error }))).into_response()
    }
}

/// The server-side layout load: the session half of the verified identity
/// plus the raw credential entries, exposed to the rendering step and to
/// hydration.
fn layout_data(auth: &RequestAuth, identity: &VerifiedIdentity) -> LayoutServerData {
    LayoutServerData {
        session: identity.session.clone(),
        cookies: auth.tokens.read_all(),
    }
}

/// Wrap page content in the shared shell, embedding the layout data as a
/// JSON island for the browser.
fn render_page(title: &str, body: &str, layout: &LayoutServerData) -> Html<String> {
    let data = serde_json::to_string(layout).unwrap_or_else(|_| "{}".to_string());
    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title}</title>
</head>
<body>
    <nav><a href="/">Home</a> <a href="/auth">Sign in</a> <a href="/settings/profile">Profile</a></nav>
    <main>
{body}
    </main>
    <script type="application/json" id="layout-data">{data}</script>
</body>
</html>"#,
        title = html_escape::encode_text(title),
        body = body,
        data = data,
    ))
}

/// GET /. First five member names, name-ordered. A store miss renders an
/// empty list, never an error.
pub async fn home(
    State(state): State<AppState>,
    Extension(auth): Extension<RequestAuth>,
    Extension(identity): Extension<VerifiedIdentity>,
) -> Html<String> {
    let names = state.store.list_names(5);

    let items: String = names
        .iter()
        .map(|name| format!("        <li>{}</li>\n", html_escape::encode_text(name)))
        .collect();
    let body = format!(
        "    <h1>Members</h1>\n    <ul>\n{}    </ul>",
        items
    );

    render_page("Members", &body, &layout_data(&auth, &identity))
}

#[derive(Debug, Default, Deserialize)]
pub struct AuthPageParams {
    #[serde(default)]
    pub notice: Option<String>,
}

/// GET /auth. Login and signup forms. Authenticated visitors never reach
/// this handler; the guard bounces them to the landing page.
pub async fn auth_page(
    Extension(auth): Extension<RequestAuth>,
    Extension(identity): Extension<VerifiedIdentity>,
    Query(params): Query<AuthPageParams>,
) -> Html<String> {
    render_auth_page(&auth, &identity, &[], params.notice.as_deref())
}

fn render_auth_page(
    auth: &RequestAuth,
    identity: &VerifiedIdentity,
    errors: &[String],
    notice: Option<&str>,
) -> Html<String> {
    let mut body = String::from("    <h1>Sign in</h1>\n");

    if let Some(notice) = notice {
        body.push_str(&format!(
            "    <p class=\"notice\">{}</p>\n",
            html_escape::encode_text(notice)
        ));
    }
    for error in errors {
        body.push_str(&format!(
            "    <p class=\"error\">{}</p>\n",
            html_escape::encode_text(error)
        ));
    }

    body.push_str(
        r#"    <form method="post" action="/auth/login">
        <label>Email <input type="email" name="email"></label>
        <label>Password <input type="password" name="password"></label>
        <button type="submit">Log in</button>
    </form>
    <form method="post" action="/auth/signup">
        <label>Email <input type="email" name="email"></label>
        <label>Password <input type="password" name="password"></label>
        <button type="submit">Sign up</button>
    </form>"#,
    );

    render_page("Sign in", &body, &layout_data(auth, identity))
}

#[derive(Debug, Deserialize)]
pub struct CredentialsForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

impl CredentialsForm {
    /// Shape checks only; the provider is the authority on the rest.
    fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if !self.email.contains('@') {
            errors.push("email: must be an email address".to_string());
        }
        if self.password.len() < 6 {
            errors.push("password: must be at least 6 characters".to_string());
        }
        errors
    }
}

/// POST /auth/login. Password sign-in. Success persists the session
/// cookie, signals the auth dependency, and sends the browser to the
/// profile page with a 303 so it re-issues as GET.
pub async fn login_action(
    State(state): State<AppState>,
    Extension(auth): Extension<RequestAuth>,
    Extension(identity): Extension<VerifiedIdentity>,
    Form(form): Form<CredentialsForm>,
) -> Result<Response, ErrorResponse> {
    let field_errors = form.validate();
    if !field_errors.is_empty() {
        let page = render_auth_page(&auth, &identity, &field_errors, None);
        return Ok((StatusCode::BAD_REQUEST, page).into_response());
    }

    let session = match state.provider.sign_in(&form.email, &form.password).await {
        Ok(session) => session,
        Err(e) => {
            warn!("login failed: {}", e);
            let page = render_auth_page(&auth, &identity, &["Login failed".to_string()], None);
            return Ok((StatusCode::BAD_REQUEST, page).into_response());
        }
    };

    persist_session(&state, &auth, &session)?;
    state.invalidation.invalidate(AUTH_DEPENDENCY);
    info!(subject = %session.claims.sub, "login");

    Ok(Redirect::to("/settings/profile").into_response())
}

/// POST /auth/signup. Account creation. Confirmation happens over email;
/// no session is issued here.
pub async fn signup_action(
    State(state): State<AppState>,
    Form(form): Form<CredentialsForm>,
) -> Redirect {
    match state.provider.sign_up(&form.email, &form.password).await {
        Ok(()) => Redirect::to("/"),
        Err(e) => {
            warn!("signup failed: {}", e);
            Redirect::to("/auth/error")
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ConfirmParams {
    pub token_hash: Option<String>,
    #[serde(rename = "type")]
    pub otp_type: Option<String>,
    pub next: Option<String>,
}

/// GET /auth/confirm. One-time token exchange from the confirmation
/// email. Success persists the issued session and redirects to `next`
/// with the auth parameters stripped; anything else lands on the error
/// page, keeping `next` for a retry.
pub async fn confirm(
    State(state): State<AppState>,
    Extension(auth): Extension<RequestAuth>,
    Query(params): Query<ConfirmParams>,
) -> Result<Redirect, ErrorResponse> {
    let next = params.next.as_deref().unwrap_or("/");
    let error_target = format!("/auth/error?next={}", urlencoding::encode(next));

    let (Some(token_hash), Some(raw_type)) = (params.token_hash, params.otp_type) else {
        return Ok(Redirect::to(&error_target));
    };
    let Some(otp_type) = OtpType::parse(&raw_type) else {
        return Ok(Redirect::to(&error_target));
    };

    match state.provider.verify_otp(otp_type, &token_hash).await {
        Ok(session) => {
            persist_session(&state, &auth, &session)?;
            state.invalidation.invalidate(AUTH_DEPENDENCY);
            info!(subject = %session.claims.sub, "one-time token confirmed");
            Ok(Redirect::to(next))
        }
        Err(e) => {
            warn!("one-time token verification failed: {}", e);
            Ok(Redirect::to(&error_target))
        }
    }
}

/// GET /auth/error
pub async fn auth_error_page(
    Extension(auth): Extension<RequestAuth>,
    Extension(identity): Extension<VerifiedIdentity>,
) -> Html<String> {
    render_page(
        "Authentication error",
        "    <h1>Authentication error</h1>\n    <p>The link is invalid or has expired. <a href=\"/auth\">Try again</a>.</p>",
        &layout_data(&auth, &identity),
    )
}

/// POST /auth/logout. Best-effort provider sign-out, then expire the
/// cookie and signal the auth dependency. The local credential is removed
/// even when the provider call fails.
pub async fn logout_action(
    State(state): State<AppState>,
    Extension(auth): Extension<RequestAuth>,
    Extension(identity): Extension<VerifiedIdentity>,
) -> Redirect {
    if let Some(session) = &identity.session {
        if let Err(e) = state.provider.sign_out(&session.access_token).await {
            warn!("provider sign-out failed: {}", e);
        }
    }

    auth.tokens
        .expire(&state.config.auth.cookie.name, &state.config.auth.cookie);
    state.invalidation.invalidate(AUTH_DEPENDENCY);

    Redirect::to("/")
}

/// GET /private. Protected landing page. The guard guarantees a session;
/// the user half comes from the same verified pair.
pub async fn private_landing(
    Extension(auth): Extension<RequestAuth>,
    Extension(identity): Extension<VerifiedIdentity>,
) -> Html<String> {
    let who = identity
        .user
        .as_ref()
        .and_then(|user| user.email.clone())
        .or_else(|| {
            identity
                .session
                .as_ref()
                .map(|session| session.claims.sub.clone())
        })
        .unwrap_or_else(|| "member".to_string());

    let body = format!(
        r#"    <h1>Private area</h1>
    <p>Signed in as {}</p>
    <form method="post" action="/auth/logout"><button type="submit">Log out</button></form>"#,
        html_escape::encode_text(&who)
    );

    render_page("Private area", &body, &layout_data(&auth, &identity))
}

/// GET /settings/profile. The signed-in member's profile. Anonymous
/// visitors and members without a stored profile see an absent profile,
/// not an error.
pub async fn profile_settings(
    State(state): State<AppState>,
    Extension(auth): Extension<RequestAuth>,
    Extension(identity): Extension<VerifiedIdentity>,
) -> Html<String> {
    let profile = identity
        .user
        .as_ref()
        .and_then(|user| state.store.get(&user.id));

    let body = match profile {
        Some(profile) => format!(
            r#"    <h1>Profile</h1>
    <dl>
        <dt>Email</dt><dd>{}</dd>
        <dt>Name</dt><dd>{}</dd>
        <dt>Introduction</dt><dd>{}</dd>
    </dl>"#,
            html_escape::encode_text(&profile.email),
            html_escape::encode_text(&profile.name),
            html_escape::encode_text(profile.introduce.as_deref().unwrap_or("")),
        ),
        None => "    <h1>Profile</h1>\n    <p>No profile.</p>".to_string(),
    };

    render_page("Profile", &body, &layout_data(&auth, &identity))
}

/// Fallback for unrouted paths. Runs inside the pipeline, so unrouted
/// protected paths redirect before reaching here.
pub async fn not_found() -> (StatusCode, Html<&'static str>) {
    (StatusCode::NOT_FOUND, Html("<h1>Not found</h1>"))
}

/// GET /health. Liveness plus build metadata.
pub async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
        "commit": option_env!("VERGEN_GIT_SHA").unwrap_or("unknown"),
    }))
}

/// Write the session into the cookie jar. The adapter forces `Path=/`, so
/// the credential is visible to every route.
fn persist_session(
    state: &AppState,
    auth: &RequestAuth,
    session: &crate::auth::Session,
) -> Result<(), ErrorResponse> {
    let value = session.to_cookie_value().map_err(ErrorResponse::from)?;
    auth.tokens.write(SetCookie {
        name: state.config.auth.cookie.name.clone(),
        value,
        attributes: CookieAttributes::from_config(&state.config.auth.cookie),
    });
    Ok(())
}
