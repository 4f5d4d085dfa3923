// Shared test infrastructure: a mock identity provider and an app server
// harness, both on random ports with oneshot shutdown.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::oneshot;

use memberhub::config::Config;

#[derive(Debug, Clone)]
struct MockUser {
    id: String,
    email: String,
    password: String,
}

#[derive(Clone, Default)]
struct MockState {
    /// email -> account
    users: Arc<Mutex<HashMap<String, MockUser>>>,
    /// access token -> user id
    tokens: Arc<Mutex<HashMap<String, String>>>,
    /// one-time token hash -> email
    otps: Arc<Mutex<HashMap<String, String>>>,
    /// hits on the revalidation endpoint
    user_hits: Arc<AtomicUsize>,
}

impl MockState {
    fn mint_session(&self, user: &MockUser) -> serde_json::Value {
        let exp = Utc::now().timestamp() + 3600;
        let claims = json!({ "sub": user.id, "exp": exp, "email": user.email });
        let access_token = jsonwebtoken::encode(
            &jsonwebtoken::Header::default(),
            &claims,
            &jsonwebtoken::EncodingKey::from_secret(b"mock-provider-secret"),
        )
        .expect("token encoding should not fail");

        self.tokens
            .lock()
            .unwrap()
            .insert(access_token.clone(), user.id.clone());

        json!({
            "access_token": access_token,
            "refresh_token": uuid::Uuid::new_v4().to_string(),
            "expires_at": exp,
        })
    }

    fn bearer_user(&self, headers: &HeaderMap) -> Option<MockUser> {
        let auth = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
        let token = auth.strip_prefix("Bearer ")?;
        let user_id = self.tokens.lock().unwrap().get(token).cloned()?;
        self.users
            .lock()
            .unwrap()
            .values()
            .find(|user| user.id == user_id)
            .cloned()
    }
}

#[derive(Debug, Deserialize)]
struct CredentialsBody {
    email: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct VerifyBody {
    #[serde(rename = "type")]
    _otp_type: String,
    token_hash: String,
}

async fn handle_token(
    State(state): State<MockState>,
    Json(body): Json<CredentialsBody>,
) -> Response {
    let user = state.users.lock().unwrap().get(&body.email).cloned();
    match user {
        Some(user) if user.password == body.password => {
            Json(state.mint_session(&user)).into_response()
        }
        _ => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "invalid_grant" })),
        )
            .into_response(),
    }
}

async fn handle_signup(
    State(state): State<MockState>,
    Json(body): Json<CredentialsBody>,
) -> Response {
    let mut users = state.users.lock().unwrap();
    if users.contains_key(&body.email) {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "error": "user_already_exists" })),
        )
            .into_response();
    }
    users.insert(
        body.email.clone(),
        MockUser {
            id: uuid::Uuid::new_v4().to_string(),
            email: body.email,
            password: body.password,
        },
    );
    Json(json!({})).into_response()
}

async fn handle_user(State(state): State<MockState>, headers: HeaderMap) -> Response {
    state.user_hits.fetch_add(1, Ordering::SeqCst);
    match state.bearer_user(&headers) {
        Some(user) => Json(json!({
            "id": user.id,
            "email": user.email,
            "created_at": null,
        }))
        .into_response(),
        None => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "invalid_token" })),
        )
            .into_response(),
    }
}

async fn handle_verify(State(state): State<MockState>, Json(body): Json<VerifyBody>) -> Response {
    let email = state.otps.lock().unwrap().remove(&body.token_hash);
    let user = email.and_then(|email| state.users.lock().unwrap().get(&email).cloned());
    match user {
        Some(user) => Json(state.mint_session(&user)).into_response(),
        None => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "otp_expired" })),
        )
            .into_response(),
    }
}

async fn handle_logout(State(state): State<MockState>, headers: HeaderMap) -> Response {
    if let Some(auth) = headers.get(header::AUTHORIZATION)
        && let Ok(auth) = auth.to_str()
        && let Some(token) = auth.strip_prefix("Bearer ")
    {
        state.tokens.lock().unwrap().remove(token);
    }
    StatusCode::NO_CONTENT.into_response()
}

/// Mock identity provider on a random port.
pub struct MockProvider {
    pub port: u16,
    state: MockState,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockProvider {
    pub async fn start() -> anyhow::Result<Self> {
        let state = MockState::default();
        let app = Router::new()
            .route("/token", post(handle_token))
            .route("/signup", post(handle_signup))
            .route("/user", get(handle_user))
            .route("/verify", post(handle_verify))
            .route("/logout", post(handle_logout))
            .with_state(state.clone());

        let addr = SocketAddr::from(([127, 0, 0, 1], 0));
        let listener = tokio::net::TcpListener::bind(addr).await?;
        let port = listener.local_addr()?.port();

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("mock provider failed");
        });

        Ok(Self {
            port,
            state,
            shutdown_tx: Some(shutdown_tx),
        })
    }

    pub fn url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    /// Register an account; returns its user id.
    pub fn add_user(&self, email: &str, password: &str) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        self.state.users.lock().unwrap().insert(
            email.to_string(),
            MockUser {
                id: id.clone(),
                email: email.to_string(),
                password: password.to_string(),
            },
        );
        id
    }

    /// Register a one-time token for an existing account.
    pub fn add_otp(&self, token_hash: &str, email: &str) {
        self.state
            .otps
            .lock()
            .unwrap()
            .insert(token_hash.to_string(), email.to_string());
    }

    /// Revoke every issued access token: decodable claims that no longer
    /// verify.
    pub fn revoke_all_tokens(&self) {
        self.state.tokens.lock().unwrap().clear();
    }

    /// Number of revalidation round-trips observed.
    pub fn user_hits(&self) -> usize {
        self.state.user_hits.load(Ordering::SeqCst)
    }
}

impl Drop for MockProvider {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// The application under test plus its mock provider.
pub struct TestApp {
    pub port: u16,
    pub provider: MockProvider,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl TestApp {
    pub async fn start() -> anyhow::Result<Self> {
        let provider = MockProvider::start().await?;
        let config = Config::for_tests(&provider.url());

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let port = memberhub::start_server_with_config(config, shutdown_rx).await?;

        Ok(Self {
            port,
            provider,
            shutdown_tx: Some(shutdown_tx),
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://127.0.0.1:{}{}", self.port, path)
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// Client that surfaces redirects instead of following them.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .expect("client construction should not fail")
}

/// Log in through the app and return the session cookie pair
/// (`name=value`) from the Set-Cookie header.
pub async fn login(app: &TestApp, email: &str, password: &str) -> String {
    let response = client()
        .post(app.url("/auth/login"))
        .form(&[("email", email), ("password", password)])
        .send()
        .await
        .expect("login request failed");
    assert_eq!(response.status(), 303, "login should redirect");

    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("login should set the session cookie")
        .to_str()
        .expect("cookie header should be ascii")
        .to_string();

    set_cookie
        .split(';')
        .next()
        .expect("cookie pair")
        .to_string()
}
