use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

pub mod auth;
pub mod config;
pub mod pages;
pub mod store;

use auth::{AuthInvalidation, HttpIdentityProvider, IdentityApi, establish_session, guard_stage};
use config::Config;
use store::ProfileStore;

/// Shared application state. Everything here is concurrency-safe by
/// construction; per-request state lives in the request extensions, never
/// in globals.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub provider: Arc<dyn IdentityApi>,
    pub store: ProfileStore,
    pub invalidation: AuthInvalidation,
}

/// Assemble the application router: the page routes wrapped by the
/// two-stage auth pipeline. Stage order matters: the session stage is
/// outermost so it runs first and the guard can rely on the request
/// context it establishes. Both stages also wrap the fallback, so
/// unrouted paths under the protected prefix still redirect.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(pages::home))
        .route("/auth", get(pages::auth_page))
        .route("/auth/login", post(pages::login_action))
        .route("/auth/signup", post(pages::signup_action))
        .route("/auth/confirm", get(pages::confirm))
        .route("/auth/error", get(pages::auth_error_page))
        .route("/auth/logout", post(pages::logout_action))
        .route("/private", get(pages::private_landing))
        .route("/settings/profile", get(pages::profile_settings))
        .route("/health", get(pages::health))
        .fallback(pages::not_found)
        .layer(middleware::from_fn_with_state(state.clone(), guard_stage))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            establish_session,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Starts the web server with configuration from the environment.
pub async fn start_server(
    shutdown_rx: tokio::sync::oneshot::Receiver<()>,
) -> anyhow::Result<u16> {
    start_server_with_config(Config::from_env(), shutdown_rx).await
}

/// Starts the web server with custom configuration.
///
/// Binds the listener before returning so callers learn the actual port
/// (the configured port may be 0), then serves in a background task until
/// the shutdown signal fires.
pub async fn start_server_with_config(
    config: Config,
    mut shutdown_rx: tokio::sync::oneshot::Receiver<()>,
) -> anyhow::Result<u16> {
    config.validate()?;

    let provider = Arc::new(HttpIdentityProvider::new(
        &config.auth.provider.base_url,
        &config.auth.provider.api_key,
    )?);

    let state = AppState {
        config: Arc::new(config.clone()),
        provider,
        store: ProfileStore::seeded(),
        invalidation: AuthInvalidation::new(),
    };

    let app = build_router(state);

    let addr: std::net::SocketAddr = config
        .server_addr()
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid server address: {}", e))?;

    let handle = axum_server::Handle::new();
    let server = axum_server::bind(addr)
        .handle(handle.clone())
        .serve(app.into_make_service());

    tokio::spawn(async move {
        tokio::select! {
            res = server => {
                if let Err(e) = res {
                    error!("server error: {}", e);
                }
            }
            _ = &mut shutdown_rx => { /* graceful shutdown: stop accepting new connections */ }
        }
    });

    // The configured port may be 0; report the one actually bound.
    let bound = handle
        .listening()
        .await
        .ok_or_else(|| anyhow::anyhow!("server failed to bind {}", addr))?;
    info!("listening on {}", bound);

    Ok(bound.port())
}
