// Cross-environment tests: the browser-side re-derivation of the
// server-established identity, driven by the real HTTP provider client
// against the mock provider.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{TestApp, client, login};
use memberhub::auth::{
    AUTH_DEPENDENCY, AuthInvalidation, Environment, HttpIdentityProvider, LayoutServerData,
    SessionBridge,
};

const COOKIE_NAME: &str = "mh-session";

fn bridge_for(app: &TestApp, env: Environment) -> SessionBridge {
    let provider = HttpIdentityProvider::new(&app.provider.url(), "test-key").unwrap();
    SessionBridge::new(env, COOKIE_NAME, Arc::new(provider))
}

fn extract_layout(html: &str) -> LayoutServerData {
    let marker = r#"<script type="application/json" id="layout-data">"#;
    let start = html.find(marker).expect("layout island present") + marker.len();
    let end = html[start..].find("</script>").expect("island closed") + start;
    serde_json::from_str(&html[start..end]).expect("island is valid JSON")
}

#[tokio::test]
async fn test_login_invalidation_reexecutes_client_load() {
    // Scenario D: a load that returned (None, None) re-executes after the
    // login action signals "auth", and sees the new session without a
    // full page reload.
    let app = TestApp::start().await.unwrap();
    app.provider.add_user("ada@example.com", "hunter22");

    let invalidation = AuthInvalidation::new();
    let bridge = bridge_for(&app, Environment::Browser);

    let mut first = bridge
        .load(&LayoutServerData::default(), &invalidation)
        .await;
    assert!(first.session.is_none());
    assert!(first.user.is_none());

    // The login action: the server sets the cookie, the browser jar
    // receives it, and the action signals the dependency.
    let cookie = login(&app, "ada@example.com", "hunter22").await;
    let (name, value) = cookie.split_once('=').unwrap();
    bridge.browser_tokens().set(name, value);
    invalidation.invalidate(AUTH_DEPENDENCY);

    tokio::time::timeout(Duration::from_secs(1), first.ticket.changed())
        .await
        .expect("the auth signal must wake the dependent load");

    let second = bridge
        .load(&LayoutServerData::default(), &invalidation)
        .await;
    let session = second.session.expect("re-executed load sees the session");
    assert_eq!(session.claims.email.as_deref(), Some("ada@example.com"));
    let user = second.user.expect("client re-verification succeeds");
    assert_eq!(user.email.as_deref(), Some("ada@example.com"));
}

#[tokio::test]
async fn test_server_environment_load_uses_rendered_layout_data() {
    // During SSR of a client-loaded page the bridge must source
    // credentials from the data the server load produced, not from
    // transport. Feed it the layout island of a real rendered page.
    let app = TestApp::start().await.unwrap();
    app.provider.add_user("ada@example.com", "hunter22");
    let cookie = login(&app, "ada@example.com", "hunter22").await;

    let html = client()
        .get(app.url("/"))
        .header("cookie", &cookie)
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    let layout = extract_layout(&html);
    assert!(layout.session.is_some());

    let bridge = bridge_for(&app, Environment::Server);
    let data = bridge.load(&layout, &AuthInvalidation::new()).await;

    assert_eq!(data.session, layout.session);
    let user = data.user.expect("server-side re-verification succeeds");
    assert_eq!(user.email.as_deref(), Some("ada@example.com"));
}

#[tokio::test]
async fn test_client_identity_survives_provider_disagreement() {
    // If the provider stops recognizing the token between the server
    // render and hydration, the client keeps its locally-derived session
    // for UI purposes but the user half stays empty; any protected
    // request still fails closed server-side.
    let app = TestApp::start().await.unwrap();
    app.provider.add_user("ada@example.com", "hunter22");
    let cookie = login(&app, "ada@example.com", "hunter22").await;
    let (name, value) = cookie.split_once('=').unwrap();

    app.provider.revoke_all_tokens();

    let bridge = bridge_for(&app, Environment::Browser);
    bridge.browser_tokens().set(name, value);

    let data = bridge
        .load(&LayoutServerData::default(), &AuthInvalidation::new())
        .await;
    assert!(data.session.is_some());
    assert!(data.user.is_none());

    let response = client()
        .get(app.url("/private"))
        .header("cookie", &cookie)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 303);
}

#[tokio::test]
async fn test_logout_invalidation_drops_session_on_reload() {
    let app = TestApp::start().await.unwrap();
    app.provider.add_user("ada@example.com", "hunter22");

    let invalidation = AuthInvalidation::new();
    let bridge = bridge_for(&app, Environment::Browser);

    let cookie = login(&app, "ada@example.com", "hunter22").await;
    let (name, value) = cookie.split_once('=').unwrap();
    bridge.browser_tokens().set(name, value);

    let mut loaded = bridge
        .load(&LayoutServerData::default(), &invalidation)
        .await;
    assert!(loaded.session.is_some());

    // Logout via the app, mirror the expiry into the browser jar, signal.
    let response = client()
        .post(app.url("/auth/logout"))
        .header("cookie", &cookie)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 303);
    bridge.apply_set_cookies(&[memberhub::auth::SetCookie {
        name: name.to_string(),
        value: String::new(),
        attributes: memberhub::auth::CookieAttributes {
            max_age: Some(0),
            secure: false,
            http_only: true,
            same_site: memberhub::auth::config::SameSitePolicy::Lax,
        },
    }]);
    invalidation.invalidate(AUTH_DEPENDENCY);

    tokio::time::timeout(Duration::from_secs(1), loaded.ticket.changed())
        .await
        .expect("the auth signal must wake the dependent load");

    let reloaded = bridge
        .load(&LayoutServerData::default(), &invalidation)
        .await;
    assert!(reloaded.session.is_none());
    assert!(reloaded.user.is_none());
}
