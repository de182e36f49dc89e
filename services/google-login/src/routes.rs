//! HTTP surface
//!
//! Endpoints:
//! - GET /                      : homepage (static HTML)
//! - GET /static/index.js       : homepage script, calls whoami with `?tokens`
//! - GET /favicon.ico           : 204, keeps browsers quiet
//! - GET /auth/google/consent   : 302 to Google's consent screen
//! - GET /auth/google/callback  : exchange code, 302 to `/?tokens=<json>`
//! - GET /auth/whoami           : profile JSON for the `tokens` bundle
//! - GET /health, GET /metrics  : liveness and Prometheus exposition
//!
//! Login failures never surface details to the browser: they are logged with
//! a category and answered with a 500 and a generic body.

use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::{StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use google_auth::{FlowClient, Profile, ProfileClient, TokenBundle};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::consent::ConsentStore;
use crate::error::HandlerError;

const INDEX_HTML: &str = include_str!("../static/index.html");
const INDEX_JS: &str = include_str!("../static/index.js");

/// Shared application state accessible from all handlers
#[derive(Clone)]
pub struct AppState {
    pub flow: Arc<dyn FlowClient>,
    pub profiles: Arc<dyn ProfileClient>,
    pub consents: ConsentStore,
    pub prometheus: PrometheusHandle,
    pub started_at: Instant,
}

/// Build the axum router with all routes and shared state.
pub fn build_router(state: AppState, max_connections: usize) -> Router {
    Router::new()
        .route("/", get(homepage))
        .route("/static/index.js", get(homepage_script))
        .route("/favicon.ico", get(favicon))
        .route("/auth/google/consent", get(google_consent))
        .route("/auth/google/callback", get(google_callback))
        .route("/auth/whoami", get(whoami))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route_layer(axum::middleware::from_fn(crate::metrics::track_requests))
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_connections))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    /// Set by Google when the user denies consent
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WhoamiParams {
    tokens: Option<String>,
}

fn request_id() -> String {
    format!("req_{}", uuid::Uuid::new_v4().as_simple())
}

/// 302 Found with a Location header.
fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
}

/// The `tokens` query value on `/` is read by the page script only.
async fn homepage() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn homepage_script() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/javascript; charset=utf-8")],
        INDEX_JS,
    )
}

async fn favicon() -> StatusCode {
    StatusCode::NO_CONTENT
}

/// GET /auth/google/consent: register a consent attempt and send the browser to Google.
async fn google_consent(State(state): State<AppState>) -> Response {
    let ticket = state.consents.begin().await;
    let url = state
        .flow
        .authorization_url(&ticket.state, &ticket.code_challenge);

    info!("redirecting to Google consent");
    found(&url)
}

/// GET /auth/google/callback: exchange the code and hand the bundle to the homepage.
async fn google_callback(
    State(state): State<AppState>,
    params: Result<Query<CallbackParams>, QueryRejection>,
) -> Response {
    let request_id = request_id();
    match complete_login(&state, params).await {
        Ok(location) => {
            info!(request_id, "login completed, redirecting to homepage");
            found(&location)
        }
        Err(e) => {
            error!(request_id, category = e.category(), error = %e, "callback error");
            e.into_response()
        }
    }
}

async fn complete_login(
    state: &AppState,
    params: Result<Query<CallbackParams>, QueryRejection>,
) -> Result<String, HandlerError> {
    let Query(params) = params
        .map_err(|e| HandlerError::Authorization(format!("unreadable callback query: {e}")))?;

    // Consume the pending consent first so a denied or malformed callback
    // still frees its entry.
    let verifier = state.consents.take(params.state.as_deref()).await?;

    if let Some(denied) = params.error {
        return Err(HandlerError::Authorization(format!(
            "provider returned error: {denied}"
        )));
    }

    let code = params
        .code
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| HandlerError::Authorization("missing authorization code".into()))?;

    let bundle = state
        .flow
        .exchange_code(&code, &verifier)
        .await
        .map_err(|e| {
            crate::metrics::record_upstream_error("exchange");
            HandlerError::Exchange(e)
        })?;

    let tokens = bundle.to_json().map_err(HandlerError::Exchange)?;
    Ok(format!("/?tokens={}", urlencoding::encode(&tokens)))
}

/// GET /auth/whoami?tokens=<json>: rebuild the bundle and fetch the profile.
async fn whoami(
    State(state): State<AppState>,
    params: Result<Query<WhoamiParams>, QueryRejection>,
) -> Response {
    let request_id = request_id();
    match fetch_profile(&state, params).await {
        Ok(profile) => axum::Json(profile).into_response(),
        Err(e) => {
            warn!(request_id, category = e.category(), error = %e, "whoami error");
            e.into_response()
        }
    }
}

async fn fetch_profile(
    state: &AppState,
    params: Result<Query<WhoamiParams>, QueryRejection>,
) -> Result<Profile, HandlerError> {
    let raw = params
        .ok()
        .and_then(|Query(p)| p.tokens)
        .ok_or_else(|| {
            HandlerError::Bundle(google_auth::Error::CredentialParse(
                "missing tokens parameter".into(),
            ))
        })?;

    let credentials = TokenBundle::from_json(&raw).map_err(HandlerError::Bundle)?;

    state
        .profiles
        .get_own_profile(&credentials)
        .await
        .map_err(|e| {
            crate::metrics::record_upstream_error("userinfo");
            HandlerError::Profile(e)
        })
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let body = serde_json::json!({
        "status": "healthy",
        "uptime_seconds": state.started_at.elapsed().as_secs(),
        "pending_consents": state.consents.len().await,
    });

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        body.to_string(),
    )
}

/// Prometheus metrics endpoint: returns metrics in text exposition format.
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        state.prometheus.render(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use common::Secret;
    use google_auth::{ClientConfig, GoogleFlow};
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Mutex;
    use tower::ServiceExt;

    const SCENARIO_TOKENS: &str = r#"{"token":"t1","token_uri":"https://oauth2.googleapis.com/token","client_id":"c1","client_secret":"s1","scopes":["profile"]}"#;

    fn test_client_config() -> ClientConfig {
        ClientConfig::new(
            "c1.apps.googleusercontent.com".into(),
            Secret::new("s1".into()),
            "http://localhost:8000/auth/google/callback".into(),
        )
    }

    fn issued_bundle() -> TokenBundle {
        TokenBundle {
            token: "ya29.issued".into(),
            refresh_token: Some("1//refresh".into()),
            token_uri: "https://oauth2.googleapis.com/token".into(),
            client_id: "c1.apps.googleusercontent.com".into(),
            client_secret: "s1".into(),
            scopes: vec!["https://www.googleapis.com/auth/userinfo.profile".into()],
        }
    }

    /// Builds real consent URLs; accepts only `good-code` on exchange.
    struct StubFlow {
        google: GoogleFlow,
        verifiers: Mutex<Vec<String>>,
    }

    impl StubFlow {
        fn new() -> Self {
            Self {
                google: GoogleFlow::new(reqwest::Client::new(), test_client_config()),
                verifiers: Mutex::new(vec![]),
            }
        }
    }

    impl FlowClient for StubFlow {
        fn authorization_url(&self, state: &str, code_challenge: &str) -> String {
            self.google.authorization_url(state, code_challenge)
        }

        fn exchange_code<'a>(
            &'a self,
            code: &'a str,
            code_verifier: &'a str,
        ) -> Pin<Box<dyn Future<Output = google_auth::Result<TokenBundle>> + Send + 'a>> {
            self.verifiers.lock().unwrap().push(code_verifier.to_string());
            Box::pin(async move {
                if code == "good-code" {
                    Ok(issued_bundle())
                } else {
                    Err(google_auth::Error::TokenExchange(
                        "token endpoint returned 400 Bad Request: invalid_grant".into(),
                    ))
                }
            })
        }
    }

    /// Returns a fixed profile (or a failure) and records the credentials it saw.
    struct StubProfiles {
        fail: bool,
        seen: Mutex<Vec<TokenBundle>>,
    }

    impl StubProfiles {
        fn new(fail: bool) -> Self {
            Self {
                fail,
                seen: Mutex::new(vec![]),
            }
        }
    }

    impl ProfileClient for StubProfiles {
        fn get_own_profile<'a>(
            &'a self,
            credentials: &'a TokenBundle,
        ) -> Pin<Box<dyn Future<Output = google_auth::Result<Profile>> + Send + 'a>> {
            self.seen.lock().unwrap().push(credentials.clone());
            Box::pin(async move {
                if self.fail {
                    return Err(google_auth::Error::InvalidCredentials(
                        "access token rejected (401 Unauthorized)".into(),
                    ));
                }
                let mut profile = Profile::new();
                profile.insert("id".into(), "123".into());
                profile.insert("name".into(), "Ada".into());
                Ok(profile)
            })
        }
    }

    struct Harness {
        app: Router,
        state: AppState,
        flow: Arc<StubFlow>,
        profiles: Arc<StubProfiles>,
    }

    fn harness(profile_fails: bool) -> Harness {
        let flow = Arc::new(StubFlow::new());
        let profiles = Arc::new(StubProfiles::new(profile_fails));
        let (_recorder, prometheus) = crate::metrics::local_recorder();
        let state = AppState {
            flow: flow.clone(),
            profiles: profiles.clone(),
            consents: ConsentStore::default(),
            prometheus,
            started_at: Instant::now(),
        };
        Harness {
            app: build_router(state.clone(), 1000),
            state,
            flow,
            profiles,
        }
    }

    async fn get(app: &Router, uri: &str) -> Response {
        app.clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn body_bytes(response: Response) -> Vec<u8> {
        axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .unwrap()
            .to_vec()
    }

    fn location(response: &Response) -> String {
        response
            .headers()
            .get(header::LOCATION)
            .expect("redirect must carry Location")
            .to_str()
            .unwrap()
            .to_string()
    }

    /// Decoded value of `name` in the query part of `url`.
    fn query_value(url: &str, name: &str) -> Option<String> {
        let query = url.split_once('?')?.1;
        query.split('&').find_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            (key == name).then(|| urlencoding::decode(value).unwrap().into_owned())
        })
    }

    fn whoami_uri(tokens: &str) -> String {
        format!("/auth/whoami?tokens={}", urlencoding::encode(tokens))
    }

    #[tokio::test]
    async fn homepage_renders_html() {
        let h = harness(false);
        let response = get(&h.app, "/?tokens=ignored").await;

        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap().to_string();
        assert!(content_type.starts_with("text/html"));
        let body = String::from_utf8(body_bytes(response).await).unwrap();
        assert!(body.contains("/auth/google/consent"));
        assert!(body.contains("/static/index.js"));
    }

    #[tokio::test]
    async fn homepage_script_served() {
        let h = harness(false);
        let response = get(&h.app, "/static/index.js").await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = String::from_utf8(body_bytes(response).await).unwrap();
        assert!(body.contains("/auth/whoami?tokens="));
    }

    #[tokio::test]
    async fn homepage_script_builds_profile_with_dom_nodes() {
        let h = harness(false);
        let body = String::from_utf8(body_bytes(get(&h.app, "/static/index.js").await).await).unwrap();

        assert!(body.contains("createElement('img')"));
        assert!(body.contains("textContent"));
        assert!(!body.contains("innerHTML"), "profile fields must not pass through HTML parsing");
    }

    #[tokio::test]
    async fn favicon_is_always_no_content() {
        let h = harness(false);
        for _ in 0..3 {
            let response = get(&h.app, "/favicon.ico").await;
            assert_eq!(response.status(), StatusCode::NO_CONTENT);
            assert!(body_bytes(response).await.is_empty());
        }
    }

    #[tokio::test]
    async fn consent_redirects_to_google_with_offline_access() {
        let h = harness(false);
        let response = get(&h.app, "/auth/google/consent").await;

        assert_eq!(response.status(), StatusCode::FOUND);
        let target = location(&response);
        assert!(
            target.starts_with("https://accounts.google.com/"),
            "consent must redirect to Google's authorization host, got: {target}"
        );
        assert_eq!(query_value(&target, "access_type").as_deref(), Some("offline"));
        assert_eq!(
            query_value(&target, "include_granted_scopes").as_deref(),
            Some("true")
        );
        assert_eq!(
            query_value(&target, "redirect_uri").as_deref(),
            Some("http://localhost:8000/auth/google/callback")
        );

        let state = query_value(&target, "state").expect("state parameter");
        assert_eq!(h.state.consents.len().await, 1);
        assert!(h.state.consents.take(Some(&state)).await.is_ok());
    }

    #[tokio::test]
    async fn callback_success_redirects_home_with_tokens() {
        let h = harness(false);
        let ticket = h.state.consents.begin().await;

        let response = get(
            &h.app,
            &format!("/auth/google/callback?code=good-code&state={}", ticket.state),
        )
        .await;

        assert_eq!(response.status(), StatusCode::FOUND);
        let target = location(&response);
        assert!(target.starts_with("/?tokens="), "got: {target}");

        let tokens = query_value(&target, "tokens").unwrap();
        let json: serde_json::Value = serde_json::from_str(&tokens).unwrap();
        assert_eq!(json["token"], "ya29.issued");
        assert_eq!(json["refresh_token"], "1//refresh");
        assert_eq!(json["token_uri"], "https://oauth2.googleapis.com/token");
        assert_eq!(json["client_id"], "c1.apps.googleusercontent.com");
        assert_eq!(json["client_secret"], "s1");
        assert_eq!(json["scopes"][0], "https://www.googleapis.com/auth/userinfo.profile");

        // The verifier matching the ticket's challenge was sent with the code
        let verifiers = h.flow.verifiers.lock().unwrap().clone();
        assert_eq!(verifiers.len(), 1);
        assert_eq!(google_auth::compute_challenge(&verifiers[0]), ticket.code_challenge);
    }

    #[tokio::test]
    async fn callback_with_rejected_code_returns_500() {
        let h = harness(false);
        let ticket = h.state.consents.begin().await;

        let response = get(
            &h.app,
            &format!("/auth/google/callback?code=bad-code&state={}", ticket.state),
        )
        .await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.headers().get(header::LOCATION).is_none());
        assert_eq!(body_bytes(response).await, b"Error during authentication");
    }

    #[tokio::test]
    async fn callback_without_code_returns_500() {
        let h = harness(false);
        let ticket = h.state.consents.begin().await;

        for uri in [
            format!("/auth/google/callback?state={}", ticket.state),
            format!("/auth/google/callback?code=&state={}", ticket.state),
            "/auth/google/callback".to_string(),
        ] {
            let response = get(&h.app, &uri).await;
            assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR, "uri: {uri}");
        }
        assert!(h.flow.verifiers.lock().unwrap().is_empty(), "no exchange attempted");
    }

    #[tokio::test]
    async fn callback_with_forged_or_missing_state_returns_500() {
        let h = harness(false);

        for uri in [
            "/auth/google/callback?code=good-code",
            "/auth/google/callback?code=good-code&state=forged",
        ] {
            let response = get(&h.app, uri).await;
            assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR, "uri: {uri}");
            assert_eq!(body_bytes(response).await, b"Error during authentication");
        }
        assert!(h.flow.verifiers.lock().unwrap().is_empty(), "no exchange attempted");
    }

    #[tokio::test]
    async fn callback_state_cannot_be_replayed() {
        let h = harness(false);
        let ticket = h.state.consents.begin().await;
        let uri = format!("/auth/google/callback?code=good-code&state={}", ticket.state);

        assert_eq!(get(&h.app, &uri).await.status(), StatusCode::FOUND);
        assert_eq!(
            get(&h.app, &uri).await.status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn callback_with_consent_denied_returns_500() {
        let h = harness(false);
        let ticket = h.state.consents.begin().await;

        let response = get(
            &h.app,
            &format!("/auth/google/callback?error=access_denied&state={}", ticket.state),
        )
        .await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn denied_consent_releases_pending_state() {
        let h = harness(false);
        let ticket = h.state.consents.begin().await;
        assert_eq!(h.state.consents.len().await, 1);

        let response = get(
            &h.app,
            &format!("/auth/google/callback?error=access_denied&state={}", ticket.state),
        )
        .await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        assert_eq!(h.state.consents.len().await, 0, "denied consent must be consumed");
        assert!(matches!(
            h.state.consents.take(Some(&ticket.state)).await,
            Err(crate::consent::ConsentError::Unknown)
        ));
        assert!(h.flow.verifiers.lock().unwrap().is_empty(), "no exchange attempted");
    }

    #[tokio::test]
    async fn whoami_returns_stub_profile_verbatim() {
        let h = harness(false);
        let response = get(&h.app, &whoami_uri(SCENARIO_TOKENS)).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_bytes(response).await, br#"{"id":"123","name":"Ada"}"#);

        let seen = h.profiles.seen.lock().unwrap().clone();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].token, "t1");
        assert_eq!(seen[0].refresh_token, None);
        assert_eq!(seen[0].scopes, vec!["profile"]);
    }

    #[tokio::test]
    async fn whoami_rejects_malformed_tokens() {
        let h = harness(false);
        let full: serde_json::Value = serde_json::from_str(SCENARIO_TOKENS).unwrap();

        let mut cases: Vec<String> = vec!["not json".into(), "{".into(), "[]".into(), "".into()];
        for field in ["token", "token_uri", "client_id", "client_secret", "scopes"] {
            let mut partial = full.clone();
            partial.as_object_mut().unwrap().remove(field);
            cases.push(partial.to_string());
        }

        for tokens in cases {
            let response = get(&h.app, &whoami_uri(&tokens)).await;
            assert_eq!(
                response.status(),
                StatusCode::INTERNAL_SERVER_ERROR,
                "tokens: {tokens}"
            );
            assert_eq!(body_bytes(response).await, b"Error fetching user info");
        }
        assert!(
            h.profiles.seen.lock().unwrap().is_empty(),
            "profile client must not be called with a malformed bundle"
        );
    }

    #[tokio::test]
    async fn whoami_without_tokens_returns_500() {
        let h = harness(false);
        let response = get(&h.app, "/auth/whoami").await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn whoami_profile_failure_returns_500() {
        let h = harness(true);
        let response = get(&h.app, &whoami_uri(SCENARIO_TOKENS)).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_bytes(response).await, b"Error fetching user info");
        assert_eq!(h.profiles.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn callback_bundle_round_trips_into_whoami() {
        let h = harness(false);

        let consent = get(&h.app, "/auth/google/consent").await;
        let state = query_value(&location(&consent), "state").unwrap();

        let callback = get(
            &h.app,
            &format!(
                "/auth/google/callback?code=good-code&state={}&scope=profile",
                urlencoding::encode(&state)
            ),
        )
        .await;
        assert_eq!(callback.status(), StatusCode::FOUND);
        let tokens = query_value(&location(&callback), "tokens").unwrap();

        let response = get(&h.app, &whoami_uri(&tokens)).await;
        assert_eq!(response.status(), StatusCode::OK);

        let seen = h.profiles.seen.lock().unwrap().clone();
        assert_eq!(seen, vec![issued_bundle()]);
    }

    #[tokio::test]
    async fn health_reports_pending_consents() {
        let h = harness(false);
        h.state.consents.begin().await;

        let response = get(&h.app, "/health").await;
        assert_eq!(response.status(), StatusCode::OK);
        let json: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["pending_consents"], 1);
        assert!(json["uptime_seconds"].is_u64());
    }

    #[tokio::test]
    async fn metrics_endpoint_returns_prometheus_format() {
        let h = harness(false);
        let response = get(&h.app, "/metrics").await;

        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap().to_string();
        assert!(content_type.contains("text/plain"));
    }
}
