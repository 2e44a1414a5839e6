//! Router-level tests of the gate in front of a stub application.

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
    routing::{get, post},
};
use mfa_gate_core::{Identity, MfaFlags, Principal};
use mfa_gate_policy::{
    EnforcementConfig, EnforcementSettings, Gate, IdentityLookupError, PrincipalResolver,
    RequestHead,
};
use rootcause::prelude::Report;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tower::ServiceExt;

/// Answers every lookup from a fixed table keyed by the bearer token.
struct TokenResolver {
    lookups: AtomicUsize,
}

impl TokenResolver {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            lookups: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl PrincipalResolver for TokenResolver {
    async fn resolve(
        &self,
        request: &RequestHead,
    ) -> Result<Option<Principal>, Report<IdentityLookupError>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        let token = request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .unwrap_or_default();

        let principal = |email: &str,
                         flags: MfaFlags|
         -> Result<Option<Principal>, Report<IdentityLookupError>> {
            Ok(Some(Principal::new(Identity::new(email), flags)))
        };
        match token {
            "plain" => principal("plain@example.com", MfaFlags::none()),
            "totp" => principal("totp@example.com", MfaFlags::none().with_totp(true)),
            "admin" => principal("Admin@Example.com", MfaFlags::none()),
            "broken" => Err(IdentityLookupError::Unreachable {
                details: "connection refused".to_string(),
            }
            .into()),
            _ => Ok(None),
        }
    }
}

fn settings() -> EnforcementSettings {
    EnforcementSettings {
        enabled: true,
        exempt_identities: vec!["admin@example.com".to_string()],
        ..EnforcementSettings::default()
    }
}

fn app(settings: EnforcementSettings, resolver: Arc<TokenResolver>) -> Router {
    let config = EnforcementConfig::from_settings(settings).expect("valid config");
    let upstream = Router::new()
        .route("/projects", get(|| async { "projects page" }))
        .route("/profile", get(|| async { "profile page" }))
        .route("/api/data/tasks", post(|| async { "task created" }))
        .route("/api/auth/authenticated", get(|| async { "{}" }));
    mfa_gate_server::router(Gate::new(config, resolver), upstream, None)
}

fn get_as(path: &str, token: &str) -> Request<Body> {
    Request::builder()
        .uri(path)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .expect("request")
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    String::from_utf8(bytes.to_vec()).expect("utf-8")
}

#[tokio::test]
async fn user_without_second_factor_is_redirected_to_profile() {
    let response = app(settings(), TokenResolver::new())
        .oneshot(get_as("/projects", "plain"))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(
        response.headers().get(header::LOCATION).expect("location"),
        "/profile"
    );
}

#[tokio::test]
async fn configuration_page_is_reachable_without_lookup() {
    let resolver = TokenResolver::new();
    let response = app(settings(), resolver.clone())
        .oneshot(get_as("/profile", "plain"))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "profile page");
    assert_eq!(resolver.lookups.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn compliant_user_reaches_application_unmodified() {
    let response = app(settings(), TokenResolver::new())
        .oneshot(get_as("/projects", "totp"))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "projects page");
}

#[tokio::test]
async fn exemption_ignores_case() {
    let response = app(settings(), TokenResolver::new())
        .oneshot(get_as("/projects", "admin"))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn anonymous_request_skips_lookup() {
    let resolver = TokenResolver::new();
    let request = Request::builder()
        .uri("/projects")
        .body(Body::empty())
        .expect("request");

    let response = app(settings(), resolver.clone())
        .oneshot(request)
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(resolver.lookups.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn failed_lookup_fails_open() {
    let response = app(settings(), TokenResolver::new())
        .oneshot(get_as("/projects", "broken"))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "projects page");
}

#[tokio::test]
async fn api_request_is_blocked_with_json() {
    let request = Request::builder()
        .method("POST")
        .uri("/api/data/tasks")
        .header(header::AUTHORIZATION, "Bearer plain")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{}"))
        .expect("request");

    let response = app(settings(), TokenResolver::new())
        .oneshot(request)
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body: serde_json::Value =
        serde_json::from_str(&body_text(response).await).expect("json body");
    assert_eq!(body["2fa_required"], true);
    assert_eq!(body["redirect_to"], "/profile");
    assert_eq!(body["user_email"], "plain@example.com");
}

#[tokio::test]
async fn disabled_enforcement_never_looks_up() {
    let resolver = TokenResolver::new();
    let settings = EnforcementSettings {
        enabled: false,
        ..settings()
    };

    let response = app(settings, resolver.clone())
        .oneshot(get_as("/projects", "plain"))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(resolver.lookups.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn read_only_posture_lets_navigation_through_but_blocks_writes() {
    let settings = EnforcementSettings {
        allow_safe_methods: true,
        ..settings()
    };
    let app = app(settings, TokenResolver::new());

    let read = app
        .clone()
        .oneshot(get_as("/projects", "plain"))
        .await
        .expect("response");
    assert_eq!(read.status(), StatusCode::OK);

    let write = Request::builder()
        .method("POST")
        .uri("/api/data/tasks")
        .header(header::AUTHORIZATION, "Bearer plain")
        .body(Body::empty())
        .expect("request");
    let response = app.oneshot(write).await.expect("response");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn preflight_passes() {
    let request = Request::builder()
        .method("OPTIONS")
        .uri("/api/data/tasks")
        .header(header::AUTHORIZATION, "Bearer plain")
        .body(Body::empty())
        .expect("request");

    let response = app(settings(), TokenResolver::new())
        .oneshot(request)
        .await
        .expect("response");

    assert_ne!(response.status(), StatusCode::FORBIDDEN);
    assert_ne!(response.status(), StatusCode::FOUND);
}

#[tokio::test]
async fn dot_segments_cannot_escape_an_allowed_prefix() {
    let resolver = TokenResolver::new();
    let app = app(settings(), resolver.clone());

    for path in [
        "/static/../api/data/tasks",
        "/static/%2e%2e/api/data/tasks",
        "/profile/./../projects",
    ] {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header(header::AUTHORIZATION, "Bearer plain")
            .body(Body::empty())
            .expect("request");
        let response = app.clone().oneshot(request).await.expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{path}");
    }
    assert_eq!(resolver.lookups.load(Ordering::SeqCst), 0);
}
