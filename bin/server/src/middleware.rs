//! Second-factor enforcement middleware for Axum.

use axum::{
    Json,
    extract::{Request, State},
    http::{StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::CookieJar;
use mfa_gate_core::Identity;
use mfa_gate_policy::{Decision, EnforcementConfig, Gate, RequestHead};
use serde::Serialize;
use tracing::{debug, warn};

/// Shown to API clients whose request was blocked.
pub const SECOND_FACTOR_REQUIRED_MESSAGE: &str = "Two-Factor Authentication is required for your \
     account. Please configure 2FA in your profile settings before continuing.";

/// Body of the 403 answer to a blocked API request.
#[derive(Debug, Serialize)]
pub struct BlockedBody<'a> {
    pub error: bool,
    pub message: &'a str,
    #[serde(rename = "2fa_required")]
    pub second_factor_required: bool,
    pub redirect_to: &'a str,
    pub user_email: &'a str,
}

/// Runs the gate in front of every route.
///
/// Passed requests continue untouched; the response is never rewritten.
/// Paths with dot segments are refused before evaluation, since the
/// upstream would resolve them to a path other than the one checked.
pub async fn enforce_mfa(State(gate): State<Gate>, request: Request, next: Next) -> Response {
    if has_dot_segment(request.uri().path()) {
        warn!(path = request.uri().path(), "refusing path with dot segments");
        return (StatusCode::BAD_REQUEST, "Bad Request").into_response();
    }

    let head = request_head(gate.config(), &request);

    match gate.evaluate(&head).await {
        Decision::PassThrough(reason) => {
            debug!(%reason, path = head.path(), "request passes gate");
            next.run(request).await
        }
        Decision::Redirect { target, .. } => redirect(&target),
        Decision::Block {
            identity,
            redirect_to,
            ..
        } => blocked(&identity, &redirect_to),
    }
}

/// Captures what the gate needs from the request.
///
/// A request counts as carrying credentials when it has one of the
/// configured session cookies or an `Authorization` header.
pub fn request_head(config: &EnforcementConfig, request: &Request) -> RequestHead {
    let headers = request.headers();
    let jar = CookieJar::from_headers(headers);
    let has_session_cookie = config
        .session_cookie_names()
        .iter()
        .any(|name| jar.get(name).is_some_and(|cookie| !cookie.value().is_empty()));
    let has_authorization = headers.contains_key(header::AUTHORIZATION);

    RequestHead::new(
        request.method().clone(),
        request.uri().path(),
        headers.clone(),
    )
    .with_credentials(has_session_cookie || has_authorization)
}

/// Whether `path` has a `.` or `..` segment, literal or percent-encoded.
///
/// Backslashes count as separators, as they do when the upstream URL is
/// parsed.
pub fn has_dot_segment(path: &str) -> bool {
    path.split(['/', '\\']).any(|segment| {
        let decoded = segment.replace("%2e", ".").replace("%2E", ".");
        decoded == "." || decoded == ".."
    })
}

fn redirect(target: &str) -> Response {
    (
        StatusCode::FOUND,
        [
            (header::LOCATION, target.to_string()),
            (header::CACHE_CONTROL, "no-store".to_string()),
        ],
    )
        .into_response()
}

fn blocked(identity: &Identity, redirect_to: &str) -> Response {
    let body = BlockedBody {
        error: true,
        message: SECOND_FACTOR_REQUIRED_MESSAGE,
        second_factor_required: true,
        redirect_to,
        user_email: identity.as_str(),
    };
    (StatusCode::FORBIDDEN, Json(body)).into_response()
}
