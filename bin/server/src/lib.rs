//! mfa-gate server.
//!
//! A reverse proxy that runs the second-factor gate in front of every
//! request to the protected application, and optionally serves the browser
//! watcher bundle.

pub mod config;
pub mod error;
pub mod identity;
pub mod middleware;
pub mod proxy;

use axum::Router;
use mfa_gate_policy::Gate;
use std::path::Path;
use tower_http::{services::ServeDir, trace::TraceLayer};

/// Static assets served by the gate itself.
#[derive(Debug, Clone, Copy)]
pub struct WatcherAssets<'a> {
    pub mount_path: &'a str,
    pub dir: &'a Path,
}

/// Builds the application router.
///
/// Every request, including the watcher bundle, passes the gate before it
/// reaches `upstream`.
pub fn router(gate: Gate, upstream: Router, assets: Option<WatcherAssets<'_>>) -> Router {
    let app = match assets {
        Some(assets) => Router::new().nest_service(assets.mount_path, ServeDir::new(assets.dir)),
        None => Router::new(),
    };

    app.fallback_service(upstream)
        .layer(axum::middleware::from_fn_with_state(
            gate,
            middleware::enforce_mfa,
        ))
        .layer(TraceLayer::new_for_http())
}
