use axum::Router;
use mfa_gate_policy::Gate;
use mfa_gate_server::{
    WatcherAssets,
    config::ServerConfig,
    error::ServerError,
    identity::HttpPrincipalResolver,
    proxy::{self, Upstream},
};
use std::{fmt::Display, sync::Arc};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Upper bound for buffered request bodies forwarded upstream.
const MAX_REQUEST_BODY_BYTES: usize = 512 * 1024 * 1024;

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load and validate configuration; a bad redirect target must stop us here
    let config = ServerConfig::from_env().unwrap_or_else(|report| fatal(report));
    let enforcement = config
        .enforcement_config()
        .unwrap_or_else(|report| fatal(report));
    let upstream_url = config.upstream().unwrap_or_else(|report| fatal(report));
    let whoami_url = config.whoami_url().unwrap_or_else(|report| fatal(report));
    tracing::info!("Loaded configuration");

    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .map_err(|err| ServerError::HttpClient {
            details: err.to_string(),
        })
        .unwrap_or_else(|err| fatal(err));

    log_banner(&config, &enforcement);

    let resolver = Arc::new(HttpPrincipalResolver::new(client.clone(), whoami_url));
    let gate = Gate::new(enforcement, resolver);

    let upstream = Router::new()
        .fallback(proxy::forward)
        .with_state(Arc::new(Upstream::new(
            client,
            upstream_url,
            MAX_REQUEST_BODY_BYTES,
        )));

    let mount_path = match config.watcher.assets_dir {
        Some(_) => config
            .watcher
            .validated_mount_path()
            .unwrap_or_else(|report| fatal(report)),
        None => String::new(),
    };
    let assets = config.watcher.assets_dir.as_deref().map(|dir| {
        tracing::info!(dir = %dir.display(), mount_path = %mount_path, "Serving watcher bundle");
        WatcherAssets {
            mount_path: &mount_path,
            dir,
        }
    });
    let app = mfa_gate_server::router(gate, upstream, assets);

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .map_err(|err| ServerError::Bind {
            addr: config.listen_addr.to_string(),
            details: err.to_string(),
        })
        .unwrap_or_else(|err| fatal(err));

    tracing::info!("listening on http://{}", config.listen_addr);

    if let Err(err) = axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        fatal(ServerError::Serve {
            details: err.to_string(),
        });
    }
}

fn log_banner(config: &ServerConfig, enforcement: &mfa_gate_policy::EnforcementConfig) {
    let exempt: Vec<&str> = enforcement.exemptions().iter().collect();

    tracing::info!(
        enabled = enforcement.enabled(),
        upstream = %config.upstream_url,
        redirect_target = enforcement.redirect_target(),
        allow_safe_methods = enforcement.allow_safe_methods(),
        legacy_disable_enabled = enforcement.legacy_disable_enabled(),
        allowed_prefixes = enforcement.allowed_paths().len(),
        exempt = ?exempt,
        "Second-factor enforcement {}",
        if enforcement.enabled() { "ENABLED" } else { "disabled" }
    );
    if enforcement.enabled() && enforcement.allow_safe_methods() {
        tracing::info!("Read-only requests from users without a second factor are let through");
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %err, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("Gracefully shutdown");
}

fn fatal(err: impl Display) -> ! {
    tracing::error!("{err}");
    std::process::exit(1);
}
