//! micropost - post service and API gateway
//!
//! One binary, two roles selected by `SERVICE_ROLE`: the gateway (global
//! token bucket + reverse proxy) or the post service (sensitive-endpoint
//! window + cached post API).

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use micropost::admission::{AdmissionController, AdmissionLayer, LimitPolicy};
use micropost::api::{create_router, AppState};
use micropost::gateway::{create_gateway_router, GatewayState, StaticCredentials};
use micropost::records::MemoryRecords;
use micropost::store::{CounterStore, MemoryStore, RedisStore};
use micropost::{spawn_cleanup_task, Config, ServiceRole};

/// Main entry point.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Connect the counter store (Redis, or memory plus its cleanup task)
/// 4. Build the router for the configured role
/// 5. Start HTTP server on configured port
/// 6. Handle graceful shutdown on SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "micropost=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    info!(
        "Configuration loaded: role={}, port={}, counter_store={}",
        config.role,
        config.server_port,
        if config.redis_url.is_some() { "redis" } else { "memory" }
    );

    let (store, cleanup_handle) = connect_store(&config).await?;

    let app = match config.role {
        ServiceRole::Gateway => build_gateway(&config, store),
        ServiceRole::Posts => build_post_service(&config, store),
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("{} listening on http://{}", config.role, addr);

    // Peer addresses feed the per-IP limiters
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(cleanup_handle))
    .await
    .context("server error")?;

    info!("Server shutdown complete");
    Ok(())
}

async fn connect_store(
    config: &Config,
) -> anyhow::Result<(Arc<dyn CounterStore>, Option<JoinHandle<()>>)> {
    match &config.redis_url {
        Some(url) => {
            let store = RedisStore::connect(url)
                .await
                .context("failed to connect to Redis")?;
            Ok((Arc::new(store), None))
        }
        None => {
            warn!("REDIS_URL not set, using the process-local memory store");
            let store = Arc::new(MemoryStore::new(config.max_entries));
            let handle = spawn_cleanup_task(store.clone(), config.cleanup_interval);
            Ok((store, Some(handle)))
        }
    }
}

fn build_gateway(config: &Config, store: Arc<dyn CounterStore>) -> Router {
    let credentials = StaticCredentials::new(config.gateway_tokens.clone());
    if credentials.is_empty() {
        warn!("GATEWAY_TOKENS is empty, every /v1/posts request will be rejected");
    }

    let limiter = AdmissionController::new(
        "gateway",
        LimitPolicy::token_bucket(config.gateway_limit, config.gateway_period()),
        store,
    );
    info!(
        "Gateway limiter: {} requests per {}s per IP ({})",
        config.gateway_limit,
        config.gateway_period,
        limiter.policy().kind()
    );

    let state = GatewayState::new(
        config.identity_service_url.clone(),
        config.post_service_url.clone(),
        Arc::new(credentials),
    )
    .trust_forwarded_for(config.trust_forwarded_for);
    info!("Identity service at {}", state.identity_url);
    info!("Post service at {}", state.post_url);

    create_gateway_router(
        state,
        AdmissionLayer::new(Arc::new(limiter), config.trust_forwarded_for),
    )
}

fn build_post_service(config: &Config, store: Arc<dyn CounterStore>) -> Router {
    let limiter = AdmissionController::new(
        "sensitive",
        LimitPolicy::fixed_window(config.sensitive_max, config.sensitive_window()),
        store.clone(),
    )
    .with_rejection("Too Many Requests on sensitive endpoint");
    info!(
        "Sensitive endpoint limiter: {} requests per {}s per IP ({})",
        config.sensitive_max,
        config.sensitive_window,
        limiter.policy().kind()
    );

    let state = AppState::from_config(config, Arc::new(MemoryRecords::new()), store);
    create_router(
        state,
        AdmissionLayer::new(Arc::new(limiter), config.trust_forwarded_for),
    )
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
///
/// On shutdown signal, aborts the cleanup task and allows graceful shutdown.
async fn shutdown_signal(cleanup_handle: Option<JoinHandle<()>>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    if let Some(handle) = cleanup_handle {
        handle.abort();
        warn!("Cleanup task aborted");
    }
}
