//! Router assembly and server entrypoint.

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::trace::TraceLayer;

use super::client::ClientCache;
use super::{auth, handlers};
use crate::config::Config;
use crate::pool::TokenPool;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub pool: Arc<TokenPool>,
    pub clients: Arc<ClientCache>,
    pub config: Arc<Config>,
}

/// Build the application router.
///
/// Everything except /health sits behind the shared-secret middleware.
pub fn create_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/v1/chat/completions", post(handlers::chat_completions))
        .route("/pool/add", post(handlers::pool_add))
        .route("/pool/del", post(handlers::pool_del))
        .route("/pool/disp", get(handlers::pool_disp))
        .route("/pool/empty", post(handlers::pool_empty))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_secret,
        ));

    Router::new()
        .merge(protected)
        .route("/health", get(handlers::health))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Load the pool, assemble state, and serve until shutdown.
pub async fn run_server(config: Config) -> anyhow::Result<()> {
    let pool = Arc::new(TokenPool::load(&config.pool.path).await);
    tracing::info!(tokens = pool.len().await, path = %config.pool.path, "token pool loaded");

    let clients = Arc::new(ClientCache::new(
        &config.upstream.base_url,
        Duration::from_secs(config.upstream.connect_timeout_secs),
        Duration::from_secs(config.upstream.request_timeout_secs),
    ));

    let listen = config.server.listen.clone();
    let max_concurrency = config.server.max_concurrency;

    let state = AppState {
        pool,
        clients,
        config: Arc::new(config),
    };

    let app = create_router(state).layer(GlobalConcurrencyLimitLayer::new(max_concurrency));

    let listener = tokio::net::TcpListener::bind(&listen).await?;
    tracing::info!(addr = %listen, "listening");

    axum::serve(listener, app).await?;
    Ok(())
}
