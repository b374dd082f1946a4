//! gate 应用装配：路由、CORS、静态资源与监听。

use std::path::Path;

use axum::{
    Router,
    http::{Method, header::CONTENT_TYPE},
    routing::{get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::{
    config::{Config, TTL_ENV},
    state::AppState,
    web::{
        api_status_handler, content_handler, generate_slug_handler, healthz, index_handler,
        named_page_handler, use_slug_handler, validate_slug_handler,
    },
};

/// gate 入口：打开存储并启动 HTTP 路由。
pub(crate) async fn run(config: Config) -> anyhow::Result<()> {
    if !config.ttl_explicit {
        warn!(
            ttl_sec = config.ttl.as_secs(),
            "{TTL_ENV} not set; using default expiration window (deployments have used both 5s and 10min, set it explicitly)"
        );
    }

    let state = AppState::from_config(&config)?;
    let app = build_router(state, &config.static_dir);

    let listener = tokio::net::TcpListener::bind(&config.addr).await?;
    info!(
        ttl_sec = config.ttl.as_secs(),
        slug_length = config.slug_length,
        store = ?config.store,
        "slug-gate listening on {}",
        config.addr
    );
    axum::serve(listener, app).await?;
    Ok(())
}

/// 组装全部路由。
pub(crate) fn build_router(state: AppState, static_dir: &Path) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE]);

    Router::new()
        .route("/", get(index_handler))
        .route("/healthz", get(healthz))
        .route("/api", get(api_status_handler))
        .route("/generate-slug", get(generate_slug_handler))
        .route("/validate/{slug}", get(validate_slug_handler))
        .route("/use/{slug}", post(use_slug_handler))
        .route("/content/{slug}", get(content_handler))
        .route("/pagina/{name}", get(named_page_handler))
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
