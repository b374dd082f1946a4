//! JSON 接口：签发、预校验、消费与服务状态。

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use sg_protocol::{
    ApiEnvelope, ServiceStatusData, SlugIssuedData, SlugUsedData, SlugValidityData,
    to_rfc3339_millis,
};
use tracing::warn;

use crate::{
    api::{error::ApiError, response::ok_response},
    slug::registry::RegistryError,
    state::AppState,
};

type ApiResult<T> = Result<(StatusCode, Json<ApiEnvelope<T>>), ApiError>;

/// 健康检查接口。
pub(crate) async fn healthz() -> &'static str {
    "ok"
}

/// 服务状态接口：存储不可用时仍返回 200，状态标记为 `degraded`。
pub(crate) async fn api_status_handler(
    State(state): State<AppState>,
) -> (StatusCode, Json<ApiEnvelope<ServiceStatusData>>) {
    let stats = state
        .run_registry(|registry| registry.stats().map_err(RegistryError::from))
        .await;
    if let Err(err) = &stats {
        warn!("status stats failed: {err}");
    }
    let stats = stats.ok();
    ok_response(
        "API is running",
        "",
        ServiceStatusData {
            status: if stats.is_some() { "ok" } else { "degraded" }.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            issued: stats.map(|value| value.total),
            used: stats.map(|value| value.used),
        },
    )
}

/// 签发接口：生成新的一次性 slug。
pub(crate) async fn generate_slug_handler(
    State(state): State<AppState>,
) -> ApiResult<SlugIssuedData> {
    let issued = state
        .run_registry(|registry| registry.issue().map_err(RegistryError::from))
        .await?;
    Ok(ok_response(
        "Slug generated",
        "Open the link before it expires; it works only once",
        SlugIssuedData {
            slug: issued.slug,
            created_at: to_rfc3339_millis(issued.created_at),
            expires_at: to_rfc3339_millis(issued.expires_at),
        },
    ))
}

/// 预校验接口：只读，不消耗 slug。
pub(crate) async fn validate_slug_handler(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<SlugValidityData> {
    state
        .run_registry(move |registry| registry.check(&slug))
        .await?;
    Ok(ok_response(
        "Slug is valid",
        "Use the slug to open the content",
        SlugValidityData { valid: true },
    ))
}

/// 消费接口：校验通过后立即作废。
pub(crate) async fn use_slug_handler(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<SlugUsedData> {
    let target = slug.clone();
    state
        .run_registry(move |registry| registry.consume(&target))
        .await?;
    Ok(ok_response("Slug successfully used", "", SlugUsedData { slug }))
}
