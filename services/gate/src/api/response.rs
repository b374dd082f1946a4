//! API 响应包裹。

use axum::{Json, http::StatusCode};
use serde::Serialize;
use sg_protocol::ApiEnvelope;

/// 构造成功响应。
pub(crate) fn ok_response<T: Serialize>(
    message: impl Into<String>,
    suggestion: impl Into<String>,
    data: T,
) -> (StatusCode, Json<ApiEnvelope<T>>) {
    (
        StatusCode::OK,
        Json(ApiEnvelope::success(message, suggestion, data)),
    )
}
