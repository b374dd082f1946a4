//! API 错误定义与响应转换。

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::Value;
use sg_protocol::{
    ApiEnvelope, CODE_SLUG_ALREADY_USED, CODE_SLUG_EXPIRED, CODE_SLUG_NOT_FOUND,
    CODE_STORAGE_UNAVAILABLE,
};
use tracing::error;

use crate::slug::{
    registry::{RegistryError, TokenError},
    store::StoreError,
};

/// 接口错误。
#[derive(Debug)]
pub(crate) struct ApiError {
    pub(crate) status: StatusCode,
    pub(crate) code: &'static str,
    pub(crate) message: String,
    pub(crate) suggestion: &'static str,
}

impl ApiError {
    /// 构造统一 API 错误。
    pub(crate) fn new(
        status: StatusCode,
        code: &'static str,
        message: impl Into<String>,
        suggestion: &'static str,
    ) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            suggestion,
        }
    }

    /// 存储故障统一映射为 500，不暴露内部细节。
    pub(crate) fn storage(err: &StoreError) -> Self {
        error!("slug store failure: {err}");
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            CODE_STORAGE_UNAVAILABLE,
            "Slug storage is unavailable",
            "Try again later",
        )
    }
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::NotFound => Self::new(
                StatusCode::NOT_FOUND,
                CODE_SLUG_NOT_FOUND,
                "Slug not found",
                "Request a new link",
            ),
            TokenError::Expired => Self::new(
                StatusCode::BAD_REQUEST,
                CODE_SLUG_EXPIRED,
                "Slug has expired",
                "Request a new link",
            ),
            TokenError::AlreadyUsed => Self::new(
                StatusCode::BAD_REQUEST,
                CODE_SLUG_ALREADY_USED,
                "Slug has already been used",
                "Request a new link",
            ),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        Self::storage(&err)
    }
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::Token(err) => err.into(),
            RegistryError::Store(err) => err.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiEnvelope::<Value>::failure(self.code, self.message, self.suggestion);
        (self.status, Json(body)).into_response()
    }
}
