// 文件职责：
// 1) 定义 gate 服务与客户端共用的 HTTP 响应结构。
// 2) 固定错误码常量，客户端按错误码选择提示文案。
// 3) 提供跨端一致的时间戳格式化函数。

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// 成功响应码。
pub const CODE_OK: &str = "OK";
/// slug 不存在。
pub const CODE_SLUG_NOT_FOUND: &str = "SLUG_NOT_FOUND";
/// slug 已过期。
pub const CODE_SLUG_EXPIRED: &str = "SLUG_EXPIRED";
/// slug 已被使用。
pub const CODE_SLUG_ALREADY_USED: &str = "SLUG_ALREADY_USED";
/// 存储后端不可用。
pub const CODE_STORAGE_UNAVAILABLE: &str = "STORAGE_UNAVAILABLE";

/// 通用 API 成功/失败包裹结构。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiEnvelope<T> {
    // 是否成功。
    pub ok: bool,
    // 响应码（成功固定为 `OK`）。
    pub code: String,
    // 面向用户的说明。
    pub message: String,
    // 下一步建议。
    pub suggestion: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    // 业务数据（失败时为空）。
    pub data: Option<T>,
}

impl<T> ApiEnvelope<T> {
    /// 构造成功包裹。
    pub fn success(message: impl Into<String>, suggestion: impl Into<String>, data: T) -> Self {
        Self {
            ok: true,
            code: CODE_OK.to_string(),
            message: message.into(),
            suggestion: suggestion.into(),
            data: Some(data),
        }
    }

    /// 构造失败包裹。
    pub fn failure(
        code: impl Into<String>,
        message: impl Into<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self {
            ok: false,
            code: code.into(),
            message: message.into(),
            suggestion: suggestion.into(),
            data: None,
        }
    }
}

/// `GET /generate-slug` 返回数据。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlugIssuedData {
    // 新签发的 slug。
    pub slug: String,
    // 签发时间（RFC3339）。
    pub created_at: String,
    // 过期时间（RFC3339）。
    pub expires_at: String,
}

/// `GET /validate/{slug}` 返回数据。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlugValidityData {
    pub valid: bool,
}

/// `POST /use/{slug}` 返回数据。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlugUsedData {
    pub slug: String,
}

/// `GET /api` 返回数据。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStatusData {
    // 服务状态（`ok` / `degraded`）。
    pub status: String,
    // 服务版本。
    pub version: String,
    // 已签发 slug 总数（存储不可用时为空）。
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issued: Option<usize>,
    // 已消费 slug 数（存储不可用时为空）。
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub used: Option<usize>,
}

/// 格式化为毫秒精度 UTC 时间戳（RFC3339）。
pub fn to_rfc3339_millis(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}
