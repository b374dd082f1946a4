//! HTTP 外壳：JSON 接口与 HTML 页面，只负责调用 slug 注册表并映射结果。

mod handlers;
mod pages;

pub(crate) use handlers::{
    api_status_handler, generate_slug_handler, healthz, use_slug_handler, validate_slug_handler,
};
pub(crate) use pages::{content_handler, index_handler, named_page_handler};
