//! HTML 页面：首页、受保护内容页、错误页与具名页面。
//!
//! 页面优先读取页面目录下的同名 HTML 文件，缺失时回退内置页面。

use std::path::Path as FsPath;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use tracing::{debug, error};

use crate::{
    slug::registry::{RegistryError, TokenError},
    state::AppState,
};

const INDEX_PAGE: &str = "index";
const CONTENT_PAGE: &str = "protected_content";
const ERROR_PAGE: &str = "error";

/// 首页。
pub(crate) async fn index_handler(State(state): State<AppState>) -> Response {
    let body = load_page(&state.pages_dir, INDEX_PAGE)
        .await
        .unwrap_or_else(|| BUILTIN_INDEX.to_string());
    Html(body).into_response()
}

/// 受保护内容：直接消费 slug，成功渲染内容，失败按错误种类渲染错误页。
pub(crate) async fn content_handler(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Response {
    let consumed = state
        .run_registry(move |registry| registry.consume(&slug))
        .await;
    match consumed {
        Ok(()) => {
            let body = load_page(&state.pages_dir, CONTENT_PAGE)
                .await
                .unwrap_or_else(|| BUILTIN_CONTENT.to_string());
            Html(body).into_response()
        }
        Err(RegistryError::Token(err)) => {
            let (status, message) = content_error(err);
            error_page(&state.pages_dir, status, message).await
        }
        Err(RegistryError::Store(err)) => {
            error!("content consume failed: {err}");
            error_page(
                &state.pages_dir,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Serviço indisponível",
            )
            .await
        }
    }
}

/// 具名页面：`/pagina/{name}` 读取 `<pages_dir>/<name>.html`。
pub(crate) async fn named_page_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Response {
    if !is_page_name(&name) {
        return error_page(&state.pages_dir, StatusCode::NOT_FOUND, "Página não encontrada").await;
    }
    match load_page(&state.pages_dir, &name).await {
        Some(body) => Html(body).into_response(),
        None => error_page(&state.pages_dir, StatusCode::NOT_FOUND, "Página não encontrada").await,
    }
}

/// slug 错误对应的状态码与页面文案。
fn content_error(err: TokenError) -> (StatusCode, &'static str) {
    match err {
        TokenError::NotFound => (StatusCode::NOT_FOUND, "Link não encontrado"),
        TokenError::Expired => (StatusCode::BAD_REQUEST, "Este link expirou"),
        TokenError::AlreadyUsed => (StatusCode::BAD_REQUEST, "Este link já foi utilizado"),
    }
}

/// 渲染错误页；自定义模板中的 `{{ error_message }}` 会被替换。
async fn error_page(pages_dir: &FsPath, status: StatusCode, message: &str) -> Response {
    let escaped = escape_html(message);
    let body = match load_page(pages_dir, ERROR_PAGE).await {
        Some(template) => template
            .replace("{{ error_message }}", &escaped)
            .replace("{{error_message}}", &escaped),
        None => BUILTIN_ERROR.replace("{{error_message}}", &escaped),
    };
    (status, Html(body)).into_response()
}

/// 读取页面文件；不存在或读取失败时返回 None。
async fn load_page(pages_dir: &FsPath, name: &str) -> Option<String> {
    let path = pages_dir.join(format!("{name}.html"));
    match tokio::fs::read_to_string(&path).await {
        Ok(body) => Some(body),
        Err(err) => {
            debug!(path = %path.display(), "page not loaded: {err}");
            None
        }
    }
}

/// 页面名只允许 `[A-Za-z0-9_-]`，防止目录穿越。
fn is_page_name(raw: &str) -> bool {
    !raw.is_empty()
        && raw.len() <= 64
        && raw
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

const BUILTIN_INDEX: &str = r#"<!DOCTYPE html>
<html lang="pt-BR">
<head>
  <meta charset="utf-8">
  <title>Link de acesso único</title>
</head>
<body>
  <h1>Link de acesso único</h1>
  <p>Gere um link válido por tempo limitado. Ele só pode ser aberto uma vez.</p>
  <button id="generate">Gerar link</button>
  <p id="result"></p>
  <script>
    document.getElementById("generate").addEventListener("click", async () => {
      const result = document.getElementById("result");
      const resp = await fetch("/generate-slug");
      const body = await resp.json();
      if (!body.ok) {
        result.textContent = body.message;
        return;
      }
      const link = document.createElement("a");
      link.href = "/content/" + body.data.slug;
      link.textContent = location.origin + link.getAttribute("href");
      result.replaceChildren(link);
    });
  </script>
</body>
</html>
"#;

const BUILTIN_CONTENT: &str = r#"<!DOCTYPE html>
<html lang="pt-BR">
<head>
  <meta charset="utf-8">
  <title>Conteúdo protegido</title>
</head>
<body>
  <h1>Conteúdo protegido</h1>
  <p>Este link foi consumido e não poderá ser aberto novamente.</p>
</body>
</html>
"#;

const BUILTIN_ERROR: &str = r#"<!DOCTYPE html>
<html lang="pt-BR">
<head>
  <meta charset="utf-8">
  <title>Erro</title>
</head>
<body>
  <h1>Erro</h1>
  <p>{{error_message}}</p>
  <p><a href="/">Voltar</a></p>
</body>
</html>
"#;
