//! 配置模块职责：
//! 1. 读取 gate 运行所需的环境变量并提供默认值。
//! 2. 对过期窗口、slug 长度做范围收敛，非法值回退默认。
//! 3. 根据存储后端配置打开对应的 slug 存储。

use std::{path::PathBuf, time::Duration};

use anyhow::{Context, anyhow};
use serde::Serialize;

use crate::slug::{
    generator::{DEFAULT_SLUG_LEN, MAX_SLUG_LEN, MIN_SLUG_LEN},
    registry::RegistryOptions,
    store::{JournalStore, MemoryStore, SlugStore},
};

/// 默认监听地址。
pub(crate) const DEFAULT_ADDR: &str = "0.0.0.0:8000";
/// 默认过期窗口（秒）。
pub(crate) const DEFAULT_TTL_SEC: u64 = 600;
/// 过期窗口上限（秒）。
const MAX_TTL_SEC: u64 = 30 * 24 * 3600;
/// 默认存储文件。
const DEFAULT_STORE_PATH: &str = "slugs.jsonl";
/// 默认静态资源目录。
const DEFAULT_STATIC_DIR: &str = "static";
/// 默认页面目录。
const DEFAULT_PAGES_DIR: &str = "templates";

pub(crate) const ADDR_ENV: &str = "SLUG_GATE_ADDR";
pub(crate) const TTL_ENV: &str = "SLUG_GATE_TTL_SEC";
const SLUG_LEN_ENV: &str = "SLUG_GATE_SLUG_LEN";
const STORE_ENV: &str = "SLUG_GATE_STORE";
const STORE_PATH_ENV: &str = "SLUG_GATE_STORE_PATH";
const STATIC_DIR_ENV: &str = "SLUG_GATE_STATIC_DIR";
const PAGES_DIR_ENV: &str = "SLUG_GATE_PAGES_DIR";

/// 存储后端。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) enum StoreBackend {
    /// 追加式 JSON 行日志文件，重启后回放。
    File,
    /// 进程内存，重启即丢失。
    Memory,
}

/// gate 运行时配置。
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Config {
    /// HTTP 监听地址。
    pub(crate) addr: String,
    /// slug 过期窗口。
    #[serde(serialize_with = "serialize_secs")]
    pub(crate) ttl: Duration,
    /// 过期窗口是否来自显式配置。
    pub(crate) ttl_explicit: bool,
    /// slug 长度。
    pub(crate) slug_length: usize,
    /// 存储后端。
    pub(crate) store: StoreBackend,
    /// JSON 存储文件路径。
    pub(crate) store_path: PathBuf,
    /// 静态资源目录（挂载到 `/static`）。
    pub(crate) static_dir: PathBuf,
    /// HTML 页面目录。
    pub(crate) pages_dir: PathBuf,
}

impl Config {
    /// 从进程环境变量构建配置。
    pub(crate) fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 从任意 key-value 来源构建配置。
    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let value = |key: &str| {
            lookup(key)
                .map(|raw| raw.trim().to_string())
                .filter(|raw| !raw.is_empty())
        };

        let ttl_sec = value(TTL_ENV)
            .and_then(|raw| raw.parse::<u64>().ok())
            .filter(|v| *v > 0);
        let ttl_explicit = ttl_sec.is_some();
        let ttl = Duration::from_secs(normalize_ttl_sec(ttl_sec));

        let slug_length =
            normalize_slug_len(value(SLUG_LEN_ENV).and_then(|raw| raw.parse::<usize>().ok()));

        let store = match value(STORE_ENV).as_deref() {
            None => StoreBackend::File,
            Some(raw) => parse_store_backend(raw)?,
        };

        Ok(Self {
            addr: value(ADDR_ENV).unwrap_or_else(|| DEFAULT_ADDR.to_string()),
            ttl,
            ttl_explicit,
            slug_length,
            store,
            store_path: PathBuf::from(
                value(STORE_PATH_ENV).unwrap_or_else(|| DEFAULT_STORE_PATH.to_string()),
            ),
            static_dir: PathBuf::from(
                value(STATIC_DIR_ENV).unwrap_or_else(|| DEFAULT_STATIC_DIR.to_string()),
            ),
            pages_dir: PathBuf::from(
                value(PAGES_DIR_ENV).unwrap_or_else(|| DEFAULT_PAGES_DIR.to_string()),
            ),
        })
    }

    /// registry 构造参数。
    pub(crate) fn registry_options(&self) -> RegistryOptions {
        RegistryOptions {
            ttl: self.ttl,
            slug_length: self.slug_length,
        }
    }

    /// 按配置打开存储句柄。
    pub(crate) fn open_store(&self) -> anyhow::Result<Box<dyn SlugStore>> {
        match self.store {
            StoreBackend::Memory => Ok(Box::new(MemoryStore::new())),
            StoreBackend::File => {
                let store = JournalStore::open(&self.store_path).with_context(|| {
                    format!("open slug store: {}", self.store_path.display())
                })?;
                Ok(Box::new(store))
            }
        }
    }
}

/// 解析存储后端名称。
fn parse_store_backend(raw: &str) -> anyhow::Result<StoreBackend> {
    match raw.to_ascii_lowercase().as_str() {
        "file" | "journal" | "json" => Ok(StoreBackend::File),
        "memory" | "mem" => Ok(StoreBackend::Memory),
        other => Err(anyhow!(
            "unsupported {STORE_ENV}: {other}; expected `file` or `memory`"
        )),
    }
}

/// 过期窗口收敛到 `[1, MAX_TTL_SEC]`，缺省或为 0 时回退默认值。
fn normalize_ttl_sec(raw: Option<u64>) -> u64 {
    raw.filter(|v| *v > 0)
        .map(|v| v.min(MAX_TTL_SEC))
        .unwrap_or(DEFAULT_TTL_SEC)
}

/// slug 长度收敛到 `[MIN_SLUG_LEN, MAX_SLUG_LEN]`。
fn normalize_slug_len(raw: Option<usize>) -> usize {
    raw.map(|v| v.clamp(MIN_SLUG_LEN, MAX_SLUG_LEN))
        .unwrap_or(DEFAULT_SLUG_LEN)
}

fn serialize_secs<S: serde::Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(value.as_secs())
}
