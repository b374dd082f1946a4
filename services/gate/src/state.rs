//! gate 共享状态：slug 注册表与页面目录。

use std::{path::PathBuf, sync::Arc};

use crate::{
    config::Config,
    slug::{
        clock::SystemClock,
        registry::{RegistryError, SlugRegistry},
        store::StoreError,
    },
};

/// 路由共享状态。
#[derive(Clone)]
pub(crate) struct AppState {
    /// slug 注册表（唯一持有存储句柄）。
    pub(crate) registry: Arc<SlugRegistry>,
    /// HTML 页面目录。
    pub(crate) pages_dir: Arc<PathBuf>,
}

impl AppState {
    /// 按配置打开存储并构造注册表。
    pub(crate) fn from_config(config: &Config) -> anyhow::Result<Self> {
        let store = config.open_store()?;
        let registry = SlugRegistry::new(
            store,
            Arc::new(SystemClock),
            config.registry_options(),
        );
        Ok(Self::new(registry, config.pages_dir.clone()))
    }

    pub(crate) fn new(registry: SlugRegistry, pages_dir: PathBuf) -> Self {
        Self {
            registry: Arc::new(registry),
            pages_dir: Arc::new(pages_dir),
        }
    }

    /// 在阻塞线程池上执行注册表操作，存储的锁等待与磁盘写入不占用 async worker。
    pub(crate) async fn run_registry<T, F>(&self, op: F) -> Result<T, RegistryError>
    where
        T: Send + 'static,
        F: FnOnce(&SlugRegistry) -> Result<T, RegistryError> + Send + 'static,
    {
        let registry = Arc::clone(&self.registry);
        tokio::task::spawn_blocking(move || op(&registry))
            .await
            .map_err(|err| {
                RegistryError::Store(StoreError::Unavailable(format!(
                    "registry task failed: {err}"
                )))
            })?
    }
}
