//! 日志系统模块职责：
//! 1. 初始化 stdout + 文件双通道 tracing 日志。
//! 2. 文件日志按天滚动，落在日志根目录下。
//! 3. 定期清理超过保留天数的历史日志文件。

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate, TimeDelta};
use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tracing::{debug, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter, Layer, filter::LevelFilter, layer::SubscriberExt, util::SubscriberInitExt,
};

/// 默认日志根目录（相对当前工作目录）。
const DEFAULT_LOG_DIR: &str = "logs";
/// 默认日志保留天数。
const DEFAULT_RETENTION_DAYS: u64 = 14;
/// 清理任务轮询周期。
const PRUNE_INTERVAL: Duration = Duration::from_secs(3600);
/// 文件日志级别环境变量（独立于 `RUST_LOG`）。
const FILE_LOG_LEVEL_ENV: &str = "SLUG_GATE_FILE_LOG_LEVEL";
/// stdout 默认日志过滤。
const DEFAULT_STDOUT_FILTER: &str = "info";

/// 日志运行时守卫，防止 non-blocking writer 提前析构。
pub(crate) struct LogRuntime {
    _stdout_guard: WorkerGuard,
    _file_guard: WorkerGuard,
    _pruner: JoinHandle<()>,
}

/// 初始化日志系统，并启动历史日志清理任务。
pub(crate) fn init(service_name: &str) -> Result<LogRuntime> {
    let log_dir = resolve_log_root();
    fs::create_dir_all(&log_dir)
        .with_context(|| format!("create log dir: {}", log_dir.display()))?;

    let retention = retention_days();
    prune_expired_logs(&log_dir, service_name, Local::now().date_naive(), retention)?;

    let file_appender = tracing_appender::rolling::daily(&log_dir, format!("{service_name}.log"));
    let (file_writer, file_guard) = tracing_appender::non_blocking(file_appender);
    let (stdout_writer, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_writer(stdout_writer)
        .with_ansi(true)
        .with_target(false)
        .compact()
        .with_filter(resolve_stdout_env_filter());
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_target(true)
        .with_filter(resolve_file_level_filter());

    tracing_subscriber::registry()
        .with(stdout_layer)
        .with(file_layer)
        .init();

    let pruner = spawn_prune_task(log_dir, service_name.to_string(), retention);
    Ok(LogRuntime {
        _stdout_guard: stdout_guard,
        _file_guard: file_guard,
        _pruner: pruner,
    })
}

/// stdout 过滤规则：优先 `RUST_LOG`，回退默认级别。
fn resolve_stdout_env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_STDOUT_FILTER))
}

/// 文件日志级别；默认 `debug`，便于回放每次签发与消费。
fn resolve_file_level_filter() -> LevelFilter {
    std::env::var(FILE_LOG_LEVEL_ENV)
        .ok()
        .and_then(|raw| raw.trim().parse::<LevelFilter>().ok())
        .unwrap_or(LevelFilter::DEBUG)
}

/// 日志根目录，相对路径基于当前工作目录。
fn resolve_log_root() -> PathBuf {
    let raw = std::env::var("SLUG_GATE_LOG_DIR").unwrap_or_else(|_| DEFAULT_LOG_DIR.to_string());
    let path = PathBuf::from(raw.trim());
    if path.is_absolute() {
        return path;
    }
    match std::env::current_dir() {
        Ok(dir) => dir.join(path),
        Err(_) => PathBuf::from(DEFAULT_LOG_DIR),
    }
}

/// 读取日志保留天数。
fn retention_days() -> u64 {
    std::env::var("SLUG_GATE_LOG_RETENTION_DAYS")
        .ok()
        .and_then(|raw| raw.trim().parse::<u64>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(DEFAULT_RETENTION_DAYS)
}

/// 后台定期清理历史日志。
fn spawn_prune_task(log_dir: PathBuf, service_name: String, retention: u64) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(PRUNE_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let today = Local::now().date_naive();
            if let Err(err) = prune_expired_logs(&log_dir, &service_name, today, retention) {
                warn!("prune logs failed: {err}");
            }
        }
    })
}

/// 删除早于保留窗口的 `<service>.log.YYYY-MM-DD` 文件，返回删除数量。
fn prune_expired_logs(
    log_dir: &Path,
    service_name: &str,
    today: NaiveDate,
    retention_days: u64,
) -> Result<usize> {
    let Some(cutoff) = i64::try_from(retention_days)
        .ok()
        .and_then(TimeDelta::try_days)
        .and_then(|keep| today.checked_sub_signed(keep))
    else {
        return Ok(0);
    };

    let prefix = format!("{service_name}.log.");
    let mut removed = 0;
    for entry in
        fs::read_dir(log_dir).with_context(|| format!("read log dir: {}", log_dir.display()))?
    {
        let entry = entry.with_context(|| format!("read entry under {}", log_dir.display()))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(day) = path
            .file_name()
            .and_then(|value| value.to_str())
            .and_then(|name| name.strip_prefix(&prefix))
            .and_then(|raw| NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok())
        else {
            continue;
        };
        if day < cutoff && fs::remove_file(&path).is_ok() {
            debug!(path = %path.display(), "expired log removed");
            removed += 1;
        }
    }
    Ok(removed)
}
