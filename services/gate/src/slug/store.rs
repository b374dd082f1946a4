//! slug 存储：唯一键插入、按键查询、按键置位 `used`。
//!
//! 提供两种后端：
//! 1. `MemoryStore`：进程内表，不落盘。
//! 2. `JournalStore`：追加式 JSON 行日志，每次变更只追加一行，进程重启后回放恢复。

use std::{
    collections::HashMap,
    fmt,
    fs::{self, File, OpenOptions},
    io::{ErrorKind, Write},
    path::PathBuf,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// 单条 slug 记录。
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SlugRecord {
    /// slug 本身，同时是主键。
    pub(crate) slug: String,
    /// 签发时间，写入后不再变化。
    pub(crate) created_at: DateTime<Utc>,
    /// 是否已被消费；落盘成功后不再回退。
    pub(crate) used: bool,
}

impl SlugRecord {
    /// 构造未使用的新记录。
    pub(crate) fn fresh(slug: String, created_at: DateTime<Utc>) -> Self {
        Self {
            slug,
            created_at,
            used: false,
        }
    }
}

/// 存储统计。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StoreStats {
    pub(crate) total: usize,
    pub(crate) used: usize,
}

/// 存储层错误，与 slug 状态错误相互独立。
#[derive(Debug)]
pub(crate) enum StoreError {
    /// 主键冲突。
    Duplicate(String),
    /// 存储句柄不可用（锁中毒等）。
    Unavailable(String),
    /// 读写持久化文件失败。
    Io(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Duplicate(slug) => write!(f, "duplicate slug: {slug}"),
            Self::Unavailable(reason) => write!(f, "slug store unavailable: {reason}"),
            Self::Io(reason) => write!(f, "slug store io failed: {reason}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// registry 依赖的存储契约。
pub(crate) trait SlugStore: Send {
    /// 唯一键插入；主键已存在时返回 `Duplicate`。
    fn insert(&mut self, record: SlugRecord) -> Result<(), StoreError>;

    /// 按主键查询。
    fn get(&self, slug: &str) -> Result<Option<SlugRecord>, StoreError>;

    /// 按主键把 `used` 置为 true；返回是否命中记录。
    fn mark_used(&mut self, slug: &str) -> Result<bool, StoreError>;

    /// 记录总数与已使用数。
    fn stats(&self) -> Result<StoreStats, StoreError>;
}

/// 进程内存储。
#[derive(Debug, Default)]
pub(crate) struct MemoryStore {
    records: HashMap<String, SlugRecord>,
}

impl MemoryStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }
}

impl SlugStore for MemoryStore {
    fn insert(&mut self, record: SlugRecord) -> Result<(), StoreError> {
        insert_unique(&mut self.records, record)
    }

    fn get(&self, slug: &str) -> Result<Option<SlugRecord>, StoreError> {
        Ok(self.records.get(slug).cloned())
    }

    fn mark_used(&mut self, slug: &str) -> Result<bool, StoreError> {
        Ok(set_used(&mut self.records, slug))
    }

    fn stats(&self) -> Result<StoreStats, StoreError> {
        Ok(count(&self.records))
    }
}

/// 日志行：每次变更只追加一行。
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
enum JournalEntry {
    /// 签发新记录。
    Insert {
        slug: String,
        #[serde(rename = "createdAt")]
        created_at: DateTime<Utc>,
    },
    /// 记录被消费。
    Used { slug: String },
}

/// 追加式日志存储：内存索引 + 每次变更追加一行 JSON。
///
/// 单次 insert/mark_used 只写一行并 `sync_data`，与历史记录数量无关。
/// 启动时回放全部日志重建索引；末尾未写完的残行会被截掉。
#[derive(Debug)]
pub(crate) struct JournalStore {
    path: PathBuf,
    file: File,
    /// 已确认写入的字节数，写失败时截回该长度。
    len: u64,
    records: HashMap<String, SlugRecord>,
}

impl JournalStore {
    /// 打开日志文件；不存在时创建空日志。
    pub(crate) fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .map_err(|err| StoreError::Io(format!("create slug journal dir failed: {err}")))?;
        }

        let raw = match fs::read(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => Vec::new(),
            Err(err) => return Err(StoreError::Io(format!("read slug journal failed: {err}"))),
        };
        let (records, valid_len) = replay(&raw)?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|err| StoreError::Io(format!("open slug journal failed: {err}")))?;
        if valid_len < raw.len() as u64 {
            warn!(
                path = %path.display(),
                dropped = raw.len() as u64 - valid_len,
                "slug journal has a torn tail, truncating"
            );
            file.set_len(valid_len)
                .map_err(|err| StoreError::Io(format!("truncate slug journal failed: {err}")))?;
        }

        info!(path = %path.display(), count = records.len(), "slug journal loaded");
        Ok(Self {
            path,
            file,
            len: valid_len,
            records,
        })
    }

    /// 追加一行；失败时把文件截回追加前的长度。
    fn append(&mut self, entry: &JournalEntry) -> Result<(), StoreError> {
        let mut line = serde_json::to_vec(entry)
            .map_err(|err| StoreError::Io(format!("encode slug journal entry failed: {err}")))?;
        line.push(b'\n');

        let written = self
            .file
            .write_all(&line)
            .and_then(|()| self.file.sync_data());
        if let Err(err) = written {
            let _ = self.file.set_len(self.len);
            return Err(StoreError::Io(format!("append slug journal failed: {err}")));
        }
        self.len += line.len() as u64;
        debug!(path = %self.path.display(), bytes = line.len(), "slug journal appended");
        Ok(())
    }
}

impl SlugStore for JournalStore {
    fn insert(&mut self, record: SlugRecord) -> Result<(), StoreError> {
        let entry = JournalEntry::Insert {
            slug: record.slug.clone(),
            created_at: record.created_at,
        };
        let slug = record.slug.clone();
        insert_unique(&mut self.records, record)?;
        if let Err(err) = self.append(&entry) {
            self.records.remove(&slug);
            return Err(err);
        }
        Ok(())
    }

    fn get(&self, slug: &str) -> Result<Option<SlugRecord>, StoreError> {
        Ok(self.records.get(slug).cloned())
    }

    fn mark_used(&mut self, slug: &str) -> Result<bool, StoreError> {
        let was_used = match self.records.get(slug) {
            Some(record) => record.used,
            None => return Ok(false),
        };
        set_used(&mut self.records, slug);
        let entry = JournalEntry::Used {
            slug: slug.to_string(),
        };
        if let Err(err) = self.append(&entry) {
            if let Some(record) = self.records.get_mut(slug) {
                record.used = was_used;
            }
            return Err(err);
        }
        Ok(true)
    }

    fn stats(&self) -> Result<StoreStats, StoreError> {
        Ok(count(&self.records))
    }
}

/// 回放日志，返回索引与最后一个完整行之后的字节偏移。
fn replay(raw: &[u8]) -> Result<(HashMap<String, SlugRecord>, u64), StoreError> {
    let mut records = HashMap::new();
    let mut offset = 0usize;
    for (index, chunk) in raw.split_inclusive(|b| *b == b'\n').enumerate() {
        if !chunk.ends_with(b"\n") {
            // 残行：上次追加中途失败。
            break;
        }
        offset += chunk.len();
        if chunk.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        let entry: JournalEntry = serde_json::from_slice(chunk).map_err(|err| {
            StoreError::Io(format!("decode slug journal line {} failed: {err}", index + 1))
        })?;
        match entry {
            JournalEntry::Insert { slug, created_at } => {
                insert_unique(&mut records, SlugRecord::fresh(slug, created_at)).map_err(|err| {
                    StoreError::Io(format!("slug journal line {} repeats: {err}", index + 1))
                })?;
            }
            JournalEntry::Used { slug } => {
                if !set_used(&mut records, &slug) {
                    return Err(StoreError::Io(format!(
                        "slug journal line {} marks unknown slug {slug}",
                        index + 1
                    )));
                }
            }
        }
    }
    Ok((records, offset as u64))
}

fn insert_unique(
    records: &mut HashMap<String, SlugRecord>,
    record: SlugRecord,
) -> Result<(), StoreError> {
    if records.contains_key(&record.slug) {
        return Err(StoreError::Duplicate(record.slug));
    }
    records.insert(record.slug.clone(), record);
    Ok(())
}

fn set_used(records: &mut HashMap<String, SlugRecord>, slug: &str) -> bool {
    match records.get_mut(slug) {
        Some(record) => {
            record.used = true;
            true
        }
        None => false,
    }
}

fn count(records: &HashMap<String, SlugRecord>) -> StoreStats {
    StoreStats {
        total: records.len(),
        used: records.values().filter(|record| record.used).count(),
    }
}
