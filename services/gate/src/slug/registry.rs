//! slug 生命周期：签发、只读校验、一次性消费。
//!
//! 校验顺序固定为「存在 → 过期 → 已使用」，调用方按错误种类选择提示文案，
//! 因此既过期又已使用的 slug 一律报告 `Expired`。
//! 所有读-判-写序列都在同一把存储锁内完成，并发消费同一 slug 只有一次成功。

use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, info, warn};

use super::{
    clock::Clock,
    generator::{generate_slug, is_slug_alphabet},
    store::{SlugRecord, SlugStore, StoreError, StoreStats},
};

/// slug 状态错误：均为客户端输入/状态问题，不可重试。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TokenError {
    NotFound,
    Expired,
    AlreadyUsed,
}

impl TokenError {
    /// 日志与响应使用的稳定标识。
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Expired => "expired",
            Self::AlreadyUsed => "already_used",
        }
    }
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::error::Error for TokenError {}

/// registry 操作错误。
#[derive(Debug)]
pub(crate) enum RegistryError {
    /// slug 状态不满足要求。
    Token(TokenError),
    /// 存储层故障，与 slug 状态无关。
    Store(StoreError),
}

impl From<TokenError> for RegistryError {
    fn from(err: TokenError) -> Self {
        Self::Token(err)
    }
}

impl From<StoreError> for RegistryError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Token(err) => write!(f, "slug rejected: {err}"),
            Self::Store(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for RegistryError {}

/// registry 构造参数。
#[derive(Debug, Clone, Copy)]
pub(crate) struct RegistryOptions {
    /// 过期窗口。
    pub(crate) ttl: Duration,
    /// slug 长度。
    pub(crate) slug_length: usize,
}

/// 新签发的 slug。
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct IssuedSlug {
    pub(crate) slug: String,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) expires_at: DateTime<Utc>,
}

/// slug 注册表：独占存储句柄，对外只暴露 issue/check/consume。
pub(crate) struct SlugRegistry {
    store: Mutex<Box<dyn SlugStore>>,
    clock: Arc<dyn Clock>,
    ttl: TimeDelta,
    slug_length: usize,
}

impl SlugRegistry {
    /// 注入存储句柄与时钟构造 registry。
    pub(crate) fn new(
        store: Box<dyn SlugStore>,
        clock: Arc<dyn Clock>,
        options: RegistryOptions,
    ) -> Self {
        let ttl = TimeDelta::from_std(options.ttl).unwrap_or(TimeDelta::MAX);
        Self {
            store: Mutex::new(store),
            clock,
            ttl,
            slug_length: options.slug_length,
        }
    }

    /// 签发新 slug：重复抽样直到得到未出现过的值，再插入未使用记录。
    pub(crate) fn issue(&self) -> Result<IssuedSlug, StoreError> {
        let mut store = self.lock_store()?;
        let slug = loop {
            let candidate = generate_slug(self.slug_length);
            if store.get(&candidate)?.is_none() {
                break candidate;
            }
            debug!(slug = %candidate, "slug collision, resampling");
        };

        let created_at = self.clock.now();
        store.insert(SlugRecord::fresh(slug.clone(), created_at))?;
        drop(store);

        let expires_at = created_at
            .checked_add_signed(self.ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        info!(slug = %slug, %expires_at, "slug issued");
        Ok(IssuedSlug {
            slug,
            created_at,
            expires_at,
        })
    }

    /// 只读校验，不修改任何状态。
    pub(crate) fn check(&self, slug: &str) -> Result<SlugRecord, RegistryError> {
        let store = self.lock_store()?;
        let record = self.evaluate(&**store, slug)?;
        debug!(slug = %slug, "slug checked");
        Ok(record)
    }

    /// 一次性消费：校验通过后在同一把锁内置位 `used`。
    pub(crate) fn consume(&self, slug: &str) -> Result<(), RegistryError> {
        let mut store = self.lock_store()?;
        self.evaluate(&**store, slug)?;
        if !store.mark_used(slug)? {
            // 校验与置位在同一把锁内，记录不会在中途消失。
            return Err(TokenError::NotFound.into());
        }
        info!(slug = %slug, "slug consumed");
        Ok(())
    }

    /// 存储统计。
    pub(crate) fn stats(&self) -> Result<StoreStats, StoreError> {
        self.lock_store()?.stats()
    }

    /// 按「存在 → 过期 → 已使用」顺序判定。
    fn evaluate(&self, store: &dyn SlugStore, slug: &str) -> Result<SlugRecord, RegistryError> {
        let record = if is_slug_alphabet(slug) {
            store.get(slug)?
        } else {
            None
        };
        let Some(record) = record else {
            return Err(reject(slug, TokenError::NotFound));
        };

        let age = self.clock.now().signed_duration_since(record.created_at);
        if age > self.ttl {
            return Err(reject(slug, TokenError::Expired));
        }
        if record.used {
            return Err(reject(slug, TokenError::AlreadyUsed));
        }
        Ok(record)
    }

    fn lock_store(&self) -> Result<MutexGuard<'_, Box<dyn SlugStore>>, StoreError> {
        self.store.lock().map_err(|err| {
            warn!("slug store lock poisoned: {err}");
            StoreError::Unavailable("store lock poisoned".to_string())
        })
    }
}

fn reject(slug: &str, err: TokenError) -> RegistryError {
    info!(slug = %slug, reason = err.as_str(), "slug rejected");
    RegistryError::Token(err)
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashSet,
        sync::{Arc, Mutex},
        thread,
        time::Duration,
    };

    use chrono::TimeDelta;

    use super::{RegistryError, RegistryOptions, SlugRegistry, TokenError};
    use crate::slug::{
        clock::ManualClock,
        store::{MemoryStore, SlugRecord, SlugStore, StoreError, StoreStats},
    };

    fn registry_with(ttl: Duration) -> (SlugRegistry, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let registry = SlugRegistry::new(
            Box::new(MemoryStore::new()),
            clock.clone(),
            RegistryOptions {
                ttl,
                slug_length: 6,
            },
        );
        (registry, clock)
    }

    fn token_err(result: Result<impl Sized, RegistryError>) -> TokenError {
        match result {
            Err(RegistryError::Token(err)) => err,
            Err(RegistryError::Store(err)) => panic!("unexpected store error: {err}"),
            Ok(_) => panic!("expected token error"),
        }
    }

    #[test]
    fn issued_slugs_are_unique_and_well_formed() {
        let (registry, _) = registry_with(Duration::from_secs(600));
        let mut seen = HashSet::new();
        for _ in 0..500 {
            let issued = registry.issue().unwrap();
            assert_eq!(issued.slug.len(), 6);
            assert!(issued.slug.bytes().all(|b| b.is_ascii_alphanumeric()));
            assert!(seen.insert(issued.slug));
        }
        assert_eq!(registry.stats().unwrap(), StoreStats { total: 500, used: 0 });
    }

    #[test]
    fn issue_reports_expiry_from_ttl() {
        let (registry, _) = registry_with(Duration::from_secs(5));
        let issued = registry.issue().unwrap();
        assert_eq!(issued.expires_at - issued.created_at, TimeDelta::seconds(5));
    }

    #[test]
    fn missing_slug_is_not_found() {
        let (registry, _) = registry_with(Duration::from_secs(600));
        assert_eq!(token_err(registry.check("nope42")), TokenError::NotFound);
        assert_eq!(token_err(registry.consume("nope42")), TokenError::NotFound);
        assert_eq!(token_err(registry.check("../etc")), TokenError::NotFound);
        assert_eq!(token_err(registry.consume("")), TokenError::NotFound);
    }

    #[test]
    fn second_consume_is_already_used() {
        let (registry, _) = registry_with(Duration::from_secs(600));
        let slug = registry.issue().unwrap().slug;
        registry.consume(&slug).unwrap();
        assert_eq!(token_err(registry.consume(&slug)), TokenError::AlreadyUsed);
        assert_eq!(token_err(registry.check(&slug)), TokenError::AlreadyUsed);
    }

    #[test]
    fn check_never_mutates() {
        let (registry, _) = registry_with(Duration::from_secs(600));
        let slug = registry.issue().unwrap().slug;
        for _ in 0..10 {
            let record = registry.check(&slug).unwrap();
            assert!(!record.used);
        }
        registry.consume(&slug).unwrap();
    }

    #[test]
    fn unconsumed_slug_expires() {
        let (registry, clock) = registry_with(Duration::from_secs(5));
        let slug = registry.issue().unwrap().slug;

        clock.advance(TimeDelta::seconds(5));
        registry.check(&slug).unwrap();

        clock.advance(TimeDelta::milliseconds(1));
        assert_eq!(token_err(registry.check(&slug)), TokenError::Expired);
        assert_eq!(token_err(registry.consume(&slug)), TokenError::Expired);
        assert_eq!(registry.stats().unwrap().used, 0);
    }

    #[test]
    fn expired_and_used_reports_expired() {
        let (registry, clock) = registry_with(Duration::from_secs(60));
        let slug = registry.issue().unwrap().slug;
        registry.consume(&slug).unwrap();

        clock.advance(TimeDelta::minutes(2));
        assert_eq!(token_err(registry.check(&slug)), TokenError::Expired);
        assert_eq!(token_err(registry.consume(&slug)), TokenError::Expired);
    }

    #[test]
    fn ten_minute_window_scenario() {
        let (registry, clock) = registry_with(Duration::from_secs(600));
        let slug = registry.issue().unwrap().slug;

        clock.advance(TimeDelta::minutes(1));
        registry.check(&slug).unwrap();

        clock.advance(TimeDelta::minutes(1));
        registry.consume(&slug).unwrap();

        clock.advance(TimeDelta::minutes(1));
        assert_eq!(token_err(registry.consume(&slug)), TokenError::AlreadyUsed);
    }

    #[test]
    fn five_second_window_scenario() {
        let (registry, clock) = registry_with(Duration::from_secs(5));
        let slug = registry.issue().unwrap().slug;

        clock.advance(TimeDelta::seconds(6));
        assert_eq!(token_err(registry.check(&slug)), TokenError::Expired);
    }

    #[test]
    fn concurrent_consume_has_exactly_one_winner() {
        let (registry, _) = registry_with(Duration::from_secs(600));
        let slug = registry.issue().unwrap().slug;

        let results = thread::scope(|scope| {
            let handles = (0..32)
                .map(|_| scope.spawn(|| registry.consume(&slug)))
                .collect::<Vec<_>>();
            handles
                .into_iter()
                .map(|handle| handle.join().unwrap())
                .collect::<Vec<_>>()
        });

        let wins = results.iter().filter(|result| result.is_ok()).count();
        let already_used = results
            .iter()
            .filter(|result| matches!(result, Err(RegistryError::Token(TokenError::AlreadyUsed))))
            .count();
        assert_eq!(wins, 1);
        assert_eq!(already_used, 31);
    }

    #[test]
    fn concurrent_issue_never_collides() {
        let (registry, _) = registry_with(Duration::from_secs(600));
        let slugs = thread::scope(|scope| {
            let handles = (0..8)
                .map(|_| {
                    scope.spawn(|| {
                        (0..100)
                            .map(|_| registry.issue().unwrap().slug)
                            .collect::<Vec<_>>()
                    })
                })
                .collect::<Vec<_>>();
            handles
                .into_iter()
                .flat_map(|handle| handle.join().unwrap())
                .collect::<Vec<_>>()
        });

        let distinct = slugs.iter().collect::<HashSet<_>>();
        assert_eq!(distinct.len(), 800);
        assert_eq!(registry.stats().unwrap().total, 800);
    }

    /// 前几次抽样都命中已有记录的存储，用于覆盖重抽分支。
    struct CollidingStore {
        inner: MemoryStore,
        forced_hits: Mutex<usize>,
    }

    impl SlugStore for CollidingStore {
        fn insert(&mut self, record: SlugRecord) -> Result<(), StoreError> {
            self.inner.insert(record)
        }

        fn get(&self, slug: &str) -> Result<Option<SlugRecord>, StoreError> {
            let mut hits = self.forced_hits.lock().unwrap();
            if *hits > 0 {
                *hits -= 1;
                return Ok(Some(SlugRecord::fresh(slug.to_string(), chrono::Utc::now())));
            }
            self.inner.get(slug)
        }

        fn mark_used(&mut self, slug: &str) -> Result<bool, StoreError> {
            self.inner.mark_used(slug)
        }

        fn stats(&self) -> Result<StoreStats, StoreError> {
            self.inner.stats()
        }
    }

    #[test]
    fn issue_resamples_on_collision() {
        let store = CollidingStore {
            inner: MemoryStore::new(),
            forced_hits: Mutex::new(3),
        };
        let registry = SlugRegistry::new(
            Box::new(store),
            Arc::new(ManualClock::new()),
            RegistryOptions {
                ttl: Duration::from_secs(600),
                slug_length: 6,
            },
        );

        let slug = registry.issue().unwrap().slug;
        registry.check(&slug).unwrap();
        assert_eq!(registry.stats().unwrap().total, 1);
    }

    /// 始终失败的存储。
    struct BrokenStore;

    impl SlugStore for BrokenStore {
        fn insert(&mut self, _record: SlugRecord) -> Result<(), StoreError> {
            Err(StoreError::Io("disk gone".to_string()))
        }

        fn get(&self, _slug: &str) -> Result<Option<SlugRecord>, StoreError> {
            Err(StoreError::Io("disk gone".to_string()))
        }

        fn mark_used(&mut self, _slug: &str) -> Result<bool, StoreError> {
            Err(StoreError::Io("disk gone".to_string()))
        }

        fn stats(&self) -> Result<StoreStats, StoreError> {
            Err(StoreError::Io("disk gone".to_string()))
        }
    }

    #[test]
    fn storage_failures_are_not_token_errors() {
        let registry = SlugRegistry::new(
            Box::new(BrokenStore),
            Arc::new(ManualClock::new()),
            RegistryOptions {
                ttl: Duration::from_secs(600),
                slug_length: 6,
            },
        );
        assert!(matches!(registry.issue(), Err(StoreError::Io(_))));
        assert!(matches!(
            registry.check("abc123"),
            Err(RegistryError::Store(StoreError::Io(_)))
        ));
        assert!(matches!(
            registry.consume("abc123"),
            Err(RegistryError::Store(StoreError::Io(_)))
        ));
    }
}
