//! 时间源：registry 通过注入的时钟判断过期，测试可手动拨动时间。

use chrono::{DateTime, Utc};

/// 注入式时间源。
pub(crate) trait Clock: Send + Sync {
    /// 当前 UTC 时间。
    fn now(&self) -> DateTime<Utc>;
}

/// 系统时钟。
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[cfg(test)]
pub(crate) use manual::ManualClock;
