//! slug 模块：生命周期状态机、随机生成、存储与时间源。

pub(crate) mod clock;
pub(crate) mod generator;
pub(crate) mod registry;
pub(crate) mod store;
