//! 共享库
//!
//! 包含健身房 CRM 各 crate 共用的配置、错误处理、数据库连接、Redis 缓存和可观测性基础设施代码。

pub mod cache;
pub mod config;
pub mod database;
pub mod error;
pub mod observability;
