//! 健身房业务领域
//!
//! 租户、账号、额度账本、课程活动、签到、二维码与财务记录的
//! 领域模型、仓储和服务实现。HTTP 层见 `gym-api`。

pub mod error;
pub mod models;
pub mod password;
pub mod repository;
pub mod service;

pub use error::{GymError, Result};
