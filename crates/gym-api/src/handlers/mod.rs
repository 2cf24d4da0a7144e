//! HTTP 请求处理器模块
//!
//! 处理器只负责参数校验和 DTO 转换，业务规则全部在服务层

pub mod account;
pub mod activity;
pub mod attendance;
pub mod auth;
pub mod finance;
pub mod gym;
pub mod health;
pub mod operation_log;
pub mod qr_code;
pub mod stats;
