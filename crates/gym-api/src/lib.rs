//! 健身房 CRM HTTP 服务
//!
//! 提供账号、课程活动、签到、额度、二维码、财务、统计和审计日志的 REST API
//!
//! ## 模块结构
//!
//! - `auth`: JWT 签发与校验
//! - `dto`: 请求和响应的数据传输对象
//! - `extract`: 返回统一错误响应体的请求提取器
//! - `handlers`: HTTP 请求处理器
//! - `middleware`: 认证、权限、限流、审计中间件
//! - `routes`: 路由注册与中间件装配
//! - `state`: 应用共享状态

pub mod auth;
pub mod dto;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;

pub use error::{ApiError, Result};
pub use state::AppState;
