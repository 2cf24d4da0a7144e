//! 中间件模块
//!
//! 提供认证、权限检查、限流、审计日志和安全响应头中间件

pub mod audit;
mod auth;
mod permission;
pub mod rate_limit;
mod security;

pub use audit::audit_middleware;
pub use auth::auth_middleware;
pub use permission::{require_any_permission, require_permission};
pub use rate_limit::{RateLimit, RateLimitConfig, RateTier, rate_limit_middleware};
pub use security::security_headers;
