//! 认证模块
//!
//! 提供 JWT Token 生成和验证功能，密码哈希在领域层完成

mod jwt;

pub use jwt::{Claims, JwtConfig, JwtManager};
