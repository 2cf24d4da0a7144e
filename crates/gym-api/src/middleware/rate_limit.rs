//! 分级限流中间件
//!
//! 基于 Redis 固定窗口计数器，按请求类型分级：
//! - 认证（注册、登录）: 按客户端 IP，默认 20 req/min
//! - 扫码: 默认 30 req/min
//! - 写操作（POST/PUT/PATCH/DELETE）: 默认 120 req/min
//! - 读操作（GET）: 默认 600 req/min
//!
//! 已认证请求按账号计数，未认证请求按客户端 IP 计数，同时所有请求共享一个全局配额。
//! Redis 不可用时放行。

use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Method, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;

use gym_shared::cache::{Cache, CacheKey};

use crate::auth::Claims;
use crate::error::ApiError;
use crate::middleware::audit::extract_client_ip;
use crate::state::AppState;

const SCAN_PATH: &str = "/api/qr-codes/scan";

/// 单个限流级别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    /// 时间窗口内允许的最大请求数
    pub max_requests: i64,
    /// 时间窗口（秒）
    pub window_secs: u64,
}

impl RateLimit {
    const fn per_minute(max_requests: i64) -> Self {
        Self {
            max_requests,
            window_secs: 60,
        }
    }
}

/// 限流层级
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateTier {
    Auth,
    Scan,
    Write,
    Read,
}

impl RateTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auth => "auth",
            Self::Scan => "scan",
            Self::Write => "write",
            Self::Read => "read",
        }
    }

    /// 根据路径和方法确定限流层级
    pub fn classify(path: &str, method: &Method) -> Self {
        if is_public_auth_path(path) {
            return Self::Auth;
        }
        if path == SCAN_PATH {
            return Self::Scan;
        }
        match *method {
            Method::GET | Method::HEAD | Method::OPTIONS => Self::Read,
            _ => Self::Write,
        }
    }
}

/// 限流配置
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub auth: RateLimit,
    pub scan: RateLimit,
    pub write: RateLimit,
    pub read: RateLimit,
    /// 全局配额 = 单账号配额 * 此倍数
    pub global_multiplier: i64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            auth: RateLimit::per_minute(20),
            scan: RateLimit::per_minute(30),
            write: RateLimit::per_minute(120),
            read: RateLimit::per_minute(600),
            global_multiplier: 50,
        }
    }
}

impl RateLimitConfig {
    pub fn limit_for(&self, tier: RateTier) -> RateLimit {
        match tier {
            RateTier::Auth => self.auth,
            RateTier::Scan => self.scan,
            RateTier::Write => self.write,
            RateTier::Read => self.read,
        }
    }
}

/// 限流中间件
///
/// 放在 auth 之后（需要 Claims 中的账号 ID），audit 之前（被限流的请求不记审计日志）
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let path = request.uri().path();
    if is_exempt_path(path) {
        return next.run(request).await;
    }
    let Some(cache) = state.cache.as_deref() else {
        return next.run(request).await;
    };

    let tier = RateTier::classify(path, request.method());
    let limit = state.rate_limit.limit_for(tier);
    let window = window_key(limit.window_secs);

    let subject_key = match request.extensions().get::<Claims>() {
        Some(claims) => Some(CacheKey::rate_limit_account(&claims.sub, tier.as_str(), window)),
        None => extract_client_ip(request.headers())
            .or_else(|| {
                request
                    .extensions()
                    .get::<ConnectInfo<SocketAddr>>()
                    .map(|info| info.0.ip().to_string())
            })
            .map(|ip| CacheKey::rate_limit_ip(&ip, tier.as_str(), window)),
    };

    if let Some(key) = subject_key {
        if exceeded(cache, &key, limit.max_requests, limit.window_secs).await {
            warn!(path = %path, tier = tier.as_str(), "请求限流触发");
            return ApiError::RateLimited {
                retry_after: limit.window_secs,
            }
            .into_response();
        }
    }

    let global_key = CacheKey::rate_limit_global(tier.as_str(), window);
    let global_limit = limit.max_requests * state.rate_limit.global_multiplier;
    if exceeded(cache, &global_key, global_limit, limit.window_secs).await {
        warn!(path = %path, tier = tier.as_str(), "全局限流触发");
        return ApiError::RateLimited {
            retry_after: limit.window_secs,
        }
        .into_response();
    }

    next.run(request).await
}

/// INCR + EXPIRE 固定窗口计数，Redis 出错时视为未超限
async fn exceeded(cache: &Cache, key: &str, max_requests: i64, window_secs: u64) -> bool {
    let count = match cache.incr(key, 1).await {
        Ok(count) => count,
        Err(e) => {
            warn!(error = %e, "Redis 限流检查失败，跳过限流");
            return false;
        }
    };

    // 首次创建时设置过期时间，窗口到期后自动清理
    if count == 1 {
        if let Err(e) = cache.expire(key, Duration::from_secs(window_secs)).await {
            warn!(error = %e, key, "设置限流计数过期时间失败");
        }
    }

    count > max_requests
}

/// 以窗口大小对齐的 Unix 时间戳，同一窗口内的请求共享计数器
fn window_key(window_secs: u64) -> u64 {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    now / window_secs.max(1)
}

fn is_public_auth_path(path: &str) -> bool {
    matches!(
        path,
        "/api/auth/register-gym" | "/api/auth/signup" | "/api/auth/login"
    )
}

fn is_exempt_path(path: &str) -> bool {
    matches!(path, "/health" | "/ready" | "/metrics")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_tiers() {
        assert_eq!(RateTier::classify("/api/auth/login", &Method::POST), RateTier::Auth);
        assert_eq!(RateTier::classify("/api/auth/signup", &Method::POST), RateTier::Auth);
        assert_eq!(RateTier::classify("/api/qr-codes/scan", &Method::POST), RateTier::Scan);
        assert_eq!(RateTier::classify("/api/activities", &Method::POST), RateTier::Write);
        assert_eq!(RateTier::classify("/api/accounts/1/status", &Method::PATCH), RateTier::Write);
        assert_eq!(RateTier::classify("/api/activities", &Method::GET), RateTier::Read);
        // 已认证的 auth 路由按普通读写分级
        assert_eq!(RateTier::classify("/api/auth/refresh", &Method::POST), RateTier::Write);
        assert_eq!(RateTier::classify("/api/auth/me", &Method::GET), RateTier::Read);
    }

    #[test]
    fn test_default_limits() {
        let config = RateLimitConfig::default();
        assert_eq!(config.limit_for(RateTier::Auth).max_requests, 20);
        assert_eq!(config.limit_for(RateTier::Scan).max_requests, 30);
        assert_eq!(config.limit_for(RateTier::Write).max_requests, 120);
        assert_eq!(config.limit_for(RateTier::Read).max_requests, 600);
        assert_eq!(config.global_multiplier, 50);
    }

    #[test]
    fn test_exempt_paths() {
        assert!(is_exempt_path("/health"));
        assert!(is_exempt_path("/ready"));
        assert!(!is_exempt_path("/api/auth/login"));
        assert!(!is_exempt_path("/api/activities"));
    }

    #[test]
    fn test_window_key_stability() {
        assert_eq!(window_key(60), window_key(60));
        // 窗口为 0 时不 panic
        let _ = window_key(0);
    }
}
