//! JWT 认证中间件
//!
//! 验证 Bearer Token 并将 Claims 注入请求扩展

use axum::{
    body::Body,
    extract::State,
    http::{Method, Request, header::AUTHORIZATION},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::ApiError;
use crate::state::AppState;

/// 无需认证的路由
const PUBLIC_PATHS: &[&str] = &[
    "/health",
    "/ready",
    "/api/auth/register-gym",
    "/api/auth/signup",
    "/api/auth/login",
];

/// 认证中间件
///
/// 公开路由和 CORS 预检请求直接放行
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    if request.method() == Method::OPTIONS || is_public_path(request.uri().path()) {
        return next.run(request).await;
    }

    let token = match request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
    {
        Some(token) if !token.trim().is_empty() => token.trim().to_string(),
        _ => return ApiError::Unauthorized("缺少认证 Token".to_string()).into_response(),
    };

    match state.jwt_manager.verify_token(&token) {
        Ok(claims) => {
            request.extensions_mut().insert(claims);
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}

fn is_public_path(path: &str) -> bool {
    PUBLIC_PATHS.contains(&path)
}
