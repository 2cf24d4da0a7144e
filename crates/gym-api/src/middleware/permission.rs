//! 权限检查中间件
//!
//! 检查 Claims 中是否包含路由要求的权限码

use axum::{
    body::Body,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::future::Future;
use std::pin::Pin;

use crate::auth::Claims;
use crate::error::ApiError;

/// 权限检查中间件工厂
///
/// ```ignore
/// .route("/accounts", get(list_accounts).layer(from_fn(require_permission(permission::ACCOUNT_READ))))
/// ```
pub fn require_permission(
    permission: &'static str,
) -> impl Fn(Request<Body>, Next) -> Pin<Box<dyn Future<Output = Response> + Send>> + Clone + Send
{
    move |request: Request<Body>, next: Next| {
        Box::pin(async move { check_permission(request, next, permission).await })
    }
}

/// 满足任一权限即可通过
///
/// 预约和扫码既允许会员为自己操作，也允许员工代操作
pub fn require_any_permission(
    permissions: &'static [&'static str],
) -> impl Fn(Request<Body>, Next) -> Pin<Box<dyn Future<Output = Response> + Send>> + Clone + Send
{
    move |request: Request<Body>, next: Next| {
        Box::pin(async move {
            let allowed = match request.extensions().get::<Claims>() {
                Some(claims) => permissions.iter().any(|p| claims.has_permission(p)),
                None => return ApiError::Unauthorized("未认证".to_string()).into_response(),
            };
            if allowed {
                next.run(request).await
            } else {
                ApiError::Forbidden(format!("缺少权限: {}", permissions.join(" | "))).into_response()
            }
        })
    }
}

async fn check_permission(request: Request<Body>, next: Next, required: &str) -> Response {
    let allowed = match request.extensions().get::<Claims>() {
        Some(claims) => claims.has_permission(required),
        None => return ApiError::Unauthorized("未认证".to_string()).into_response(),
    };

    if allowed {
        next.run(request).await
    } else {
        ApiError::Forbidden(format!("缺少权限: {}", required)).into_response()
    }
}
