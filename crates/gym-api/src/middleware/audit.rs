//! 审计日志中间件
//!
//! 已认证的写操作（POST/PUT/PATCH/DELETE）成功后异步写入 operation_logs，
//! `/api/auth/` 下的路由不记录

use axum::{
    extract::State,
    http::{HeaderMap, Method, Request},
    middleware::Next,
    response::Response,
};
use tracing::{debug, error};

use gym_domain::repository::NewOperationLog;

use crate::auth::Claims;
use crate::state::AppState;

const API_PREFIX: &str = "/api/";

/// 挂在已有资源下、POST 时新建记录的子资源，如 `/activities/{id}/attendance`
const NESTED_COLLECTIONS: &[&str] = &["attendance"];

/// 审计中间件：在写操作成功后异步写入操作日志
///
/// 日志写入失败只记录错误，不影响业务响应
pub async fn audit_middleware(
    State(state): State<AppState>,
    request: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let method = request.method().clone();
    if !is_write_method(&method) {
        return next.run(request).await;
    }

    let path = request.uri().path().to_string();
    if path.starts_with("/api/auth/") {
        return next.run(request).await;
    }

    let claims = request.extensions().get::<Claims>().cloned();
    let ip_address = extract_client_ip(request.headers());
    let user_agent = request
        .headers()
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());

    let response = next.run(request).await;

    if !response.status().is_success() {
        return response;
    }
    let Some(claims) = claims else {
        return response;
    };
    let Ok(operator_id) = claims.account_id() else {
        return response;
    };

    let (module, action) = parse_module_action(&path, &method);
    let (target_type, target_id) = extract_target(&path);
    let log = NewOperationLog {
        gym_id: claims.gym_id,
        operator_id,
        operator_name: Some(claims.name),
        module,
        action,
        target_type,
        target_id,
        ip_address,
        user_agent,
    };

    let audit_service = state.audit_service.clone();
    tokio::spawn(async move {
        let (gym_id, module, action) = (log.gym_id, log.module.clone(), log.action.clone());
        match audit_service.record(log).await {
            Ok(id) => debug!(log_id = id, gym_id, operator_id, module = %module, action = %action, "审计日志已记录"),
            Err(e) => error!(error = %e, gym_id, operator_id, module = %module, action = %action, "审计日志写入失败"),
        }
    });

    response
}

fn is_write_method(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}

fn segments(path: &str) -> Vec<&str> {
    path.strip_prefix(API_PREFIX)
        .unwrap_or(path)
        .split('/')
        .filter(|s| !s.is_empty())
        .collect()
}

/// 从路径中解析业务模块和操作类型
///
/// 路径第一段为模块名。对已有资源的 POST 子操作（如 `/activities/5/cancel`）记为 update，
/// 向子资源集合 POST（如 `/activities/5/attendance`）记为 create
fn parse_module_action(path: &str, method: &Method) -> (String, String) {
    let segments = segments(path);
    let module = segments.first().copied().unwrap_or("unknown").to_string();
    let targets_existing = segments.iter().skip(1).any(|s| is_id(s));
    let creates_nested = segments
        .last()
        .is_some_and(|last| NESTED_COLLECTIONS.contains(last));

    let action = match *method {
        Method::POST if targets_existing && !creates_nested => "update",
        Method::POST => "create",
        Method::PUT | Method::PATCH => "update",
        Method::DELETE => "delete",
        _ => "unknown",
    };
    (module, action.to_string())
}

/// 从路径中提取操作目标
///
/// 第一个纯数字段视为资源 ID，前一段的单数形式为资源类型，
/// 如 `/api/finance/records/7` 解析为 ("record", "7")
fn extract_target(path: &str) -> (Option<String>, Option<String>) {
    let segments = segments(path);
    for (i, segment) in segments.iter().enumerate().skip(1) {
        if is_id(segment) {
            let target_type = singular(segments[i - 1]);
            return (Some(target_type), Some(segment.to_string()));
        }
    }
    (None, None)
}

fn is_id(segment: &str) -> bool {
    !segment.is_empty() && segment.chars().all(|c| c.is_ascii_digit())
}

fn singular(resource: &str) -> String {
    if let Some(stem) = resource.strip_suffix("ies") {
        format!("{}y", stem)
    } else {
        resource.strip_suffix('s').unwrap_or(resource).to_string()
    }
}

/// 客户端 IP
///
/// 经过反向代理时取 X-Forwarded-For 的第一个地址，其次取 X-Real-IP
pub(crate) fn extract_client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(|s| s.trim().to_string())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_module_action() {
        let (module, action) = parse_module_action("/api/activities", &Method::POST);
        assert_eq!(module, "activities");
        assert_eq!(action, "create");

        let (module, action) = parse_module_action("/api/accounts/5", &Method::PUT);
        assert_eq!(module, "accounts");
        assert_eq!(action, "update");

        let (module, action) = parse_module_action("/api/qr-codes/10", &Method::DELETE);
        assert_eq!(module, "qr-codes");
        assert_eq!(action, "delete");

        let (_, action) = parse_module_action("/api/attendance/3/check-in", &Method::POST);
        assert_eq!(action, "update");

        let (module, action) = parse_module_action("/api/qr-codes/scan", &Method::POST);
        assert_eq!(module, "qr-codes");
        assert_eq!(action, "create");

        let (module, action) =
            parse_module_action("/api/activities/10/attendance", &Method::POST);
        assert_eq!(module, "activities");
        assert_eq!(action, "create");
    }

    #[test]
    fn test_extract_target() {
        assert_eq!(
            extract_target("/api/activities/12/cancel"),
            (Some("activity".to_string()), Some("12".to_string()))
        );
        assert_eq!(
            extract_target("/api/finance/records/7"),
            (Some("record".to_string()), Some("7".to_string()))
        );
        assert_eq!(
            extract_target("/api/qr-codes/4/status"),
            (Some("qr-code".to_string()), Some("4".to_string()))
        );
        assert_eq!(
            extract_target("/api/attendance/9/absent"),
            (Some("attendance".to_string()), Some("9".to_string()))
        );
        assert_eq!(extract_target("/api/activities"), (None, None));
        assert_eq!(extract_target("/api/qr-codes/scan"), (None, None));
    }

    #[test]
    fn test_is_write_method() {
        assert!(is_write_method(&Method::POST));
        assert!(is_write_method(&Method::PUT));
        assert!(is_write_method(&Method::PATCH));
        assert!(is_write_method(&Method::DELETE));
        assert!(!is_write_method(&Method::GET));
        assert!(!is_write_method(&Method::OPTIONS));
    }

    #[test]
    fn test_extract_client_ip() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_client_ip(&headers), None);

        headers.insert("x-real-ip", "10.0.0.9".parse().unwrap());
        assert_eq!(extract_client_ip(&headers), Some("10.0.0.9".to_string()));

        headers.insert("x-forwarded-for", "203.0.113.7, 10.0.0.1".parse().unwrap());
        assert_eq!(extract_client_ip(&headers), Some("203.0.113.7".to_string()));
    }
}
