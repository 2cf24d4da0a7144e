//! 存活与就绪探针

use axum::{Json, extract::State, http::StatusCode};
use serde_json::{Value, json};
use tracing::warn;

use crate::state::AppState;

const SERVICE_NAME: &str = "gym-api";

/// 存活探针：服务进程正常即返回 ok
///
/// GET /health
pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// 就绪探针：检查数据库和 Redis 连接是否可用
///
/// 任一依赖不可用时返回 503，负载均衡据此摘除实例
///
/// GET /ready
pub async fn readiness_check(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let db_ok = match &state.database {
        Some(db) => match db.health_check().await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "数据库就绪检查失败");
                false
            }
        },
        None => false,
    };
    let cache_ok = match &state.cache {
        Some(cache) => match cache.health_check().await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Redis 就绪检查失败");
                false
            }
        },
        None => false,
    };
    let all_ok = db_ok && cache_ok;

    let status = if all_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(json!({
            "status": if all_ok { "ok" } else { "degraded" },
            "service": SERVICE_NAME,
            "checks": {
                "database": if db_ok { "ok" } else { "fail" },
                "redis": if cache_ok { "ok" } else { "fail" }
            }
        })),
    )
}
