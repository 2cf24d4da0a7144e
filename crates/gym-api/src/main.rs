//! 健身房 CRM 服务入口
//!
//! 加载配置、初始化可观测性和基础设施，启动 HTTP 服务。

use std::sync::Arc;

use axum::http::HeaderValue;
use gym_api::{
    routes,
    state::{AppState, Repositories},
};
use gym_shared::{cache::Cache, config::AppConfig, database::Database, observability};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

const SERVICE_NAME: &str = "gym-api";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load(SERVICE_NAME)?;
    config.validate()?;

    let obs_config = config
        .observability
        .clone()
        .with_service_name(&config.service_name);
    let _guard = observability::init(&obs_config).await?;

    info!(
        environment = %config.environment,
        "Starting {} on {}",
        SERVICE_NAME,
        config.server_addr()
    );

    let db = Database::connect(&config.database).await?;
    if config.database.run_migrations {
        db.run_migrations().await?;
    }

    // Redis 不可用时服务仍可启动，统计缓存和限流随之关闭
    let cache = match Cache::new(&config.redis) {
        Ok(cache) => {
            if let Err(e) = cache.health_check().await {
                warn!(error = %e, "Redis 暂不可用，将在恢复后自动使用");
            }
            Some(Arc::new(cache))
        }
        Err(e) => {
            warn!(error = %e, "Redis 客户端创建失败，统计缓存和限流已禁用");
            None
        }
    };

    let cors = build_cors(&config);

    let repos = Repositories::postgres(db.pool().clone());
    let state = AppState::new(repos, &config, cache, Some(db.clone()));
    let app = routes::build_router(state, cors);

    let listener = TcpListener::bind(config.server_addr()).await?;
    info!("Listening on {}", config.server_addr());

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    db.close().await;
    info!("Server shutdown complete");

    Ok(())
}

/// 根据配置的来源列表构造 CORS 层
fn build_cors(config: &AppConfig) -> CorsLayer {
    if config.cors.allows_any() {
        if config.is_production() {
            warn!("cors.allowed_origins=\"*\" 在生产环境中不安全，请设置为具体域名");
        }
        info!("CORS allowed_origins: * (all origins)");
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let origins: Vec<HeaderValue> = config
        .cors
        .origins()
        .iter()
        .filter_map(|s| s.parse::<HeaderValue>().ok())
        .collect();
    info!(count = origins.len(), "CORS allowed_origins: {}", config.cors.allowed_origins);
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// 监听关闭信号
///
/// 收到 SIGTERM 或 Ctrl+C 后返回，触发 axum 的优雅关闭流程。
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("注册 Ctrl+C 处理器失败");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("注册 SIGTERM 处理器失败")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, initiating graceful shutdown..."),
        _ = terminate => info!("Received SIGTERM, initiating graceful shutdown..."),
    }
}
