//! Prometheus 指标模块
//!
//! 基于 metrics crate 和 metrics-exporter-prometheus 实现指标收集与导出。
//! 指标通过独立的 HTTP 端口暴露，供 Prometheus 抓取。

use anyhow::Result;
use axum::{Router, routing::get};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{error, info};

use super::ObservabilityConfig;

/// Metrics 资源守卫
pub struct MetricsHandle {
    _server_handle: tokio::task::JoinHandle<()>,
}

/// 初始化 Prometheus 指标导出
///
/// 启动一个独立的 HTTP 服务器在指定端口暴露 `/metrics` 端点。
pub async fn init(config: &ObservabilityConfig) -> Result<MetricsHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    register_common_metrics(&config.service_name);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.metrics_port));
    let server_handle = start_metrics_server(addr, handle).await?;

    Ok(MetricsHandle {
        _server_handle: server_handle,
    })
}

/// 注册指标描述，出现在 /metrics 的 HELP 注释中
fn register_common_metrics(service_name: &str) {
    metrics::describe_counter!("http_requests_total", "Total number of HTTP requests");
    metrics::describe_histogram!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds"
    );

    metrics::describe_counter!(
        "attendance_bookings_total",
        "Total number of attendance booking attempts"
    );
    metrics::describe_counter!(
        "attendance_cancellations_total",
        "Total number of attendance cancellations"
    );
    metrics::describe_counter!("qr_scans_total", "Total number of QR code scans");
    metrics::describe_counter!("quota_changes_total", "Total number of quota ledger entries");
    metrics::describe_counter!("login_attempts_total", "Total number of login attempts");

    metrics::counter!("service_starts_total", "service" => service_name.to_string()).increment(1);
}

async fn start_metrics_server(
    addr: SocketAddr,
    handle: PrometheusHandle,
) -> Result<tokio::task::JoinHandle<()>> {
    let app = Router::new()
        .route("/metrics", get(move || std::future::ready(handle.render())))
        .route("/health", get(|| async { "OK" }));

    let listener = TcpListener::bind(addr).await?;
    info!("Metrics server listening on {}", addr);

    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("Metrics server error: {}", e);
        }
    });

    Ok(server_handle)
}

// ============================================================================
// 指标记录函数
// ============================================================================

/// 记录 HTTP 请求
#[inline]
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let status_str = status.to_string();
    metrics::counter!(
        "http_requests_total",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status_str.clone()
    )
    .increment(1);

    metrics::histogram!(
        "http_request_duration_seconds",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status_str
    )
    .record(duration_secs);
}

/// 记录预约结果（success / full / insufficient_quota / ...）
#[inline]
pub fn record_attendance_booking(status: &str) {
    metrics::counter!("attendance_bookings_total", "status" => status.to_string()).increment(1);
}

/// 记录取消预约
#[inline]
pub fn record_attendance_cancellation(refunded: bool) {
    metrics::counter!(
        "attendance_cancellations_total",
        "refunded" => refunded.to_string()
    )
    .increment(1);
}

/// 记录扫码结果
#[inline]
pub fn record_qr_scan(kind: &str, status: &str) {
    metrics::counter!(
        "qr_scans_total",
        "kind" => kind.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// 记录额度变动
#[inline]
pub fn record_quota_change(change_type: &str) {
    metrics::counter!("quota_changes_total", "change_type" => change_type.to_string())
        .increment(1);
}

/// 记录登录结果
#[inline]
pub fn record_login_attempt(result: &str) {
    metrics::counter!("login_attempts_total", "result" => result.to_string()).increment(1);
}
