//! Prometheus 指标模块
//!
//! 基于 metrics crate 和 metrics-exporter-prometheus 实现指标收集与导出，
//! 指标通过独立的 HTTP 端口暴露，供 Prometheus 抓取。

use anyhow::Result;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::info;

use super::ObservabilityConfig;

/// 初始化 Prometheus 指标导出
///
/// 需要在 tokio 运行时内调用，导出器会在后台监听 `metrics_port`。
pub fn init(config: &ObservabilityConfig) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], config.metrics_port));
    PrometheusBuilder::new().with_http_listener(addr).install()?;

    register_common_metrics(&config.service_name);
    info!("Metrics exporter listening on {}", addr);

    Ok(())
}

/// 注册积分业务指标
fn register_common_metrics(service_name: &str) {
    metrics::describe_counter!(
        "loyalty_registrations_total",
        "Total number of customer registrations"
    );
    metrics::describe_counter!(
        "loyalty_point_adjustments_total",
        "Total number of admin point adjustments"
    );
    metrics::describe_counter!("loyalty_redemptions_total", "Total number of redemptions");
    metrics::describe_histogram!(
        "loyalty_redemption_duration_seconds",
        "Redemption duration in seconds"
    );
    metrics::describe_counter!(
        "loyalty_catalog_writes_total",
        "Total number of reward catalog rewrites"
    );

    metrics::counter!("service_starts_total", "service" => service_name.to_string()).increment(1);
}
