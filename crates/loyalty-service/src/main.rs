//! 积分服务
//!
//! 启动时加载配置、连接数据库（带重试的健康检查）并执行迁移，随后输出一份当前指标快照。

use std::sync::Arc;

use anyhow::Result;
use loyalty_shared::{
    config::AppConfig, database::Database, error::SharedError, observability,
    retry::retry_with_policy,
};
use tracing::{error, info};

use loyalty::{
    LoyaltyService,
    repository::{LoyaltyBackend, MIGRATOR, PgLoyaltyBackend},
};

#[tokio::main]
async fn main() -> Result<()> {
    // 1. 加载配置
    let config = AppConfig::load("loyalty-service").unwrap_or_else(|e| {
        eprintln!("Failed to load config, using defaults: {}", e);
        AppConfig::default()
    });

    // 2. 初始化可观测性
    let obs_config = config
        .observability
        .clone()
        .with_service_name("loyalty-service");
    let _guard = observability::init(&obs_config)?;

    info!("Starting loyalty-service...");
    info!(
        environment = %config.environment,
        points_step = config.ledger.points_step,
        utc_offset_minutes = config.ledger.utc_offset_minutes,
        "Configuration loaded"
    );

    // 3. 数据库与迁移
    let db = Database::connect(&config.database).await?;
    retry_with_policy(
        &config.backend.read_retry_policy(),
        "database_health_check",
        SharedError::is_retryable,
        || db.health_check(),
    )
    .await
    .inspect_err(|e| error!(code = e.code(), error = %e, "Database health check failed"))?;
    db.run_migrations(&MIGRATOR).await?;
    info!("Database ready");

    // 4. 组装服务
    let backend: Arc<dyn LoyaltyBackend> = Arc::new(PgLoyaltyBackend::new(db.pool().clone()));
    let service = LoyaltyService::new(backend, &config);

    // 5. 输出当前状态
    let snapshot = service.reports().snapshot().await?;
    info!(
        total_customers = snapshot.total_customers,
        total_points = snapshot.total_points_in_system,
        total_redemptions = snapshot.total_redemptions,
        customers_with_available_reward = snapshot.customers_with_available_reward,
        "Loyalty snapshot"
    );
    println!("{}", serde_json::to_string_pretty(&snapshot)?);

    db.close().await;
    Ok(())
}
