//! 服务门面
//!
//! 把目录、账本、兑换、报表四个服务组装在同一个后端上，
//! 并提供界面层刷新用的整体快照。

use std::sync::Arc;

use chrono::Utc;
use loyalty_shared::config::AppConfig;
use tracing::{debug, instrument};

use crate::error::Result;
use crate::lock::{CustomerLockManager, LockConfig};
use crate::models::Customer;
use crate::report::ReportWindow;
use crate::repository::LoyaltyBackend;
use crate::service::dto::LoyaltySnapshot;
use crate::service::{
    BackendPolicy, CatalogService, LedgerService, RedemptionService, ReportService,
};

/// 积分服务门面
pub struct LoyaltyService {
    catalog: Arc<CatalogService>,
    ledger: Arc<LedgerService>,
    redemption: Arc<RedemptionService>,
    reports: Arc<ReportService>,
}

impl LoyaltyService {
    pub fn new(backend: Arc<dyn LoyaltyBackend>, config: &AppConfig) -> Self {
        let policy = BackendPolicy::from_config(&config.backend);
        let locks = Arc::new(CustomerLockManager::new(LockConfig {
            acquire_timeout: config.ledger.lock_timeout(),
        }));

        let catalog = Arc::new(CatalogService::new(Arc::clone(&backend), policy.clone()));
        let ledger = Arc::new(LedgerService::new(
            Arc::clone(&backend),
            policy.clone(),
            config.ledger.points_step,
        ));
        let redemption = Arc::new(RedemptionService::new(
            Arc::clone(&backend),
            policy.clone(),
            Arc::clone(&catalog),
            locks,
        ));
        let reports = Arc::new(ReportService::new(
            backend,
            policy,
            Arc::clone(&catalog),
            config.ledger.utc_offset(),
            config.ledger.recent_history_limit,
        ));

        Self {
            catalog,
            ledger,
            redemption,
            reports,
        }
    }

    pub fn catalog(&self) -> &CatalogService {
        &self.catalog
    }

    pub fn ledger(&self) -> &LedgerService {
        &self.ledger
    }

    pub fn redemption(&self) -> &RedemptionService {
        &self.redemption
    }

    pub fn reports(&self) -> &ReportService {
        &self.reports
    }

    /// 重新加载客户、目录与全部兑换记录
    #[instrument(skip(self))]
    pub async fn reload(&self) -> Result<LoyaltySnapshot> {
        let (customers, rewards, records) = tokio::try_join!(
            self.ledger.list_customers(),
            self.catalog.list_rewards(),
            self.reports.records(ReportWindow::All),
        )?;

        debug!(
            customers = customers.len(),
            rewards = rewards.len(),
            records = records.len(),
            "快照已加载"
        );

        Ok(LoyaltySnapshot {
            customers,
            rewards,
            records,
            loaded_at: Utc::now(),
        })
    }

    /// 按名称或邮箱搜索客户（不区分大小写）
    pub async fn search_customers(&self, term: &str) -> Result<Vec<Customer>> {
        let customers = self.ledger.list_customers().await?;
        Ok(customers
            .into_iter()
            .filter(|c| c.matches_term(term))
            .collect())
    }
}
