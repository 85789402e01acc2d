//! 报表服务
//!
//! 取数后交给 `report` 模块的纯函数计算。

use std::sync::Arc;

use chrono::{FixedOffset, NaiveDate, Utc};
use tracing::instrument;

use crate::error::Result;
use crate::models::RedemptionRecord;
use crate::report::{DateRange, MetricsSnapshot, ReportWindow, summarize};
use crate::repository::LoyaltyBackend;
use crate::service::{BackendPolicy, CatalogService};

/// 报表服务
pub struct ReportService {
    backend: Arc<dyn LoyaltyBackend>,
    policy: BackendPolicy,
    catalog: Arc<CatalogService>,
    utc_offset: FixedOffset,
    recent_limit: usize,
}

impl ReportService {
    pub fn new(
        backend: Arc<dyn LoyaltyBackend>,
        policy: BackendPolicy,
        catalog: Arc<CatalogService>,
        utc_offset: FixedOffset,
        recent_limit: usize,
    ) -> Self {
        Self {
            backend,
            policy,
            catalog,
            utc_offset,
            recent_limit,
        }
    }

    /// 全量指标快照
    #[instrument(skip(self))]
    pub async fn snapshot(&self) -> Result<MetricsSnapshot> {
        let customers = self
            .policy
            .read("select_all_customers", || self.backend.select_all_customers())
            .await?;
        let catalog = self.catalog.catalog().await?;
        let records = self.fetch(None).await?;

        Ok(summarize(&customers, &catalog, &records, self.recent_limit))
    }

    /// 时间窗口内的兑换记录，最新在前
    pub async fn records(&self, window: ReportWindow) -> Result<Vec<RedemptionRecord>> {
        let range = window.range(Utc::now(), self.utc_offset)?;
        self.fetch(range).await
    }

    /// 按营业地自然日筛选，结束日包含整天
    pub async fn records_in_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RedemptionRecord>> {
        let range = DateRange::from_dates(start, end, self.utc_offset)?;
        self.fetch(Some(range)).await
    }

    async fn fetch(&self, range: Option<DateRange>) -> Result<Vec<RedemptionRecord>> {
        self.policy
            .read("select_redemption_records", || {
                self.backend.select_redemption_records(range)
            })
            .await
    }
}
