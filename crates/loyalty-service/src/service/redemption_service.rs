//! 兑换服务
//!
//! 处理奖品兑换的核心业务逻辑，包括：
//! - 幂等处理（同一幂等键只产生一条记录）
//! - 执行时重新校验余额
//! - 客户级串行化与原子提交
//!
//! ## 兑换流程
//!
//! 1. 幂等检查 -> 2. 获取客户锁（持锁后再查一次幂等键） -> 3. 重新读取余额 -> 4. 资格校验
//!    -> 5. 原子提交（比较清零 + 追加记录）
//!
//! 兑换会清空客户全部积分，剩余积分恒为 0。

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::error::{LoyaltyError, Result};
use crate::lock::CustomerLockManager;
use crate::models::{Customer, RedemptionRecord, Reward, RewardProgress};
use crate::repository::LoyaltyBackend;
use crate::service::dto::{RedeemRequest, RedemptionReceipt};
use crate::service::{BackendPolicy, CatalogService, RewardPrompt};

/// 兑换服务
pub struct RedemptionService {
    backend: Arc<dyn LoyaltyBackend>,
    policy: BackendPolicy,
    catalog: Arc<CatalogService>,
    locks: Arc<CustomerLockManager>,
}

impl RedemptionService {
    pub fn new(
        backend: Arc<dyn LoyaltyBackend>,
        policy: BackendPolicy,
        catalog: Arc<CatalogService>,
        locks: Arc<CustomerLockManager>,
    ) -> Self {
        Self {
            backend,
            policy,
            catalog,
            locks,
        }
    }

    /// 客户当前可兑换的奖品，保持目录顺序
    pub async fn eligible_rewards(&self, customer: &Customer) -> Result<Vec<Reward>> {
        Ok(self.catalog.catalog().await?.eligible_for(customer.points))
    }

    /// 各奖品的兑换进度
    pub async fn reward_progress(&self, points: i64) -> Result<Vec<RewardProgress>> {
        Ok(self.catalog.catalog().await?.progress_for(points))
    }

    /// 兑换奖品
    ///
    /// 完整流程：
    /// 1. 带幂等键且记录已存在时直接返回原记录
    /// 2. 获取客户锁，同一客户的兑换串行执行
    /// 3. 重新读取客户与目录，余额不足返回 `InsufficientPoints`
    /// 4. 原子提交：余额仍为读取值时清零并追加记录，否则返回 `ConcurrencyConflict`
    ///
    /// 提交不会自动重试。调用方遇到超时可用同一幂等键重试，
    /// 若上一次实际已提交则拿回原记录。
    #[instrument(skip(self, request), fields(customer_id = request.customer_id, reward_id = request.reward_id))]
    pub async fn redeem(&self, request: RedeemRequest) -> Result<RedemptionReceipt> {
        let started = Instant::now();
        let result = self.redeem_inner(request).await;

        let outcome = match &result {
            Ok(receipt) if receipt.replayed => "replayed",
            Ok(_) => "success",
            Err(e) => e.error_code(),
        };
        metrics::counter!("loyalty_redemptions_total", "result" => outcome).increment(1);
        metrics::histogram!("loyalty_redemption_duration_seconds")
            .record(started.elapsed().as_secs_f64());

        result
    }

    async fn redeem_inner(&self, request: RedeemRequest) -> Result<RedemptionReceipt> {
        // 1. 幂等检查
        if let Some(key) = request.idempotency_key.as_deref() {
            if let Some(existing) = self.find_by_key(key).await? {
                return Self::replay(&request, existing);
            }
        }

        // 2. 客户锁
        let _guard = self.locks.acquire(request.customer_id).await?;

        // 等锁期间同一幂等键可能已由前一个请求提交
        if let Some(key) = request.idempotency_key.as_deref() {
            if let Some(existing) = self.find_by_key(key).await? {
                return Self::replay(&request, existing);
            }
        }

        // 3. 执行时重新校验
        let customer = self
            .policy
            .read("select_customer_by_id", || {
                self.backend.select_customer_by_id(request.customer_id)
            })
            .await?
            .ok_or(LoyaltyError::CustomerNotFound(request.customer_id))?;

        let catalog = self.catalog.catalog().await?;
        let reward = catalog
            .get(request.reward_id)
            .ok_or(LoyaltyError::RewardNotFound(request.reward_id))?;

        if !reward.is_affordable(customer.points) {
            return Err(LoyaltyError::InsufficientPoints {
                required: reward.points_required,
                available: customer.points,
            });
        }

        // 4. 原子提交
        let idempotency_key = request
            .idempotency_key
            .clone()
            .unwrap_or_else(|| Uuid::now_v7().to_string());
        let record =
            RedemptionRecord::for_redemption(&customer, reward, idempotency_key, Utc::now());

        let committed = self
            .policy
            .write("commit_redemption", || {
                self.backend.commit_redemption(&record, customer.points)
            })
            .await;

        match committed {
            Ok(true) => {
                info!(
                    record_id = %record.id,
                    points_before = record.points_before,
                    reward_name = %record.reward_name,
                    "兑换成功"
                );
                Ok(RedemptionReceipt {
                    record,
                    replayed: false,
                })
            }
            Ok(false) => {
                warn!(expected = customer.points, "余额已变化，兑换未提交");
                Err(LoyaltyError::ConcurrencyConflict)
            }
            // 同一幂等键被另一进程抢先提交
            Err(LoyaltyError::ConcurrencyConflict) if request.idempotency_key.is_some() => {
                match self.find_by_key(&record.idempotency_key).await? {
                    Some(existing) => Self::replay(&request, existing),
                    None => Err(LoyaltyError::ConcurrencyConflict),
                }
            }
            Err(e) => Err(e),
        }
    }

    /// 经由选择器兑换
    ///
    /// 没有可兑换奖品时返回 `InsufficientPoints`；操作员取消返回 `Ok(None)`。
    #[instrument(skip(self, prompt))]
    pub async fn redeem_with_prompt(
        &self,
        customer_id: i64,
        prompt: &dyn RewardPrompt,
    ) -> Result<Option<RedemptionReceipt>> {
        let customer = self
            .policy
            .read("select_customer_by_id", || {
                self.backend.select_customer_by_id(customer_id)
            })
            .await?
            .ok_or(LoyaltyError::CustomerNotFound(customer_id))?;

        let catalog = self.catalog.catalog().await?;
        let options = catalog.eligible_for(customer.points);
        if options.is_empty() {
            let required = catalog
                .rewards()
                .iter()
                .map(|r| r.points_required)
                .min()
                .unwrap_or(0);
            return Err(LoyaltyError::InsufficientPoints {
                required,
                available: customer.points,
            });
        }

        let Some(reward_id) = prompt.choose_reward(&customer, &options).await? else {
            info!("操作员取消兑换");
            return Ok(None);
        };

        self.redeem(RedeemRequest::new(customer_id, reward_id))
            .await
            .map(Some)
    }

    async fn find_by_key(&self, key: &str) -> Result<Option<RedemptionRecord>> {
        self.policy
            .read("select_redemption_by_idempotency_key", || {
                self.backend.select_redemption_by_idempotency_key(key)
            })
            .await
    }

    fn replay(request: &RedeemRequest, existing: RedemptionRecord) -> Result<RedemptionReceipt> {
        if existing.customer_id != request.customer_id || existing.reward_id != request.reward_id {
            return Err(LoyaltyError::Validation(format!(
                "幂等键已用于其他兑换: {}",
                existing.idempotency_key
            )));
        }

        info!(record_id = %existing.id, "幂等请求，返回已存在的兑换记录");
        Ok(RedemptionReceipt {
            record: existing,
            replayed: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lock::LockConfig;
    use crate::models::NewCustomer;
    use crate::report::DateRange;
    use crate::repository::{MemoryLoyaltyBackend, MockLoyaltyBackend};
    use crate::service::MockRewardPrompt;
    use async_trait::async_trait;
    use std::time::Duration;

    /// 提交前先等待一段时间的内存后端，模拟提交仍在进行中
    struct SlowCommitBackend {
        inner: MemoryLoyaltyBackend,
        delay: Duration,
    }

    #[async_trait]
    impl LoyaltyBackend for SlowCommitBackend {
        async fn insert_customer(&self, customer: &NewCustomer) -> Result<Customer> {
            self.inner.insert_customer(customer).await
        }
        async fn select_customer_by_email(&self, email: &str) -> Result<Option<Customer>> {
            self.inner.select_customer_by_email(email).await
        }
        async fn select_customer_by_id(&self, id: i64) -> Result<Option<Customer>> {
            self.inner.select_customer_by_id(id).await
        }
        async fn select_all_customers(&self) -> Result<Vec<Customer>> {
            self.inner.select_all_customers().await
        }
        async fn update_customer_points(&self, id: i64, points: i64) -> Result<Option<Customer>> {
            self.inner.update_customer_points(id, points).await
        }
        async fn compare_and_set_points(
            &self,
            id: i64,
            expected: i64,
            points: i64,
        ) -> Result<bool> {
            self.inner.compare_and_set_points(id, expected, points).await
        }
        async fn delete_customer(&self, id: i64) -> Result<bool> {
            self.inner.delete_customer(id).await
        }
        async fn get_reward_catalog(&self) -> Result<Option<Vec<Reward>>> {
            self.inner.get_reward_catalog().await
        }
        async fn put_reward_catalog(&self, rewards: &[Reward]) -> Result<()> {
            self.inner.put_reward_catalog(rewards).await
        }
        async fn insert_redemption_record(&self, record: &RedemptionRecord) -> Result<()> {
            self.inner.insert_redemption_record(record).await
        }
        async fn select_redemption_records(
            &self,
            range: Option<DateRange>,
        ) -> Result<Vec<RedemptionRecord>> {
            self.inner.select_redemption_records(range).await
        }
        async fn select_redemption_by_idempotency_key(
            &self,
            idempotency_key: &str,
        ) -> Result<Option<RedemptionRecord>> {
            self.inner
                .select_redemption_by_idempotency_key(idempotency_key)
                .await
        }
        async fn commit_redemption(
            &self,
            record: &RedemptionRecord,
            expected_points: i64,
        ) -> Result<bool> {
            tokio::time::sleep(self.delay).await;
            self.inner.commit_redemption(record, expected_points).await
        }
    }

    fn reward(id: i64, name: &str, points_required: i64) -> Reward {
        Reward {
            id,
            name: name.to_string(),
            icon: "🎁".to_string(),
            points_required,
            description: None,
            premium: false,
        }
    }

    fn customer(id: i64, points: i64) -> Customer {
        Customer {
            id,
            name: "Ana".to_string(),
            email: "ana@x.com".to_string(),
            points,
            created_at: Utc::now(),
        }
    }

    fn service(backend: Arc<dyn LoyaltyBackend>) -> RedemptionService {
        let policy = BackendPolicy::default();
        let catalog = Arc::new(CatalogService::new(Arc::clone(&backend), policy.clone()));
        let locks = Arc::new(CustomerLockManager::new(LockConfig::default()));
        RedemptionService::new(backend, policy, catalog, locks)
    }

    async fn seeded(points: i64) -> (Arc<MemoryLoyaltyBackend>, Customer) {
        let backend = MemoryLoyaltyBackend::new()
            .with_catalog(vec![reward(1, "Taco", 50), reward(2, "Drink", 100)])
            .await;
        let new = crate::models::NewCustomer::new("Ana", "ana@x.com").unwrap();
        let ana = backend.insert_customer(&new).await.unwrap();
        let ana = backend
            .update_customer_points(ana.id, points)
            .await
            .unwrap()
            .unwrap();
        (Arc::new(backend), ana)
    }

    #[tokio::test]
    async fn test_redeem_resets_balance() {
        let (backend, ana) = seeded(120).await;
        let redemption = service(backend.clone());

        let receipt = redemption.redeem(RedeemRequest::new(ana.id, 2)).await.unwrap();
        assert!(!receipt.replayed);
        assert_eq!(receipt.record.points_before, 120);
        assert_eq!(receipt.record.points_spent, 100);
        assert_eq!(receipt.record.points_remaining_after, 0);

        let after = backend.select_customer_by_id(ana.id).await.unwrap().unwrap();
        assert_eq!(after.points, 0);
    }

    #[tokio::test]
    async fn test_redeem_insufficient_points_writes_nothing() {
        let (backend, ana) = seeded(60).await;
        let redemption = service(backend.clone());

        let result = redemption.redeem(RedeemRequest::new(ana.id, 2)).await;
        assert!(matches!(
            result,
            Err(LoyaltyError::InsufficientPoints {
                required: 100,
                available: 60
            })
        ));
        assert_eq!(backend.record_count(), 0);
    }

    #[tokio::test]
    async fn test_redeem_unknown_reward_and_customer() {
        let (backend, ana) = seeded(60).await;
        let redemption = service(backend);

        assert!(matches!(
            redemption.redeem(RedeemRequest::new(ana.id, 99)).await,
            Err(LoyaltyError::RewardNotFound(99))
        ));
        assert!(matches!(
            redemption.redeem(RedeemRequest::new(404, 1)).await,
            Err(LoyaltyError::CustomerNotFound(404))
        ));
    }

    #[tokio::test]
    async fn test_idempotent_retry_returns_same_record() {
        let (backend, ana) = seeded(120).await;
        let redemption = service(backend.clone());

        let request = RedeemRequest::new(ana.id, 1).with_idempotency_key("order-1");
        let first = redemption.redeem(request.clone()).await.unwrap();
        let second = redemption.redeem(request).await.unwrap();

        assert!(second.replayed);
        assert_eq!(first.record.id, second.record.id);
        assert_eq!(backend.record_count(), 1);
    }

    #[tokio::test]
    async fn test_same_key_while_commit_in_flight_replays() {
        let (inner, ana) = seeded(120).await;
        let inner = Arc::try_unwrap(inner).unwrap();
        let backend = Arc::new(SlowCommitBackend {
            inner,
            delay: Duration::from_millis(100),
        });
        let redemption = service(backend.clone());

        // 两个请求都在提交完成前通过第一次幂等检查
        let request = RedeemRequest::new(ana.id, 1).with_idempotency_key("pos-1");
        let (first, second) = tokio::join!(
            redemption.redeem(request.clone()),
            redemption.redeem(request)
        );

        let first = first.unwrap();
        let second = second.unwrap();
        assert_ne!(first.replayed, second.replayed);
        assert_eq!(first.record.id, second.record.id);
        assert_eq!(backend.inner.record_count(), 1);
    }

    #[tokio::test]
    async fn test_idempotency_key_reused_for_other_reward() {
        let (backend, ana) = seeded(120).await;
        let redemption = service(backend);

        redemption
            .redeem(RedeemRequest::new(ana.id, 1).with_idempotency_key("order-1"))
            .await
            .unwrap();
        let result = redemption
            .redeem(RedeemRequest::new(ana.id, 2).with_idempotency_key("order-1"))
            .await;
        assert!(matches!(result, Err(LoyaltyError::Validation(_))));
    }

    #[tokio::test]
    async fn test_commit_conflict_is_reported() {
        let mut backend = MockLoyaltyBackend::new();
        backend
            .expect_select_customer_by_id()
            .returning(|id| Ok(Some(customer(id, 80))));
        backend
            .expect_get_reward_catalog()
            .returning(|| Ok(Some(vec![reward(1, "Taco", 50)])));
        backend
            .expect_commit_redemption()
            .withf(|record, expected| record.points_before == 80 && *expected == 80)
            .times(1)
            .returning(|_, _| Ok(false));

        let redemption = service(Arc::new(backend));
        let result = redemption.redeem(RedeemRequest::new(1, 1)).await;
        assert!(matches!(result, Err(LoyaltyError::ConcurrencyConflict)));
    }

    #[tokio::test]
    async fn test_commit_failure_is_not_retried() {
        let mut backend = MockLoyaltyBackend::new();
        backend
            .expect_select_customer_by_id()
            .returning(|id| Ok(Some(customer(id, 80))));
        backend
            .expect_get_reward_catalog()
            .returning(|| Ok(Some(vec![reward(1, "Taco", 50)])));
        backend
            .expect_commit_redemption()
            .times(1)
            .returning(|_, _| Err(LoyaltyError::BackendUnavailable("down".to_string())));

        let redemption = service(Arc::new(backend));
        let result = redemption.redeem(RedeemRequest::new(1, 1)).await;
        assert!(matches!(result, Err(LoyaltyError::BackendUnavailable(_))));
    }

    #[tokio::test]
    async fn test_redeem_with_prompt_offers_eligible_only() {
        let (backend, ana) = seeded(70).await;
        let redemption = service(backend);

        let mut prompt = MockRewardPrompt::new();
        prompt
            .expect_choose_reward()
            .withf(|_, options| options.len() == 1 && options[0].id == 1)
            .times(1)
            .returning(|_, options| Ok(Some(options[0].id)));

        let receipt = redemption
            .redeem_with_prompt(ana.id, &prompt)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(receipt.record.reward_name, "Taco");
    }

    #[tokio::test]
    async fn test_redeem_with_prompt_cancel() {
        let (backend, ana) = seeded(120).await;
        let redemption = service(backend.clone());

        let mut prompt = MockRewardPrompt::new();
        prompt.expect_choose_reward().returning(|_, _| Ok(None));

        assert!(
            redemption
                .redeem_with_prompt(ana.id, &prompt)
                .await
                .unwrap()
                .is_none()
        );
        assert_eq!(backend.record_count(), 0);
    }

    #[tokio::test]
    async fn test_redeem_with_prompt_nothing_eligible() {
        let (backend, ana) = seeded(10).await;
        let redemption = service(backend);

        let mut prompt = MockRewardPrompt::new();
        prompt.expect_choose_reward().never();

        let result = redemption.redeem_with_prompt(ana.id, &prompt).await;
        assert!(matches!(
            result,
            Err(LoyaltyError::InsufficientPoints {
                required: 50,
                available: 10
            })
        ));
    }
}
