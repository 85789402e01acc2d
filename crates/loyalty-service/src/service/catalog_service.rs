//! 奖品目录服务
//!
//! 目录以整体快照读写：每次编辑先读出当前目录，修改后整体写回。
//! 进程内的编辑通过互斥锁串行，避免两次编辑互相覆盖。

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use crate::error::Result;
use crate::models::{Reward, RewardCatalog, UpsertOutcome};
use crate::repository::LoyaltyBackend;
use crate::service::BackendPolicy;

/// 奖品目录服务
pub struct CatalogService {
    backend: Arc<dyn LoyaltyBackend>,
    policy: BackendPolicy,
    write_lock: Mutex<()>,
}

impl CatalogService {
    pub fn new(backend: Arc<dyn LoyaltyBackend>, policy: BackendPolicy) -> Self {
        Self {
            backend,
            policy,
            write_lock: Mutex::new(()),
        }
    }

    /// 读取当前目录，后端尚未保存时返回内置默认目录
    pub async fn catalog(&self) -> Result<RewardCatalog> {
        let stored = self
            .policy
            .read("get_reward_catalog", || self.backend.get_reward_catalog())
            .await?;

        Ok(match stored {
            Some(rewards) => RewardCatalog::new(rewards),
            None => {
                debug!("后端无奖品目录，使用默认目录");
                RewardCatalog::default_catalog()
            }
        })
    }

    /// 奖品列表，保持目录顺序
    pub async fn list_rewards(&self) -> Result<Vec<Reward>> {
        self.catalog().await.map(RewardCatalog::into_rewards)
    }

    /// 新增或编辑奖品
    ///
    /// `id <= 0` 视为新奖品并分配 id；已存在的 id 原位替换。
    /// 返回最终写入的奖品。
    #[instrument(skip(self, reward), fields(reward_id = reward.id, reward_name = %reward.name))]
    pub async fn upsert_reward(&self, mut reward: Reward) -> Result<Reward> {
        reward.validate()?;

        let _guard = self.write_lock.lock().await;
        let mut catalog = self.catalog().await?;

        if reward.id <= 0 {
            reward.id = catalog.next_reward_id(Utc::now().timestamp_millis())?;
        }
        let outcome = catalog.upsert(reward.clone())?;

        self.persist(&catalog).await?;

        let operation = match outcome {
            UpsertOutcome::Replaced => "replace",
            UpsertOutcome::Appended => "append",
        };
        metrics::counter!("loyalty_catalog_writes_total", "operation" => operation).increment(1);
        info!(reward_id = reward.id, operation, "奖品已保存");

        Ok(reward)
    }

    /// 删除奖品，id 不存在时不做任何事
    #[instrument(skip(self))]
    pub async fn delete_reward(&self, reward_id: i64) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut catalog = self.catalog().await?;

        if !catalog.remove(reward_id) {
            debug!(reward_id, "奖品不存在，忽略删除");
            return Ok(());
        }

        self.persist(&catalog).await?;

        metrics::counter!("loyalty_catalog_writes_total", "operation" => "delete").increment(1);
        info!(reward_id, "奖品已删除");

        Ok(())
    }

    async fn persist(&self, catalog: &RewardCatalog) -> Result<()> {
        self.policy
            .write("put_reward_catalog", || {
                self.backend.put_reward_catalog(catalog.rewards())
            })
            .await
    }
}
