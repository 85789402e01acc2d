//! 客户锁管理器

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, instrument, warn};

use crate::error::{LoyaltyError, Result};

/// 锁配置
#[derive(Debug, Clone)]
pub struct LockConfig {
    /// 等待锁的最长时间，超时返回并发冲突
    pub acquire_timeout: Duration,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            acquire_timeout: Duration::from_secs(2),
        }
    }
}

/// 客户锁管理器
///
/// 每个客户 id 对应一把 tokio 互斥锁，按需创建，
/// 最后一个持有者释放时从表中移除。
#[derive(Debug, Default)]
pub struct CustomerLockManager {
    locks: Arc<DashMap<i64, Arc<Mutex<()>>>>,
    config: LockConfig,
}

impl CustomerLockManager {
    pub fn new(config: LockConfig) -> Self {
        Self {
            locks: Arc::new(DashMap::new()),
            config,
        }
    }

    /// 获取客户锁
    ///
    /// 在 `acquire_timeout` 内拿不到锁返回 `ConcurrencyConflict`。
    #[instrument(skip(self))]
    pub async fn acquire(&self, customer_id: i64) -> Result<CustomerLockGuard> {
        let mutex = self
            .locks
            .entry(customer_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let acquired = tokio::time::timeout(self.config.acquire_timeout, mutex.lock_owned()).await;
        match acquired {
            Ok(guard) => {
                debug!(customer_id, "客户锁已获取");
                Ok(CustomerLockGuard {
                    customer_id,
                    locks: Arc::clone(&self.locks),
                    _guard: guard,
                })
            }
            Err(_) => {
                // 等待中的 lock_owned 已随超时丢弃；计数为 1 表示只剩表项本身。
                // 持有者释放时若本等待者仍在排队，表项会留到这里才清理
                self.locks
                    .remove_if(&customer_id, |_, m| Arc::strong_count(m) == 1);
                warn!(
                    customer_id,
                    timeout_ms = self.config.acquire_timeout.as_millis() as u64,
                    "等待客户锁超时"
                );
                Err(LoyaltyError::ConcurrencyConflict)
            }
        }
    }

    /// 当前登记的锁数量
    pub fn active_locks(&self) -> usize {
        self.locks.len()
    }
}

/// 客户锁守卫，离开作用域即释放
pub struct CustomerLockGuard {
    customer_id: i64,
    locks: Arc<DashMap<i64, Arc<Mutex<()>>>>,
    _guard: OwnedMutexGuard<()>,
}

impl CustomerLockGuard {
    pub fn customer_id(&self) -> i64 {
        self.customer_id
    }
}

impl Drop for CustomerLockGuard {
    fn drop(&mut self) {
        // 引用计数为 2 表示只剩表项和本守卫，没有其他等待者
        self.locks
            .remove_if(&self.customer_id, |_, mutex| Arc::strong_count(mutex) == 2);
    }
}
