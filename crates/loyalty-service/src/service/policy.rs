//! 后端调用策略
//!
//! 所有后端访问都经过 `BackendPolicy`：
//! - 读操作：超时 + 指数退避重试（仅限瞬时故障）
//! - 写操作：只有超时，失败直接返回，交给调用方决定是否重试

use std::future::Future;
use std::time::Duration;

use loyalty_shared::config::BackendConfig;
use loyalty_shared::retry::{RetryPolicy, retry_with_policy};
use tracing::warn;

use crate::error::{LoyaltyError, Result};

/// 后端调用策略
#[derive(Debug, Clone)]
pub struct BackendPolicy {
    timeout: Duration,
    read_retry: RetryPolicy,
}

impl Default for BackendPolicy {
    fn default() -> Self {
        Self::from_config(&BackendConfig::default())
    }
}

impl BackendPolicy {
    pub fn new(timeout: Duration, read_retry: RetryPolicy) -> Self {
        Self {
            timeout,
            read_retry,
        }
    }

    pub fn from_config(config: &BackendConfig) -> Self {
        Self::new(config.request_timeout(), config.read_retry_policy())
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// 执行读操作
    ///
    /// 每次尝试都单独计时，超时和后端不可用会按重试策略重来。
    pub async fn read<T, F, Fut>(&self, operation: &str, mut f: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        retry_with_policy(
            &self.read_retry,
            operation,
            LoyaltyError::is_retryable,
            || self.bounded(operation, f()),
        )
        .await
    }

    /// 执行写操作，不重试
    pub async fn write<T, F, Fut>(&self, operation: &str, f: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.bounded(operation, f()).await
    }

    async fn bounded<T, Fut>(&self, operation: &str, fut: Fut) -> Result<T>
    where
        Fut: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                let timeout_ms = self.timeout.as_millis() as u64;
                warn!(operation, timeout_ms, "后端调用超时");
                Err(LoyaltyError::Timeout {
                    operation: operation.to_string(),
                    timeout_ms,
                })
            }
        }
    }
}
