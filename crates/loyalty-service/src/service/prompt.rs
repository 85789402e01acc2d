//! 奖品选择交互
//!
//! 兑换前需要由操作员从可兑换奖品中挑选一个。服务层只依赖 `RewardPrompt`，
//! 界面层可以用 `ChannelPrompt` 把请求转发到自己的事件循环。
//! 返回 `None` 表示操作员取消。

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::error::{LoyaltyError, Result};
use crate::models::{Customer, Reward};

/// 奖品选择
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RewardPrompt: Send + Sync {
    /// 从 `options` 中选择一个奖品 id，取消时返回 `None`
    async fn choose_reward(&self, customer: &Customer, options: &[Reward]) -> Result<Option<i64>>;
}

/// 一次待回答的选择请求
#[derive(Debug)]
pub struct SelectionRequest {
    pub customer: Customer,
    pub options: Vec<Reward>,
    responder: oneshot::Sender<Option<i64>>,
}

impl SelectionRequest {
    /// 回答选择；请求方已放弃时静默忽略
    pub fn respond(self, reward_id: Option<i64>) {
        let _ = self.responder.send(reward_id);
    }

    pub fn cancel(self) {
        self.respond(None);
    }
}

/// 基于 tokio 通道的选择器
#[derive(Debug, Clone)]
pub struct ChannelPrompt {
    tx: mpsc::Sender<SelectionRequest>,
}

impl ChannelPrompt {
    /// 创建选择器和对应的请求接收端
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<SelectionRequest>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self { tx }, rx)
    }
}

#[async_trait]
impl RewardPrompt for ChannelPrompt {
    async fn choose_reward(&self, customer: &Customer, options: &[Reward]) -> Result<Option<i64>> {
        let (responder, answer) = oneshot::channel();
        let request = SelectionRequest {
            customer: customer.clone(),
            options: options.to_vec(),
            responder,
        };

        self.tx
            .send(request)
            .await
            .map_err(|_| LoyaltyError::Internal("奖品选择界面已关闭".to_string()))?;

        // 回答端被丢弃视同取消
        match answer.await {
            Ok(choice) => Ok(choice),
            Err(_) => {
                debug!(customer_id = customer.id, "选择请求被丢弃，按取消处理");
                Ok(None)
            }
        }
    }
}
