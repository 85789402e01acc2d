//! 服务层数据传输对象

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Customer, RedemptionRecord, Reward};

/// 兑换请求
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedeemRequest {
    pub customer_id: i64,
    pub reward_id: i64,
    /// 幂等键；调用方超时后用同一键重试可以拿回原记录
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
}

impl RedeemRequest {
    pub fn new(customer_id: i64, reward_id: i64) -> Self {
        Self {
            customer_id,
            reward_id,
            idempotency_key: None,
        }
    }

    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }
}

/// 兑换结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RedemptionReceipt {
    pub record: RedemptionRecord,
    /// 是否为幂等重放（记录早已存在）
    pub replayed: bool,
}

/// 注册结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationOutcome {
    pub customer: Customer,
    /// 邮箱已注册，返回的是已有客户
    pub returning: bool,
}

/// 应用状态快照
///
/// 界面层每次刷新时整体重新加载，不做增量维护。
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoyaltySnapshot {
    /// 按注册时间倒序
    pub customers: Vec<Customer>,
    /// 目录顺序
    pub rewards: Vec<Reward>,
    /// 最新在前
    pub records: Vec<RedemptionRecord>,
    pub loaded_at: DateTime<Utc>,
}

impl LoyaltySnapshot {
    /// 名称或邮箱包含搜索词的客户（不区分大小写），保持原顺序
    pub fn search_customers(&self, term: &str) -> Vec<&Customer> {
        self.customers
            .iter()
            .filter(|c| c.matches_term(term))
            .collect()
    }

    pub fn customer(&self, id: i64) -> Option<&Customer> {
        self.customers.iter().find(|c| c.id == id)
    }
}
