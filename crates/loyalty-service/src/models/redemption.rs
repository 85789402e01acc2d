//! 兑换记录定义
//!
//! 兑换记录只追加、不可变。客户与奖品名称在兑换时快照，
//! 之后改名或删除都不会影响历史记录。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::customer::Customer;
use super::reward::Reward;

/// 兑换记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct RedemptionRecord {
    pub id: Uuid,
    pub customer_id: i64,
    pub customer_name: String,
    pub reward_id: i64,
    pub reward_name: String,
    /// 奖品门槛积分
    pub points_spent: i64,
    /// 兑换前余额
    pub points_before: i64,
    /// 兑换后余额，兑换会清空全部积分，因此恒为 0
    pub points_remaining_after: i64,
    /// 幂等键，同一键只会产生一条记录
    pub idempotency_key: String,
    pub redeemed_at: DateTime<Utc>,
}

impl RedemptionRecord {
    /// 为一次兑换构建记录
    pub fn for_redemption(
        customer: &Customer,
        reward: &Reward,
        idempotency_key: impl Into<String>,
        redeemed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            customer_id: customer.id,
            customer_name: customer.name.clone(),
            reward_id: reward.id,
            reward_name: reward.name.clone(),
            points_spent: reward.points_required,
            points_before: customer.points,
            points_remaining_after: 0,
            idempotency_key: idempotency_key.into(),
            redeemed_at,
        }
    }
}
