//! 客户实体定义

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{LoyaltyError, Result};

/// 客户
///
/// # Invariants
///
/// - `points >= 0`，所有扣减在零处截断
/// - `email` 在所有客户中唯一（区分大小写的精确匹配）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub points: i64,
    pub created_at: DateTime<Utc>,
}

impl Customer {
    /// 应用积分变动后的新余额：`max(0, points + delta)`
    ///
    /// 扣减超过余额时归零而不是报错。
    pub fn balance_after(&self, delta: i64) -> i64 {
        self.points.saturating_add(delta).max(0)
    }

    /// 名称或邮箱是否包含搜索词（不区分大小写）
    pub fn matches_term(&self, term: &str) -> bool {
        let term = term.trim().to_lowercase();
        if term.is_empty() {
            return true;
        }
        self.name.to_lowercase().contains(&term) || self.email.to_lowercase().contains(&term)
    }
}

/// 注册请求
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCustomer {
    pub name: String,
    pub email: String,
}

impl NewCustomer {
    /// 校验并规整输入（去除首尾空白）
    ///
    /// 不做大小写归一化，邮箱按原样存储。
    pub fn new(name: &str, email: &str) -> Result<Self> {
        let name = name.trim();
        let email = email.trim();

        if name.is_empty() {
            return Err(LoyaltyError::Validation("客户名称不能为空".to_string()));
        }
        if email.is_empty() || !email.contains('@') {
            return Err(LoyaltyError::Validation(format!("邮箱格式无效: {}", email)));
        }

        Ok(Self {
            name: name.to_string(),
            email: email.to_string(),
        })
    }
}
