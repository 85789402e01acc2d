//! 奖品与奖品目录定义
//!
//! 目录是一个有序序列，插入顺序即展示顺序。每次变更都整体写回后端。

use serde::{Deserialize, Serialize};

use crate::error::{LoyaltyError, Result};

/// 奖品定义
///
/// 字段别名兼容早期以西班牙语键存储的目录快照。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reward {
    pub id: i64,
    #[serde(alias = "nombre")]
    pub name: String,
    #[serde(alias = "icono", default)]
    pub icon: String,
    /// 兑换所需积分，必须为正
    #[serde(alias = "puntosRequeridos")]
    pub points_required: i64,
    #[serde(alias = "descripcion", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub premium: bool,
}

impl Reward {
    /// 校验奖品定义
    pub fn validate(&self) -> Result<()> {
        if self.points_required <= 0 {
            return Err(LoyaltyError::Validation(format!(
                "所需积分必须为正整数: {}",
                self.points_required
            )));
        }
        if self.name.trim().is_empty() {
            return Err(LoyaltyError::Validation("奖品名称不能为空".to_string()));
        }
        Ok(())
    }

    /// 给定余额是否足以兑换
    pub fn is_affordable(&self, points: i64) -> bool {
        points >= self.points_required
    }
}

/// 单个奖品的兑换进度
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardProgress {
    pub reward: Reward,
    /// 0..=100
    pub percent: u8,
    pub available: bool,
}

/// upsert 的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// 原位替换
    Replaced,
    /// 追加到末尾
    Appended,
}

/// 奖品目录
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RewardCatalog {
    rewards: Vec<Reward>,
}

impl RewardCatalog {
    pub fn new(rewards: Vec<Reward>) -> Self {
        Self { rewards }
    }

    /// 后端尚未保存目录时使用的内置默认目录
    pub fn default_catalog() -> Self {
        Self::new(vec![
            Reward {
                id: 1,
                name: "Taco Gratis".to_string(),
                icon: "🌮".to_string(),
                points_required: 50,
                description: Some("Canjea un taco de tu elección".to_string()),
                premium: false,
            },
            Reward {
                id: 2,
                name: "Bebida Gratis".to_string(),
                icon: "🥤".to_string(),
                points_required: 100,
                description: Some("Refresco o agua de sabor".to_string()),
                premium: false,
            },
            Reward {
                id: 3,
                name: "Comida Completa".to_string(),
                icon: "🍽️".to_string(),
                points_required: 200,
                description: Some("Platillo completo + bebida".to_string()),
                premium: false,
            },
            Reward {
                id: 4,
                name: "Comida para 4".to_string(),
                icon: "🏆".to_string(),
                points_required: 500,
                description: Some("Comida completa para 4 personas".to_string()),
                premium: true,
            },
        ])
    }

    pub fn rewards(&self) -> &[Reward] {
        &self.rewards
    }

    pub fn into_rewards(self) -> Vec<Reward> {
        self.rewards
    }

    pub fn len(&self) -> usize {
        self.rewards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rewards.is_empty()
    }

    pub fn get(&self, id: i64) -> Option<&Reward> {
        self.rewards.iter().find(|r| r.id == id)
    }

    /// 插入或替换奖品
    ///
    /// id 已存在时原位替换（保持位置），否则追加到末尾。
    pub fn upsert(&mut self, reward: Reward) -> Result<UpsertOutcome> {
        reward.validate()?;

        match self.rewards.iter_mut().find(|r| r.id == reward.id) {
            Some(slot) => {
                *slot = reward;
                Ok(UpsertOutcome::Replaced)
            }
            None => {
                self.rewards.push(reward);
                Ok(UpsertOutcome::Appended)
            }
        }
    }

    /// 删除奖品，返回是否确实删除了条目
    pub fn remove(&mut self, id: i64) -> bool {
        let before = self.rewards.len();
        self.rewards.retain(|r| r.id != id);
        self.rewards.len() != before
    }

    /// 为新奖品分配 id
    ///
    /// 以毫秒时间戳为基础，若与已有 id 冲突则取最大 id + 1。
    /// 已有 id 达到 `i64::MAX` 时无法分配，返回 `Validation`。
    pub fn next_reward_id(&self, now_millis: i64) -> Result<i64> {
        let max_id = self.rewards.iter().map(|r| r.id).max().unwrap_or(0);
        let next = max_id.checked_add(1).ok_or_else(|| {
            LoyaltyError::Validation(format!("奖品 id 已达上限，无法分配新 id: {}", max_id))
        })?;
        Ok(now_millis.max(next))
    }

    /// 余额可兑换的奖品，保持目录顺序（不按门槛排序）
    pub fn eligible_for(&self, points: i64) -> Vec<Reward> {
        self.rewards
            .iter()
            .filter(|r| r.is_affordable(points))
            .cloned()
            .collect()
    }

    /// 是否至少有一个可兑换的奖品
    pub fn has_eligible(&self, points: i64) -> bool {
        self.rewards.iter().any(|r| r.is_affordable(points))
    }

    /// 每个奖品的兑换进度，保持目录顺序
    pub fn progress_for(&self, points: i64) -> Vec<RewardProgress> {
        self.rewards
            .iter()
            .map(|r| {
                let ratio = points.max(0) as f64 / r.points_required.max(1) as f64;
                RewardProgress {
                    reward: r.clone(),
                    percent: (ratio * 100.0).min(100.0) as u8,
                    available: r.is_affordable(points),
                }
            })
            .collect()
    }
}
