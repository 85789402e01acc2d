//! 统计推导
//!
//! 全部是纯函数，输入顺序决定并列项的次序。

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::window::DateRange;
use crate::models::{Customer, RedemptionRecord, RewardCatalog};

/// 指标快照
///
/// 按需计算，不持久化。
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub total_customers: usize,
    pub total_points_in_system: i64,
    pub total_redemptions: usize,
    pub customers_with_available_reward: usize,
    /// 奖品名称 → 兑换次数，按次数降序
    pub reward_frequency: Vec<(String, u64)>,
    pub first_redemption_at: Option<DateTime<Utc>>,
    pub last_redemption_at: Option<DateTime<Utc>>,
    /// 最近的兑换记录，最新在前
    pub recent_redemptions: Vec<RedemptionRecord>,
}

/// 计算指标快照
pub fn summarize(
    customers: &[Customer],
    catalog: &RewardCatalog,
    records: &[RedemptionRecord],
    recent_limit: usize,
) -> MetricsSnapshot {
    let mut recent: Vec<RedemptionRecord> = records.to_vec();
    recent.sort_by(|a, b| b.redeemed_at.cmp(&a.redeemed_at));
    recent.truncate(recent_limit);

    MetricsSnapshot {
        total_customers: customers.len(),
        total_points_in_system: customers
            .iter()
            .fold(0i64, |total, c| total.saturating_add(c.points)),
        total_redemptions: records.len(),
        customers_with_available_reward: customers_with_available_reward(customers, catalog),
        reward_frequency: reward_frequency(records),
        first_redemption_at: records.iter().map(|r| r.redeemed_at).min(),
        last_redemption_at: records.iter().map(|r| r.redeemed_at).max(),
        recent_redemptions: recent,
    }
}

/// 当前目录下至少有一个可兑换奖品的客户数
pub fn customers_with_available_reward(customers: &[Customer], catalog: &RewardCatalog) -> usize {
    customers
        .iter()
        .filter(|c| catalog.has_eligible(c.points))
        .count()
}

/// 各奖品的兑换次数
///
/// 以记录中的奖品名称快照分组，按次数降序；次数相同保持首次出现的顺序。
pub fn reward_frequency(records: &[RedemptionRecord]) -> Vec<(String, u64)> {
    let mut counts: Vec<(String, u64)> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for record in records {
        match index.get(record.reward_name.as_str()) {
            Some(&i) => counts[i].1 += 1,
            None => {
                index.insert(record.reward_name.as_str(), counts.len());
                counts.push((record.reward_name.clone(), 1));
            }
        }
    }

    // sort_by 是稳定排序
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
}

/// 闭区间筛选兑换记录，保持输入顺序
pub fn records_in_range(records: &[RedemptionRecord], range: &DateRange) -> Vec<RedemptionRecord> {
    records
        .iter()
        .filter(|r| range.contains(r.redeemed_at))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Reward;
    use chrono::{Duration, TimeZone};
    use uuid::Uuid;

    fn record(reward_name: &str, redeemed_at: DateTime<Utc>) -> RedemptionRecord {
        RedemptionRecord {
            id: Uuid::now_v7(),
            customer_id: 1,
            customer_name: "Ana".to_string(),
            reward_id: 1,
            reward_name: reward_name.to_string(),
            points_spent: 50,
            points_before: 60,
            points_remaining_after: 0,
            idempotency_key: Uuid::new_v4().to_string(),
            redeemed_at,
        }
    }

    fn customer(id: i64, points: i64) -> Customer {
        Customer {
            id,
            name: format!("c{}", id),
            email: format!("c{}@x.com", id),
            points,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_reward_frequency_sorted_descending() {
        let now = Utc::now();
        let records = vec![record("Taco", now), record("Taco", now), record("Drink", now)];
        assert_eq!(
            reward_frequency(&records),
            vec![("Taco".to_string(), 2), ("Drink".to_string(), 1)]
        );
    }

    #[test]
    fn test_reward_frequency_ties_keep_first_seen_order() {
        let now = Utc::now();
        let records = vec![
            record("Drink", now),
            record("Taco", now),
            record("Meal", now),
            record("Meal", now),
            record("Taco", now),
        ];
        assert_eq!(
            reward_frequency(&records),
            vec![
                ("Taco".to_string(), 2),
                ("Meal".to_string(), 2),
                ("Drink".to_string(), 1)
            ]
        );
        assert!(reward_frequency(&[]).is_empty());
    }

    #[test]
    fn test_summarize() {
        let base = Utc.with_ymd_and_hms(2025, 1, 1, 10, 0, 0).unwrap();
        let catalog = RewardCatalog::new(vec![Reward {
            id: 1,
            name: "Taco".to_string(),
            icon: "🌮".to_string(),
            points_required: 50,
            description: None,
            premium: false,
        }]);
        let customers = vec![customer(1, 10), customer(2, 50), customer(3, 120)];
        let records: Vec<RedemptionRecord> = (0..12)
            .map(|i| record("Taco", base + Duration::days(i)))
            .collect();

        let snapshot = summarize(&customers, &catalog, &records, 10);
        assert_eq!(snapshot.total_customers, 3);
        assert_eq!(snapshot.total_points_in_system, 180);
        assert_eq!(snapshot.total_redemptions, 12);
        assert_eq!(snapshot.customers_with_available_reward, 2);
        assert_eq!(snapshot.first_redemption_at, Some(base));
        assert_eq!(snapshot.last_redemption_at, Some(base + Duration::days(11)));
        assert_eq!(snapshot.recent_redemptions.len(), 10);
        assert_eq!(
            snapshot.recent_redemptions[0].redeemed_at,
            base + Duration::days(11)
        );
    }

    #[test]
    fn test_total_points_saturates() {
        let customers = vec![customer(1, i64::MAX), customer(2, 5)];
        let snapshot = summarize(&customers, &RewardCatalog::default(), &[], 10);
        assert_eq!(snapshot.total_points_in_system, i64::MAX);
    }

    #[test]
    fn test_summarize_empty() {
        let snapshot = summarize(&[], &RewardCatalog::default(), &[], 10);
        assert_eq!(snapshot.total_customers, 0);
        assert_eq!(snapshot.first_redemption_at, None);
        assert!(snapshot.recent_redemptions.is_empty());
    }

    #[test]
    fn test_records_in_range_inclusive() {
        let start = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 3, 31, 23, 59, 59).unwrap();
        let range = DateRange::new(start, end).unwrap();
        let records = vec![
            record("a", start),
            record("b", end),
            record("c", end + Duration::seconds(1)),
            record("d", start - Duration::seconds(1)),
        ];

        let names: Vec<String> = records_in_range(&records, &range)
            .into_iter()
            .map(|r| r.reward_name)
            .collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
