//! 内存后端
//!
//! 使用 DashMap 实现的并发安全内存存储，适用于测试和本地开发。
//! 语义与 PostgreSQL 实现保持一致：邮箱唯一、余额比较写入、兑换原子提交。

use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::RwLock;

use super::traits::LoyaltyBackend;
use crate::error::{LoyaltyError, Result};
use crate::models::{Customer, NewCustomer, RedemptionRecord, Reward};
use crate::report::DateRange;

/// 内存后端
#[derive(Debug, Default)]
pub struct MemoryLoyaltyBackend {
    customers: DashMap<i64, Customer>,
    /// email -> customer id，用于唯一性检查
    emails: DashMap<String, i64>,
    catalog: RwLock<Option<Vec<Reward>>>,
    /// idempotency_key -> record
    records: DashMap<String, RedemptionRecord>,
    next_customer_id: AtomicI64,
}

impl MemoryLoyaltyBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// 预置奖品目录
    pub async fn with_catalog(self, rewards: Vec<Reward>) -> Self {
        *self.catalog.write().await = Some(rewards);
        self
    }

    /// 记录总数
    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    fn append_record(&self, record: &RedemptionRecord) -> Result<()> {
        match self.records.entry(record.idempotency_key.clone()) {
            Entry::Occupied(_) => Err(LoyaltyError::ConcurrencyConflict),
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
                Ok(())
            }
        }
    }
}

#[async_trait]
impl LoyaltyBackend for MemoryLoyaltyBackend {
    async fn insert_customer(&self, customer: &NewCustomer) -> Result<Customer> {
        match self.emails.entry(customer.email.clone()) {
            Entry::Occupied(_) => Err(LoyaltyError::DuplicateEmail(customer.email.clone())),
            Entry::Vacant(slot) => {
                let id = self.next_customer_id.fetch_add(1, Ordering::SeqCst) + 1;
                let created = Customer {
                    id,
                    name: customer.name.clone(),
                    email: customer.email.clone(),
                    points: 0,
                    created_at: Utc::now(),
                };
                self.customers.insert(id, created.clone());
                slot.insert(id);
                Ok(created)
            }
        }
    }

    async fn select_customer_by_email(&self, email: &str) -> Result<Option<Customer>> {
        let id = match self.emails.get(email) {
            Some(id) => *id,
            None => return Ok(None),
        };
        Ok(self.customers.get(&id).map(|c| c.clone()))
    }

    async fn select_customer_by_id(&self, id: i64) -> Result<Option<Customer>> {
        Ok(self.customers.get(&id).map(|c| c.clone()))
    }

    async fn select_all_customers(&self) -> Result<Vec<Customer>> {
        let mut customers: Vec<Customer> =
            self.customers.iter().map(|e| e.value().clone()).collect();
        customers.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(customers)
    }

    async fn update_customer_points(&self, id: i64, points: i64) -> Result<Option<Customer>> {
        Ok(self.customers.get_mut(&id).map(|mut c| {
            c.points = points;
            c.clone()
        }))
    }

    async fn compare_and_set_points(&self, id: i64, expected: i64, points: i64) -> Result<bool> {
        match self.customers.get_mut(&id) {
            Some(mut c) if c.points == expected => {
                c.points = points;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_customer(&self, id: i64) -> Result<bool> {
        match self.customers.remove(&id) {
            Some((_, customer)) => {
                self.emails.remove(&customer.email);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn get_reward_catalog(&self) -> Result<Option<Vec<Reward>>> {
        Ok(self.catalog.read().await.clone())
    }

    async fn put_reward_catalog(&self, rewards: &[Reward]) -> Result<()> {
        *self.catalog.write().await = Some(rewards.to_vec());
        Ok(())
    }

    async fn insert_redemption_record(&self, record: &RedemptionRecord) -> Result<()> {
        self.append_record(record)
    }

    async fn select_redemption_records(
        &self,
        range: Option<DateRange>,
    ) -> Result<Vec<RedemptionRecord>> {
        let mut records: Vec<RedemptionRecord> = self
            .records
            .iter()
            .map(|e| e.value().clone())
            .filter(|r| range.is_none_or(|range| range.contains(r.redeemed_at)))
            .collect();
        records.sort_by(|a, b| b.redeemed_at.cmp(&a.redeemed_at).then(b.id.cmp(&a.id)));
        Ok(records)
    }

    async fn select_redemption_by_idempotency_key(
        &self,
        idempotency_key: &str,
    ) -> Result<Option<RedemptionRecord>> {
        Ok(self.records.get(idempotency_key).map(|r| r.clone()))
    }

    async fn commit_redemption(
        &self,
        record: &RedemptionRecord,
        expected_points: i64,
    ) -> Result<bool> {
        // 持有客户条目的写锁直到记录追加完成
        let Some(mut customer) = self.customers.get_mut(&record.customer_id) else {
            return Ok(false);
        };
        if customer.points != expected_points {
            return Ok(false);
        }

        self.append_record(record)?;
        customer.points = record.points_remaining_after;
        Ok(true)
    }
}
