//! PostgreSQL 后端
//!
//! 通过 sqlx 访问客户、奖品目录与兑换记录三张表。
//! 兑换提交在单个事务内完成余额比较清零与记录追加。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::migrate::Migrator;
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};
use tracing::{debug, instrument};

use super::traits::LoyaltyBackend;
use crate::error::{LoyaltyError, Result};
use crate::models::{Customer, NewCustomer, RedemptionRecord, Reward};
use crate::report::DateRange;

/// 本服务的数据库迁移
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

const CUSTOMER_COLUMNS: &str = "id, name, email, points, created_at";

const RECORD_COLUMNS: &str = r#"
    id, customer_id, customer_name, reward_id, reward_name,
    points_spent, points_before, points_remaining_after,
    idempotency_key, redeemed_at
"#;

/// PostgreSQL 后端
pub struct PgLoyaltyBackend {
    pool: PgPool,
}

impl PgLoyaltyBackend {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 在事务中追加兑换记录
    ///
    /// 幂等键冲突说明同一请求已被并发提交，返回 `ConcurrencyConflict`。
    async fn insert_record_in_tx(tx: &mut PgConnection, record: &RedemptionRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO redemption_records
                (id, customer_id, customer_name, reward_id, reward_name,
                 points_spent, points_before, points_remaining_after,
                 idempotency_key, redeemed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(record.id)
        .bind(record.customer_id)
        .bind(&record.customer_name)
        .bind(record.reward_id)
        .bind(&record.reward_name)
        .bind(record.points_spent)
        .bind(record.points_before)
        .bind(record.points_remaining_after)
        .bind(&record.idempotency_key)
        .bind(record.redeemed_at)
        .execute(tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                LoyaltyError::ConcurrencyConflict
            }
            other => LoyaltyError::from_sqlx(other),
        })?;

        Ok(())
    }
}

#[async_trait]
impl LoyaltyBackend for PgLoyaltyBackend {
    // ==================== 客户 ====================

    #[instrument(skip(self, customer), fields(email = %customer.email))]
    async fn insert_customer(&self, customer: &NewCustomer) -> Result<Customer> {
        let sql = format!(
            "INSERT INTO customers (name, email, points, created_at) \
             VALUES ($1, $2, 0, NOW()) RETURNING {}",
            CUSTOMER_COLUMNS
        );

        sqlx::query_as::<_, Customer>(&sql)
            .bind(&customer.name)
            .bind(&customer.email)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(db) if db.is_unique_violation() => {
                    LoyaltyError::DuplicateEmail(customer.email.clone())
                }
                other => LoyaltyError::from_sqlx(other),
            })
    }

    async fn select_customer_by_email(&self, email: &str) -> Result<Option<Customer>> {
        let sql = format!("SELECT {} FROM customers WHERE email = $1", CUSTOMER_COLUMNS);

        sqlx::query_as::<_, Customer>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(LoyaltyError::from_sqlx)
    }

    async fn select_customer_by_id(&self, id: i64) -> Result<Option<Customer>> {
        let sql = format!("SELECT {} FROM customers WHERE id = $1", CUSTOMER_COLUMNS);

        sqlx::query_as::<_, Customer>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(LoyaltyError::from_sqlx)
    }

    async fn select_all_customers(&self) -> Result<Vec<Customer>> {
        let sql = format!(
            "SELECT {} FROM customers ORDER BY created_at DESC, id DESC",
            CUSTOMER_COLUMNS
        );

        sqlx::query_as::<_, Customer>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(LoyaltyError::from_sqlx)
    }

    async fn update_customer_points(&self, id: i64, points: i64) -> Result<Option<Customer>> {
        let sql = format!(
            "UPDATE customers SET points = $2 WHERE id = $1 RETURNING {}",
            CUSTOMER_COLUMNS
        );

        sqlx::query_as::<_, Customer>(&sql)
            .bind(id)
            .bind(points)
            .fetch_optional(&self.pool)
            .await
            .map_err(LoyaltyError::from_sqlx)
    }

    async fn compare_and_set_points(&self, id: i64, expected: i64, points: i64) -> Result<bool> {
        let result = sqlx::query("UPDATE customers SET points = $3 WHERE id = $1 AND points = $2")
            .bind(id)
            .bind(expected)
            .bind(points)
            .execute(&self.pool)
            .await
            .map_err(LoyaltyError::from_sqlx)?;

        Ok(result.rows_affected() == 1)
    }

    async fn delete_customer(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM customers WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(LoyaltyError::from_sqlx)?;

        Ok(result.rows_affected() > 0)
    }

    // ==================== 奖品目录 ====================

    async fn get_reward_catalog(&self) -> Result<Option<Vec<Reward>>> {
        let catalog = sqlx::query_scalar::<_, Json<Vec<Reward>>>(
            "SELECT config FROM reward_catalog WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(LoyaltyError::from_sqlx)?;

        Ok(catalog.map(|Json(rewards)| rewards))
    }

    async fn put_reward_catalog(&self, rewards: &[Reward]) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO reward_catalog (id, config, updated_at)
            VALUES (1, $1, NOW())
            ON CONFLICT (id) DO UPDATE SET config = EXCLUDED.config, updated_at = NOW()
            "#,
        )
        .bind(Json(rewards))
        .execute(&self.pool)
        .await
        .map_err(LoyaltyError::from_sqlx)?;

        Ok(())
    }

    // ==================== 兑换记录 ====================

    async fn insert_redemption_record(&self, record: &RedemptionRecord) -> Result<()> {
        let mut conn = self.pool.acquire().await.map_err(LoyaltyError::from_sqlx)?;
        Self::insert_record_in_tx(&mut conn, record).await
    }

    async fn select_redemption_records(
        &self,
        range: Option<DateRange>,
    ) -> Result<Vec<RedemptionRecord>> {
        let sql = format!(
            r#"
            SELECT {}
            FROM redemption_records
            WHERE ($1::timestamptz IS NULL OR redeemed_at >= $1)
              AND ($2::timestamptz IS NULL OR redeemed_at <= $2)
            ORDER BY redeemed_at DESC, id DESC
            "#,
            RECORD_COLUMNS
        );

        let start: Option<DateTime<Utc>> = range.map(|r| r.start);
        let end: Option<DateTime<Utc>> = range.map(|r| r.end);

        sqlx::query_as::<_, RedemptionRecord>(&sql)
            .bind(start)
            .bind(end)
            .fetch_all(&self.pool)
            .await
            .map_err(LoyaltyError::from_sqlx)
    }

    async fn select_redemption_by_idempotency_key(
        &self,
        idempotency_key: &str,
    ) -> Result<Option<RedemptionRecord>> {
        let sql = format!(
            "SELECT {} FROM redemption_records WHERE idempotency_key = $1",
            RECORD_COLUMNS
        );

        sqlx::query_as::<_, RedemptionRecord>(&sql)
            .bind(idempotency_key)
            .fetch_optional(&self.pool)
            .await
            .map_err(LoyaltyError::from_sqlx)
    }

    /// 单事务：比较并清零余额 -> 追加记录 -> 提交
    #[instrument(skip(self, record), fields(customer_id = record.customer_id, idempotency_key = %record.idempotency_key))]
    async fn commit_redemption(
        &self,
        record: &RedemptionRecord,
        expected_points: i64,
    ) -> Result<bool> {
        let mut tx = self.pool.begin().await.map_err(LoyaltyError::from_sqlx)?;

        let updated = sqlx::query("UPDATE customers SET points = $3 WHERE id = $1 AND points = $2")
            .bind(record.customer_id)
            .bind(expected_points)
            .bind(record.points_remaining_after)
            .execute(&mut *tx)
            .await
            .map_err(LoyaltyError::from_sqlx)?;

        if updated.rows_affected() != 1 {
            debug!("余额已变化，放弃提交");
            tx.rollback().await.map_err(LoyaltyError::from_sqlx)?;
            return Ok(false);
        }

        Self::insert_record_in_tx(&mut tx, record).await?;
        tx.commit().await.map_err(LoyaltyError::from_sqlx)?;

        Ok(true)
    }
}
