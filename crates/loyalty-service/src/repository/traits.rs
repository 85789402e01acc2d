//! 后端接口定义
//!
//! 与具体存储技术无关的数据访问操作，服务层依赖抽象而非实现，支持 mock 测试。

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Customer, NewCustomer, RedemptionRecord, Reward};
use crate::report::DateRange;

/// 积分后端接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LoyaltyBackend: Send + Sync {
    // 客户

    /// 新建客户，积分初始化为 0；邮箱已存在时返回 `DuplicateEmail`
    async fn insert_customer(&self, customer: &NewCustomer) -> Result<Customer>;
    async fn select_customer_by_email(&self, email: &str) -> Result<Option<Customer>>;
    async fn select_customer_by_id(&self, id: i64) -> Result<Option<Customer>>;
    /// 按注册时间倒序
    async fn select_all_customers(&self) -> Result<Vec<Customer>>;
    /// 直接覆盖余额，客户不存在时返回 None
    async fn update_customer_points(&self, id: i64, points: i64) -> Result<Option<Customer>>;
    /// 仅当当前余额等于 `expected` 时写入，返回是否写入
    async fn compare_and_set_points(&self, id: i64, expected: i64, points: i64) -> Result<bool>;
    /// 返回是否确实删除；不级联删除兑换记录
    async fn delete_customer(&self, id: i64) -> Result<bool>;

    // 奖品目录

    /// 尚未保存过目录时返回 None
    async fn get_reward_catalog(&self) -> Result<Option<Vec<Reward>>>;
    /// 整体覆盖目录快照
    async fn put_reward_catalog(&self, rewards: &[Reward]) -> Result<()>;

    // 兑换记录

    async fn insert_redemption_record(&self, record: &RedemptionRecord) -> Result<()>;
    /// 按兑换时间倒序，可选闭区间过滤
    async fn select_redemption_records(
        &self,
        range: Option<DateRange>,
    ) -> Result<Vec<RedemptionRecord>>;
    async fn select_redemption_by_idempotency_key(
        &self,
        idempotency_key: &str,
    ) -> Result<Option<RedemptionRecord>>;

    /// 原子提交一次兑换
    ///
    /// 余额仍等于 `expected_points` 时清零并追加记录，返回 true；
    /// 余额已变化返回 false，且不写入任何内容。
    async fn commit_redemption(
        &self,
        record: &RedemptionRecord,
        expected_points: i64,
    ) -> Result<bool>;
}
