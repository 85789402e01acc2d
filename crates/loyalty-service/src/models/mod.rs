//! 积分服务领域模型
//!
//! 包含客户、奖品目录与兑换记录的实体定义

pub mod customer;
pub mod redemption;
pub mod reward;

pub use customer::{Customer, NewCustomer};
pub use redemption::RedemptionRecord;
pub use reward::{Reward, RewardCatalog, RewardProgress, UpsertOutcome};
