//! 积分与奖品账本服务
//!
//! 为单店会员积分提供核心账本逻辑：客户注册与积分、奖品目录、
//! 兑换执行与历史统计。界面渲染、导出格式与认证不在本 crate 内。
//!
//! ## 核心功能
//!
//! - **奖品目录**：有序的奖品定义，编辑时整体写回
//! - **客户账本**：注册、按邮箱查找、积分调整（零处截断）
//! - **奖品兑换**：资格判断、执行时重新校验、清空余额并追加记录
//! - **统计报表**：指标快照、奖品兑换频次、按自然日筛选历史
//!
//! ## 模块结构
//!
//! - `models`: 领域模型定义
//! - `error`: 错误类型定义
//! - `repository`: 持久化后端接口与实现
//! - `service`: 业务服务层
//! - `lock`: 客户级互斥锁
//! - `report`: 统计推导（纯函数）

pub mod error;
pub mod lock;
pub mod models;
pub mod report;
pub mod repository;
pub mod service;

pub use error::{LoyaltyError, Result};
pub use lock::{CustomerLockGuard, CustomerLockManager, LockConfig};
pub use models::*;
pub use report::{DateRange, MetricsSnapshot, ReportWindow};
pub use repository::{LoyaltyBackend, MemoryLoyaltyBackend, PgLoyaltyBackend};
pub use service::{
    BackendPolicy, CatalogService, ChannelPrompt, LedgerService, LoyaltyService,
    RedemptionService, ReportService, RewardPrompt, dto,
};
