//! 服务层
//!
//! 实现积分业务逻辑，所有后端访问都经过 `BackendPolicy`。
//!
//! ## 模块结构
//!
//! - `catalog_service`: 奖品目录维护
//! - `ledger_service`: 客户注册与积分调整
//! - `redemption_service`: 奖品兑换
//! - `report_service`: 指标与兑换历史
//! - `state`: 服务门面与整体快照
//! - `prompt`: 兑换前的奖品选择交互

mod catalog_service;
pub mod dto;
mod ledger_service;
mod policy;
mod prompt;
mod redemption_service;
mod report_service;
mod state;

pub use catalog_service::CatalogService;
pub use dto::*;
pub use ledger_service::LedgerService;
pub use policy::BackendPolicy;
#[cfg(test)]
pub use prompt::MockRewardPrompt;
pub use prompt::{ChannelPrompt, RewardPrompt, SelectionRequest};
pub use redemption_service::RedemptionService;
pub use report_service::ReportService;
pub use state::LoyaltyService;
