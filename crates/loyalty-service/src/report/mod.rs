//! 指标与历史聚合
//!
//! 纯读侧推导：输入客户集合、奖品目录与兑换记录，输出统计快照与时间窗口视图。
//! 本模块不访问后端，取数由 `service::ReportService` 负责。

mod aggregate;
mod window;

pub use aggregate::{
    MetricsSnapshot, customers_with_available_reward, records_in_range, reward_frequency,
    summarize,
};
pub use window::{DateRange, ReportWindow};
