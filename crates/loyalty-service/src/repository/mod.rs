//! 持久化后端访问层
//!
//! 核心逻辑只依赖 `LoyaltyBackend` 接口，具体存储可替换。
//!
//! ## 设计原则
//!
//! - 后端只负责数据持久化，不包含业务规则（积分截断、资格判断在服务层）
//! - `commit_redemption` 必须原子完成"余额比较并清零 + 追加记录"
//! - 定义 trait 接口以支持 mock 测试

mod memory;
mod postgres;
mod traits;

pub use memory::MemoryLoyaltyBackend;
pub use postgres::{MIGRATOR, PgLoyaltyBackend};
pub use traits::*;
