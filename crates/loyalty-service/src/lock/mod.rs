//! 客户级互斥锁
//!
//! 同一客户的兑换在进程内串行执行，避免两次兑换读到同一余额。
//! 跨进程的正确性仍由后端的余额比较写入保证。
//!
//! ## 使用示例
//!
//! ```ignore
//! let locks = CustomerLockManager::new(LockConfig::default());
//!
//! let guard = locks.acquire(customer_id).await?;
//! // 读取余额、提交兑换
//! drop(guard);
//! ```

mod customer_lock;

pub use customer_lock::{CustomerLockGuard, CustomerLockManager, LockConfig};
