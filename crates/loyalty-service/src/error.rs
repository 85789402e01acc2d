//! 积分服务错误类型
//!
//! 定义服务层的业务错误和系统错误。所有操作都以 `Result` 返回，
//! 由调用方（界面层）决定如何向用户展示。

use thiserror::Error;

/// 积分服务错误类型
#[derive(Debug, Error)]
pub enum LoyaltyError {
    // === 输入校验 ===
    #[error("参数校验失败: {0}")]
    Validation(String),

    // === 客户相关错误 ===
    #[error("该邮箱已注册: {0}")]
    DuplicateEmail(String),

    #[error("客户不存在: {0}")]
    CustomerNotFound(i64),

    #[error("客户不存在: email={0}")]
    CustomerEmailNotFound(String),

    // === 奖品与兑换相关错误 ===
    #[error("奖品不存在: {0}")]
    RewardNotFound(i64),

    #[error("积分不足: 需要 {required}, 可用 {available}")]
    InsufficientPoints { required: i64, available: i64 },

    #[error("并发冲突，请刷新后重试")]
    ConcurrencyConflict,

    // === 系统错误 ===
    #[error("后端不可用: {0}")]
    BackendUnavailable(String),

    #[error("后端调用超时: operation={operation}, timeout_ms={timeout_ms}")]
    Timeout { operation: String, timeout_ms: u64 },

    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("JSON 序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("内部错误: {0}")]
    Internal(String),
}

/// 积分服务 Result 类型别名
pub type Result<T> = std::result::Result<T, LoyaltyError>;

impl LoyaltyError {
    /// 检查是否为可重试的错误
    ///
    /// 仅瞬时基础设施故障可重试；是否真的重试由调用路径决定（写操作从不自动重试）。
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::BackendUnavailable(_) | Self::Timeout { .. })
    }

    /// 检查是否为业务错误（非系统错误）
    pub fn is_business_error(&self) -> bool {
        !matches!(
            self,
            Self::BackendUnavailable(_)
                | Self::Timeout { .. }
                | Self::Database(_)
                | Self::Serialization(_)
                | Self::Internal(_)
        )
    }

    /// 是否为查找未命中
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::CustomerNotFound(_) | Self::CustomerEmailNotFound(_) | Self::RewardNotFound(_)
        )
    }

    /// 获取错误码（用于 API 响应）
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::DuplicateEmail(_) => "DUPLICATE_EMAIL",
            Self::CustomerNotFound(_) | Self::CustomerEmailNotFound(_) => "CUSTOMER_NOT_FOUND",
            Self::RewardNotFound(_) => "REWARD_NOT_FOUND",
            Self::InsufficientPoints { .. } => "INSUFFICIENT_POINTS",
            Self::ConcurrencyConflict => "CONCURRENCY_CONFLICT",
            Self::BackendUnavailable(_) => "BACKEND_UNAVAILABLE",
            Self::Timeout { .. } => "BACKEND_TIMEOUT",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// 将 sqlx 错误归类
    ///
    /// 连接类故障视为后端不可用，其余保留为数据库错误。
    pub fn from_sqlx(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                Self::BackendUnavailable(err.to_string())
            }
            other => Self::Database(other),
        }
    }
}
