//! 时间窗口
//!
//! 所有便捷窗口（本月、近 30 天、近 3 个月）都归结为一个闭区间 `DateRange`。
//! 按自然日筛选时，结束日包含到当天 23:59:59.999（营业地时区）。

use chrono::{DateTime, Datelike, Duration, FixedOffset, Months, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{LoyaltyError, Result};

/// 闭区间时间范围 `[start, end]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        if start > end {
            return Err(LoyaltyError::Validation(format!(
                "开始时间不能晚于结束时间: start={}, end={}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    /// 按营业地自然日构建范围：开始日 00:00:00.000 至结束日 23:59:59.999
    pub fn from_dates(start: NaiveDate, end: NaiveDate, offset: FixedOffset) -> Result<Self> {
        if start > end {
            return Err(LoyaltyError::Validation(format!(
                "开始日期不能晚于结束日期: start={}, end={}",
                start, end
            )));
        }

        let start_local = start
            .and_hms_milli_opt(0, 0, 0, 0)
            .and_then(|dt| offset.from_local_datetime(&dt).single())
            .ok_or_else(|| LoyaltyError::Validation(format!("无效的开始日期: {}", start)))?;
        let end_local = end
            .and_hms_milli_opt(23, 59, 59, 999)
            .and_then(|dt| offset.from_local_datetime(&dt).single())
            .ok_or_else(|| LoyaltyError::Validation(format!("无效的结束日期: {}", end)))?;

        Self::new(
            start_local.with_timezone(&Utc),
            end_local.with_timezone(&Utc),
        )
    }

    /// 单日范围
    pub fn single_day(day: NaiveDate, offset: FixedOffset) -> Result<Self> {
        Self::from_dates(day, day, offset)
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts <= self.end
    }
}

/// 报表时间窗口
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", tag = "type")]
pub enum ReportWindow {
    /// 全部历史
    All,
    /// 当前自然月（1 号至今天）
    CurrentMonth,
    /// 近 30 天（今天往前 30 天至今天）
    Last30Days,
    /// 近 3 个月（今天往前 3 个月至今天）
    LastThreeMonths,
    /// 自定义日期范围
    Custom { start: NaiveDate, end: NaiveDate },
}

impl ReportWindow {
    /// 解析为具体时间范围，`All` 返回 None
    pub fn range(&self, now: DateTime<Utc>, offset: FixedOffset) -> Result<Option<DateRange>> {
        let today = now.with_timezone(&offset).date_naive();

        let (start, end) = match *self {
            Self::All => return Ok(None),
            Self::CurrentMonth => {
                let first = today.with_day(1).ok_or_else(|| {
                    LoyaltyError::Internal(format!("无法计算月初: {}", today))
                })?;
                (first, today)
            }
            Self::Last30Days => (today - Duration::days(30), today),
            Self::LastThreeMonths => {
                let start = today.checked_sub_months(Months::new(3)).ok_or_else(|| {
                    LoyaltyError::Internal(format!("无法计算三个月前的日期: {}", today))
                })?;
                (start, today)
            }
            Self::Custom { start, end } => (start, end),
        };

        DateRange::from_dates(start, end, offset).map(Some)
    }
}
