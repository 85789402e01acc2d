//! 客户账本服务
//!
//! 负责注册、查找与积分调整。积分调整采用"读取 -> 计算 -> 比较写入"，
//! 余额在读取后被他人改动时返回 `ConcurrencyConflict`，不会静默覆盖。

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::error::{LoyaltyError, Result};
use crate::models::{Customer, NewCustomer};
use crate::repository::LoyaltyBackend;
use crate::service::BackendPolicy;
use crate::service::dto::RegistrationOutcome;

/// 客户账本服务
pub struct LedgerService {
    backend: Arc<dyn LoyaltyBackend>,
    policy: BackendPolicy,
    points_step: i64,
}

impl LedgerService {
    pub fn new(backend: Arc<dyn LoyaltyBackend>, policy: BackendPolicy, points_step: i64) -> Self {
        Self {
            backend,
            policy,
            points_step,
        }
    }

    /// 注册新客户，初始积分为 0
    #[instrument(skip(self))]
    pub async fn register(&self, name: &str, email: &str) -> Result<Customer> {
        let new_customer = NewCustomer::new(name, email)?;

        let customer = self
            .policy
            .write("insert_customer", || {
                self.backend.insert_customer(&new_customer)
            })
            .await?;

        metrics::counter!("loyalty_registrations_total", "result" => "created").increment(1);
        info!(customer_id = customer.id, "客户注册成功");

        Ok(customer)
    }

    /// 注册；邮箱已存在时返回已有客户
    #[instrument(skip(self))]
    pub async fn register_or_login(&self, name: &str, email: &str) -> Result<RegistrationOutcome> {
        match self.register(name, email).await {
            Ok(customer) => Ok(RegistrationOutcome {
                customer,
                returning: false,
            }),
            Err(LoyaltyError::DuplicateEmail(existing)) => {
                let customer = self.find_by_email(&existing).await?;
                metrics::counter!("loyalty_registrations_total", "result" => "returning")
                    .increment(1);
                info!(customer_id = customer.id, "邮箱已注册，返回已有客户");
                Ok(RegistrationOutcome {
                    customer,
                    returning: true,
                })
            }
            Err(e) => Err(e),
        }
    }

    /// 按邮箱查找（区分大小写的精确匹配）
    pub async fn find_by_email(&self, email: &str) -> Result<Customer> {
        let email = email.trim();
        self.policy
            .read("select_customer_by_email", || {
                self.backend.select_customer_by_email(email)
            })
            .await?
            .ok_or_else(|| LoyaltyError::CustomerEmailNotFound(email.to_string()))
    }

    pub async fn get(&self, customer_id: i64) -> Result<Customer> {
        self.policy
            .read("select_customer_by_id", || {
                self.backend.select_customer_by_id(customer_id)
            })
            .await?
            .ok_or(LoyaltyError::CustomerNotFound(customer_id))
    }

    /// 全部客户，按注册时间倒序
    pub async fn list_customers(&self) -> Result<Vec<Customer>> {
        self.policy
            .read("select_all_customers", || self.backend.select_all_customers())
            .await
    }

    /// 调整积分，结果在零处截断
    #[instrument(skip(self))]
    pub async fn adjust_points(&self, customer_id: i64, delta: i64) -> Result<Customer> {
        let mut customer = self.get(customer_id).await?;
        let new_points = customer.balance_after(delta);

        if new_points == customer.points {
            debug!(points = customer.points, "余额不变，跳过写入");
            return Ok(customer);
        }

        let written = self
            .policy
            .write("compare_and_set_points", || {
                self.backend
                    .compare_and_set_points(customer_id, customer.points, new_points)
            })
            .await?;

        if !written {
            warn!(expected = customer.points, "余额已被修改，放弃本次调整");
            return Err(LoyaltyError::ConcurrencyConflict);
        }

        metrics::counter!("loyalty_point_adjustments_total").increment(1);
        info!(from = customer.points, to = new_points, "积分已调整");

        customer.points = new_points;
        Ok(customer)
    }

    /// 按配置步长加分
    pub async fn step_up(&self, customer_id: i64) -> Result<Customer> {
        self.adjust_points(customer_id, self.points_step).await
    }

    /// 按配置步长减分，不低于 0
    pub async fn step_down(&self, customer_id: i64) -> Result<Customer> {
        self.adjust_points(customer_id, -self.points_step).await
    }

    /// 积分清零
    #[instrument(skip(self))]
    pub async fn reset_points(&self, customer_id: i64) -> Result<Customer> {
        let customer = self
            .policy
            .write("update_customer_points", || {
                self.backend.update_customer_points(customer_id, 0)
            })
            .await?
            .ok_or(LoyaltyError::CustomerNotFound(customer_id))?;

        metrics::counter!("loyalty_point_adjustments_total").increment(1);
        info!("积分已清零");

        Ok(customer)
    }

    /// 删除客户，兑换记录保留
    #[instrument(skip(self))]
    pub async fn delete(&self, customer_id: i64) -> Result<()> {
        let deleted = self
            .policy
            .write("delete_customer", || self.backend.delete_customer(customer_id))
            .await?;

        if !deleted {
            return Err(LoyaltyError::CustomerNotFound(customer_id));
        }

        info!("客户已删除");
        Ok(())
    }
}
