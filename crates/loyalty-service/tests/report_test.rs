//! 报表集成测试
//!
//! 直接向内存后端写入带时间戳的兑换记录，验证时间窗口与统计结果。

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use loyalty::report::{ReportWindow, reward_frequency};
use loyalty::repository::LoyaltyBackend;
use loyalty::{LoyaltyService, MemoryLoyaltyBackend, NewCustomer, RedemptionRecord, Reward};
use loyalty_shared::config::AppConfig;
use tokio_test::assert_ok;
use uuid::Uuid;

// ==================== 辅助函数 ====================

fn record(reward_name: &str, redeemed_at: DateTime<Utc>) -> RedemptionRecord {
    RedemptionRecord {
        id: Uuid::now_v7(),
        customer_id: 1,
        customer_name: "Ana".to_string(),
        reward_id: 1,
        reward_name: reward_name.to_string(),
        points_spent: 50,
        points_before: 50,
        points_remaining_after: 0,
        idempotency_key: Uuid::new_v4().to_string(),
        redeemed_at,
    }
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

async fn setup(
    records: Vec<RedemptionRecord>,
    config: &AppConfig,
) -> (Arc<MemoryLoyaltyBackend>, LoyaltyService) {
    let backend = Arc::new(MemoryLoyaltyBackend::new());
    for r in &records {
        assert_ok!(backend.insert_redemption_record(r).await);
    }
    let service = LoyaltyService::new(backend.clone(), config);
    (backend, service)
}

// ==================== 测试 ====================

#[tokio::test]
async fn test_single_day_includes_last_second() {
    let day = Utc.with_ymd_and_hms(2025, 3, 14, 0, 0, 0).unwrap();
    let (_, service) = setup(
        vec![
            record("Taco", day + Duration::hours(23) + Duration::minutes(59) + Duration::seconds(59)),
            record("Drink", day),
            record("Meal", day + Duration::days(1)),
            record("Meal", day - Duration::seconds(1)),
        ],
        &AppConfig::default(),
    )
    .await;

    let records = assert_ok!(
        service
            .reports()
            .records_in_range(date(2025, 3, 14), date(2025, 3, 14))
            .await
    );
    let names: Vec<&str> = records.iter().map(|r| r.reward_name.as_str()).collect();
    // 最新在前
    assert_eq!(names, vec!["Taco", "Drink"]);
}

#[tokio::test]
async fn test_business_offset_shifts_day_boundary() {
    let mut config = AppConfig::default();
    config.ledger.utc_offset_minutes = -360;

    // 本地 3 月 14 日 22:00 (UTC-6) = UTC 3 月 15 日 04:00
    let late_local = Utc.with_ymd_and_hms(2025, 3, 15, 4, 0, 0).unwrap();
    let (_, service) = setup(vec![record("Taco", late_local)], &config).await;

    let on_14th = assert_ok!(
        service
            .reports()
            .records_in_range(date(2025, 3, 14), date(2025, 3, 14))
            .await
    );
    assert_eq!(on_14th.len(), 1);

    let on_15th = assert_ok!(
        service
            .reports()
            .records_in_range(date(2025, 3, 15), date(2025, 3, 15))
            .await
    );
    assert!(on_15th.is_empty());
}

#[tokio::test]
async fn test_taco_drink_frequency() {
    let now = Utc::now();
    let records = vec![
        record("Taco", now - Duration::minutes(3)),
        record("Taco", now - Duration::minutes(2)),
        record("Drink", now - Duration::minutes(1)),
    ];
    assert_eq!(
        reward_frequency(&records),
        vec![("Taco".to_string(), 2), ("Drink".to_string(), 1)]
    );

    let (_, service) = setup(records, &AppConfig::default()).await;
    let snapshot = assert_ok!(service.reports().snapshot().await);
    assert_eq!(snapshot.total_redemptions, 3);
    assert_eq!(
        snapshot.reward_frequency,
        vec![("Taco".to_string(), 2), ("Drink".to_string(), 1)]
    );
    assert_eq!(snapshot.recent_redemptions[0].reward_name, "Drink");
}

#[tokio::test]
async fn test_windows_filter_by_age() {
    let now = Utc::now();
    let (_, service) = setup(
        vec![
            record("recent", now - Duration::days(1)),
            record("two-months", now - Duration::days(60)),
            record("ancient", now - Duration::days(400)),
        ],
        &AppConfig::default(),
    )
    .await;

    let last30 = assert_ok!(service.reports().records(ReportWindow::Last30Days).await);
    assert_eq!(last30.len(), 1);
    assert_eq!(last30[0].reward_name, "recent");

    let quarter = assert_ok!(
        service
            .reports()
            .records(ReportWindow::LastThreeMonths)
            .await
    );
    assert_eq!(quarter.len(), 2);

    let all = assert_ok!(service.reports().records(ReportWindow::All).await);
    assert_eq!(all.len(), 3);
}

#[tokio::test]
async fn test_snapshot_counts_customers_and_points() {
    let (backend, service) = setup(Vec::new(), &AppConfig::default()).await;
    assert_ok!(
        backend
            .put_reward_catalog(&[Reward {
                id: 1,
                name: "Taco".to_string(),
                icon: "🌮".to_string(),
                points_required: 50,
                description: None,
                premium: false,
            }])
            .await
    );

    for (i, points) in [10, 50, 75].into_iter().enumerate() {
        let new = NewCustomer::new("Cliente", &format!("c{}@x.com", i)).unwrap();
        let customer = assert_ok!(backend.insert_customer(&new).await);
        assert_ok!(backend.update_customer_points(customer.id, points).await);
    }

    let snapshot = assert_ok!(service.reports().snapshot().await);
    assert_eq!(snapshot.total_customers, 3);
    assert_eq!(snapshot.total_points_in_system, 135);
    assert_eq!(snapshot.customers_with_available_reward, 2);
    assert!(snapshot.first_redemption_at.is_none());
}
