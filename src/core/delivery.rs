//! Delivery reconciliation - expected vs delivered meal counts per day.
//!
//! Expected counts are always derived from orders at read time: live orders for a
//! menu that still exists, archived snapshots for a retired week. Delivered counts
//! are entered by an administrator and stored per `(menu, day)` or, for retired
//! weeks, per `(week_start, day)`. An item without an entered count is reported as
//! `null`, never as zero.

use crate::{
    core::{menu, order, weekday::Weekday},
    entities::{
        ArchivedOrder, DeliveryRecord, archived_order,
        delivery_record::{self, DeliveredItem, DeliveredItems},
        weekly_order::DayOrder,
    },
    errors::{Error, Result},
};
use chrono::{NaiveDate, Utc};
use sea_orm::{QueryOrder, Select, Set, prelude::*};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info, instrument};

/// Which set of orders a reconciliation refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryKey {
    /// A menu that has not been retired
    Live { menu_id: i64 },
    /// A retired week, identified by its start date
    Archived { week_start: NaiveDate },
}

/// Ordered quantity of one meal on one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MealCount {
    pub meal_name: String,
    pub expected_count: u64,
}

/// One reconciliation line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationItem {
    pub meal_name: String,
    pub expected_count: u64,
    pub delivered_count: Option<u32>,
    /// `delivered - expected`, when a delivered count was entered
    pub diff: Option<i64>,
}

/// Reconciliation of one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayReconciliation {
    pub day: Weekday,
    pub items: Vec<ReconciliationItem>,
    pub total_expected: u64,
    /// Present only when every item has a delivered count
    pub total_delivered: Option<u64>,
    pub diff: Option<i64>,
}

fn sum_day<'a>(days: impl Iterator<Item = &'a DayOrder>, day: Weekday, counts: &mut BTreeMap<String, u64>) {
    for line in days.filter(|d| d.day == day).flat_map(|d| d.meals.iter()) {
        *counts.entry(line.meal_name.clone()).or_default() += u64::from(line.quantity);
    }
}

fn into_counts(counts: BTreeMap<String, u64>) -> Vec<MealCount> {
    counts
        .into_iter()
        .map(|(meal_name, expected_count)| MealCount {
            meal_name,
            expected_count,
        })
        .collect()
}

/// Sums ordered quantities per meal name for one day of a live menu.
///
/// Meal names are matched exactly. The result is sorted by name.
pub async fn expected_counts<C>(db: &C, menu_id: i64, day: Weekday) -> Result<Vec<MealCount>>
where
    C: ConnectionTrait,
{
    let orders = order::orders_for_menu(db, menu_id).await?;

    let mut counts = BTreeMap::new();
    for o in &orders {
        sum_day(o.days.0.iter(), day, &mut counts);
    }
    Ok(into_counts(counts))
}

/// Sums ordered quantities per meal name for one day of a retired week, read from
/// archived snapshots whose week bounds equal `week_start`/`week_end`.
pub async fn expected_counts_archived<C>(
    db: &C,
    week_start: NaiveDate,
    week_end: NaiveDate,
    day: Weekday,
) -> Result<Vec<MealCount>>
where
    C: ConnectionTrait,
{
    let archives = ArchivedOrder::find()
        .filter(archived_order::Column::WeekStart.eq(week_start))
        .filter(archived_order::Column::WeekEnd.eq(week_end))
        .all(db)
        .await?;

    let mut counts = BTreeMap::new();
    for snapshot in archives.iter().flat_map(|a| a.orders.0.iter()) {
        sum_day(snapshot.days.iter(), day, &mut counts);
    }
    Ok(into_counts(counts))
}

fn record_query(key: DeliveryKey, day: Weekday) -> Select<DeliveryRecord> {
    let query = DeliveryRecord::find().filter(delivery_record::Column::Day.eq(day.name()));
    match key {
        DeliveryKey::Live { menu_id } => query.filter(delivery_record::Column::MenuId.eq(menu_id)),
        DeliveryKey::Archived { week_start } => query
            .filter(delivery_record::Column::MenuId.is_null())
            .filter(delivery_record::Column::WeekStart.eq(week_start)),
    }
}

/// The last saved delivered counts for a key and day.
pub async fn delivered_for<C>(
    db: &C,
    key: DeliveryKey,
    day: Weekday,
) -> Result<Option<delivery_record::Model>>
where
    C: ConnectionTrait,
{
    record_query(key, day)
        .order_by_desc(delivery_record::Column::UpdatedAt)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Stores admin-entered delivered counts for a key and day, replacing any earlier save.
///
/// Repeated meal names keep the last value. A live key must name an existing menu.
#[instrument(skip(db, items))]
pub async fn record_delivered(
    db: &DatabaseConnection,
    key: DeliveryKey,
    day: Weekday,
    items: Vec<DeliveredItem>,
) -> Result<delivery_record::Model> {
    if let DeliveryKey::Live { menu_id } = key {
        menu::require_menu(db, menu_id).await?;
    }

    let mut merged: Vec<DeliveredItem> = Vec::with_capacity(items.len());
    for item in items {
        let name = item.meal_name.trim();
        if name.is_empty() {
            return Err(Error::validation("Meal name cannot be empty"));
        }
        match merged.iter_mut().find(|m| m.meal_name == name) {
            Some(existing) => existing.delivered_count = item.delivered_count,
            None => merged.push(DeliveredItem {
                meal_name: name.to_string(),
                delivered_count: item.delivered_count,
            }),
        }
    }

    let now = Utc::now();
    let saved = match delivered_for(db, key, day).await? {
        Some(existing) => {
            let mut active: delivery_record::ActiveModel = existing.into();
            active.items = Set(DeliveredItems(merged));
            active.updated_at = Set(now);
            active.update(db).await?
        }
        None => {
            let (menu_id, week_start) = match key {
                DeliveryKey::Live { menu_id } => (Some(menu_id), None),
                DeliveryKey::Archived { week_start } => (None, Some(week_start)),
            };
            delivery_record::ActiveModel {
                menu_id: Set(menu_id),
                week_start: Set(week_start),
                day: Set(day.name().to_string()),
                items: Set(DeliveredItems(merged)),
                updated_at: Set(now),
                ..Default::default()
            }
            .insert(db)
            .await?
        }
    };

    info!(?key, day = %day, "Delivered counts saved");
    Ok(saved)
}

/// `delivered - expected`, saturating at the `i64` bounds.
fn signed_diff(delivered: u64, expected: u64) -> i64 {
    let delivered = i64::try_from(delivered).unwrap_or(i64::MAX);
    let expected = i64::try_from(expected).unwrap_or(i64::MAX);
    delivered.saturating_sub(expected)
}

/// Merges expected and delivered counts for one day.
///
/// Meals that were delivered but never ordered appear with an expected count of 0.
/// The day totals are computed only when every item has a delivered count.
#[must_use]
pub fn reconcile(day: Weekday, expected: &[MealCount], delivered: &[DeliveredItem]) -> DayReconciliation {
    let mut rows: BTreeMap<&str, (u64, Option<u32>)> = BTreeMap::new();
    for count in expected {
        rows.insert(count.meal_name.as_str(), (count.expected_count, None));
    }
    for item in delivered {
        rows.entry(item.meal_name.as_str()).or_insert((0, None)).1 = item.delivered_count;
    }

    let items: Vec<ReconciliationItem> = rows
        .into_iter()
        .map(|(name, (expected_count, delivered_count))| ReconciliationItem {
            meal_name: name.to_string(),
            expected_count,
            delivered_count,
            diff: delivered_count.map(|d| signed_diff(u64::from(d), expected_count)),
        })
        .collect();

    let total_expected = items
        .iter()
        .fold(0_u64, |acc, i| acc.saturating_add(i.expected_count));
    let total_delivered = if items.is_empty() {
        None
    } else {
        items
            .iter()
            .map(|i| i.delivered_count.map(u64::from))
            .sum::<Option<u64>>()
    };

    DayReconciliation {
        day,
        diff: total_delivered.map(|d| signed_diff(d, total_expected)),
        items,
        total_expected,
        total_delivered,
    }
}

/// Reconciliation for one day of a live menu.
pub async fn live_day_report(
    db: &DatabaseConnection,
    menu_id: i64,
    day: Weekday,
) -> Result<DayReconciliation> {
    let expected = expected_counts(db, menu_id, day).await?;
    let delivered = delivered_for(db, DeliveryKey::Live { menu_id }, day).await?;
    Ok(reconcile(
        day,
        &expected,
        delivered.as_ref().map_or(&[], |r| r.items.0.as_slice()),
    ))
}

/// Reconciliation for all five days of a live menu.
pub async fn live_week_report(db: &DatabaseConnection, menu_id: i64) -> Result<Vec<DayReconciliation>> {
    menu::require_menu(db, menu_id).await?;

    let mut report = Vec::with_capacity(Weekday::ALL.len());
    for day in Weekday::ALL {
        report.push(live_day_report(db, menu_id, day).await?);
    }
    debug!(menu_id, "Built live reconciliation");
    Ok(report)
}

/// Reconciliation for one day of a retired week.
pub async fn archived_day_report(
    db: &DatabaseConnection,
    week_start: NaiveDate,
    week_end: NaiveDate,
    day: Weekday,
) -> Result<DayReconciliation> {
    let expected = expected_counts_archived(db, week_start, week_end, day).await?;
    let delivered = delivered_for(db, DeliveryKey::Archived { week_start }, day).await?;
    Ok(reconcile(
        day,
        &expected,
        delivered.as_ref().map_or(&[], |r| r.items.0.as_slice()),
    ))
}

/// Reconciliation for all five days of a retired week.
pub async fn archived_week_report(
    db: &DatabaseConnection,
    week_start: NaiveDate,
    week_end: NaiveDate,
) -> Result<Vec<DayReconciliation>> {
    if week_end < week_start {
        return Err(Error::validation("weekEnd must not be before weekStart"));
    }

    let mut report = Vec::with_capacity(Weekday::ALL.len());
    for day in Weekday::ALL {
        report.push(archived_day_report(db, week_start, week_end, day).await?);
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::{archive, order::submit_order_at, user::Role};
    use crate::test_utils::*;

    fn delivered(name: &str, count: Option<u32>) -> DeliveredItem {
        DeliveredItem {
            meal_name: name.to_string(),
            delivered_count: count,
        }
    }

    fn expected(name: &str, count: u64) -> MealCount {
        MealCount {
            meal_name: name.to_string(),
            expected_count: count,
        }
    }

    #[test]
    fn test_reconcile_diff_when_all_entered() {
        let report = reconcile(
            Weekday::Monday,
            &[expected("Супа", 10)],
            &[delivered("Супа", Some(7))],
        );
        assert_eq!(report.items[0].diff, Some(-3));
        assert_eq!(report.total_expected, 10);
        assert_eq!(report.total_delivered, Some(7));
        assert_eq!(report.diff, Some(-3));
    }

    #[test]
    fn test_reconcile_missing_entry_blanks_day_totals() {
        let report = reconcile(
            Weekday::Monday,
            &[expected("Супа", 10), expected("Пица", 4)],
            &[delivered("Супа", Some(10))],
        );
        let pizza = report.items.iter().find(|i| i.meal_name == "Пица").unwrap();
        assert_eq!(pizza.delivered_count, None);
        assert_eq!(pizza.diff, None);
        assert_eq!(report.total_expected, 14);
        assert_eq!(report.total_delivered, None);
        assert_eq!(report.diff, None);

        // Zero is a real value, not "unset"
        let zero = reconcile(Weekday::Monday, &[expected("Супа", 2)], &[delivered("Супа", Some(0))]);
        assert_eq!(zero.diff, Some(-2));
    }

    #[test]
    fn test_reconcile_includes_unordered_deliveries() {
        let report = reconcile(Weekday::Friday, &[], &[delivered("Хляб", Some(3))]);
        assert_eq!(report.items.len(), 1);
        assert_eq!(report.items[0].expected_count, 0);
        assert_eq!(report.diff, Some(3));

        let empty = reconcile(Weekday::Friday, &[], &[]);
        assert!(empty.items.is_empty());
        assert_eq!(empty.total_delivered, None);
    }

    #[tokio::test]
    async fn test_expected_counts_two_students() -> Result<()> {
        let db = setup_test_db().await?;
        let menu = create_test_menu(&db).await?;
        for email in ["et.a@eduiteh.eu", "et.b@eduiteh.eu"] {
            let student = create_test_user(&db, email, email, Role::Student).await?;
            submit_order_at(
                &db,
                student.id,
                None,
                &selection(&[("Понеделник", "Супа", 1)]),
                before_deadline(),
            )
            .await?;
        }

        let counts = expected_counts(&db, menu.id, Weekday::Monday).await?;
        assert_eq!(counts, vec![expected("Супа", 2)]);
        assert!(expected_counts(&db, menu.id, Weekday::Tuesday).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_expected_counts_exceed_u32() -> Result<()> {
        use crate::entities::weekly_order::{self, LineItem, OrderDays};

        let db = setup_test_db().await?;
        let menu = create_test_menu(&db).await?;
        for (email, quantity) in [("et.a@eduiteh.eu", u32::MAX), ("et.b@eduiteh.eu", 1)] {
            let student = create_test_user(&db, email, email, Role::Student).await?;
            weekly_order::ActiveModel {
                user_id: Set(student.id),
                menu_id: Set(menu.id),
                days: Set(OrderDays(vec![DayOrder {
                    day: Weekday::Monday,
                    meals: vec![LineItem {
                        meal_name: "Супа".to_string(),
                        quantity,
                        price: 2.0,
                    }],
                    order_got: false,
                }])),
                total_price: Set(2.0),
                paid: Set(false),
                approved_by: Set(None),
                created_at: Set(before_deadline()),
                ..Default::default()
            }
            .insert(&db)
            .await?;
        }

        let counts = expected_counts(&db, menu.id, Weekday::Monday).await?;
        assert_eq!(counts, vec![expected("Супа", u64::from(u32::MAX) + 1)]);

        let report = reconcile(Weekday::Monday, &counts, &[delivered("Супа", Some(u32::MAX))]);
        assert_eq!(report.items[0].diff, Some(-1));
        assert_eq!(report.total_delivered, Some(u64::from(u32::MAX)));
        assert_eq!(report.diff, Some(-1));
        Ok(())
    }

    #[tokio::test]
    async fn test_record_delivered_is_last_write_wins() -> Result<()> {
        let db = setup_test_db().await?;
        let (_, live) = create_test_order(&db, "et.a@eduiteh.eu", "Ана").await?;
        let key = DeliveryKey::Live {
            menu_id: live.menu_id,
        };

        let before = expected_counts(&db, live.menu_id, Weekday::Monday).await?;
        let items = vec![delivered("Супа", Some(1)), delivered("Кюфтета", None)];
        let first = record_delivered(&db, key, Weekday::Monday, items.clone()).await?;
        let second = record_delivered(&db, key, Weekday::Monday, items).await?;

        assert_eq!(first.id, second.id);
        assert_eq!(first.items, second.items);
        assert_eq!(expected_counts(&db, live.menu_id, Weekday::Monday).await?, before);

        let report = live_day_report(&db, live.menu_id, Weekday::Monday).await?;
        assert_eq!(report.total_delivered, None);

        record_delivered(
            &db,
            key,
            Weekday::Monday,
            vec![delivered("Супа", Some(1)), delivered("Кюфтета", Some(0))],
        )
        .await?;
        let report = live_day_report(&db, live.menu_id, Weekday::Monday).await?;
        assert_eq!(report.total_delivered, Some(1));
        assert_eq!(report.diff, Some(-1));

        assert!(matches!(
            record_delivered(&db, DeliveryKey::Live { menu_id: 999 }, Weekday::Monday, vec![])
                .await,
            Err(Error::NotFound { .. })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_archived_reconciliation_survives_retirement() -> Result<()> {
        let db = setup_test_db().await?;
        let (_, live) = create_test_order(&db, "et.a@eduiteh.eu", "Ана").await?;
        let menu = menu::require_menu(&db, live.menu_id).await?;

        record_delivered(
            &db,
            DeliveryKey::Live { menu_id: menu.id },
            Weekday::Monday,
            vec![delivered("Супа", Some(1)), delivered("Кюфтета", Some(1))],
        )
        .await?;

        archive::retire_menu(&db, menu.id, false).await?;

        let week = archived_week_report(&db, menu.week_start, menu.week_end).await?;
        assert_eq!(week.len(), 5);
        let monday = &week[0];
        assert_eq!(monday.day, Weekday::Monday);
        assert_eq!(monday.total_expected, 2);
        assert_eq!(monday.total_delivered, Some(2));
        assert_eq!(monday.diff, Some(0));
        assert!(week[1].items.is_empty());

        // A different week end does not match
        let other_end = menu.week_end.succ_opt().unwrap();
        assert!(
            expected_counts_archived(&db, menu.week_start, other_end, Weekday::Monday)
                .await?
                .is_empty()
        );
        Ok(())
    }
}
