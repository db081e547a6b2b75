//! Archive business logic - Moving orders out of the live ledger.
//!
//! Two paths write archive snapshots:
//! - [`delete_order`] removes one order and archives it alone.
//! - [`retire_menu`] archives every order of a menu, one snapshot per user
//!   bundling all of that user's orders, and then deletes the menu.
//!
//! Both paths write an unpaid-ledger entry when the archived orders carry an
//! outstanding balance. Snapshots are append-only apart from the per-day
//! "received" flag, which annotates delivery.

use crate::{
    core::{export, menu, order, user as user_core, weekday::Weekday},
    entities::{
        ArchivedOrder, DeliveryRecord, Menu, User, WeeklyOrder,
        archived_order::{self, OrderSnapshot, OrderSnapshots},
        delivery_record, menu as menu_entity, unpaid_record, user, weekly_order,
    },
    errors::{Error, Result},
};
use chrono::{NaiveDate, Utc};
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*, sea_query::Expr};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{info, instrument, warn};

/// Result of deleting a single live order.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDeletion {
    pub archived: archived_order::Model,
    pub unpaid: Option<unpaid_record::Model>,
}

/// Result of retiring a menu.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetirementSummary {
    pub menu_id: i64,
    pub week: String,
    /// Users whose orders were archived
    pub archived_users: usize,
    pub unpaid_records: usize,
    /// Users whose archival failed; their live orders are left in place
    pub failed_users: Vec<i64>,
    #[serde(skip)]
    pub csv: Option<String>,
}

/// A user together with their archived snapshots.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserArchives {
    pub user: user::Model,
    pub archives: Vec<archived_order::Model>,
}

/// Week bounds and label that an archive entry is filed under.
struct ArchiveWeek {
    menu_id: i64,
    week_start: NaiveDate,
    week_end: NaiveDate,
    label: String,
}

impl From<&menu_entity::Model> for ArchiveWeek {
    fn from(menu: &menu_entity::Model) -> Self {
        Self {
            menu_id: menu.id,
            week_start: menu.week_start,
            week_end: menu.week_end,
            label: menu::week_label(menu.week_start, menu.week_end),
        }
    }
}

/// Writes one archive snapshot plus, when `unpaid_total` is positive, an unpaid record.
async fn write_archive<C>(
    db: &C,
    owner: &user::Model,
    week: &ArchiveWeek,
    orders: &[weekly_order::Model],
) -> Result<(archived_order::Model, Option<unpaid_record::Model>)>
where
    C: ConnectionTrait,
{
    let now = Utc::now();
    let total = order::round_currency(orders.iter().map(|o| o.total_price).sum());
    let unpaid_total = order::round_currency(
        orders
            .iter()
            .filter(|o| !o.paid)
            .map(|o| o.total_price)
            .sum(),
    );

    let unpaid = if unpaid_total > 0.0 {
        let record = unpaid_record::ActiveModel {
            name: Set(owner.full_name.clone()),
            grade: Set(owner.grade.clone().unwrap_or_default()),
            total: Set(unpaid_total),
            week: Set(week.label.clone()),
            user_id: Set(Some(owner.id)),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await?;
        Some(record)
    } else {
        None
    };

    let archived = archived_order::ActiveModel {
        user_id: Set(owner.id),
        menu_id: Set(week.menu_id),
        week_start: Set(week.week_start),
        week_end: Set(week.week_end),
        user_email: Set(owner.email.clone()),
        user_full_name: Set(owner.full_name.clone()),
        user_grade: Set(owner.grade.clone()),
        orders: Set(OrderSnapshots(orders.iter().map(OrderSnapshot::from).collect())),
        total: Set(total),
        archived_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    Ok((archived, unpaid))
}

/// Deletes one live order, archiving it and recording any unpaid balance.
///
/// The week label comes from `menu_id` when given, otherwise from the order's own
/// menu. An explicit menu that does not exist is `NotFound`. If the order's own
/// menu is gone, the order's creation date stands in for both week bounds.
/// Archive, unpaid record, and removal commit together.
#[instrument(skip(db))]
pub async fn delete_order(
    db: &DatabaseConnection,
    user_id: i64,
    order_id: i64,
    menu_id: Option<i64>,
) -> Result<OrderDeletion> {
    let txn = db.begin().await?;

    let live = order::require_user_order(&txn, user_id, order_id).await?;
    let owner = user_core::require_user(&txn, user_id).await?;

    let week = match menu_id {
        Some(id) => ArchiveWeek::from(&menu::require_menu(&txn, id).await?),
        None => match menu::get_menu_by_id(&txn, live.menu_id).await? {
            Some(m) => ArchiveWeek::from(&m),
            None => {
                let date = live.created_at.date_naive();
                ArchiveWeek {
                    menu_id: live.menu_id,
                    week_start: date,
                    week_end: date,
                    label: format!("menu {}", live.menu_id),
                }
            }
        },
    };

    let (archived, unpaid) = write_archive(&txn, &owner, &week, std::slice::from_ref(&live)).await?;
    WeeklyOrder::delete_by_id(live.id).exec(&txn).await?;

    txn.commit().await?;

    info!(
        order_id,
        user_id,
        unpaid = unpaid.is_some(),
        "Order deleted and archived"
    );
    Ok(OrderDeletion { archived, unpaid })
}

/// Archives one user's orders for a retiring menu in its own transaction.
/// Returns whether an unpaid record was written.
async fn archive_user_orders(
    db: &DatabaseConnection,
    user_id: i64,
    week: &ArchiveWeek,
    orders: &[weekly_order::Model],
) -> Result<bool> {
    let txn = db.begin().await?;

    let owner = user_core::require_user(&txn, user_id).await?;
    let (_, unpaid) = write_archive(&txn, &owner, week, orders).await?;

    WeeklyOrder::delete_many()
        .filter(weekly_order::Column::UserId.eq(user_id))
        .filter(weekly_order::Column::MenuId.eq(week.menu_id))
        .exec(&txn)
        .await?;

    txn.commit().await?;
    Ok(unpaid.is_some())
}

/// Retires a menu: archives its orders per user, then deletes the menu.
///
/// Each user is archived in a separate transaction. A failure for one user is
/// logged and reported in [`RetirementSummary::failed_users`] without stopping
/// the others. Once every user has been attempted, the menu's delivery records
/// are re-keyed by its week start, the active-menu pointer is cleared if it
/// pointed here, and the menu is deleted. Orders of failed users stay live
/// and can be removed later with [`delete_order`].
///
/// When `want_csv` is set, the CSV projection is taken before anything changes.
#[instrument(skip(db))]
pub async fn retire_menu(
    db: &DatabaseConnection,
    menu_id: i64,
    want_csv: bool,
) -> Result<RetirementSummary> {
    let retiring = menu::require_menu(db, menu_id).await?;
    let week = ArchiveWeek::from(&retiring);

    let csv = if want_csv {
        Some(export::render_csv(&export::live_rows(db, menu_id).await?))
    } else {
        None
    };

    let mut by_user: BTreeMap<i64, Vec<weekly_order::Model>> = BTreeMap::new();
    for o in order::orders_for_menu(db, menu_id).await? {
        by_user.entry(o.user_id).or_default().push(o);
    }

    let mut archived_users = 0;
    let mut unpaid_records = 0;
    let mut failed_users = Vec::new();

    for (user_id, orders) in &by_user {
        match archive_user_orders(db, *user_id, &week, orders).await {
            Ok(wrote_unpaid) => {
                archived_users += 1;
                if wrote_unpaid {
                    unpaid_records += 1;
                }
            }
            Err(e) => {
                warn!(user_id, menu_id, error = %e, "Failed to archive user orders");
                failed_users.push(*user_id);
            }
        }
    }

    let txn = db.begin().await?;

    DeliveryRecord::update_many()
        .col_expr(delivery_record::Column::MenuId, Expr::value(Option::<i64>::None))
        .col_expr(
            delivery_record::Column::WeekStart,
            Expr::value(Some(retiring.week_start)),
        )
        .filter(delivery_record::Column::MenuId.eq(menu_id))
        .exec(&txn)
        .await?;

    menu::clear_active_menu_if(&txn, menu_id).await?;
    Menu::delete_by_id(menu_id).exec(&txn).await?;

    txn.commit().await?;

    info!(
        menu_id,
        archived_users,
        unpaid_records,
        failed = failed_users.len(),
        "Menu retired"
    );

    Ok(RetirementSummary {
        menu_id,
        week: week.label,
        archived_users,
        unpaid_records,
        failed_users,
        csv,
    })
}

/// Users with at least one archived snapshot, with their snapshots newest first.
pub async fn list_users_with_archives(db: &DatabaseConnection) -> Result<Vec<UserArchives>> {
    let users = User::find()
        .order_by_asc(user::Column::FullName)
        .find_with_related(ArchivedOrder)
        .order_by_desc(archived_order::Column::WeekStart)
        .all(db)
        .await?;

    Ok(users
        .into_iter()
        .filter(|(_, archives)| !archives.is_empty())
        .map(|(user, archives)| UserArchives { user, archives })
        .collect())
}

/// The caller's archived snapshots, optionally limited to weeks starting within
/// `[from, to]`, newest first.
pub async fn archived_orders_for_user(
    db: &DatabaseConnection,
    user_id: i64,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> Result<Vec<archived_order::Model>> {
    let mut query = ArchivedOrder::find().filter(archived_order::Column::UserId.eq(user_id));
    if let Some(from) = from {
        query = query.filter(archived_order::Column::WeekStart.gte(from));
    }
    if let Some(to) = to {
        query = query.filter(archived_order::Column::WeekStart.lte(to));
    }

    query
        .order_by_desc(archived_order::Column::WeekStart)
        .order_by_desc(archived_order::Column::ArchivedAt)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Removes one archived snapshot.
pub async fn delete_archived_order(db: &DatabaseConnection, archived_id: i64) -> Result<()> {
    let result = ArchivedOrder::delete_by_id(archived_id).exec(db).await?;
    if result.rows_affected == 0 {
        return Err(Error::not_found("Archived order", archived_id));
    }
    info!(archived_id, "Archived order deleted");
    Ok(())
}

/// Sets the "received" flag for one day of one order inside a snapshot.
///
/// `order_index` selects the order within the snapshot and defaults to the first.
pub async fn set_archived_day_received(
    db: &DatabaseConnection,
    user_id: i64,
    archived_id: i64,
    order_index: Option<usize>,
    day: Weekday,
    received: bool,
) -> Result<archived_order::Model> {
    let archived = ArchivedOrder::find_by_id(archived_id)
        .filter(archived_order::Column::UserId.eq(user_id))
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("Archived order", archived_id))?;

    let index = order_index.unwrap_or(0);
    let mut orders = archived.orders.clone();
    let snapshot = orders
        .0
        .get_mut(index)
        .ok_or_else(|| Error::not_found("Archived order entry", index))?;
    let day_order = snapshot
        .days
        .iter_mut()
        .find(|d| d.day == day)
        .ok_or_else(|| Error::not_found("Order day", day))?;
    day_order.order_got = received;

    let mut active: archived_order::ActiveModel = archived.into();
    active.orders = Set(orders);
    active.update(db).await.map_err(Into::into)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::core::{order::submit_order_at, unpaid, user::Role};
    use crate::test_utils::*;

    #[tokio::test]
    async fn test_delete_unpaid_order_creates_unpaid_record() -> Result<()> {
        let db = setup_test_db().await?;
        let (student, live) = create_test_order(&db, "et.x@eduiteh.eu", "Х").await?;
        user_core::set_grade(&db, student.id, "10а").await?;

        let outcome = delete_order(&db, student.id, live.id, None).await?;

        let record = outcome.unpaid.unwrap();
        assert_eq!(record.name, "Х");
        assert_eq!(record.grade, "10а");
        assert_eq!(record.total, 5.5);
        assert_eq!(record.week, "2024-01-01 - 2024-01-05");
        assert_eq!(record.user_id, Some(student.id));

        assert_eq!(outcome.archived.orders.0.len(), 1);
        assert_eq!(outcome.archived.orders.0[0].id, live.id);
        assert!(order::orders_for_user(&db, student.id).await?.is_empty());
        assert_eq!(unpaid::list_unpaid(&db).await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_paid_order_skips_unpaid_record() -> Result<()> {
        let db = setup_test_db().await?;
        let admin = create_test_user(&db, "cook@eduiteh.eu", "Cook", Role::Admin).await?;
        let (student, live) = create_test_order(&db, "et.x@eduiteh.eu", "Х").await?;
        order::mark_paid(&db, admin.id, student.id, live.id).await?;

        let outcome = delete_order(&db, student.id, live.id, None).await?;
        assert!(outcome.unpaid.is_none());
        assert!(outcome.archived.orders.0[0].paid);
        assert!(unpaid::list_unpaid(&db).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_order_with_missing_explicit_menu_changes_nothing() -> Result<()> {
        let db = setup_test_db().await?;
        let (student, live) = create_test_order(&db, "et.x@eduiteh.eu", "Х").await?;

        assert!(matches!(
            delete_order(&db, student.id, live.id, Some(999)).await,
            Err(Error::NotFound { .. })
        ));
        assert_eq!(order::orders_for_user(&db, student.id).await?.len(), 1);
        assert!(unpaid::list_unpaid(&db).await?.is_empty());
        assert!(archived_orders_for_user(&db, student.id, None, None).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_retire_menu_round_trip() -> Result<()> {
        let db = setup_test_db().await?;
        let admin = create_test_user(&db, "cook@eduiteh.eu", "Cook", Role::Admin).await?;
        let (a, order_a) = create_test_order(&db, "et.a@eduiteh.eu", "Ана").await?;
        let b = create_test_user(&db, "et.b@eduiteh.eu", "Борис", Role::Student).await?;
        let order_b = submit_order_at(
            &db,
            b.id,
            None,
            &selection(&[("Петък", "Пица", 2)]),
            before_deadline(),
        )
        .await?;
        order::mark_paid(&db, admin.id, b.id, order_b.id).await?;

        let expected_total = order_a.total_price + order_b.total_price;
        let summary = retire_menu(&db, order_a.menu_id, true).await?;

        assert_eq!(summary.archived_users, 2);
        assert_eq!(summary.unpaid_records, 1);
        assert!(summary.failed_users.is_empty());
        assert!(summary.csv.unwrap().contains("Ана"));

        let mut archived_total = 0.0;
        for user_id in [a.id, b.id] {
            assert!(order::orders_for_user(&db, user_id).await?.is_empty());
            let archives = archived_orders_for_user(&db, user_id, None, None).await?;
            assert_eq!(archives.len(), 1);
            archived_total += archives[0].total;
        }
        assert_eq!(archived_total, expected_total);

        let unpaid = unpaid::list_unpaid(&db).await?;
        assert_eq!(unpaid.len(), 1);
        assert_eq!(unpaid[0].user_id, Some(a.id));

        assert!(menu::get_menu_by_id(&db, order_a.menu_id).await?.is_none());
        assert!(menu::get_current_menu(&db).await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_retire_menu_continues_past_failed_user() -> Result<()> {
        let db = setup_test_db().await?;
        let (a, order_a) = create_test_order(&db, "et.a@eduiteh.eu", "Ана").await?;
        let (b, order_b) = create_test_order(&db, "et.b@eduiteh.eu", "Борис").await?;
        let menu_id = order_a.menu_id;

        db.execute_unprepared(&format!(
            "CREATE TRIGGER block_archive BEFORE INSERT ON archived_orders \
             WHEN NEW.user_id = {} BEGIN SELECT RAISE(ABORT, 'archive blocked'); END",
            b.id
        ))
        .await?;

        let summary = retire_menu(&db, menu_id, false).await?;
        assert_eq!(summary.archived_users, 1);
        assert_eq!(summary.unpaid_records, 1);
        assert_eq!(summary.failed_users, vec![b.id]);

        // The menu goes even though one user could not be archived
        assert!(menu::get_menu_by_id(&db, menu_id).await?.is_none());
        assert!(menu::get_current_menu(&db).await?.is_none());

        assert!(order::orders_for_user(&db, a.id).await?.is_empty());
        assert_eq!(archived_orders_for_user(&db, a.id, None, None).await?.len(), 1);

        // B's transaction rolled back as a whole
        assert_eq!(order::orders_for_user(&db, b.id).await?.len(), 1);
        assert!(archived_orders_for_user(&db, b.id, None, None).await?.is_empty());
        let unpaid = unpaid::list_unpaid(&db).await?;
        assert_eq!(unpaid.len(), 1);
        assert_eq!(unpaid[0].user_id, Some(a.id));

        // The leftover order outlives its menu and can still be archived
        db.execute_unprepared("DROP TRIGGER block_archive").await?;
        let outcome = delete_order(&db, b.id, order_b.id, None).await?;
        assert_eq!(outcome.unpaid.unwrap().week, format!("menu {menu_id}"));
        let date = order_b.created_at.date_naive();
        assert_eq!(outcome.archived.week_start, date);
        assert_eq!(outcome.archived.week_end, date);
        assert!(order::orders_for_user(&db, b.id).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_retire_menu_without_orders() -> Result<()> {
        let db = setup_test_db().await?;
        let menu = create_test_menu(&db).await?;

        let summary = retire_menu(&db, menu.id, false).await?;
        assert_eq!(summary.archived_users, 0);
        assert!(summary.csv.is_none());
        assert!(matches!(
            retire_menu(&db, menu.id, false).await,
            Err(Error::NotFound { .. })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_archived_filters_and_receipt_toggle() -> Result<()> {
        let db = setup_test_db().await?;
        let (student, live) = create_test_order(&db, "et.a@eduiteh.eu", "Ана").await?;
        let outcome = delete_order(&db, student.id, live.id, None).await?;
        let archived_id = outcome.archived.id;

        let jan = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let feb = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        assert_eq!(
            archived_orders_for_user(&db, student.id, Some(jan), Some(jan)).await?.len(),
            1
        );
        assert!(archived_orders_for_user(&db, student.id, Some(feb), None).await?.is_empty());

        let updated =
            set_archived_day_received(&db, student.id, archived_id, None, Weekday::Monday, true)
                .await?;
        assert!(updated.orders.0[0].days[0].order_got);
        assert_eq!(updated.total, outcome.archived.total);

        assert!(matches!(
            set_archived_day_received(&db, student.id, archived_id, Some(3), Weekday::Monday, true)
                .await,
            Err(Error::NotFound { .. })
        ));
        assert!(matches!(
            set_archived_day_received(&db, student.id, archived_id, None, Weekday::Friday, true)
                .await,
            Err(Error::NotFound { .. })
        ));

        let listed = list_users_with_archives(&db).await?;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].archives.len(), 1);

        delete_archived_order(&db, archived_id).await?;
        assert!(matches!(
            delete_archived_order(&db, archived_id).await,
            Err(Error::NotFound { .. })
        ));
        assert!(list_users_with_archives(&db).await?.is_empty());
        Ok(())
    }
}
