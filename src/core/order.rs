//! Order ledger business logic - Submission, payment, and per-day receipt flags.
//!
//! A user holds at most one live weekly order per menu. The constraint is enforced
//! by a unique index on `(user_id, menu_id)`, so two concurrent submissions cannot
//! both succeed. Every line item is priced from the stored menu; the client only
//! chooses meals and quantities. An order's `total_price` is fixed at submission
//! time and never recomputed.

use crate::{
    core::{menu, weekday::Weekday},
    entities::{
        TopMeal, User, WeeklyOrder, top_meal, user,
        weekly_order::{self, DayOrder, LineItem, OrderDays},
    },
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use sea_orm::{QueryOrder, Set, SqlErr, TransactionTrait, prelude::*};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, instrument};

/// One requested meal: a name from the menu and how many portions.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MealSelection {
    #[serde(alias = "mealName")]
    pub name: String,
    pub quantity: u32,
}

/// Requested meals keyed by day name. Keys are parsed with [`Weekday::parse`].
pub type Selection = BTreeMap<String, Vec<MealSelection>>;

/// A user together with their live orders.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOrders {
    pub user: user::Model,
    pub orders: Vec<weekly_order::Model>,
}

/// Largest number of portions of one meal on one day.
pub const MAX_MEAL_QUANTITY: u32 = 100;

/// Rounds a money amount to whole cents.
#[must_use]
pub fn round_currency(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

/// Prices a selection against `menu` and returns the days in canonical order.
///
/// Repeated meals within a day are merged. Days with no meals are dropped.
fn price_selection(menu: &crate::entities::MenuModel, selection: &Selection) -> Result<Vec<DayOrder>> {
    let mut by_day: BTreeMap<Weekday, Vec<LineItem>> = BTreeMap::new();

    for (day_name, meals) in selection {
        let day = Weekday::parse(day_name)?;
        let lines = by_day.entry(day).or_default();

        for meal in meals {
            if meal.quantity == 0 || meal.quantity > MAX_MEAL_QUANTITY {
                return Err(Error::validation(format!(
                    "Quantity for '{}' on {day} must be between 1 and {MAX_MEAL_QUANTITY}",
                    meal.name
                )));
            }

            let offering = menu
                .days
                .offering(day, &meal.name)
                .ok_or_else(|| Error::UnknownMeal {
                    day: day.to_string(),
                    name: meal.name.clone(),
                })?;

            if let Some(existing) = lines.iter_mut().find(|l| l.meal_name == offering.name) {
                // Both sides are at most MAX_MEAL_QUANTITY
                existing.quantity += meal.quantity;
                if existing.quantity > MAX_MEAL_QUANTITY {
                    return Err(Error::validation(format!(
                        "Quantity for '{}' on {day} must be between 1 and {MAX_MEAL_QUANTITY}",
                        meal.name
                    )));
                }
            } else {
                lines.push(LineItem {
                    meal_name: offering.name.clone(),
                    quantity: meal.quantity,
                    price: offering.price,
                });
            }
        }
    }

    let days: Vec<DayOrder> = by_day
        .into_iter()
        .filter(|(_, meals)| !meals.is_empty())
        .map(|(day, meals)| DayOrder {
            day,
            meals,
            order_got: false,
        })
        .collect();

    if days.is_empty() {
        return Err(Error::validation("Order must contain at least one meal"));
    }

    Ok(days)
}

/// Adds `quantity` to the popularity counter for `meal_name`.
async fn bump_top_meal<C>(db: &C, meal_name: &str, quantity: u32, now: DateTime<Utc>) -> Result<()>
where
    C: ConnectionTrait,
{
    let existing = TopMeal::find()
        .filter(top_meal::Column::MealName.eq(meal_name))
        .one(db)
        .await?;

    if let Some(counter) = existing {
        let count = counter.count + i64::from(quantity);
        let mut active: top_meal::ActiveModel = counter.into();
        active.count = Set(count);
        active.updated_at = Set(now);
        active.update(db).await?;
    } else {
        top_meal::ActiveModel {
            meal_name: Set(meal_name.to_string()),
            count: Set(i64::from(quantity)),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await?;
    }

    Ok(())
}

/// Submits a weekly order for `user_id`, using the current time for the deadline check.
pub async fn submit_order(
    db: &DatabaseConnection,
    user_id: i64,
    expected_menu_id: Option<i64>,
    selection: &Selection,
) -> Result<weekly_order::Model> {
    submit_order_at(db, user_id, expected_menu_id, selection, Utc::now()).await
}

/// Submits a weekly order against the active menu as of `now`.
///
/// Checks run in this order: a menu is active, it is the menu the client
/// ordered from (when `expected_menu_id` is given), `now` is not past the order
/// deadline, and the user has no order for the menu yet. The order, its line
/// items, and the popularity counters are written in one transaction.
///
/// # Arguments
/// * `user_id` - The ordering user
/// * `expected_menu_id` - Menu the client saw; anything but the active menu is `MenuClosed`
/// * `selection` - Meals and quantities per day name
/// * `now` - Submission time compared against the deadline
#[instrument(skip(db, selection))]
pub async fn submit_order_at(
    db: &DatabaseConnection,
    user_id: i64,
    expected_menu_id: Option<i64>,
    selection: &Selection,
    now: DateTime<Utc>,
) -> Result<weekly_order::Model> {
    let menu = menu::get_current_menu(db)
        .await?
        .ok_or(Error::NoActiveMenu)?;

    if let Some(menu_id) = expected_menu_id
        && menu_id != menu.id
    {
        return Err(Error::MenuClosed { menu_id });
    }

    if now > menu.order_deadline {
        return Err(Error::DeadlinePassed {
            deadline: menu.order_deadline.to_rfc3339(),
        });
    }

    let txn = db.begin().await?;

    let already_ordered = WeeklyOrder::find()
        .filter(weekly_order::Column::UserId.eq(user_id))
        .filter(weekly_order::Column::MenuId.eq(menu.id))
        .one(&txn)
        .await?
        .is_some();
    if already_ordered {
        return Err(Error::DuplicateOrder);
    }

    let days = price_selection(&menu, selection)?;
    let total_price = round_currency(
        days.iter()
            .flat_map(|d| d.meals.iter())
            .map(LineItem::subtotal)
            .sum(),
    );

    let new_order = weekly_order::ActiveModel {
        user_id: Set(user_id),
        menu_id: Set(menu.id),
        days: Set(OrderDays(days.clone())),
        total_price: Set(total_price),
        paid: Set(false),
        approved_by: Set(None),
        created_at: Set(now),
        ..Default::default()
    };

    let created = new_order.insert(&txn).await.map_err(|err| {
        if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
            Error::DuplicateOrder
        } else {
            Error::Database(err)
        }
    })?;

    for line in days.iter().flat_map(|d| d.meals.iter()) {
        bump_top_meal(&txn, &line.meal_name, line.quantity, now).await?;
    }

    txn.commit().await?;

    info!(
        order_id = created.id,
        menu_id = menu.id,
        total_price,
        "Order submitted"
    );
    Ok(created)
}

/// Finds a live order that belongs to `user_id`.
pub async fn require_user_order<C>(db: &C, user_id: i64, order_id: i64) -> Result<weekly_order::Model>
where
    C: ConnectionTrait,
{
    WeeklyOrder::find_by_id(order_id)
        .filter(weekly_order::Column::UserId.eq(user_id))
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("Order", order_id))
}

/// Marks an order as paid and records the approving admin.
///
/// Marking an already-paid order succeeds and leaves the original approver in place.
#[instrument(skip(db))]
pub async fn mark_paid(
    db: &DatabaseConnection,
    admin_id: i64,
    user_id: i64,
    order_id: i64,
) -> Result<weekly_order::Model> {
    let order = require_user_order(db, user_id, order_id).await?;
    if order.paid {
        debug!(order_id, "Order already paid");
        return Ok(order);
    }

    let mut active: weekly_order::ActiveModel = order.into();
    active.paid = Set(true);
    active.approved_by = Set(Some(admin_id));
    let updated = active.update(db).await?;

    info!(order_id, admin_id, "Order marked paid");
    Ok(updated)
}

/// Sets the "received" flag of one day in a live order.
pub async fn set_day_received(
    db: &DatabaseConnection,
    user_id: i64,
    order_id: i64,
    day: Weekday,
    received: bool,
) -> Result<weekly_order::Model> {
    let order = require_user_order(db, user_id, order_id).await?;

    let mut days = order.days.clone();
    let day_order = days
        .0
        .iter_mut()
        .find(|d| d.day == day)
        .ok_or_else(|| Error::not_found("Order day", day))?;
    day_order.order_got = received;

    let mut active: weekly_order::ActiveModel = order.into();
    active.days = Set(days);
    active.update(db).await.map_err(Into::into)
}

/// Live orders for one menu, oldest first.
pub async fn orders_for_menu<C>(db: &C, menu_id: i64) -> Result<Vec<weekly_order::Model>>
where
    C: ConnectionTrait,
{
    WeeklyOrder::find()
        .filter(weekly_order::Column::MenuId.eq(menu_id))
        .order_by_asc(weekly_order::Column::CreatedAt)
        .all(db)
        .await
        .map_err(Into::into)
}

/// The caller's live orders, newest first.
pub async fn orders_for_user(db: &DatabaseConnection, user_id: i64) -> Result<Vec<weekly_order::Model>> {
    WeeklyOrder::find()
        .filter(weekly_order::Column::UserId.eq(user_id))
        .order_by_desc(weekly_order::Column::CreatedAt)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Every user that holds live orders, with those orders. Optionally limited to one menu.
pub async fn list_orders_with_users(
    db: &DatabaseConnection,
    menu_id: Option<i64>,
) -> Result<Vec<UserOrders>> {
    let mut query = WeeklyOrder::find().order_by_asc(weekly_order::Column::CreatedAt);
    if let Some(menu_id) = menu_id {
        query = query.filter(weekly_order::Column::MenuId.eq(menu_id));
    }
    let orders = query.all(db).await?;

    let mut by_user: HashMap<i64, Vec<weekly_order::Model>> = HashMap::new();
    for order in orders {
        by_user.entry(order.user_id).or_default().push(order);
    }

    let users = User::find()
        .filter(user::Column::Id.is_in(by_user.keys().copied()))
        .order_by_asc(user::Column::FullName)
        .all(db)
        .await?;

    Ok(users
        .into_iter()
        .filter_map(|user| {
            by_user
                .remove(&user.id)
                .map(|orders| UserOrders { user, orders })
        })
        .collect())
}
