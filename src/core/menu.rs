//! Menu business logic - publishing and replacing the weekly menu.
//!
//! Exactly one menu is open for ordering at a time. Instead of inferring it from
//! creation order, the open menu is recorded in an explicit pointer stored in the
//! `system_state` table under [`ACTIVE_MENU_KEY`]. Publishing a menu moves the
//! pointer; retiring the pointed-to menu clears it (see `core::archive`).

use crate::{
    entities::{
        Menu, SystemState,
        menu::{self, DayMenu, MenuDays},
        system_state,
    },
    errors::{Error, Result},
};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use sea_orm::{Set, TransactionTrait, prelude::*};
use serde::Deserialize;
use std::collections::HashSet;
use tracing::{debug, info, instrument};

const ACTIVE_MENU_KEY: &str = "active_menu_id";

/// Menu fields as submitted by an administrator. Dates arrive as strings so
/// that missing or malformed values are reported as validation errors.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuInput {
    pub week_start: String,
    pub week_end: String,
    #[serde(default)]
    pub order_deadline: Option<String>,
    #[serde(default)]
    pub days: Vec<DayMenu>,
}

/// A menu input that passed validation.
#[derive(Debug, Clone)]
struct ValidMenu {
    week_start: NaiveDate,
    week_end: NaiveDate,
    order_deadline: DateTime<Utc>,
    days: MenuDays,
}

/// Parses a calendar date. Accepts `YYYY-MM-DD` or a full RFC 3339 timestamp,
/// which is truncated to its UTC date.
pub fn parse_week_date(value: &str) -> Result<NaiveDate> {
    let trimmed = value.trim();
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(date);
    }
    DateTime::parse_from_rfc3339(trimmed)
        .map(|dt| dt.with_timezone(&Utc).date_naive())
        .map_err(|_| Error::validation(format!("Invalid date: '{value}'")))
}

/// Parses an order deadline. Accepts RFC 3339, or a naive `YYYY-MM-DDTHH:MM[:SS]`
/// value interpreted as UTC.
pub fn parse_deadline(value: &str) -> Result<DateTime<Utc>> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::validation("Order deadline is required"));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| Error::validation(format!("Invalid order deadline: '{value}'")))
}

/// Human label for a week, e.g. `"2024-01-01 - 2024-01-05"`.
#[must_use]
pub fn week_label(week_start: NaiveDate, week_end: NaiveDate) -> String {
    format!(
        "{} - {}",
        week_start.format("%Y-%m-%d"),
        week_end.format("%Y-%m-%d")
    )
}

fn validate_menu(input: MenuInput) -> Result<ValidMenu> {
    let deadline = input
        .order_deadline
        .as_deref()
        .ok_or_else(|| Error::validation("Order deadline is required"))?;
    let order_deadline = parse_deadline(deadline)?;
    let week_start = parse_week_date(&input.week_start)?;
    let week_end = parse_week_date(&input.week_end)?;

    if week_end < week_start {
        return Err(Error::validation("weekEnd must not be before weekStart"));
    }

    let mut seen_days = HashSet::new();
    for day_menu in &input.days {
        if !seen_days.insert(day_menu.day) {
            return Err(Error::validation(format!(
                "{} appears more than once",
                day_menu.day
            )));
        }

        let mut seen_meals = HashSet::new();
        for meal in &day_menu.meals {
            if meal.name.trim().is_empty() {
                return Err(Error::validation(format!(
                    "Meal name cannot be empty ({})",
                    day_menu.day
                )));
            }
            if !meal.price.is_finite() || meal.price < 0.0 {
                return Err(Error::validation(format!(
                    "Invalid price {} for '{}'",
                    meal.price, meal.name
                )));
            }
            if !seen_meals.insert(meal.name.as_str()) {
                return Err(Error::validation(format!(
                    "'{}' is listed twice on {}",
                    meal.name, day_menu.day
                )));
            }
        }
    }

    let mut days = input.days;
    days.sort_by_key(|d| d.day);

    Ok(ValidMenu {
        week_start,
        week_end,
        order_deadline,
        days: MenuDays(days),
    })
}

/// Retrieves a menu by its unique ID.
pub async fn get_menu_by_id<C>(db: &C, menu_id: i64) -> Result<Option<menu::Model>>
where
    C: ConnectionTrait,
{
    Menu::find_by_id(menu_id).one(db).await.map_err(Into::into)
}

/// Retrieves a menu by ID or fails with `NotFound`.
pub async fn require_menu<C>(db: &C, menu_id: i64) -> Result<menu::Model>
where
    C: ConnectionTrait,
{
    get_menu_by_id(db, menu_id)
        .await?
        .ok_or_else(|| Error::not_found("Menu", menu_id))
}

/// Reads the active-menu pointer.
pub async fn get_active_menu_id<C>(db: &C) -> Result<Option<i64>>
where
    C: ConnectionTrait,
{
    let state = SystemState::find()
        .filter(system_state::Column::Key.eq(ACTIVE_MENU_KEY))
        .one(db)
        .await?;

    match state {
        Some(s) => s.value.parse::<i64>().map(Some).map_err(|e| Error::Config {
            message: format!("Corrupt active menu pointer '{}': {e}", s.value),
        }),
        None => Ok(None),
    }
}

/// Points the active-menu slot at `menu_id`.
pub async fn set_active_menu<C>(db: &C, menu_id: i64) -> Result<()>
where
    C: ConnectionTrait,
{
    let now = Utc::now();

    let existing = SystemState::find()
        .filter(system_state::Column::Key.eq(ACTIVE_MENU_KEY))
        .one(db)
        .await?;

    if let Some(state) = existing {
        let mut active_model: system_state::ActiveModel = state.into();
        active_model.value = Set(menu_id.to_string());
        active_model.updated_at = Set(now);
        active_model.update(db).await?;
    } else {
        let new_state = system_state::ActiveModel {
            key: Set(ACTIVE_MENU_KEY.to_string()),
            value: Set(menu_id.to_string()),
            updated_at: Set(now),
            ..Default::default()
        };
        new_state.insert(db).await?;
    }

    Ok(())
}

/// Clears the active-menu slot if it currently points at `menu_id`.
pub async fn clear_active_menu_if<C>(db: &C, menu_id: i64) -> Result<()>
where
    C: ConnectionTrait,
{
    SystemState::delete_many()
        .filter(system_state::Column::Key.eq(ACTIVE_MENU_KEY))
        .filter(system_state::Column::Value.eq(menu_id.to_string()))
        .exec(db)
        .await?;
    Ok(())
}

/// Returns the menu currently open for ordering, if any.
pub async fn get_current_menu<C>(db: &C) -> Result<Option<menu::Model>>
where
    C: ConnectionTrait,
{
    match get_active_menu_id(db).await? {
        Some(menu_id) => get_menu_by_id(db, menu_id).await,
        None => {
            debug!("No active menu pointer set");
            Ok(None)
        }
    }
}

/// Publishes a new menu and makes it the active one.
#[instrument(skip(db, input))]
pub async fn create_menu(db: &DatabaseConnection, input: MenuInput) -> Result<menu::Model> {
    let valid = validate_menu(input)?;
    let now = Utc::now();

    let txn = db.begin().await?;

    let created = menu::ActiveModel {
        week_start: Set(valid.week_start),
        week_end: Set(valid.week_end),
        order_deadline: Set(valid.order_deadline),
        days: Set(valid.days),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    set_active_menu(&txn, created.id).await?;
    txn.commit().await?;

    info!(menu_id = created.id, week_start = %created.week_start, "Published menu");
    Ok(created)
}

/// Replaces the dates, deadline, and days of an existing menu.
///
/// Orders already placed keep their price snapshots.
#[instrument(skip(db, input))]
pub async fn update_menu(
    db: &DatabaseConnection,
    menu_id: i64,
    input: MenuInput,
) -> Result<menu::Model> {
    let valid = validate_menu(input)?;
    let existing = require_menu(db, menu_id).await?;

    let mut active: menu::ActiveModel = existing.into();
    active.week_start = Set(valid.week_start);
    active.week_end = Set(valid.week_end);
    active.order_deadline = Set(valid.order_deadline);
    active.days = Set(valid.days);
    active.updated_at = Set(Utc::now());

    let updated = active.update(db).await?;
    info!(menu_id, "Replaced menu");
    Ok(updated)
}
