//! Shared test utilities for the canteen service.
//!
//! This module provides common helper functions for setting up test databases
//! and creating test entities with sensible defaults.

use crate::{
    core::{
        menu::{self, MenuInput},
        order::{self, MealSelection, Selection},
        user::{Role, TEACHER_GRADE},
        weekday::Weekday,
    },
    entities::{
        self,
        menu::{DayMenu, MealOffering},
    },
    errors::Result,
};
use chrono::{DateTime, TimeZone, Utc};
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Creates a user directly, bypassing sign-in.
///
/// Teachers get the `"teacher"` grade label; other roles start without a grade.
pub async fn create_test_user(
    db: &DatabaseConnection,
    email: &str,
    full_name: &str,
    role: Role,
) -> Result<entities::user::Model> {
    let grade = (role == Role::Teacher).then(|| TEACHER_GRADE.to_string());
    let user = entities::user::ActiveModel {
        email: Set(email.to_string()),
        full_name: Set(full_name.to_string()),
        role: Set(role.as_str().to_string()),
        grade: Set(grade),
        created_at: Set(Utc::now()),
        ..Default::default()
    };
    Ok(user.insert(db).await?)
}

/// Order deadline of the test menu: Wednesday 2024-01-03 12:00 UTC.
pub fn test_deadline() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 3, 12, 0, 0)
        .single()
        .unwrap_or_default()
}

/// A submission time before [`test_deadline`].
pub fn before_deadline() -> DateTime<Utc> {
    test_deadline() - chrono::Duration::days(1)
}

/// A submission time after [`test_deadline`].
pub fn after_deadline() -> DateTime<Utc> {
    test_deadline() + chrono::Duration::hours(1)
}

/// Days of the test menu.
///
/// # Contents
/// * Monday: Супа 2.00, Кюфтета 3.50
/// * Wednesday: Мусака 4.50
/// * Friday: Пица 4.00
pub fn sample_menu_days() -> Vec<DayMenu> {
    let meal = |name: &str, weight: Option<&str>, price: f64| MealOffering {
        name: name.to_string(),
        weight: weight.map(str::to_string),
        price,
    };

    vec![
        DayMenu {
            day: Weekday::Monday,
            meals: vec![meal("Супа", Some("300 г"), 2.0), meal("Кюфтета", None, 3.5)],
        },
        DayMenu {
            day: Weekday::Wednesday,
            meals: vec![meal("Мусака", Some("350 г"), 4.5)],
        },
        DayMenu {
            day: Weekday::Friday,
            meals: vec![meal("Пица", None, 4.0)],
        },
    ]
}

/// Publishes the week of 2024-01-01 with [`sample_menu_days`] and makes it active.
pub async fn create_test_menu(db: &DatabaseConnection) -> Result<entities::menu::Model> {
    menu::create_menu(
        db,
        MenuInput {
            week_start: "2024-01-01".to_string(),
            week_end: "2024-01-05".to_string(),
            order_deadline: Some(test_deadline().to_rfc3339()),
            days: sample_menu_days(),
        },
    )
    .await
}

/// Builds a selection from `(day, meal, quantity)` triples.
pub fn selection(entries: &[(&str, &str, u32)]) -> Selection {
    let mut selection = Selection::new();
    for (day, name, quantity) in entries {
        selection
            .entry((*day).to_string())
            .or_default()
            .push(MealSelection {
                name: (*name).to_string(),
                quantity: *quantity,
            });
    }
    selection
}

/// Creates a student and submits Monday's Супа x1 + Кюфтета x1 (total 5.50)
/// against the active menu, publishing the test menu first if none is active.
pub async fn create_test_order(
    db: &DatabaseConnection,
    email: &str,
    full_name: &str,
) -> Result<(entities::user::Model, entities::weekly_order::Model)> {
    if menu::get_current_menu(db).await?.is_none() {
        create_test_menu(db).await?;
    }

    let student = create_test_user(db, email, full_name, Role::Student).await?;
    let placed = order::submit_order_at(
        db,
        student.id,
        None,
        &selection(&[("Понеделник", "Супа", 1), ("Понеделник", "Кюфтета", 1)]),
        before_deadline(),
    )
    .await?;

    Ok((student, placed))
}
