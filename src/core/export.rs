//! CSV projection of weekly orders.
//!
//! One row per user: name, grade, one column per school day with `"Meal xN"`
//! entries, and the user's total. The output starts with a UTF-8 byte order mark
//! so spreadsheet programs pick up the Cyrillic text correctly.

use crate::{
    core::{order, weekday::Weekday},
    entities::{ArchivedOrder, User, archived_order, user, weekly_order::DayOrder},
    errors::Result,
};
use sea_orm::{QueryOrder, prelude::*};
use std::collections::{BTreeMap, HashSet};

const BOM: char = '\u{feff}';
const EMPTY_CELL: &str = "—";

/// One exported line.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportRow {
    pub name: String,
    pub grade: String,
    /// Cell per weekday, in canonical order
    pub days: [String; 5],
    pub total: f64,
}

impl ExportRow {
    /// Builds a row from every order a user holds for one menu.
    pub fn from_orders<'a>(
        name: &str,
        grade: Option<&str>,
        orders: impl IntoIterator<Item = (&'a [DayOrder], f64)>,
    ) -> Self {
        let mut per_day: [Vec<(String, u64)>; 5] = Default::default();
        let mut total = 0.0;

        for (days, order_total) in orders {
            total += order_total;
            for day in days {
                let cell = &mut per_day[day.day.position()];
                for line in &day.meals {
                    match cell.iter_mut().find(|(meal, _)| *meal == line.meal_name) {
                        Some((_, qty)) => *qty += u64::from(line.quantity),
                        None => cell.push((line.meal_name.clone(), u64::from(line.quantity))),
                    }
                }
            }
        }

        let days = per_day.map(|meals| {
            if meals.is_empty() {
                EMPTY_CELL.to_string()
            } else {
                meals
                    .iter()
                    .map(|(meal, qty)| format!("{meal} x{qty}"))
                    .collect::<Vec<_>>()
                    .join(", ")
            }
        });

        Self {
            name: non_empty_or_dash(name),
            grade: non_empty_or_dash(grade.unwrap_or_default()),
            days,
            total: order::round_currency(total),
        }
    }
}

fn non_empty_or_dash(value: &str) -> String {
    if value.trim().is_empty() {
        EMPTY_CELL.to_string()
    } else {
        value.to_string()
    }
}

fn should_neutralize(value: &str) -> bool {
    let trimmed = value.trim_start();
    if trimmed.is_empty() || trimmed.starts_with('\'') {
        return false;
    }
    matches!(trimmed.chars().next(), Some('=' | '+' | '-' | '@'))
}

/// Quotes a cell when needed and defuses spreadsheet formulas.
#[must_use]
pub fn csv_escape(value: &str) -> String {
    let safe = if should_neutralize(value) {
        format!("'{value}")
    } else {
        value.to_string()
    };
    if safe.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", safe.replace('"', "\"\""))
    } else {
        safe
    }
}

/// Renders rows as CSV text, header included.
#[must_use]
pub fn render_csv(rows: &[ExportRow]) -> String {
    let mut header = vec!["Name".to_string(), "Grade".to_string()];
    header.extend(Weekday::ALL.iter().map(|d| d.name().to_string()));
    header.push("Total".to_string());

    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(header.iter().map(|h| csv_escape(h)).collect::<Vec<_>>().join(","));

    for row in rows {
        let mut cells = vec![csv_escape(&row.name), csv_escape(&row.grade)];
        cells.extend(row.days.iter().map(|d| csv_escape(d)));
        cells.push(format!("{:.2}", row.total));
        lines.push(cells.join(","));
    }

    let mut out = String::new();
    out.push(BOM);
    out.push_str(&lines.join("\n"));
    out.push('\n');
    out
}

/// Rows for the live orders of a menu, sorted by user name.
pub async fn live_rows<C>(db: &C, menu_id: i64) -> Result<Vec<ExportRow>>
where
    C: ConnectionTrait,
{
    let orders = order::orders_for_menu(db, menu_id).await?;

    let mut by_user: BTreeMap<i64, Vec<_>> = BTreeMap::new();
    for o in orders {
        by_user.entry(o.user_id).or_default().push(o);
    }

    let users = User::find()
        .filter(user::Column::Id.is_in(by_user.keys().copied()))
        .order_by_asc(user::Column::FullName)
        .all(db)
        .await?;

    Ok(users
        .iter()
        .filter_map(|u| {
            by_user.get(&u.id).map(|orders| {
                ExportRow::from_orders(
                    &u.full_name,
                    u.grade.as_deref(),
                    orders.iter().map(|o| (o.days.0.as_slice(), o.total_price)),
                )
            })
        })
        .collect())
}

/// Rows for a menu from live orders, falling back to archived snapshots for users
/// whose live orders are gone. Users with neither are omitted.
pub async fn download_rows(db: &DatabaseConnection, menu_id: i64) -> Result<Vec<ExportRow>> {
    let live = order::list_orders_with_users(db, Some(menu_id)).await?;

    let archived = ArchivedOrder::find()
        .filter(archived_order::Column::MenuId.eq(menu_id))
        .order_by_desc(archived_order::Column::ArchivedAt)
        .all(db)
        .await?;

    let mut rows: Vec<ExportRow> = Vec::new();
    let mut covered = HashSet::new();

    for entry in &live {
        covered.insert(entry.user.id);
        rows.push(ExportRow::from_orders(
            &entry.user.full_name,
            entry.user.grade.as_deref(),
            entry
                .orders
                .iter()
                .map(|o| (o.days.0.as_slice(), o.total_price)),
        ));
    }

    // Newest archive per user wins
    for archive in &archived {
        if !covered.insert(archive.user_id) {
            continue;
        }
        rows.push(ExportRow::from_orders(
            &archive.user_full_name,
            archive.user_grade.as_deref(),
            archive
                .orders
                .0
                .iter()
                .map(|o| (o.days.as_slice(), o.total_price)),
        ));
    }

    rows.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(rows)
}

/// CSV body for `GET /orders/download`.
pub async fn download_csv(db: &DatabaseConnection, menu_id: i64) -> Result<String> {
    let rows = download_rows(db, menu_id).await?;
    Ok(render_csv(&rows))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::entities::weekly_order::LineItem;
    use crate::test_utils::*;

    fn day(day: Weekday, meals: &[(&str, u32)]) -> DayOrder {
        DayOrder {
            day,
            meals: meals
                .iter()
                .map(|(name, quantity)| LineItem {
                    meal_name: (*name).to_string(),
                    quantity: *quantity,
                    price: 1.0,
                })
                .collect(),
            order_got: false,
        }
    }

    #[test]
    fn test_csv_escape() {
        assert_eq!(csv_escape("plain"), "plain");
        assert_eq!(csv_escape("Супа x1, Пица x2"), "\"Супа x1, Пица x2\"");
        assert_eq!(csv_escape("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(csv_escape("=SUM(A1)"), "'=SUM(A1)");
        assert_eq!(csv_escape("—"), "—");
    }

    #[test]
    fn test_row_merges_orders_per_day() {
        let first = vec![day(Weekday::Monday, &[("Супа", 1)])];
        let second = vec![
            day(Weekday::Monday, &[("Супа", 2), ("Хляб", 1)]),
            day(Weekday::Friday, &[("Пица", 1)]),
        ];

        let row = ExportRow::from_orders(
            "Иван",
            None,
            [(first.as_slice(), 2.0), (second.as_slice(), 5.0)],
        );

        assert_eq!(row.grade, "—");
        assert_eq!(row.days[0], "Супа x3, Хляб x1");
        assert_eq!(row.days[1], "—");
        assert_eq!(row.days[4], "Пица x1");
        assert_eq!(row.total, 7.0);
    }

    #[test]
    fn test_render_csv_layout() {
        let days = vec![day(Weekday::Tuesday, &[("Боб", 1)])];
        let row = ExportRow::from_orders("Мария", Some("10а"), [(days.as_slice(), 5.5)]);
        let csv = render_csv(&[row]);

        assert!(csv.starts_with('\u{feff}'));
        let mut lines = csv.trim_start_matches('\u{feff}').lines();
        assert_eq!(
            lines.next().unwrap(),
            "Name,Grade,Понеделник,Вторник,Сряда,Четвъртък,Петък,Total"
        );
        assert_eq!(lines.next().unwrap(), "Мария,10а,—,Боб x1,—,—,—,5.50");
        assert!(lines.next().is_none());
    }

    #[tokio::test]
    async fn test_live_rows_and_download() -> Result<()> {
        let db = setup_test_db().await?;
        let (_, order) = create_test_order(&db, "et.a@eduiteh.eu", "Ана").await?;

        let rows = live_rows(&db, order.menu_id).await?;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "Ана");
        assert_eq!(rows[0].days[0], "Супа x1, Кюфтета x1");

        let csv = download_csv(&db, order.menu_id).await?;
        assert_eq!(csv.lines().count(), 2);
        Ok(())
    }
}
