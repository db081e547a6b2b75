//! Reporting over the live order ledger.
//!
//! Nothing here writes, except that the popularity counters read by
//! [`top_meals`] are maintained by order submission.

use crate::{
    core::order::round_currency,
    entities::{TopMeal, WeeklyOrder, top_meal, weekly_order},
    errors::Result,
};
use sea_orm::{QueryOrder, QuerySelect, prelude::*};
use serde::Serialize;
use std::collections::HashMap;

/// Order-level totals.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total_orders: u64,
    pub paid_orders: u64,
    pub unpaid_orders: u64,
    pub total_revenue: f64,
    pub paid_revenue: f64,
    pub unpaid_revenue: f64,
}

/// Per-meal totals across all live orders.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MealStats {
    pub meal_name: String,
    pub quantity_ordered: u64,
    /// Number of line items naming this meal
    pub line_count: u64,
    pub revenue: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statistics {
    pub summary: Summary,
    pub meals: Vec<MealStats>,
}

/// Aggregates a set of orders. Meals are ranked by quantity, then by name.
#[must_use]
pub fn aggregate(orders: &[weekly_order::Model]) -> Statistics {
    let mut summary = Summary::default();
    let mut meals: HashMap<&str, MealStats> = HashMap::new();

    for order in orders {
        summary.total_orders += 1;
        summary.total_revenue += order.total_price;
        if order.paid {
            summary.paid_orders += 1;
            summary.paid_revenue += order.total_price;
        } else {
            summary.unpaid_orders += 1;
            summary.unpaid_revenue += order.total_price;
        }

        for line in order.days.0.iter().flat_map(|d| d.meals.iter()) {
            let stats = meals
                .entry(line.meal_name.as_str())
                .or_insert_with(|| MealStats {
                    meal_name: line.meal_name.clone(),
                    quantity_ordered: 0,
                    line_count: 0,
                    revenue: 0.0,
                });
            stats.quantity_ordered += u64::from(line.quantity);
            stats.line_count += 1;
            stats.revenue += line.subtotal();
        }
    }

    summary.total_revenue = round_currency(summary.total_revenue);
    summary.paid_revenue = round_currency(summary.paid_revenue);
    summary.unpaid_revenue = round_currency(summary.unpaid_revenue);

    let mut meals: Vec<MealStats> = meals
        .into_values()
        .map(|mut m| {
            m.revenue = round_currency(m.revenue);
            m
        })
        .collect();
    meals.sort_by(|a, b| {
        b.quantity_ordered
            .cmp(&a.quantity_ordered)
            .then_with(|| a.meal_name.cmp(&b.meal_name))
    });

    Statistics { summary, meals }
}

/// Statistics over every live order.
pub async fn statistics(db: &DatabaseConnection) -> Result<Statistics> {
    let orders = WeeklyOrder::find().all(db).await?;
    Ok(aggregate(&orders))
}

/// The `limit` most-ordered meals by all-time counter.
pub async fn top_meals(db: &DatabaseConnection, limit: u64) -> Result<Vec<top_meal::Model>> {
    TopMeal::find()
        .order_by_desc(top_meal::Column::Count)
        .order_by_asc(top_meal::Column::MealName)
        .limit(limit)
        .all(db)
        .await
        .map_err(Into::into)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::core::{order, user::Role};
    use crate::test_utils::*;

    #[tokio::test]
    async fn test_statistics_summary_and_ranking() -> Result<()> {
        let db = setup_test_db().await?;
        let admin = create_test_user(&db, "cook@eduiteh.eu", "Cook", Role::Admin).await?;
        // Супа x1 + Кюфтета x1 = 5.50
        let (a, order_a) = create_test_order(&db, "et.a@eduiteh.eu", "Ана").await?;
        let b = create_test_user(&db, "et.b@eduiteh.eu", "Борис", Role::Student).await?;
        // Супа x2 + Пица x1 = 8.00
        order::submit_order_at(
            &db,
            b.id,
            None,
            &selection(&[("Понеделник", "Супа", 2), ("Петък", "Пица", 1)]),
            before_deadline(),
        )
        .await?;
        order::mark_paid(&db, admin.id, a.id, order_a.id).await?;

        let stats = statistics(&db).await?;
        assert_eq!(stats.summary.total_orders, 2);
        assert_eq!(stats.summary.paid_orders, 1);
        assert_eq!(stats.summary.unpaid_orders, 1);
        assert_eq!(stats.summary.total_revenue, 13.5);
        assert_eq!(stats.summary.paid_revenue, 5.5);
        assert_eq!(stats.summary.unpaid_revenue, 8.0);

        let names: Vec<&str> = stats.meals.iter().map(|m| m.meal_name.as_str()).collect();
        assert_eq!(names, vec!["Супа", "Кюфтета", "Пица"]);
        assert_eq!(stats.meals[0].quantity_ordered, 3);
        assert_eq!(stats.meals[0].line_count, 2);
        assert_eq!(stats.meals[0].revenue, 6.0);
        Ok(())
    }

    #[tokio::test]
    async fn test_statistics_empty_ledger() -> Result<()> {
        let db = setup_test_db().await?;
        let stats = statistics(&db).await?;
        assert_eq!(stats.summary, Summary::default());
        assert!(stats.meals.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_top_meals_limit() -> Result<()> {
        let db = setup_test_db().await?;
        create_test_order(&db, "et.a@eduiteh.eu", "Ана").await?;
        let b = create_test_user(&db, "et.b@eduiteh.eu", "Борис", Role::Student).await?;
        order::submit_order_at(
            &db,
            b.id,
            None,
            &selection(&[("Понеделник", "Кюфтета", 3)]),
            before_deadline(),
        )
        .await?;

        let top = top_meals(&db, 5).await?;
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].meal_name, "Кюфтета");
        assert_eq!(top[0].count, 4);

        assert_eq!(top_meals(&db, 1).await?.len(), 1);
        Ok(())
    }
}
