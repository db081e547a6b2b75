//! Weekly order entity - One user's selections against one menu.
//!
//! At most one row exists per `(user_id, menu_id)`; the schema enforces this
//! with a unique index (see `config::database::create_tables`). `total_price`
//! is computed once at submission and never recomputed.

use crate::core::weekday::Weekday;
use sea_orm::FromJsonQueryResult;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One ordered meal, priced at submission time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    /// Snapshot of the meal name
    pub meal_name: String,
    pub quantity: u32,
    /// Snapshot of the unit price
    pub price: f64,
}

impl LineItem {
    /// `price × quantity`
    #[must_use]
    pub fn subtotal(&self) -> f64 {
        self.price * f64::from(self.quantity)
    }
}

/// The meals ordered for one weekday.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayOrder {
    pub day: Weekday,
    #[serde(default)]
    pub meals: Vec<LineItem>,
    /// Set by staff when the meals for this day were handed out
    #[serde(default)]
    pub order_got: bool,
}

/// JSON column wrapper for the ordered list of day orders.
#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize, FromJsonQueryResult)]
pub struct OrderDays(pub Vec<DayOrder>);

/// Weekly order database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "weekly_orders")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    /// Unique identifier for the order
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owner of the order
    pub user_id: i64,
    /// Menu the order was placed against
    pub menu_id: i64,
    /// Ordered meals, Monday first
    #[sea_orm(column_type = "Json")]
    pub days: OrderDays,
    /// Sum of price × quantity over all line items
    pub total_price: f64,
    pub paid: bool,
    /// Admin who confirmed the payment
    pub approved_by: Option<i64>,
    pub created_at: DateTimeUtc,
}

/// Defines relationships between WeeklyOrder and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each order belongs to one user
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
