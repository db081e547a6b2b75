//! Archived order entity - A frozen snapshot of retired weekly orders.
//!
//! Snapshots are written when a menu is retired (all of a user's orders for
//! that menu in one row) or when an admin deletes a single order (one order in
//! one row). The `orders` array is the source of truth for expected meal counts
//! once the live orders are gone.

use super::weekly_order::{self, DayOrder};
use sea_orm::FromJsonQueryResult;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A copy of a weekly order as it was at archival time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSnapshot {
    /// Id the order had in the live ledger
    pub id: i64,
    pub menu_id: i64,
    pub days: Vec<DayOrder>,
    pub total_price: f64,
    pub paid: bool,
    pub approved_by: Option<i64>,
    pub created_at: DateTimeUtc,
}

impl From<&weekly_order::Model> for OrderSnapshot {
    fn from(order: &weekly_order::Model) -> Self {
        Self {
            id: order.id,
            menu_id: order.menu_id,
            days: order.days.0.clone(),
            total_price: order.total_price,
            paid: order.paid,
            approved_by: order.approved_by,
            created_at: order.created_at,
        }
    }
}

/// JSON column wrapper for the snapshot array.
#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize, FromJsonQueryResult)]
pub struct OrderSnapshots(pub Vec<OrderSnapshot>);

/// Archived order database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "archived_orders")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub user_id: i64,
    /// Id of the retired menu (the menu row itself may no longer exist)
    pub menu_id: i64,
    pub week_start: Date,
    pub week_end: Date,
    /// Snapshot of the user's identity at archival time
    pub user_email: String,
    pub user_full_name: String,
    pub user_grade: Option<String>,
    #[sea_orm(column_type = "Json")]
    pub orders: OrderSnapshots,
    /// Sum of the snapshot orders' totals
    pub total: f64,
    pub archived_at: DateTimeUtc,
}

/// Defines relationships between ArchivedOrder and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each snapshot belongs to one user
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
