//! Delivery record entity - Admin-entered delivered meal counts for one day.
//!
//! Keyed by `(menu_id, day)` for a live menu or `(week_start, day)` for an
//! archived week. Expected counts are never stored here; they are recomputed
//! from orders on every read.

use sea_orm::FromJsonQueryResult;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Delivered count for one meal; `None` means not entered yet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveredItem {
    pub meal_name: String,
    pub delivered_count: Option<u32>,
}

/// JSON column wrapper for the delivered items of a day.
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize, FromJsonQueryResult)]
pub struct DeliveredItems(pub Vec<DeliveredItem>);

/// Delivery record database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "delivery_records")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Set for live-menu reconciliation
    pub menu_id: Option<i64>,
    /// Set for archived-week reconciliation
    pub week_start: Option<Date>,
    /// Stored weekday name
    pub day: String,
    #[sea_orm(column_type = "Json")]
    pub items: DeliveredItems,
    pub updated_at: DateTimeUtc,
}

/// `DeliveryRecord` has no enforced relationships
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
