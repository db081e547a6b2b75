//! Unpaid record entity - A flat, display-only outstanding balance.
//!
//! Created when an unpaid order is deleted or its menu is retired. The display
//! fields are copied, not joined; `user_id` is a loose back-reference that is
//! left dangling if the user is later removed.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Unpaid record database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "unpaid_records")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// User's display name at the time
    pub name: String,
    /// User's grade label at the time
    pub grade: String,
    /// Outstanding amount
    pub total: f64,
    /// Week label, e.g. `"2024-01-01 - 2024-01-05"`
    pub week: String,
    pub user_id: Option<i64>,
    pub created_at: DateTimeUtc,
}

/// `UnpaidRecord` has no enforced relationships
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
