//! Top meal entity - Running per-meal order counter for the dashboard.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Top meal counter database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "top_meals")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique)]
    pub meal_name: String,
    /// Total quantity ordered across all submissions
    pub count: i64,
    pub updated_at: DateTimeUtc,
}

/// `TopMeal` has no relationships with other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
