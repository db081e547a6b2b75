//! User entity - Students, teachers, and administrators.
//!
//! A user is created on first successful sign-in from the allowed email domain.
//! Live weekly orders and archived snapshots belong to a user.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// User database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    /// Unique identifier for the user
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Sign-in email, unique across users
    #[sea_orm(unique)]
    pub email: String,
    /// Display name reported by the identity provider
    pub full_name: String,
    /// One of `"student"`, `"teacher"`, `"admin"`
    pub role: String,
    /// Class label such as `"10а"`; teachers carry `"teacher"`
    pub grade: Option<String>,
    /// When the user first signed in
    pub created_at: DateTimeUtc,
}

/// Defines relationships between User and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One user has many live weekly orders
    #[sea_orm(has_many = "super::weekly_order::Entity")]
    WeeklyOrders,
    /// One user has many archived snapshots
    #[sea_orm(has_many = "super::archived_order::Entity")]
    ArchivedOrders,
}

impl Related<super::weekly_order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::WeeklyOrders.def()
    }
}

impl Related<super::archived_order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ArchivedOrders.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
