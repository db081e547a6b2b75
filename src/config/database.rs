//! Database configuration module for the canteen service.
//!
//! This module handles `SQLite` database connection and table creation using `SeaORM`.
//! Tables are generated from the entity definitions with `Schema::create_table_from_entity`,
//! so the database schema always matches the Rust structs. The one constraint the entities
//! cannot express, at most one weekly order per `(user_id, menu_id)`, is added as a unique
//! index here; order submission relies on it instead of a check-then-insert.

use crate::entities::{
    ArchivedOrder, DeliveryRecord, Menu, SystemState, TopMeal, UnpaidRecord, User, WeeklyOrder,
    weekly_order,
};
use crate::errors::Result;
use sea_orm::sea_query::Index;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, EntityTrait, Schema};
use tracing::info;

/// Default database location used when neither the config file nor the environment sets one.
pub const DEFAULT_DATABASE_URL: &str = "sqlite://data/canteen.sqlite?mode=rwc";

/// Name of the unique index backing the one-order-per-menu rule.
pub const ORDER_UNIQUE_INDEX: &str = "idx_weekly_orders_user_menu";

/// Establishes a connection to the database at `database_url`.
pub async fn create_connection(database_url: &str) -> Result<DatabaseConnection> {
    Database::connect(database_url).await.map_err(Into::into)
}

/// Creates the parent directory of a file-backed `SQLite` URL so that
/// `mode=rwc` can create the database file. In-memory URLs are left alone.
pub fn ensure_database_dir(database_url: &str) -> Result<()> {
    let Some(rest) = database_url
        .strip_prefix("sqlite://")
        .or_else(|| database_url.strip_prefix("sqlite:"))
    else {
        return Ok(());
    };
    if rest.contains(":memory:") {
        return Ok(());
    }

    let path = rest.split('?').next().unwrap_or_default();
    if let Some(parent) = std::path::Path::new(path).parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

async fn create_table<C, E>(db: &C, entity: E) -> Result<()>
where
    C: ConnectionTrait,
    E: EntityTrait,
{
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);
    let mut statement = schema.create_table_from_entity(entity);
    db.execute(builder.build(statement.if_not_exists())).await?;
    Ok(())
}

/// Creates all tables and indexes. Safe to call on every start.
pub async fn create_tables<C>(db: &C) -> Result<()>
where
    C: ConnectionTrait,
{
    create_table(db, User).await?;
    create_table(db, Menu).await?;
    create_table(db, WeeklyOrder).await?;
    create_table(db, ArchivedOrder).await?;
    create_table(db, UnpaidRecord).await?;
    create_table(db, DeliveryRecord).await?;
    create_table(db, TopMeal).await?;
    create_table(db, SystemState).await?;

    let builder = db.get_database_backend();
    let unique_order = Index::create()
        .name(ORDER_UNIQUE_INDEX)
        .table(WeeklyOrder)
        .col(weekly_order::Column::UserId)
        .col(weekly_order::Column::MenuId)
        .unique()
        .if_not_exists()
        .to_owned();
    db.execute(builder.build(&unique_order)).await?;

    info!("Database schema is up to date");
    Ok(())
}
