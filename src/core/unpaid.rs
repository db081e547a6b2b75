//! Unpaid ledger - outstanding balances left behind by deleted or retired orders.
//!
//! Records keep the display fields they were created with; later changes to the
//! user do not touch them.

use crate::{
    entities::{UnpaidRecord, unpaid_record},
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, Set, prelude::*};
use serde::Deserialize;
use tracing::info;

/// A manually entered unpaid balance.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUnpaid {
    pub name: String,
    #[serde(default)]
    pub grade: String,
    pub total: f64,
    #[serde(default)]
    pub week: String,
    #[serde(default)]
    pub user_id: Option<i64>,
}

/// All unpaid records, newest first.
pub async fn list_unpaid(db: &DatabaseConnection) -> Result<Vec<unpaid_record::Model>> {
    UnpaidRecord::find()
        .order_by_desc(unpaid_record::Column::CreatedAt)
        .order_by_desc(unpaid_record::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Adds an unpaid record by hand.
pub async fn create_unpaid(db: &DatabaseConnection, input: NewUnpaid) -> Result<unpaid_record::Model> {
    if input.name.trim().is_empty() {
        return Err(Error::validation("Name is required"));
    }
    if !input.total.is_finite() || input.total <= 0.0 {
        return Err(Error::validation(format!("Invalid total: {}", input.total)));
    }

    let created = unpaid_record::ActiveModel {
        name: Set(input.name.trim().to_string()),
        grade: Set(input.grade.trim().to_string()),
        total: Set(input.total),
        week: Set(input.week.trim().to_string()),
        user_id: Set(input.user_id),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!(unpaid_id = created.id, "Unpaid record added");
    Ok(created)
}

/// Removes an unpaid record, typically once the balance is settled.
pub async fn delete_unpaid(db: &DatabaseConnection, unpaid_id: i64) -> Result<()> {
    let result = UnpaidRecord::delete_by_id(unpaid_id).exec(db).await?;
    if result.rows_affected == 0 {
        return Err(Error::not_found("Unpaid record", unpaid_id));
    }
    info!(unpaid_id, "Unpaid record removed");
    Ok(())
}
