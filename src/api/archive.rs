//! Admin access to archived snapshots.

use crate::{
    api::{
        AppState,
        auth::AdminUser,
        extract::{Json, Path},
    },
    core::{
        archive::{self, UserArchives},
        weekday::Weekday,
    },
    entities::archived_order,
    errors::Result,
};
use axum::{extract::State, http::StatusCode};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchivedReceivedRequest {
    /// Position of the order inside the snapshot; defaults to the first
    #[serde(default)]
    pub weekly_order_index: Option<usize>,
    pub day: String,
    pub order_got: bool,
}

/// `GET /archived-orders`
pub async fn list(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<Vec<UserArchives>>> {
    Ok(Json(archive::list_users_with_archives(&state.database).await?))
}

/// `DELETE /archived-orders/{id}`
pub async fn delete(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(archived_id): Path<i64>,
) -> Result<StatusCode> {
    archive::delete_archived_order(&state.database, archived_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `PUT /archived-orders/order-got/{userId}/{archivedOrderId}`
pub async fn set_received(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path((user_id, archived_id)): Path<(i64, i64)>,
    Json(request): Json<ArchivedReceivedRequest>,
) -> Result<Json<archived_order::Model>> {
    let day = Weekday::parse(&request.day)?;
    let updated = archive::set_archived_day_received(
        &state.database,
        user_id,
        archived_id,
        request.weekly_order_index,
        day,
        request.order_got,
    )
    .await?;
    Ok(Json(updated))
}
