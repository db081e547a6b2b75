//! Menu publishing and retirement.

use crate::{
    api::{
        AppState,
        auth::AdminUser,
        csv_response,
        extract::{Json, Path, Query},
    },
    core::{
        archive::{self, RetirementSummary},
        menu::{self, MenuInput},
    },
    entities::menu as menu_entity,
    errors::Result,
};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub struct RetireQuery {
    #[serde(default)]
    pub download: bool,
}

/// `GET /menu` - the active menu, or `null`.
pub async fn current_menu(State(state): State<AppState>) -> Result<Json<Option<menu_entity::Model>>> {
    Ok(Json(menu::get_current_menu(&state.database).await?))
}

/// `POST /menu`
pub async fn create_menu(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(input): Json<MenuInput>,
) -> Result<(StatusCode, Json<menu_entity::Model>)> {
    let created = menu::create_menu(&state.database, input).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// `PUT /menu/{id}`
pub async fn update_menu(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(menu_id): Path<i64>,
    Json(input): Json<MenuInput>,
) -> Result<Json<menu_entity::Model>> {
    Ok(Json(menu::update_menu(&state.database, menu_id, input).await?))
}

/// `DELETE /menu/{id}?download=bool` - retires the menu. With `download=true`
/// the response is the CSV of the retired orders instead of the summary.
pub async fn retire_menu(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(menu_id): Path<i64>,
    Query(query): Query<RetireQuery>,
) -> Result<Response> {
    let mut summary: RetirementSummary =
        archive::retire_menu(&state.database, menu_id, query.download).await?;

    match summary.csv.take() {
        Some(csv) => Ok(csv_response(&format!("orders-{menu_id}.csv"), csv)),
        None => Ok(Json(summary).into_response()),
    }
}
