//! Student management, the unpaid ledger, and reporting.

use crate::{
    api::{
        AppState,
        auth::{AdminUser, AuthUser},
        extract::{Json, Path},
    },
    core::{
        statistics::{self, Statistics},
        unpaid::{self, NewUnpaid},
        user as user_core,
    },
    entities::{top_meal, unpaid_record, user},
    errors::Result,
};
use axum::{extract::State, http::StatusCode};

/// Number of entries returned by `GET /top-meals`.
pub const TOP_MEALS_LIMIT: u64 = 5;

/// `GET /students`
pub async fn list_students(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<Vec<user::Model>>> {
    Ok(Json(user_core::list_students(&state.database).await?))
}

/// `DELETE /students/{id}`
pub async fn delete_student(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(user_id): Path<i64>,
) -> Result<StatusCode> {
    user_core::delete_student(&state.database, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /unpaid`
pub async fn list_unpaid(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<Vec<unpaid_record::Model>>> {
    Ok(Json(unpaid::list_unpaid(&state.database).await?))
}

/// `POST /unpaid`
pub async fn create_unpaid(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(input): Json<NewUnpaid>,
) -> Result<(StatusCode, Json<unpaid_record::Model>)> {
    let created = unpaid::create_unpaid(&state.database, input).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// `DELETE /unpaid/{id}`
pub async fn delete_unpaid(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(unpaid_id): Path<i64>,
) -> Result<StatusCode> {
    unpaid::delete_unpaid(&state.database, unpaid_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /statistics`
pub async fn statistics(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<Statistics>> {
    Ok(Json(statistics::statistics(&state.database).await?))
}

/// `GET /top-meals`
pub async fn top_meals(
    State(state): State<AppState>,
    _caller: AuthUser,
) -> Result<Json<Vec<top_meal::Model>>> {
    Ok(Json(
        statistics::top_meals(&state.database, TOP_MEALS_LIMIT).await?,
    ))
}
