//! Delivered-count reconciliation endpoints, live and archived.

use crate::{
    api::{
        AppState,
        auth::AdminUser,
        extract::{Json, Path, Query},
    },
    core::{
        delivery::{self, DayReconciliation, DeliveryKey},
        menu::parse_week_date,
        weekday::Weekday,
    },
    entities::delivery_record::{self, DeliveredItem},
    errors::{Error, Result},
};
use axum::extract::State;
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveQuery {
    pub menu_id: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekQuery {
    pub week_start: Option<String>,
    pub week_end: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DeliveredRequest {
    #[serde(default)]
    pub items: Vec<DeliveredItem>,
}

fn required_date(value: Option<&str>, name: &str) -> Result<chrono::NaiveDate> {
    let value = value.ok_or_else(|| Error::validation(format!("{name} is required")))?;
    parse_week_date(value)
}

fn required_menu(query: &LiveQuery) -> Result<i64> {
    query
        .menu_id
        .ok_or_else(|| Error::validation("menuId is required"))
}

/// `GET /verify-count?menuId=`
pub async fn live_report(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(query): Query<LiveQuery>,
) -> Result<Json<Vec<DayReconciliation>>> {
    let menu_id = required_menu(&query)?;
    Ok(Json(delivery::live_week_report(&state.database, menu_id).await?))
}

/// `PUT /verify-count/{day}?menuId=`
pub async fn record_live(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(day): Path<String>,
    Query(query): Query<LiveQuery>,
    Json(request): Json<DeliveredRequest>,
) -> Result<Json<delivery_record::Model>> {
    let day = Weekday::parse(&day)?;
    let key = DeliveryKey::Live {
        menu_id: required_menu(&query)?,
    };
    Ok(Json(
        delivery::record_delivered(&state.database, key, day, request.items).await?,
    ))
}

/// `GET /verify-count-archived?weekStart=&weekEnd=`
pub async fn archived_report(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(query): Query<WeekQuery>,
) -> Result<Json<Vec<DayReconciliation>>> {
    let week_start = required_date(query.week_start.as_deref(), "weekStart")?;
    let week_end = required_date(query.week_end.as_deref(), "weekEnd")?;
    Ok(Json(
        delivery::archived_week_report(&state.database, week_start, week_end).await?,
    ))
}

/// `PUT /verify-count-archived/{day}?weekStart=`
pub async fn record_archived(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(day): Path<String>,
    Query(query): Query<WeekQuery>,
    Json(request): Json<DeliveredRequest>,
) -> Result<Json<delivery_record::Model>> {
    let day = Weekday::parse(&day)?;
    let key = DeliveryKey::Archived {
        week_start: required_date(query.week_start.as_deref(), "weekStart")?,
    };
    Ok(Json(
        delivery::record_delivered(&state.database, key, day, request.items).await?,
    ))
}
