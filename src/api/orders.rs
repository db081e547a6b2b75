//! Order submission and the admin side of the order ledger.

use crate::{
    api::{
        AppState,
        auth::{AdminUser, AuthUser},
        csv_response,
        extract::{Json, Path, Query},
    },
    core::{
        archive::{self, OrderDeletion},
        export,
        menu::parse_week_date,
        order::{self, Selection, UserOrders},
        weekday::Weekday,
    },
    entities::{archived_order, weekly_order},
    errors::{Error, Result},
};
use axum::{
    extract::State,
    http::StatusCode,
    response::Response,
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitOrderRequest {
    /// Menu the client ordered from; must still be the active menu
    #[serde(default)]
    pub menu_id: Option<i64>,
    pub days: Selection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuQuery {
    pub menu_id: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RangeQuery {
    pub from: Option<String>,
    pub to: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceivedRequest {
    pub day: String,
    pub order_got: bool,
}

/// `POST /order`
pub async fn submit_order(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(request): Json<SubmitOrderRequest>,
) -> Result<(StatusCode, Json<weekly_order::Model>)> {
    let created =
        order::submit_order(&state.database, user.id, request.menu_id, &request.days).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// `GET /my-orders`
pub async fn my_orders(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<Vec<weekly_order::Model>>> {
    Ok(Json(order::orders_for_user(&state.database, user.id).await?))
}

/// `GET /old-orders?from=&to=`
pub async fn old_orders(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(range): Query<RangeQuery>,
) -> Result<Json<Vec<archived_order::Model>>> {
    let from = range.from.as_deref().map(parse_week_date).transpose()?;
    let to = range.to.as_deref().map(parse_week_date).transpose()?;
    let archives = archive::archived_orders_for_user(&state.database, user.id, from, to).await?;
    Ok(Json(archives))
}

/// `GET /orders?menuId=`
pub async fn list_orders(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(query): Query<MenuQuery>,
) -> Result<Json<Vec<UserOrders>>> {
    Ok(Json(
        order::list_orders_with_users(&state.database, query.menu_id).await?,
    ))
}

/// `PUT /orders/paid/{userId}/{orderId}`
pub async fn mark_paid(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path((user_id, order_id)): Path<(i64, i64)>,
) -> Result<Json<weekly_order::Model>> {
    Ok(Json(
        order::mark_paid(&state.database, admin.id, user_id, order_id).await?,
    ))
}

/// `DELETE /orders/{userId}/{orderId}?menuId=`
pub async fn delete_order(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path((user_id, order_id)): Path<(i64, i64)>,
    Query(query): Query<MenuQuery>,
) -> Result<Json<OrderDeletion>> {
    Ok(Json(
        archive::delete_order(&state.database, user_id, order_id, query.menu_id).await?,
    ))
}

/// `PUT /orders/order-got/{userId}/{orderId}`
pub async fn set_received(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path((user_id, order_id)): Path<(i64, i64)>,
    Json(request): Json<ReceivedRequest>,
) -> Result<Json<weekly_order::Model>> {
    let day = Weekday::parse(&request.day)?;
    Ok(Json(
        order::set_day_received(&state.database, user_id, order_id, day, request.order_got)
            .await?,
    ))
}

/// `GET /orders/download?menuId=`
pub async fn download(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(query): Query<MenuQuery>,
) -> Result<Response> {
    let menu_id = query
        .menu_id
        .ok_or_else(|| Error::validation("menuId is required"))?;
    let csv = export::download_csv(&state.database, menu_id).await?;
    Ok(csv_response("orders.csv", csv))
}
