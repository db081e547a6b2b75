//! HTTP surface of the canteen service.
//!
//! Handlers are thin: they extract the caller and the request, call into
//! [`crate::core`], and serialize the result. Errors render through
//! [`crate::errors::Error`]'s `IntoResponse` implementation.

pub mod admin;
pub mod archive;
pub mod auth;
pub mod delivery;
pub mod error;
pub mod extract;
pub mod identity;
pub mod menu;
pub mod orders;
pub mod session;

use crate::config::AppConfig;
use axum::{
    Router,
    http::header,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use identity::{GoogleTokenInfo, IdentityProvider, VerifiedIdentity};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub database: DatabaseConnection,
    pub config: Arc<AppConfig>,
    pub identity: Arc<dyn IdentityProvider>,
}

/// A `text/csv` attachment response.
pub(crate) fn csv_response(filename: &str, body: String) -> Response {
    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
            (header::CACHE_CONTROL, "no-store".to_string()),
        ],
        body,
    )
        .into_response()
}

/// Builds the full router.
pub fn create_router(state: AppState) -> Router {
    let session = Router::new()
        .route("/auth/google-signin", post(session::google_signin))
        .route("/auth/user", get(session::current_user))
        .route("/auth/grade", put(session::set_grade));

    let menus = Router::new()
        .route("/menu", get(menu::current_menu).post(menu::create_menu))
        .route("/menu/{id}", put(menu::update_menu).delete(menu::retire_menu));

    let ledger = Router::new()
        .route("/order", post(orders::submit_order))
        .route("/my-orders", get(orders::my_orders))
        .route("/old-orders", get(orders::old_orders))
        .route("/orders", get(orders::list_orders))
        .route("/orders/download", get(orders::download))
        .route("/orders/paid/{user_id}/{order_id}", put(orders::mark_paid))
        .route("/orders/order-got/{user_id}/{order_id}", put(orders::set_received))
        .route("/orders/{user_id}/{order_id}", delete(orders::delete_order));

    let archives = Router::new()
        .route("/archived-orders", get(archive::list))
        .route("/archived-orders/{id}", delete(archive::delete))
        .route(
            "/archived-orders/order-got/{user_id}/{archived_id}",
            put(archive::set_received),
        );

    let reconciliation = Router::new()
        .route("/verify-count", get(delivery::live_report))
        .route("/verify-count/{day}", put(delivery::record_live))
        .route("/verify-count-archived", get(delivery::archived_report))
        .route("/verify-count-archived/{day}", put(delivery::record_archived));

    let administration = Router::new()
        .route("/students", get(admin::list_students))
        .route("/students/{id}", delete(admin::delete_student))
        .route("/unpaid", get(admin::list_unpaid).post(admin::create_unpaid))
        .route("/unpaid/{id}", delete(admin::delete_unpaid))
        .route("/statistics", get(admin::statistics))
        .route("/top-meals", get(admin::top_meals));

    Router::new()
        .merge(session)
        .merge(menus)
        .merge(ledger)
        .merge(archives)
        .merge(reconciliation)
        .merge(administration)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
