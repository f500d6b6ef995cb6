//! Route definitions for the Product Tracker API

use axum::{
    routing::{get, patch, post},
    Router,
};

use crate::{handlers, AppState};

/// Create API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/products", product_routes())
        .nest("/stock-movements", movement_routes())
        .nest("/sales", sale_routes())
        .nest("/purchase-orders", purchase_order_routes())
}

fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::open_product))
        .route("/:product_id/stock", get(handlers::get_product_stock))
        .route(
            "/:product_id/reconciliation",
            get(handlers::get_reconciliation),
        )
}

fn movement_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::record_movement))
        .route("/:product_id", get(handlers::get_movement_history))
}

fn sale_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_sales).post(handlers::record_sale))
        .route("/:sale_id", get(handlers::get_sale))
}

fn purchase_order_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_purchase_orders).post(handlers::create_purchase_order),
        )
        .route("/:order_id", get(handlers::get_purchase_order))
        .route(
            "/:order_id/receive",
            patch(handlers::receive_purchase_order),
        )
}
