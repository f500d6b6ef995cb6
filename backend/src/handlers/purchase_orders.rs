//! HTTP handlers for purchase orders

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use shared::PurchaseOrder;
use uuid::Uuid;
use validator::Validate;

use super::PageQuery;
use crate::error::AppResult;
use crate::middleware::ActingUser;
use crate::services::purchase_orders::{CreatePurchaseOrderInput, PurchaseOrderService};
use crate::AppState;

fn purchase_order_service(state: &AppState) -> PurchaseOrderService {
    PurchaseOrderService::new(state.store.clone(), state.config.ledger.clone())
}

/// Create a pending purchase order
pub async fn create_purchase_order(
    State(state): State<AppState>,
    Json(input): Json<CreatePurchaseOrderInput>,
) -> AppResult<(StatusCode, Json<PurchaseOrder>)> {
    input.validate()?;
    let order = purchase_order_service(&state).create(input).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// Receive a purchase order into stock
pub async fn receive_purchase_order(
    State(state): State<AppState>,
    ActingUser(acting_user): ActingUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<PurchaseOrder>> {
    let order = purchase_order_service(&state)
        .receive(order_id, acting_user)
        .await?;
    Ok(Json(order))
}

/// Get a purchase order with its lines
pub async fn get_purchase_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<PurchaseOrder>> {
    let order = purchase_order_service(&state).get(order_id).await?;
    Ok(Json(order))
}

/// List purchase orders, most recent first
pub async fn list_purchase_orders(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<Vec<PurchaseOrder>>> {
    let page = query.resolve(&state.config.ledger);
    let orders = purchase_order_service(&state).list(page).await?;
    Ok(Json(orders))
}
