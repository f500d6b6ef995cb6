//! HTTP handlers for products, stock movements and reconciliation

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use shared::{ProductStock, ReconciliationReport, StockMovement};
use uuid::Uuid;
use validator::Validate;

use super::PageQuery;
use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::stock::{OpenProductInput, RecordMovementInput, StockService};
use crate::AppState;

fn stock_service(state: &AppState) -> StockService {
    StockService::new(state.store.clone(), state.config.ledger.clone())
}

/// Create a product with its opening stock
pub async fn open_product(
    State(state): State<AppState>,
    Json(input): Json<OpenProductInput>,
) -> AppResult<(StatusCode, Json<ProductStock>)> {
    input.validate()?;
    let product = stock_service(&state).open_product(input).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// Get a product's current stock
pub async fn get_product_stock(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> AppResult<Json<ProductStock>> {
    let product = stock_service(&state).product_stock(product_id).await?;
    Ok(Json(product))
}

/// Compare a product's stock with its journal
pub async fn get_reconciliation(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> AppResult<Json<ReconciliationReport>> {
    let report = stock_service(&state).reconcile(product_id).await?;
    Ok(Json(report))
}

/// Record a stock movement
pub async fn record_movement(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<RecordMovementInput>,
) -> AppResult<(StatusCode, Json<StockMovement>)> {
    input.validate()?;
    let movement = stock_service(&state)
        .record_movement(input, Some(current_user.0.user_id))
        .await?;
    Ok((StatusCode::CREATED, Json(movement)))
}

/// Movement history of a product, most recent first
pub async fn get_movement_history(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<Vec<StockMovement>>> {
    let page = query.resolve(&state.config.ledger);
    let movements = stock_service(&state)
        .movement_history(product_id, page)
        .await?;
    Ok(Json(movements))
}
