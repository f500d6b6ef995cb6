//! HTTP handlers for sales

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use shared::Sale;
use uuid::Uuid;
use validator::Validate;

use super::PageQuery;
use crate::error::AppResult;
use crate::middleware::ActingUser;
use crate::services::sales::{RecordSaleInput, SaleService};
use crate::AppState;

fn sale_service(state: &AppState) -> SaleService {
    SaleService::new(state.store.clone(), state.config.ledger.clone())
}

/// Record a sale
pub async fn record_sale(
    State(state): State<AppState>,
    ActingUser(acting_user): ActingUser,
    Json(input): Json<RecordSaleInput>,
) -> AppResult<(StatusCode, Json<Sale>)> {
    input.validate()?;
    let sale = sale_service(&state).record_sale(input, acting_user).await?;
    Ok((StatusCode::CREATED, Json(sale)))
}

/// Get a sale with its lines
pub async fn get_sale(
    State(state): State<AppState>,
    Path(sale_id): Path<Uuid>,
) -> AppResult<Json<Sale>> {
    let sale = sale_service(&state).get_sale(sale_id).await?;
    Ok(Json(sale))
}

/// List sales, most recent first
pub async fn list_sales(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<Vec<Sale>>> {
    let page = query.resolve(&state.config.ledger);
    let sales = sale_service(&state).list_sales(page).await?;
    Ok(Json(sales))
}
