//! The single place where on-hand stock changes
//!
//! [`post_change`] applies an approved delta to the ledger and appends the
//! matching journal entry inside the caller's unit of work. Every write path
//! goes through it, which keeps stock equal to the journal's running balance.

use shared::{ApprovedChange, NewStockMovement, ProductStock, ReferenceType, StockMovement};
use uuid::Uuid;

use crate::error::{StockError, StockResult};
use crate::store::StockTx;

/// Who and what caused a ledger change
#[derive(Debug, Clone, Default)]
pub struct MovementContext {
    pub reason: Option<String>,
    pub reference_type: Option<ReferenceType>,
    pub reference_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
}

impl MovementContext {
    pub fn referencing(reference_type: ReferenceType, reference_id: Uuid) -> Self {
        Self {
            reference_type: Some(reference_type),
            reference_id: Some(reference_id),
            ..Self::default()
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn by(mut self, user_id: Option<Uuid>) -> Self {
        self.user_id = user_id;
        self
    }
}

/// Apply `change` to `product` and journal it, both inside `tx`
pub async fn post_change(
    tx: &mut dyn StockTx,
    product: &ProductStock,
    change: ApprovedChange,
    context: MovementContext,
) -> StockResult<StockMovement> {
    let stock_after = tx
        .apply_delta(product.id, change.delta)
        .await?
        .ok_or_else(|| StockError::InsufficientStock {
            product_name: product.name.clone(),
            available: change.stock_after - change.delta,
            requested: change.quantity,
        })?;

    let movement = tx
        .append_movement(NewStockMovement {
            product_id: product.id,
            movement_type: change.movement_type,
            direction: change.direction,
            quantity: change.quantity,
            reason: context.reason,
            reference_type: context.reference_type,
            reference_id: context.reference_id,
            user_id: context.user_id,
        })
        .await?;

    tracing::debug!(
        product_id = %product.id,
        movement_type = %change.movement_type,
        quantity = change.quantity,
        stock_after,
        "Ledger change staged"
    );

    Ok(movement)
}
