//! Purchase order service: order creation and stock receipt
//!
//! Creating an order has no ledger effect. Receiving it credits every line
//! with an ENTRY journal entry and moves the order to `completed`, all in one
//! unit. A completed order is terminal.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{
    check_quantity, check_receipt_line, is_storable, order_total, NewPurchaseOrder,
    NewPurchaseOrderItem, Pagination, PurchaseOrder, PurchaseOrderStatus, ReferenceType,
};
use uuid::Uuid;
use validator::Validate;

use super::ledger::{post_change, MovementContext};
use crate::config::LedgerConfig;
use crate::error::{StockError, StockResult};
use crate::store::StockStore;

#[derive(Clone)]
pub struct PurchaseOrderService {
    store: Arc<dyn StockStore>,
    ledger: LedgerConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PurchaseOrderLineInput {
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_cost: Decimal,
}

/// Input for creating a purchase order
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreatePurchaseOrderInput {
    pub supplier_id: Uuid,
    #[validate(length(max = 500))]
    pub notes: Option<String>,
    #[validate(length(min = 1))]
    pub items: Vec<PurchaseOrderLineInput>,
}

impl PurchaseOrderService {
    pub fn new(store: Arc<dyn StockStore>, ledger: LedgerConfig) -> Self {
        Self { store, ledger }
    }

    /// Create a pending purchase order
    pub async fn create(&self, input: CreatePurchaseOrderInput) -> StockResult<PurchaseOrder> {
        if input.items.is_empty() {
            return Err(StockError::invalid(
                "items",
                "A purchase order needs at least one line",
            ));
        }
        for line in &input.items {
            check_quantity(line.quantity).map_err(|_| StockError::InvalidQuantity {
                quantity: line.quantity,
            })?;
            if line.unit_cost <= Decimal::ZERO {
                return Err(StockError::invalid(
                    "unit_cost",
                    format!("Unit cost must be positive (product {})", line.product_id),
                ));
            }
            if !is_storable(line.unit_cost) {
                return Err(StockError::invalid(
                    "unit_cost",
                    format!(
                        "Unit cost must have at most two decimals and twelve integer digits (product {})",
                        line.product_id
                    ),
                ));
            }
            if self.store.product(line.product_id).await?.is_none() {
                return Err(StockError::product_not_found(line.product_id));
            }
        }

        let total = order_total(input.items.iter().map(|l| (l.quantity, l.unit_cost)))
            .filter(|total| is_storable(*total))
            .ok_or_else(|| StockError::invalid("total", "Purchase order total is too large"))?;

        let mut tx = self.store.begin().await?;

        let mut order = tx
            .insert_purchase_order(NewPurchaseOrder {
                supplier_id: input.supplier_id,
                total,
                notes: input.notes,
            })
            .await?;

        for (idx, line) in input.items.iter().enumerate() {
            let item = tx
                .insert_purchase_order_item(NewPurchaseOrderItem {
                    purchase_order_id: order.id,
                    line_no: idx as i32 + 1,
                    product_id: line.product_id,
                    quantity: line.quantity,
                    unit_cost: line.unit_cost,
                })
                .await?;
            order.items.push(item);
        }

        tx.commit().await?;

        tracing::info!(
            order_id = %order.id,
            supplier_id = %order.supplier_id,
            lines = order.items.len(),
            total = %order.total,
            "Purchase order created"
        );

        Ok(order)
    }

    /// Mark a pending order as received and credit stock for every line
    pub async fn receive(
        &self,
        order_id: Uuid,
        acting_user: Option<Uuid>,
    ) -> StockResult<PurchaseOrder> {
        let mut tx = self.store.begin().await?;

        let mut order = tx
            .lock_purchase_order(order_id)
            .await?
            .ok_or_else(|| StockError::order_not_found(order_id))?;

        if !order.status.can_receive() {
            return Err(StockError::AlreadyReceived { order_id });
        }

        let product_ids: Vec<Uuid> = order.items.iter().map(|i| i.product_id).collect();
        let locked = tx.lock_products(&product_ids).await?;
        let mut current: HashMap<Uuid, i32> =
            locked.iter().map(|(id, p)| (*id, p.stock)).collect();

        let mut posted = Vec::with_capacity(order.items.len());
        for item in &order.items {
            let product = locked
                .get(&item.product_id)
                .ok_or_else(|| StockError::product_not_found(item.product_id))?;

            let stock = current
                .get(&item.product_id)
                .copied()
                .unwrap_or(product.stock);
            let change = check_receipt_line(stock, item.quantity)
                .map_err(|v| StockError::from_rule(v, &product.name))?;
            current.insert(item.product_id, change.stock_after);

            let context = MovementContext::referencing(ReferenceType::PurchaseOrder, order_id)
                .with_reason(format!("Purchase order {} received", order_id))
                .by(acting_user);
            let movement = post_change(tx.as_mut(), product, change, context).await?;
            posted.push((movement, change.stock_after));
        }

        let received_at = Utc::now();
        tx.mark_order_received(order_id, received_at).await?;
        tx.commit().await?;

        order.status = PurchaseOrderStatus::Completed;
        order.received_at = Some(received_at);

        for (movement, stock_after) in &posted {
            tracing::info!(
                order_id = %order_id,
                product_id = %movement.product_id,
                movement_type = %movement.movement_type,
                quantity = movement.quantity,
                stock_after = *stock_after,
                "Receipt line posted"
            );
        }
        tracing::info!(
            order_id = %order_id,
            lines = order.items.len(),
            "Purchase order received"
        );

        Ok(order)
    }

    /// Get a purchase order with its lines
    pub async fn get(&self, order_id: Uuid) -> StockResult<PurchaseOrder> {
        self.store
            .purchase_order(order_id)
            .await?
            .ok_or_else(|| StockError::order_not_found(order_id))
    }

    /// List purchase orders, most recent first
    pub async fn list(&self, page: Pagination) -> StockResult<Vec<PurchaseOrder>> {
        self.store
            .purchase_orders(page.clamped(self.ledger.max_page_size))
            .await
    }
}
