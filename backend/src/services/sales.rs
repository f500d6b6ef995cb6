//! Sale service: checkout as one atomic unit
//!
//! A sale validates every line against locked stock, persists the header and
//! its lines, and debits the ledger with one SALE journal entry per line. Any
//! failure drops the unit, so either the whole sale exists or none of it does.

use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{
    check_sale_line, is_storable, line_subtotal, sale_total, ApprovedChange, NewSale,
    NewSaleItem, Pagination, PaymentMethod, ProductStock, ReferenceType, Sale,
};
use uuid::Uuid;
use validator::Validate;

use super::ledger::{post_change, MovementContext};
use crate::config::LedgerConfig;
use crate::error::{StockError, StockResult};
use crate::store::StockStore;

#[derive(Clone)]
pub struct SaleService {
    store: Arc<dyn StockStore>,
    ledger: LedgerConfig,
}

/// One requested sale line
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SaleLineInput {
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_price: Decimal,
}

/// Input for recording a sale
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RecordSaleInput {
    #[validate(length(min = 1))]
    pub items: Vec<SaleLineInput>,
    #[serde(default)]
    pub discount: Decimal,
    pub payment_method: PaymentMethod,
}

/// A line that passed validation, waiting to be written
struct PricedLine {
    product: ProductStock,
    change: ApprovedChange,
    unit_price: Decimal,
    subtotal: Decimal,
}

impl SaleService {
    pub fn new(store: Arc<dyn StockStore>, ledger: LedgerConfig) -> Self {
        Self { store, ledger }
    }

    /// Record a sale and debit stock for every line
    pub async fn record_sale(
        &self,
        input: RecordSaleInput,
        acting_user: Option<Uuid>,
    ) -> StockResult<Sale> {
        if input.items.is_empty() {
            return Err(StockError::invalid("items", "A sale needs at least one line"));
        }
        if input.discount < Decimal::ZERO {
            return Err(StockError::invalid("discount", "Discount cannot be negative"));
        }
        if !is_storable(input.discount) {
            return Err(StockError::invalid(
                "discount",
                "Discount must have at most two decimals and twelve integer digits",
            ));
        }
        if let Some(line) = input.items.iter().find(|l| l.unit_price <= Decimal::ZERO) {
            return Err(StockError::invalid(
                "unit_price",
                format!("Unit price must be positive (product {})", line.product_id),
            ));
        }
        if let Some(line) = input.items.iter().find(|l| !is_storable(l.unit_price)) {
            return Err(StockError::invalid(
                "unit_price",
                format!(
                    "Unit price must have at most two decimals and twelve integer digits (product {})",
                    line.product_id
                ),
            ));
        }

        let mut tx = self.store.begin().await?;

        let product_ids: Vec<Uuid> = input.items.iter().map(|l| l.product_id).collect();
        let locked = tx.lock_products(&product_ids).await?;

        // Stock left per product as earlier lines of this sale are applied
        let mut remaining: HashMap<Uuid, i32> =
            locked.iter().map(|(id, p)| (*id, p.stock)).collect();

        let mut lines = Vec::with_capacity(input.items.len());
        for line in &input.items {
            let product = locked
                .get(&line.product_id)
                .ok_or_else(|| StockError::product_not_found(line.product_id))?;
            let available = remaining
                .get(&line.product_id)
                .copied()
                .unwrap_or(product.stock);

            let change = check_sale_line(available, line.quantity)
                .map_err(|v| StockError::from_rule(v, &product.name))?;
            remaining.insert(line.product_id, change.stock_after);

            let subtotal = line_subtotal(line.quantity, line.unit_price)
                .filter(|subtotal| is_storable(*subtotal))
                .ok_or_else(|| {
                    StockError::invalid(
                        "total",
                        format!("Line subtotal is too large (product {})", line.product_id),
                    )
                })?;

            lines.push(PricedLine {
                product: product.clone(),
                change,
                unit_price: line.unit_price,
                subtotal,
            });
        }

        let total = sale_total(lines.iter().map(|l| l.subtotal), input.discount)
            .filter(|total| is_storable(*total))
            .ok_or_else(|| StockError::invalid("total", "Sale total is too large"))?;

        let mut sale = tx
            .insert_sale(NewSale {
                total,
                discount: input.discount,
                payment_method: input.payment_method,
                user_id: acting_user,
            })
            .await?;

        let mut posted = Vec::with_capacity(lines.len());
        for (idx, line) in lines.iter().enumerate() {
            let item = tx
                .insert_sale_item(NewSaleItem {
                    sale_id: sale.id,
                    line_no: idx as i32 + 1,
                    product_id: line.product.id,
                    quantity: line.change.quantity,
                    unit_price: line.unit_price,
                    subtotal: line.subtotal,
                })
                .await?;

            let context = MovementContext::referencing(ReferenceType::Sale, sale.id)
                .with_reason("Sale")
                .by(acting_user);
            let movement = post_change(tx.as_mut(), &line.product, line.change, context).await?;
            posted.push((movement, line.change.stock_after));

            sale.items.push(item);
        }

        tx.commit().await?;

        for (movement, stock_after) in &posted {
            tracing::info!(
                sale_id = %sale.id,
                product_id = %movement.product_id,
                movement_type = %movement.movement_type,
                quantity = movement.quantity,
                stock_after = *stock_after,
                "Sale line posted"
            );
        }

        tracing::info!(
            sale_id = %sale.id,
            lines = sale.items.len(),
            total = %sale.total,
            payment_method = sale.payment_method.as_str(),
            "Sale recorded"
        );

        Ok(sale)
    }

    /// Get a sale with its lines
    pub async fn get_sale(&self, sale_id: Uuid) -> StockResult<Sale> {
        self.store
            .sale(sale_id)
            .await?
            .ok_or_else(|| StockError::sale_not_found(sale_id))
    }

    /// List sales, most recent first
    pub async fn list_sales(&self, page: Pagination) -> StockResult<Vec<Sale>> {
        self.store
            .sales(page.clamped(self.ledger.max_page_size))
            .await
    }
}
