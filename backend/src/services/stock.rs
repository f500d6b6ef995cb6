//! Stock service: direct stock movements, product opening balances,
//! movement history and reconciliation

use std::sync::Arc;

use serde::Deserialize;
use shared::{
    check_movement, check_receipt_line, MovementType, NewProduct, Pagination, ProductStock,
    ReconciliationReport, ReferenceType, StockDirection, StockMovement,
};
use uuid::Uuid;
use validator::Validate;

use super::ledger::{post_change, MovementContext};
use crate::config::LedgerConfig;
use crate::error::{StockError, StockResult};
use crate::store::StockStore;

/// Stock service for the direct-movement entry point and ledger reads
#[derive(Clone)]
pub struct StockService {
    store: Arc<dyn StockStore>,
    ledger: LedgerConfig,
}

/// Input for creating a product together with its opening stock
#[derive(Debug, Deserialize, Validate)]
pub struct OpenProductInput {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(min = 1, max = 100))]
    pub sku: String,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub min_stock: i32,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub initial_stock: i32,
}

/// Input for recording a stock movement
#[derive(Debug, Deserialize, Validate)]
pub struct RecordMovementInput {
    pub product_id: Uuid,
    #[serde(rename = "type")]
    pub movement_type: MovementType,
    /// Required for ADJUSTMENT, optional otherwise
    pub direction: Option<StockDirection>,
    pub quantity: i32,
    #[validate(length(max = 500))]
    pub reason: Option<String>,
    pub reference_type: Option<ReferenceType>,
    pub reference_id: Option<Uuid>,
}

impl StockService {
    /// Create a new StockService instance
    pub fn new(store: Arc<dyn StockStore>, ledger: LedgerConfig) -> Self {
        Self { store, ledger }
    }

    /// Create a product and journal its opening balance as an ENTRY
    pub async fn open_product(&self, input: OpenProductInput) -> StockResult<ProductStock> {
        if input.min_stock < 0 {
            return Err(StockError::invalid("min_stock", "Minimum stock cannot be negative"));
        }
        if input.initial_stock < 0 {
            return Err(StockError::InvalidQuantity {
                quantity: input.initial_stock,
            });
        }

        let mut tx = self.store.begin().await?;

        let mut product = tx
            .insert_product(NewProduct {
                name: input.name,
                sku: input.sku,
                min_stock: input.min_stock,
            })
            .await?;

        if input.initial_stock > 0 {
            let change = check_receipt_line(product.stock, input.initial_stock)
                .map_err(|v| StockError::from_rule(v, &product.name))?;
            post_change(
                tx.as_mut(),
                &product,
                change,
                MovementContext::default().with_reason("Opening balance"),
            )
            .await?;
            product.stock = change.stock_after;
        }

        tx.commit().await?;

        tracing::info!(
            product_id = %product.id,
            sku = %product.sku,
            stock = product.stock,
            "Product opened"
        );

        Ok(product)
    }

    /// Record a stock movement and update the product's stock in one unit
    pub async fn record_movement(
        &self,
        input: RecordMovementInput,
        acting_user: Option<Uuid>,
    ) -> StockResult<StockMovement> {
        if input.reference_type.is_some() != input.reference_id.is_some() {
            return Err(StockError::invalid(
                "reference",
                "reference_type and reference_id must be given together",
            ));
        }

        let mut tx = self.store.begin().await?;

        let product = tx
            .lock_product(input.product_id)
            .await?
            .ok_or_else(|| StockError::product_not_found(input.product_id))?;

        let change = check_movement(
            product.stock,
            input.movement_type,
            input.direction,
            input.quantity,
        )
        .map_err(|v| StockError::from_rule(v, &product.name))?;

        let context = MovementContext {
            reason: input.reason,
            reference_type: input.reference_type,
            reference_id: input.reference_id,
            user_id: acting_user,
        };
        let movement = post_change(tx.as_mut(), &product, change, context).await?;

        tx.commit().await?;

        tracing::info!(
            product_id = %product.id,
            movement_type = %movement.movement_type,
            direction = %movement.direction,
            quantity = movement.quantity,
            stock_after = change.stock_after,
            "Stock movement recorded"
        );

        if change.stock_after <= product.min_stock {
            tracing::info!(
                product_id = %product.id,
                stock = change.stock_after,
                min_stock = product.min_stock,
                "Product at or below minimum stock"
            );
        }

        Ok(movement)
    }

    /// Movement history for a product, most recent first
    pub async fn movement_history(
        &self,
        product_id: Uuid,
        page: Pagination,
    ) -> StockResult<Vec<StockMovement>> {
        self.product_stock(product_id).await?;
        let page = page.clamped(self.ledger.max_page_size);
        self.store.movements(product_id, page).await
    }

    /// Page used when the caller gives none
    pub fn default_page(&self) -> Pagination {
        Pagination::new(1, self.ledger.default_page_size)
    }

    /// Current ledger quantity of a product
    pub async fn product_stock(&self, product_id: Uuid) -> StockResult<ProductStock> {
        self.store
            .product(product_id)
            .await?
            .ok_or_else(|| StockError::product_not_found(product_id))
    }

    /// Compare a product's stock with the accumulated effect of its journal.
    ///
    /// Both values are read under the product's row lock so no write can land
    /// between them. The unit writes nothing and is rolled back.
    pub async fn reconcile(&self, product_id: Uuid) -> StockResult<ReconciliationReport> {
        let mut tx = self.store.begin().await?;

        let product = tx
            .lock_product(product_id)
            .await?
            .ok_or_else(|| StockError::product_not_found(product_id))?;
        let journal = tx.journal_summary(product_id).await?;
        drop(tx);

        let consistent = i64::from(product.stock) == journal.balance;
        if !consistent {
            tracing::error!(
                product_id = %product_id,
                stock = product.stock,
                journal_balance = journal.balance,
                "Ledger does not reconcile with journal"
            );
        }

        Ok(ReconciliationReport {
            product_id,
            stock: product.stock,
            journal_balance: journal.balance,
            movement_count: journal.movement_count,
            consistent,
        })
    }
}
