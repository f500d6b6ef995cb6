//! Storage boundary for the stock ledger
//!
//! Every stock write happens inside one [`StockTx`]: the unit that reads the
//! locked product rows, applies ledger deltas, appends journal entries and
//! writes sale or purchase-order rows. A unit is either committed as a whole
//! or dropped, in which case nothing it wrote becomes visible.
//!
//! Two implementations exist: [`PgStockStore`] for production and
//! [`InMemoryStockStore`] for tests and local development.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::{
    NewProduct, NewPurchaseOrder, NewPurchaseOrderItem, NewSale, NewSaleItem, NewStockMovement,
    Pagination, ProductStock, PurchaseOrder, PurchaseOrderItem, Sale, SaleItem, StockMovement,
};
use uuid::Uuid;

use crate::error::StockResult;

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryStockStore;
pub use postgres::PgStockStore;

/// Journal totals for one product
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct JournalSummary {
    pub balance: i64,
    pub movement_count: usize,
}

/// An open atomic unit over the stock tables.
///
/// Dropping the unit without calling [`StockTx::commit`] rolls it back.
#[async_trait]
pub trait StockTx: Send {
    /// Read a product and hold its row lock until the unit ends
    async fn lock_product(&mut self, product_id: Uuid) -> StockResult<Option<ProductStock>>;

    /// Lock several products in ascending id order. Missing ids are left out
    /// of the result.
    async fn lock_products(
        &mut self,
        product_ids: &[Uuid],
    ) -> StockResult<HashMap<Uuid, ProductStock>> {
        let mut ordered = product_ids.to_vec();
        ordered.sort();
        ordered.dedup();

        let mut locked = HashMap::with_capacity(ordered.len());
        for product_id in ordered {
            if let Some(product) = self.lock_product(product_id).await? {
                locked.insert(product_id, product);
            }
        }
        Ok(locked)
    }

    /// Add `delta` to the product's stock. Returns the new stock, or `None` when
    /// the result would be negative, in which case nothing is written.
    async fn apply_delta(&mut self, product_id: Uuid, delta: i32) -> StockResult<Option<i32>>;

    /// Append one immutable journal entry
    async fn append_movement(&mut self, movement: NewStockMovement) -> StockResult<StockMovement>;

    /// Journal totals for a product, as seen by this unit
    async fn journal_summary(&mut self, product_id: Uuid) -> StockResult<JournalSummary>;

    /// Insert a product with zero stock
    async fn insert_product(&mut self, product: NewProduct) -> StockResult<ProductStock>;

    /// Insert a sale header. The returned sale has no items yet.
    async fn insert_sale(&mut self, sale: NewSale) -> StockResult<Sale>;

    async fn insert_sale_item(&mut self, item: NewSaleItem) -> StockResult<SaleItem>;

    /// Insert a pending purchase order header. The returned order has no items yet.
    async fn insert_purchase_order(&mut self, order: NewPurchaseOrder)
        -> StockResult<PurchaseOrder>;

    async fn insert_purchase_order_item(
        &mut self,
        item: NewPurchaseOrderItem,
    ) -> StockResult<PurchaseOrderItem>;

    /// Read a purchase order with its items and hold its row lock until the unit ends
    async fn lock_purchase_order(&mut self, order_id: Uuid) -> StockResult<Option<PurchaseOrder>>;

    /// Transition a purchase order to `completed` and stamp the receipt time
    async fn mark_order_received(
        &mut self,
        order_id: Uuid,
        received_at: DateTime<Utc>,
    ) -> StockResult<()>;

    /// Make every write of this unit visible at once
    async fn commit(self: Box<Self>) -> StockResult<()>;
}

/// Entry point to the stock tables
#[async_trait]
pub trait StockStore: Send + Sync {
    /// Open a new atomic unit
    async fn begin(&self) -> StockResult<Box<dyn StockTx>>;

    /// Whether the backing storage answers
    async fn is_healthy(&self) -> bool;

    /// Committed view of a product
    async fn product(&self, product_id: Uuid) -> StockResult<Option<ProductStock>>;

    /// A product's journal, most recent first
    async fn movements(
        &self,
        product_id: Uuid,
        page: Pagination,
    ) -> StockResult<Vec<StockMovement>>;

    async fn sale(&self, sale_id: Uuid) -> StockResult<Option<Sale>>;

    /// Sales, most recent first
    async fn sales(&self, page: Pagination) -> StockResult<Vec<Sale>>;

    async fn purchase_order(&self, order_id: Uuid) -> StockResult<Option<PurchaseOrder>>;

    /// Purchase orders, most recent first
    async fn purchase_orders(&self, page: Pagination) -> StockResult<Vec<PurchaseOrder>>;
}
