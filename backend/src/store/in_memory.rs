//! In-memory stock store.
//!
//! Intended for tests and local development. Units of work are serialised
//! behind one async mutex: a unit works on a private copy of the state and
//! publishes it on commit, so an abandoned unit leaves no trace.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::{
    NewProduct, NewPurchaseOrder, NewPurchaseOrderItem, NewSale, NewSaleItem, NewStockMovement,
    Pagination, ProductStock, PurchaseOrder, PurchaseOrderItem, PurchaseOrderStatus, Sale,
    SaleItem, StockMovement,
};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{JournalSummary, StockStore, StockTx};
use crate::error::{StockError, StockResult};

#[derive(Debug, Default, Clone)]
struct LedgerState {
    /// Known suppliers; purchase orders must name one of them
    suppliers: HashSet<Uuid>,
    products: Vec<ProductStock>,
    /// Journal in append order
    movements: Vec<StockMovement>,
    /// Sales in creation order
    sales: Vec<Sale>,
    /// Purchase orders in creation order
    purchase_orders: Vec<PurchaseOrder>,
}

impl LedgerState {
    fn product_mut(&mut self, product_id: Uuid) -> StockResult<&mut ProductStock> {
        self.products
            .iter_mut()
            .find(|p| p.id == product_id)
            .ok_or_else(|| StockError::product_not_found(product_id))
    }

    fn order_mut(&mut self, order_id: Uuid) -> StockResult<&mut PurchaseOrder> {
        self.purchase_orders
            .iter_mut()
            .find(|o| o.id == order_id)
            .ok_or_else(|| StockError::order_not_found(order_id))
    }
}

/// In-memory stock store
#[derive(Debug, Clone, Default)]
pub struct InMemoryStockStore {
    state: Arc<Mutex<LedgerState>>,
    /// Countdown of journal appends until an injected failure; 0 disables it
    failing_append: Arc<AtomicUsize>,
}

impl InMemoryStockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store with the given suppliers already registered
    pub fn with_suppliers(suppliers: impl IntoIterator<Item = Uuid>) -> Self {
        let state = LedgerState {
            suppliers: suppliers.into_iter().collect(),
            ..LedgerState::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
            failing_append: Arc::default(),
        }
    }

    /// Make the `n`-th journal append from now fail with a persistence error.
    ///
    /// Used to check that a unit which fails half-way leaves no partial writes.
    pub fn fail_nth_movement_append(&self, n: usize) {
        self.failing_append.store(n, Ordering::SeqCst);
    }

    /// Number of journal entries across all products
    pub async fn movement_count(&self) -> usize {
        self.state.lock().await.movements.len()
    }

    /// Full journal of a product in append order
    pub async fn journal(&self, product_id: Uuid) -> Vec<StockMovement> {
        self.state
            .lock()
            .await
            .movements
            .iter()
            .filter(|m| m.product_id == product_id)
            .cloned()
            .collect()
    }
}

fn page_of<T>(items: impl Iterator<Item = T>, page: Pagination) -> Vec<T> {
    items
        .skip(page.offset() as usize)
        .take(page.limit() as usize)
        .collect()
}

#[async_trait]
impl StockStore for InMemoryStockStore {
    async fn begin(&self) -> StockResult<Box<dyn StockTx>> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(InMemoryTx {
            guard,
            working,
            failing_append: self.failing_append.clone(),
        }))
    }

    async fn is_healthy(&self) -> bool {
        true
    }

    async fn product(&self, product_id: Uuid) -> StockResult<Option<ProductStock>> {
        let state = self.state.lock().await;
        Ok(state.products.iter().find(|p| p.id == product_id).cloned())
    }

    async fn movements(
        &self,
        product_id: Uuid,
        page: Pagination,
    ) -> StockResult<Vec<StockMovement>> {
        let state = self.state.lock().await;
        let newest_first = state
            .movements
            .iter()
            .rev()
            .filter(|m| m.product_id == product_id)
            .cloned();
        Ok(page_of(newest_first, page))
    }

    async fn sale(&self, sale_id: Uuid) -> StockResult<Option<Sale>> {
        let state = self.state.lock().await;
        Ok(state.sales.iter().find(|s| s.id == sale_id).cloned())
    }

    async fn sales(&self, page: Pagination) -> StockResult<Vec<Sale>> {
        let state = self.state.lock().await;
        Ok(page_of(state.sales.iter().rev().cloned(), page))
    }

    async fn purchase_order(&self, order_id: Uuid) -> StockResult<Option<PurchaseOrder>> {
        let state = self.state.lock().await;
        Ok(state
            .purchase_orders
            .iter()
            .find(|o| o.id == order_id)
            .cloned())
    }

    async fn purchase_orders(&self, page: Pagination) -> StockResult<Vec<PurchaseOrder>> {
        let state = self.state.lock().await;
        Ok(page_of(state.purchase_orders.iter().rev().cloned(), page))
    }
}

/// A unit of work holding the store lock and a private copy of the state
struct InMemoryTx {
    guard: OwnedMutexGuard<LedgerState>,
    working: LedgerState,
    failing_append: Arc<AtomicUsize>,
}

impl InMemoryTx {
    fn injected_failure(&self) -> bool {
        self.failing_append
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .map(|previous| previous == 1)
            .unwrap_or(false)
    }
}

#[async_trait]
impl StockTx for InMemoryTx {
    async fn lock_product(&mut self, product_id: Uuid) -> StockResult<Option<ProductStock>> {
        Ok(self
            .working
            .products
            .iter()
            .find(|p| p.id == product_id)
            .cloned())
    }

    async fn apply_delta(&mut self, product_id: Uuid, delta: i32) -> StockResult<Option<i32>> {
        let product = self.working.product_mut(product_id)?;
        match product.stock.checked_add(delta) {
            Some(next) if next >= 0 => {
                product.stock = next;
                Ok(Some(next))
            }
            _ => Ok(None),
        }
    }

    async fn append_movement(&mut self, movement: NewStockMovement) -> StockResult<StockMovement> {
        if self.injected_failure() {
            return Err(StockError::Persistence(sqlx::Error::Protocol(
                "injected journal append failure".to_string(),
            )));
        }

        let stored = StockMovement {
            id: Uuid::new_v4(),
            product_id: movement.product_id,
            movement_type: movement.movement_type,
            direction: movement.direction,
            quantity: movement.quantity,
            reason: movement.reason,
            reference_type: movement.reference_type,
            reference_id: movement.reference_id,
            user_id: movement.user_id,
            created_at: Utc::now(),
        };
        self.working.movements.push(stored.clone());
        Ok(stored)
    }

    async fn journal_summary(&mut self, product_id: Uuid) -> StockResult<JournalSummary> {
        let journal: Vec<&StockMovement> = self
            .working
            .movements
            .iter()
            .filter(|m| m.product_id == product_id)
            .collect();
        Ok(JournalSummary {
            balance: shared::journal_balance(journal.iter().copied()),
            movement_count: journal.len(),
        })
    }

    async fn insert_product(&mut self, product: NewProduct) -> StockResult<ProductStock> {
        if self.working.products.iter().any(|p| p.sku == product.sku) {
            return Err(StockError::invalid(
                "sku",
                format!("A product with SKU {} already exists", product.sku),
            ));
        }
        let stored = ProductStock {
            id: Uuid::new_v4(),
            name: product.name,
            sku: product.sku,
            stock: 0,
            min_stock: product.min_stock,
            created_at: Utc::now(),
        };
        self.working.products.push(stored.clone());
        Ok(stored)
    }

    async fn insert_sale(&mut self, sale: NewSale) -> StockResult<Sale> {
        let stored = Sale {
            id: Uuid::new_v4(),
            total: sale.total,
            discount: sale.discount,
            payment_method: sale.payment_method,
            user_id: sale.user_id,
            created_at: Utc::now(),
            items: Vec::new(),
        };
        self.working.sales.push(stored.clone());
        Ok(stored)
    }

    async fn insert_sale_item(&mut self, item: NewSaleItem) -> StockResult<SaleItem> {
        let stored = SaleItem {
            id: Uuid::new_v4(),
            sale_id: item.sale_id,
            line_no: item.line_no,
            product_id: item.product_id,
            quantity: item.quantity,
            unit_price: item.unit_price,
            subtotal: item.subtotal,
        };
        let sale = self
            .working
            .sales
            .iter_mut()
            .find(|s| s.id == item.sale_id)
            .ok_or_else(|| StockError::sale_not_found(item.sale_id))?;
        sale.items.push(stored.clone());
        Ok(stored)
    }

    async fn insert_purchase_order(
        &mut self,
        order: NewPurchaseOrder,
    ) -> StockResult<PurchaseOrder> {
        if !self.working.suppliers.contains(&order.supplier_id) {
            return Err(StockError::NotFound {
                entity: "Supplier",
                id: order.supplier_id,
            });
        }
        let stored = PurchaseOrder {
            id: Uuid::new_v4(),
            supplier_id: order.supplier_id,
            status: PurchaseOrderStatus::Pending,
            total: order.total,
            notes: order.notes,
            created_at: Utc::now(),
            received_at: None,
            items: Vec::new(),
        };
        self.working.purchase_orders.push(stored.clone());
        Ok(stored)
    }

    async fn insert_purchase_order_item(
        &mut self,
        item: NewPurchaseOrderItem,
    ) -> StockResult<PurchaseOrderItem> {
        let stored = PurchaseOrderItem {
            id: Uuid::new_v4(),
            purchase_order_id: item.purchase_order_id,
            line_no: item.line_no,
            product_id: item.product_id,
            quantity: item.quantity,
            unit_cost: item.unit_cost,
        };
        self.working
            .order_mut(item.purchase_order_id)?
            .items
            .push(stored.clone());
        Ok(stored)
    }

    async fn lock_purchase_order(&mut self, order_id: Uuid) -> StockResult<Option<PurchaseOrder>> {
        Ok(self
            .working
            .purchase_orders
            .iter()
            .find(|o| o.id == order_id)
            .cloned())
    }

    async fn mark_order_received(
        &mut self,
        order_id: Uuid,
        received_at: DateTime<Utc>,
    ) -> StockResult<()> {
        let order = self.working.order_mut(order_id)?;
        order.status = PurchaseOrderStatus::Completed;
        order.received_at = Some(received_at);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StockResult<()> {
        let InMemoryTx {
            mut guard, working, ..
        } = *self;
        *guard = working;
        Ok(())
    }
}
