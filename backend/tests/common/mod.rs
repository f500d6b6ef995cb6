//! Test fixtures shared by the ledger integration tests

#![allow(dead_code)]

use std::str::FromStr;
use std::sync::Arc;

use product_tracker_backend::config::LedgerConfig;
use product_tracker_backend::services::purchase_orders::{
    CreatePurchaseOrderInput, PurchaseOrderLineInput,
};
use product_tracker_backend::services::sales::{RecordSaleInput, SaleLineInput};
use product_tracker_backend::services::stock::{OpenProductInput, RecordMovementInput};
use product_tracker_backend::services::{PurchaseOrderService, SaleService, StockService};
use product_tracker_backend::store::{InMemoryStockStore, StockStore};
use rust_decimal::Decimal;
use shared::{MovementType, PaymentMethod, ProductStock, StockDirection};
use uuid::Uuid;

/// Supplier registered in every fixture store
pub const SUPPLIER_ID: Uuid = Uuid::from_u128(0x5eed_0000_0000_4000_8000_0000_0000_0001);

// Helper to create Decimal from string
pub fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

/// The three write paths wired to one in-memory store
#[derive(Clone)]
pub struct Ledger {
    pub store: InMemoryStockStore,
    pub stock: StockService,
    pub sales: SaleService,
    pub orders: PurchaseOrderService,
}

pub fn ledger() -> Ledger {
    let store = InMemoryStockStore::with_suppliers([SUPPLIER_ID]);
    let handle: Arc<dyn StockStore> = Arc::new(store.clone());
    let config = LedgerConfig::default();

    Ledger {
        stock: StockService::new(handle.clone(), config.clone()),
        sales: SaleService::new(handle.clone(), config.clone()),
        orders: PurchaseOrderService::new(handle, config),
        store,
    }
}

impl Ledger {
    /// Open a product whose opening balance is journaled as an ENTRY
    pub async fn product(&self, sku: &str, stock: i32, min_stock: i32) -> ProductStock {
        self.stock
            .open_product(OpenProductInput {
                name: format!("Product {}", sku),
                sku: sku.to_string(),
                min_stock,
                initial_stock: stock,
            })
            .await
            .unwrap()
    }

    pub async fn stock_of(&self, product_id: Uuid) -> i32 {
        self.stock.product_stock(product_id).await.unwrap().stock
    }

    pub async fn assert_reconciled(&self, product_id: Uuid) {
        let report = self.stock.reconcile(product_id).await.unwrap();
        assert!(
            report.consistent,
            "stock {} does not match journal balance {}",
            report.stock, report.journal_balance
        );
    }
}

pub fn movement(
    product_id: Uuid,
    movement_type: MovementType,
    direction: Option<StockDirection>,
    quantity: i32,
) -> RecordMovementInput {
    RecordMovementInput {
        product_id,
        movement_type,
        direction,
        quantity,
        reason: None,
        reference_type: None,
        reference_id: None,
    }
}

pub fn sale_line(product_id: Uuid, quantity: i32, unit_price: &str) -> SaleLineInput {
    SaleLineInput {
        product_id,
        quantity,
        unit_price: dec(unit_price),
    }
}

pub fn sale(items: Vec<SaleLineInput>) -> RecordSaleInput {
    RecordSaleInput {
        items,
        discount: Decimal::ZERO,
        payment_method: PaymentMethod::Cash,
    }
}

pub fn order_line(product_id: Uuid, quantity: i32, unit_cost: &str) -> PurchaseOrderLineInput {
    PurchaseOrderLineInput {
        product_id,
        quantity,
        unit_cost: dec(unit_cost),
    }
}

pub fn order(items: Vec<PurchaseOrderLineInput>) -> CreatePurchaseOrderInput {
    CreatePurchaseOrderInput {
        supplier_id: SUPPLIER_ID,
        notes: None,
        items,
    }
}
