//! Stock ledger tests against PostgreSQL
//!
//! These run the write paths on `PgStockStore` so row locks, constraints and
//! row mapping are exercised for real. They need a scratch database:
//!
//! ```text
//! DATABASE_URL=postgres://localhost/product_tracker_test cargo test -- --ignored
//! ```

mod common;

use std::sync::Arc;

use common::{order, order_line, sale, sale_line};
use product_tracker_backend::config::LedgerConfig;
use product_tracker_backend::error::StockError;
use product_tracker_backend::services::purchase_orders::{
    CreatePurchaseOrderInput, PurchaseOrderLineInput,
};
use product_tracker_backend::services::stock::OpenProductInput;
use product_tracker_backend::services::{PurchaseOrderService, SaleService, StockService};
use product_tracker_backend::store::{PgStockStore, StockStore};
use shared::{MovementType, Pagination, ReferenceType, StockDirection};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Clone)]
struct PgLedger {
    pool: PgPool,
    stock: StockService,
    sales: SaleService,
    orders: PurchaseOrderService,
}

async fn pg_ledger() -> PgLedger {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = PgPoolOptions::new()
        .max_connections(8)
        .connect(&url)
        .await
        .unwrap();
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();

    let config = LedgerConfig::default();
    let store: Arc<dyn StockStore> = Arc::new(PgStockStore::new(pool.clone(), &config));

    PgLedger {
        stock: StockService::new(store.clone(), config.clone()),
        sales: SaleService::new(store.clone(), config.clone()),
        orders: PurchaseOrderService::new(store, config),
        pool,
    }
}

impl PgLedger {
    /// Open a product under a SKU no other run has used
    async fn product(&self, stock: i32) -> Uuid {
        self.stock
            .open_product(OpenProductInput {
                name: "Postgres product".to_string(),
                sku: format!("PG-{}", Uuid::new_v4().simple()),
                min_stock: 0,
                initial_stock: stock,
            })
            .await
            .unwrap()
            .id
    }

    async fn supplier(&self) -> Uuid {
        sqlx::query_scalar::<_, Uuid>("INSERT INTO suppliers (name) VALUES ($1) RETURNING id")
            .bind("Postgres supplier")
            .fetch_one(&self.pool)
            .await
            .unwrap()
    }

    fn order_from(
        &self,
        supplier_id: Uuid,
        items: Vec<PurchaseOrderLineInput>,
    ) -> CreatePurchaseOrderInput {
        CreatePurchaseOrderInput {
            supplier_id,
            ..order(items)
        }
    }

    async fn assert_reconciled(&self, product_id: Uuid) {
        let report = self.stock.reconcile(product_id).await.unwrap();
        assert!(
            report.consistent,
            "stock {} does not match journal balance {}",
            report.stock, report.journal_balance
        );
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "requires DATABASE_URL pointing at a scratch Postgres database"]
async fn test_pg_racing_sales_cannot_both_succeed() {
    let ledger = pg_ledger().await;
    let product_id = ledger.product(10).await;

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let ledger = ledger.clone();
            tokio::spawn(async move {
                ledger
                    .sales
                    .record_sale(sale(vec![sale_line(product_id, 6, "1.00")]), None)
                    .await
            })
        })
        .collect();

    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.unwrap());
    }
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);

    let rejection = results.into_iter().find_map(Result::err).unwrap();
    assert!(matches!(
        rejection,
        StockError::InsufficientStock {
            available: 4,
            requested: 6,
            ..
        }
    ));

    let product = ledger.stock.product_stock(product_id).await.unwrap();
    assert_eq!(product.stock, 4);
    ledger.assert_reconciled(product_id).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "requires DATABASE_URL pointing at a scratch Postgres database"]
async fn test_pg_racing_receipts_credit_once() {
    let ledger = pg_ledger().await;
    let product_id = ledger.product(0).await;
    let supplier_id = ledger.supplier().await;

    let input = ledger.order_from(supplier_id, vec![order_line(product_id, 20, "2.50")]);
    let order_id = ledger.orders.create(input).await.unwrap().id;

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let ledger = ledger.clone();
            tokio::spawn(async move { ledger.orders.receive(order_id, None).await })
        })
        .collect();

    let mut received = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => received += 1,
            Err(StockError::AlreadyReceived { order_id: id }) => assert_eq!(id, order_id),
            Err(other) => panic!("unexpected error: {:?}", other),
        }
    }
    assert_eq!(received, 1);

    let report = ledger.stock.reconcile(product_id).await.unwrap();
    assert!(report.consistent);
    assert_eq!(report.stock, 20);
    assert_eq!(report.movement_count, 1);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL pointing at a scratch Postgres database"]
async fn test_pg_unknown_supplier_is_not_found() {
    let ledger = pg_ledger().await;
    let product_id = ledger.product(0).await;
    let supplier_id = Uuid::new_v4();

    let input = ledger.order_from(supplier_id, vec![order_line(product_id, 1, "1.00")]);
    let err = ledger.orders.create(input).await.unwrap_err();
    assert!(matches!(
        err,
        StockError::NotFound { entity: "Supplier", id } if id == supplier_id
    ));
}

#[tokio::test]
#[ignore = "requires DATABASE_URL pointing at a scratch Postgres database"]
async fn test_pg_sale_round_trips_through_rows() {
    let ledger = pg_ledger().await;
    let first = ledger.product(10).await;
    let second = ledger.product(3).await;
    let user_id = Uuid::new_v4();

    let recorded = ledger
        .sales
        .record_sale(
            sale(vec![
                sale_line(first, 2, "4.50"),
                sale_line(second, 3, "0.35"),
            ]),
            Some(user_id),
        )
        .await
        .unwrap();

    let fetched = ledger.sales.get_sale(recorded.id).await.unwrap();
    assert_eq!(fetched.total, recorded.total);
    assert_eq!(fetched.user_id, Some(user_id));
    let lines: Vec<(i32, Uuid, i32)> = fetched
        .items
        .iter()
        .map(|i| (i.line_no, i.product_id, i.quantity))
        .collect();
    assert_eq!(lines, vec![(1, first, 2), (2, second, 3)]);

    let history = ledger
        .stock
        .movement_history(second, Pagination::default())
        .await
        .unwrap();
    let latest = &history[0];
    assert_eq!(latest.movement_type, MovementType::Sale);
    assert_eq!(latest.direction, StockDirection::Out);
    assert_eq!(latest.quantity, 3);
    assert_eq!(latest.reference_type, Some(ReferenceType::Sale));
    assert_eq!(latest.reference_id, Some(recorded.id));
    assert_eq!(latest.user_id, Some(user_id));

    // the second product was sold out, so a further sale is rejected
    let err = ledger
        .sales
        .record_sale(sale(vec![sale_line(second, 1, "0.35")]), None)
        .await
        .unwrap_err();
    assert!(matches!(err, StockError::OutOfStock { .. }));

    ledger.assert_reconciled(first).await;
    ledger.assert_reconciled(second).await;
}
