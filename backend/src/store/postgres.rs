//! PostgreSQL-backed stock store
//!
//! Each unit of work is one database transaction. Product and purchase-order
//! rows are read with `SELECT ... FOR NO KEY UPDATE`, so two units touching
//! the same product run their check-then-apply sequences one after the other,
//! while foreign-key inserts referencing the row still get their KEY SHARE
//! lock. The stock update itself is also bounded (`stock + delta >= 0`) and
//! the table carries a `CHECK (stock >= 0)` constraint.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use shared::{
    NewProduct, NewPurchaseOrder, NewPurchaseOrderItem, NewSale, NewSaleItem, NewStockMovement,
    Pagination, ProductStock, PurchaseOrder, PurchaseOrderItem, Sale, SaleItem, StockMovement,
};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::{JournalSummary, StockStore, StockTx};
use crate::config::LedgerConfig;
use crate::error::{StockError, StockResult};

const PRODUCT_COLUMNS: &str = "id, name, sku, stock, min_stock, created_at";

const MOVEMENT_COLUMNS: &str = "id, product_id, movement_type, direction, quantity, reason, \
                                reference_type, reference_id, user_id, created_at";

const SALE_COLUMNS: &str = "id, total, discount, payment_method, user_id, created_at";

const SALE_ITEM_COLUMNS: &str = "id, sale_id, line_no, product_id, quantity, unit_price, subtotal";

const ORDER_COLUMNS: &str = "id, supplier_id, status, total, notes, created_at, received_at";

const ORDER_ITEM_COLUMNS: &str = "id, purchase_order_id, line_no, product_id, quantity, unit_cost";

/// PostgreSQL stock store
#[derive(Debug, Clone)]
pub struct PgStockStore {
    pool: PgPool,
    lock_timeout: String,
}

impl PgStockStore {
    pub fn new(pool: PgPool, config: &LedgerConfig) -> Self {
        Self {
            pool,
            lock_timeout: format!("{}ms", config.lock_timeout_ms),
        }
    }

    async fn load_sale_items(&self, sale_ids: &[Uuid]) -> StockResult<HashMap<Uuid, Vec<SaleItem>>> {
        let rows = sqlx::query_as::<_, SaleItemRow>(&format!(
            "SELECT {} FROM sale_items WHERE sale_id = ANY($1) ORDER BY sale_id, line_no",
            SALE_ITEM_COLUMNS
        ))
        .bind(sale_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut grouped: HashMap<Uuid, Vec<SaleItem>> = HashMap::new();
        for row in rows {
            grouped.entry(row.sale_id).or_default().push(row.into());
        }
        Ok(grouped)
    }

    async fn load_order_items(
        &self,
        order_ids: &[Uuid],
    ) -> StockResult<HashMap<Uuid, Vec<PurchaseOrderItem>>> {
        let rows = sqlx::query_as::<_, OrderItemRow>(&format!(
            "SELECT {} FROM purchase_order_items WHERE purchase_order_id = ANY($1) \
             ORDER BY purchase_order_id, line_no",
            ORDER_ITEM_COLUMNS
        ))
        .bind(order_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut grouped: HashMap<Uuid, Vec<PurchaseOrderItem>> = HashMap::new();
        for row in rows {
            grouped.entry(row.purchase_order_id).or_default().push(row.into());
        }
        Ok(grouped)
    }
}

#[async_trait]
impl StockStore for PgStockStore {
    async fn begin(&self) -> StockResult<Box<dyn StockTx>> {
        let mut tx = self.pool.begin().await?;

        // Scoped to this transaction; a lock wait past it aborts the unit
        sqlx::query("SELECT set_config('lock_timeout', $1, true)")
            .bind(&self.lock_timeout)
            .execute(&mut *tx)
            .await?;

        Ok(Box::new(PgStockTx { tx }))
    }

    async fn is_healthy(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }

    async fn product(&self, product_id: Uuid) -> StockResult<Option<ProductStock>> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {} FROM products WHERE id = $1",
            PRODUCT_COLUMNS
        ))
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn movements(
        &self,
        product_id: Uuid,
        page: Pagination,
    ) -> StockResult<Vec<StockMovement>> {
        let rows = sqlx::query_as::<_, MovementRow>(&format!(
            "SELECT {} FROM stock_movements WHERE product_id = $1 \
             ORDER BY seq DESC LIMIT $2 OFFSET $3",
            MOVEMENT_COLUMNS
        ))
        .bind(product_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn sale(&self, sale_id: Uuid) -> StockResult<Option<Sale>> {
        let Some(row) = sqlx::query_as::<_, SaleRow>(&format!(
            "SELECT {} FROM sales WHERE id = $1",
            SALE_COLUMNS
        ))
        .bind(sale_id)
        .fetch_optional(&self.pool)
        .await?
        else {
            return Ok(None);
        };

        let mut items = self.load_sale_items(&[sale_id]).await?;
        let sale = row.into_sale(items.remove(&sale_id).unwrap_or_default())?;
        Ok(Some(sale))
    }

    async fn sales(&self, page: Pagination) -> StockResult<Vec<Sale>> {
        let rows = sqlx::query_as::<_, SaleRow>(&format!(
            "SELECT {} FROM sales ORDER BY created_at DESC, id LIMIT $1 OFFSET $2",
            SALE_COLUMNS
        ))
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let mut items = self.load_sale_items(&ids).await?;

        rows.into_iter()
            .map(|row| {
                let lines = items.remove(&row.id).unwrap_or_default();
                row.into_sale(lines)
            })
            .collect()
    }

    async fn purchase_order(&self, order_id: Uuid) -> StockResult<Option<PurchaseOrder>> {
        let Some(row) = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {} FROM purchase_orders WHERE id = $1",
            ORDER_COLUMNS
        ))
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?
        else {
            return Ok(None);
        };

        let mut items = self.load_order_items(&[order_id]).await?;
        let order = row.into_order(items.remove(&order_id).unwrap_or_default())?;
        Ok(Some(order))
    }

    async fn purchase_orders(&self, page: Pagination) -> StockResult<Vec<PurchaseOrder>> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {} FROM purchase_orders ORDER BY created_at DESC, id LIMIT $1 OFFSET $2",
            ORDER_COLUMNS
        ))
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let mut items = self.load_order_items(&ids).await?;

        rows.into_iter()
            .map(|row| {
                let lines = items.remove(&row.id).unwrap_or_default();
                row.into_order(lines)
            })
            .collect()
    }
}

/// One open database transaction
struct PgStockTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StockTx for PgStockTx {
    async fn lock_product(&mut self, product_id: Uuid) -> StockResult<Option<ProductStock>> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {} FROM products WHERE id = $1 FOR NO KEY UPDATE",
            PRODUCT_COLUMNS
        ))
        .bind(product_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn apply_delta(&mut self, product_id: Uuid, delta: i32) -> StockResult<Option<i32>> {
        let stock = sqlx::query_scalar::<_, i32>(
            r#"
            UPDATE products
            SET stock = stock + $1, updated_at = NOW()
            WHERE id = $2 AND stock + $1 >= 0
            RETURNING stock
            "#,
        )
        .bind(delta)
        .bind(product_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(stock)
    }

    async fn append_movement(&mut self, movement: NewStockMovement) -> StockResult<StockMovement> {
        let row = sqlx::query_as::<_, MovementRow>(&format!(
            r#"
            INSERT INTO stock_movements (
                product_id, movement_type, direction, quantity, reason,
                reference_type, reference_id, user_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {}
            "#,
            MOVEMENT_COLUMNS
        ))
        .bind(movement.product_id)
        .bind(movement.movement_type.as_str())
        .bind(movement.direction.as_str())
        .bind(movement.quantity)
        .bind(&movement.reason)
        .bind(movement.reference_type.map(|r| r.as_str()))
        .bind(movement.reference_id)
        .bind(movement.user_id)
        .fetch_one(&mut *self.tx)
        .await?;

        row.try_into()
    }

    async fn journal_summary(&mut self, product_id: Uuid) -> StockResult<JournalSummary> {
        let (balance, count) = sqlx::query_as::<_, (i64, i64)>(
            r#"
            SELECT COALESCE(SUM(CASE WHEN direction = 'in' THEN quantity ELSE -quantity END), 0)::BIGINT,
                   COUNT(*)
            FROM stock_movements
            WHERE product_id = $1
            "#,
        )
        .bind(product_id)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(JournalSummary {
            balance,
            movement_count: count as usize,
        })
    }

    async fn insert_product(&mut self, product: NewProduct) -> StockResult<ProductStock> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "INSERT INTO products (name, sku, min_stock) VALUES ($1, $2, $3) RETURNING {}",
            PRODUCT_COLUMNS
        ))
        .bind(&product.name)
        .bind(&product.sku)
        .bind(product.min_stock)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| {
            if has_code(&e, "23505") {
                StockError::invalid(
                    "sku",
                    format!("A product with SKU {} already exists", product.sku),
                )
            } else {
                StockError::Persistence(e)
            }
        })?;

        Ok(row.into())
    }

    async fn insert_sale(&mut self, sale: NewSale) -> StockResult<Sale> {
        let row = sqlx::query_as::<_, SaleRow>(&format!(
            r#"
            INSERT INTO sales (total, discount, payment_method, user_id)
            VALUES ($1, $2, $3, $4)
            RETURNING {}
            "#,
            SALE_COLUMNS
        ))
        .bind(sale.total)
        .bind(sale.discount)
        .bind(sale.payment_method.as_str())
        .bind(sale.user_id)
        .fetch_one(&mut *self.tx)
        .await?;

        row.into_sale(Vec::new())
    }

    async fn insert_sale_item(&mut self, item: NewSaleItem) -> StockResult<SaleItem> {
        let row = sqlx::query_as::<_, SaleItemRow>(&format!(
            r#"
            INSERT INTO sale_items (sale_id, line_no, product_id, quantity, unit_price, subtotal)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            SALE_ITEM_COLUMNS
        ))
        .bind(item.sale_id)
        .bind(item.line_no)
        .bind(item.product_id)
        .bind(item.quantity)
        .bind(item.unit_price)
        .bind(item.subtotal)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(row.into())
    }

    async fn insert_purchase_order(
        &mut self,
        order: NewPurchaseOrder,
    ) -> StockResult<PurchaseOrder> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            r#"
            INSERT INTO purchase_orders (supplier_id, status, total, notes)
            VALUES ($1, 'pending', $2, $3)
            RETURNING {}
            "#,
            ORDER_COLUMNS
        ))
        .bind(order.supplier_id)
        .bind(order.total)
        .bind(&order.notes)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| {
            if has_code(&e, "23503") {
                StockError::NotFound {
                    entity: "Supplier",
                    id: order.supplier_id,
                }
            } else {
                StockError::Persistence(e)
            }
        })?;

        row.into_order(Vec::new())
    }

    async fn insert_purchase_order_item(
        &mut self,
        item: NewPurchaseOrderItem,
    ) -> StockResult<PurchaseOrderItem> {
        let row = sqlx::query_as::<_, OrderItemRow>(&format!(
            r#"
            INSERT INTO purchase_order_items (purchase_order_id, line_no, product_id, quantity, unit_cost)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            ORDER_ITEM_COLUMNS
        ))
        .bind(item.purchase_order_id)
        .bind(item.line_no)
        .bind(item.product_id)
        .bind(item.quantity)
        .bind(item.unit_cost)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(row.into())
    }

    async fn lock_purchase_order(&mut self, order_id: Uuid) -> StockResult<Option<PurchaseOrder>> {
        let Some(row) = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {} FROM purchase_orders WHERE id = $1 FOR NO KEY UPDATE",
            ORDER_COLUMNS
        ))
        .bind(order_id)
        .fetch_optional(&mut *self.tx)
        .await?
        else {
            return Ok(None);
        };

        let items = sqlx::query_as::<_, OrderItemRow>(&format!(
            "SELECT {} FROM purchase_order_items WHERE purchase_order_id = $1 ORDER BY line_no",
            ORDER_ITEM_COLUMNS
        ))
        .bind(order_id)
        .fetch_all(&mut *self.tx)
        .await?;

        let order = row.into_order(items.into_iter().map(Into::into).collect())?;
        Ok(Some(order))
    }

    async fn mark_order_received(
        &mut self,
        order_id: Uuid,
        received_at: DateTime<Utc>,
    ) -> StockResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE purchase_orders
            SET status = 'completed', received_at = $1
            WHERE id = $2 AND status = 'pending'
            "#,
        )
        .bind(received_at)
        .bind(order_id)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StockError::AlreadyReceived { order_id });
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StockResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}

/// Whether `err` is a database error with the given SQLSTATE
fn has_code(err: &sqlx::Error, sqlstate: &str) -> bool {
    err.as_database_error()
        .and_then(|db| db.code())
        .map(|code| code == sqlstate)
        .unwrap_or(false)
}

fn decode_error(message: String) -> StockError {
    StockError::Persistence(sqlx::Error::Decode(message.into()))
}

// ============================================================================
// Row types
// ============================================================================

#[derive(Debug, FromRow)]
struct ProductRow {
    id: Uuid,
    name: String,
    sku: String,
    stock: i32,
    min_stock: i32,
    created_at: DateTime<Utc>,
}

impl From<ProductRow> for ProductStock {
    fn from(row: ProductRow) -> Self {
        ProductStock {
            id: row.id,
            name: row.name,
            sku: row.sku,
            stock: row.stock,
            min_stock: row.min_stock,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct MovementRow {
    id: Uuid,
    product_id: Uuid,
    movement_type: String,
    direction: String,
    quantity: i32,
    reason: Option<String>,
    reference_type: Option<String>,
    reference_id: Option<Uuid>,
    user_id: Option<Uuid>,
    created_at: DateTime<Utc>,
}

impl TryFrom<MovementRow> for StockMovement {
    type Error = StockError;

    fn try_from(row: MovementRow) -> Result<Self, Self::Error> {
        Ok(StockMovement {
            id: row.id,
            product_id: row.product_id,
            movement_type: row
                .movement_type
                .parse()
                .map_err(|e: shared::UnknownMovementType| decode_error(e.to_string()))?,
            direction: row.direction.parse().map_err(decode_error)?,
            quantity: row.quantity,
            reason: row.reason,
            reference_type: row
                .reference_type
                .map(|r| r.parse())
                .transpose()
                .map_err(decode_error)?,
            reference_id: row.reference_id,
            user_id: row.user_id,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct SaleRow {
    id: Uuid,
    total: Decimal,
    discount: Decimal,
    payment_method: String,
    user_id: Option<Uuid>,
    created_at: DateTime<Utc>,
}

impl SaleRow {
    fn into_sale(self, items: Vec<SaleItem>) -> StockResult<Sale> {
        Ok(Sale {
            id: self.id,
            total: self.total,
            discount: self.discount,
            payment_method: self.payment_method.parse().map_err(decode_error)?,
            user_id: self.user_id,
            created_at: self.created_at,
            items,
        })
    }
}

#[derive(Debug, FromRow)]
struct SaleItemRow {
    id: Uuid,
    sale_id: Uuid,
    line_no: i32,
    product_id: Uuid,
    quantity: i32,
    unit_price: Decimal,
    subtotal: Decimal,
}

impl From<SaleItemRow> for SaleItem {
    fn from(row: SaleItemRow) -> Self {
        SaleItem {
            id: row.id,
            sale_id: row.sale_id,
            line_no: row.line_no,
            product_id: row.product_id,
            quantity: row.quantity,
            unit_price: row.unit_price,
            subtotal: row.subtotal,
        }
    }
}

#[derive(Debug, FromRow)]
struct OrderRow {
    id: Uuid,
    supplier_id: Uuid,
    status: String,
    total: Decimal,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    received_at: Option<DateTime<Utc>>,
}

impl OrderRow {
    fn into_order(self, items: Vec<PurchaseOrderItem>) -> StockResult<PurchaseOrder> {
        Ok(PurchaseOrder {
            id: self.id,
            supplier_id: self.supplier_id,
            status: self.status.parse().map_err(decode_error)?,
            total: self.total,
            notes: self.notes,
            created_at: self.created_at,
            received_at: self.received_at,
            items,
        })
    }
}

#[derive(Debug, FromRow)]
struct OrderItemRow {
    id: Uuid,
    purchase_order_id: Uuid,
    line_no: i32,
    product_id: Uuid,
    quantity: i32,
    unit_cost: Decimal,
}

impl From<OrderItemRow> for PurchaseOrderItem {
    fn from(row: OrderItemRow) -> Self {
        PurchaseOrderItem {
            id: row.id,
            purchase_order_id: row.purchase_order_id,
            line_no: row.line_no,
            product_id: row.product_id,
            quantity: row.quantity,
            unit_cost: row.unit_cost,
        }
    }
}
