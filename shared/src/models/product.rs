//! Product models as seen by the stock ledger

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The ledger subject: a product and its current on-hand quantity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductStock {
    pub id: Uuid,
    pub name: String,
    pub sku: String,
    /// Current on-hand quantity, never negative
    pub stock: i32,
    /// Alerting threshold; not enforced by the ledger
    pub min_stock: i32,
    pub created_at: DateTime<Utc>,
}

/// A product row about to be inserted with zero stock
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProduct {
    pub name: String,
    pub sku: String,
    pub min_stock: i32,
}
