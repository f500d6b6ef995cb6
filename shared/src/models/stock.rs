//! Stock movement journal models

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Kind of stock movement recorded in the journal.
///
/// Incoming strings are reconciled to one canonical form: `"entry"`, `"Entry"`
/// and `" ENTRY "` all parse to [`MovementType::Entry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE", try_from = "String")]
pub enum MovementType {
    Entry,
    Exit,
    Sale,
    Return,
    Adjustment,
}

impl MovementType {
    pub const ALL: [MovementType; 5] = [
        MovementType::Entry,
        MovementType::Exit,
        MovementType::Sale,
        MovementType::Return,
        MovementType::Adjustment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::Entry => "ENTRY",
            MovementType::Exit => "EXIT",
            MovementType::Sale => "SALE",
            MovementType::Return => "RETURN",
            MovementType::Adjustment => "ADJUSTMENT",
        }
    }

    /// Direction implied by the type alone. `None` for adjustments, whose
    /// direction has to be supplied by the caller.
    pub fn implied_direction(&self) -> Option<StockDirection> {
        match self {
            MovementType::Entry | MovementType::Return => Some(StockDirection::In),
            MovementType::Exit | MovementType::Sale => Some(StockDirection::Out),
            MovementType::Adjustment => None,
        }
    }
}

impl fmt::Display for MovementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raised when a movement type string is not part of the closed vocabulary
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown movement type '{0}' (expected ENTRY, EXIT, SALE, RETURN or ADJUSTMENT)")]
pub struct UnknownMovementType(pub String);

impl FromStr for MovementType {
    type Err = UnknownMovementType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase();
        MovementType::ALL
            .into_iter()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| UnknownMovementType(s.to_string()))
    }
}

impl TryFrom<String> for MovementType {
    type Error = UnknownMovementType;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Whether a movement adds to or removes from on-hand stock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StockDirection {
    In,
    Out,
}

impl StockDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            StockDirection::In => "in",
            StockDirection::Out => "out",
        }
    }

    /// Apply the direction to a positive magnitude
    pub fn signed(&self, quantity: i32) -> i32 {
        match self {
            StockDirection::In => quantity,
            StockDirection::Out => -quantity,
        }
    }
}

impl fmt::Display for StockDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StockDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "in" => Ok(StockDirection::In),
            "out" => Ok(StockDirection::Out),
            other => Err(format!("unknown stock direction '{}'", other)),
        }
    }
}

/// Business event a movement was caused by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceType {
    Sale,
    PurchaseOrder,
}

impl ReferenceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferenceType::Sale => "sale",
            ReferenceType::PurchaseOrder => "purchase_order",
        }
    }
}

impl FromStr for ReferenceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sale" => Ok(ReferenceType::Sale),
            "purchase_order" => Ok(ReferenceType::PurchaseOrder),
            other => Err(format!("unknown reference type '{}'", other)),
        }
    }
}

/// An immutable journal entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockMovement {
    pub id: Uuid,
    pub product_id: Uuid,
    #[serde(rename = "type")]
    pub movement_type: MovementType,
    pub direction: StockDirection,
    /// Always a positive magnitude; the sign comes from `direction`
    pub quantity: i32,
    pub reason: Option<String>,
    pub reference_type: Option<ReferenceType>,
    pub reference_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl StockMovement {
    pub fn signed_quantity(&self) -> i64 {
        i64::from(self.direction.signed(self.quantity))
    }
}

/// A journal entry that has been approved but not yet appended
#[derive(Debug, Clone, PartialEq)]
pub struct NewStockMovement {
    pub product_id: Uuid,
    pub movement_type: MovementType,
    pub direction: StockDirection,
    pub quantity: i32,
    pub reason: Option<String>,
    pub reference_type: Option<ReferenceType>,
    pub reference_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
}

/// Ledger quantity compared against the journal's accumulated effect
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub product_id: Uuid,
    pub stock: i32,
    pub journal_balance: i64,
    pub movement_count: usize,
    pub consistent: bool,
}
