//! Purchase order models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Purchase order lifecycle: `pending` moves to `completed` exactly once
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PurchaseOrderStatus {
    Pending,
    Completed,
}

impl PurchaseOrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseOrderStatus::Pending => "pending",
            PurchaseOrderStatus::Completed => "completed",
        }
    }

    /// Only pending orders can be received; `completed` is terminal
    pub fn can_receive(&self) -> bool {
        matches!(self, PurchaseOrderStatus::Pending)
    }
}

impl std::str::FromStr for PurchaseOrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PurchaseOrderStatus::Pending),
            "completed" => Ok(PurchaseOrderStatus::Completed),
            other => Err(format!("unknown purchase order status '{}'", other)),
        }
    }
}

/// A purchase order with its lines in submission order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseOrder {
    pub id: Uuid,
    pub supplier_id: Uuid,
    pub status: PurchaseOrderStatus,
    pub total: Decimal,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub received_at: Option<DateTime<Utc>>,
    pub items: Vec<PurchaseOrderItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseOrderItem {
    pub id: Uuid,
    pub purchase_order_id: Uuid,
    pub line_no: i32,
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_cost: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewPurchaseOrder {
    pub supplier_id: Uuid,
    pub total: Decimal,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewPurchaseOrderItem {
    pub purchase_order_id: Uuid,
    pub line_no: i32,
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_cost: Decimal,
}

/// Order total: sum of quantity x unit cost, `None` on overflow
pub fn order_total<I>(lines: I) -> Option<Decimal>
where
    I: IntoIterator<Item = (i32, Decimal)>,
{
    lines
        .into_iter()
        .try_fold(Decimal::ZERO, |acc, (quantity, unit_cost)| {
            acc.checked_add(Decimal::from(quantity).checked_mul(unit_cost)?)
        })
}
