//! Reconciliation rules shared by every stock write path
//!
//! Direct movements, sale checkout and purchase-order receipt all ask these
//! functions whether a change is legal before the ledger is touched. The
//! functions are pure: they look at the current stock and the request and
//! return either the signed delta to apply or the rule that was broken.

use thiserror::Error;

use crate::models::{MovementType, StockDirection, StockMovement};

/// A request the ledger must refuse
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleViolation {
    #[error("Quantity must be greater than zero (got {quantity})")]
    InvalidQuantity { quantity: i32 },

    #[error("No stock available")]
    OutOfStock,

    #[error("Insufficient stock. Available: {available}, requested: {requested}")]
    InsufficientStock { available: i32, requested: i32 },

    #[error("ADJUSTMENT movements need an explicit direction")]
    DirectionRequired,

    #[error("Direction '{given}' contradicts movement type {movement_type}")]
    DirectionMismatch {
        movement_type: MovementType,
        given: StockDirection,
    },

    #[error("Stock of {current} cannot absorb {quantity} more units")]
    StockOverflow { current: i32, quantity: i32 },
}

/// An approved stock change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApprovedChange {
    pub movement_type: MovementType,
    pub direction: StockDirection,
    pub quantity: i32,
    /// Signed amount to add to the ledger
    pub delta: i32,
    /// Ledger quantity once the delta is applied
    pub stock_after: i32,
}

/// Resolve the direction of a movement.
///
/// Typed movements carry their direction; a caller-supplied direction must agree
/// with it. Adjustments take the caller's direction and fail without one.
pub fn resolve_direction(
    movement_type: MovementType,
    requested: Option<StockDirection>,
) -> Result<StockDirection, RuleViolation> {
    match (movement_type.implied_direction(), requested) {
        (Some(implied), None) => Ok(implied),
        (Some(implied), Some(given)) if implied == given => Ok(implied),
        (Some(_), Some(given)) => Err(RuleViolation::DirectionMismatch {
            movement_type,
            given,
        }),
        (None, Some(given)) => Ok(given),
        (None, None) => Err(RuleViolation::DirectionRequired),
    }
}

/// Validate a strictly positive quantity
pub fn check_quantity(quantity: i32) -> Result<(), RuleViolation> {
    if quantity <= 0 {
        return Err(RuleViolation::InvalidQuantity { quantity });
    }
    Ok(())
}

/// Decide whether `quantity` units may move in `direction` against `current_stock`
pub fn check_change(
    current_stock: i32,
    movement_type: MovementType,
    direction: StockDirection,
    quantity: i32,
) -> Result<ApprovedChange, RuleViolation> {
    check_quantity(quantity)?;

    let stock_after = match direction {
        StockDirection::Out => {
            if quantity > current_stock {
                return Err(RuleViolation::InsufficientStock {
                    available: current_stock,
                    requested: quantity,
                });
            }
            current_stock - quantity
        }
        StockDirection::In => {
            current_stock
                .checked_add(quantity)
                .ok_or(RuleViolation::StockOverflow {
                    current: current_stock,
                    quantity,
                })?
        }
    };

    Ok(ApprovedChange {
        movement_type,
        direction,
        quantity,
        delta: direction.signed(quantity),
        stock_after,
    })
}

/// Rules for a direct movement entered by a user
pub fn check_movement(
    current_stock: i32,
    movement_type: MovementType,
    requested_direction: Option<StockDirection>,
    quantity: i32,
) -> Result<ApprovedChange, RuleViolation> {
    let direction = resolve_direction(movement_type, requested_direction)?;
    check_change(current_stock, movement_type, direction, quantity)
}

/// Rules for one sale line.
///
/// Unlike a plain exit, a sale against an empty shelf is reported as
/// [`RuleViolation::OutOfStock`] rather than an insufficient quantity.
pub fn check_sale_line(current_stock: i32, quantity: i32) -> Result<ApprovedChange, RuleViolation> {
    check_quantity(quantity)?;
    if current_stock <= 0 {
        return Err(RuleViolation::OutOfStock);
    }
    check_change(current_stock, MovementType::Sale, StockDirection::Out, quantity)
}

/// Rules for one purchase-order line being received
pub fn check_receipt_line(current_stock: i32, quantity: i32) -> Result<ApprovedChange, RuleViolation> {
    check_change(current_stock, MovementType::Entry, StockDirection::In, quantity)
}

/// Accumulated effect of a product's journal
pub fn journal_balance<'a, I>(movements: I) -> i64
where
    I: IntoIterator<Item = &'a StockMovement>,
{
    movements.into_iter().map(StockMovement::signed_quantity).sum()
}
