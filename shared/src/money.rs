//! Money amounts as the ledger stores them
//!
//! Prices, costs and totals are persisted as NUMERIC(14, 2). Anything with
//! more than two decimals or twelve integer digits would be rounded or
//! rejected by the database, so callers check amounts here first.

use rust_decimal::Decimal;

/// Decimal places kept for money columns
pub const MONEY_SCALE: u32 = 2;

/// Exclusive upper bound on the magnitude of a stored amount (10^12)
pub fn money_limit() -> Decimal {
    Decimal::new(1_000_000_000_000, 0)
}

/// True when the amount fits a money column without rounding
pub fn is_storable(amount: Decimal) -> bool {
    amount.normalize().scale() <= MONEY_SCALE && amount.abs() < money_limit()
}
