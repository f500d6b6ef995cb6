//! Shared types and models for the Product Tracker inventory backend
//!
//! This crate holds the storage-free side of the stock ledger: the movement
//! vocabulary, sale and purchase-order shapes, and the reconciliation rules
//! every stock write path runs before touching the ledger.

pub mod models;
pub mod money;
pub mod reconciliation;
pub mod types;

pub use models::*;
pub use money::*;
pub use reconciliation::*;
pub use types::*;
