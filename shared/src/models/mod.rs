//! Domain models for the Product Tracker inventory backend

mod product;
mod purchase_order;
mod sale;
mod stock;

pub use product::*;
pub use purchase_order::*;
pub use sale::*;
pub use stock::*;
