//! Business logic services for the Product Tracker backend
//!
//! Every write path changes stock through [`ledger::post_change`].

pub mod ledger;
pub mod purchase_orders;
pub mod sales;
pub mod stock;

pub use purchase_orders::PurchaseOrderService;
pub use sales::SaleService;
pub use stock::StockService;
