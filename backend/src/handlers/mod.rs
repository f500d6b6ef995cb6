//! HTTP handlers for the Product Tracker API

pub mod health;
pub mod purchase_orders;
pub mod sales;
pub mod stock;

pub use health::*;
pub use purchase_orders::*;
pub use sales::*;
pub use stock::*;

use serde::Deserialize;
use shared::Pagination;

use crate::config::LedgerConfig;

/// Query parameters for paginated listings
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl PageQuery {
    pub fn resolve(&self, ledger: &LedgerConfig) -> Pagination {
        Pagination::new(
            self.page.unwrap_or(1),
            self.per_page.unwrap_or(ledger.default_page_size),
        )
    }
}
