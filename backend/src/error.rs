//! Error handling for the Product Tracker backend
//!
//! [`StockError`] is the taxonomy the ledger core returns. [`AppError`] is the
//! transport-facing wrapper that turns it into JSON responses in English and
//! Spanish.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use shared::RuleViolation;
use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by the stock ledger and its coordinators
#[derive(Error, Debug)]
pub enum StockError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("Quantity must be greater than zero (got {quantity})")]
    InvalidQuantity { quantity: i32 },

    #[error("No stock available for {product_name}")]
    OutOfStock { product_name: String },

    #[error("Insufficient stock for {product_name}. Available: {available}, requested: {requested}")]
    InsufficientStock {
        product_name: String,
        available: i32,
        requested: i32,
    },

    #[error("Purchase order {order_id} has already been received")]
    AlreadyReceived { order_id: Uuid },

    #[error("Invalid {field}: {message}")]
    Invalid { field: &'static str, message: String },

    #[error("Persistence failure: {0}")]
    Persistence(#[from] sqlx::Error),
}

impl StockError {
    pub fn product_not_found(id: Uuid) -> Self {
        StockError::NotFound {
            entity: "Product",
            id,
        }
    }

    pub fn sale_not_found(id: Uuid) -> Self {
        StockError::NotFound { entity: "Sale", id }
    }

    pub fn order_not_found(id: Uuid) -> Self {
        StockError::NotFound {
            entity: "Purchase order",
            id,
        }
    }

    pub fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        StockError::Invalid {
            field,
            message: message.into(),
        }
    }

    /// Attach the product name to a rule violation so the message can be shown as is
    pub fn from_rule(violation: RuleViolation, product_name: &str) -> Self {
        match violation {
            RuleViolation::InvalidQuantity { quantity } => StockError::InvalidQuantity { quantity },
            RuleViolation::OutOfStock => StockError::OutOfStock {
                product_name: product_name.to_string(),
            },
            RuleViolation::InsufficientStock {
                available,
                requested,
            } => StockError::InsufficientStock {
                product_name: product_name.to_string(),
                available,
                requested,
            },
            RuleViolation::DirectionRequired | RuleViolation::DirectionMismatch { .. } => {
                StockError::invalid("direction", violation.to_string())
            }
            RuleViolation::StockOverflow { .. } => {
                StockError::invalid("quantity", violation.to_string())
            }
        }
    }
}

pub type StockResult<T> = Result<T, StockError>;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error(transparent)]
    Stock(#[from] StockError),
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::ValidationError(errors.to_string())
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message_en: String,
    pub message_es: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl ErrorDetail {
    pub fn new(code: &str, message_en: impl Into<String>, message_es: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message_en: message_en.into(),
            message_es: message_es.into(),
            field: None,
        }
    }

    fn with_field(mut self, field: &str) -> Self {
        self.field = Some(field.to_string());
        self
    }
}

fn stock_error_detail(err: &StockError) -> (StatusCode, ErrorDetail) {
    match err {
        StockError::NotFound { entity, id } => (
            StatusCode::NOT_FOUND,
            ErrorDetail::new(
                "NOT_FOUND",
                format!("{} {} not found", entity, id),
                format!("{} {} no encontrado", entity, id),
            ),
        ),
        StockError::InvalidQuantity { quantity } => (
            StatusCode::BAD_REQUEST,
            ErrorDetail::new(
                "INVALID_QUANTITY",
                format!("Quantity must be greater than zero (got {})", quantity),
                "La cantidad debe ser mayor a 0",
            )
            .with_field("quantity"),
        ),
        StockError::OutOfStock { product_name } => (
            StatusCode::CONFLICT,
            ErrorDetail::new(
                "OUT_OF_STOCK",
                format!("No stock available for {}", product_name),
                format!("No hay stock disponible de {}", product_name),
            ),
        ),
        StockError::InsufficientStock {
            product_name,
            available,
            requested,
        } => (
            StatusCode::CONFLICT,
            ErrorDetail::new(
                "INSUFFICIENT_STOCK",
                format!(
                    "Insufficient stock for {}. Available: {}, requested: {}",
                    product_name, available, requested
                ),
                format!(
                    "Stock insuficiente de {}. Disponible: {}, solicitado: {}",
                    product_name, available, requested
                ),
            ),
        ),
        StockError::AlreadyReceived { order_id } => (
            StatusCode::CONFLICT,
            ErrorDetail::new(
                "ALREADY_RECEIVED",
                format!("Purchase order {} has already been received", order_id),
                format!("La orden de compra {} ya fue recibida", order_id),
            ),
        ),
        StockError::Invalid { field, message } => (
            StatusCode::BAD_REQUEST,
            ErrorDetail::new(
                "VALIDATION_ERROR",
                message.clone(),
                format!("Dato no válido: {}", field),
            )
            .with_field(field),
        ),
        StockError::Persistence(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorDetail::new(
                "PERSISTENCE_FAILURE",
                "The operation could not be completed; no changes were applied",
                "No se pudo completar la operación; no se aplicaron cambios",
            ),
        ),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_detail) = match &self {
            AppError::Unauthorized { message } => (
                StatusCode::UNAUTHORIZED,
                ErrorDetail::new("UNAUTHORIZED", message.clone(), "No autorizado"),
            ),
            AppError::ValidationError(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorDetail::new(
                    "VALIDATION_ERROR",
                    msg.clone(),
                    format!("Datos no válidos: {}", msg),
                ),
            ),
            AppError::Stock(err) => stock_error_detail(err),
        };

        if status.is_server_error() {
            tracing::error!(error = ?self, "request failed");
        } else {
            tracing::warn!(code = %error_detail.code, "request rejected: {}", self);
        }

        (status, Json(ErrorResponse { error: error_detail })).into_response()
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;
