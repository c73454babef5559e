use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::store::StoreError;

/// Error taxonomy of the reservation engine.
///
/// `Validation`, `AvailabilityConflict` and `TableUnavailable` are
/// recoverable by the caller (pick another slot/table/date). The refund
/// errors are terminal for that reservation. `Payment` means the gateway
/// said no and nothing was mutated.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("validation failed: {0}")]
    Validation(String),

    /// The requested table already carries an active reservation for that
    /// evening. Carries enough detail for the caller to render a useful
    /// conflict message.
    #[error("table no longer available: held by {reference} ({customer_name}, party of {party_size})")]
    AvailabilityConflict {
        reference: String,
        customer_name: String,
        party_size: i32,
    },

    /// Table is blocked or deactivated for the requested date.
    #[error("table not available: {0}")]
    TableUnavailable(String),

    #[error("reservation not found")]
    NotFound,

    #[error("deposit has already been refunded")]
    AlreadyRefunded,

    #[error("reservation is not refundable: {0}")]
    NotRefundable(String),

    /// Payment collaborator failure, passed through verbatim. The ledger
    /// guarantees no partial mutation happened.
    #[error("payment gateway error: {0}")]
    Payment(String),

    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

impl EngineError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::AvailabilityConflict { .. } | Self::TableUnavailable(_) => StatusCode::CONFLICT,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::AlreadyRefunded | Self::NotRefundable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Payment(_) => StatusCode::BAD_GATEWAY,
            Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for EngineError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("internal error: {:?}", self);
        }

        let body = match &self {
            EngineError::AvailabilityConflict {
                reference,
                customer_name,
                party_size,
            } => json!({
                "success": false,
                "message": self.to_string(),
                "conflict": {
                    "reference": reference,
                    "customer_name": customer_name,
                    "party_size": party_size,
                }
            }),
            _ => json!({
                "success": false,
                "message": self.to_string(),
            }),
        };

        (status, Json(body)).into_response()
    }
}
