use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use tradebook_core::DomainError;

/// Map a domain error onto a consistent JSON error response.
///
/// Invariant violations are logged server-side and answered with a generic
/// internal error: the stored records are the debugging surface for those,
/// not the client.
pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    match err {
        DomainError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        DomainError::InvalidId(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_id", msg),
        DomainError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        DomainError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        DomainError::Busy => json_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "busy",
            "too many concurrent updates, retry the request",
        ),
        DomainError::CapacityExceeded {
            line_item_id,
            requested,
            remaining,
        } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            axum::Json(json!({
                "error": "capacity_exceeded",
                "message": format!(
                    "requested quantity {requested} exceeds remaining {remaining} on line item {line_item_id}"
                ),
                "line_item_id": line_item_id,
                "requested": requested,
                "remaining": remaining,
            })),
        )
            .into_response(),
        DomainError::OverPayment {
            invoice_id,
            amount,
            balance,
        } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            axum::Json(json!({
                "error": "over_payment",
                "message": format!("payment of {amount} exceeds the outstanding balance {balance}"),
                "invoice_id": invoice_id,
                "amount": amount,
                "balance": balance,
            })),
        )
            .into_response(),
        DomainError::InvariantViolation(msg) => {
            tracing::error!("ledger invariant violated: {msg}");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", "internal error")
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
