use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;

use tradebook_core::DocumentId;
use tradebook_documents::InvoiceId;
use tradebook_infra::orchestrator::PaymentRequest;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/:id", get(get_invoice))
        .route("/:id/balance", get(get_balance))
        .route("/:id/payments", post(record_payment))
}

pub async fn get_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let invoice_id = match id.parse::<DocumentId>() {
        Ok(v) => InvoiceId::new(v),
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid invoice id"),
    };

    match services.orchestrator.invoice(invoice_id).await {
        Ok(snapshot) => (StatusCode::OK, Json(dto::invoice_detail_to_json(&snapshot))).into_response(),
        Err(err) => errors::domain_error_to_response(err),
    }
}

/// Paid/outstanding amounts plus the effective status as of now.
pub async fn get_balance(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let invoice_id = match id.parse::<DocumentId>() {
        Ok(v) => InvoiceId::new(v),
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid invoice id"),
    };

    match services.orchestrator.invoice_balance(invoice_id, Utc::now()).await {
        Ok(view) => (StatusCode::OK, Json(dto::invoice_balance_to_json(&view))).into_response(),
        Err(err) => errors::domain_error_to_response(err),
    }
}

pub async fn record_payment(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::RecordPaymentRequest>,
) -> axum::response::Response {
    let invoice_id = match id.parse::<DocumentId>() {
        Ok(v) => InvoiceId::new(v),
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid invoice id"),
    };

    match services
        .orchestrator
        .record_payment(PaymentRequest {
            invoice_id,
            amount: body.amount,
            paid_at: body.paid_at,
        })
        .await
    {
        Ok(commit) => (
            StatusCode::CREATED,
            Json(serde_json::json!({
                "payment": dto::payment_to_json(&commit.payment),
                "invoice": dto::invoice_to_json(&commit.invoice),
            })),
        )
            .into_response(),
        Err(err) => errors::domain_error_to_response(err),
    }
}
