use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use tradebook_core::DocumentId;
use tradebook_documents::PurchaseOrderId;
use tradebook_infra::orchestrator::{NewPurchaseOrder, ReceiptRequest};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_purchase_order).get(list_purchase_orders))
        .route("/:id", get(get_purchase_order))
        .route("/:id/remaining", get(get_remaining))
        .route("/:id/receipts", post(create_receipt))
}

pub async fn create_purchase_order(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::CreatePurchaseOrderRequest>,
) -> axum::response::Response {
    let lines = match dto::to_new_lines(body.lines) {
        Ok(lines) => lines,
        Err(resp) => return resp,
    };

    match services
        .orchestrator
        .create_purchase_order(NewPurchaseOrder {
            supplier: body.supplier,
            lines,
        })
        .await
    {
        Ok(order) => {
            (StatusCode::CREATED, Json(dto::purchase_order_to_json(&order))).into_response()
        }
        Err(err) => errors::domain_error_to_response(err),
    }
}

pub async fn list_purchase_orders(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.orchestrator.list_purchase_orders().await {
        Ok(orders) => {
            let items = orders.iter().map(dto::purchase_order_to_json).collect::<Vec<_>>();
            (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
        }
        Err(err) => errors::domain_error_to_response(err),
    }
}

pub async fn get_purchase_order(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let order_id = match id.parse::<DocumentId>() {
        Ok(v) => PurchaseOrderId::new(v),
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid purchase order id")
        }
    };

    match services.orchestrator.purchase_order(order_id).await {
        Ok(snapshot) => {
            (StatusCode::OK, Json(dto::purchase_order_detail_to_json(&snapshot))).into_response()
        }
        Err(err) => errors::domain_error_to_response(err),
    }
}

/// Open quantities per line, recomputed from the stored receipts.
pub async fn get_remaining(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let order_id = match id.parse::<DocumentId>() {
        Ok(v) => PurchaseOrderId::new(v),
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid purchase order id")
        }
    };

    match services.orchestrator.remaining_for_purchase_order(order_id).await {
        Ok(view) => {
            (StatusCode::OK, Json(dto::purchase_order_remaining_to_json(&view))).into_response()
        }
        Err(err) => errors::domain_error_to_response(err),
    }
}

pub async fn create_receipt(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::CreateReceiptRequest>,
) -> axum::response::Response {
    let purchase_order_id = match id.parse::<DocumentId>() {
        Ok(v) => PurchaseOrderId::new(v),
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid purchase order id")
        }
    };
    let lines = match dto::to_line_selection(body.lines) {
        Ok(lines) => lines,
        Err(resp) => return resp,
    };

    match services
        .orchestrator
        .create_receipt(ReceiptRequest {
            purchase_order_id,
            lines,
            received_at: body.received_at,
        })
        .await
    {
        Ok(commit) => {
            let order = dto::purchase_order_to_json(&commit.parent);
            match commit.document {
                Some(receipt) => (
                    StatusCode::CREATED,
                    Json(serde_json::json!({
                        "receipt": dto::receipt_to_json(&receipt),
                        "purchase_order": order,
                    })),
                )
                    .into_response(),
                None => (
                    StatusCode::OK,
                    Json(serde_json::json!({
                        "receipt": null,
                        "purchase_order": order,
                    })),
                )
                    .into_response(),
            }
        }
        Err(err) => errors::domain_error_to_response(err),
    }
}
