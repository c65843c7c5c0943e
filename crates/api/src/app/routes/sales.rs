use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use tradebook_core::DocumentId;
use tradebook_documents::SalesOrderId;
use tradebook_infra::orchestrator::{InvoiceRequest, NewSalesOrder, ShipmentRequest};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_sales_order).get(list_sales_orders))
        .route("/:id", get(get_sales_order))
        .route("/:id/remaining", get(get_remaining))
        .route("/:id/invoices", post(create_invoice))
        .route("/:id/shipments", post(create_shipment))
}

pub async fn create_sales_order(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::CreateSalesOrderRequest>,
) -> axum::response::Response {
    let lines = match dto::to_new_lines(body.lines) {
        Ok(lines) => lines,
        Err(resp) => return resp,
    };

    match services
        .orchestrator
        .create_sales_order(NewSalesOrder {
            customer: body.customer,
            lines,
        })
        .await
    {
        Ok(order) => (StatusCode::CREATED, Json(dto::sales_order_to_json(&order))).into_response(),
        Err(err) => errors::domain_error_to_response(err),
    }
}

pub async fn list_sales_orders(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.orchestrator.list_sales_orders().await {
        Ok(orders) => {
            let items = orders.iter().map(dto::sales_order_to_json).collect::<Vec<_>>();
            (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
        }
        Err(err) => errors::domain_error_to_response(err),
    }
}

pub async fn get_sales_order(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let order_id = match id.parse::<DocumentId>() {
        Ok(v) => SalesOrderId::new(v),
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid sales order id"),
    };

    match services.orchestrator.sales_order(order_id).await {
        Ok(snapshot) => {
            (StatusCode::OK, Json(dto::sales_order_detail_to_json(&snapshot))).into_response()
        }
        Err(err) => errors::domain_error_to_response(err),
    }
}

/// Open quantities per line, recomputed from the stored fulfillments.
pub async fn get_remaining(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let order_id = match id.parse::<DocumentId>() {
        Ok(v) => SalesOrderId::new(v),
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid sales order id"),
    };

    match services.orchestrator.remaining_for_sales_order(order_id).await {
        Ok(view) => {
            (StatusCode::OK, Json(dto::sales_order_remaining_to_json(&view))).into_response()
        }
        Err(err) => errors::domain_error_to_response(err),
    }
}

pub async fn create_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::CreateInvoiceRequest>,
) -> axum::response::Response {
    let sales_order_id = match id.parse::<DocumentId>() {
        Ok(v) => SalesOrderId::new(v),
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid sales order id"),
    };
    let lines = match dto::to_line_selection(body.lines) {
        Ok(lines) => lines,
        Err(resp) => return resp,
    };

    match services
        .orchestrator
        .create_invoice(InvoiceRequest {
            sales_order_id,
            lines,
            due_date: body.due_date,
        })
        .await
    {
        Ok(commit) => {
            let order = dto::sales_order_to_json(&commit.parent);
            match commit.document {
                Some(invoice) => (
                    StatusCode::CREATED,
                    Json(serde_json::json!({
                        "invoice": dto::invoice_to_json(&invoice),
                        "sales_order": order,
                    })),
                )
                    .into_response(),
                // Nothing left to invoice: report the unchanged order.
                None => (
                    StatusCode::OK,
                    Json(serde_json::json!({
                        "invoice": null,
                        "sales_order": order,
                    })),
                )
                    .into_response(),
            }
        }
        Err(err) => errors::domain_error_to_response(err),
    }
}

pub async fn create_shipment(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::CreateShipmentRequest>,
) -> axum::response::Response {
    let sales_order_id = match id.parse::<DocumentId>() {
        Ok(v) => SalesOrderId::new(v),
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid sales order id"),
    };
    let lines = match dto::to_line_selection(body.lines) {
        Ok(lines) => lines,
        Err(resp) => return resp,
    };

    match services
        .orchestrator
        .create_shipment(ShipmentRequest {
            sales_order_id,
            lines,
            shipped_at: body.shipped_at,
        })
        .await
    {
        Ok(commit) => {
            let order = dto::sales_order_to_json(&commit.parent);
            match commit.document {
                Some(shipment) => (
                    StatusCode::CREATED,
                    Json(serde_json::json!({
                        "shipment": dto::shipment_to_json(&shipment),
                        "sales_order": order,
                    })),
                )
                    .into_response(),
                None => (
                    StatusCode::OK,
                    Json(serde_json::json!({
                        "shipment": null,
                        "sales_order": order,
                    })),
                )
                    .into_response(),
            }
        }
        Err(err) => errors::domain_error_to_response(err),
    }
}
