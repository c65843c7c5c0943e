use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use tradebook_core::DocumentId;
use tradebook_documents::QuotationId;
use tradebook_infra::orchestrator::NewQuotation;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_quotation).get(list_quotations))
        .route("/:id", get(get_quotation))
        .route("/:id/convert", post(convert_quotation))
}

pub async fn create_quotation(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::CreateQuotationRequest>,
) -> axum::response::Response {
    let lines = match dto::to_new_lines(body.lines) {
        Ok(lines) => lines,
        Err(resp) => return resp,
    };

    match services
        .orchestrator
        .create_quotation(NewQuotation {
            customer: body.customer,
            lines,
        })
        .await
    {
        Ok(quotation) => {
            (StatusCode::CREATED, Json(dto::quotation_to_json(&quotation))).into_response()
        }
        Err(err) => errors::domain_error_to_response(err),
    }
}

pub async fn list_quotations(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.orchestrator.list_quotations().await {
        Ok(quotations) => {
            let items = quotations.iter().map(dto::quotation_to_json).collect::<Vec<_>>();
            (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
        }
        Err(err) => errors::domain_error_to_response(err),
    }
}

pub async fn get_quotation(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let quotation_id = match id.parse::<DocumentId>() {
        Ok(v) => QuotationId::new(v),
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid quotation id"),
    };

    match services.orchestrator.quotation(quotation_id).await {
        Ok(quotation) => (StatusCode::OK, Json(dto::quotation_to_json(&quotation))).into_response(),
        Err(err) => errors::domain_error_to_response(err),
    }
}

/// One-shot conversion into a sales order. Repeat calls get a conflict.
pub async fn convert_quotation(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let quotation_id = match id.parse::<DocumentId>() {
        Ok(v) => QuotationId::new(v),
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid quotation id"),
    };

    match services.orchestrator.convert_quotation(quotation_id).await {
        Ok(order) => (StatusCode::CREATED, Json(dto::sales_order_to_json(&order))).into_response(),
        Err(err) => errors::domain_error_to_response(err),
    }
}
