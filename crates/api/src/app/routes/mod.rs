use axum::Router;

pub mod invoices;
pub mod purchases;
pub mod quotations;
pub mod sales;
pub mod system;

/// Router for all document endpoints.
pub fn router() -> Router {
    Router::new()
        .nest("/quotations", quotations::router())
        .nest("/sales-orders", sales::router())
        .nest("/purchase-orders", purchases::router())
        .nest("/invoices", invoices::router())
}
