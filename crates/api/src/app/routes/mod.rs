use axum::Router;

pub mod companies;
pub mod invoices;
pub mod items;
pub mod system;

/// Router for all API endpoints except `/health`.
pub fn router() -> Router {
    Router::new()
        .nest("/invoices", invoices::router())
        .nest("/items", items::router())
        .nest("/companies", companies::router())
}
