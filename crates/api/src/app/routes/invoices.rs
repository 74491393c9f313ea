use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde_json::json;

use invoicer_invoicing::{Invoice, InvoiceNumber, Totals, rebalance_to_total, totals::line_amount};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

/// Prefix of the label proposed for the next invoice.
const SUGGESTED_PREFIX: &str = "INV-";

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_invoices).post(create_invoice))
        .route("/last-number", get(last_number))
        .route("/next-number", get(next_number))
        .route("/export/json", get(export_json))
        .route("/rebalance", post(rebalance))
        .route(
            "/:invoice_number",
            get(get_invoice).put(update_invoice).delete(delete_invoice),
        )
}

pub async fn list_invoices(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.invoices.list().await {
        Ok(invoices) => (StatusCode::OK, Json(invoices)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn create_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<Invoice>, JsonRejection>,
) -> axum::response::Response {
    let Json(invoice) = match body {
        Ok(b) => b,
        Err(rejection) => return errors::json_rejection(rejection),
    };

    match services.invoices.create(invoice).await {
        Ok(saved) => (
            StatusCode::CREATED,
            Json(json!({ "success": true, "invoice": saved })),
        )
            .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Path(number): Path<String>,
) -> axum::response::Response {
    match services.invoices.get(&InvoiceNumber::new(number)).await {
        Ok(invoice) => (StatusCode::OK, Json(invoice)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn update_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Path(number): Path<String>,
    body: Result<Json<Invoice>, JsonRejection>,
) -> axum::response::Response {
    let Json(invoice) = match body {
        Ok(b) => b,
        Err(rejection) => return errors::json_rejection(rejection),
    };

    match services
        .invoices
        .update(&InvoiceNumber::new(number), invoice)
        .await
    {
        Ok(saved) => (
            StatusCode::OK,
            Json(json!({ "success": true, "invoice": saved })),
        )
            .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn delete_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Path(number): Path<String>,
) -> axum::response::Response {
    match services.invoices.delete(&InvoiceNumber::new(number)).await {
        Ok(()) => (StatusCode::OK, Json(json!({ "success": true }))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn last_number(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.invoices.last_number().await {
        Ok(n) => (StatusCode::OK, Json(json!({ "lastNumber": n }))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn next_number(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.invoices.next_number().await {
        Ok(n) => (
            StatusCode::OK,
            Json(json!({
                "nextNumber": n,
                "invoiceNumber": InvoiceNumber::with_sequence(SUGGESTED_PREFIX, n),
            })),
        )
            .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn export_json(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    let invoices = match services.invoices.list().await {
        Ok(v) => v,
        Err(e) => return errors::service_error_to_response(e),
    };

    let disposition = format!(
        "attachment; filename=\"{}\"",
        dto::export_filename(Utc::now().date_naive())
    );
    (
        StatusCode::OK,
        [(header::CONTENT_DISPOSITION, disposition)],
        Json(invoices),
    )
        .into_response()
}

/// Scale line rates so the invoice reaches the requested total.
pub async fn rebalance(
    body: Result<Json<dto::RebalanceRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(mut req) = match body {
        Ok(b) => b,
        Err(rejection) => return errors::json_rejection(rejection),
    };
    if let Err(e) = req.validate() {
        return errors::domain_error_to_response(e);
    }

    for line in &mut req.items {
        line.amount = line_amount(line.rate, line.quantity);
    }
    rebalance_to_total(&mut req.items, req.tax_rate, req.discount, req.target_total);
    let totals = Totals::compute(&req.items, req.tax_rate, req.discount);

    (
        StatusCode::OK,
        Json(json!({
            "items": req.items,
            "subtotal": totals.subtotal,
            "tax": totals.tax,
            "total": totals.total,
        })),
    )
        .into_response()
}
