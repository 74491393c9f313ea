use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::json;

use invoicer_infra::AddCompanyOutcome;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_companies).post(add_company))
        .route("/suggestions", get(suggest_companies))
}

pub async fn list_companies(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.catalog.company_names().await {
        Ok(names) => (StatusCode::OK, Json(names)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn add_company(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::AddCompanyRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(req) = match body {
        Ok(b) => b,
        Err(rejection) => return errors::json_rejection(rejection),
    };

    let body = match services.catalog.add_company(&req.into_name()).await {
        Ok(AddCompanyOutcome::Blank) => json!({
            "success": true,
            "message": "Empty company name",
        }),
        Ok(AddCompanyOutcome::Existing(companies)) => json!({
            "success": true,
            "companies": companies,
            "message": "Company already exists",
        }),
        Ok(AddCompanyOutcome::Added(companies)) => json!({
            "success": true,
            "companies": companies,
        }),
        Err(e) => return errors::service_error_to_response(e),
    };
    (StatusCode::OK, Json(body)).into_response()
}

pub async fn suggest_companies(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::SuggestionQuery>,
) -> axum::response::Response {
    match services.catalog.suggest_companies(&query.q).await {
        Ok(names) => (StatusCode::OK, Json(names)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
