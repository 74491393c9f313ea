use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use invoicer_core::DomainError;
use invoicer_infra::{SequenceError, ServiceError, StoreError};

pub fn service_error_to_response(err: ServiceError) -> axum::response::Response {
    match err {
        ServiceError::Domain(e) => domain_error_to_response(e),
        ServiceError::Store(e) => store_error_to_response(e),
        ServiceError::Sequence(SequenceError::Store(e)) => store_error_to_response(e),
        ServiceError::Sequence(SequenceError::Exhausted) => {
            tracing::error!("invoice sequence exhausted");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "sequence_exhausted",
                "invoice sequence exhausted",
            )
        }
    }
}

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    match err {
        DomainError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        DomainError::InvariantViolation(msg) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "invariant_violation", msg)
        }
        DomainError::NotFound(what) => {
            json_error(StatusCode::NOT_FOUND, "not_found", format!("{what} not found"))
        }
        DomainError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
    }
}

pub fn store_error_to_response(err: StoreError) -> axum::response::Response {
    match err {
        StoreError::Unavailable(msg) => {
            tracing::error!(error = %msg, "store unavailable");
            json_error(StatusCode::SERVICE_UNAVAILABLE, "store_unavailable", msg)
        }
        StoreError::Duplicate(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        StoreError::OutOfRange(msg) => {
            tracing::error!(error = %msg, "value out of store range");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_out_of_range", msg)
        }
        StoreError::Corrupt(msg) => {
            tracing::error!(error = %msg, "corrupt record in store");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_corrupt", msg)
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

/// Map a rejected JSON body to the common error shape.
pub fn json_rejection(rejection: axum::extract::rejection::JsonRejection) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, "invalid_body", rejection.body_text())
}
