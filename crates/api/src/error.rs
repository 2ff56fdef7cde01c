//! API error types with HTTP response mapping.
//!
//! Every error renders as `{"success": false, "error": <code>, "message": ...}`.
//! Storage and processor details are logged here and never sent to clients.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use checkout::CheckoutError;
use domain::OrderError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Checkout service error.
    Checkout(CheckoutError),
    /// Malformed request (body, query or path).
    BadRequest(String),
    /// Missing or invalid credentials.
    Unauthorized(String),
    /// Authenticated but not allowed.
    Forbidden(String),
}

impl ApiError {
    /// Returns the HTTP status, machine code and client message.
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "validation_failed", msg.clone()),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg.clone()),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg.clone()),
            ApiError::Checkout(err) => checkout_error_parts(err),
        }
    }
}

fn checkout_error_parts(err: &CheckoutError) -> (StatusCode, &'static str, String) {
    match err {
        CheckoutError::Rule(rule) => {
            let (status, code) = rule_status(rule);
            (status, code, rule.to_string())
        }
        CheckoutError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found", err.to_string()),
        CheckoutError::Validation(msg) => (StatusCode::BAD_REQUEST, "validation_failed", msg.clone()),
        CheckoutError::Conflict(_) => (StatusCode::CONFLICT, "conflict", err.to_string()),
        CheckoutError::Store(_) => {
            tracing::error!(error = %err, "storage failure");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "storage_error",
                "Internal storage error".to_string(),
            )
        }
        CheckoutError::Payment(_) => {
            tracing::error!(error = %err, "payment processor failure");
            (
                StatusCode::BAD_GATEWAY,
                "payment_error",
                "Payment processor error".to_string(),
            )
        }
    }
}

fn rule_status(rule: &OrderError) -> (StatusCode, &'static str) {
    match rule {
        OrderError::MissingField { .. }
        | OrderError::InvalidField { .. }
        | OrderError::InvalidQuantity { .. }
        | OrderError::OrderCancelled
        | OrderError::IntentMismatch => (StatusCode::BAD_REQUEST, "validation_failed"),
        OrderError::InvalidStatus(_) => (StatusCode::BAD_REQUEST, "invalid_status"),
        OrderError::InvalidTransition { .. } => (StatusCode::BAD_REQUEST, "invalid_transition"),
        OrderError::EmptyCart => (StatusCode::BAD_REQUEST, "empty_cart"),
        OrderError::InsufficientStock { .. } => (StatusCode::BAD_REQUEST, "insufficient_stock"),
        OrderError::NotCancellable { .. } => (StatusCode::BAD_REQUEST, "order_not_cancellable"),
        OrderError::AlreadyPaid => (StatusCode::BAD_REQUEST, "already_paid"),
        OrderError::PaymentNotCompleted { .. } => (StatusCode::BAD_REQUEST, "payment_not_completed"),
        OrderError::ActiveOrders { .. } => (StatusCode::BAD_REQUEST, "active_orders"),
        OrderError::Forbidden => (StatusCode::FORBIDDEN, "forbidden"),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();
        let body = serde_json::json!({
            "success": false,
            "error": code,
            "message": message,
        });
        (status, axum::Json(body)).into_response()
    }
}

impl From<CheckoutError> for ApiError {
    fn from(err: CheckoutError) -> Self {
        ApiError::Checkout(err)
    }
}

impl From<OrderError> for ApiError {
    fn from(err: OrderError) -> Self {
        ApiError::Checkout(CheckoutError::Rule(err))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}
