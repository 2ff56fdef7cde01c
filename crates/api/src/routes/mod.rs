//! HTTP handlers and the JSON shapes they exchange.
//!
//! Successful responses use the envelope `{success, message?, data?}`.

pub mod admin;
pub mod cart;
pub mod dto;
pub mod health;
pub mod metrics;
pub mod orders;
pub mod payment;
pub mod user;

use axum::Json;
use axum::extract::{FromRequest, FromRequestParts};
use common::OrderId;
use domain::OrderStatus;
use serde::{Deserialize, Serialize};
use storage::OrderQuery;

use crate::error::ApiError;

/// Success envelope.
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub success: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

pub fn ok<T: Serialize>(data: T) -> Json<Envelope<T>> {
    Json(Envelope {
        success: true,
        message: None,
        data: Some(data),
    })
}

pub fn ok_with_message<T: Serialize>(message: &'static str, data: T) -> Json<Envelope<T>> {
    Json(Envelope {
        success: true,
        message: Some(message),
        data: Some(data),
    })
}

pub fn message(message: &'static str) -> Json<Envelope<()>> {
    Json(Envelope {
        success: true,
        message: Some(message),
        data: None,
    })
}

/// JSON body extractor whose rejections use the error envelope.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ValidJson<T>(pub T);

/// Query string extractor whose rejections use the error envelope.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ValidQuery<T>(pub T);

/// `?page&limit&status` of order listings.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub status: Option<String>,
}

impl ListParams {
    /// Applies defaults and bounds: `page >= 1`, `1 <= limit <= 100`.
    pub fn into_query(self, default_limit: u32) -> Result<OrderQuery, ApiError> {
        let page = self.page.unwrap_or(1).max(1);
        let limit = self
            .limit
            .unwrap_or(default_limit)
            .clamp(1, OrderQuery::MAX_LIMIT);
        let status = self
            .status
            .as_deref()
            .map(str::trim)
            .filter(|status| !status.is_empty())
            .map(str::parse::<OrderStatus>)
            .transpose()?;

        Ok(OrderQuery::all(page, limit).with_status(status))
    }
}

pub(crate) fn parse_order_id(raw: &str) -> Result<OrderId, ApiError> {
    OrderId::parse(raw.trim()).map_err(|e| ApiError::BadRequest(format!("Invalid order id: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_params_defaults_and_bounds() {
        let query = ListParams::default().into_query(20).unwrap();
        assert_eq!((query.page, query.limit, query.status), (1, 20, None));

        let query = ListParams {
            page: Some(0),
            limit: Some(500),
            status: Some("shipped".to_string()),
        }
        .into_query(10)
        .unwrap();
        assert_eq!(query.page, 1);
        assert_eq!(query.limit, 100);
        assert_eq!(query.status, Some(OrderStatus::Shipped));

        let query = ListParams {
            limit: Some(0),
            ..ListParams::default()
        }
        .into_query(10)
        .unwrap();
        assert_eq!(query.limit, 1);
    }

    #[test]
    fn test_list_params_unknown_status() {
        let result = ListParams {
            status: Some("lost".to_string()),
            ..ListParams::default()
        }
        .into_query(10);
        assert!(result.is_err());
    }
}
