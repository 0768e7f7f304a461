//! API types for the order HTTP API.
//!
//! This module defines the request and response bodies of the order
//! endpoints together with the error envelope and its status mapping.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::{OrderItemInput, OrderStatus};

/// Request body for creating an order.
///
/// When `restaurant_id` is present every item is priced from that
/// restaurant's menu. Without it each item must carry its own price.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrderRequest {
	pub customer_id: Uuid,
	pub courier_id: Uuid,
	#[serde(default)]
	pub restaurant_id: Option<Uuid>,
	#[serde(default)]
	pub items: Vec<CreateOrderItem>,
}

/// One requested line of a new order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrderItem {
	pub restaurant_item_id: Uuid,
	pub quantity: i32,
	/// Unit price, only honoured when no restaurant is given.
	#[serde(default)]
	pub price: Option<Decimal>,
}

/// Request body for the accept endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcceptOrderRequest {
	pub customer_id: Uuid,
	pub courier_id: Uuid,
	#[serde(default)]
	pub items: Vec<OrderItemInput>,
	#[serde(default)]
	pub status: Option<OrderStatus>,
}

/// Request body for paying an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayOrderRequest {
	pub customer_id: Uuid,
}

/// Request body for status writes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusRequest {
	pub status: OrderStatus,
}

/// Response carrying an order's status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
	pub order_id: Uuid,
	pub status: OrderStatus,
}

/// Response carrying an order's total.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TotalResponse {
	pub order_id: Uuid,
	pub total: Decimal,
}

/// Response carrying a customer's wallet address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletAddressResponse {
	pub customer_id: Uuid,
	pub wallet_address: String,
}

/// API error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
	/// Error type/code
	pub error: String,
	/// Human-readable description
	pub message: String,
	/// Additional error context
	#[serde(skip_serializing_if = "Option::is_none")]
	pub details: Option<serde_json::Value>,
	/// Order status left behind by a partially applied operation
	#[serde(skip_serializing_if = "Option::is_none")]
	pub status: Option<OrderStatus>,
}

/// Structured API error type with appropriate HTTP status mapping.
#[derive(Debug)]
pub enum APIError {
	/// Malformed input or rejected business rule (400)
	BadRequest {
		error_type: String,
		message: String,
		details: Option<serde_json::Value>,
	},
	/// Referenced entity does not exist (404)
	NotFound { error_type: String, message: String },
	/// Payment declined; the order was moved to `status` (402)
	PaymentRequired {
		message: String,
		status: OrderStatus,
	},
	/// Request conflicts with current state (409)
	Conflict { error_type: String, message: String },
	/// An upstream collaborator failed (502)
	BadGateway { error_type: String, message: String },
	/// Internal server error (500)
	InternalServerError { error_type: String, message: String },
}

impl APIError {
	/// Get the HTTP status code for this error.
	pub fn status_code(&self) -> u16 {
		match self {
			APIError::BadRequest { .. } => 400,
			APIError::PaymentRequired { .. } => 402,
			APIError::NotFound { .. } => 404,
			APIError::Conflict { .. } => 409,
			APIError::InternalServerError { .. } => 500,
			APIError::BadGateway { .. } => 502,
		}
	}

	/// Convert to ErrorResponse for JSON serialization.
	pub fn to_error_response(&self) -> ErrorResponse {
		let (error, message, details, status) = match self {
			APIError::BadRequest {
				error_type,
				message,
				details,
			} => (error_type.as_str(), message, details.clone(), None),
			APIError::PaymentRequired { message, status } => {
				("PAYMENT_REQUIRED", message, None, Some(*status))
			},
			APIError::NotFound {
				error_type,
				message,
			}
			| APIError::Conflict {
				error_type,
				message,
			}
			| APIError::BadGateway {
				error_type,
				message,
			}
			| APIError::InternalServerError {
				error_type,
				message,
			} => (error_type.as_str(), message, None, None),
		};
		ErrorResponse {
			error: error.to_string(),
			message: message.clone(),
			details,
			status,
		}
	}
}

impl fmt::Display for APIError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			APIError::BadRequest { message, .. } => write!(f, "Bad Request: {}", message),
			APIError::NotFound { message, .. } => write!(f, "Not Found: {}", message),
			APIError::PaymentRequired { message, .. } => {
				write!(f, "Payment Required: {}", message)
			},
			APIError::Conflict { message, .. } => write!(f, "Conflict: {}", message),
			APIError::BadGateway { message, .. } => write!(f, "Bad Gateway: {}", message),
			APIError::InternalServerError { message, .. } => {
				write!(f, "Internal Server Error: {}", message)
			},
		}
	}
}

impl std::error::Error for APIError {}

#[cfg(feature = "axum")]
impl axum::response::IntoResponse for APIError {
	fn into_response(self) -> axum::response::Response {
		use axum::{http::StatusCode, response::Json};

		let status = StatusCode::from_u16(self.status_code())
			.unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
		(status, Json(self.to_error_response())).into_response()
	}
}
