//! Request processing behind the HTTP routes.
//!
//! Route handlers in [`crate::server`] unwrap extractors and delegate here;
//! everything in this module speaks [`APIError`].

pub mod customer;
pub mod order;

use order_core::{ErrorKind, OrderError};
use order_types::APIError;
use std::fmt::Display;

/// Stable error code reported in the `error` field of the envelope.
fn error_code(err: &OrderError) -> &'static str {
	match err {
		OrderError::CustomerNotFound(_) => "CUSTOMER_NOT_FOUND",
		OrderError::CourierNotFound(_) => "COURIER_NOT_FOUND",
		OrderError::OrderNotFound(_) => "ORDER_NOT_FOUND",
		OrderError::ItemNotFound { .. } => "ITEM_NOT_FOUND",
		OrderError::Validation(_) => "VALIDATION_ERROR",
		OrderError::InvalidTransition { .. } => "INVALID_TRANSITION",
		OrderError::NotOrderOwner { .. } => "NOT_ORDER_OWNER",
		OrderError::StatusRequired { .. } => "INVALID_ORDER_STATUS",
		OrderError::ItemUnavailable(_) => "ITEM_UNAVAILABLE",
		OrderError::ConcurrentModification(_) => "CONCURRENT_MODIFICATION",
		OrderError::InsufficientFunds { .. } => "PAYMENT_REQUIRED",
		OrderError::WalletUnavailable => "WALLET_UNAVAILABLE",
		OrderError::Wallet(_) => "WALLET_ERROR",
		OrderError::Store(_) => "STORAGE_ERROR",
		OrderError::Directory(_) => "DIRECTORY_ERROR",
		OrderError::Catalog(_) => "CATALOG_ERROR",
	}
}

/// Maps an order error onto the HTTP error envelope.
pub fn to_api_error(err: OrderError) -> APIError {
	let error_type = error_code(&err).to_string();
	let message = err.to_string();
	match (&err, err.kind()) {
		(OrderError::InsufficientFunds { status, .. }, _) => APIError::PaymentRequired {
			message,
			status: *status,
		},
		(_, ErrorKind::NotFound) => APIError::NotFound {
			error_type,
			message,
		},
		(_, ErrorKind::Validation) => APIError::BadRequest {
			error_type,
			message,
			details: None,
		},
		(_, ErrorKind::Conflict) => APIError::Conflict {
			error_type,
			message,
		},
		(_, ErrorKind::Upstream) => APIError::BadGateway {
			error_type,
			message,
		},
		(_, ErrorKind::PaymentRequired | ErrorKind::Internal) => APIError::InternalServerError {
			error_type,
			message,
		},
	}
}

/// Wraps an extractor rejection (bad JSON, non-UUID path segment, bad query).
pub fn invalid_request(rejection: impl Display) -> APIError {
	APIError::BadRequest {
		error_type: "INVALID_REQUEST".to_string(),
		message: rejection.to_string(),
		details: None,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use order_types::OrderStatus;
	use uuid::Uuid;

	#[test]
	fn test_status_codes_follow_error_kind() {
		let id = Uuid::new_v4();
		let cases = [
			(OrderError::OrderNotFound(id), 404),
			(OrderError::Validation("quantity".into()), 400),
			(
				OrderError::InvalidTransition {
					from: OrderStatus::OrderCompleted,
					to: OrderStatus::Created,
				},
				400,
			),
			(OrderError::ConcurrentModification("version 2".into()), 409),
			(OrderError::Catalog("menu service returned 503".into()), 502),
			(OrderError::Store("connection reset".into()), 500),
			(OrderError::WalletUnavailable, 500),
		];
		for (err, status) in cases {
			assert_eq!(to_api_error(err).status_code(), status);
		}
	}

	#[test]
	fn test_insufficient_funds_reports_new_status() {
		let err = to_api_error(OrderError::InsufficientFunds {
			order_id: Uuid::new_v4(),
			status: OrderStatus::Cancelled,
		});
		let body = err.to_error_response();
		assert_eq!(err.status_code(), 402);
		assert_eq!(body.error, "PAYMENT_REQUIRED");
		assert_eq!(body.status, Some(OrderStatus::Cancelled));
	}

	#[test]
	fn test_error_code_in_envelope() {
		let body = to_api_error(OrderError::CourierNotFound(Uuid::nil())).to_error_response();
		assert_eq!(body.error, "COURIER_NOT_FOUND");
		assert!(body.message.contains(&Uuid::nil().to_string()));
	}
}
