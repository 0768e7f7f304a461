//! Order lifecycle engine.
//!
//! Ties the order store, the customer and courier directories and the wallet
//! client together. [`OrderStore`] validates and stamps inputs before
//! delegating to storage, [`OrderStateMachine`] enforces the status
//! transition table, and [`PaymentHandler`] runs the debit-then-transition
//! payment saga. [`OrderEngine`] bundles them for the service layer.

pub mod builder;
pub mod engine;
pub mod handlers;
pub mod state;
pub mod store;

pub use builder::{BuilderError, OrderBuilder, OrderFactories};
pub use engine::{EngineError, OrderEngine};
pub use handlers::PaymentHandler;
pub use state::OrderStateMachine;
pub use store::OrderStore;

use order_catalog::CatalogError;
use order_directory::DirectoryError;
use order_storage::StorageError;
use order_types::OrderStatus;
use order_wallet::WalletError;
use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by order operations.
#[derive(Debug, Error)]
pub enum OrderError {
	#[error("Customer not found: {0}")]
	CustomerNotFound(Uuid),
	#[error("Courier not found: {0}")]
	CourierNotFound(Uuid),
	#[error("Order not found: {0}")]
	OrderNotFound(Uuid),
	#[error("Item {restaurant_item_id} not found in order {order_id}")]
	ItemNotFound {
		order_id: Uuid,
		restaurant_item_id: Uuid,
	},
	/// The input was rejected before reaching storage.
	#[error("Validation error: {0}")]
	Validation(String),
	#[error("Invalid status transition from {from} to {to}")]
	InvalidTransition { from: OrderStatus, to: OrderStatus },
	#[error("Order {order_id} does not belong to customer {customer_id}")]
	NotOrderOwner { order_id: Uuid, customer_id: Uuid },
	#[error("Order must be in status {required}, current status is {current}")]
	StatusRequired {
		required: OrderStatus,
		current: OrderStatus,
	},
	#[error("Item not available: {0}")]
	ItemUnavailable(Uuid),
	/// Another writer changed the order between read and write.
	#[error("Concurrent modification: {0}")]
	ConcurrentModification(String),
	/// The debit was declined. The order has already been moved to `status`.
	#[error("Insufficient funds for order {order_id}, order is now {status}")]
	InsufficientFunds { order_id: Uuid, status: OrderStatus },
	#[error("Wallet service is not configured")]
	WalletUnavailable,
	#[error("Wallet error: {0}")]
	Wallet(#[from] WalletError),
	#[error("Storage error: {0}")]
	Store(String),
	#[error("Directory error: {0}")]
	Directory(String),
	#[error("Catalog error: {0}")]
	Catalog(String),
}

/// Coarse classification of [`OrderError`] for transport layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
	NotFound,
	Validation,
	Conflict,
	PaymentRequired,
	/// A dependency answered badly.
	Upstream,
	Internal,
}

impl OrderError {
	pub fn kind(&self) -> ErrorKind {
		match self {
			OrderError::CustomerNotFound(_)
			| OrderError::CourierNotFound(_)
			| OrderError::OrderNotFound(_)
			| OrderError::ItemNotFound { .. } => ErrorKind::NotFound,
			OrderError::Validation(_)
			| OrderError::InvalidTransition { .. }
			| OrderError::NotOrderOwner { .. }
			| OrderError::StatusRequired { .. } => ErrorKind::Validation,
			OrderError::ItemUnavailable(_) | OrderError::ConcurrentModification(_) => {
				ErrorKind::Conflict
			},
			OrderError::InsufficientFunds { .. } => ErrorKind::PaymentRequired,
			OrderError::Catalog(_) => ErrorKind::Upstream,
			OrderError::WalletUnavailable
			| OrderError::Wallet(_)
			| OrderError::Store(_)
			| OrderError::Directory(_) => ErrorKind::Internal,
		}
	}
}

impl From<StorageError> for OrderError {
	fn from(err: StorageError) -> Self {
		match err {
			StorageError::OrderNotFound(id) => OrderError::OrderNotFound(id),
			StorageError::ItemNotFound {
				order_id,
				restaurant_item_id,
			} => OrderError::ItemNotFound {
				order_id,
				restaurant_item_id,
			},
			StorageError::Conflict(msg) => OrderError::ConcurrentModification(msg),
			StorageError::Constraint(msg) => OrderError::Validation(msg),
			other => OrderError::Store(other.to_string()),
		}
	}
}

impl From<DirectoryError> for OrderError {
	fn from(err: DirectoryError) -> Self {
		match err {
			DirectoryError::CustomerNotFound(id) => OrderError::CustomerNotFound(id),
			DirectoryError::CourierNotFound(id) => OrderError::CourierNotFound(id),
			DirectoryError::EmptyWalletAddress(_) => OrderError::Validation(err.to_string()),
			other => OrderError::Directory(other.to_string()),
		}
	}
}

impl From<CatalogError> for OrderError {
	fn from(err: CatalogError) -> Self {
		match err {
			CatalogError::ItemUnavailable(id) => OrderError::ItemUnavailable(id),
			CatalogError::InvalidQuantity { .. } => OrderError::Validation(err.to_string()),
			other => OrderError::Catalog(other.to_string()),
		}
	}
}

#[cfg(test)]
pub(crate) mod test_support {
	use crate::{OrderStateMachine, OrderStore, PaymentHandler};
	use async_trait::async_trait;
	use mockall::mock;
	use order_directory::implementations::memory::MemoryDirectory;
	use order_directory::DirectoryService;
	use order_storage::implementations::memory::MemoryOrderStorage;
	use order_storage::OrderStorageService;
	use order_types::{ConfigSchema, OrderItemInput};
	use order_wallet::{WalletError, WalletInterface, WalletService};
	use rust_decimal::Decimal;
	use std::sync::Arc;
	use std::time::Duration;
	use uuid::Uuid;

	mock! {
		pub Wallet {}

		#[async_trait]
		impl WalletInterface for Wallet {
			fn config_schema(&self) -> Box<dyn ConfigSchema>;
			async fn debit(&self, address: &str, amount: Decimal) -> Result<bool, WalletError>;
		}
	}

	pub const WALLET: &str = "0xc0ffee";

	/// Memory-backed collaborators with one known customer and courier.
	pub struct Fixture {
		pub customer_id: Uuid,
		pub courier_id: Uuid,
		/// Shares records with the directory inside `store`.
		pub customers: MemoryDirectory,
		pub store: Arc<OrderStore>,
		pub state_machine: Arc<OrderStateMachine>,
	}

	impl Fixture {
		pub async fn new() -> Self {
			let customer_id = Uuid::new_v4();
			let courier_id = Uuid::new_v4();

			let customers = MemoryDirectory::new();
			customers.insert(customer_id, Some(WALLET.into())).await;
			let couriers = MemoryDirectory::new();
			couriers.insert(courier_id, None).await;

			let directory = Arc::new(DirectoryService::new(
				Box::new(customers.clone()),
				Box::new(couriers),
			));
			let storage = Arc::new(OrderStorageService::new(Box::new(MemoryOrderStorage::new())));
			let store = Arc::new(OrderStore::new(storage.clone(), directory));
			let state_machine = Arc::new(OrderStateMachine::new(storage));

			Self {
				customer_id,
				courier_id,
				customers,
				store,
				state_machine,
			}
		}

		pub fn payment_handler(&self, wallet: Option<MockWallet>) -> PaymentHandler {
			PaymentHandler::new(
				self.store.clone(),
				self.state_machine.clone(),
				wallet.map(|w| Arc::new(WalletService::new(Box::new(w), Duration::from_secs(5)))),
			)
		}
	}

	pub fn item(price: i64, quantity: i32) -> OrderItemInput {
		OrderItemInput {
			restaurant_item_id: Uuid::new_v4(),
			price: Decimal::new(price, 0),
			quantity,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_storage_errors_keep_their_meaning() {
		let id = Uuid::new_v4();
		assert!(matches!(
			OrderError::from(StorageError::OrderNotFound(id)),
			OrderError::OrderNotFound(found) if found == id
		));
		assert_eq!(
			OrderError::from(StorageError::Conflict("version 3".into())).kind(),
			ErrorKind::Conflict
		);
		assert_eq!(
			OrderError::from(StorageError::Constraint("quantity".into())).kind(),
			ErrorKind::Validation
		);
		assert_eq!(
			OrderError::from(StorageError::Backend("connection reset".into())).kind(),
			ErrorKind::Internal
		);
	}

	#[test]
	fn test_directory_and_catalog_errors() {
		let id = Uuid::new_v4();
		assert_eq!(
			OrderError::from(DirectoryError::CourierNotFound(id)).kind(),
			ErrorKind::NotFound
		);
		assert_eq!(
			OrderError::from(CatalogError::ItemUnavailable(id)).kind(),
			ErrorKind::Conflict
		);
		assert_eq!(
			OrderError::from(CatalogError::Service("502".into())).kind(),
			ErrorKind::Upstream
		);
	}

	#[test]
	fn test_insufficient_funds_is_payment_required() {
		let err = OrderError::InsufficientFunds {
			order_id: Uuid::new_v4(),
			status: OrderStatus::Cancelled,
		};
		assert_eq!(err.kind(), ErrorKind::PaymentRequired);
		assert!(err.to_string().contains("CANCELLED"));
	}
}
