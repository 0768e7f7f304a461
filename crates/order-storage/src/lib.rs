//! Order store for the order lifecycle system.
//!
//! This crate owns persistence of order headers and order items. Every
//! operation that touches more than one row runs as a single all-or-nothing
//! unit inside the backend: either every statement is visible after the call
//! returns, or none is. Backends never reach into the customer or courier
//! stores; callers validate those references before calling in.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use order_types::{
	AcceptInput, AcceptResult, ConfigSchema, ImplementationRegistry, Order, OrderFilter, OrderItem,
	OrderItemInput, OrderStatus,
};
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

/// Re-export implementations
pub mod implementations {
	pub mod memory;
	pub mod postgres;
}

/// Errors that can occur during order storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
	/// No order header with this id.
	#[error("Order not found: {0}")]
	OrderNotFound(Uuid),
	/// The order has no line for this catalog item.
	#[error("Item {restaurant_item_id} not found in order {order_id}")]
	ItemNotFound {
		order_id: Uuid,
		restaurant_item_id: Uuid,
	},
	/// A guarded write lost against a concurrent writer.
	#[error("Conflict: {0}")]
	Conflict(String),
	/// A row violated a storage constraint (price or quantity bounds).
	#[error("Constraint violation: {0}")]
	Constraint(String),
	/// A persisted value could not be decoded.
	#[error("Serialization error: {0}")]
	Serialization(String),
	/// Error that occurs in the storage backend.
	#[error("Backend error: {0}")]
	Backend(String),
	/// Error that occurs during configuration validation.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Trait defining the interface for order storage backends.
///
/// Timestamps are supplied by the caller so that a single logical operation
/// stamps every row it touches with the same instant.
#[async_trait]
pub trait OrderStorageInterface: Send + Sync {
	/// Prepares the backend (for example creating tables). Called once at startup.
	async fn initialize(&self) -> Result<(), StorageError> {
		Ok(())
	}

	/// Inserts a header without items.
	async fn insert_order(&self, order: &Order) -> Result<(), StorageError>;

	/// Inserts a header and all of its items atomically.
	///
	/// Returns the persisted item rows, each with a freshly generated id.
	async fn insert_order_with_items(
		&self,
		order: &Order,
		items: &[OrderItemInput],
	) -> Result<Vec<OrderItem>, StorageError>;

	/// Lists orders matching `filter`, newest first.
	async fn list_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>, StorageError>;

	/// Loads a single header.
	async fn get_order(&self, order_id: Uuid) -> Result<Order, StorageError>;

	/// Loads the current status of an order.
	async fn get_status(&self, order_id: Uuid) -> Result<OrderStatus, StorageError>;

	/// Loads the item rows of an order.
	async fn list_items(&self, order_id: Uuid) -> Result<Vec<OrderItem>, StorageError>;

	/// Writes `status` unconditionally.
	async fn update_status(
		&self,
		order_id: Uuid,
		status: OrderStatus,
		now: DateTime<Utc>,
	) -> Result<(), StorageError>;

	/// Writes `status` only if the row still carries `expected_version`.
	///
	/// Returns the updated header. A stale version yields
	/// [`StorageError::Conflict`].
	async fn compare_and_set_status(
		&self,
		order_id: Uuid,
		expected_version: i64,
		status: OrderStatus,
		now: DateTime<Utc>,
	) -> Result<Order, StorageError>;

	/// Sum of `price * quantity` over the order's items; zero without items.
	async fn order_total(&self, order_id: Uuid) -> Result<Decimal, StorageError>;

	/// Idempotent accept.
	///
	/// If the persisted status is already a kitchen decision nothing is
	/// written and that status is returned. Otherwise the header is upserted
	/// with `status`, and the candidate items are inserted only when the
	/// order has no items yet.
	async fn accept_order(
		&self,
		input: &AcceptInput,
		status: OrderStatus,
		now: DateTime<Utc>,
	) -> Result<AcceptResult, StorageError>;

	/// Appends an item to an existing order and touches `updated_at`.
	async fn add_item(
		&self,
		order_id: Uuid,
		item: &OrderItemInput,
		now: DateTime<Utc>,
	) -> Result<OrderItem, StorageError>;

	/// Deletes the order's lines for `restaurant_item_id` and touches `updated_at`.
	///
	/// Returns the number of deleted rows; zero rows is
	/// [`StorageError::ItemNotFound`] and leaves the order untouched.
	async fn remove_item(
		&self,
		order_id: Uuid,
		restaurant_item_id: Uuid,
		now: DateTime<Utc>,
	) -> Result<u64, StorageError>;

	/// Returns the configuration schema for validation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;
}

/// Type alias for order storage factory functions.
pub type OrderStorageFactory =
	fn(&toml::Value) -> Result<Box<dyn OrderStorageInterface>, StorageError>;

/// Registry trait for order storage implementations.
pub trait OrderStorageRegistry: ImplementationRegistry<Factory = OrderStorageFactory> {}

/// Get all registered order storage implementations.
///
/// Returns a vector of (name, factory) tuples for all available implementations.
pub fn get_all_implementations() -> Vec<(&'static str, OrderStorageFactory)> {
	use implementations::{memory, postgres};

	vec![
		(memory::Registry::NAME, memory::Registry::factory()),
		(postgres::Registry::NAME, postgres::Registry::factory()),
	]
}

/// Checks the storage-level bounds of an item line.
pub(crate) fn check_item_constraints(item: &OrderItemInput) -> Result<(), StorageError> {
	if item.quantity <= 0 {
		return Err(StorageError::Constraint(format!(
			"quantity must be positive, got {}",
			item.quantity
		)));
	}
	if item.price < Decimal::ZERO {
		return Err(StorageError::Constraint(format!(
			"price must not be negative, got {}",
			item.price
		)));
	}
	Ok(())
}

/// High-level order storage service.
///
/// Wraps a backend and adds tracing around each write.
pub struct OrderStorageService {
	backend: Box<dyn OrderStorageInterface>,
}

impl OrderStorageService {
	/// Creates a new OrderStorageService with the specified backend.
	pub fn new(backend: Box<dyn OrderStorageInterface>) -> Self {
		Self { backend }
	}

	/// Prepares the backend before first use.
	pub async fn initialize(&self) -> Result<(), StorageError> {
		self.backend.initialize().await
	}

	/// Inserts a header without items.
	pub async fn insert_order(&self, order: &Order) -> Result<(), StorageError> {
		self.backend.insert_order(order).await?;
		tracing::debug!(order_id = %order.id, "Inserted order header");
		Ok(())
	}

	/// Inserts a header and its items in one unit.
	pub async fn insert_order_with_items(
		&self,
		order: &Order,
		items: &[OrderItemInput],
	) -> Result<Vec<OrderItem>, StorageError> {
		let rows = self.backend.insert_order_with_items(order, items).await?;
		tracing::debug!(order_id = %order.id, items = rows.len(), "Inserted order with items");
		Ok(rows)
	}

	/// Lists orders matching `filter`, newest first.
	pub async fn list_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>, StorageError> {
		self.backend.list_orders(filter).await
	}

	/// Loads a single header.
	pub async fn get_order(&self, order_id: Uuid) -> Result<Order, StorageError> {
		self.backend.get_order(order_id).await
	}

	/// Loads the current status of an order.
	pub async fn get_status(&self, order_id: Uuid) -> Result<OrderStatus, StorageError> {
		self.backend.get_status(order_id).await
	}

	/// Loads the item rows of an order.
	pub async fn list_items(&self, order_id: Uuid) -> Result<Vec<OrderItem>, StorageError> {
		self.backend.list_items(order_id).await
	}

	/// Writes `status` without a version check.
	pub async fn update_status(
		&self,
		order_id: Uuid,
		status: OrderStatus,
		now: DateTime<Utc>,
	) -> Result<(), StorageError> {
		self.backend.update_status(order_id, status, now).await?;
		tracing::debug!(order_id = %order_id, status = %status, "Status overwritten");
		Ok(())
	}

	/// Writes `status` only if the row still carries `expected_version`.
	pub async fn compare_and_set_status(
		&self,
		order_id: Uuid,
		expected_version: i64,
		status: OrderStatus,
		now: DateTime<Utc>,
	) -> Result<Order, StorageError> {
		self.backend
			.compare_and_set_status(order_id, expected_version, status, now)
			.await
	}

	/// Sum of `price * quantity` over the order's items.
	pub async fn order_total(&self, order_id: Uuid) -> Result<Decimal, StorageError> {
		self.backend.order_total(order_id).await
	}

	/// Idempotent accept; returns the status actually persisted.
	pub async fn accept_order(
		&self,
		input: &AcceptInput,
		status: OrderStatus,
		now: DateTime<Utc>,
	) -> Result<AcceptResult, StorageError> {
		let result = self.backend.accept_order(input, status, now).await?;
		tracing::debug!(
			order_id = %input.order_id,
			requested = %status,
			persisted = %result.status,
			"Accept applied"
		);
		Ok(result)
	}

	/// Appends an item and touches `updated_at`.
	pub async fn add_item(
		&self,
		order_id: Uuid,
		item: &OrderItemInput,
		now: DateTime<Utc>,
	) -> Result<OrderItem, StorageError> {
		self.backend.add_item(order_id, item, now).await
	}

	/// Deletes the order's lines for `restaurant_item_id`.
	pub async fn remove_item(
		&self,
		order_id: Uuid,
		restaurant_item_id: Uuid,
		now: DateTime<Utc>,
	) -> Result<u64, StorageError> {
		self.backend
			.remove_item(order_id, restaurant_item_id, now)
			.await
	}
}
