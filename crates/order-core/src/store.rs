//! Order store facade.
//!
//! Validates caller input, stamps ids and timestamps, and checks that the
//! referenced customer and courier exist before any storage unit is opened.
//! The directory check and the order write are separate transactions
//! against separate stores, so a customer removed in between is not
//! detected.

use chrono::{DateTime, SubsecRound, Utc};
use order_directory::DirectoryService;
use order_storage::OrderStorageService;
use order_types::{
	truncate_id, AcceptInput, AcceptResult, NewOrder, Order, OrderFilter, OrderItem,
	OrderItemInput, OrderStatus,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use crate::OrderError;

/// Current time at the precision storage keeps.
pub(crate) fn now() -> DateTime<Utc> {
	Utc::now().trunc_subsecs(6)
}

fn require_id(id: Uuid, field: &str) -> Result<(), OrderError> {
	if id.is_nil() {
		return Err(OrderError::Validation(format!("{} must not be nil", field)));
	}
	Ok(())
}

fn validate_item(index: usize, item: &OrderItemInput) -> Result<(), OrderError> {
	require_id(item.restaurant_item_id, &format!("items[{}].restaurant_item_id", index))?;
	if item.quantity <= 0 {
		return Err(OrderError::Validation(format!(
			"items[{}].quantity must be positive",
			index
		)));
	}
	if item.price < Decimal::ZERO {
		return Err(OrderError::Validation(format!(
			"items[{}].price must not be negative",
			index
		)));
	}
	Ok(())
}

/// Entry point for order reads and writes.
pub struct OrderStore {
	storage: Arc<OrderStorageService>,
	directory: Arc<DirectoryService>,
}

impl OrderStore {
	pub fn new(storage: Arc<OrderStorageService>, directory: Arc<DirectoryService>) -> Self {
		Self { storage, directory }
	}

	fn stamp(&self, new_order: NewOrder) -> Result<Order, OrderError> {
		if let Some(id) = new_order.id {
			require_id(id, "id")?;
		}
		require_id(new_order.customer_id, "customer_id")?;
		require_id(new_order.courier_id, "courier_id")?;

		Ok(Order::new(
			new_order.id.unwrap_or_else(Uuid::new_v4),
			new_order.customer_id,
			new_order.courier_id,
			new_order.status.unwrap_or(OrderStatus::Created),
			now(),
		))
	}

	async fn ensure_participants(&self, customer_id: Uuid, courier_id: Uuid) -> Result<(), OrderError> {
		self.directory.ensure_customer_exists(customer_id).await?;
		self.directory.ensure_courier_exists(courier_id).await?;
		Ok(())
	}

	/// Creates an order header without items.
	#[instrument(skip_all, fields(customer_id = %new_order.customer_id))]
	pub async fn create_order(&self, new_order: NewOrder) -> Result<Order, OrderError> {
		let order = self.stamp(new_order)?;
		self.ensure_participants(order.customer_id, order.courier_id)
			.await?;
		self.storage.insert_order(&order).await?;

		tracing::info!(order_id = %truncate_id(&order.id.to_string()), "Order created");
		Ok(order)
	}

	/// Creates an order together with its items. Nothing is written unless
	/// the header and every item are written.
	#[instrument(skip_all, fields(customer_id = %new_order.customer_id, items = items.len()))]
	pub async fn create_order_with_items(
		&self,
		new_order: NewOrder,
		items: &[OrderItemInput],
	) -> Result<(Order, Vec<OrderItem>), OrderError> {
		if items.is_empty() {
			return Err(OrderError::Validation("items must not be empty".into()));
		}
		for (index, item) in items.iter().enumerate() {
			validate_item(index, item)?;
		}
		let order = self.stamp(new_order)?;
		self.ensure_participants(order.customer_id, order.courier_id)
			.await?;

		let rows = self.storage.insert_order_with_items(&order, items).await?;

		tracing::info!(
			order_id = %truncate_id(&order.id.to_string()),
			items = rows.len(),
			"Order created with items"
		);
		Ok((order, rows))
	}

	pub async fn list_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>, OrderError> {
		Ok(self.storage.list_orders(filter).await?)
	}

	pub async fn get_order(&self, order_id: Uuid) -> Result<Order, OrderError> {
		Ok(self.storage.get_order(order_id).await?)
	}

	pub async fn get_order_status(&self, order_id: Uuid) -> Result<OrderStatus, OrderError> {
		Ok(self.storage.get_status(order_id).await?)
	}

	pub async fn list_items(&self, order_id: Uuid) -> Result<Vec<OrderItem>, OrderError> {
		Ok(self.storage.list_items(order_id).await?)
	}

	/// Overwrites the status without consulting the transition table.
	///
	/// Administrative correction only; lifecycle changes go through
	/// [`crate::OrderStateMachine::change_status`].
	pub async fn update_order_status(
		&self,
		order_id: Uuid,
		status: OrderStatus,
	) -> Result<(), OrderError> {
		self.storage.update_status(order_id, status, now()).await?;
		tracing::warn!(
			order_id = %truncate_id(&order_id.to_string()),
			status = %status,
			"Status overwritten without transition check"
		);
		Ok(())
	}

	/// Sum of `price * quantity` over the order's items.
	pub async fn calculate_order_total(&self, order_id: Uuid) -> Result<Decimal, OrderError> {
		Ok(self.storage.order_total(order_id).await?)
	}

	/// Idempotent accept. Returns the status that is actually persisted,
	/// which is the earlier decision when the kitchen already decided.
	#[instrument(skip_all, fields(order_id = %truncate_id(&input.order_id.to_string())))]
	pub async fn accept_order(&self, input: AcceptInput) -> Result<AcceptResult, OrderError> {
		require_id(input.order_id, "order_id")?;
		require_id(input.customer_id, "customer_id")?;
		require_id(input.courier_id, "courier_id")?;
		for (index, item) in input.items.iter().enumerate() {
			validate_item(index, item)?;
		}
		self.ensure_participants(input.customer_id, input.courier_id)
			.await?;

		let requested = input.status.unwrap_or(OrderStatus::KitchenAccepted);
		let result = self.storage.accept_order(&input, requested, now()).await?;

		if result.status == requested {
			tracing::info!(status = %result.status, "Order accepted");
		} else {
			tracing::info!(
				requested = %requested,
				persisted = %result.status,
				"Kitchen already decided, accept ignored"
			);
		}
		Ok(result)
	}

	/// Appends an item to an existing order.
	pub async fn add_item_into_order(
		&self,
		order_id: Uuid,
		item: OrderItemInput,
	) -> Result<OrderItem, OrderError> {
		require_id(order_id, "order_id")?;
		validate_item(0, &item)?;
		Ok(self.storage.add_item(order_id, &item, now()).await?)
	}

	/// Removes every line of `restaurant_item_id` from the order.
	pub async fn remove_item_from_order(
		&self,
		order_id: Uuid,
		restaurant_item_id: Uuid,
	) -> Result<u64, OrderError> {
		require_id(order_id, "order_id")?;
		require_id(restaurant_item_id, "restaurant_item_id")?;
		Ok(self
			.storage
			.remove_item(order_id, restaurant_item_id, now())
			.await?)
	}

	pub async fn get_customer_wallet_address(&self, customer_id: Uuid) -> Result<String, OrderError> {
		require_id(customer_id, "customer_id")?;
		Ok(self.directory.customer_wallet_address(customer_id).await?)
	}
}
