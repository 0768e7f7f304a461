//! In-memory order storage backend.
//!
//! Both tables live behind a single `RwLock`. A write unit clones the tables,
//! applies its statements to the copy and swaps the copy in only if every
//! statement succeeded, so a failing unit leaves no trace. Holding the write
//! lock for the whole unit serialises writers, which gives the same outcome
//! as row locks for the per-order operations exposed here.

use crate::{
	check_item_constraints, OrderStorageFactory, OrderStorageInterface, OrderStorageRegistry,
	StorageError,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use order_types::{
	AcceptInput, AcceptResult, ConfigSchema, ImplementationRegistry, Order, OrderFilter, OrderItem,
	OrderItemInput, OrderStatus, Schema, ValidationError,
};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
struct Tables {
	orders: HashMap<Uuid, Order>,
	items: Vec<OrderItem>,
}

impl Tables {
	fn order_mut(&mut self, order_id: Uuid) -> Result<&mut Order, StorageError> {
		self.orders
			.get_mut(&order_id)
			.ok_or(StorageError::OrderNotFound(order_id))
	}

	fn insert_items(
		&mut self,
		order_id: Uuid,
		items: &[OrderItemInput],
	) -> Result<Vec<OrderItem>, StorageError> {
		let mut rows = Vec::with_capacity(items.len());
		for item in items {
			check_item_constraints(item)?;
			let row = OrderItem::from_input(order_id, item);
			self.items.push(row.clone());
			rows.push(row);
		}
		Ok(rows)
	}

	fn item_count(&self, order_id: Uuid) -> usize {
		self.items.iter().filter(|i| i.order_id == order_id).count()
	}
}

/// In-memory order storage.
///
/// Provides no persistence across restarts.
pub struct MemoryOrderStorage {
	tables: Arc<RwLock<Tables>>,
}

impl MemoryOrderStorage {
	/// Creates a new empty MemoryOrderStorage instance.
	pub fn new() -> Self {
		Self {
			tables: Arc::new(RwLock::new(Tables::default())),
		}
	}

	/// Runs `unit` against a staged copy and publishes it only on success.
	///
	/// Staging clones both tables, so every write costs O(rows held).
	async fn transaction<T, F>(&self, unit: F) -> Result<T, StorageError>
	where
		F: FnOnce(&mut Tables) -> Result<T, StorageError>,
	{
		let mut tables = self.tables.write().await;
		let mut staged = tables.clone();
		let out = unit(&mut staged)?;
		*tables = staged;
		Ok(out)
	}
}

impl Default for MemoryOrderStorage {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl OrderStorageInterface for MemoryOrderStorage {
	async fn insert_order(&self, order: &Order) -> Result<(), StorageError> {
		self.insert_order_with_items(order, &[]).await.map(|_| ())
	}

	async fn insert_order_with_items(
		&self,
		order: &Order,
		items: &[OrderItemInput],
	) -> Result<Vec<OrderItem>, StorageError> {
		self.transaction(|t| {
			if t.orders.contains_key(&order.id) {
				return Err(StorageError::Constraint(format!(
					"duplicate order id {}",
					order.id
				)));
			}
			t.orders.insert(order.id, order.clone());
			t.insert_items(order.id, items)
		})
		.await
	}

	async fn list_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>, StorageError> {
		let tables = self.tables.read().await;
		let mut orders: Vec<Order> = tables
			.orders
			.values()
			.filter(|o| filter.matches(o))
			.cloned()
			.collect();
		orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
		Ok(orders)
	}

	async fn get_order(&self, order_id: Uuid) -> Result<Order, StorageError> {
		let tables = self.tables.read().await;
		tables
			.orders
			.get(&order_id)
			.cloned()
			.ok_or(StorageError::OrderNotFound(order_id))
	}

	async fn get_status(&self, order_id: Uuid) -> Result<OrderStatus, StorageError> {
		self.get_order(order_id).await.map(|o| o.status)
	}

	async fn list_items(&self, order_id: Uuid) -> Result<Vec<OrderItem>, StorageError> {
		let tables = self.tables.read().await;
		if !tables.orders.contains_key(&order_id) {
			return Err(StorageError::OrderNotFound(order_id));
		}
		Ok(tables
			.items
			.iter()
			.filter(|i| i.order_id == order_id)
			.cloned()
			.collect())
	}

	async fn update_status(
		&self,
		order_id: Uuid,
		status: OrderStatus,
		now: DateTime<Utc>,
	) -> Result<(), StorageError> {
		self.transaction(|t| {
			let order = t.order_mut(order_id)?;
			order.status = status;
			order.updated_at = now;
			order.version += 1;
			Ok(())
		})
		.await
	}

	async fn compare_and_set_status(
		&self,
		order_id: Uuid,
		expected_version: i64,
		status: OrderStatus,
		now: DateTime<Utc>,
	) -> Result<Order, StorageError> {
		self.transaction(|t| {
			let order = t.order_mut(order_id)?;
			if order.version != expected_version {
				return Err(StorageError::Conflict(format!(
					"order {} is at version {}, expected {}",
					order_id, order.version, expected_version
				)));
			}
			order.status = status;
			order.updated_at = now;
			order.version += 1;
			Ok(order.clone())
		})
		.await
	}

	async fn order_total(&self, order_id: Uuid) -> Result<Decimal, StorageError> {
		let tables = self.tables.read().await;
		if !tables.orders.contains_key(&order_id) {
			return Err(StorageError::OrderNotFound(order_id));
		}
		Ok(tables
			.items
			.iter()
			.filter(|i| i.order_id == order_id)
			.map(OrderItem::line_total)
			.sum())
	}

	async fn accept_order(
		&self,
		input: &AcceptInput,
		status: OrderStatus,
		now: DateTime<Utc>,
	) -> Result<AcceptResult, StorageError> {
		self.transaction(|t| {
			if let Some(existing) = t.orders.get_mut(&input.order_id) {
				if existing.status.is_kitchen_decision() {
					return Ok(AcceptResult {
						order_id: input.order_id,
						status: existing.status,
					});
				}
				existing.status = status;
				existing.updated_at = now;
				existing.version += 1;
			} else {
				t.orders.insert(
					input.order_id,
					Order::new(
						input.order_id,
						input.customer_id,
						input.courier_id,
						status,
						now,
					),
				);
			}

			if t.item_count(input.order_id) == 0 && !input.items.is_empty() {
				t.insert_items(input.order_id, &input.items)?;
			}

			Ok(AcceptResult {
				order_id: input.order_id,
				status,
			})
		})
		.await
	}

	async fn add_item(
		&self,
		order_id: Uuid,
		item: &OrderItemInput,
		now: DateTime<Utc>,
	) -> Result<OrderItem, StorageError> {
		self.transaction(|t| {
			t.order_mut(order_id)?.updated_at = now;
			let mut rows = t.insert_items(order_id, std::slice::from_ref(item))?;
			rows.pop()
				.ok_or_else(|| StorageError::Backend("item row was not written".into()))
		})
		.await
	}

	async fn remove_item(
		&self,
		order_id: Uuid,
		restaurant_item_id: Uuid,
		now: DateTime<Utc>,
	) -> Result<u64, StorageError> {
		self.transaction(|t| {
			t.order_mut(order_id)?;
			let before = t.items.len();
			t.items
				.retain(|i| !(i.order_id == order_id && i.restaurant_item_id == restaurant_item_id));
			let removed = (before - t.items.len()) as u64;
			if removed == 0 {
				return Err(StorageError::ItemNotFound {
					order_id,
					restaurant_item_id,
				});
			}
			t.order_mut(order_id)?.updated_at = now;
			Ok(removed)
		})
		.await
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(MemoryOrderStorageSchema)
	}
}

/// Configuration schema for MemoryOrderStorage.
pub struct MemoryOrderStorageSchema;

impl ConfigSchema for MemoryOrderStorageSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		// Memory storage has no settings
		Schema::new(vec![], vec![]).validate(config)
	}
}

/// Factory function to create a memory order storage backend from configuration.
pub fn create_storage(
	config: &toml::Value,
) -> Result<Box<dyn OrderStorageInterface>, StorageError> {
	MemoryOrderStorageSchema
		.validate(config)
		.map_err(|e| StorageError::Configuration(e.to_string()))?;
	Ok(Box::new(MemoryOrderStorage::new()))
}

/// Registry for the memory order storage implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "memory";
	type Factory = OrderStorageFactory;

	fn factory() -> Self::Factory {
		create_storage
	}
}

impl OrderStorageRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::Duration;

	fn item(price: i64, quantity: i32) -> OrderItemInput {
		OrderItemInput {
			restaurant_item_id: Uuid::new_v4(),
			price: Decimal::from(price),
			quantity,
		}
	}

	fn header(status: OrderStatus) -> Order {
		Order::new(
			Uuid::new_v4(),
			Uuid::new_v4(),
			Uuid::new_v4(),
			status,
			Utc::now(),
		)
	}

	fn accept_input(order_id: Uuid, items: Vec<OrderItemInput>) -> AcceptInput {
		AcceptInput {
			order_id,
			customer_id: Uuid::new_v4(),
			courier_id: Uuid::new_v4(),
			items,
			status: None,
		}
	}

	#[tokio::test]
	async fn test_insert_with_items_and_total() {
		let storage = MemoryOrderStorage::new();
		let order = header(OrderStatus::Created);

		let rows = storage
			.insert_order_with_items(&order, &[item(10, 2), item(5, 1)])
			.await
			.unwrap();
		assert_eq!(rows.len(), 2);
		assert!(rows.iter().all(|r| r.order_id == order.id));
		assert_ne!(rows[0].id, rows[1].id);

		assert_eq!(storage.list_items(order.id).await.unwrap().len(), 2);
		assert_eq!(
			storage.order_total(order.id).await.unwrap(),
			Decimal::from(25)
		);
		assert_eq!(
			storage.get_status(order.id).await.unwrap(),
			OrderStatus::Created
		);
	}

	#[tokio::test]
	async fn test_total_without_items_is_zero() {
		let storage = MemoryOrderStorage::new();
		let order = header(OrderStatus::Created);
		storage.insert_order(&order).await.unwrap();

		assert_eq!(storage.order_total(order.id).await.unwrap(), Decimal::ZERO);
	}

	#[tokio::test]
	async fn test_failed_item_rolls_back_header() {
		let storage = MemoryOrderStorage::new();
		let order = header(OrderStatus::Created);

		let result = storage
			.insert_order_with_items(&order, &[item(10, 1), item(3, 0)])
			.await;
		assert!(matches!(result, Err(StorageError::Constraint(_))));

		assert!(matches!(
			storage.get_order(order.id).await,
			Err(StorageError::OrderNotFound(_))
		));
		assert!(storage.tables.read().await.items.is_empty());
	}

	#[tokio::test]
	async fn test_list_orders_newest_first_with_filters() {
		let storage = MemoryOrderStorage::new();
		let customer = Uuid::new_v4();
		let base = Utc::now();

		for offset in 0..3 {
			let mut order = header(OrderStatus::Created);
			order.customer_id = customer;
			order.created_at = base + Duration::seconds(offset);
			storage.insert_order(&order).await.unwrap();
		}
		let mut other = header(OrderStatus::Paid);
		other.created_at = base + Duration::seconds(10);
		storage.insert_order(&other).await.unwrap();

		let all = storage.list_orders(&OrderFilter::default()).await.unwrap();
		assert_eq!(all.len(), 4);
		assert_eq!(all[0].id, other.id);

		let mine = storage
			.list_orders(&OrderFilter {
				customer_id: Some(customer),
				..Default::default()
			})
			.await
			.unwrap();
		assert_eq!(mine.len(), 3);
		assert!(mine.windows(2).all(|w| w[0].created_at >= w[1].created_at));

		let paid = storage
			.list_orders(&OrderFilter {
				status: Some(OrderStatus::Paid),
				..Default::default()
			})
			.await
			.unwrap();
		assert_eq!(paid.len(), 1);
	}

	#[tokio::test]
	async fn test_update_status_missing_order() {
		let storage = MemoryOrderStorage::new();
		let result = storage
			.update_status(Uuid::new_v4(), OrderStatus::Paid, Utc::now())
			.await;
		assert!(matches!(result, Err(StorageError::OrderNotFound(_))));
	}

	#[tokio::test]
	async fn test_compare_and_set_rejects_stale_version() {
		let storage = MemoryOrderStorage::new();
		let order = header(OrderStatus::Created);
		storage.insert_order(&order).await.unwrap();

		let updated = storage
			.compare_and_set_status(order.id, 0, OrderStatus::Paid, Utc::now())
			.await
			.unwrap();
		assert_eq!(updated.version, 1);

		let stale = storage
			.compare_and_set_status(order.id, 0, OrderStatus::Cancelled, Utc::now())
			.await;
		assert!(matches!(stale, Err(StorageError::Conflict(_))));
		assert_eq!(
			storage.get_status(order.id).await.unwrap(),
			OrderStatus::Paid
		);
	}

	#[tokio::test]
	async fn test_accept_creates_unknown_order_with_items() {
		let storage = MemoryOrderStorage::new();
		let input = accept_input(Uuid::new_v4(), vec![item(4, 2)]);

		let result = storage
			.accept_order(&input, OrderStatus::KitchenAccepted, Utc::now())
			.await
			.unwrap();
		assert_eq!(result.status, OrderStatus::KitchenAccepted);

		let order = storage.get_order(input.order_id).await.unwrap();
		assert_eq!(order.customer_id, input.customer_id);
		assert_eq!(storage.list_items(input.order_id).await.unwrap().len(), 1);
	}

	#[tokio::test]
	async fn test_accept_is_idempotent_after_decision() {
		let storage = MemoryOrderStorage::new();
		let order = header(OrderStatus::Paid);
		storage
			.insert_order_with_items(&order, &[item(10, 1)])
			.await
			.unwrap();

		let mut input = accept_input(order.id, vec![]);
		let first = storage
			.accept_order(&input, OrderStatus::KitchenAccepted, Utc::now())
			.await
			.unwrap();
		assert_eq!(first.status, OrderStatus::KitchenAccepted);
		let version = storage.get_order(order.id).await.unwrap().version;

		input.items = vec![item(99, 5)];
		let second = storage
			.accept_order(&input, OrderStatus::KitchenDenied, Utc::now())
			.await
			.unwrap();
		assert_eq!(second.status, OrderStatus::KitchenAccepted);

		let after = storage.get_order(order.id).await.unwrap();
		assert_eq!(after.version, version);
		let items = storage.list_items(order.id).await.unwrap();
		assert_eq!(items.len(), 1);
		assert_eq!(items[0].price, Decimal::from(10));
	}

	#[tokio::test]
	async fn test_accept_does_not_duplicate_existing_items() {
		let storage = MemoryOrderStorage::new();
		let order = header(OrderStatus::Paid);
		storage
			.insert_order_with_items(&order, &[item(7, 1)])
			.await
			.unwrap();

		let input = accept_input(order.id, vec![item(1, 1), item(2, 2)]);
		storage
			.accept_order(&input, OrderStatus::KitchenAccepted, Utc::now())
			.await
			.unwrap();

		assert_eq!(storage.list_items(order.id).await.unwrap().len(), 1);
	}

	#[tokio::test]
	async fn test_add_item_touches_updated_at() {
		let storage = MemoryOrderStorage::new();
		let order = header(OrderStatus::Created);
		storage.insert_order(&order).await.unwrap();

		let later = order.updated_at + Duration::seconds(30);
		let row = storage
			.add_item(order.id, &item(3, 3), later)
			.await
			.unwrap();
		assert_eq!(row.order_id, order.id);
		assert_eq!(storage.get_order(order.id).await.unwrap().updated_at, later);
		assert_eq!(storage.order_total(order.id).await.unwrap(), Decimal::from(9));
	}

	#[tokio::test]
	async fn test_add_item_to_missing_order() {
		let storage = MemoryOrderStorage::new();
		let result = storage
			.add_item(Uuid::new_v4(), &item(3, 3), Utc::now())
			.await;
		assert!(matches!(result, Err(StorageError::OrderNotFound(_))));
		assert!(storage.tables.read().await.items.is_empty());
	}

	#[tokio::test]
	async fn test_remove_item() {
		let storage = MemoryOrderStorage::new();
		let order = header(OrderStatus::Created);
		let line = item(3, 1);
		storage
			.insert_order_with_items(&order, &[line.clone(), item(4, 1)])
			.await
			.unwrap();

		let later = order.updated_at + Duration::seconds(5);
		let removed = storage
			.remove_item(order.id, line.restaurant_item_id, later)
			.await
			.unwrap();
		assert_eq!(removed, 1);
		assert_eq!(storage.list_items(order.id).await.unwrap().len(), 1);
		assert_eq!(storage.get_order(order.id).await.unwrap().updated_at, later);
	}

	#[tokio::test]
	async fn test_remove_missing_item_leaves_updated_at() {
		let storage = MemoryOrderStorage::new();
		let order = header(OrderStatus::Created);
		storage
			.insert_order_with_items(&order, &[item(3, 1)])
			.await
			.unwrap();

		let result = storage
			.remove_item(
				order.id,
				Uuid::new_v4(),
				order.updated_at + Duration::seconds(5),
			)
			.await;
		assert!(matches!(result, Err(StorageError::ItemNotFound { .. })));
		assert_eq!(
			storage.get_order(order.id).await.unwrap().updated_at,
			order.updated_at
		);
	}

	#[test]
	fn test_factory_rejects_non_table() {
		let result = create_storage(&toml::Value::String("nope".into()));
		assert!(matches!(result, Err(StorageError::Configuration(_))));
	}
}
