//! Restaurant menu lookups and item price snapshots.
//!
//! When a customer orders catalog items, each requested item is checked
//! against the restaurant's current menu and its price is copied into the
//! order. Later menu price changes never alter an existing order.

use async_trait::async_trait;
use order_types::{ConfigSchema, ImplementationRegistry, ItemRequest, MenuItem, OrderItemInput};
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

/// Re-export implementations
pub mod implementations {
	pub mod http;
	pub mod memory;
}

/// Errors that can occur during catalog operations.
#[derive(Debug, Error)]
pub enum CatalogError {
	/// The request at `index` asked for zero or fewer units.
	#[error("Invalid quantity for item at index {index}")]
	InvalidQuantity { index: usize },
	/// The item is not on the menu or not enough units are available.
	#[error("Item not available: {0}")]
	ItemUnavailable(Uuid),
	/// The catalog service answered with an error status.
	#[error("Catalog service error: {0}")]
	Service(String),
	#[error("Transport error: {0}")]
	Transport(String),
	/// Error that occurs during configuration validation.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Trait defining the interface for catalog backends.
#[async_trait]
pub trait CatalogInterface: Send + Sync {
	/// Returns the configuration schema for validation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Returns the full menu of a restaurant.
	async fn menu(&self, restaurant_id: Uuid) -> Result<Vec<MenuItem>, CatalogError>;
}

/// Type alias for catalog factory functions.
pub type CatalogFactory = fn(&toml::Value) -> Result<Box<dyn CatalogInterface>, CatalogError>;

/// Registry trait for catalog implementations.
pub trait CatalogRegistry: ImplementationRegistry<Factory = CatalogFactory> {}

/// Get all registered catalog implementations.
pub fn get_all_implementations() -> Vec<(&'static str, CatalogFactory)> {
	use implementations::{http, memory};

	vec![
		(http::Registry::NAME, http::Registry::factory()),
		(memory::Registry::NAME, memory::Registry::factory()),
	]
}

/// Service that turns item requests into priced order item inputs.
pub struct CatalogService {
	implementation: Box<dyn CatalogInterface>,
}

impl CatalogService {
	pub fn new(implementation: Box<dyn CatalogInterface>) -> Self {
		Self { implementation }
	}

	/// Validates `requests` against the restaurant's menu and snapshots prices.
	///
	/// Requests are checked in order and the first failure is returned.
	pub async fn snapshot_items(
		&self,
		restaurant_id: Uuid,
		requests: &[ItemRequest],
	) -> Result<Vec<OrderItemInput>, CatalogError> {
		let menu: HashMap<Uuid, MenuItem> = self
			.implementation
			.menu(restaurant_id)
			.await?
			.into_iter()
			.map(|item| (item.id, item))
			.collect();

		tracing::debug!(
			restaurant_id = %restaurant_id,
			menu_items = menu.len(),
			requested = requests.len(),
			"Snapshotting catalog items"
		);

		requests
			.iter()
			.enumerate()
			.map(|(index, request)| {
				if request.quantity <= 0 {
					return Err(CatalogError::InvalidQuantity { index });
				}
				match menu.get(&request.restaurant_item_id) {
					Some(item) if item.quantity > 0 && request.quantity <= item.quantity => {
						Ok(OrderItemInput {
							restaurant_item_id: item.id,
							price: item.price,
							quantity: request.quantity,
						})
					},
					_ => Err(CatalogError::ItemUnavailable(request.restaurant_item_id)),
				}
			})
			.collect()
	}
}
