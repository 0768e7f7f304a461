//! Existence checks against the customer and courier stores.
//!
//! Customers and couriers live in stores that cannot take part in an order
//! store transaction. Before an order row may reference one of them, the
//! referenced id is looked up in its own store. Lookups are never cached: a
//! record removed between two calls is reported missing on the second one.

use async_trait::async_trait;
use order_types::{ConfigSchema, ImplementationRegistry};
use thiserror::Error;
use uuid::Uuid;

/// Re-export implementations
pub mod implementations {
	pub mod memory;
	pub mod postgres;
}

/// Errors that can occur during directory lookups.
#[derive(Debug, Error)]
pub enum DirectoryError {
	#[error("Customer not found: {0}")]
	CustomerNotFound(Uuid),
	#[error("Courier not found: {0}")]
	CourierNotFound(Uuid),
	/// The customer exists but has no usable wallet address.
	#[error("Wallet address is empty for customer {0}")]
	EmptyWalletAddress(Uuid),
	/// Error that occurs in the backing store.
	#[error("Backend error: {0}")]
	Backend(String),
	/// Error that occurs during configuration validation.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Trait defining the interface for a single entity store.
#[async_trait]
pub trait DirectoryInterface: Send + Sync {
	/// Returns true if a record with `id` exists.
	async fn exists(&self, id: Uuid) -> Result<bool, DirectoryError>;

	/// Returns the record's wallet address.
	///
	/// `None` means no record; a record without an address yields an empty string.
	async fn wallet_address(&self, id: Uuid) -> Result<Option<String>, DirectoryError>;

	/// Returns the configuration schema for validation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;
}

/// Type alias for directory factory functions.
pub type DirectoryFactory = fn(&toml::Value) -> Result<Box<dyn DirectoryInterface>, DirectoryError>;

/// Registry trait for directory implementations.
pub trait DirectoryRegistry: ImplementationRegistry<Factory = DirectoryFactory> {}

/// Get all registered directory implementations.
pub fn get_all_implementations() -> Vec<(&'static str, DirectoryFactory)> {
	use implementations::{memory, postgres};

	vec![
		(memory::Registry::NAME, memory::Registry::factory()),
		(postgres::Registry::NAME, postgres::Registry::factory()),
	]
}

/// Existence validator over the customer and courier stores.
pub struct DirectoryService {
	customers: Box<dyn DirectoryInterface>,
	couriers: Box<dyn DirectoryInterface>,
}

impl DirectoryService {
	/// Creates a new DirectoryService from the two entity stores.
	pub fn new(customers: Box<dyn DirectoryInterface>, couriers: Box<dyn DirectoryInterface>) -> Self {
		Self {
			customers,
			couriers,
		}
	}

	/// Fails with [`DirectoryError::CustomerNotFound`] unless the customer exists.
	pub async fn ensure_customer_exists(&self, customer_id: Uuid) -> Result<(), DirectoryError> {
		if self.customers.exists(customer_id).await? {
			Ok(())
		} else {
			tracing::debug!(customer_id = %customer_id, "Customer lookup found no record");
			Err(DirectoryError::CustomerNotFound(customer_id))
		}
	}

	/// Fails with [`DirectoryError::CourierNotFound`] unless the courier exists.
	pub async fn ensure_courier_exists(&self, courier_id: Uuid) -> Result<(), DirectoryError> {
		if self.couriers.exists(courier_id).await? {
			Ok(())
		} else {
			tracing::debug!(courier_id = %courier_id, "Courier lookup found no record");
			Err(DirectoryError::CourierNotFound(courier_id))
		}
	}

	/// Returns the customer's wallet address, rejecting blank addresses.
	pub async fn customer_wallet_address(&self, customer_id: Uuid) -> Result<String, DirectoryError> {
		let address = self
			.customers
			.wallet_address(customer_id)
			.await?
			.ok_or(DirectoryError::CustomerNotFound(customer_id))?;
		let address = address.trim();
		if address.is_empty() {
			return Err(DirectoryError::EmptyWalletAddress(customer_id));
		}
		Ok(address.to_string())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use implementations::memory::MemoryDirectory;
	use mockall::mock;

	mock! {
		Store {}

		#[async_trait]
		impl DirectoryInterface for Store {
			async fn exists(&self, id: Uuid) -> Result<bool, DirectoryError>;
			async fn wallet_address(&self, id: Uuid) -> Result<Option<String>, DirectoryError>;
			fn config_schema(&self) -> Box<dyn ConfigSchema>;
		}
	}

	#[tokio::test]
	async fn test_ensure_exists() {
		let customer = Uuid::new_v4();
		let courier = Uuid::new_v4();
		let customers = MemoryDirectory::new();
		customers.insert(customer, Some("0xabc".into())).await;
		let couriers = MemoryDirectory::new();
		couriers.insert(courier, None).await;
		let service = DirectoryService::new(Box::new(customers), Box::new(couriers));

		assert!(service.ensure_customer_exists(customer).await.is_ok());
		assert!(service.ensure_courier_exists(courier).await.is_ok());
		assert!(matches!(
			service.ensure_customer_exists(courier).await,
			Err(DirectoryError::CustomerNotFound(id)) if id == courier
		));
		assert!(matches!(
			service.ensure_courier_exists(customer).await,
			Err(DirectoryError::CourierNotFound(id)) if id == customer
		));
	}

	#[tokio::test]
	async fn test_wallet_address() {
		let with_wallet = Uuid::new_v4();
		let blank = Uuid::new_v4();
		let customers = MemoryDirectory::new();
		customers.insert(with_wallet, Some(" 0xfeed ".into())).await;
		customers.insert(blank, Some("   ".into())).await;
		let service = DirectoryService::new(Box::new(customers), Box::new(MemoryDirectory::new()));

		assert_eq!(
			service.customer_wallet_address(with_wallet).await.unwrap(),
			"0xfeed"
		);
		assert!(matches!(
			service.customer_wallet_address(blank).await,
			Err(DirectoryError::EmptyWalletAddress(_))
		));
		assert!(matches!(
			service.customer_wallet_address(Uuid::new_v4()).await,
			Err(DirectoryError::CustomerNotFound(_))
		));
	}

	#[tokio::test]
	async fn test_backend_errors_propagate() {
		let mut customers = MockStore::new();
		customers
			.expect_exists()
			.returning(|_| Err(DirectoryError::Backend("connection reset".into())));
		let service = DirectoryService::new(Box::new(customers), Box::new(MockStore::new()));

		let err = service
			.ensure_customer_exists(Uuid::new_v4())
			.await
			.unwrap_err();
		assert!(matches!(err, DirectoryError::Backend(msg) if msg == "connection reset"));
	}

	#[tokio::test]
	async fn test_every_call_queries_the_store() {
		let courier = Uuid::new_v4();
		let mut couriers = MockStore::new();
		let mut seq = mockall::Sequence::new();
		couriers
			.expect_exists()
			.times(1)
			.in_sequence(&mut seq)
			.returning(|_| Ok(true));
		couriers
			.expect_exists()
			.times(1)
			.in_sequence(&mut seq)
			.returning(|_| Ok(false));
		let service = DirectoryService::new(Box::new(MockStore::new()), Box::new(couriers));

		assert!(service.ensure_courier_exists(courier).await.is_ok());
		assert!(matches!(
			service.ensure_courier_exists(courier).await,
			Err(DirectoryError::CourierNotFound(_))
		));
	}
}
