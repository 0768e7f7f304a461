//! Registry of every backend factory the service can build.
//!
//! Each component crate lists its implementations through
//! `get_all_implementations()`. The registry collects them once, and
//! [`build_engine_from_config`] picks the ones a configuration names.

use order_catalog::CatalogFactory;
use order_config::Config;
use order_core::{OrderBuilder, OrderEngine, OrderFactories};
use order_directory::DirectoryFactory;
use order_storage::OrderStorageFactory;
use order_wallet::WalletFactory;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Global registry for all implementation factories
pub struct FactoryRegistry {
	pub storage: HashMap<String, OrderStorageFactory>,
	pub directory: HashMap<String, DirectoryFactory>,
	pub wallet: HashMap<String, WalletFactory>,
	pub catalog: HashMap<String, CatalogFactory>,
}

impl FactoryRegistry {
	/// Create a new empty registry
	pub fn new() -> Self {
		Self {
			storage: HashMap::new(),
			directory: HashMap::new(),
			wallet: HashMap::new(),
			catalog: HashMap::new(),
		}
	}

	pub fn register_storage(&mut self, name: impl Into<String>, factory: OrderStorageFactory) {
		self.storage.insert(name.into(), factory);
	}

	pub fn register_directory(&mut self, name: impl Into<String>, factory: DirectoryFactory) {
		self.directory.insert(name.into(), factory);
	}

	pub fn register_wallet(&mut self, name: impl Into<String>, factory: WalletFactory) {
		self.wallet.insert(name.into(), factory);
	}

	pub fn register_catalog(&mut self, name: impl Into<String>, factory: CatalogFactory) {
		self.catalog.insert(name.into(), factory);
	}
}

impl Default for FactoryRegistry {
	fn default() -> Self {
		Self::new()
	}
}

static REGISTRY: OnceLock<FactoryRegistry> = OnceLock::new();

/// Initialize the global registry with all available implementations
pub fn initialize_registry() -> &'static FactoryRegistry {
	REGISTRY.get_or_init(|| {
		let mut registry = FactoryRegistry::new();

		for (name, factory) in order_storage::get_all_implementations() {
			tracing::debug!("Registering order storage implementation: {}", name);
			registry.register_storage(name, factory);
		}

		for (name, factory) in order_directory::get_all_implementations() {
			tracing::debug!("Registering directory implementation: {}", name);
			registry.register_directory(name, factory);
		}

		for (name, factory) in order_wallet::get_all_implementations() {
			tracing::debug!("Registering wallet implementation: {}", name);
			registry.register_wallet(name, factory);
		}

		for (name, factory) in order_catalog::get_all_implementations() {
			tracing::debug!("Registering catalog implementation: {}", name);
			registry.register_catalog(name, factory);
		}

		registry
	})
}

/// Macro to build factories from config implementations
macro_rules! build_factories {
	($registry:expr, $config_impls:expr, $registry_field:ident, $type_name:literal) => {{
		let mut factories = HashMap::new();
		for name in $config_impls.keys() {
			if let Some(factory) = $registry.$registry_field.get(name) {
				factories.insert(name.clone(), *factory);
			} else {
				let mut available: Vec<_> = $registry.$registry_field.keys().cloned().collect();
				available.sort();
				return Err(format!(
					"Unknown {} implementation '{}'. Available: [{}]",
					$type_name,
					name,
					available.join(", ")
				)
				.into());
			}
		}
		factories
	}};
}

/// Builds the order engine from the implementations named in `config`.
pub fn build_engine_from_config(config: Config) -> Result<OrderEngine, Box<dyn std::error::Error>> {
	let registry = initialize_registry();

	let storage_factories = build_factories!(registry, config.orders.implementations, storage, "orders");
	let mut directory_factories = build_factories!(
		registry,
		config.customers.implementations,
		directory,
		"customers"
	);
	directory_factories.extend(build_factories!(
		registry,
		config.couriers.implementations,
		directory,
		"couriers"
	));
	let wallet_factories = match &config.wallet {
		Some(wallet) => build_factories!(registry, wallet.backend.implementations, wallet, "wallet"),
		None => HashMap::new(),
	};
	let catalog_factories = match &config.catalog {
		Some(catalog) => build_factories!(registry, catalog.implementations, catalog, "catalog"),
		None => HashMap::new(),
	};

	let factories = OrderFactories {
		storage_factories,
		directory_factories,
		wallet_factories,
		catalog_factories,
	};

	Ok(OrderBuilder::new(config).build(factories)?)
}
