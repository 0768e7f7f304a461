//! Builder wiring an [`OrderEngine`] from configuration.
//!
//! Every configured implementation is constructed through its factory, so
//! a bad sub-table fails startup even when it is not the primary one. The
//! primary of each section is then kept and the rest dropped.

use order_catalog::{CatalogError, CatalogInterface, CatalogService};
use order_config::{BackendConfig, Config};
use order_directory::{DirectoryError, DirectoryInterface, DirectoryService};
use order_storage::{OrderStorageInterface, OrderStorageService, StorageError};
use order_wallet::{WalletError, WalletInterface, WalletService};
use std::collections::HashMap;
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::engine::OrderEngine;
use crate::handlers::PaymentHandler;
use crate::state::OrderStateMachine;
use crate::store::OrderStore;

/// Errors that can occur during engine construction.
#[derive(Debug, Error)]
pub enum BuilderError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Missing required component: {0}")]
	MissingComponent(String),
}

/// Factory functions for each pluggable component, keyed by implementation name.
pub struct OrderFactories<SF, DF, WF, CF> {
	pub storage_factories: HashMap<String, SF>,
	pub directory_factories: HashMap<String, DF>,
	pub wallet_factories: HashMap<String, WF>,
	pub catalog_factories: HashMap<String, CF>,
}

/// Builder for constructing an [`OrderEngine`].
pub struct OrderBuilder {
	config: Config,
}

/// Builds every implementation of `section` that has a factory and returns the primary.
fn build_primary<T, E, F>(
	component: &str,
	section: &BackendConfig,
	factories: &HashMap<String, F>,
) -> Result<T, BuilderError>
where
	E: Display,
	F: Fn(&toml::Value) -> Result<T, E>,
{
	let mut built = HashMap::new();
	for (name, config) in &section.implementations {
		let Some(factory) = factories.get(name) else {
			tracing::warn!(component, implementation = %name, "No factory registered, skipping");
			continue;
		};
		match factory(config) {
			Ok(implementation) => {
				let is_primary = &section.primary == name;
				tracing::info!(component, implementation = %name, enabled = %is_primary, "Loaded");
				built.insert(name.clone(), implementation);
			},
			Err(e) => {
				tracing::error!(
					component,
					implementation = %name,
					error = %e,
					"Failed to create implementation"
				);
				return Err(BuilderError::Config(format!(
					"Failed to create {} implementation '{}': {}",
					component, name, e
				)));
			},
		}
	}

	built.remove(&section.primary).ok_or_else(|| {
		BuilderError::MissingComponent(format!(
			"Primary {} '{}' failed to load or has no registered factory",
			component, section.primary
		))
	})
}

impl OrderBuilder {
	pub fn new(config: Config) -> Self {
		Self { config }
	}

	/// Builds the engine using the given factories.
	pub fn build<SF, DF, WF, CF>(
		self,
		factories: OrderFactories<SF, DF, WF, CF>,
	) -> Result<OrderEngine, BuilderError>
	where
		SF: Fn(&toml::Value) -> Result<Box<dyn OrderStorageInterface>, StorageError>,
		DF: Fn(&toml::Value) -> Result<Box<dyn DirectoryInterface>, DirectoryError>,
		WF: Fn(&toml::Value) -> Result<Box<dyn WalletInterface>, WalletError>,
		CF: Fn(&toml::Value) -> Result<Box<dyn CatalogInterface>, CatalogError>,
	{
		let storage_backend =
			build_primary("orders", &self.config.orders, &factories.storage_factories)?;
		let storage = Arc::new(OrderStorageService::new(storage_backend));

		let customers =
			build_primary("customers", &self.config.customers, &factories.directory_factories)?;
		let couriers =
			build_primary("couriers", &self.config.couriers, &factories.directory_factories)?;
		let directory = Arc::new(DirectoryService::new(customers, couriers));

		let wallet = match &self.config.wallet {
			Some(wallet_config) => {
				let backend =
					build_primary("wallet", &wallet_config.backend, &factories.wallet_factories)?;
				Some(Arc::new(WalletService::new(
					backend,
					Duration::from_secs(wallet_config.timeout_seconds),
				)))
			},
			None => {
				tracing::warn!("No wallet configured - orders cannot be paid");
				None
			},
		};

		let catalog = match &self.config.catalog {
			Some(catalog_config) => {
				let backend =
					build_primary("catalog", catalog_config, &factories.catalog_factories)?;
				Some(Arc::new(CatalogService::new(backend)))
			},
			None => {
				tracing::warn!("No catalog configured - orders must carry priced items");
				None
			},
		};

		let store = Arc::new(OrderStore::new(storage.clone(), directory));
		let state_machine = Arc::new(OrderStateMachine::new(storage.clone()));
		let payment_handler = Arc::new(PaymentHandler::new(
			store.clone(),
			state_machine.clone(),
			wallet,
		));

		Ok(OrderEngine::new(
			self.config,
			storage,
			store,
			payment_handler,
			state_machine,
			catalog,
		))
	}
}
