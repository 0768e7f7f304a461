//! Catalog backend that reads menus from the restaurant service.

use crate::{CatalogError, CatalogFactory, CatalogInterface, CatalogRegistry};
use async_trait::async_trait;
use order_types::{
	validators, ConfigSchema, Field, FieldType, ImplementationRegistry, MenuItem, Schema,
	ValidationError,
};
use serde::Deserialize;
use std::time::Duration;
use uuid::Uuid;

/// HTTP client for `GET {base_url}/menu?restaurant_id=...`.
pub struct HttpCatalog {
	client: reqwest::Client,
	menu_url: String,
}

impl HttpCatalog {
	pub fn new(client: reqwest::Client, base_url: &str) -> Self {
		Self {
			client,
			menu_url: format!("{}/menu", base_url.trim_end_matches('/')),
		}
	}
}

#[async_trait]
impl CatalogInterface for HttpCatalog {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(HttpCatalogSchema)
	}

	async fn menu(&self, restaurant_id: Uuid) -> Result<Vec<MenuItem>, CatalogError> {
		let response = self
			.client
			.get(&self.menu_url)
			.query(&[("restaurant_id", restaurant_id.to_string())])
			.send()
			.await
			.map_err(|e| CatalogError::Transport(e.to_string()))?;

		if !response.status().is_success() {
			return Err(CatalogError::Service(format!(
				"menu request returned {}",
				response.status()
			)));
		}

		response
			.json()
			.await
			.map_err(|e| CatalogError::Service(format!("invalid menu response: {}", e)))
	}
}

#[derive(Debug, Deserialize)]
struct HttpCatalogConfig {
	base_url: String,
	#[serde(default = "default_timeout_seconds")]
	timeout_seconds: u64,
}

fn default_timeout_seconds() -> u64 {
	10
}

/// Configuration schema for HttpCatalog.
pub struct HttpCatalogSchema;

impl ConfigSchema for HttpCatalogSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![Field::new("base_url", FieldType::String).with_validator(validators::http_url)],
			vec![Field::new(
				"timeout_seconds",
				FieldType::Integer {
					min: Some(1),
					max: Some(300),
				},
			)],
		);
		schema.validate(config)
	}
}

/// Factory function to create an HTTP catalog from configuration.
///
/// Configuration parameters:
/// - `base_url`: restaurant service root URL (required)
/// - `timeout_seconds`: per-request timeout (default 10)
pub fn create_catalog(config: &toml::Value) -> Result<Box<dyn CatalogInterface>, CatalogError> {
	HttpCatalogSchema
		.validate(config)
		.map_err(|e| CatalogError::Configuration(e.to_string()))?;
	let settings: HttpCatalogConfig = config
		.clone()
		.try_into()
		.map_err(|e| CatalogError::Configuration(format!("Invalid http catalog config: {}", e)))?;

	let client = reqwest::Client::builder()
		.timeout(Duration::from_secs(settings.timeout_seconds))
		.build()
		.map_err(|e| CatalogError::Configuration(e.to_string()))?;
	Ok(Box::new(HttpCatalog::new(client, &settings.base_url)))
}

/// Registry for the HTTP catalog implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "http";
	type Factory = CatalogFactory;

	fn factory() -> Self::Factory {
		create_catalog
	}
}

impl CatalogRegistry for Registry {}
