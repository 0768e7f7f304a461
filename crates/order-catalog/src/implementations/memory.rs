//! In-memory catalog seeded from configuration.

use crate::{CatalogError, CatalogFactory, CatalogInterface, CatalogRegistry};
use async_trait::async_trait;
use order_types::{
	ConfigSchema, Field, FieldType, ImplementationRegistry, MenuItem, Schema, ValidationError,
};
use serde::Deserialize;
use uuid::Uuid;

/// Fixed menu shared by all restaurants in the configuration.
pub struct MemoryCatalog {
	items: Vec<MenuItem>,
}

impl MemoryCatalog {
	pub fn new(items: Vec<MenuItem>) -> Self {
		Self { items }
	}
}

#[async_trait]
impl CatalogInterface for MemoryCatalog {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(MemoryCatalogSchema)
	}

	async fn menu(&self, restaurant_id: Uuid) -> Result<Vec<MenuItem>, CatalogError> {
		Ok(self
			.items
			.iter()
			.filter(|item| item.restaurant_id == restaurant_id)
			.cloned()
			.collect())
	}
}

#[derive(Debug, Deserialize)]
struct MemoryCatalogConfig {
	#[serde(default)]
	items: Vec<MenuItem>,
}

/// Configuration schema for MemoryCatalog.
pub struct MemoryCatalogSchema;

impl ConfigSchema for MemoryCatalogSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let item = Schema::new(
			vec![
				Field::new("id", FieldType::String),
				Field::new("restaurant_id", FieldType::String),
				Field::new("name", FieldType::String),
				Field::new("price", FieldType::Number),
			],
			vec![
				Field::new(
					"quantity",
					FieldType::Integer {
						min: Some(0),
						max: None,
					},
				),
				Field::new("description", FieldType::String),
			],
		);
		Schema::new(
			vec![],
			vec![Field::new("items", FieldType::Array(Box::new(FieldType::Table(item))))],
		)
		.validate(config)
	}
}

/// Factory function to create a memory catalog from configuration.
///
/// Configuration parameters:
/// - `items`: array of `{ id, restaurant_id, name, price, quantity?, description? }`
pub fn create_catalog(config: &toml::Value) -> Result<Box<dyn CatalogInterface>, CatalogError> {
	MemoryCatalogSchema
		.validate(config)
		.map_err(|e| CatalogError::Configuration(e.to_string()))?;
	let settings: MemoryCatalogConfig = config
		.clone()
		.try_into()
		.map_err(|e| CatalogError::Configuration(format!("Invalid memory catalog config: {}", e)))?;

	Ok(Box::new(MemoryCatalog::new(settings.items)))
}

/// Registry for the memory catalog implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "memory";
	type Factory = CatalogFactory;

	fn factory() -> Self::Factory {
		create_catalog
	}
}

impl CatalogRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;
	use rust_decimal::Decimal;

	#[tokio::test]
	async fn test_menu_is_filtered_by_restaurant() {
		let restaurant = Uuid::new_v4();
		let other = Uuid::new_v4();
		let config: toml::Value = toml::from_str(&format!(
			r#"
			items = [
				{{ id = "{}", restaurant_id = "{}", name = "Ramen", price = 12.5, quantity = 4 }},
				{{ id = "{}", restaurant_id = "{}", name = "Tacos", price = 3 }},
			]
			"#,
			Uuid::new_v4(),
			restaurant,
			Uuid::new_v4(),
			other
		))
		.unwrap();
		let catalog = create_catalog(&config).unwrap();

		let menu = catalog.menu(restaurant).await.unwrap();
		assert_eq!(menu.len(), 1);
		assert_eq!(menu[0].name, "Ramen");
		assert_eq!(menu[0].price, Decimal::new(125, 1));
		assert_eq!(menu[0].quantity, 4);
		assert!(catalog.menu(Uuid::new_v4()).await.unwrap().is_empty());
	}

	#[test]
	fn test_schema_requires_price() {
		let config: toml::Value = toml::from_str(&format!(
			"items = [{{ id = \"{}\", restaurant_id = \"{}\", name = \"Soup\" }}]",
			Uuid::new_v4(),
			Uuid::new_v4()
		))
		.unwrap();
		assert!(matches!(
			create_catalog(&config),
			Err(CatalogError::Configuration(_))
		));
	}
}
