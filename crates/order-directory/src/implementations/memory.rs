//! In-memory directory backend, seeded from configuration.

use crate::{DirectoryError, DirectoryFactory, DirectoryInterface, DirectoryRegistry};
use async_trait::async_trait;
use order_types::{
	ConfigSchema, Field, FieldType, ImplementationRegistry, Schema, ValidationError,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// In-memory directory of records keyed by id.
///
/// Clones share the same records.
#[derive(Clone)]
pub struct MemoryDirectory {
	/// Record id to optional wallet address.
	records: Arc<RwLock<HashMap<Uuid, Option<String>>>>,
}

impl MemoryDirectory {
	/// Creates an empty directory.
	pub fn new() -> Self {
		Self {
			records: Arc::new(RwLock::new(HashMap::new())),
		}
	}

	/// Adds or replaces a record.
	pub async fn insert(&self, id: Uuid, wallet_address: Option<String>) {
		self.records.write().await.insert(id, wallet_address);
	}

	/// Removes a record, returning true if it was present.
	pub async fn remove(&self, id: Uuid) -> bool {
		self.records.write().await.remove(&id).is_some()
	}
}

impl Default for MemoryDirectory {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl DirectoryInterface for MemoryDirectory {
	async fn exists(&self, id: Uuid) -> Result<bool, DirectoryError> {
		Ok(self.records.read().await.contains_key(&id))
	}

	async fn wallet_address(&self, id: Uuid) -> Result<Option<String>, DirectoryError> {
		Ok(self
			.records
			.read()
			.await
			.get(&id)
			.map(|wallet| wallet.clone().unwrap_or_default()))
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(MemoryDirectorySchema)
	}
}

#[derive(Debug, Deserialize)]
struct MemoryDirectoryConfig {
	#[serde(default)]
	entries: Vec<EntryConfig>,
}

#[derive(Debug, Deserialize)]
struct EntryConfig {
	id: Uuid,
	#[serde(default)]
	wallet_address: Option<String>,
}

/// Configuration schema for MemoryDirectory.
pub struct MemoryDirectorySchema;

impl ConfigSchema for MemoryDirectorySchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let entry = Schema::new(
			vec![Field::new("id", FieldType::String).with_validator(|v| {
				v.as_str()
					.unwrap_or_default()
					.parse::<Uuid>()
					.map(|_| ())
					.map_err(|e| e.to_string())
			})],
			vec![Field::new("wallet_address", FieldType::String)],
		);
		Schema::new(
			vec![],
			vec![Field::new(
				"entries",
				FieldType::Array(Box::new(FieldType::Table(entry))),
			)],
		)
		.validate(config)
	}
}

/// Factory function to create a memory directory from configuration.
///
/// Configuration parameters:
/// - `entries`: array of `{ id, wallet_address? }` tables (optional)
pub fn create_directory(
	config: &toml::Value,
) -> Result<Box<dyn DirectoryInterface>, DirectoryError> {
	MemoryDirectorySchema
		.validate(config)
		.map_err(|e| DirectoryError::Configuration(e.to_string()))?;
	let settings: MemoryDirectoryConfig = config
		.clone()
		.try_into()
		.map_err(|e| DirectoryError::Configuration(format!("Invalid memory directory config: {}", e)))?;

	let records = settings
		.entries
		.into_iter()
		.map(|entry| (entry.id, entry.wallet_address))
		.collect();
	Ok(Box::new(MemoryDirectory {
		records: Arc::new(RwLock::new(records)),
	}))
}

/// Registry for the memory directory implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "memory";
	type Factory = DirectoryFactory;

	fn factory() -> Self::Factory {
		create_directory
	}
}

impl DirectoryRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn test_factory_seeds_entries() {
		let id = Uuid::new_v4();
		let config: toml::Value = toml::from_str(&format!(
			"entries = [{{ id = \"{}\", wallet_address = \"0xabc\" }}, {{ id = \"{}\" }}]",
			id,
			Uuid::nil()
		))
		.unwrap();
		let directory = create_directory(&config).unwrap();

		assert!(directory.exists(id).await.unwrap());
		assert_eq!(
			directory.wallet_address(id).await.unwrap(),
			Some("0xabc".to_string())
		);
		assert_eq!(
			directory.wallet_address(Uuid::nil()).await.unwrap(),
			Some(String::new())
		);
		assert_eq!(directory.wallet_address(Uuid::new_v4()).await.unwrap(), None);
	}

	#[test]
	fn test_factory_rejects_bad_id() {
		let config: toml::Value = toml::from_str("entries = [{ id = \"not-a-uuid\" }]").unwrap();
		assert!(matches!(
			create_directory(&config),
			Err(DirectoryError::Configuration(_))
		));
	}

	#[tokio::test]
	async fn test_remove() {
		let directory = MemoryDirectory::new();
		let id = Uuid::new_v4();
		directory.insert(id, None).await;
		assert!(directory.remove(id).await);
		assert!(!directory.exists(id).await.unwrap());
		assert!(!directory.remove(id).await);
	}
}
