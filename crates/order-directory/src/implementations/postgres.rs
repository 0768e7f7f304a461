//! PostgreSQL directory backend.
//!
//! Points at one table (customers or couriers) in its own database. Table
//! and column names come from configuration and are interpolated into SQL,
//! so the schema only admits plain identifiers.

use crate::{DirectoryError, DirectoryFactory, DirectoryInterface, DirectoryRegistry};
use async_trait::async_trait;
use order_types::{
	validators, ConfigSchema, Field, FieldType, ImplementationRegistry, Schema, ValidationError,
};
use serde::Deserialize;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use uuid::Uuid;

/// Directory backed by a PostgreSQL table.
pub struct PostgresDirectory {
	pool: PgPool,
	exists_sql: String,
	wallet_sql: String,
}

impl PostgresDirectory {
	/// Creates a directory over `table`, keyed by `id_column`.
	pub fn new(pool: PgPool, table: &str, id_column: &str, wallet_column: &str) -> Self {
		Self {
			pool,
			exists_sql: format!("SELECT 1 FROM {} WHERE {} = $1", table, id_column),
			wallet_sql: format!(
				"SELECT {} FROM {} WHERE {} = $1",
				wallet_column, table, id_column
			),
		}
	}
}

#[async_trait]
impl DirectoryInterface for PostgresDirectory {
	async fn exists(&self, id: Uuid) -> Result<bool, DirectoryError> {
		let row: Option<(i32,)> = sqlx::query_as(&self.exists_sql)
			.bind(id)
			.fetch_optional(&self.pool)
			.await
			.map_err(|e| DirectoryError::Backend(e.to_string()))?;
		Ok(row.is_some())
	}

	async fn wallet_address(&self, id: Uuid) -> Result<Option<String>, DirectoryError> {
		let row: Option<(Option<String>,)> = sqlx::query_as(&self.wallet_sql)
			.bind(id)
			.fetch_optional(&self.pool)
			.await
			.map_err(|e| DirectoryError::Backend(e.to_string()))?;
		Ok(row.map(|(wallet,)| wallet.unwrap_or_default()))
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(PostgresDirectorySchema)
	}
}

#[derive(Debug, Deserialize)]
struct PostgresDirectoryConfig {
	url: String,
	table: String,
	#[serde(default = "default_id_column")]
	id_column: String,
	#[serde(default = "default_wallet_column")]
	wallet_column: String,
	#[serde(default = "default_max_connections")]
	max_connections: u32,
}

fn default_id_column() -> String {
	"id".to_string()
}

fn default_wallet_column() -> String {
	"wallet_address".to_string()
}

fn default_max_connections() -> u32 {
	5
}

/// Configuration schema for PostgresDirectory.
pub struct PostgresDirectorySchema;

impl ConfigSchema for PostgresDirectorySchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![
				Field::new("url", FieldType::String).with_validator(validators::postgres_url),
				Field::new("table", FieldType::String).with_validator(validators::sql_identifier),
			],
			vec![
				Field::new("id_column", FieldType::String)
					.with_validator(validators::sql_identifier),
				Field::new("wallet_column", FieldType::String)
					.with_validator(validators::sql_identifier),
				Field::new(
					"max_connections",
					FieldType::Integer {
						min: Some(1),
						max: Some(100),
					},
				),
			],
		);
		schema.validate(config)
	}
}

/// Factory function to create a PostgreSQL directory from configuration.
///
/// Configuration parameters:
/// - `url`: connection string (required)
/// - `table`: table holding the records (required)
/// - `id_column`: key column (default "id")
/// - `wallet_column`: wallet address column (default "wallet_address")
/// - `max_connections`: pool size (default 5)
pub fn create_directory(
	config: &toml::Value,
) -> Result<Box<dyn DirectoryInterface>, DirectoryError> {
	PostgresDirectorySchema
		.validate(config)
		.map_err(|e| DirectoryError::Configuration(e.to_string()))?;
	let settings: PostgresDirectoryConfig = config.clone().try_into().map_err(|e| {
		DirectoryError::Configuration(format!("Invalid postgres directory config: {}", e))
	})?;

	let pool = PgPoolOptions::new()
		.max_connections(settings.max_connections)
		.acquire_timeout(Duration::from_secs(5))
		.connect_lazy(&settings.url)
		.map_err(|e| DirectoryError::Configuration(e.to_string()))?;

	Ok(Box::new(PostgresDirectory::new(
		pool,
		&settings.table,
		&settings.id_column,
		&settings.wallet_column,
	)))
}

/// Registry for the PostgreSQL directory implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "postgres";
	type Factory = DirectoryFactory;

	fn factory() -> Self::Factory {
		create_directory
	}
}

impl DirectoryRegistry for Registry {}
