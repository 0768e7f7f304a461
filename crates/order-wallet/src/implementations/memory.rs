//! In-memory wallet backend with configurable balances.

use crate::{WalletError, WalletFactory, WalletInterface, WalletRegistry};
use async_trait::async_trait;
use order_types::{
	ConfigSchema, Field, FieldType, ImplementationRegistry, Schema, ValidationError,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Wallets keyed by address. Unknown addresses start at `default_balance`.
pub struct MemoryWallet {
	default_balance: Decimal,
	balances: Arc<Mutex<HashMap<String, Decimal>>>,
}

impl MemoryWallet {
	pub fn new(default_balance: Decimal) -> Self {
		Self {
			default_balance,
			balances: Arc::new(Mutex::new(HashMap::new())),
		}
	}

	/// Sets the balance of one wallet.
	pub async fn set_balance(&self, address: &str, balance: Decimal) {
		self.balances.lock().await.insert(address.to_string(), balance);
	}

	/// Current balance of `address`.
	pub async fn balance(&self, address: &str) -> Decimal {
		self.balances
			.lock()
			.await
			.get(address)
			.copied()
			.unwrap_or(self.default_balance)
	}
}

#[async_trait]
impl WalletInterface for MemoryWallet {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(MemoryWalletSchema)
	}

	async fn debit(&self, address: &str, amount: Decimal) -> Result<bool, WalletError> {
		let mut balances = self.balances.lock().await;
		let balance = balances
			.entry(address.to_string())
			.or_insert(self.default_balance);
		if amount < Decimal::ZERO || *balance < amount {
			return Ok(false);
		}
		*balance -= amount;
		Ok(true)
	}
}

#[derive(Debug, Deserialize)]
struct MemoryWalletConfig {
	#[serde(default)]
	default_balance: Decimal,
	#[serde(default)]
	balances: Vec<BalanceConfig>,
}

#[derive(Debug, Deserialize)]
struct BalanceConfig {
	address: String,
	amount: Decimal,
}

/// Configuration schema for MemoryWallet.
pub struct MemoryWalletSchema;

impl ConfigSchema for MemoryWalletSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let balance = Schema::new(
			vec![
				Field::new("address", FieldType::String),
				Field::new("amount", FieldType::Number),
			],
			vec![],
		);
		Schema::new(
			vec![],
			vec![
				Field::new("default_balance", FieldType::Number),
				Field::new("balances", FieldType::Array(Box::new(FieldType::Table(balance)))),
			],
		)
		.validate(config)
	}
}

/// Factory function to create a memory wallet from configuration.
///
/// Configuration parameters:
/// - `default_balance`: starting balance of unknown wallets (default 0)
/// - `balances`: array of `{ address, amount }` tables (optional)
pub fn create_wallet(config: &toml::Value) -> Result<Box<dyn WalletInterface>, WalletError> {
	MemoryWalletSchema
		.validate(config)
		.map_err(|e| WalletError::Configuration(e.to_string()))?;
	let settings: MemoryWalletConfig = config
		.clone()
		.try_into()
		.map_err(|e| WalletError::Configuration(format!("Invalid memory wallet config: {}", e)))?;

	let balances = settings
		.balances
		.into_iter()
		.map(|b| (b.address, b.amount))
		.collect();
	Ok(Box::new(MemoryWallet {
		default_balance: settings.default_balance,
		balances: Arc::new(Mutex::new(balances)),
	}))
}

/// Registry for the memory wallet implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "memory";
	type Factory = WalletFactory;

	fn factory() -> Self::Factory {
		create_wallet
	}
}

impl WalletRegistry for Registry {}
