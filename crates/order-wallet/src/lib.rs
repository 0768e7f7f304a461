//! Customer wallet debits.
//!
//! Paying for an order moves money out of the customer's wallet through an
//! external wallet service. The service answers whether the debit went
//! through; it is never retried here, because a retried debit could charge
//! the customer twice.

use async_trait::async_trait;
use order_types::{truncate_id, ConfigSchema, ImplementationRegistry};
use rust_decimal::Decimal;
use std::time::Duration;
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod http;
	pub mod memory;
}

/// Errors that can occur while talking to the wallet service.
#[derive(Debug, Error)]
pub enum WalletError {
	/// The wallet service answered with an error status.
	#[error("Wallet service error: {0}")]
	Service(String),
	/// The request never produced a response.
	#[error("Transport error: {0}")]
	Transport(String),
	#[error("Wallet call timed out after {0:?}")]
	Timeout(Duration),
	/// The response body could not be understood.
	#[error("Invalid wallet response: {0}")]
	InvalidResponse(String),
	/// Error that occurs during configuration validation.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Trait defining the interface for wallet backends.
#[async_trait]
pub trait WalletInterface: Send + Sync {
	/// Returns the configuration schema for validation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Attempts to debit `amount` from the wallet at `address`.
	///
	/// `Ok(false)` means the wallet declined the debit, typically for lack of
	/// funds. Errors mean the outcome is unknown.
	async fn debit(&self, address: &str, amount: Decimal) -> Result<bool, WalletError>;
}

/// Type alias for wallet factory functions.
pub type WalletFactory = fn(&toml::Value) -> Result<Box<dyn WalletInterface>, WalletError>;

/// Registry trait for wallet implementations.
pub trait WalletRegistry: ImplementationRegistry<Factory = WalletFactory> {}

/// Get all registered wallet implementations.
pub fn get_all_implementations() -> Vec<(&'static str, WalletFactory)> {
	use implementations::{http, memory};

	vec![
		(http::Registry::NAME, http::Registry::factory()),
		(memory::Registry::NAME, memory::Registry::factory()),
	]
}

/// Service that bounds every wallet call by a timeout.
pub struct WalletService {
	implementation: Box<dyn WalletInterface>,
	timeout: Duration,
}

impl WalletService {
	/// Creates a new WalletService over the given backend.
	pub fn new(implementation: Box<dyn WalletInterface>, timeout: Duration) -> Self {
		Self {
			implementation,
			timeout,
		}
	}

	/// Debits `amount` from `address`, giving up after the configured timeout.
	pub async fn debit(&self, address: &str, amount: Decimal) -> Result<bool, WalletError> {
		let debited = tokio::time::timeout(self.timeout, self.implementation.debit(address, amount))
			.await
			.map_err(|_| WalletError::Timeout(self.timeout))??;

		tracing::info!(
			wallet = %truncate_id(address),
			amount = %amount,
			debited,
			"Wallet debit completed"
		);
		Ok(debited)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use mockall::mock;
	use order_types::{Schema, ValidationError};

	mock! {
		Wallet {}

		#[async_trait]
		impl WalletInterface for Wallet {
			fn config_schema(&self) -> Box<dyn ConfigSchema>;
			async fn debit(&self, address: &str, amount: Decimal) -> Result<bool, WalletError>;
		}
	}

	struct SlowWallet;

	struct EmptySchema;

	impl ConfigSchema for EmptySchema {
		fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
			Schema::new(vec![], vec![]).validate(config)
		}
	}

	#[async_trait]
	impl WalletInterface for SlowWallet {
		fn config_schema(&self) -> Box<dyn ConfigSchema> {
			Box::new(EmptySchema)
		}

		async fn debit(&self, _address: &str, _amount: Decimal) -> Result<bool, WalletError> {
			tokio::time::sleep(Duration::from_secs(60)).await;
			Ok(true)
		}
	}

	#[tokio::test]
	async fn test_debit_passes_through() {
		let mut wallet = MockWallet::new();
		wallet
			.expect_debit()
			.withf(|address, amount| address.to_string() == "0xabc" && *amount == Decimal::new(25, 0))
			.times(1)
			.returning(|_, _| Ok(false));
		let service = WalletService::new(Box::new(wallet), Duration::from_secs(5));

		assert!(!service.debit("0xabc", Decimal::new(25, 0)).await.unwrap());
	}

	#[tokio::test]
	async fn test_errors_are_not_retried() {
		let mut wallet = MockWallet::new();
		wallet
			.expect_debit()
			.times(1)
			.returning(|_, _| Err(WalletError::Transport("connection refused".into())));
		let service = WalletService::new(Box::new(wallet), Duration::from_secs(5));

		assert!(matches!(
			service.debit("0xabc", Decimal::new(1, 0)).await,
			Err(WalletError::Transport(_))
		));
	}

	#[tokio::test(start_paused = true)]
	async fn test_timeout() {
		let service = WalletService::new(Box::new(SlowWallet), Duration::from_secs(3));

		let err = service.debit("0xabc", Decimal::new(10, 0)).await.unwrap_err();
		assert!(matches!(err, WalletError::Timeout(d) if d == Duration::from_secs(3)));
	}
}
