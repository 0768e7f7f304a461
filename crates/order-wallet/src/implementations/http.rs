//! Wallet backend that calls a remote wallet service over HTTP.
//!
//! The service exposes `POST {base_url}/debit` taking `{ address, amount }`
//! and answering `{ debited }`. A `402 Payment Required` answer is treated
//! as a declined debit.

use crate::{WalletError, WalletFactory, WalletInterface, WalletRegistry};
use async_trait::async_trait;
use order_types::{
	validators, ConfigSchema, Field, FieldType, ImplementationRegistry, Schema, SecretString,
	ValidationError,
};
use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
struct DebitRequest<'a> {
	address: &'a str,
	amount: Decimal,
}

#[derive(Debug, Deserialize)]
struct DebitResponse {
	debited: bool,
}

/// HTTP client for the wallet service.
pub struct HttpWallet {
	client: reqwest::Client,
	debit_url: String,
	api_key: Option<SecretString>,
}

impl HttpWallet {
	pub fn new(client: reqwest::Client, base_url: &str, api_key: Option<SecretString>) -> Self {
		Self {
			client,
			debit_url: format!("{}/debit", base_url.trim_end_matches('/')),
			api_key: api_key.filter(|key| !key.is_empty()),
		}
	}
}

#[async_trait]
impl WalletInterface for HttpWallet {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(HttpWalletSchema)
	}

	async fn debit(&self, address: &str, amount: Decimal) -> Result<bool, WalletError> {
		let mut request = self
			.client
			.post(&self.debit_url)
			.json(&DebitRequest { address, amount });
		if let Some(key) = &self.api_key {
			request = request.bearer_auth(key.expose_secret());
		}

		let response = request
			.send()
			.await
			.map_err(|e| WalletError::Transport(e.to_string()))?;

		let status = response.status();
		if status == StatusCode::PAYMENT_REQUIRED {
			return Ok(false);
		}
		if !status.is_success() {
			let body = response.text().await.unwrap_or_default();
			return Err(WalletError::Service(format!("{}: {}", status, body)));
		}

		let body: DebitResponse = response
			.json()
			.await
			.map_err(|e| WalletError::InvalidResponse(e.to_string()))?;
		Ok(body.debited)
	}
}

#[derive(Debug, Deserialize)]
struct HttpWalletConfig {
	base_url: String,
	#[serde(default)]
	api_key: Option<SecretString>,
}

/// Configuration schema for HttpWallet.
pub struct HttpWalletSchema;

impl ConfigSchema for HttpWalletSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![Field::new("base_url", FieldType::String).with_validator(validators::http_url)],
			vec![Field::new("api_key", FieldType::String)],
		);
		schema.validate(config)
	}
}

/// Factory function to create an HTTP wallet from configuration.
///
/// Configuration parameters:
/// - `base_url`: wallet service root URL (required)
/// - `api_key`: bearer token sent with every request (optional)
pub fn create_wallet(config: &toml::Value) -> Result<Box<dyn WalletInterface>, WalletError> {
	HttpWalletSchema
		.validate(config)
		.map_err(|e| WalletError::Configuration(e.to_string()))?;
	let settings: HttpWalletConfig = config
		.clone()
		.try_into()
		.map_err(|e| WalletError::Configuration(format!("Invalid http wallet config: {}", e)))?;

	let client = reqwest::Client::builder()
		.build()
		.map_err(|e| WalletError::Configuration(e.to_string()))?;
	Ok(Box::new(HttpWallet::new(
		client,
		&settings.base_url,
		settings.api_key,
	)))
}

/// Registry for the HTTP wallet implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "http";
	type Factory = WalletFactory;

	fn factory() -> Self::Factory {
		create_wallet
	}
}

impl WalletRegistry for Registry {}
