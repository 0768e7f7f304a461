//! Customer endpoints.

use order_core::OrderEngine;
use order_types::{APIError, WalletAddressResponse};
use uuid::Uuid;

use super::to_api_error;

/// Handles GET /api/customers/{id}/wallet.
pub async fn wallet_address(
	engine: &OrderEngine,
	customer_id: Uuid,
) -> Result<WalletAddressResponse, APIError> {
	let wallet_address = engine
		.store()
		.get_customer_wallet_address(customer_id)
		.await
		.map_err(to_api_error)?;
	Ok(WalletAddressResponse {
		customer_id,
		wallet_address,
	})
}
