//! Engine startup and shutdown.

use super::{EngineError, OrderEngine};

impl OrderEngine {
	/// Prepares storage before requests are served.
	pub async fn initialize(&self) -> Result<(), EngineError> {
		tracing::info!(service_id = %self.config.service.id, "Initializing order engine");
		self.storage
			.initialize()
			.await
			.map_err(|e| EngineError::Service(e.to_string()))
	}

	pub async fn shutdown(&self) -> Result<(), EngineError> {
		tracing::info!(service_id = %self.config.service.id, "Shutting down order engine");
		Ok(())
	}
}
