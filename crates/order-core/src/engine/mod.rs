//! Order engine.
//!
//! Owns the wired services and hands them to the transport layer.

pub mod lifecycle;

use order_catalog::CatalogService;
use order_config::Config;
use order_storage::OrderStorageService;
use order_types::{Order, OrderStatus};
use std::sync::Arc;
use uuid::Uuid;

use crate::handlers::PaymentHandler;
use crate::state::OrderStateMachine;
use crate::store::OrderStore;
use crate::OrderError;

/// Errors raised while starting or stopping the engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
	#[error("Service error: {0}")]
	Service(String),
}

/// Bundle of the order services built from one configuration.
#[derive(Clone)]
pub struct OrderEngine {
	pub(crate) config: Config,
	pub(crate) storage: Arc<OrderStorageService>,
	pub(crate) store: Arc<OrderStore>,
	pub(crate) state_machine: Arc<OrderStateMachine>,
	pub(crate) payment_handler: Arc<PaymentHandler>,
	pub(crate) catalog: Option<Arc<CatalogService>>,
}

impl OrderEngine {
	pub fn new(
		config: Config,
		storage: Arc<OrderStorageService>,
		store: Arc<OrderStore>,
		payment_handler: Arc<PaymentHandler>,
		state_machine: Arc<OrderStateMachine>,
		catalog: Option<Arc<CatalogService>>,
	) -> Self {
		Self {
			config,
			storage,
			store,
			state_machine,
			payment_handler,
			catalog,
		}
	}

	pub fn config(&self) -> &Config {
		&self.config
	}

	/// The order store facade.
	pub fn store(&self) -> &OrderStore {
		&self.store
	}

	/// The restaurant catalog, when one is configured.
	pub fn catalog(&self) -> Option<&CatalogService> {
		self.catalog.as_deref()
	}

	/// Moves an order along the transition table.
	pub async fn change_status(
		&self,
		order_id: Uuid,
		status: OrderStatus,
	) -> Result<Order, OrderError> {
		self.state_machine.change_status(order_id, status).await
	}

	/// Charges the customer for an order.
	pub async fn pay(&self, order_id: Uuid, customer_id: Uuid) -> Result<OrderStatus, OrderError> {
		self.payment_handler.pay(order_id, customer_id).await
	}
}
