//! Order state machine.
//!
//! Moves orders along the transition table of [`OrderStatus`]. Each write
//! is guarded by the version read together with the current status, so a
//! transition decided from stale state fails instead of overwriting.

use order_storage::{OrderStorageService, StorageError};
use order_types::{truncate_id, Order, OrderStatus};
use std::sync::Arc;
use uuid::Uuid;

use crate::store::now;
use crate::OrderError;

/// Validates and persists status transitions.
pub struct OrderStateMachine {
	storage: Arc<OrderStorageService>,
}

impl OrderStateMachine {
	pub fn new(storage: Arc<OrderStorageService>) -> Self {
		Self { storage }
	}

	/// Transitions an order to `new_status`.
	///
	/// Re-asserting the current status is a no-op. A transition outside the
	/// table fails with [`OrderError::InvalidTransition`]; losing a race to
	/// another writer fails with [`OrderError::ConcurrentModification`].
	pub async fn change_status(
		&self,
		order_id: Uuid,
		new_status: OrderStatus,
	) -> Result<Order, OrderError> {
		let order = self.storage.get_order(order_id).await?;

		if order.status == new_status {
			return Ok(order);
		}
		self.transition_from(&order, new_status).await
	}

	/// Moves `order` to `new_status` only if the row still carries the
	/// version of this snapshot.
	///
	/// Unlike [`Self::change_status`] there is no same-status shortcut: a
	/// writer that already moved the order makes this call fail with
	/// [`OrderError::ConcurrentModification`].
	pub async fn transition_from(
		&self,
		order: &Order,
		new_status: OrderStatus,
	) -> Result<Order, OrderError> {
		if !order.status.can_transition_to(new_status) {
			return Err(OrderError::InvalidTransition {
				from: order.status,
				to: new_status,
			});
		}

		let updated = self
			.storage
			.compare_and_set_status(order.id, order.version, new_status, now())
			.await
			.map_err(|e| match e {
				StorageError::Conflict(_) => OrderError::ConcurrentModification(format!(
					"order {} changed while moving {} to {}",
					order.id, order.status, new_status
				)),
				other => other.into(),
			})?;

		tracing::info!(
			order_id = %truncate_id(&order.id.to_string()),
			from = %order.status,
			to = %new_status,
			"Order status changed"
		);
		Ok(updated)
	}
}
