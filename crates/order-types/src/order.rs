//! Order processing types.
//!
//! This module defines the order header, its line items and the value
//! objects passed through the accept path.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::OrderStatus;

/// Order header.
///
/// One row per order holding the participants, timestamps and status.
/// `version` increases on every status write and guards concurrent
/// transitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
	/// Unique identifier for this order.
	pub id: Uuid,
	/// Customer who placed the order.
	pub customer_id: Uuid,
	/// Courier assigned to deliver the order.
	pub courier_id: Uuid,
	/// Timestamp when this order was created.
	pub created_at: DateTime<Utc>,
	/// Timestamp when this order or its items were last changed.
	pub updated_at: DateTime<Utc>,
	/// Current status of the order.
	pub status: OrderStatus,
	/// Optimistic concurrency counter.
	#[serde(default)]
	pub version: i64,
}

impl Order {
	/// Builds a fresh header stamped with `now` for both timestamps.
	pub fn new(
		id: Uuid,
		customer_id: Uuid,
		courier_id: Uuid,
		status: OrderStatus,
		now: DateTime<Utc>,
	) -> Self {
		Self {
			id,
			customer_id,
			courier_id,
			created_at: now,
			updated_at: now,
			status,
			version: 0,
		}
	}
}

/// A persisted order line.
///
/// `price` and `quantity` are snapshots taken when the line was written and
/// never follow later catalog changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
	/// Row identifier, distinct from the catalog item id.
	pub id: Uuid,
	/// Owning order.
	pub order_id: Uuid,
	/// Catalog item this line refers to.
	pub restaurant_item_id: Uuid,
	/// Unit price at order time.
	pub price: Decimal,
	/// Number of units.
	pub quantity: i32,
}

impl OrderItem {
	/// Materialises an input line into a row with a freshly generated id.
	pub fn from_input(order_id: Uuid, input: &OrderItemInput) -> Self {
		Self {
			id: Uuid::new_v4(),
			order_id,
			restaurant_item_id: input.restaurant_item_id,
			price: input.price,
			quantity: input.quantity,
		}
	}

	/// `price * quantity` for this line.
	pub fn line_total(&self) -> Decimal {
		self.price * Decimal::from(self.quantity)
	}
}

/// A line to be written into an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItemInput {
	pub restaurant_item_id: Uuid,
	pub price: Decimal,
	pub quantity: i32,
}

/// Header fields supplied by a caller creating an order.
///
/// A missing id is generated and a missing status defaults to `CREATED`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewOrder {
	#[serde(default)]
	pub id: Option<Uuid>,
	pub customer_id: Uuid,
	pub courier_id: Uuid,
	#[serde(default)]
	pub status: Option<OrderStatus>,
}

/// Input of the idempotent accept operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcceptInput {
	pub order_id: Uuid,
	pub customer_id: Uuid,
	pub courier_id: Uuid,
	/// Candidate lines, only written when the order has none yet.
	#[serde(default)]
	pub items: Vec<OrderItemInput>,
	/// Requested decision; `KITCHEN_ACCEPTED` when absent.
	#[serde(default)]
	pub status: Option<OrderStatus>,
}

/// Outcome of an accept call.
///
/// `status` is the status actually persisted, which differs from the request
/// when the kitchen had already decided.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcceptResult {
	pub order_id: Uuid,
	pub status: OrderStatus,
}

/// Equality filters for listing orders. Absent fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderFilter {
	#[serde(default)]
	pub customer_id: Option<Uuid>,
	#[serde(default)]
	pub courier_id: Option<Uuid>,
	#[serde(default)]
	pub status: Option<OrderStatus>,
}

impl OrderFilter {
	/// Returns true if `order` satisfies every present filter.
	pub fn matches(&self, order: &Order) -> bool {
		self.customer_id.is_none_or(|id| id == order.customer_id)
			&& self.courier_id.is_none_or(|id| id == order.courier_id)
			&& self.status.is_none_or(|status| status == order.status)
	}
}
