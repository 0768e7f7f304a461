//! Order status model.
//!
//! An order moves through four phases: customer (`CREATED`, `PAID`,
//! `CANCELLED`), kitchen, delivery and terminal. The allowed moves form a
//! directed graph with no edge back into an earlier phase. The graph is
//! encoded as an exhaustive `match` so adding a variant without deciding its
//! outbound edges fails to compile.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error returned when a status string does not name a known status.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Unknown order status: {0}")]
pub struct StatusParseError(pub String);

/// Status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderStatus {
	/// Order header written by the customer; nothing paid yet.
	Created,
	/// Wallet debit succeeded.
	Paid,
	/// Cancelled by the customer or by a failed payment.
	Cancelled,
	/// Kitchen took the order.
	KitchenAccepted,
	/// Kitchen refused the order.
	KitchenDenied,
	/// Kitchen is cooking.
	KitchenPreparing,
	/// Waiting for a courier.
	DeliveryPending,
	/// Courier is picking the order up.
	DeliveryPicking,
	/// Courier refused the delivery.
	DeliveryDenied,
	/// Courier is on the way.
	DeliveryDelivering,
	/// Refund issued after a kitchen denial.
	CourierRefunded,
	/// Refund issued after a delivery failure.
	DeliveryRefunded,
	/// Final state.
	OrderCompleted,
}

impl OrderStatus {
	/// Returns the canonical text stored in the database and sent over the wire.
	pub fn as_str(&self) -> &'static str {
		match self {
			OrderStatus::Created => "CREATED",
			OrderStatus::Paid => "PAID",
			OrderStatus::Cancelled => "CANCELLED",
			OrderStatus::KitchenAccepted => "KITCHEN_ACCEPTED",
			OrderStatus::KitchenDenied => "KITCHEN_DENIED",
			OrderStatus::KitchenPreparing => "KITCHEN_PREPARING",
			OrderStatus::DeliveryPending => "DELIVERY_PENDING",
			OrderStatus::DeliveryPicking => "DELIVERY_PICKING",
			OrderStatus::DeliveryDenied => "DELIVERY_DENIED",
			OrderStatus::DeliveryDelivering => "DELIVERY_DELIVERING",
			OrderStatus::CourierRefunded => "COURIER_REFUNDED",
			OrderStatus::DeliveryRefunded => "DELIVERY_REFUNDED",
			OrderStatus::OrderCompleted => "ORDER_COMPLETED",
		}
	}

	/// Returns an iterator over all status variants in lifecycle order.
	pub fn all() -> impl Iterator<Item = Self> {
		[
			Self::Created,
			Self::Paid,
			Self::Cancelled,
			Self::KitchenAccepted,
			Self::KitchenDenied,
			Self::KitchenPreparing,
			Self::DeliveryPending,
			Self::DeliveryPicking,
			Self::DeliveryDenied,
			Self::DeliveryDelivering,
			Self::CourierRefunded,
			Self::DeliveryRefunded,
			Self::OrderCompleted,
		]
		.into_iter()
	}

	/// Statuses reachable from `self` in a single step.
	pub fn allowed_transitions(&self) -> &'static [OrderStatus] {
		use OrderStatus::*;
		match self {
			Created => &[Paid, Cancelled],
			Paid => &[KitchenAccepted, KitchenDenied],
			KitchenAccepted => &[KitchenPreparing],
			KitchenDenied => &[CourierRefunded],
			KitchenPreparing => &[DeliveryPending],
			DeliveryPending => &[DeliveryPicking, DeliveryDenied],
			DeliveryPicking => &[DeliveryDelivering, DeliveryDenied],
			DeliveryDelivering => &[OrderCompleted, DeliveryRefunded],
			DeliveryDenied => &[DeliveryRefunded],
			CourierRefunded => &[OrderCompleted],
			DeliveryRefunded => &[OrderCompleted],
			Cancelled | OrderCompleted => &[],
		}
	}

	/// Returns true if `next` is a legal single-step move from `self`.
	pub fn can_transition_to(&self, next: OrderStatus) -> bool {
		self.allowed_transitions().contains(&next)
	}

	/// Kitchen decisions are final for the accept path.
	pub fn is_kitchen_decision(&self) -> bool {
		matches!(self, OrderStatus::KitchenAccepted | OrderStatus::KitchenDenied)
	}

	/// Returns true if no outbound transition exists.
	pub fn is_terminal(&self) -> bool {
		self.allowed_transitions().is_empty()
	}
}

impl fmt::Display for OrderStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for OrderStatus {
	type Err = StatusParseError;

	/// Parses a status, tolerating surrounding whitespace, lowercase input and
	/// the legacy `CUSTOMER_*` spellings still present in older rows.
	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let normalized = s.trim().to_ascii_uppercase();
		let status = match normalized.as_str() {
			"CREATED" | "CUSTOMER_CREATED" => Self::Created,
			"PAID" | "CUSTOMER_PAID" => Self::Paid,
			"CANCELLED" | "CUSTOMER_CANCELLED" => Self::Cancelled,
			"KITCHEN_ACCEPTED" => Self::KitchenAccepted,
			"KITCHEN_DENIED" => Self::KitchenDenied,
			"KITCHEN_PREPARING" => Self::KitchenPreparing,
			"DELIVERY_PENDING" => Self::DeliveryPending,
			"DELIVERY_PICKING" => Self::DeliveryPicking,
			"DELIVERY_DENIED" => Self::DeliveryDenied,
			"DELIVERY_DELIVERING" => Self::DeliveryDelivering,
			"COURIER_REFUNDED" => Self::CourierRefunded,
			"DELIVERY_REFUNDED" => Self::DeliveryRefunded,
			"ORDER_COMPLETED" => Self::OrderCompleted,
			_ => return Err(StatusParseError(s.to_string())),
		};
		Ok(status)
	}
}

impl From<OrderStatus> for &'static str {
	fn from(status: OrderStatus) -> Self {
		status.as_str()
	}
}

impl Serialize for OrderStatus {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_str(self.as_str())
	}
}

impl<'de> Deserialize<'de> for OrderStatus {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		let raw = String::deserialize(deserializer)?;
		raw.parse().map_err(serde::de::Error::custom)
	}
}
