//! Catalog snapshot types.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A menu entry as reported by the restaurant catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuItem {
	/// Catalog item identifier.
	pub id: Uuid,
	/// Restaurant offering the item.
	pub restaurant_id: Uuid,
	pub name: String,
	/// Current unit price.
	pub price: Decimal,
	/// Units currently available.
	#[serde(default)]
	pub quantity: i32,
	#[serde(default)]
	pub description: String,
}

/// A customer's request for a catalog item, before pricing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemRequest {
	pub restaurant_item_id: Uuid,
	pub quantity: i32,
}
