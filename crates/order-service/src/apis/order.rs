//! Order endpoints.
//!
//! Creation resolves item prices before anything is written: with a
//! `restaurant_id` the menu is snapshotted through the catalog, otherwise
//! every line must carry its own price.

use order_core::OrderEngine;
use order_types::{
	truncate_id, APIError, AcceptInput, AcceptOrderRequest, AcceptResult, CreateOrderRequest,
	ItemRequest, NewOrder, Order, OrderFilter, OrderItem, OrderItemInput, OrderStatus,
	PayOrderRequest, StatusResponse, TotalResponse,
};
use tracing::{info, warn};
use uuid::Uuid;

use super::to_api_error;

/// Handles POST /api/orders.
pub async fn create_order(
	engine: &OrderEngine,
	request: CreateOrderRequest,
) -> Result<Order, APIError> {
	let new_order = NewOrder {
		id: None,
		customer_id: request.customer_id,
		courier_id: request.courier_id,
		status: None,
	};

	if request.items.is_empty() {
		let order = engine
			.store()
			.create_order(new_order)
			.await
			.map_err(to_api_error)?;
		info!(order_id = %truncate_id(&order.id.to_string()), "Order created without items");
		return Ok(order);
	}

	let items = match request.restaurant_id {
		Some(restaurant_id) => {
			let catalog = engine.catalog().ok_or_else(|| APIError::BadRequest {
				error_type: "CATALOG_NOT_CONFIGURED".to_string(),
				message: "Orders cannot reference a restaurant, no catalog is configured"
					.to_string(),
				details: None,
			})?;
			let requests: Vec<ItemRequest> = request
				.items
				.iter()
				.map(|item| ItemRequest {
					restaurant_item_id: item.restaurant_item_id,
					quantity: item.quantity,
				})
				.collect();
			catalog
				.snapshot_items(restaurant_id, &requests)
				.await
				.map_err(|e| to_api_error(e.into()))?
		},
		None => request
			.items
			.iter()
			.enumerate()
			.map(|(index, item)| {
				let price = item.price.ok_or_else(|| APIError::BadRequest {
					error_type: "VALIDATION_ERROR".to_string(),
					message: format!("items[{}] needs a price when no restaurant is given", index),
					details: None,
				})?;
				Ok(OrderItemInput {
					restaurant_item_id: item.restaurant_item_id,
					price,
					quantity: item.quantity,
				})
			})
			.collect::<Result<Vec<_>, APIError>>()?,
	};

	let (order, items) = engine
		.store()
		.create_order_with_items(new_order, &items)
		.await
		.map_err(to_api_error)?;
	info!(
		order_id = %truncate_id(&order.id.to_string()),
		items = items.len(),
		"Order created"
	);
	Ok(order)
}

/// Handles GET /api/orders.
pub async fn list_orders(engine: &OrderEngine, filter: OrderFilter) -> Result<Vec<Order>, APIError> {
	engine
		.store()
		.list_orders(&filter)
		.await
		.map_err(to_api_error)
}

/// Handles GET /api/orders/{id}.
pub async fn get_order(engine: &OrderEngine, order_id: Uuid) -> Result<Order, APIError> {
	engine
		.store()
		.get_order(order_id)
		.await
		.map_err(to_api_error)
}

/// Handles GET /api/orders/{id}/status.
pub async fn get_status(engine: &OrderEngine, order_id: Uuid) -> Result<StatusResponse, APIError> {
	let status = engine
		.store()
		.get_order_status(order_id)
		.await
		.map_err(to_api_error)?;
	Ok(StatusResponse { order_id, status })
}

/// Handles PUT /api/orders/{id}/status, bypassing the transition table.
pub async fn overwrite_status(
	engine: &OrderEngine,
	order_id: Uuid,
	status: OrderStatus,
) -> Result<StatusResponse, APIError> {
	engine
		.store()
		.update_order_status(order_id, status)
		.await
		.map_err(to_api_error)?;
	Ok(StatusResponse { order_id, status })
}

/// Handles POST /api/orders/{id}/status.
pub async fn change_status(
	engine: &OrderEngine,
	order_id: Uuid,
	status: OrderStatus,
) -> Result<StatusResponse, APIError> {
	let order = engine
		.change_status(order_id, status)
		.await
		.map_err(to_api_error)?;
	Ok(StatusResponse {
		order_id,
		status: order.status,
	})
}

/// Handles POST /api/orders/{id}/accept.
pub async fn accept_order(
	engine: &OrderEngine,
	order_id: Uuid,
	request: AcceptOrderRequest,
) -> Result<AcceptResult, APIError> {
	let input = AcceptInput {
		order_id,
		customer_id: request.customer_id,
		courier_id: request.courier_id,
		items: request.items,
		status: request.status,
	};
	engine
		.store()
		.accept_order(input)
		.await
		.map_err(to_api_error)
}

/// Handles POST /api/orders/{id}/pay.
///
/// A declined debit is still an error for the caller, but the envelope
/// carries the status the order was moved to.
pub async fn pay_order(
	engine: &OrderEngine,
	order_id: Uuid,
	request: PayOrderRequest,
) -> Result<StatusResponse, APIError> {
	match engine.pay(order_id, request.customer_id).await {
		Ok(status) => Ok(StatusResponse { order_id, status }),
		Err(e) => {
			warn!(order_id = %truncate_id(&order_id.to_string()), error = %e, "Payment failed");
			Err(to_api_error(e))
		},
	}
}

/// Handles POST /api/orders/{id}/items.
pub async fn add_item(
	engine: &OrderEngine,
	order_id: Uuid,
	item: OrderItemInput,
) -> Result<OrderItem, APIError> {
	engine
		.store()
		.add_item_into_order(order_id, item)
		.await
		.map_err(to_api_error)
}

/// Handles DELETE /api/orders/{id}/items/{restaurant_item_id}.
pub async fn remove_item(
	engine: &OrderEngine,
	order_id: Uuid,
	restaurant_item_id: Uuid,
) -> Result<u64, APIError> {
	engine
		.store()
		.remove_item_from_order(order_id, restaurant_item_id)
		.await
		.map_err(to_api_error)
}

/// Handles GET /api/orders/{id}/total.
pub async fn order_total(engine: &OrderEngine, order_id: Uuid) -> Result<TotalResponse, APIError> {
	let total = engine
		.store()
		.calculate_order_total(order_id)
		.await
		.map_err(to_api_error)?;
	Ok(TotalResponse { order_id, total })
}
