//! HTTP server for the order API.
//!
//! Routes are nested under `/api`; `/health` sits at the root. Handlers
//! here only unwrap extractors and delegate to [`crate::apis`].

use axum::{
	extract::{
		rejection::{JsonRejection, PathRejection, QueryRejection},
		DefaultBodyLimit, Path, Query, State,
	},
	http::StatusCode,
	response::Json,
	routing::{delete, get, post},
	Router,
};
use order_config::ApiConfig;
use order_core::OrderEngine;
use order_types::{
	APIError, AcceptOrderRequest, AcceptResult, CreateOrderRequest, Order, OrderFilter,
	OrderItem, OrderItemInput, PayOrderRequest, StatusRequest, StatusResponse, TotalResponse,
	WalletAddressResponse,
};
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};
use uuid::Uuid;

use crate::apis::{self, invalid_request};

/// Shared application state for the API server.
#[derive(Clone)]
pub struct AppState {
	pub engine: Arc<OrderEngine>,
}

/// Builds the router with every order route and the shared middleware.
pub fn router(engine: Arc<OrderEngine>, api_config: &ApiConfig) -> Router {
	let app_state = AppState { engine };

	Router::new()
		.nest(
			"/api",
			Router::new()
				.route("/orders", post(handle_create_order).get(handle_list_orders))
				.route("/orders/{id}", get(handle_get_order))
				.route(
					"/orders/{id}/status",
					get(handle_get_status)
						.put(handle_overwrite_status)
						.post(handle_change_status),
				)
				.route("/orders/{id}/accept", post(handle_accept_order))
				.route("/orders/{id}/pay", post(handle_pay_order))
				.route("/orders/{id}/items", post(handle_add_item))
				.route(
					"/orders/{id}/items/{restaurant_item_id}",
					delete(handle_remove_item),
				)
				.route("/orders/{id}/total", get(handle_order_total))
				.route("/customers/{id}/wallet", get(handle_wallet_address)),
		)
		.route("/health", get(handle_health))
		.layer(
			ServiceBuilder::new()
				.layer(TraceLayer::new_for_http())
				.layer(TimeoutLayer::new(Duration::from_secs(
					api_config.timeout_seconds,
				)))
				.layer(CorsLayer::permissive())
				.layer(DefaultBodyLimit::max(api_config.max_request_size)),
		)
		.with_state(app_state)
}

/// Starts the HTTP server and serves until `shutdown` resolves.
pub async fn start_server(
	api_config: ApiConfig,
	engine: Arc<OrderEngine>,
	shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), Box<dyn std::error::Error>> {
	let app = router(engine, &api_config);

	let bind_address = format!("{}:{}", api_config.host, api_config.port);
	let listener = TcpListener::bind(&bind_address).await?;

	tracing::info!("Order API server starting on {}", bind_address);

	axum::serve(listener, app)
		.with_graceful_shutdown(shutdown)
		.await?;

	Ok(())
}

/// Resolves on Ctrl-C.
pub async fn shutdown_signal() {
	if let Err(e) = tokio::signal::ctrl_c().await {
		tracing::error!(error = %e, "Failed to listen for shutdown signal");
	}
	tracing::info!("Shutdown signal received");
}

async fn handle_health() -> Json<Value> {
	Json(json!({ "status": "ok" }))
}

async fn handle_create_order(
	State(state): State<AppState>,
	request: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Order>), APIError> {
	let Json(request) = request.map_err(invalid_request)?;
	match apis::order::create_order(&state.engine, request).await {
		Ok(order) => Ok((StatusCode::CREATED, Json(order))),
		Err(e) => {
			tracing::warn!("Order creation failed: {}", e);
			Err(e)
		},
	}
}

async fn handle_list_orders(
	State(state): State<AppState>,
	filter: Result<Query<OrderFilter>, QueryRejection>,
) -> Result<Json<Vec<Order>>, APIError> {
	let Query(filter) = filter.map_err(invalid_request)?;
	apis::order::list_orders(&state.engine, filter)
		.await
		.map(Json)
}

async fn handle_get_order(
	State(state): State<AppState>,
	id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Order>, APIError> {
	let Path(id) = id.map_err(invalid_request)?;
	apis::order::get_order(&state.engine, id).await.map(Json)
}

async fn handle_get_status(
	State(state): State<AppState>,
	id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<StatusResponse>, APIError> {
	let Path(id) = id.map_err(invalid_request)?;
	apis::order::get_status(&state.engine, id).await.map(Json)
}

async fn handle_overwrite_status(
	State(state): State<AppState>,
	id: Result<Path<Uuid>, PathRejection>,
	request: Result<Json<StatusRequest>, JsonRejection>,
) -> Result<Json<StatusResponse>, APIError> {
	let Path(id) = id.map_err(invalid_request)?;
	let Json(request) = request.map_err(invalid_request)?;
	apis::order::overwrite_status(&state.engine, id, request.status)
		.await
		.map(Json)
}

async fn handle_change_status(
	State(state): State<AppState>,
	id: Result<Path<Uuid>, PathRejection>,
	request: Result<Json<StatusRequest>, JsonRejection>,
) -> Result<Json<StatusResponse>, APIError> {
	let Path(id) = id.map_err(invalid_request)?;
	let Json(request) = request.map_err(invalid_request)?;
	match apis::order::change_status(&state.engine, id, request.status).await {
		Ok(response) => Ok(Json(response)),
		Err(e) => {
			tracing::warn!("Status change failed: {}", e);
			Err(e)
		},
	}
}

async fn handle_accept_order(
	State(state): State<AppState>,
	id: Result<Path<Uuid>, PathRejection>,
	request: Result<Json<AcceptOrderRequest>, JsonRejection>,
) -> Result<Json<AcceptResult>, APIError> {
	let Path(id) = id.map_err(invalid_request)?;
	let Json(request) = request.map_err(invalid_request)?;
	match apis::order::accept_order(&state.engine, id, request).await {
		Ok(result) => Ok(Json(result)),
		Err(e) => {
			tracing::warn!("Accept failed: {}", e);
			Err(e)
		},
	}
}

async fn handle_pay_order(
	State(state): State<AppState>,
	id: Result<Path<Uuid>, PathRejection>,
	request: Result<Json<PayOrderRequest>, JsonRejection>,
) -> Result<Json<StatusResponse>, APIError> {
	let Path(id) = id.map_err(invalid_request)?;
	let Json(request) = request.map_err(invalid_request)?;
	apis::order::pay_order(&state.engine, id, request)
		.await
		.map(Json)
}

async fn handle_add_item(
	State(state): State<AppState>,
	id: Result<Path<Uuid>, PathRejection>,
	item: Result<Json<OrderItemInput>, JsonRejection>,
) -> Result<(StatusCode, Json<OrderItem>), APIError> {
	let Path(id) = id.map_err(invalid_request)?;
	let Json(item) = item.map_err(invalid_request)?;
	let item = apis::order::add_item(&state.engine, id, item).await?;
	Ok((StatusCode::CREATED, Json(item)))
}

async fn handle_remove_item(
	State(state): State<AppState>,
	ids: Result<Path<(Uuid, Uuid)>, PathRejection>,
) -> Result<StatusCode, APIError> {
	let Path((id, restaurant_item_id)) = ids.map_err(invalid_request)?;
	apis::order::remove_item(&state.engine, id, restaurant_item_id).await?;
	Ok(StatusCode::NO_CONTENT)
}

async fn handle_order_total(
	State(state): State<AppState>,
	id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<TotalResponse>, APIError> {
	let Path(id) = id.map_err(invalid_request)?;
	apis::order::order_total(&state.engine, id).await.map(Json)
}

async fn handle_wallet_address(
	State(state): State<AppState>,
	id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<WalletAddressResponse>, APIError> {
	let Path(id) = id.map_err(invalid_request)?;
	apis::customer::wallet_address(&state.engine, id)
		.await
		.map(Json)
}

#[cfg(test)]
mod tests {
	use super::*;
	use axum::body::{to_bytes, Body};
	use axum::http::{Method, Request};
	use order_config::Config;
	use order_types::{ErrorResponse, OrderStatus};
	use rust_decimal::Decimal;
	use serde::de::DeserializeOwned;
	use tower::ServiceExt;

	struct TestApp {
		router: Router,
		customer_id: Uuid,
		broke_customer_id: Uuid,
		courier_id: Uuid,
		restaurant_id: Uuid,
		ramen_id: Uuid,
	}

	impl TestApp {
		async fn new() -> Self {
			let customer_id = Uuid::new_v4();
			let broke_customer_id = Uuid::new_v4();
			let courier_id = Uuid::new_v4();
			let restaurant_id = Uuid::new_v4();
			let ramen_id = Uuid::new_v4();
			let config: Config = format!(
				r#"
[service]
id = "orders-api-test"

[orders]
primary = "memory"
[orders.implementations.memory]

[customers]
primary = "memory"
[customers.implementations.memory]
entries = [
	{{ id = "{customer_id}", wallet_address = "0xc0ffee" }},
	{{ id = "{broke_customer_id}", wallet_address = "0xbroke" }},
]

[couriers]
primary = "memory"
[couriers.implementations.memory]
entries = [{{ id = "{courier_id}" }}]

[wallet]
primary = "memory"
[wallet.implementations.memory]
balances = [{{ address = "0xc0ffee", amount = 100 }}]

[catalog]
primary = "memory"
[catalog.implementations.memory]
items = [
	{{ id = "{ramen_id}", restaurant_id = "{restaurant_id}", name = "Ramen", price = 12.5, quantity = 3 }},
]
"#
			)
			.parse()
			.unwrap();

			let api_config = ApiConfig {
				enabled: true,
				host: "127.0.0.1".into(),
				port: 0,
				timeout_seconds: 5,
				max_request_size: 64 * 1024,
			};
			let engine = crate::factory_registry::build_engine_from_config(config).unwrap();
			engine.initialize().await.unwrap();

			Self {
				router: router(Arc::new(engine), &api_config),
				customer_id,
				broke_customer_id,
				courier_id,
				restaurant_id,
				ramen_id,
			}
		}

		async fn send(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Vec<u8>) {
			let builder = Request::builder().method(method).uri(uri);
			let request = match body {
				Some(body) => builder
					.header("content-type", "application/json")
					.body(Body::from(body.to_string()))
					.unwrap(),
				None => builder.body(Body::empty()).unwrap(),
			};
			let response = self.router.clone().oneshot(request).await.unwrap();
			let status = response.status();
			let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
			(status, bytes.to_vec())
		}

		async fn call<T: DeserializeOwned>(
			&self,
			method: Method,
			uri: &str,
			body: Option<Value>,
			expected: StatusCode,
		) -> T {
			let (status, bytes) = self.send(method, uri, body).await;
			assert_eq!(status, expected, "{}", String::from_utf8_lossy(&bytes));
			serde_json::from_slice(&bytes).unwrap()
		}

		async fn create_priced_order(&self, customer_id: Uuid) -> Order {
			self.call(
				Method::POST,
				"/api/orders",
				Some(json!({
					"customer_id": customer_id,
					"courier_id": self.courier_id,
					"items": [{ "restaurant_item_id": Uuid::new_v4(), "quantity": 2, "price": "12.50" }],
				})),
				StatusCode::CREATED,
			)
			.await
		}
	}

	#[tokio::test]
	async fn test_health() {
		let app = TestApp::new().await;
		let body: Value = app.call(Method::GET, "/health", None, StatusCode::OK).await;
		assert_eq!(body["status"], "ok");
	}

	#[tokio::test]
	async fn test_create_total_and_pay() {
		let app = TestApp::new().await;
		let order = app.create_priced_order(app.customer_id).await;
		assert_eq!(order.status, OrderStatus::Created);

		let total: TotalResponse = app
			.call(
				Method::GET,
				&format!("/api/orders/{}/total", order.id),
				None,
				StatusCode::OK,
			)
			.await;
		assert_eq!(total.total, Decimal::new(25, 0));

		let paid: StatusResponse = app
			.call(
				Method::POST,
				&format!("/api/orders/{}/pay", order.id),
				Some(json!({ "customer_id": app.customer_id })),
				StatusCode::OK,
			)
			.await;
		assert_eq!(paid.status, OrderStatus::Paid);
	}

	#[tokio::test]
	async fn test_declined_payment_returns_402_with_status() {
		let app = TestApp::new().await;
		let order = app.create_priced_order(app.broke_customer_id).await;

		let body: ErrorResponse = app
			.call(
				Method::POST,
				&format!("/api/orders/{}/pay", order.id),
				Some(json!({ "customer_id": app.broke_customer_id })),
				StatusCode::PAYMENT_REQUIRED,
			)
			.await;
		assert_eq!(body.error, "PAYMENT_REQUIRED");
		assert_eq!(body.status, Some(OrderStatus::Cancelled));

		let status: StatusResponse = app
			.call(
				Method::GET,
				&format!("/api/orders/{}/status", order.id),
				None,
				StatusCode::OK,
			)
			.await;
		assert_eq!(status.status, OrderStatus::Cancelled);
	}

	#[tokio::test]
	async fn test_create_from_catalog_copies_menu_prices() {
		let app = TestApp::new().await;
		let order: Order = app
			.call(
				Method::POST,
				"/api/orders",
				Some(json!({
					"customer_id": app.customer_id,
					"courier_id": app.courier_id,
					"restaurant_id": app.restaurant_id,
					"items": [{ "restaurant_item_id": app.ramen_id, "quantity": 2, "price": "0.01" }],
				})),
				StatusCode::CREATED,
			)
			.await;

		let total: TotalResponse = app
			.call(
				Method::GET,
				&format!("/api/orders/{}/total", order.id),
				None,
				StatusCode::OK,
			)
			.await;
		assert_eq!(total.total, Decimal::new(25, 0));
	}

	#[tokio::test]
	async fn test_create_rejects_unavailable_item() {
		let app = TestApp::new().await;
		let body: ErrorResponse = app
			.call(
				Method::POST,
				"/api/orders",
				Some(json!({
					"customer_id": app.customer_id,
					"courier_id": app.courier_id,
					"restaurant_id": app.restaurant_id,
					"items": [{ "restaurant_item_id": app.ramen_id, "quantity": 4 }],
				})),
				StatusCode::CONFLICT,
			)
			.await;
		assert_eq!(body.error, "ITEM_UNAVAILABLE");

		let orders: Vec<Order> = app
			.call(
				Method::GET,
				&format!("/api/orders?customer_id={}", app.customer_id),
				None,
				StatusCode::OK,
			)
			.await;
		assert!(orders.is_empty());
	}

	#[tokio::test]
	async fn test_create_requires_price_without_restaurant() {
		let app = TestApp::new().await;
		let body: ErrorResponse = app
			.call(
				Method::POST,
				"/api/orders",
				Some(json!({
					"customer_id": app.customer_id,
					"courier_id": app.courier_id,
					"items": [{ "restaurant_item_id": app.ramen_id, "quantity": 1 }],
				})),
				StatusCode::BAD_REQUEST,
			)
			.await;
		assert_eq!(body.error, "VALIDATION_ERROR");
	}

	#[tokio::test]
	async fn test_unknown_customer_is_404() {
		let app = TestApp::new().await;
		let body: ErrorResponse = app
			.call(
				Method::POST,
				"/api/orders",
				Some(json!({ "customer_id": Uuid::new_v4(), "courier_id": app.courier_id })),
				StatusCode::NOT_FOUND,
			)
			.await;
		assert_eq!(body.error, "CUSTOMER_NOT_FOUND");
	}

	#[tokio::test]
	async fn test_malformed_input_is_400() {
		let app = TestApp::new().await;
		let body: ErrorResponse = app
			.call(
				Method::GET,
				"/api/orders/not-a-uuid",
				None,
				StatusCode::BAD_REQUEST,
			)
			.await;
		assert_eq!(body.error, "INVALID_REQUEST");

		let (status, _) = app
			.send(
				Method::POST,
				"/api/orders",
				Some(json!({ "customer_id": "nope" })),
			)
			.await;
		assert_eq!(status, StatusCode::BAD_REQUEST);

		let (status, _) = app
			.send(Method::GET, "/api/orders?status=LOST", None)
			.await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
	}

	#[tokio::test]
	async fn test_status_change_and_overwrite() {
		let app = TestApp::new().await;
		let order = app.create_priced_order(app.customer_id).await;
		let uri = format!("/api/orders/{}/status", order.id);

		let body: ErrorResponse = app
			.call(
				Method::POST,
				&uri,
				Some(json!({ "status": "ORDER_COMPLETED" })),
				StatusCode::BAD_REQUEST,
			)
			.await;
		assert_eq!(body.error, "INVALID_TRANSITION");

		let changed: StatusResponse = app
			.call(
				Method::POST,
				&uri,
				Some(json!({ "status": "cancelled" })),
				StatusCode::OK,
			)
			.await;
		assert_eq!(changed.status, OrderStatus::Cancelled);

		let overwritten: StatusResponse = app
			.call(
				Method::PUT,
				&uri,
				Some(json!({ "status": "ORDER_COMPLETED" })),
				StatusCode::OK,
			)
			.await;
		assert_eq!(overwritten.status, OrderStatus::OrderCompleted);
	}

	#[tokio::test]
	async fn test_accept_returns_first_decision() {
		let app = TestApp::new().await;
		let order_id = Uuid::new_v4();
		let uri = format!("/api/orders/{}/accept", order_id);

		let first: AcceptResult = app
			.call(
				Method::POST,
				&uri,
				Some(json!({
					"customer_id": app.customer_id,
					"courier_id": app.courier_id,
					"items": [{ "restaurant_item_id": app.ramen_id, "price": "12.50", "quantity": 1 }],
				})),
				StatusCode::OK,
			)
			.await;
		assert_eq!(first.status, OrderStatus::KitchenAccepted);

		let second: AcceptResult = app
			.call(
				Method::POST,
				&uri,
				Some(json!({
					"customer_id": app.customer_id,
					"courier_id": app.courier_id,
					"status": "KITCHEN_DENIED",
				})),
				StatusCode::OK,
			)
			.await;
		assert_eq!(second.status, OrderStatus::KitchenAccepted);
	}

	#[tokio::test]
	async fn test_add_and_remove_items() {
		let app = TestApp::new().await;
		let order: Order = app
			.call(
				Method::POST,
				"/api/orders",
				Some(json!({ "customer_id": app.customer_id, "courier_id": app.courier_id })),
				StatusCode::CREATED,
			)
			.await;
		let item_id = Uuid::new_v4();

		let item: OrderItem = app
			.call(
				Method::POST,
				&format!("/api/orders/{}/items", order.id),
				Some(json!({ "restaurant_item_id": item_id, "price": "4.25", "quantity": 2 })),
				StatusCode::CREATED,
			)
			.await;
		assert_eq!(item.restaurant_item_id, item_id);

		let (status, _) = app
			.send(
				Method::DELETE,
				&format!("/api/orders/{}/items/{}", order.id, item_id),
				None,
			)
			.await;
		assert_eq!(status, StatusCode::NO_CONTENT);

		let total: TotalResponse = app
			.call(
				Method::GET,
				&format!("/api/orders/{}/total", order.id),
				None,
				StatusCode::OK,
			)
			.await;
		assert_eq!(total.total, Decimal::ZERO);
	}

	#[tokio::test]
	async fn test_customer_wallet_address() {
		let app = TestApp::new().await;
		let body: WalletAddressResponse = app
			.call(
				Method::GET,
				&format!("/api/customers/{}/wallet", app.customer_id),
				None,
				StatusCode::OK,
			)
			.await;
		assert_eq!(body.wallet_address, "0xc0ffee");
	}
}
