//! PostgreSQL order storage backend.
//!
//! Multi-statement operations run inside one `sqlx` transaction; dropping
//! the transaction on an early `?` rolls it back. Reads that precede a write
//! in the same unit take `FOR UPDATE` so the read-then-write window cannot
//! interleave with another writer on the same order.

use crate::{
	check_item_constraints, OrderStorageFactory, OrderStorageInterface, OrderStorageRegistry,
	StorageError,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use order_types::{
	validators, AcceptInput, AcceptResult, ConfigSchema, Field, FieldType, ImplementationRegistry,
	Order, OrderFilter, OrderItem, OrderItemInput, OrderStatus, Schema, ValidationError,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, QueryBuilder, Transaction};
use std::time::Duration;
use uuid::Uuid;

const ORDER_COLUMNS: &str = "id, customer_id, courier_id, created_at, updated_at, status, version";

const SCHEMA: &[&str] = &[
	r#"
	CREATE TABLE IF NOT EXISTS orders (
		id UUID PRIMARY KEY,
		customer_id UUID NOT NULL,
		courier_id UUID NOT NULL,
		created_at TIMESTAMPTZ NOT NULL,
		updated_at TIMESTAMPTZ NOT NULL,
		status TEXT NOT NULL,
		version BIGINT NOT NULL DEFAULT 0
	)
	"#,
	"CREATE INDEX IF NOT EXISTS orders_customer_id_idx ON orders (customer_id)",
	"CREATE INDEX IF NOT EXISTS orders_courier_id_idx ON orders (courier_id)",
	r#"
	CREATE TABLE IF NOT EXISTS order_items (
		id UUID PRIMARY KEY,
		order_id UUID NOT NULL REFERENCES orders (id),
		restaurant_item_id UUID NOT NULL,
		price NUMERIC NOT NULL CHECK (price >= 0),
		quantity INTEGER NOT NULL CHECK (quantity > 0)
	)
	"#,
	"CREATE INDEX IF NOT EXISTS order_items_order_id_idx ON order_items (order_id)",
];

#[derive(sqlx::FromRow)]
struct OrderRow {
	id: Uuid,
	customer_id: Uuid,
	courier_id: Uuid,
	created_at: DateTime<Utc>,
	updated_at: DateTime<Utc>,
	status: String,
	version: i64,
}

impl TryFrom<OrderRow> for Order {
	type Error = StorageError;

	fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
		Ok(Order {
			id: row.id,
			customer_id: row.customer_id,
			courier_id: row.courier_id,
			created_at: row.created_at,
			updated_at: row.updated_at,
			status: parse_status(&row.status)?,
			version: row.version,
		})
	}
}

#[derive(sqlx::FromRow)]
struct ItemRow {
	id: Uuid,
	order_id: Uuid,
	restaurant_item_id: Uuid,
	price: Decimal,
	quantity: i32,
}

impl From<ItemRow> for OrderItem {
	fn from(row: ItemRow) -> Self {
		OrderItem {
			id: row.id,
			order_id: row.order_id,
			restaurant_item_id: row.restaurant_item_id,
			price: row.price,
			quantity: row.quantity,
		}
	}
}

fn parse_status(raw: &str) -> Result<OrderStatus, StorageError> {
	raw.parse()
		.map_err(|e: order_types::StatusParseError| StorageError::Serialization(e.to_string()))
}

/// Maps driver errors, keeping check-constraint violations distinguishable.
fn map_sqlx(err: sqlx::Error) -> StorageError {
	if let Some(db) = err.as_database_error() {
		if db.is_check_violation() {
			return StorageError::Constraint(db.message().to_string());
		}
	}
	StorageError::Backend(err.to_string())
}

/// Builds the list query for `filter`.
fn list_query(filter: &OrderFilter) -> QueryBuilder<'static, Postgres> {
	let mut qb = QueryBuilder::new(format!("SELECT {} FROM orders", ORDER_COLUMNS));
	let mut clause = " WHERE ";
	if let Some(customer_id) = filter.customer_id {
		qb.push(clause).push("customer_id = ").push_bind(customer_id);
		clause = " AND ";
	}
	if let Some(courier_id) = filter.courier_id {
		qb.push(clause).push("courier_id = ").push_bind(courier_id);
		clause = " AND ";
	}
	if let Some(status) = filter.status {
		qb.push(clause).push("status = ").push_bind(status.as_str());
	}
	qb.push(" ORDER BY created_at DESC");
	qb
}

/// PostgreSQL order storage.
pub struct PostgresOrderStorage {
	pool: PgPool,
	create_schema: bool,
}

impl PostgresOrderStorage {
	/// Creates a storage over an existing pool.
	pub fn new(pool: PgPool, create_schema: bool) -> Self {
		Self {
			pool,
			create_schema,
		}
	}

	async fn begin(&self) -> Result<Transaction<'static, Postgres>, StorageError> {
		self.pool.begin().await.map_err(map_sqlx)
	}

	/// Locks the order row for the rest of the transaction.
	async fn lock_order(
		tx: &mut Transaction<'static, Postgres>,
		order_id: Uuid,
	) -> Result<(), StorageError> {
		let found: Option<(i32,)> = sqlx::query_as("SELECT 1 FROM orders WHERE id = $1 FOR UPDATE")
			.bind(order_id)
			.fetch_optional(&mut **tx)
			.await
			.map_err(map_sqlx)?;
		found
			.map(|_| ())
			.ok_or(StorageError::OrderNotFound(order_id))
	}

	async fn write_header(
		tx: &mut Transaction<'static, Postgres>,
		order: &Order,
	) -> Result<(), StorageError> {
		sqlx::query(
			r#"
			INSERT INTO orders (id, customer_id, courier_id, created_at, updated_at, status, version)
			VALUES ($1, $2, $3, $4, $5, $6, $7)
			"#,
		)
		.bind(order.id)
		.bind(order.customer_id)
		.bind(order.courier_id)
		.bind(order.created_at)
		.bind(order.updated_at)
		.bind(order.status.as_str())
		.bind(order.version)
		.execute(&mut **tx)
		.await
		.map_err(map_sqlx)?;
		Ok(())
	}

	async fn write_items(
		tx: &mut Transaction<'static, Postgres>,
		order_id: Uuid,
		items: &[OrderItemInput],
	) -> Result<Vec<OrderItem>, StorageError> {
		let rows = items
			.iter()
			.map(|item| {
				check_item_constraints(item)?;
				Ok(OrderItem::from_input(order_id, item))
			})
			.collect::<Result<Vec<_>, StorageError>>()?;
		if rows.is_empty() {
			return Ok(rows);
		}

		let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
		let order_ids: Vec<Uuid> = rows.iter().map(|r| r.order_id).collect();
		let item_ids: Vec<Uuid> = rows.iter().map(|r| r.restaurant_item_id).collect();
		let prices: Vec<Decimal> = rows.iter().map(|r| r.price).collect();
		let quantities: Vec<i32> = rows.iter().map(|r| r.quantity).collect();
		sqlx::query(
			r#"
			INSERT INTO order_items (id, order_id, restaurant_item_id, price, quantity)
			SELECT * FROM UNNEST($1::uuid[], $2::uuid[], $3::uuid[], $4::numeric[], $5::integer[])
			"#,
		)
		.bind(&ids)
		.bind(&order_ids)
		.bind(&item_ids)
		.bind(&prices)
		.bind(&quantities)
		.execute(&mut **tx)
		.await
		.map_err(map_sqlx)?;

		Ok(rows)
	}

	async fn touch(
		tx: &mut Transaction<'static, Postgres>,
		order_id: Uuid,
		now: DateTime<Utc>,
	) -> Result<(), StorageError> {
		sqlx::query("UPDATE orders SET updated_at = $2 WHERE id = $1")
			.bind(order_id)
			.bind(now)
			.execute(&mut **tx)
			.await
			.map_err(map_sqlx)?;
		Ok(())
	}
}

#[async_trait]
impl OrderStorageInterface for PostgresOrderStorage {
	async fn initialize(&self) -> Result<(), StorageError> {
		if !self.create_schema {
			return Ok(());
		}
		for statement in SCHEMA {
			sqlx::query(statement)
				.execute(&self.pool)
				.await
				.map_err(map_sqlx)?;
		}
		tracing::info!(component = "orders", "Order schema ensured");
		Ok(())
	}

	async fn insert_order(&self, order: &Order) -> Result<(), StorageError> {
		let mut tx = self.begin().await?;
		Self::write_header(&mut tx, order).await?;
		tx.commit().await.map_err(map_sqlx)
	}

	async fn insert_order_with_items(
		&self,
		order: &Order,
		items: &[OrderItemInput],
	) -> Result<Vec<OrderItem>, StorageError> {
		let mut tx = self.begin().await?;
		Self::write_header(&mut tx, order).await?;
		let rows = Self::write_items(&mut tx, order.id, items).await?;
		tx.commit().await.map_err(map_sqlx)?;
		Ok(rows)
	}

	async fn list_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>, StorageError> {
		let rows: Vec<OrderRow> = list_query(filter)
			.build_query_as()
			.fetch_all(&self.pool)
			.await
			.map_err(map_sqlx)?;
		rows.into_iter().map(Order::try_from).collect()
	}

	async fn get_order(&self, order_id: Uuid) -> Result<Order, StorageError> {
		let row: Option<OrderRow> =
			sqlx::query_as(&format!("SELECT {} FROM orders WHERE id = $1", ORDER_COLUMNS))
				.bind(order_id)
				.fetch_optional(&self.pool)
				.await
				.map_err(map_sqlx)?;
		row.ok_or(StorageError::OrderNotFound(order_id))?
			.try_into()
	}

	async fn get_status(&self, order_id: Uuid) -> Result<OrderStatus, StorageError> {
		let row: Option<(String,)> = sqlx::query_as("SELECT status FROM orders WHERE id = $1")
			.bind(order_id)
			.fetch_optional(&self.pool)
			.await
			.map_err(map_sqlx)?;
		let (raw,) = row.ok_or(StorageError::OrderNotFound(order_id))?;
		parse_status(&raw)
	}

	async fn list_items(&self, order_id: Uuid) -> Result<Vec<OrderItem>, StorageError> {
		// Distinguish "no such order" from "order without items"
		self.get_status(order_id).await?;
		let rows: Vec<ItemRow> = sqlx::query_as(
			"SELECT id, order_id, restaurant_item_id, price, quantity FROM order_items WHERE order_id = $1",
		)
		.bind(order_id)
		.fetch_all(&self.pool)
		.await
		.map_err(map_sqlx)?;
		Ok(rows.into_iter().map(OrderItem::from).collect())
	}

	async fn update_status(
		&self,
		order_id: Uuid,
		status: OrderStatus,
		now: DateTime<Utc>,
	) -> Result<(), StorageError> {
		let result = sqlx::query(
			"UPDATE orders SET status = $2, updated_at = $3, version = version + 1 WHERE id = $1",
		)
		.bind(order_id)
		.bind(status.as_str())
		.bind(now)
		.execute(&self.pool)
		.await
		.map_err(map_sqlx)?;

		if result.rows_affected() == 0 {
			return Err(StorageError::OrderNotFound(order_id));
		}
		Ok(())
	}

	async fn compare_and_set_status(
		&self,
		order_id: Uuid,
		expected_version: i64,
		status: OrderStatus,
		now: DateTime<Utc>,
	) -> Result<Order, StorageError> {
		let row: Option<OrderRow> = sqlx::query_as(&format!(
			r#"
			UPDATE orders SET status = $3, updated_at = $4, version = version + 1
			WHERE id = $1 AND version = $2
			RETURNING {}
			"#,
			ORDER_COLUMNS
		))
		.bind(order_id)
		.bind(expected_version)
		.bind(status.as_str())
		.bind(now)
		.fetch_optional(&self.pool)
		.await
		.map_err(map_sqlx)?;

		match row {
			Some(row) => row.try_into(),
			None => {
				// Either the row is gone or someone else moved it on
				self.get_status(order_id).await?;
				Err(StorageError::Conflict(format!(
					"order {} changed since version {}",
					order_id, expected_version
				)))
			},
		}
	}

	async fn order_total(&self, order_id: Uuid) -> Result<Decimal, StorageError> {
		let row: Option<(Decimal,)> = sqlx::query_as(
			r#"
			SELECT COALESCE(SUM(i.price * i.quantity), 0)
			FROM orders o
			LEFT JOIN order_items i ON i.order_id = o.id
			WHERE o.id = $1
			GROUP BY o.id
			"#,
		)
		.bind(order_id)
		.fetch_optional(&self.pool)
		.await
		.map_err(map_sqlx)?;
		row.map(|(total,)| total)
			.ok_or(StorageError::OrderNotFound(order_id))
	}

	async fn accept_order(
		&self,
		input: &AcceptInput,
		status: OrderStatus,
		now: DateTime<Utc>,
	) -> Result<AcceptResult, StorageError> {
		let mut tx = self.begin().await?;

		let current: Option<(String,)> =
			sqlx::query_as("SELECT status FROM orders WHERE id = $1 FOR UPDATE")
				.bind(input.order_id)
				.fetch_optional(&mut *tx)
				.await
				.map_err(map_sqlx)?;
		if let Some((raw,)) = current {
			let existing = parse_status(&raw)?;
			if existing.is_kitchen_decision() {
				tx.commit().await.map_err(map_sqlx)?;
				return Ok(AcceptResult {
					order_id: input.order_id,
					status: existing,
				});
			}
		}

		// The WHERE guard covers a concurrent first insert of the same id
		let upserted: Option<(String,)> = sqlx::query_as(
			r#"
			INSERT INTO orders (id, customer_id, courier_id, created_at, updated_at, status, version)
			VALUES ($1, $2, $3, $4, $4, $5, 0)
			ON CONFLICT (id) DO UPDATE SET
				status = EXCLUDED.status,
				updated_at = EXCLUDED.updated_at,
				version = orders.version + 1
			WHERE UPPER(orders.status) NOT IN ('KITCHEN_ACCEPTED', 'KITCHEN_DENIED')
			RETURNING status
			"#,
		)
		.bind(input.order_id)
		.bind(input.customer_id)
		.bind(input.courier_id)
		.bind(now)
		.bind(status.as_str())
		.fetch_optional(&mut *tx)
		.await
		.map_err(map_sqlx)?;

		let Some((raw,)) = upserted else {
			let (raw,): (String,) = sqlx::query_as("SELECT status FROM orders WHERE id = $1")
				.bind(input.order_id)
				.fetch_one(&mut *tx)
				.await
				.map_err(map_sqlx)?;
			tx.commit().await.map_err(map_sqlx)?;
			return Ok(AcceptResult {
				order_id: input.order_id,
				status: parse_status(&raw)?,
			});
		};

		let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM order_items WHERE order_id = $1")
			.bind(input.order_id)
			.fetch_one(&mut *tx)
			.await
			.map_err(map_sqlx)?;
		if count == 0 && !input.items.is_empty() {
			Self::write_items(&mut tx, input.order_id, &input.items).await?;
		}

		tx.commit().await.map_err(map_sqlx)?;
		Ok(AcceptResult {
			order_id: input.order_id,
			status: parse_status(&raw)?,
		})
	}

	async fn add_item(
		&self,
		order_id: Uuid,
		item: &OrderItemInput,
		now: DateTime<Utc>,
	) -> Result<OrderItem, StorageError> {
		let mut tx = self.begin().await?;
		Self::lock_order(&mut tx, order_id).await?;
		let mut rows = Self::write_items(&mut tx, order_id, std::slice::from_ref(item)).await?;
		Self::touch(&mut tx, order_id, now).await?;
		tx.commit().await.map_err(map_sqlx)?;
		rows.pop()
			.ok_or_else(|| StorageError::Backend("item row was not written".into()))
	}

	async fn remove_item(
		&self,
		order_id: Uuid,
		restaurant_item_id: Uuid,
		now: DateTime<Utc>,
	) -> Result<u64, StorageError> {
		let mut tx = self.begin().await?;
		Self::lock_order(&mut tx, order_id).await?;
		let removed = sqlx::query(
			"DELETE FROM order_items WHERE order_id = $1 AND restaurant_item_id = $2",
		)
		.bind(order_id)
		.bind(restaurant_item_id)
		.execute(&mut *tx)
		.await
		.map_err(map_sqlx)?
		.rows_affected();
		if removed == 0 {
			return Err(StorageError::ItemNotFound {
				order_id,
				restaurant_item_id,
			});
		}
		Self::touch(&mut tx, order_id, now).await?;
		tx.commit().await.map_err(map_sqlx)?;
		Ok(removed)
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(PostgresOrderStorageSchema)
	}
}

/// Configuration for the PostgreSQL backend.
#[derive(Debug, Clone, Deserialize)]
pub struct PostgresStorageConfig {
	/// Connection string, `postgres://...`.
	pub url: String,
	#[serde(default = "default_max_connections")]
	pub max_connections: u32,
	#[serde(default = "default_acquire_timeout_seconds")]
	pub acquire_timeout_seconds: u64,
	/// Create tables on startup when missing.
	#[serde(default)]
	pub create_schema: bool,
}

fn default_max_connections() -> u32 {
	5
}

fn default_acquire_timeout_seconds() -> u64 {
	5
}

/// Configuration schema for PostgresOrderStorage.
pub struct PostgresOrderStorageSchema;

impl ConfigSchema for PostgresOrderStorageSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![Field::new("url", FieldType::String).with_validator(validators::postgres_url)],
			vec![
				Field::new(
					"max_connections",
					FieldType::Integer {
						min: Some(1),
						max: Some(100),
					},
				),
				Field::new(
					"acquire_timeout_seconds",
					FieldType::Integer {
						min: Some(1),
						max: Some(300),
					},
				),
				Field::new("create_schema", FieldType::Boolean),
			],
		);
		schema.validate(config)
	}
}

/// Factory function to create a PostgreSQL order storage backend.
///
/// The pool connects lazily, so construction never blocks on the database.
///
/// Configuration parameters:
/// - `url`: connection string (required)
/// - `max_connections`: pool size (default 5)
/// - `acquire_timeout_seconds`: pool acquire timeout (default 5)
/// - `create_schema`: create tables at startup (default false)
pub fn create_storage(
	config: &toml::Value,
) -> Result<Box<dyn OrderStorageInterface>, StorageError> {
	PostgresOrderStorageSchema
		.validate(config)
		.map_err(|e| StorageError::Configuration(e.to_string()))?;
	let settings: PostgresStorageConfig = config
		.clone()
		.try_into()
		.map_err(|e| StorageError::Configuration(format!("Invalid postgres config: {}", e)))?;

	let pool = PgPoolOptions::new()
		.max_connections(settings.max_connections)
		.acquire_timeout(Duration::from_secs(settings.acquire_timeout_seconds))
		.connect_lazy(&settings.url)
		.map_err(|e| StorageError::Configuration(e.to_string()))?;

	Ok(Box::new(PostgresOrderStorage::new(
		pool,
		settings.create_schema,
	)))
}

/// Registry for the PostgreSQL order storage implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "postgres";
	type Factory = OrderStorageFactory;

	fn factory() -> Self::Factory {
		create_storage
	}
}

impl OrderStorageRegistry for Registry {}
