//! Order payment.
//!
//! Payment is a two-step saga across the wallet service and the order
//! store: one debit, then a status transition. A declined debit is
//! compensated by cancelling the order. The wallet call never runs inside
//! an order store transaction.

use order_types::{truncate_id, OrderStatus};
use order_wallet::WalletService;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use crate::state::OrderStateMachine;
use crate::store::OrderStore;
use crate::OrderError;

/// Charges the customer for an order and moves it out of `CREATED`.
pub struct PaymentHandler {
	store: Arc<OrderStore>,
	state_machine: Arc<OrderStateMachine>,
	wallet: Option<Arc<WalletService>>,
}

impl PaymentHandler {
	pub fn new(
		store: Arc<OrderStore>,
		state_machine: Arc<OrderStateMachine>,
		wallet: Option<Arc<WalletService>>,
	) -> Self {
		Self {
			store,
			state_machine,
			wallet,
		}
	}

	/// Pays for `order_id` on behalf of `customer_id`.
	///
	/// On a declined debit the order is cancelled and
	/// [`OrderError::InsufficientFunds`] is returned carrying the new status.
	/// A failed wallet call leaves the order unchanged. When two payments
	/// race, only the first status write wins and the other caller gets
	/// [`OrderError::ConcurrentModification`]; its debit has already been
	/// made and is not reversed here.
	#[instrument(skip_all, fields(order_id = %truncate_id(&order_id.to_string())))]
	pub async fn pay(&self, order_id: Uuid, customer_id: Uuid) -> Result<OrderStatus, OrderError> {
		if order_id.is_nil() || customer_id.is_nil() {
			return Err(OrderError::Validation(
				"order_id and customer_id must not be nil".into(),
			));
		}
		let wallet = self.wallet.as_ref().ok_or(OrderError::WalletUnavailable)?;

		let order = self.store.get_order(order_id).await?;
		if order.customer_id != customer_id {
			return Err(OrderError::NotOrderOwner {
				order_id,
				customer_id,
			});
		}
		if order.status != OrderStatus::Created {
			return Err(OrderError::StatusRequired {
				required: OrderStatus::Created,
				current: order.status,
			});
		}

		let address = self.store.get_customer_wallet_address(customer_id).await?;
		let total = self.store.calculate_order_total(order_id).await?;
		if total <= Decimal::ZERO {
			return Err(OrderError::Validation(format!(
				"order total must be positive, got {}",
				total
			)));
		}

		let debited = wallet.debit(&address, total).await.map_err(|e| {
			tracing::error!(error = %e, "Wallet debit failed, order left unchanged");
			OrderError::from(e)
		})?;

		if !debited {
			let cancelled = self
				.state_machine
				.transition_from(&order, OrderStatus::Cancelled)
				.await?;
			tracing::warn!(total = %total, "Insufficient funds, order cancelled");
			return Err(OrderError::InsufficientFunds {
				order_id,
				status: cancelled.status,
			});
		}

		// Guarded by the version read at the CREATED check, so a concurrent
		// payment that already moved the order makes this one fail.
		let paid = self
			.state_machine
			.transition_from(&order, OrderStatus::Paid)
			.await?;
		tracing::info!(total = %total, "Order paid");
		Ok(paid.status)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::test_support::{item, Fixture, MockWallet, WALLET};
	use async_trait::async_trait;
	use order_types::{ConfigSchema, NewOrder};
	use order_wallet::implementations::memory::MemoryWalletSchema;
	use order_wallet::{WalletError, WalletInterface, WalletService};
	use std::sync::atomic::{AtomicUsize, Ordering};
	use std::time::Duration;

	/// Approves every debit after a delay and counts the calls.
	struct SlowWallet {
		debits: Arc<AtomicUsize>,
	}

	#[async_trait]
	impl WalletInterface for SlowWallet {
		fn config_schema(&self) -> Box<dyn ConfigSchema> {
			Box::new(MemoryWalletSchema)
		}

		async fn debit(&self, _address: &str, _amount: Decimal) -> Result<bool, WalletError> {
			self.debits.fetch_add(1, Ordering::SeqCst);
			tokio::time::sleep(Duration::from_millis(50)).await;
			Ok(true)
		}
	}

	async fn created_order(fixture: &Fixture, items: &[order_types::OrderItemInput]) -> Uuid {
		let new_order = NewOrder {
			customer_id: fixture.customer_id,
			courier_id: fixture.courier_id,
			..Default::default()
		};
		if items.is_empty() {
			fixture.store.create_order(new_order).await.unwrap().id
		} else {
			fixture
				.store
				.create_order_with_items(new_order, items)
				.await
				.unwrap()
				.0
				.id
		}
	}

	#[tokio::test]
	async fn test_successful_debit_marks_paid() {
		let fixture = Fixture::new().await;
		let order_id = created_order(&fixture, &[item(10, 2), item(5, 1)]).await;
		let mut wallet = MockWallet::new();
		wallet
			.expect_debit()
			.withf(|address, amount| address.to_string() == WALLET && *amount == Decimal::new(25, 0))
			.times(1)
			.returning(|_, _| Ok(true));
		let handler = fixture.payment_handler(Some(wallet));

		let status = handler.pay(order_id, fixture.customer_id).await.unwrap();

		assert_eq!(status, OrderStatus::Paid);
		assert_eq!(
			fixture.store.get_order_status(order_id).await.unwrap(),
			OrderStatus::Paid
		);
	}

	#[tokio::test]
	async fn test_declined_debit_cancels_order() {
		let fixture = Fixture::new().await;
		let order_id = created_order(&fixture, &[item(10, 1)]).await;
		let mut wallet = MockWallet::new();
		wallet.expect_debit().times(1).returning(|_, _| Ok(false));
		let handler = fixture.payment_handler(Some(wallet));

		let err = handler.pay(order_id, fixture.customer_id).await.unwrap_err();

		assert!(matches!(
			err,
			OrderError::InsufficientFunds {
				status: OrderStatus::Cancelled,
				..
			}
		));
		assert_eq!(
			fixture.store.get_order_status(order_id).await.unwrap(),
			OrderStatus::Cancelled
		);
	}

	#[tokio::test]
	async fn test_wallet_error_leaves_status_unchanged() {
		let fixture = Fixture::new().await;
		let order_id = created_order(&fixture, &[item(10, 1)]).await;
		let mut wallet = MockWallet::new();
		wallet
			.expect_debit()
			.times(1)
			.returning(|_, _| Err(WalletError::Transport("connection refused".into())));
		let handler = fixture.payment_handler(Some(wallet));

		let err = handler.pay(order_id, fixture.customer_id).await.unwrap_err();

		assert!(matches!(err, OrderError::Wallet(WalletError::Transport(_))));
		assert_eq!(
			fixture.store.get_order_status(order_id).await.unwrap(),
			OrderStatus::Created
		);
	}

	#[tokio::test]
	async fn test_only_created_orders_can_be_paid() {
		let fixture = Fixture::new().await;
		let order_id = created_order(&fixture, &[item(10, 1)]).await;
		fixture
			.state_machine
			.change_status(order_id, OrderStatus::Cancelled)
			.await
			.unwrap();
		let mut wallet = MockWallet::new();
		wallet.expect_debit().never();
		let handler = fixture.payment_handler(Some(wallet));

		let err = handler.pay(order_id, fixture.customer_id).await.unwrap_err();

		assert!(matches!(
			err,
			OrderError::StatusRequired {
				required: OrderStatus::Created,
				current: OrderStatus::Cancelled
			}
		));
		assert_eq!(
			fixture.store.get_order_status(order_id).await.unwrap(),
			OrderStatus::Cancelled
		);
	}

	#[tokio::test]
	async fn test_other_customer_cannot_pay() {
		let fixture = Fixture::new().await;
		let order_id = created_order(&fixture, &[item(10, 1)]).await;
		let mut wallet = MockWallet::new();
		wallet.expect_debit().never();
		let handler = fixture.payment_handler(Some(wallet));

		let err = handler.pay(order_id, Uuid::new_v4()).await.unwrap_err();

		assert!(matches!(err, OrderError::NotOrderOwner { .. }));
	}

	#[tokio::test]
	async fn test_empty_order_is_not_charged() {
		let fixture = Fixture::new().await;
		let order_id = created_order(&fixture, &[]).await;
		let mut wallet = MockWallet::new();
		wallet.expect_debit().never();
		let handler = fixture.payment_handler(Some(wallet));

		assert!(matches!(
			handler.pay(order_id, fixture.customer_id).await,
			Err(OrderError::Validation(_))
		));
	}

	#[tokio::test]
	async fn test_no_wallet_fails_fast() {
		let fixture = Fixture::new().await;
		let order_id = created_order(&fixture, &[item(10, 1)]).await;
		let handler = fixture.payment_handler(None);

		assert!(matches!(
			handler.pay(order_id, fixture.customer_id).await,
			Err(OrderError::WalletUnavailable)
		));
	}

	#[tokio::test]
	async fn test_blank_wallet_address_is_rejected() {
		let fixture = Fixture::new().await;
		let order_id = created_order(&fixture, &[item(10, 1)]).await;
		fixture
			.customers
			.insert(fixture.customer_id, Some("  ".into()))
			.await;
		let mut wallet = MockWallet::new();
		wallet.expect_debit().never();
		let handler = fixture.payment_handler(Some(wallet));

		assert!(matches!(
			handler.pay(order_id, fixture.customer_id).await,
			Err(OrderError::Validation(_))
		));
	}

	#[tokio::test(start_paused = true)]
	async fn test_concurrent_payments_mark_paid_once() {
		let fixture = Fixture::new().await;
		let order_id = created_order(&fixture, &[item(10, 1)]).await;
		let debits = Arc::new(AtomicUsize::new(0));
		let wallet = SlowWallet {
			debits: debits.clone(),
		};
		let handler = PaymentHandler::new(
			fixture.store.clone(),
			fixture.state_machine.clone(),
			Some(Arc::new(WalletService::new(
				Box::new(wallet),
				Duration::from_secs(5),
			))),
		);

		let (first, second) = tokio::join!(
			handler.pay(order_id, fixture.customer_id),
			handler.pay(order_id, fixture.customer_id),
		);

		let outcomes = [first, second];
		let paid = outcomes
			.iter()
			.filter(|r| matches!(r, Ok(OrderStatus::Paid)))
			.count();
		let conflicts = outcomes
			.iter()
			.filter(|r| matches!(r, Err(OrderError::ConcurrentModification(_))))
			.count();
		assert_eq!((paid, conflicts), (1, 1));
		assert_eq!(debits.load(Ordering::SeqCst), 2);

		let order = fixture.store.get_order(order_id).await.unwrap();
		assert_eq!(order.status, OrderStatus::Paid);
		assert_eq!(order.version, 1);
	}
}
