// Copyright 2026 The Exchange Core Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The expiry sweeper (`spec.md` §4.7, §5): a periodic background task that
//! scans for orders stuck in `awaiting_payment` past their `expires_at` and
//! transitions each one under its own serializable scope. Mirrors the
//! tick-and-sweep shape of `engine`'s `heartbeat`/`duty_manager` background
//! tasks, generalized from "submit one heartbeat per tick" to "sweep one
//! batch of expired orders per tick".
//!
//! Per `spec.md` §7, background tasks never propagate errors to a caller —
//! they log and move on to the next order.

use std::sync::Arc;
use std::time::Duration;

use exchange_clock::{Clock, ReferenceGenerator};
use exchange_store::Store;

use crate::state_machine::OrderService;

/// Scans once for expired `awaiting_payment` orders and sweeps each in its
/// own scope. Returns the number successfully expired. A failure on one
/// order is logged and does not stop the sweep of the rest.
pub async fn sweep_once<C, R>(store: &Store, orders: Arc<OrderService<R>>, clock: &C) -> usize
where
	C: Clock,
	R: ReferenceGenerator + Clone + 'static,
{
	let now = clock.now();
	let expired_ids = match store.transact(move |scope| Ok(scope.orders().list_expired_awaiting_payment(now)?)).await
	{
		Ok(orders) => orders.into_iter().map(|o| o.id).collect::<Vec<_>>(),
		Err(e) => {
			tracing::error!(error = %e, "expiry sweeper failed to list expired orders");
			return 0;
		}
	};

	let mut swept = 0;
	for order_id in expired_ids {
		let orders = orders.clone();
		let result = store.transact(move |scope| {
			orders
				.expire_order(scope, order_id, now)
				.map_err(|e| exchange_store::StoreError::Internal(e.to_string()))
		}).await;
		match result {
			Ok(_) => swept += 1,
			Err(e) => tracing::warn!(order_id = order_id.0, error = %e, "failed to expire order, will retry next sweep"),
		}
	}
	swept
}

/// Runs [`sweep_once`] on a fixed interval until the returned handle is
/// dropped or aborted. Cadence SHOULD be <= the minimum `processingTime`
/// across active ads (`spec.md` §4.7).
pub fn spawn<C, R>(store: Store, orders: Arc<OrderService<R>>, clock: C, interval: Duration) -> tokio::task::JoinHandle<()>
where
	C: Clock + 'static,
	R: ReferenceGenerator + Clone + 'static,
{
	tokio::spawn(async move {
		let mut ticker = tokio::time::interval(interval);
		loop {
			ticker.tick().await;
			let swept = sweep_once(&store, orders.clone(), &clock).await;
			if swept > 0 {
				tracing::info!(swept, "expiry sweeper completed a pass");
			}
		}
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::Utc;
	use exchange_clock::{DefaultReferenceGenerator, SteppingClock};
	use exchange_money::Money;
	use exchange_store::{AdStatus, AdType, P2pAd, PaymentMethodId, PaymentMethodType, UserPaymentMethod};

	#[tokio::test]
	async fn sweep_expires_orders_past_their_deadline_and_unfreezes_seller() {
		let store = Store::open_in_memory().unwrap();
		let clock = SteppingClock::at(Utc::now());
		let orders = Arc::new(OrderService::new(DefaultReferenceGenerator::new(clock.clone())));

		let order_id = store
			.transact({
				let clock = clock.clone();
				move |scope| {
					let vendor = scope.users().insert("vendor@example.com", "+1")?;
					let counterparty = scope.users().insert("counterparty@example.com", "+2")?;
					scope.virtual_accounts().insert(
						vendor.id,
						"TRON",
						"USDT",
						&Money::parse("10").unwrap(),
						&Money::parse("10").unwrap(),
					)?;
					let method = scope.payment_methods().insert(&UserPaymentMethod {
						id: PaymentMethodId(0),
						user_id: vendor.id,
						method_type: PaymentMethodType::BankAccount,
						bank_name: Some("GTBank".into()),
						provider_id: None,
						rhinoxpay_currency: None,
						is_active: true,
					})?;
					let counterparty_method = scope.payment_methods().insert(&UserPaymentMethod {
						id: PaymentMethodId(0),
						user_id: counterparty.id,
						method_type: PaymentMethodType::BankAccount,
						bank_name: Some("gtbank".into()),
						provider_id: None,
						rhinoxpay_currency: None,
						is_active: true,
					})?;
					let ad = scope.ads().insert(&P2pAd {
						id: exchange_store::AdId(0),
						vendor_user_id: vendor.id,
						ad_type: AdType::Sell,
						crypto_currency: "USDT".into(),
						fiat_currency: "NGN".into(),
						price: Money::parse("1500").unwrap(),
						volume: Money::parse("10").unwrap(),
						min_order: Money::parse("1500").unwrap(),
						max_order: Money::parse("15000").unwrap(),
						auto_accept: false,
						accepted_payment_method_ids: vec![method.id],
						processing_time_minutes: 15,
						status: AdStatus::Available,
						is_online: true,
						orders_received: 0,
					})?;

					let order = orders
						.create_order(
							scope,
							exchange_auth::Principal(counterparty.id),
							ad.id,
							Money::parse("2").unwrap(),
							counterparty_method.id,
							clock.now(),
						)
						.map_err(|e| exchange_store::StoreError::Internal(e.to_string()))?;
					orders
						.accept_order(scope, exchange_auth::Principal(vendor.id), order.id, clock.now())
						.map_err(|e| exchange_store::StoreError::Internal(e.to_string()))?;
					Ok(order.id)
				}
			})
			.await
			.unwrap();

		clock.advance(chrono::Duration::minutes(16));
		let swept = sweep_once(&store, orders, &clock).await;
		assert_eq!(swept, 1);

		let order = store.transact(move |scope| Ok(scope.orders().get(order_id)?)).await.unwrap();
		assert_eq!(order.status, exchange_store::OrderStatus::Expired);
	}
}
