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

//! The order state machine (`spec.md` §4.7). Every transition is guarded, in
//! order, by: principal authorization, current-state validity, balance
//! precondition. Violating any of the three fails without side effect
//! because the whole transition runs inside one caller-provided [`Scope`].

use chrono::{DateTime, Duration, Utc};
use exchange_auth::Principal;
use exchange_clock::ReferenceGenerator;
use exchange_ledger::Ledger;
use exchange_money::{Money, FIAT_SCALE};
use exchange_reservation::ReservationEngine;
use exchange_store::{
	AdStatus, AdType, OrderId, OrderStatus, P2pAd, P2pOrder, P2pStep, PaymentChannel, PaymentMethodId, Scope,
	TransactionStatus, UserId, VirtualAccount, WalletRef,
};
use exchange_transfer::TransferExecutor;

use crate::error::OrderError;
use crate::payment_methods;
use crate::roles;

/// A single user's crypto currency must map to exactly one [`VirtualAccount`]
/// for P2P purposes. `spec.md`'s data model attaches no blockchain to
/// `P2PAd`/`P2POrder`, so multi-chain disambiguation for the same currency is
/// out of scope here (see `DESIGN.md`); a user holding the same currency
/// across more than one chain must consolidate before trading P2P.
fn unique_virtual_account(
	scope: &Scope<'_>,
	user_id: UserId,
	currency: &str,
) -> Result<VirtualAccount, OrderError> {
	let mut matches: Vec<VirtualAccount> =
		scope.virtual_accounts().list_by_user(user_id)?.into_iter().filter(|va| va.currency == currency).collect();
	match matches.len() {
		0 => Err(OrderError::NotFound(format!("no {currency} virtual account for user {user_id}"))),
		1 => Ok(matches.remove(0)),
		_ => Err(OrderError::Internal(format!(
			"user {user_id} holds {currency} on more than one chain; P2P requires a single account"
		))),
	}
}

fn require_status(order: &P2pOrder, expected: OrderStatus, attempted: &'static str) -> Result<(), OrderError> {
	if order.status != expected {
		return Err(OrderError::InvalidTransition { current: order.status, attempted });
	}
	Ok(())
}

pub struct OrderService<R: ReferenceGenerator + Clone> {
	ledger: Ledger<R>,
	reservations: ReservationEngine<R>,
	transfers: TransferExecutor<R>,
}

impl<R: ReferenceGenerator + Clone> OrderService<R> {
	pub fn new(refs: R) -> Self {
		Self {
			ledger: Ledger::new(refs.clone()),
			reservations: ReservationEngine::new(Ledger::new(refs.clone())),
			transfers: TransferExecutor::new(refs),
		}
	}

	fn correlation_for(order_id: OrderId) -> String {
		format!("p2p-order-{}", order_id.0)
	}

	/// (create) -> pending: the counterparty creates an order against a
	/// vendor's standing ad.
	#[allow(clippy::too_many_arguments)]
	#[tracing::instrument(skip(self, scope))]
	pub fn create_order(
		&self,
		scope: &Scope<'_>,
		counterparty: Principal,
		ad_id: exchange_store::AdId,
		crypto_amount: Money,
		payment_method_id: PaymentMethodId,
		now: DateTime<Utc>,
	) -> Result<P2pOrder, OrderError> {
		let ad = scope.ads().get(ad_id)?;
		if ad.status != AdStatus::Available || !ad.is_online {
			return Err(OrderError::InvalidInput("ad is not available".into()));
		}
		validate_ad_invariant(&ad)?;

		if !crypto_amount.is_positive() {
			return Err(OrderError::InvalidInput("crypto amount must be positive".into()));
		}
		let fiat_amount = crypto_amount.mul(&ad.price).round(FIAT_SCALE);
		if fiat_amount < ad.min_order || fiat_amount > ad.max_order {
			return Err(OrderError::InvalidInput(format!(
				"fiat amount {fiat_amount} outside [{}, {}]",
				ad.min_order, ad.max_order
			)));
		}

		let roles = roles::resolve(ad.ad_type, ad.vendor_user_id, counterparty.user_id());

		let seller_va = unique_virtual_account(scope, roles.seller_id, &ad.crypto_currency)?;
		if seller_va.available_balance < crypto_amount {
			return Err(OrderError::InsufficientFunds {
				required: crypto_amount.to_canonical_string(),
				available: seller_va.available_balance.to_canonical_string(),
			});
		}

		if ad.ad_type == AdType::Buy {
			// The vendor is the buyer; the buyer's fiat wallet must already
			// cover the order (`spec.md` §4.7 creation row).
			let buyer_wallet = scope
				.fiat_wallets()
				.get_by_user_currency(roles.buyer_id, &ad.fiat_currency)?
				.ok_or_else(|| OrderError::NotFound(format!("buyer has no {} wallet", ad.fiat_currency)))?;
			if buyer_wallet.available() < fiat_amount {
				return Err(OrderError::InsufficientFunds {
					required: fiat_amount.to_canonical_string(),
					available: buyer_wallet.available().to_canonical_string(),
				});
			}
		}

		let counterparty_method = scope.payment_methods().get(payment_method_id)?;
		let vendor_methods: Vec<_> = ad
			.accepted_payment_method_ids
			.iter()
			.map(|id| scope.payment_methods().get(*id))
			.collect::<Result<_, _>>()?;
		let matched_vendor_method =
			payment_methods::find_match(counterparty.user_id(), &counterparty_method, &vendor_methods)?;

		let payment_channel = match matched_vendor_method.method_type {
			exchange_store::PaymentMethodType::RhinoxpayId => PaymentChannel::RhinoxpayId,
			_ => PaymentChannel::Offline,
		};

		let metadata = serde_json::json!({
			"counterparty_payment_method_id": payment_method_id.0,
			"matched_vendor_payment_method_id": matched_vendor_method.id.0,
		});

		let order = P2pOrder {
			id: OrderId(0),
			ad_id: ad.id,
			vendor_user_id: ad.vendor_user_id,
			counterparty_user_id: counterparty.user_id(),
			ad_type: ad.ad_type,
			crypto_currency: ad.crypto_currency.clone(),
			fiat_currency: ad.fiat_currency.clone(),
			crypto_amount,
			fiat_amount,
			price: ad.price.clone(),
			payment_method_id: matched_vendor_method.id,
			payment_channel,
			status: OrderStatus::Pending,
			buyer_id: roles.buyer_id,
			seller_id: roles.seller_id,
			processing_time_minutes: ad.processing_time_minutes,
			metadata,
			created_at: now,
			accepted_at: None,
			expires_at: None,
			payment_made_at: None,
			payment_received_at: None,
			completed_at: None,
			cancelled_at: None,
		};
		let inserted = scope.orders().insert(&order)?;
		scope.ads().increment_orders_received(ad_id)?;

		if ad.auto_accept {
			return self.accept_order_inner(scope, ad.vendor_user_id, inserted, now);
		}
		Ok(inserted)
	}

	/// pending -> awaiting_payment: vendor accepts (or auto-accept fires at
	/// creation time).
	#[tracing::instrument(skip(self, scope))]
	pub fn accept_order(
		&self,
		scope: &Scope<'_>,
		vendor: Principal,
		order_id: OrderId,
		now: DateTime<Utc>,
	) -> Result<P2pOrder, OrderError> {
		let order = scope.orders().get_for_update(order_id)?;
		if !vendor.is(order.vendor_user_id) {
			return Err(OrderError::Forbidden("only the vendor may accept".into()));
		}
		self.accept_order_inner(scope, vendor.user_id(), order, now)
	}

	fn accept_order_inner(
		&self,
		scope: &Scope<'_>,
		vendor_user_id: UserId,
		order: P2pOrder,
		now: DateTime<Utc>,
	) -> Result<P2pOrder, OrderError> {
		require_status(&order, OrderStatus::Pending, "accept")?;
		let _ = vendor_user_id;

		let seller_va = unique_virtual_account(scope, order.seller_id, &order.crypto_currency)?;
		let correlation = Self::correlation_for(order.id);
		self.reservations.freeze_crypto(scope, seller_va.id, &order.crypto_amount, &correlation, now)?;
		self.reservations.post_step(
			scope,
			WalletRef::Crypto(self.ledger.resolve_crypto_wallet(scope, order.seller_id, &order.crypto_currency)?),
			Money::zero(),
			&order.crypto_currency,
			"p2p order accepted: crypto frozen in escrow",
			serde_json::json!({"order_id": order.id.0, "correlation": correlation}),
			P2pStep::OrderAccepted,
			now,
		)?;

		let mut updated = order;
		updated.status = OrderStatus::AwaitingPayment;
		updated.accepted_at = Some(now);
		updated.expires_at = Some(now + Duration::minutes(updated.processing_time_minutes));
		scope.orders().update(&updated)?;
		Ok(updated)
	}

	/// pending -> cancelled: vendor declines, or either party cancels before
	/// acceptance (no balance effect, nothing was frozen yet).
	#[tracing::instrument(skip(self, scope))]
	pub fn decline_order(
		&self,
		scope: &Scope<'_>,
		vendor: Principal,
		order_id: OrderId,
		now: DateTime<Utc>,
	) -> Result<P2pOrder, OrderError> {
		let order = scope.orders().get_for_update(order_id)?;
		if !vendor.is(order.vendor_user_id) {
			return Err(OrderError::Forbidden("only the vendor may decline".into()));
		}
		require_status(&order, OrderStatus::Pending, "decline")?;

		let mut updated = order;
		updated.status = OrderStatus::Cancelled;
		updated.cancelled_at = Some(now);
		scope.orders().update(&updated)?;
		Ok(updated)
	}

	/// Cancellation for either party. Before acceptance this is a no-op on
	/// balances (mirrors [`decline_order`]); after acceptance it reverses the
	/// seller's freeze.
	#[tracing::instrument(skip(self, scope))]
	pub fn cancel_order(
		&self,
		scope: &Scope<'_>,
		principal: Principal,
		order_id: OrderId,
		now: DateTime<Utc>,
	) -> Result<P2pOrder, OrderError> {
		let order = scope.orders().get_for_update(order_id)?;
		let is_party = principal.is(order.vendor_user_id) || principal.is(order.counterparty_user_id);
		if !is_party {
			return Err(OrderError::Forbidden("only a party to the order may cancel".into()));
		}

		match order.status {
			OrderStatus::Pending => {
				let mut updated = order;
				updated.status = OrderStatus::Cancelled;
				updated.cancelled_at = Some(now);
				scope.orders().update(&updated)?;
				Ok(updated)
			}
			OrderStatus::AwaitingPayment => {
				let seller_va = unique_virtual_account(scope, order.seller_id, &order.crypto_currency)?;
				let correlation = Self::correlation_for(order.id);
				self.reservations.unfreeze_crypto(scope, seller_va.id, &correlation, now)?;

				let mut updated = order;
				updated.status = OrderStatus::Cancelled;
				updated.cancelled_at = Some(now);
				scope.orders().update(&updated)?;
				Ok(updated)
			}
			other => Err(OrderError::InvalidTransition { current: other, attempted: "cancel" }),
		}
	}

	/// awaiting_payment -> payment_made (and, for `rhinoxpay_id`, straight
	/// through to `completed` in the same scope).
	#[tracing::instrument(skip(self, scope))]
	pub fn confirm_payment(
		&self,
		scope: &Scope<'_>,
		buyer: Principal,
		order_id: OrderId,
		now: DateTime<Utc>,
	) -> Result<P2pOrder, OrderError> {
		let order = scope.orders().get_for_update(order_id)?;
		if !buyer.is(order.buyer_id) {
			return Err(OrderError::Forbidden("only the buyer may confirm payment".into()));
		}
		require_status(&order, OrderStatus::AwaitingPayment, "confirm_payment")?;

		let mut updated = order.clone();
		updated.status = OrderStatus::PaymentMade;
		updated.payment_made_at = Some(now);

		match order.payment_channel {
			PaymentChannel::Offline => {
				scope.orders().update(&updated)?;
				Ok(updated)
			}
			PaymentChannel::RhinoxpayId => {
				let buyer_wallet = scope
					.fiat_wallets()
					.get_by_user_currency(order.buyer_id, &order.fiat_currency)?
					.ok_or_else(|| OrderError::NotFound(format!("buyer has no {} wallet", order.fiat_currency)))?;
				let seller_wallet = scope
					.fiat_wallets()
					.get_by_user_currency(order.seller_id, &order.fiat_currency)?
					.ok_or_else(|| OrderError::NotFound(format!("seller has no {} wallet", order.fiat_currency)))?;

				self.transfers.transfer(
					scope,
					buyer_wallet.id,
					seller_wallet.id,
					&order.fiat_amount,
					&order.fiat_currency,
					&Money::zero(),
					"rhinoxpay_id",
					"p2p order fiat settlement",
					serde_json::json!({"order_id": order.id.0}),
					now,
				)?;

				scope.orders().update(&updated)?;
				self.advance_to_coin_release(scope, updated, now)
			}
		}
	}

	/// payment_made -> awaiting_coin_release -> completed: seller confirms
	/// receipt (offline channel only — the `rhinoxpay_id` channel auto-advances
	/// inside [`confirm_payment`]), then crypto releases in the same scope.
	#[tracing::instrument(skip(self, scope))]
	pub fn mark_payment_received(
		&self,
		scope: &Scope<'_>,
		seller: Principal,
		order_id: OrderId,
		now: DateTime<Utc>,
	) -> Result<P2pOrder, OrderError> {
		let order = scope.orders().get_for_update(order_id)?;
		if !seller.is(order.seller_id) {
			return Err(OrderError::Forbidden("only the seller may mark payment received".into()));
		}
		require_status(&order, OrderStatus::PaymentMade, "mark_payment_received")?;

		let mut updated = order;
		updated.payment_received_at = Some(now);
		self.advance_to_coin_release(scope, updated, now)
	}

	fn advance_to_coin_release(
		&self,
		scope: &Scope<'_>,
		mut order: P2pOrder,
		now: DateTime<Utc>,
	) -> Result<P2pOrder, OrderError> {
		order.status = OrderStatus::AwaitingCoinRelease;
		scope.orders().update(&order)?;

		self.post_payment_received_leg(scope, &order, now)?;

		let seller_va = unique_virtual_account(scope, order.seller_id, &order.crypto_currency)?;
		let buyer_va = unique_virtual_account(scope, order.buyer_id, &order.crypto_currency)?;
		let correlation = Self::correlation_for(order.id);

		self.reservations.settle_out_crypto(scope, seller_va.id, &correlation, now)?;
		self.reservations.settle_in_crypto(scope, buyer_va.id, &order.crypto_amount)?;

		let seller_wallet = self.ledger.resolve_crypto_wallet(scope, order.seller_id, &order.crypto_currency)?;
		let buyer_wallet = self.ledger.resolve_crypto_wallet(scope, order.buyer_id, &order.crypto_currency)?;
		self.ledger.post_pair(
			scope,
			seller_wallet,
			buyer_wallet,
			order.crypto_amount.clone(),
			&order.crypto_currency,
			Money::zero(),
			"internal",
			"p2p crypto release",
			serde_json::json!({"order_id": order.id.0}),
			TransactionStatus::Completed,
			(Some(P2pStep::CryptoDebited), Some(P2pStep::CryptoCredited)),
			now,
		)?;

		order.status = OrderStatus::Completed;
		order.completed_at = Some(now);
		scope.orders().update(&order)?;
		Ok(order)
	}

	fn post_payment_received_leg(
		&self,
		scope: &Scope<'_>,
		order: &P2pOrder,
		now: DateTime<Utc>,
	) -> Result<(), OrderError> {
		let wallet = match order.payment_channel {
			PaymentChannel::RhinoxpayId => {
				let seller_wallet = scope
					.fiat_wallets()
					.get_by_user_currency(order.seller_id, &order.fiat_currency)?
					.ok_or_else(|| OrderError::NotFound(format!("seller has no {} wallet", order.fiat_currency)))?;
				WalletRef::Fiat(seller_wallet.id)
			}
			PaymentChannel::Offline => {
				// Offline payment happens outside the ledger; anchor the audit
				// marker on the seller's crypto wallet instead of inventing a
				// fiat leg that never moved.
				self.ledger.resolve_crypto_wallet(scope, order.seller_id, &order.crypto_currency)?
			}
		};
		self.reservations.post_step(
			scope,
			wallet,
			Money::zero(),
			&order.crypto_currency,
			"p2p payment confirmed by seller",
			serde_json::json!({"order_id": order.id.0}),
			P2pStep::PaymentReceived,
			now,
		)?;
		Ok(())
	}

	/// awaiting_payment -> expired, when `now > expires_at`. Reverses the
	/// seller's freeze; no fiat moved. Idempotent under the current-state
	/// guard: re-running on an already-expired order is a no-op because
	/// [`require_status`] rejects it.
	#[tracing::instrument(skip(self, scope))]
	pub fn expire_order(&self, scope: &Scope<'_>, order_id: OrderId, now: DateTime<Utc>) -> Result<P2pOrder, OrderError> {
		let order = scope.orders().get_for_update(order_id)?;
		require_status(&order, OrderStatus::AwaitingPayment, "expire")?;
		let Some(expires_at) = order.expires_at else {
			return Err(OrderError::Internal("awaiting_payment order has no expires_at".into()));
		};
		if now <= expires_at {
			return Err(OrderError::InvalidInput("order has not yet expired".into()));
		}

		let seller_va = unique_virtual_account(scope, order.seller_id, &order.crypto_currency)?;
		let correlation = Self::correlation_for(order.id);
		self.reservations.unfreeze_crypto(scope, seller_va.id, &correlation, now)?;

		let mut updated = order;
		updated.status = OrderStatus::Expired;
		scope.orders().update(&updated)?;
		Ok(updated)
	}

	/// Either party raises a dispute from any non-terminal state. The freeze
	/// (if any) remains untouched; resolution is out of scope (`spec.md`
	/// §4.7).
	#[tracing::instrument(skip(self, scope))]
	pub fn raise_dispute(
		&self,
		scope: &Scope<'_>,
		principal: Principal,
		order_id: OrderId,
	) -> Result<P2pOrder, OrderError> {
		let order = scope.orders().get_for_update(order_id)?;
		let is_party = principal.is(order.vendor_user_id) || principal.is(order.counterparty_user_id);
		if !is_party {
			return Err(OrderError::Forbidden("only a party to the order may dispute".into()));
		}
		if is_terminal(order.status) {
			return Err(OrderError::InvalidTransition { current: order.status, attempted: "dispute" });
		}

		let mut updated = order;
		updated.status = OrderStatus::Disputed;
		scope.orders().update(&updated)?;
		Ok(updated)
	}
}

fn is_terminal(status: OrderStatus) -> bool {
	matches!(
		status,
		OrderStatus::Completed
			| OrderStatus::Cancelled
			| OrderStatus::Expired
			| OrderStatus::Disputed
			| OrderStatus::Refunded
	)
}

/// Invariant A1: `0 < minOrder <= maxOrder`, `minOrder <= volume * price`.
fn validate_ad_invariant(ad: &P2pAd) -> Result<(), OrderError> {
	if !(ad.min_order.is_positive() && ad.min_order <= ad.max_order) {
		return Err(OrderError::Internal(format!(
			"ad {} violates A1: min_order must be positive and <= max_order",
			ad.id
		)));
	}
	if ad.min_order > ad.volume.mul(&ad.price).round(FIAT_SCALE) {
		return Err(OrderError::Internal(format!("ad {} violates A1: min_order exceeds volume * price", ad.id)));
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use exchange_clock::{DefaultReferenceGenerator, SteppingClock};
	use exchange_store::{AdId, AdStatus, PaymentMethodId, PaymentMethodType, Store, UserPaymentMethod};

	struct Fixture {
		store: Store,
		service: OrderService<DefaultReferenceGenerator<SteppingClock>>,
		clock: SteppingClock,
	}

	fn fixture() -> Fixture {
		let clock = SteppingClock::at(Utc::now());
		let service = OrderService::new(DefaultReferenceGenerator::new(clock.clone()));
		Fixture { store: Store::open_in_memory().unwrap(), service, clock }
	}

	fn bank_method(user: UserId, name: &str) -> UserPaymentMethod {
		UserPaymentMethod {
			id: PaymentMethodId(0),
			user_id: user,
			method_type: PaymentMethodType::BankAccount,
			bank_name: Some(name.to_string()),
			provider_id: None,
			rhinoxpay_currency: None,
			is_active: true,
		}
	}

	fn rhinoxpay_method(user: UserId, currency: &str) -> UserPaymentMethod {
		UserPaymentMethod {
			id: PaymentMethodId(0),
			user_id: user,
			method_type: exchange_store::PaymentMethodType::RhinoxpayId,
			bank_name: None,
			provider_id: None,
			rhinoxpay_currency: Some(currency.to_string()),
			is_active: true,
		}
	}

	/// Scenario 1: happy P2P sell, offline payment channel.
	#[tokio::test]
	async fn happy_sell_offline_moves_crypto_seller_to_buyer() {
		let f = fixture();
		let now = f.clock.now();

		let (vendor_id, counterparty_id, ad_id, counterparty_method_id) = f
			.store
			.transact(move |scope| {
				let vendor = scope.users().insert("vendor@example.com", "+1")?;
				let counterparty = scope.users().insert("counterparty@example.com", "+2")?;
				scope.virtual_accounts().insert(
					vendor.id,
					"TRON",
					"USDT",
					&Money::parse("10").unwrap(),
					&Money::parse("10").unwrap(),
				)?;
				scope.virtual_accounts().insert(
					counterparty.id,
					"TRON",
					"USDT",
					&Money::zero(),
					&Money::zero(),
				)?;
				let vendor_method = scope.payment_methods().insert(&bank_method(vendor.id, "GTBank"))?;
				let counterparty_method =
					scope.payment_methods().insert(&bank_method(counterparty.id, "gtbank"))?;
				let ad = scope.ads().insert(&P2pAd {
					id: AdId(0),
					vendor_user_id: vendor.id,
					ad_type: AdType::Sell,
					crypto_currency: "USDT".into(),
					fiat_currency: "NGN".into(),
					price: Money::parse("1500").unwrap(),
					volume: Money::parse("10").unwrap(),
					min_order: Money::parse("1500").unwrap(),
					max_order: Money::parse("15000").unwrap(),
					auto_accept: false,
					accepted_payment_method_ids: vec![vendor_method.id],
					processing_time_minutes: 30,
					status: AdStatus::Available,
					is_online: true,
					orders_received: 0,
				})?;
				Ok((vendor.id, counterparty.id, ad.id, counterparty_method.id))
			})
			.await
			.unwrap();

		let service = &f.service;
		let order_id = f
			.store
			.transact(move |scope| {
				service
					.create_order(
						scope,
						Principal(counterparty_id),
						ad_id,
						Money::parse("2").unwrap(),
						counterparty_method_id,
						now,
					)
					.map(|o| o.id)
					.map_err(|e| exchange_store::StoreError::Internal(e.to_string()))
			})
			.await
			.unwrap();

		f.store
			.transact(move |scope| {
				service
					.accept_order(scope, Principal(vendor_id), order_id, now)
					.map_err(|e| exchange_store::StoreError::Internal(e.to_string()))
			})
			.await
			.unwrap();

		let vendor_va_after_accept = f
			.store
			.transact(move |scope| Ok(scope.virtual_accounts().list_by_user(vendor_id)?.remove(0)))
			.await
			.unwrap();
		assert_eq!(vendor_va_after_accept.account_balance, Money::parse("10").unwrap());
		assert_eq!(vendor_va_after_accept.available_balance, Money::parse("8").unwrap());

		f.store
			.transact(move |scope| {
				service
					.confirm_payment(scope, Principal(counterparty_id), order_id, now)
					.map_err(|e| exchange_store::StoreError::Internal(e.to_string()))
			})
			.await
			.unwrap();

		let completed = f
			.store
			.transact(move |scope| {
				service
					.mark_payment_received(scope, Principal(vendor_id), order_id, now)
					.map_err(|e| exchange_store::StoreError::Internal(e.to_string()))
			})
			.await
			.unwrap();
		assert_eq!(completed.status, OrderStatus::Completed);

		let vendor_va = f
			.store
			.transact(move |scope| Ok(scope.virtual_accounts().list_by_user(vendor_id)?.remove(0)))
			.await
			.unwrap();
		let counterparty_va = f
			.store
			.transact(move |scope| Ok(scope.virtual_accounts().list_by_user(counterparty_id)?.remove(0)))
			.await
			.unwrap();
		assert_eq!(vendor_va.account_balance, Money::parse("8").unwrap());
		assert_eq!(vendor_va.available_balance, Money::parse("8").unwrap());
		assert_eq!(counterparty_va.account_balance, Money::parse("2").unwrap());
		assert_eq!(counterparty_va.available_balance, Money::parse("2").unwrap());
	}

	/// Scenario 2: happy P2P buy, rhinoxpay_id channel auto-settles fiat then
	/// crypto in one `confirm_payment` call.
	#[tokio::test]
	async fn happy_buy_rhinoxpay_auto_settles_fiat_then_crypto() {
		let f = fixture();
		let now = f.clock.now();

		let (vendor_id, counterparty_id, ad_id, counterparty_method_id) = f
			.store
			.transact(move |scope| {
				let vendor = scope.users().insert("vendor2@example.com", "+3")?;
				let counterparty = scope.users().insert("counterparty2@example.com", "+4")?;
				scope.fiat_wallets().insert(vendor.id, "NGN", &Money::parse("100000").unwrap(), &Money::zero())?;
				scope.fiat_wallets().insert(counterparty.id, "NGN", &Money::zero(), &Money::zero())?;
				scope.virtual_accounts().insert(
					counterparty.id,
					"TRON",
					"USDT",
					&Money::parse("5").unwrap(),
					&Money::parse("5").unwrap(),
				)?;
				scope.virtual_accounts().insert(vendor.id, "TRON", "USDT", &Money::zero(), &Money::zero())?;

				let vendor_method = scope.payment_methods().insert(&rhinoxpay_method(vendor.id, "NGN"))?;
				let counterparty_method =
					scope.payment_methods().insert(&rhinoxpay_method(counterparty.id, "NGN"))?;
				let ad = scope.ads().insert(&P2pAd {
					id: AdId(0),
					vendor_user_id: vendor.id,
					ad_type: AdType::Buy,
					crypto_currency: "USDT".into(),
					fiat_currency: "NGN".into(),
					price: Money::parse("1500").unwrap(),
					volume: Money::parse("10").unwrap(),
					min_order: Money::parse("1500").unwrap(),
					max_order: Money::parse("15000").unwrap(),
					auto_accept: true,
					accepted_payment_method_ids: vec![vendor_method.id],
					processing_time_minutes: 30,
					status: AdStatus::Available,
					is_online: true,
					orders_received: 0,
				})?;
				Ok((vendor.id, counterparty.id, ad.id, counterparty_method.id))
			})
			.await
			.unwrap();

		let service = &f.service;
		let order = f
			.store
			.transact(move |scope| {
				service
					.create_order(
						scope,
						Principal(counterparty_id),
						ad_id,
						Money::parse("2").unwrap(),
						counterparty_method_id,
						now,
					)
					.map_err(|e| exchange_store::StoreError::Internal(e.to_string()))
			})
			.await
			.unwrap();
		// auto_accept fired inside create_order
		assert_eq!(order.status, OrderStatus::AwaitingPayment);
		let order_id = order.id;

		let completed = f
			.store
			.transact(move |scope| {
				service
					.confirm_payment(scope, Principal(counterparty_id), order_id, now)
					.map_err(|e| exchange_store::StoreError::Internal(e.to_string()))
			})
			.await
			.unwrap();
		assert_eq!(completed.status, OrderStatus::Completed);

		let vendor_fiat = f
			.store
			.transact(move |scope| Ok(scope.fiat_wallets().get_by_user_currency(vendor_id, "NGN")?.unwrap()))
			.await
			.unwrap();
		let counterparty_fiat = f
			.store
			.transact(move |scope| Ok(scope.fiat_wallets().get_by_user_currency(counterparty_id, "NGN")?.unwrap()))
			.await
			.unwrap();
		assert_eq!(vendor_fiat.balance, Money::parse("97000").unwrap());
		assert_eq!(counterparty_fiat.balance, Money::parse("3000").unwrap());

		let vendor_va = f
			.store
			.transact(move |scope| Ok(scope.virtual_accounts().list_by_user(vendor_id)?.remove(0)))
			.await
			.unwrap();
		let counterparty_va = f
			.store
			.transact(move |scope| Ok(scope.virtual_accounts().list_by_user(counterparty_id)?.remove(0)))
			.await
			.unwrap();
		assert_eq!(vendor_va.account_balance, Money::parse("2").unwrap());
		assert_eq!(counterparty_va.account_balance, Money::parse("3").unwrap());
		assert_eq!(counterparty_va.available_balance, Money::parse("3").unwrap());
	}

	/// Scenario 3: a second order's accept fails once the seller's available
	/// balance has already been consumed by another accepted order.
	#[tokio::test]
	async fn accept_fails_with_insufficient_funds_once_balance_consumed() {
		let f = fixture();
		let now = f.clock.now();

		let (vendor_id, counterparty_id, ad_id, method_id) = f
			.store
			.transact(move |scope| {
				let vendor = scope.users().insert("vendor3@example.com", "+5")?;
				let counterparty = scope.users().insert("counterparty3@example.com", "+6")?;
				scope.virtual_accounts().insert(
					vendor.id,
					"TRON",
					"USDT",
					&Money::parse("3").unwrap(),
					&Money::parse("3").unwrap(),
				)?;
				let vendor_method = scope.payment_methods().insert(&bank_method(vendor.id, "GTBank"))?;
				let counterparty_method =
					scope.payment_methods().insert(&bank_method(counterparty.id, "gtbank"))?;
				let ad = scope.ads().insert(&P2pAd {
					id: AdId(0),
					vendor_user_id: vendor.id,
					ad_type: AdType::Sell,
					crypto_currency: "USDT".into(),
					fiat_currency: "NGN".into(),
					price: Money::parse("1500").unwrap(),
					volume: Money::parse("10").unwrap(),
					min_order: Money::parse("1500").unwrap(),
					max_order: Money::parse("15000").unwrap(),
					auto_accept: false,
					accepted_payment_method_ids: vec![vendor_method.id],
					processing_time_minutes: 30,
					status: AdStatus::Available,
					is_online: true,
					orders_received: 0,
				})?;
				Ok((vendor.id, counterparty.id, ad.id, counterparty_method.id))
			})
			.await
			.unwrap();

		let service = &f.service;
		// First order consumes all 3 available USDT.
		let first_order_id = f
			.store
			.transact(move |scope| {
				service
					.create_order(scope, Principal(counterparty_id), ad_id, Money::parse("3").unwrap(), method_id, now)
					.map(|o| o.id)
					.map_err(|e| exchange_store::StoreError::Internal(e.to_string()))
			})
			.await
			.unwrap();
		f.store
			.transact(move |scope| {
				service
					.accept_order(scope, Principal(vendor_id), first_order_id, now)
					.map_err(|e| exchange_store::StoreError::Internal(e.to_string()))
			})
			.await
			.unwrap();

		// Second order was created before the first was accepted; its accept
		// must now fail because no available balance remains.
		let second_order_id = f
			.store
			.transact(move |scope| {
				service
					.create_order(scope, Principal(counterparty_id), ad_id, Money::parse("2").unwrap(), method_id, now)
					.map(|o| o.id)
					.map_err(|e| exchange_store::StoreError::Internal(e.to_string()))
			})
			.await
			.unwrap();

		let result = f
			.store
			.transact(move |scope| Ok(service.accept_order(scope, Principal(vendor_id), second_order_id, now)))
			.await
			.unwrap();
		assert!(matches!(result, Err(OrderError::InsufficientFunds { .. })));

		let second_order = f.store.transact(move |scope| Ok(scope.orders().get(second_order_id)?)).await.unwrap();
		assert_eq!(second_order.status, OrderStatus::Pending);
	}

	/// Scenario 5: cancelling an accepted order unfreezes exactly the
	/// cryptoAmount and leaves no other escrow behind.
	#[tokio::test]
	async fn cancel_after_accept_unfreezes_seller() {
		let f = fixture();
		let now = f.clock.now();

		let (vendor_id, counterparty_id, ad_id, method_id) = f
			.store
			.transact(move |scope| {
				let vendor = scope.users().insert("vendor4@example.com", "+7")?;
				let counterparty = scope.users().insert("counterparty4@example.com", "+8")?;
				scope.virtual_accounts().insert(
					vendor.id,
					"TRON",
					"USDT",
					&Money::parse("10").unwrap(),
					&Money::parse("10").unwrap(),
				)?;
				let vendor_method = scope.payment_methods().insert(&bank_method(vendor.id, "GTBank"))?;
				let counterparty_method =
					scope.payment_methods().insert(&bank_method(counterparty.id, "gtbank"))?;
				let ad = scope.ads().insert(&P2pAd {
					id: AdId(0),
					vendor_user_id: vendor.id,
					ad_type: AdType::Sell,
					crypto_currency: "USDT".into(),
					fiat_currency: "NGN".into(),
					price: Money::parse("1500").unwrap(),
					volume: Money::parse("10").unwrap(),
					min_order: Money::parse("1500").unwrap(),
					max_order: Money::parse("15000").unwrap(),
					auto_accept: false,
					accepted_payment_method_ids: vec![vendor_method.id],
					processing_time_minutes: 30,
					status: AdStatus::Available,
					is_online: true,
					orders_received: 0,
				})?;
				Ok((vendor.id, counterparty.id, ad.id, counterparty_method.id))
			})
			.await
			.unwrap();

		let service = &f.service;
		let order_id = f
			.store
			.transact(move |scope| {
				service
					.create_order(scope, Principal(counterparty_id), ad_id, Money::parse("2").unwrap(), method_id, now)
					.map(|o| o.id)
					.map_err(|e| exchange_store::StoreError::Internal(e.to_string()))
			})
			.await
			.unwrap();
		f.store
			.transact(move |scope| {
				service
					.accept_order(scope, Principal(vendor_id), order_id, now)
					.map_err(|e| exchange_store::StoreError::Internal(e.to_string()))
			})
			.await
			.unwrap();

		f.store
			.transact(move |scope| {
				service
					.cancel_order(scope, Principal(counterparty_id), order_id, now)
					.map_err(|e| exchange_store::StoreError::Internal(e.to_string()))
			})
			.await
			.unwrap();

		let vendor_va = f
			.store
			.transact(move |scope| Ok(scope.virtual_accounts().list_by_user(vendor_id)?.remove(0)))
			.await
			.unwrap();
		assert_eq!(vendor_va.account_balance, Money::parse("10").unwrap());
		assert_eq!(vendor_va.available_balance, Money::parse("10").unwrap());
		assert_eq!(vendor_va.escrowed(), Money::zero());
	}

	/// Replaying an accept on an already-accepted order is a no-op:
	/// `InvalidTransition`, never a double-freeze.
	#[tokio::test]
	async fn replaying_accept_is_rejected_without_double_freeze() {
		let f = fixture();
		let now = f.clock.now();

		let (vendor_id, counterparty_id, ad_id, method_id) = f
			.store
			.transact(move |scope| {
				let vendor = scope.users().insert("vendor5@example.com", "+9")?;
				let counterparty = scope.users().insert("counterparty5@example.com", "+10")?;
				scope.virtual_accounts().insert(
					vendor.id,
					"TRON",
					"USDT",
					&Money::parse("10").unwrap(),
					&Money::parse("10").unwrap(),
				)?;
				let vendor_method = scope.payment_methods().insert(&bank_method(vendor.id, "GTBank"))?;
				let counterparty_method =
					scope.payment_methods().insert(&bank_method(counterparty.id, "gtbank"))?;
				let ad = scope.ads().insert(&P2pAd {
					id: AdId(0),
					vendor_user_id: vendor.id,
					ad_type: AdType::Sell,
					crypto_currency: "USDT".into(),
					fiat_currency: "NGN".into(),
					price: Money::parse("1500").unwrap(),
					volume: Money::parse("10").unwrap(),
					min_order: Money::parse("1500").unwrap(),
					max_order: Money::parse("15000").unwrap(),
					auto_accept: false,
					accepted_payment_method_ids: vec![vendor_method.id],
					processing_time_minutes: 30,
					status: AdStatus::Available,
					is_online: true,
					orders_received: 0,
				})?;
				Ok((vendor.id, counterparty.id, ad.id, counterparty_method.id))
			})
			.await
			.unwrap();

		let service = &f.service;
		let order_id = f
			.store
			.transact(move |scope| {
				service
					.create_order(scope, Principal(counterparty_id), ad_id, Money::parse("2").unwrap(), method_id, now)
					.map(|o| o.id)
					.map_err(|e| exchange_store::StoreError::Internal(e.to_string()))
			})
			.await
			.unwrap();
		f.store
			.transact(move |scope| {
				service
					.accept_order(scope, Principal(vendor_id), order_id, now)
					.map_err(|e| exchange_store::StoreError::Internal(e.to_string()))
			})
			.await
			.unwrap();

		let replay = f
			.store
			.transact(move |scope| Ok(service.accept_order(scope, Principal(vendor_id), order_id, now)))
			.await
			.unwrap();
		assert!(matches!(replay, Err(OrderError::InvalidTransition { .. })));

		let vendor_va = f
			.store
			.transact(move |scope| Ok(scope.virtual_accounts().list_by_user(vendor_id)?.remove(0)))
			.await
			.unwrap();
		assert_eq!(vendor_va.available_balance, Money::parse("8").unwrap());
	}

	/// O2: an order's fiat amount must fall within [minOrder, maxOrder];
	/// exactly at the boundary is accepted.
	#[tokio::test]
	async fn order_exactly_at_min_order_boundary_is_accepted() {
		let f = fixture();
		let now = f.clock.now();

		let (counterparty_id, ad_id, method_id) = f
			.store
			.transact(move |scope| {
				let vendor = scope.users().insert("vendor6@example.com", "+11")?;
				let counterparty = scope.users().insert("counterparty6@example.com", "+12")?;
				scope.virtual_accounts().insert(
					vendor.id,
					"TRON",
					"USDT",
					&Money::parse("10").unwrap(),
					&Money::parse("10").unwrap(),
				)?;
				let vendor_method = scope.payment_methods().insert(&bank_method(vendor.id, "GTBank"))?;
				let counterparty_method =
					scope.payment_methods().insert(&bank_method(counterparty.id, "gtbank"))?;
				let ad = scope.ads().insert(&P2pAd {
					id: AdId(0),
					vendor_user_id: vendor.id,
					ad_type: AdType::Sell,
					crypto_currency: "USDT".into(),
					fiat_currency: "NGN".into(),
					price: Money::parse("1500").unwrap(),
					volume: Money::parse("10").unwrap(),
					min_order: Money::parse("1500").unwrap(),
					max_order: Money::parse("15000").unwrap(),
					auto_accept: false,
					accepted_payment_method_ids: vec![vendor_method.id],
					processing_time_minutes: 30,
					status: AdStatus::Available,
					is_online: true,
					orders_received: 0,
				})?;
				Ok((counterparty.id, ad.id, counterparty_method.id))
			})
			.await
			.unwrap();

		let service = &f.service;
		// min_order = 1500, price = 1500 => cryptoAmount = 1 exactly hits it.
		let order = f
			.store
			.transact(move |scope| {
				service
					.create_order(scope, Principal(counterparty_id), ad_id, Money::parse("1").unwrap(), method_id, now)
					.map_err(|e| exchange_store::StoreError::Internal(e.to_string()))
			})
			.await
			.unwrap();
		assert_eq!(order.fiat_amount, Money::parse("1500.00").unwrap());
	}
}
