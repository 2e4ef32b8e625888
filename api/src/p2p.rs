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

//! `spec.md` §6 P2P order operations: the user-facing `createOrder`,
//! `listMyOrders`, `getOrder`, `getUserProfile`, and the state-transition
//! triggers `acceptOrder`/`declineOrder`/`confirmPayment`/
//! `markPaymentReceived`/`cancelOrder`. Thin wrapping over
//! [`exchange_orders::OrderService`]: this module owns nothing but DTO
//! translation and the `now` the caller's [`exchange_clock::Clock`] hands it.

use chrono::{DateTime, Utc};
use exchange_auth::Principal;
use exchange_clock::ReferenceGenerator;
use exchange_money::Money;
use exchange_orders::OrderService;
use exchange_store::{OrderId, P2pOrder, PaymentMethodId, Scope};

use crate::dto::{OrderFilters, OrderView, UserProfileView};
use crate::error::DomainError;

pub struct OrderFacade<R: ReferenceGenerator + Clone> {
	orders: OrderService<R>,
}

impl<R: ReferenceGenerator + Clone> OrderFacade<R> {
	pub fn new(refs: R) -> Self {
		Self { orders: OrderService::new(refs) }
	}

	#[tracing::instrument(skip(self, scope))]
	pub fn create_order(
		&self,
		scope: &Scope<'_>,
		counterparty: Principal,
		ad_id: exchange_store::AdId,
		crypto_amount: Money,
		payment_method_id: PaymentMethodId,
		now: DateTime<Utc>,
	) -> Result<OrderView, DomainError> {
		Ok(to_view(self.orders.create_order(scope, counterparty, ad_id, crypto_amount, payment_method_id, now)?))
	}

	#[tracing::instrument(skip(self, scope))]
	pub fn list_my_orders(
		&self,
		scope: &Scope<'_>,
		caller: Principal,
		filters: &OrderFilters,
	) -> Result<Vec<OrderView>, DomainError> {
		Ok(scope
			.orders()
			.list_by_user(caller.user_id())?
			.into_iter()
			.filter(|o| filters.status.map_or(true, |want| want == o.status))
			.map(to_view)
			.collect())
	}

	#[tracing::instrument(skip(self, scope))]
	pub fn get_order(&self, scope: &Scope<'_>, caller: Principal, id: OrderId) -> Result<OrderView, DomainError> {
		let order = scope.orders().get(id)?;
		if !caller.is(order.vendor_user_id) && !caller.is(order.counterparty_user_id) {
			return Err(DomainError::Forbidden("only a party to the order may view it".into()));
		}
		Ok(to_view(order))
	}

	pub fn get_user_profile(&self, scope: &Scope<'_>, caller: Principal) -> Result<UserProfileView, DomainError> {
		let user = scope.users().get(caller.user_id())?;
		Ok(UserProfileView {
			id: user.id,
			email: user.email,
			phone: user.phone,
			email_verified: user.email_verified,
			phone_verified: user.phone_verified,
			kyc_verified: user.kyc_verified,
		})
	}

	pub fn accept_order(
		&self,
		scope: &Scope<'_>,
		vendor: Principal,
		id: OrderId,
		now: DateTime<Utc>,
	) -> Result<OrderView, DomainError> {
		Ok(to_view(self.orders.accept_order(scope, vendor, id, now)?))
	}

	pub fn decline_order(
		&self,
		scope: &Scope<'_>,
		vendor: Principal,
		id: OrderId,
		now: DateTime<Utc>,
	) -> Result<OrderView, DomainError> {
		Ok(to_view(self.orders.decline_order(scope, vendor, id, now)?))
	}

	pub fn confirm_payment(
		&self,
		scope: &Scope<'_>,
		buyer: Principal,
		id: OrderId,
		now: DateTime<Utc>,
	) -> Result<OrderView, DomainError> {
		Ok(to_view(self.orders.confirm_payment(scope, buyer, id, now)?))
	}

	pub fn mark_payment_received(
		&self,
		scope: &Scope<'_>,
		seller: Principal,
		id: OrderId,
		now: DateTime<Utc>,
	) -> Result<OrderView, DomainError> {
		Ok(to_view(self.orders.mark_payment_received(scope, seller, id, now)?))
	}

	pub fn cancel_order(
		&self,
		scope: &Scope<'_>,
		principal: Principal,
		id: OrderId,
		now: DateTime<Utc>,
	) -> Result<OrderView, DomainError> {
		Ok(to_view(self.orders.cancel_order(scope, principal, id, now)?))
	}
}

fn to_view(order: P2pOrder) -> OrderView {
	OrderView {
		id: order.id,
		ad_id: order.ad_id,
		vendor_user_id: order.vendor_user_id,
		counterparty_user_id: order.counterparty_user_id,
		buyer_id: order.buyer_id,
		seller_id: order.seller_id,
		crypto_currency: order.crypto_currency,
		fiat_currency: order.fiat_currency,
		crypto_amount: order.crypto_amount,
		fiat_amount: order.fiat_amount,
		price: order.price,
		payment_method_id: order.payment_method_id,
		payment_channel: order.payment_channel,
		status: order.status,
		created_at: order.created_at,
		accepted_at: order.accepted_at,
		expires_at: order.expires_at,
		payment_made_at: order.payment_made_at,
		payment_received_at: order.payment_received_at,
		completed_at: order.completed_at,
		cancelled_at: order.cancelled_at,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use exchange_clock::{DefaultReferenceGenerator, SteppingClock};
	use exchange_store::{AdId, AdStatus, AdType, P2pAd, PaymentMethodType, Store, UserPaymentMethod};

	fn fixture_now() -> DateTime<Utc> {
		DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z").unwrap().with_timezone(&Utc)
	}

	#[tokio::test]
	async fn get_order_forbids_non_parties() {
		let store = Store::open_in_memory().unwrap();
		let now = fixture_now();
		let clock = SteppingClock::at(now);
		let refs = DefaultReferenceGenerator::new(clock);
		let facade = OrderFacade::new(refs);

		let (vendor_id, counterparty_id, stranger_id, ad_id, method_id) = store
			.transact(move |scope| {
				let vendor = scope.users().insert("v@example.com", "+1")?;
				let counterparty = scope.users().insert("c@example.com", "+2")?;
				let stranger = scope.users().insert("s@example.com", "+3")?;
				scope.virtual_accounts().insert(
					vendor.id,
					"TRON",
					"USDT",
					&Money::parse("10").unwrap(),
					&Money::parse("10").unwrap(),
				)?;
				let vendor_method = scope.payment_methods().insert(&UserPaymentMethod {
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
				Ok((vendor.id, counterparty.id, stranger.id, ad.id, counterparty_method.id))
			})
			.await
			.unwrap();

		let order_id = store
			.transact(move |scope| {
				facade
					.create_order(scope, Principal(counterparty_id), ad_id, Money::parse("2").unwrap(), method_id, now)
					.map(|o| o.id)
					.map_err(|e| exchange_store::StoreError::Internal(e.to_string()))
			})
			.await
			.unwrap();

		let clock = SteppingClock::at(now);
		let refs = DefaultReferenceGenerator::new(clock);
		let facade = OrderFacade::new(refs);
		let forbidden = store
			.transact(move |scope| Ok(facade.get_order(scope, Principal(stranger_id), order_id)))
			.await
			.unwrap();
		assert!(matches!(forbidden, Err(DomainError::Forbidden(_))));

		let clock = SteppingClock::at(now);
		let refs = DefaultReferenceGenerator::new(clock);
		let facade = OrderFacade::new(refs);
		let allowed =
			store.transact(move |scope| Ok(facade.get_order(scope, Principal(vendor_id), order_id))).await.unwrap();
		assert!(allowed.is_ok());
	}
}
