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

//! `spec.md` §6 ad operations: the vendor-facing CRUD (`createAd`,
//! `listMyAds`, `getAd`, `updateAd`, `updateAdStatus`) and the public browse
//! surface (`browseAds`, `getAdPublic`, `getUserMatchingPaymentMethods`).

use exchange_auth::Principal;
use exchange_orders::find_match;
use exchange_store::{AdId, AdStatus, P2pAd, Scope};

use crate::dto::{AdFilters, AdPublicView, AdView, CreateAdRequest, PaymentMethodView, UpdateAdRequest};
use crate::error::DomainError;

pub struct AdService;

impl AdService {
	pub fn new() -> Self {
		Self
	}

	/// Invariant A1: `0 < minOrder <= maxOrder`, `minOrder <= volume * price`.
	fn validate_invariant(ad: &P2pAd) -> Result<(), DomainError> {
		if !ad.min_order.is_positive() || ad.min_order > ad.max_order {
			return Err(DomainError::InvalidInput("require 0 < min_order <= max_order".into()));
		}
		if ad.min_order > ad.volume.mul(&ad.price) {
			return Err(DomainError::InvalidInput("min_order must be reachable within volume * price".into()));
		}
		Ok(())
	}

	#[tracing::instrument(skip(self, scope, req))]
	pub fn create_ad(
		&self,
		scope: &Scope<'_>,
		vendor: Principal,
		req: CreateAdRequest,
	) -> Result<AdView, DomainError> {
		for id in &req.accepted_payment_method_ids {
			let method = scope.payment_methods().get(*id)?;
			if method.user_id != vendor.user_id() {
				return Err(DomainError::Forbidden("accepted payment method does not belong to the vendor".into()));
			}
		}
		let ad = P2pAd {
			id: AdId(0),
			vendor_user_id: vendor.user_id(),
			ad_type: req.ad_type,
			crypto_currency: req.crypto_currency,
			fiat_currency: req.fiat_currency,
			price: req.price,
			volume: req.volume,
			min_order: req.min_order,
			max_order: req.max_order,
			auto_accept: req.auto_accept,
			accepted_payment_method_ids: req.accepted_payment_method_ids,
			processing_time_minutes: req.processing_time_minutes,
			status: AdStatus::Available,
			is_online: true,
			orders_received: 0,
		};
		Self::validate_invariant(&ad)?;
		Ok(to_view(scope.ads().insert(&ad)?))
	}

	#[tracing::instrument(skip(self, scope))]
	pub fn list_my_ads(
		&self,
		scope: &Scope<'_>,
		vendor: Principal,
		filters: &AdFilters,
	) -> Result<Vec<AdView>, DomainError> {
		Ok(scope
			.ads()
			.list_by_vendor(vendor.user_id())?
			.into_iter()
			.filter(|ad| matches_filters(ad, filters))
			.map(to_view)
			.collect())
	}

	pub fn get_ad(&self, scope: &Scope<'_>, id: AdId) -> Result<AdView, DomainError> {
		Ok(to_view(scope.ads().get(id)?))
	}

	#[tracing::instrument(skip(self, scope, req))]
	pub fn update_ad(
		&self,
		scope: &Scope<'_>,
		vendor: Principal,
		id: AdId,
		req: UpdateAdRequest,
	) -> Result<AdView, DomainError> {
		let mut ad = scope.ads().get(id)?;
		if ad.vendor_user_id != vendor.user_id() {
			return Err(DomainError::Forbidden("only the owning vendor may update this ad".into()));
		}
		if let Some(v) = req.price {
			ad.price = v;
		}
		if let Some(v) = req.volume {
			ad.volume = v;
		}
		if let Some(v) = req.min_order {
			ad.min_order = v;
		}
		if let Some(v) = req.max_order {
			ad.max_order = v;
		}
		if let Some(v) = req.auto_accept {
			ad.auto_accept = v;
		}
		if let Some(v) = req.accepted_payment_method_ids {
			ad.accepted_payment_method_ids = v;
		}
		if let Some(v) = req.processing_time_minutes {
			ad.processing_time_minutes = v;
		}
		if let Some(v) = req.is_online {
			ad.is_online = v;
		}
		Self::validate_invariant(&ad)?;
		scope.ads().update(&ad)?;
		Ok(to_view(ad))
	}

	#[tracing::instrument(skip(self, scope))]
	pub fn update_ad_status(
		&self,
		scope: &Scope<'_>,
		vendor: Principal,
		id: AdId,
		status: AdStatus,
	) -> Result<AdView, DomainError> {
		let mut ad = scope.ads().get(id)?;
		if ad.vendor_user_id != vendor.user_id() {
			return Err(DomainError::Forbidden("only the owning vendor may change this ad's status".into()));
		}
		ad.status = status;
		scope.ads().update(&ad)?;
		Ok(to_view(ad))
	}

	#[tracing::instrument(skip(self, scope))]
	pub fn browse_ads(&self, scope: &Scope<'_>, filters: &AdFilters) -> Result<Vec<AdPublicView>, DomainError> {
		Ok(scope
			.ads()
			.list_available()?
			.into_iter()
			.filter(|ad| matches_filters(ad, filters))
			.map(to_public_view)
			.collect())
	}

	pub fn get_ad_public(&self, scope: &Scope<'_>, id: AdId) -> Result<AdPublicView, DomainError> {
		Ok(to_public_view(scope.ads().get(id)?))
	}

	/// Returns the caller's own payment methods that would match this ad's
	/// accepted methods, using the same matching rules `createOrder` applies
	/// (`spec.md` §4.8) without mutating anything.
	#[tracing::instrument(skip(self, scope))]
	pub fn get_user_matching_payment_methods(
		&self,
		scope: &Scope<'_>,
		caller: Principal,
		ad_id: AdId,
	) -> Result<Vec<PaymentMethodView>, DomainError> {
		let ad = scope.ads().get(ad_id)?;
		let vendor_methods: Vec<_> =
			ad.accepted_payment_method_ids.iter().map(|id| scope.payment_methods().get(*id)).collect::<Result<_, _>>()?;
		let user_methods = scope.payment_methods().list_by_user(caller.user_id())?;
		let matches = user_methods
			.into_iter()
			.filter(|m| find_match(caller.user_id(), m, &vendor_methods).is_ok())
			.map(to_method_view)
			.collect();
		Ok(matches)
	}
}

impl Default for AdService {
	fn default() -> Self {
		Self::new()
	}
}

fn matches_filters(ad: &P2pAd, filters: &AdFilters) -> bool {
	if let Some(status) = filters.status {
		if ad.status != status {
			return false;
		}
	}
	if let Some(crypto) = &filters.crypto_currency {
		if &ad.crypto_currency != crypto {
			return false;
		}
	}
	if let Some(fiat) = &filters.fiat_currency {
		if &ad.fiat_currency != fiat {
			return false;
		}
	}
	true
}

fn to_view(ad: P2pAd) -> AdView {
	AdView {
		id: ad.id,
		vendor_user_id: ad.vendor_user_id,
		ad_type: ad.ad_type,
		crypto_currency: ad.crypto_currency,
		fiat_currency: ad.fiat_currency,
		price: ad.price,
		volume: ad.volume,
		min_order: ad.min_order,
		max_order: ad.max_order,
		auto_accept: ad.auto_accept,
		accepted_payment_method_ids: ad.accepted_payment_method_ids,
		processing_time_minutes: ad.processing_time_minutes,
		status: ad.status,
		is_online: ad.is_online,
		orders_received: ad.orders_received,
	}
}

/// Inverts `adType` to the action a browsing user would take, per `spec.md`
/// §4.6: a vendor's BUY ad is what the counterparty *sells* into.
fn to_public_view(ad: P2pAd) -> AdPublicView {
	let user_action = match ad.ad_type {
		exchange_store::AdType::Buy => "sell",
		exchange_store::AdType::Sell => "buy",
	};
	AdPublicView { ad: to_view(ad), user_action }
}

fn to_method_view(m: exchange_store::UserPaymentMethod) -> PaymentMethodView {
	PaymentMethodView {
		id: m.id,
		method_type: m.method_type,
		bank_name: m.bank_name,
		provider_id: m.provider_id,
		rhinoxpay_currency: m.rhinoxpay_currency,
		is_active: m.is_active,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use exchange_money::Money;
	use exchange_store::{PaymentMethodId, Store};

	fn bank_request(method_id: PaymentMethodId) -> CreateAdRequest {
		CreateAdRequest {
			ad_type: exchange_store::AdType::Sell,
			crypto_currency: "USDT".into(),
			fiat_currency: "NGN".into(),
			price: Money::parse("1500").unwrap(),
			volume: Money::parse("10").unwrap(),
			min_order: Money::parse("1500").unwrap(),
			max_order: Money::parse("15000").unwrap(),
			auto_accept: false,
			accepted_payment_method_ids: vec![method_id],
			processing_time_minutes: 30,
		}
	}

	#[tokio::test]
	async fn create_ad_rejects_min_order_above_volume_times_price() {
		let store = Store::open_in_memory().unwrap();
		let (vendor_id, method_id) = store
			.transact(|scope| {
				let vendor = scope.users().insert("v@example.com", "+1")?;
				let method = scope.payment_methods().insert(&exchange_store::UserPaymentMethod {
					id: PaymentMethodId(0),
					user_id: vendor.id,
					method_type: exchange_store::PaymentMethodType::BankAccount,
					bank_name: Some("GTBank".into()),
					provider_id: None,
					rhinoxpay_currency: None,
					is_active: true,
				})?;
				Ok((vendor.id, method.id))
			})
			.await
			.unwrap();

		let service = AdService::new();
		let caller = Principal(vendor_id);
		let mut req = bank_request(method_id);
		req.min_order = Money::parse("999999").unwrap();
		let result = store.transact(move |scope| Ok(service.create_ad(scope, caller, req))).await.unwrap();
		assert!(matches!(result, Err(DomainError::InvalidInput(_))));
	}

	#[tokio::test]
	async fn browse_ads_inverts_ad_type_to_user_action() {
		let store = Store::open_in_memory().unwrap();
		let (vendor_id, method_id) = store
			.transact(|scope| {
				let vendor = scope.users().insert("v2@example.com", "+2")?;
				let method = scope.payment_methods().insert(&exchange_store::UserPaymentMethod {
					id: PaymentMethodId(0),
					user_id: vendor.id,
					method_type: exchange_store::PaymentMethodType::BankAccount,
					bank_name: Some("GTBank".into()),
					provider_id: None,
					rhinoxpay_currency: None,
					is_active: true,
				})?;
				Ok((vendor.id, method.id))
			})
			.await
			.unwrap();

		let service = AdService::new();
		let caller = Principal(vendor_id);
		let req = bank_request(method_id);
		store.transact(move |scope| service.create_ad(scope, caller, req).map(|_| ()).map_err(|e| exchange_store::StoreError::Internal(e.to_string()))).await.unwrap();

		let service = AdService::new();
		let views = store.transact(move |scope| Ok(service.browse_ads(scope, &AdFilters::default()))).await.unwrap().unwrap();
		assert_eq!(views.len(), 1);
		// The ad is a vendor SELL ad, so the browsing user's action is "buy".
		assert_eq!(views[0].user_action, "buy");
	}
}
