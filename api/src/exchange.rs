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

//! `spec.md` §6 exchange operations: `getRate`, `convert`, `listRates`,
//! `listRatesFromBase`, `setRate`. `setRate` is the one operation in this
//! crate whose principal check is genuinely an admin check rather than a
//! self-service one; callers are responsible for having already verified
//! `caller` holds an admin role before invoking this (`spec.md` §6: "callers
//! cannot pass in a user id other than their own except on clearly-admin
//! operations").

use exchange_money::{Money, FIAT_SCALE};
use exchange_rates::RateService;
use exchange_store::Scope;

use crate::dto::RateView;
use crate::error::DomainError;

pub struct ExchangeService {
	rates: RateService,
}

impl ExchangeService {
	pub fn new() -> Self {
		Self { rates: RateService::new() }
	}

	pub fn get_rate(&self, scope: &Scope<'_>, from: &str, to: &str) -> Result<Money, DomainError> {
		Ok(self.rates.get_rate(scope, from, to)?)
	}

	pub fn convert(&self, scope: &Scope<'_>, amount: &Money, from: &str, to: &str) -> Result<Money, DomainError> {
		Ok(self.rates.convert(scope, amount, from, to, FIAT_SCALE)?)
	}

	pub fn list_rates(&self, scope: &Scope<'_>, active_only: bool) -> Result<Vec<RateView>, DomainError> {
		Ok(self.rates.list(scope, active_only)?.into_iter().map(to_view).collect())
	}

	pub fn list_rates_from_base(&self, scope: &Scope<'_>, base: &str) -> Result<Vec<RateView>, DomainError> {
		Ok(self.rates.list_from_base(scope, base)?.into_iter().map(to_view).collect())
	}

	pub fn set_rate(
		&self,
		scope: &Scope<'_>,
		from: &str,
		to: &str,
		rate: Money,
		inverse_rate: Option<Money>,
	) -> Result<RateView, DomainError> {
		Ok(to_view(self.rates.set_rate(scope, from, to, rate, inverse_rate)?))
	}
}

impl Default for ExchangeService {
	fn default() -> Self {
		Self::new()
	}
}

fn to_view(rate: exchange_store::ExchangeRate) -> RateView {
	RateView {
		from_currency: rate.from_currency,
		to_currency: rate.to_currency,
		rate: rate.rate,
		inverse_rate: rate.inverse_rate,
		active: rate.active,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use exchange_store::Store;

	/// `setRate(a,b,r)` then `getRate(a,b)` returns `r`; `getRate(b,a)`
	/// returns `1/r` (or the stored inverse) — `spec.md` §8 round-trip law.
	#[tokio::test]
	async fn set_rate_round_trips_with_stored_inverse() {
		let store = Store::open_in_memory().unwrap();
		let service = ExchangeService::new();
		let view = store
			.transact(move |scope| {
				Ok(service.set_rate(
					scope,
					"NGN",
					"USD",
					Money::parse("0.0012").unwrap(),
					Some(Money::parse("833.33").unwrap()),
				))
			})
			.await
			.unwrap()
			.unwrap();
		assert_eq!(view.rate, Money::parse("0.0012").unwrap());

		let service = ExchangeService::new();
		let forward = store.transact(move |scope| Ok(service.get_rate(scope, "NGN", "USD"))).await.unwrap().unwrap();
		assert_eq!(forward, Money::parse("0.0012").unwrap());

		let service = ExchangeService::new();
		let inverse = store.transact(move |scope| Ok(service.get_rate(scope, "USD", "NGN"))).await.unwrap().unwrap();
		assert_eq!(inverse, Money::parse("833.33").unwrap());
	}

	/// `convert(1_000_000, NGN, USD) = 1200.00` — `spec.md` §8 scenario 6.
	#[tokio::test]
	async fn convert_uses_direct_rate() {
		let store = Store::open_in_memory().unwrap();
		let service = ExchangeService::new();
		store
			.transact(move |scope| {
				service
					.set_rate(scope, "NGN", "USD", Money::parse("0.0012").unwrap(), Some(Money::parse("833.33").unwrap()))
					.map(|_| ())
					.map_err(|e| exchange_store::StoreError::Internal(e.to_string()))
			})
			.await
			.unwrap();

		let service = ExchangeService::new();
		let converted = store
			.transact(move |scope| Ok(service.convert(scope, &Money::parse("1000000").unwrap(), "NGN", "USD")))
			.await
			.unwrap()
			.unwrap();
		assert_eq!(converted, Money::parse("1200.00").unwrap());
	}
}
