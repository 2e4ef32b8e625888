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

//! Read-through exchange-rate resolution (`spec.md` §4.5). The P2P engine
//! never calls into this crate: P2P settles at the ad's frozen `price`. This
//! is used only by the Conversion transaction path and the History
//! Aggregator's USD normalization.

use exchange_money::{Money, MoneyError};
use exchange_store::{ExchangeRate, Scope, StoreError};

/// Scale used for a reciprocal rate computed on the fly (`1 / rate`), distinct
/// from the scale `convert` uses for the resulting amount.
pub const RATE_SCALE: i64 = 8;

#[derive(Debug, thiserror::Error)]
pub enum RateError {
	#[error("rate unavailable for {from} -> {to}")]
	RateUnavailable { from: String, to: String },
	#[error("invalid amount: {0}")]
	InvalidAmount(#[from] MoneyError),
	#[error("internal rate error: {0}")]
	Internal(String),
}

impl From<StoreError> for RateError {
	fn from(err: StoreError) -> Self {
		match err {
			StoreError::NotFound(m) => RateError::Internal(format!("rate lookup not found: {m}")),
			other => RateError::Internal(other.to_string()),
		}
	}
}

pub struct RateService;

impl RateService {
	pub fn new() -> Self {
		Self
	}

	/// `getRate(from, to)`:
	///
	/// 1. `from == to` -> `1`.
	/// 2. Direct `(from, to)` active -> its rate.
	/// 3. Else inverse `(to, from)` active -> its stored `inverseRate`, or
	///    `1 / rate` if no inverse was stored.
	/// 4. Else `RateUnavailable`.
	#[tracing::instrument(skip(self, scope))]
	pub fn get_rate(&self, scope: &Scope<'_>, from: &str, to: &str) -> Result<Money, RateError> {
		if from.eq_ignore_ascii_case(to) {
			return Ok(Money::from(1u32));
		}
		if let Some(direct) = scope.rates().get_by_pair(from, to)? {
			if direct.active {
				return Ok(direct.rate);
			}
		}
		if let Some(inverse) = scope.rates().get_by_pair(to, from)? {
			if inverse.active {
				return Ok(match inverse.inverse_rate {
					Some(stored) => stored,
					None => inverse.rate.checked_reciprocal(RATE_SCALE)?,
				});
			}
		}
		Err(RateError::RateUnavailable { from: from.to_string(), to: to.to_string() })
	}

	/// `convert(amount, from, to) = amount * getRate(from, to)`, rounded to the
	/// caller's requested scale.
	#[tracing::instrument(skip(self, scope))]
	pub fn convert(
		&self,
		scope: &Scope<'_>,
		amount: &Money,
		from: &str,
		to: &str,
		scale: i64,
	) -> Result<Money, RateError> {
		let rate = self.get_rate(scope, from, to)?;
		Ok(amount.mul(&rate).round(scale))
	}

	pub fn list(&self, scope: &Scope<'_>, active_only: bool) -> Result<Vec<ExchangeRate>, RateError> {
		Ok(scope.rates().list(active_only)?)
	}

	pub fn list_from_base(&self, scope: &Scope<'_>, base: &str) -> Result<Vec<ExchangeRate>, RateError> {
		Ok(scope.rates().list_from_base(base)?)
	}

	/// `setRate(admin, from, to, rate, inverseRate?)`. The admin check itself
	/// is an API-boundary concern (`spec.md` §6); this only persists the row.
	/// Rejects a non-positive rate — a zero or negative rate can never be a
	/// valid exchange rate.
	#[tracing::instrument(skip(self, scope))]
	pub fn set_rate(
		&self,
		scope: &Scope<'_>,
		from: &str,
		to: &str,
		rate: Money,
		inverse_rate: Option<Money>,
	) -> Result<ExchangeRate, RateError> {
		if !rate.is_positive() {
			return Err(RateError::Internal(format!("rate must be positive, got {rate}")));
		}
		Ok(scope.rates().upsert(from, to, &rate, inverse_rate.as_ref())?)
	}
}

impl Default for RateService {
	fn default() -> Self {
		Self::new()
	}
}
