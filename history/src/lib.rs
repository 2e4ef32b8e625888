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

//! Summary totals, hourly chart buckets, and USD-normalized type summaries
//! over ledger records (`spec.md` §4.10). Reads only; never mutates a
//! wallet, account or transaction row.

use chrono::{DateTime, Duration, TimeZone, Timelike, Utc};
use exchange_money::Money;
use exchange_rates::RateService;
use exchange_store::{P2pStep, Scope, StoreError, Transaction, TransactionType, WalletRef};

#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
	#[error("invalid range: start must be <= end")]
	InvalidRange,
	#[error("internal history error: {0}")]
	Internal(String),
}

impl From<StoreError> for HistoryError {
	fn from(err: StoreError) -> Self {
		HistoryError::Internal(err.to_string())
	}
}

/// The four period filters `getHistory` accepts (`spec.md` §4.10, §6).
#[derive(Debug, Clone, Copy)]
pub enum Period {
	Day,
	Week,
	Month,
	Custom { start: DateTime<Utc>, end: DateTime<Utc> },
}

/// Resolves a [`Period`] to an inclusive `[start, end]` range anchored at `now`.
pub fn resolve_range(period: Period, now: DateTime<Utc>) -> Result<(DateTime<Utc>, DateTime<Utc>), HistoryError> {
	match period {
		Period::Day => {
			let start = now.date_naive().and_hms_opt(0, 0, 0).expect("midnight is always valid");
			Ok((Utc.from_utc_datetime(&start), now))
		}
		Period::Week => Ok((now - Duration::days(7), now)),
		Period::Month => Ok((now - Duration::days(30), now)),
		Period::Custom { start, end } => {
			if start > end {
				return Err(HistoryError::InvalidRange);
			}
			Ok((start, end))
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Summary {
	pub incoming: Money,
	pub outgoing: Money,
	pub net: Money,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartBucket {
	pub label: String,
	pub total: Money,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeSummaryEntry {
	pub type_label: &'static str,
	pub currency: String,
	pub wallet_kind: &'static str,
	pub count: u64,
	pub total_native: Money,
	pub total_usd: Money,
}

pub struct HistoryAggregator {
	rates: RateService,
}

impl HistoryAggregator {
	pub fn new() -> Self {
		Self { rates: RateService::new() }
	}

	fn load(
		&self,
		scope: &Scope<'_>,
		wallets: &[WalletRef],
		start: DateTime<Utc>,
		end: DateTime<Utc>,
	) -> Result<Vec<Transaction>, HistoryError> {
		Ok(scope.transactions().list_by_wallets_in_range(wallets, start, end)?)
	}

	/// Summary totals per `spec.md` §4.10: incoming/outgoing classified by
	/// transaction type (and, for `p2p`, by `p2pStep`), net = incoming − outgoing.
	#[tracing::instrument(skip(self, scope))]
	pub fn summary(
		&self,
		scope: &Scope<'_>,
		wallets: &[WalletRef],
		start: DateTime<Utc>,
		end: DateTime<Utc>,
	) -> Result<Summary, HistoryError> {
		let entries = self.load(scope, wallets, start, end)?;
		let mut incoming = Money::zero();
		let mut outgoing = Money::zero();
		for tx in &entries {
			match classify(tx) {
				Some(Direction::Incoming) => incoming = incoming.add(&tx.amount.abs()),
				Some(Direction::Outgoing) => outgoing = outgoing.add(&tx.amount.abs()),
				None => {}
			}
		}
		let net = incoming.sub(&outgoing);
		Ok(Summary { incoming, outgoing, net })
	}

	/// 24 fixed hourly buckets, local to `tz`. Always returns exactly 24
	/// entries regardless of how many transactions fall in range.
	#[tracing::instrument(skip(self, scope))]
	pub fn hourly_chart<Tz: TimeZone>(
		&self,
		scope: &Scope<'_>,
		wallets: &[WalletRef],
		start: DateTime<Utc>,
		end: DateTime<Utc>,
		tz: &Tz,
	) -> Result<Vec<ChartBucket>, HistoryError> {
		let entries = self.load(scope, wallets, start, end)?;
		let mut totals = vec![Money::zero(); 24];
		for tx in &entries {
			let local_hour = tx.created_at.with_timezone(tz).hour() as usize;
			totals[local_hour] = totals[local_hour].add(&tx.amount.abs());
		}
		Ok((0..24).map(|h| ChartBucket { label: hour_label(h), total: totals[h].clone() }).collect())
	}

	/// Type summary grouped by (normalized type, currency, wallet kind),
	/// USD-normalized via the Rate Service. `spec.md`'s data model has no
	/// separate token-price table, so "read token price from wallet-currency
	/// metadata" is realized the same way fiat rates are: a lookup through
	/// [`RateService::get_rate`] against `USD` (see `DESIGN.md`).
	#[tracing::instrument(skip(self, scope))]
	pub fn type_summary(
		&self,
		scope: &Scope<'_>,
		wallets: &[WalletRef],
		start: DateTime<Utc>,
		end: DateTime<Utc>,
	) -> Result<Vec<TypeSummaryEntry>, HistoryError> {
		let entries = self.load(scope, wallets, start, end)?;

		let mut grouped: std::collections::BTreeMap<(&'static str, String, &'static str), (u64, Money)> =
			std::collections::BTreeMap::new();
		for tx in &entries {
			let key = (type_label(tx.tx_type), tx.currency.clone(), tx.wallet.kind());
			let entry = grouped.entry(key).or_insert((0, Money::zero()));
			entry.0 += 1;
			entry.1 = entry.1.add(&tx.amount.abs());
		}

		let mut out = Vec::with_capacity(grouped.len());
		for ((type_label, currency, wallet_kind), (count, total_native)) in grouped {
			let usd_rate = self.usd_rate(scope, &currency);
			let total_usd = total_native.mul(&usd_rate).round(2);
			out.push(TypeSummaryEntry { type_label, currency, wallet_kind, count, total_native, total_usd });
		}
		Ok(out)
	}

	fn usd_rate(&self, scope: &Scope<'_>, currency: &str) -> Money {
		match self.rates.get_rate(scope, currency, "USD") {
			Ok(rate) => rate,
			Err(err) => {
				tracing::warn!(currency, error = %err, "no USD rate available, reporting 0 for type summary");
				Money::zero()
			}
		}
	}
}

impl Default for HistoryAggregator {
	fn default() -> Self {
		Self::new()
	}
}

enum Direction {
	Incoming,
	Outgoing,
}

fn classify(tx: &Transaction) -> Option<Direction> {
	match tx.tx_type {
		TransactionType::Deposit => Some(Direction::Incoming),
		TransactionType::Withdrawal | TransactionType::Transfer | TransactionType::BillPayment =>
			Some(Direction::Outgoing),
		TransactionType::P2p => match tx.p2p_step {
			Some(P2pStep::CryptoCredited | P2pStep::FiatReceived | P2pStep::FiatCredited) => Some(Direction::Incoming),
			Some(P2pStep::CryptoDebited | P2pStep::CryptoFrozen | P2pStep::FiatSent | P2pStep::FiatDebited) =>
				Some(Direction::Outgoing),
			_ => None,
		},
		TransactionType::Conversion => None,
	}
}

fn type_label(t: TransactionType) -> &'static str {
	match t {
		TransactionType::Deposit => "deposit",
		TransactionType::Withdrawal => "withdrawal",
		TransactionType::Transfer => "transfer",
		TransactionType::Conversion => "conversion",
		TransactionType::P2p => "p2p",
		TransactionType::BillPayment => "bill_payment",
	}
}

/// `"h AM/PM - (h+1) AM/PM"`, 12-hour form, with `"12 AM"` for midnight.
fn hour_label(hour: usize) -> String {
	let (from, from_suffix) = twelve_hour(hour);
	let (to, to_suffix) = twelve_hour((hour + 1) % 24);
	format!("{from} {from_suffix} - {to} {to_suffix}")
}

fn twelve_hour(hour: usize) -> (u32, &'static str) {
	let hour = hour as u32;
	let suffix = if hour < 12 { "AM" } else { "PM" };
	let twelve = match hour % 12 {
		0 => 12,
		h => h,
	};
	(twelve, suffix)
}

#[cfg(test)]
mod tests {
	use super::*;
	use exchange_store::{FiatWalletId, Store, TransactionStatus};

	fn wallet() -> WalletRef {
		WalletRef::Fiat(FiatWalletId(1))
	}

	async fn store_with_entries() -> Store {
		let store = Store::open_in_memory().unwrap();
		store
			.transact(move |scope| {
				let user = scope.users().insert("a@example.com", "+1")?;
				let fiat = scope.fiat_wallets().insert(user.id, "NGN", &Money::zero(), &Money::zero())?;
				assert_eq!(fiat.id, FiatWalletId(1));
				scope.transactions().insert(
					WalletRef::Fiat(fiat.id),
					TransactionType::Deposit,
					TransactionStatus::Completed,
					&Money::parse("1000.00").unwrap(),
					"NGN",
					&Money::zero(),
					"ref-dep-1",
					"offline",
					"deposit",
					&serde_json::json!({}),
					None,
					DateTime::parse_from_rfc3339("2026-01-01T09:30:00Z").unwrap().with_timezone(&Utc),
					None,
				)?;
				scope.transactions().insert(
					WalletRef::Fiat(fiat.id),
					TransactionType::Withdrawal,
					TransactionStatus::Completed,
					&Money::parse("-400.00").unwrap(),
					"NGN",
					&Money::zero(),
					"ref-wd-1",
					"offline",
					"withdrawal",
					&serde_json::json!({}),
					None,
					DateTime::parse_from_rfc3339("2026-01-01T09:45:00Z").unwrap().with_timezone(&Utc),
					None,
				)?;
				scope.transactions().insert(
					WalletRef::Fiat(fiat.id),
					TransactionType::P2p,
					TransactionStatus::Completed,
					&Money::parse("250.00").unwrap(),
					"NGN",
					&Money::zero(),
					"ref-p2p-1",
					"rhinoxpay_id",
					"p2p fiat settlement",
					&serde_json::json!({}),
					Some(P2pStep::FiatReceived),
					DateTime::parse_from_rfc3339("2026-01-01T14:00:00Z").unwrap().with_timezone(&Utc),
					None,
				)?;
				Ok(())
			})
			.await
			.unwrap();
		store
	}

	#[tokio::test]
	async fn summary_classifies_incoming_and_outgoing() {
		let store = store_with_entries().await;
		let aggregator = HistoryAggregator::new();
		let start = DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z").unwrap().with_timezone(&Utc);
		let end = DateTime::parse_from_rfc3339("2026-01-02T00:00:00Z").unwrap().with_timezone(&Utc);
		let wallets = vec![wallet()];
		let summary = store
			.transact(move |scope| Ok(aggregator.summary(scope, &wallets, start, end).unwrap()))
			.await
			.unwrap();
		assert_eq!(summary.incoming, Money::parse("1250.00").unwrap());
		assert_eq!(summary.outgoing, Money::parse("400.00").unwrap());
		assert_eq!(summary.net, Money::parse("850.00").unwrap());
	}

	#[tokio::test]
	async fn hourly_chart_always_has_24_buckets_and_sums_by_hour() {
		let store = store_with_entries().await;
		let aggregator = HistoryAggregator::new();
		let start = DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z").unwrap().with_timezone(&Utc);
		let end = DateTime::parse_from_rfc3339("2026-01-02T00:00:00Z").unwrap().with_timezone(&Utc);
		let wallets = vec![wallet()];
		let chart = store
			.transact(move |scope| Ok(aggregator.hourly_chart(scope, &wallets, start, end, &Utc).unwrap()))
			.await
			.unwrap();
		assert_eq!(chart.len(), 24);
		assert_eq!(chart[0].label, "12 AM - 1 AM");
		assert_eq!(chart[9].total, Money::parse("1400.00").unwrap());
		assert_eq!(chart[14].total, Money::parse("250.00").unwrap());
		assert_eq!(chart[3].total, Money::zero());
	}

	#[tokio::test]
	async fn type_summary_groups_and_normalizes_to_usd() {
		let store = store_with_entries().await;
		store
			.transact(move |scope| {
				exchange_rates::RateService::new()
					.set_rate(scope, "NGN", "USD", Money::parse("0.001").unwrap(), None)
					.unwrap();
				Ok(())
			})
			.await
			.unwrap();

		let aggregator = HistoryAggregator::new();
		let start = DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z").unwrap().with_timezone(&Utc);
		let end = DateTime::parse_from_rfc3339("2026-01-02T00:00:00Z").unwrap().with_timezone(&Utc);
		let wallets = vec![wallet()];
		let summary = store
			.transact(move |scope| Ok(aggregator.type_summary(scope, &wallets, start, end).unwrap()))
			.await
			.unwrap();

		assert_eq!(summary.len(), 3);
		let deposit = summary.iter().find(|e| e.type_label == "deposit").unwrap();
		assert_eq!(deposit.count, 1);
		assert_eq!(deposit.total_native, Money::parse("1000.00").unwrap());
		assert_eq!(deposit.total_usd, Money::parse("1.00").unwrap());
	}

	#[test]
	fn day_range_starts_at_local_midnight() {
		let now = DateTime::parse_from_rfc3339("2026-03-05T14:30:00Z").unwrap().with_timezone(&Utc);
		let (start, end) = resolve_range(Period::Day, now).unwrap();
		assert_eq!(start, DateTime::parse_from_rfc3339("2026-03-05T00:00:00Z").unwrap().with_timezone(&Utc));
		assert_eq!(end, now);
	}

	#[test]
	fn custom_range_rejects_start_after_end() {
		let start = DateTime::parse_from_rfc3339("2026-03-05T00:00:00Z").unwrap().with_timezone(&Utc);
		let end = DateTime::parse_from_rfc3339("2026-03-01T00:00:00Z").unwrap().with_timezone(&Utc);
		let result = resolve_range(Period::Custom { start, end }, start);
		assert!(matches!(result, Err(HistoryError::InvalidRange)));
	}
}
