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

//! `spec.md` §6 history operations: `getHistory`, the per-type listings
//! (`getDeposits`/`getWithdrawals`/`getP2P`/`getBillPayments`), and
//! `getTransactionDetails`. All read-only over the wallets the caller owns.

use chrono::{DateTime, Utc};
use exchange_auth::Principal;
use exchange_history::{resolve_range, HistoryAggregator, Period};
use exchange_store::{Scope, TransactionId, TransactionType, WalletRef};

use crate::dto::{ChartBucketView, HistoryView, PeriodRequest, TransactionView, TypeSummaryView};
use crate::error::DomainError;

pub struct HistoryService {
	aggregator: HistoryAggregator,
}

impl HistoryService {
	pub fn new() -> Self {
		Self { aggregator: HistoryAggregator::new() }
	}

	fn owned_wallets(&self, scope: &Scope<'_>, caller: Principal) -> Result<Vec<WalletRef>, DomainError> {
		let mut wallets: Vec<WalletRef> =
			scope.fiat_wallets().list_by_user(caller.user_id())?.into_iter().map(|w| WalletRef::Fiat(w.id)).collect();
		wallets.extend(
			scope
				.crypto_wallets()
				.list_by_user(caller.user_id())?
				.into_iter()
				.map(|w| WalletRef::Crypto(w.id)),
		);
		Ok(wallets)
	}

	fn to_period(period: PeriodRequest) -> Period {
		match period {
			PeriodRequest::D => Period::Day,
			PeriodRequest::W => Period::Week,
			PeriodRequest::M => Period::Month,
			PeriodRequest::Custom { start, end } => Period::Custom { start, end },
		}
	}

	/// `getHistory(user, period, currency?)`: summary totals, the 24-bucket
	/// hourly chart (in the server's configured zone), and the USD-normalized
	/// type summary, all over the caller's own wallets in `period`.
	#[tracing::instrument(skip(self, scope))]
	pub fn get_history(
		&self,
		scope: &Scope<'_>,
		caller: Principal,
		period: PeriodRequest,
		currency: Option<&str>,
		now: DateTime<Utc>,
	) -> Result<HistoryView, DomainError> {
		let (start, end) = resolve_range(Self::to_period(period), now)?;
		let mut wallets = self.owned_wallets(scope, caller)?;
		if let Some(currency) = currency {
			wallets.retain(|w| wallet_currency(scope, *w).map(|c| c == currency).unwrap_or(false));
		}

		let summary = self.aggregator.summary(scope, &wallets, start, end)?;
		let chart = self
			.aggregator
			.hourly_chart(scope, &wallets, start, end, &Utc)?
			.into_iter()
			.map(|b| ChartBucketView { label: b.label, total: b.total })
			.collect();
		let type_summary = self
			.aggregator
			.type_summary(scope, &wallets, start, end)?
			.into_iter()
			.map(|t| TypeSummaryView {
				type_label: t.type_label,
				currency: t.currency,
				wallet_kind: t.wallet_kind,
				count: t.count,
				total_native: t.total_native,
				total_usd: t.total_usd,
			})
			.collect();
		Ok(HistoryView { incoming: summary.incoming, outgoing: summary.outgoing, net: summary.net, chart, type_summary })
	}

	fn by_type(
		&self,
		scope: &Scope<'_>,
		caller: Principal,
		tx_type: TransactionType,
		period: PeriodRequest,
		now: DateTime<Utc>,
	) -> Result<Vec<TransactionView>, DomainError> {
		let (start, end) = resolve_range(Self::to_period(period), now)?;
		let wallets = self.owned_wallets(scope, caller)?;
		let mut out = Vec::new();
		for wallet in wallets {
			for tx in scope.transactions().list_by_wallet_in_range(wallet, start, end)? {
				if tx.tx_type == tx_type {
					out.push(to_view(tx));
				}
			}
		}
		out.sort_by_key(|t| t.created_at);
		Ok(out)
	}

	pub fn get_deposits(
		&self,
		scope: &Scope<'_>,
		caller: Principal,
		period: PeriodRequest,
		now: DateTime<Utc>,
	) -> Result<Vec<TransactionView>, DomainError> {
		self.by_type(scope, caller, TransactionType::Deposit, period, now)
	}

	pub fn get_withdrawals(
		&self,
		scope: &Scope<'_>,
		caller: Principal,
		period: PeriodRequest,
		now: DateTime<Utc>,
	) -> Result<Vec<TransactionView>, DomainError> {
		self.by_type(scope, caller, TransactionType::Withdrawal, period, now)
	}

	pub fn get_p2p(
		&self,
		scope: &Scope<'_>,
		caller: Principal,
		period: PeriodRequest,
		now: DateTime<Utc>,
	) -> Result<Vec<TransactionView>, DomainError> {
		self.by_type(scope, caller, TransactionType::P2p, period, now)
	}

	pub fn get_bill_payments(
		&self,
		scope: &Scope<'_>,
		caller: Principal,
		period: PeriodRequest,
		now: DateTime<Utc>,
	) -> Result<Vec<TransactionView>, DomainError> {
		self.by_type(scope, caller, TransactionType::BillPayment, period, now)
	}

	#[tracing::instrument(skip(self, scope))]
	pub fn get_transaction_details(
		&self,
		scope: &Scope<'_>,
		caller: Principal,
		id: TransactionId,
	) -> Result<TransactionView, DomainError> {
		let tx = scope.transactions().get(id)?;
		let owned = self.owned_wallets(scope, caller)?;
		if !owned.contains(&tx.wallet) {
			return Err(DomainError::Forbidden("transaction does not belong to the caller".into()));
		}
		Ok(to_view(tx))
	}
}

impl Default for HistoryService {
	fn default() -> Self {
		Self::new()
	}
}

fn wallet_currency(scope: &Scope<'_>, wallet: WalletRef) -> Result<String, DomainError> {
	match wallet {
		WalletRef::Fiat(id) => Ok(scope.fiat_wallets().get(id)?.currency),
		WalletRef::Crypto(id) => Ok(scope.crypto_wallets().get(id)?.currency),
	}
}

fn to_view(tx: exchange_store::Transaction) -> TransactionView {
	TransactionView {
		id: tx.id,
		tx_type: tx.tx_type,
		status: tx.status,
		amount: tx.amount,
		currency: tx.currency,
		fee: tx.fee,
		reference: tx.reference,
		channel: tx.channel,
		description: tx.description,
		created_at: tx.created_at,
		completed_at: tx.completed_at,
	}
}
