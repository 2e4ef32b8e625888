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

//! The append-only journal. `Ledger` never touches a `balance` or
//! `lockedBalance` column — that is the Reservation Engine's job — it only
//! records that a movement happened, under a globally unique `reference`
//! that doubles as the idempotency key for retried callers.

use chrono::{DateTime, Utc};
use exchange_clock::ReferenceGenerator;
use exchange_money::Money;
use exchange_store::{
	P2pStep, Scope, StoreError, Transaction, TransactionStatus, TransactionType, UserId, WalletRef,
};

const MAX_REFERENCE_ATTEMPTS: u32 = 5;

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
	#[error("not found: {0}")]
	NotFound(String),
	#[error("duplicate reference: {0}")]
	DuplicateKey(String),
	#[error("serialization conflict")]
	Conflict,
	#[error("internal ledger error: {0}")]
	Internal(String),
}

impl From<StoreError> for LedgerError {
	fn from(err: StoreError) -> Self {
		match err {
			StoreError::NotFound(m) => LedgerError::NotFound(m),
			StoreError::DuplicateKey(m) => LedgerError::DuplicateKey(m),
			StoreError::Conflict => LedgerError::Conflict,
			StoreError::Internal(m) => LedgerError::Internal(m),
		}
	}
}

/// A posted entry's journal half; returned alongside the stored
/// [`Transaction`] so callers can read back the generated reference without
/// a second query.
pub struct Posting {
	pub reference: String,
}

pub struct Ledger<R: ReferenceGenerator> {
	refs: R,
}

impl<R: ReferenceGenerator> Ledger<R> {
	pub fn new(refs: R) -> Self {
		Self { refs }
	}

	/// If no wallet row exists yet for this (user, currency) crypto pair,
	/// creates the synthetic anchor wallet with zero balances (`spec.md`
	/// §4.3). The authoritative crypto balance always lives on
	/// `VirtualAccount`, never here.
	pub fn resolve_crypto_wallet(
		&self,
		scope: &Scope<'_>,
		user_id: UserId,
		currency: &str,
	) -> Result<WalletRef, LedgerError> {
		let wallet = scope.crypto_wallets().find_or_create(user_id, currency)?;
		Ok(WalletRef::Crypto(wallet.id))
	}

	/// Posts one journal entry. If `explicit_reference` is `Some`, it is used
	/// verbatim and a pre-existing entry with the same reference is refused
	/// with `DuplicateKey` (externally-supplied idempotency key). Otherwise a
	/// reference is generated and, on the astronomically unlikely chance it
	/// collides, regenerated up to `MAX_REFERENCE_ATTEMPTS` times.
	#[allow(clippy::too_many_arguments)]
	#[tracing::instrument(skip(self, scope, metadata))]
	pub fn post(
		&self,
		scope: &Scope<'_>,
		wallet: WalletRef,
		tx_type: TransactionType,
		signed_amount: Money,
		currency: &str,
		fee: Money,
		channel: &str,
		description: &str,
		metadata: serde_json::Value,
		status: TransactionStatus,
		p2p_step: Option<P2pStep>,
		explicit_reference: Option<&str>,
		now: DateTime<Utc>,
	) -> Result<Transaction, LedgerError> {
		if let Some(reference) = explicit_reference {
			if scope.transactions().get_by_reference(reference)?.is_some() {
				return Err(LedgerError::DuplicateKey(format!(
					"transaction reference {reference} already posted"
				)));
			}
			return Ok(scope.transactions().insert(
				wallet,
				tx_type,
				status,
				&signed_amount,
				currency,
				&fee,
				reference,
				channel,
				description,
				&metadata,
				p2p_step,
				now,
				if status == TransactionStatus::Completed { Some(now) } else { None },
			)?);
		}

		for attempt in 0..MAX_REFERENCE_ATTEMPTS {
			let reference = self.refs.next();
			match scope.transactions().insert(
				wallet,
				tx_type,
				status,
				&signed_amount,
				currency,
				&fee,
				&reference,
				channel,
				description,
				&metadata,
				p2p_step,
				now,
				if status == TransactionStatus::Completed { Some(now) } else { None },
			) {
				Ok(tx) => return Ok(tx),
				Err(StoreError::DuplicateKey(_)) if attempt + 1 < MAX_REFERENCE_ATTEMPTS => {
					tracing::warn!(attempt, "generated ledger reference collided, retrying");
					continue;
				}
				Err(other) => return Err(other.into()),
			}
		}
		Err(LedgerError::Internal("exhausted reference generation attempts".into()))
	}

	/// Posts a debit and a matching credit sharing a correlation id in
	/// `metadata`, so the History Aggregator can pair them (`spec.md` §4.3,
	/// §4.9).
	#[allow(clippy::too_many_arguments)]
	pub fn post_pair(
		&self,
		scope: &Scope<'_>,
		debit_wallet: WalletRef,
		credit_wallet: WalletRef,
		amount: Money,
		currency: &str,
		fee: Money,
		channel: &str,
		description: &str,
		mut metadata: serde_json::Value,
		status: TransactionStatus,
		p2p_steps: (Option<P2pStep>, Option<P2pStep>),
		now: DateTime<Utc>,
	) -> Result<(Transaction, Transaction), LedgerError> {
		let correlation = self.refs.next();
		if let Some(obj) = metadata.as_object_mut() {
			obj.insert("correlation".to_string(), serde_json::Value::String(correlation));
		}

		let debit = self.post(
			scope,
			debit_wallet,
			TransactionType::Transfer,
			amount.negate(),
			currency,
			fee.clone(),
			channel,
			description,
			metadata.clone(),
			status,
			p2p_steps.0,
			None,
			now,
		)?;
		let credit = self.post(
			scope,
			credit_wallet,
			TransactionType::Transfer,
			amount,
			currency,
			Money::zero(),
			channel,
			description,
			metadata,
			status,
			p2p_steps.1,
			None,
			now,
		)?;
		Ok((debit, credit))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use exchange_clock::{DefaultReferenceGenerator, SteppingClock};
	use exchange_store::{FiatWalletId, Store};

	fn ledger() -> Ledger<DefaultReferenceGenerator<SteppingClock>> {
		let clock = SteppingClock::at(Utc::now());
		Ledger::new(DefaultReferenceGenerator::new(clock))
	}

	#[tokio::test]
	async fn post_generates_unique_reference() {
		let store = Store::open_in_memory().unwrap();
		let ledger = ledger();
		let now = Utc::now();
		let tx = store
			.transact(move |scope| {
				ledger.post(
					scope,
					WalletRef::Fiat(FiatWalletId(1)),
					TransactionType::Deposit,
					Money::parse("10.00").unwrap(),
					"NGN",
					Money::zero(),
					"offline",
					"test deposit",
					serde_json::json!({}),
					TransactionStatus::Completed,
					None,
					None,
					now,
				)
				.map_err(|e| StoreError::Internal(e.to_string()))
			})
			.await
			.unwrap();
		assert!(!tx.reference.is_empty());
	}

	#[tokio::test]
	async fn explicit_reference_rejects_duplicate() {
		let store = Store::open_in_memory().unwrap();
		let ledger = ledger();
		let now = Utc::now();

		store
			.transact(move |scope| {
				ledger
					.post(
						scope,
						WalletRef::Fiat(FiatWalletId(1)),
						TransactionType::Deposit,
						Money::parse("1.00").unwrap(),
						"NGN",
						Money::zero(),
						"offline",
						"first",
						serde_json::json!({}),
						TransactionStatus::Completed,
						None,
						Some("fixed-ref"),
						now,
					)
					.map_err(|e| StoreError::Internal(e.to_string()))
			})
			.await
			.unwrap();

		let ledger = ledger();
		let result = store
			.transact(move |scope| {
				Ok(ledger.post(
					scope,
					WalletRef::Fiat(FiatWalletId(1)),
					TransactionType::Deposit,
					Money::parse("1.00").unwrap(),
					"NGN",
					Money::zero(),
					"offline",
					"second",
					serde_json::json!({}),
					TransactionStatus::Completed,
					None,
					Some("fixed-ref"),
					now,
				))
			})
			.await
			.unwrap();
		assert!(matches!(result, Err(LedgerError::DuplicateKey(_))));
	}

	#[tokio::test]
	async fn post_pair_shares_correlation_metadata() {
		let store = Store::open_in_memory().unwrap();
		let ledger = ledger();
		let now = Utc::now();
		let (debit, credit) = store
			.transact(move |scope| {
				ledger
					.post_pair(
						scope,
						WalletRef::Fiat(FiatWalletId(1)),
						WalletRef::Fiat(FiatWalletId(2)),
						Money::parse("5.00").unwrap(),
						"NGN",
						Money::zero(),
						"internal",
						"transfer",
						serde_json::json!({}),
						TransactionStatus::Completed,
						(None, None),
						now,
					)
					.map_err(|e| StoreError::Internal(e.to_string()))
			})
			.await
			.unwrap();
		assert_eq!(
			debit.metadata.get("correlation"),
			credit.metadata.get("correlation")
		);
		assert_eq!(debit.amount, Money::parse("-5.00").unwrap());
		assert_eq!(credit.amount, Money::parse("5.00").unwrap());
	}
}
