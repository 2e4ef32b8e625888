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

//! Atomic two-sided fiat transfer (`spec.md` §4.9), used by direct
//! transfers, the Conversion transaction path and the automatic
//! `rhinoxpay_id` leg of P2P payment release.

use chrono::{DateTime, Utc};
use exchange_clock::ReferenceGenerator;
use exchange_ledger::{Ledger, LedgerError};
use exchange_money::Money;
use exchange_reservation::{ReservationEngine, ReservationError};
use exchange_store::{FiatWalletId, Scope, StoreError, TransactionStatus, WalletRef};

#[derive(Debug, thiserror::Error)]
pub enum TransferError {
	#[error("not found: {0}")]
	NotFound(String),
	#[error("invalid input: {0}")]
	InvalidInput(String),
	#[error("insufficient funds: required {required}, available {available}")]
	InsufficientFunds { required: String, available: String },
	#[error("serialization conflict")]
	Conflict,
	#[error("internal transfer error: {0}")]
	Internal(String),
}

impl From<StoreError> for TransferError {
	fn from(err: StoreError) -> Self {
		match err {
			StoreError::NotFound(m) => TransferError::NotFound(m),
			StoreError::DuplicateKey(m) => TransferError::Internal(format!("duplicate key: {m}")),
			StoreError::Conflict => TransferError::Conflict,
			StoreError::Internal(m) => TransferError::Internal(m),
		}
	}
}

impl From<LedgerError> for TransferError {
	fn from(err: LedgerError) -> Self {
		match err {
			LedgerError::NotFound(m) => TransferError::NotFound(m),
			LedgerError::DuplicateKey(m) => TransferError::Internal(format!("duplicate key: {m}")),
			LedgerError::Conflict => TransferError::Conflict,
			LedgerError::Internal(m) => TransferError::Internal(m),
		}
	}
}

impl From<ReservationError> for TransferError {
	fn from(err: ReservationError) -> Self {
		match err {
			ReservationError::NotFound(m) => TransferError::NotFound(m),
			ReservationError::InsufficientFunds { required, available } =>
				TransferError::InsufficientFunds { required, available },
			ReservationError::DuplicateKey(m) => TransferError::Internal(format!("duplicate key: {m}")),
			ReservationError::Conflict => TransferError::Conflict,
			ReservationError::Internal(m) => TransferError::Internal(m),
		}
	}
}

/// The result of a completed transfer: both ledger legs, ready for the
/// caller to surface a reference/correlation id.
pub struct TransferResult {
	pub debit_reference: String,
	pub credit_reference: String,
}

pub struct TransferExecutor<R: ReferenceGenerator> {
	ledger: Ledger<R>,
	reservations: ReservationEngine<R>,
}

impl<R: ReferenceGenerator + Clone> TransferExecutor<R> {
	pub fn new(refs: R) -> Self {
		Self {
			ledger: Ledger::new(refs.clone()),
			reservations: ReservationEngine::new(Ledger::new(refs)),
		}
	}

	/// `transfer(sourceWalletRef, destWalletRef, amount, currency, fee,
	/// channel, description, metadata)`, all within the caller's scope:
	///
	/// 1. Validate both wallets exist, same currency, both active.
	/// 2. `reserve(source, amount + fee)`.
	/// 3. Post the debit ledger entry (completed).
	/// 4. Post the credit ledger entry (completed).
	/// 5. `settle(source, amount + fee)` and credit destination.
	///
	/// If any step after the reservation fails, the reservation is released
	/// before the error is returned, per the contract in `spec.md` §4.9 step
	/// 6.
	#[allow(clippy::too_many_arguments)]
	#[tracing::instrument(skip(self, scope, metadata))]
	pub fn transfer(
		&self,
		scope: &Scope<'_>,
		source: FiatWalletId,
		dest: FiatWalletId,
		amount: &Money,
		currency: &str,
		fee: &Money,
		channel: &str,
		description: &str,
		metadata: serde_json::Value,
		now: DateTime<Utc>,
	) -> Result<TransferResult, TransferError> {
		let source_wallet = scope.fiat_wallets().get(source)?;
		let dest_wallet = scope.fiat_wallets().get(dest)?;
		if !source_wallet.active || !dest_wallet.active {
			return Err(TransferError::InvalidInput("both wallets must be active".into()));
		}
		if source_wallet.currency != currency || dest_wallet.currency != currency {
			return Err(TransferError::InvalidInput(format!(
				"wallet currency mismatch: expected {currency}"
			)));
		}

		let total = amount.add(fee);
		let correlation = format!("transfer-{source}-{dest}-{}", now.timestamp_millis());
		self.reservations.reserve_fiat(scope, source, &total, &correlation, now)?;

		let post_legs = || -> Result<(String, String), TransferError> {
			let (debit, credit) = self.ledger.post_pair(
				scope,
				WalletRef::Fiat(source),
				WalletRef::Fiat(dest),
				amount.clone(),
				currency,
				fee.clone(),
				channel,
				description,
				metadata.clone(),
				TransactionStatus::Completed,
				(None, None),
				now,
			)?;
			self.reservations.settle_fiat(scope, source, &correlation, now)?;
			self.reservations.credit_fiat(scope, dest, amount)?;
			Ok((debit.reference, credit.reference))
		};

		match post_legs() {
			Ok((debit_reference, credit_reference)) => Ok(TransferResult { debit_reference, credit_reference }),
			Err(e) => {
				if let Err(release_err) = self.reservations.release_fiat(scope, source, &correlation, now) {
					tracing::error!(error = %release_err, "failed to release reservation after failed transfer");
				}
				Err(e)
			}
		}
	}

	/// Exposes the underlying ledger for callers (e.g. the order state
	/// machine) that need to post additional p2p-tagged legs alongside a
	/// transfer in the same scope.
	pub fn ledger(&self) -> &Ledger<R> {
		&self.ledger
	}

	pub fn reservations(&self) -> &ReservationEngine<R> {
		&self.reservations
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use exchange_clock::{DefaultReferenceGenerator, SteppingClock};
	use exchange_store::Store;

	fn executor() -> TransferExecutor<DefaultReferenceGenerator<SteppingClock>> {
		let clock = SteppingClock::at(Utc::now());
		TransferExecutor::new(DefaultReferenceGenerator::new(clock))
	}

	#[tokio::test]
	async fn happy_transfer_moves_balance_and_posts_legs() {
		let store = Store::open_in_memory().unwrap();
		let executor = executor();
		let now = Utc::now();

		let (source, dest) = store
			.transact(|scope| {
				let alice = scope.users().insert("alice@example.com", "+1")?;
				let bob = scope.users().insert("bob@example.com", "+2")?;
				let source = scope.fiat_wallets().insert(alice.id, "NGN", &Money::parse("1000.00").unwrap(), &Money::zero())?;
				let dest = scope.fiat_wallets().insert(bob.id, "NGN", &Money::zero(), &Money::zero())?;
				Ok((source.id, dest.id))
			})
			.await
			.unwrap();

		let result = store
			.transact(move |scope| {
				executor
					.transfer(
						scope,
						source,
						dest,
						&Money::parse("100.00").unwrap(),
						"NGN",
						&Money::parse("1.00").unwrap(),
						"internal",
						"p2p settlement",
						serde_json::json!({}),
						now,
					)
					.map_err(|e| StoreError::Internal(e.to_string()))
			})
			.await
			.unwrap();

		assert_ne!(result.debit_reference, result.credit_reference);

		let (source_wallet, dest_wallet) = store
			.transact(move |scope| Ok((scope.fiat_wallets().get(source)?, scope.fiat_wallets().get(dest)?)))
			.await
			.unwrap();
		assert_eq!(source_wallet.balance, Money::parse("899.00").unwrap());
		assert_eq!(source_wallet.locked_balance, Money::zero());
		assert_eq!(dest_wallet.balance, Money::parse("100.00").unwrap());
	}

	#[tokio::test]
	async fn insufficient_funds_leaves_no_reservation() {
		let store = Store::open_in_memory().unwrap();
		let executor = executor();
		let now = Utc::now();

		let (source, dest) = store
			.transact(|scope| {
				let alice = scope.users().insert("c@example.com", "+3")?;
				let bob = scope.users().insert("d@example.com", "+4")?;
				let source = scope.fiat_wallets().insert(alice.id, "NGN", &Money::parse("5.00").unwrap(), &Money::zero())?;
				let dest = scope.fiat_wallets().insert(bob.id, "NGN", &Money::zero(), &Money::zero())?;
				Ok((source.id, dest.id))
			})
			.await
			.unwrap();

		let result = store
			.transact(move |scope| {
				Ok(executor.transfer(
					scope,
					source,
					dest,
					&Money::parse("100.00").unwrap(),
					"NGN",
					&Money::zero(),
					"internal",
					"should fail",
					serde_json::json!({}),
					now,
				))
			})
			.await
			.unwrap();
		assert!(matches!(result, Err(TransferError::InsufficientFunds { .. })));

		let source_wallet = store.transact(move |scope| Ok(scope.fiat_wallets().get(source)?)).await.unwrap();
		assert_eq!(source_wallet.locked_balance, Money::zero());
	}

	#[tokio::test]
	async fn currency_mismatch_is_rejected() {
		let store = Store::open_in_memory().unwrap();
		let executor = executor();
		let now = Utc::now();

		let (source, dest) = store
			.transact(|scope| {
				let alice = scope.users().insert("e@example.com", "+5")?;
				let bob = scope.users().insert("f@example.com", "+6")?;
				let source = scope.fiat_wallets().insert(alice.id, "NGN", &Money::parse("100.00").unwrap(), &Money::zero())?;
				let dest = scope.fiat_wallets().insert(bob.id, "USD", &Money::zero(), &Money::zero())?;
				Ok((source.id, dest.id))
			})
			.await
			.unwrap();

		let result = store
			.transact(move |scope| {
				Ok(executor.transfer(
					scope,
					source,
					dest,
					&Money::parse("10.00").unwrap(),
					"NGN",
					&Money::zero(),
					"internal",
					"mismatch",
					serde_json::json!({}),
					now,
				))
			})
			.await
			.unwrap();
		assert!(matches!(result, Err(TransferError::InvalidInput(_))));
	}
}
