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

//! Holds and releases funds under concurrent access (`spec.md` §4.4).
//!
//! Two reservation modes, one per asset class:
//!
//! - Fiat: `reserve` raises `lockedBalance`; `release` lowers it back;
//!   `settle` lowers both `balance` and `lockedBalance` together (the funds
//!   have left).
//! - Crypto: `freeze` lowers `availableBalance` only (the gap from
//!   `accountBalance` is escrow); `unfreeze` reverses it; `settleOut` lowers
//!   both columns; `settleIn` raises both (received funds are immediately
//!   available).
//!
//! Every mutation is paired with a Ledger post and a row in the `reservations`
//! table keyed by `(kind, wallet_id, correlation)`, which is the store-level
//! backstop against double-release / double-freeze (`spec.md` §5
//! idempotency).

use chrono::{DateTime, Utc};
use exchange_clock::ReferenceGenerator;
use exchange_ledger::{Ledger, LedgerError};
use exchange_money::Money;
use exchange_store::{
	FiatWalletId, P2pStep, ReservationKind, Scope, StoreError, TransactionStatus, TransactionType,
	VirtualAccountId, WalletRef,
};

#[derive(Debug, thiserror::Error)]
pub enum ReservationError {
	#[error("not found: {0}")]
	NotFound(String),
	#[error("insufficient funds: required {required}, available {available}")]
	InsufficientFunds { required: String, available: String },
	#[error("reservation already exists or already released: {0}")]
	DuplicateKey(String),
	#[error("serialization conflict")]
	Conflict,
	#[error("internal reservation error: {0}")]
	Internal(String),
}

impl From<StoreError> for ReservationError {
	fn from(err: StoreError) -> Self {
		match err {
			StoreError::NotFound(m) => ReservationError::NotFound(m),
			StoreError::DuplicateKey(m) => ReservationError::DuplicateKey(m),
			StoreError::Conflict => ReservationError::Conflict,
			StoreError::Internal(m) => ReservationError::Internal(m),
		}
	}
}

impl From<LedgerError> for ReservationError {
	fn from(err: LedgerError) -> Self {
		match err {
			LedgerError::NotFound(m) => ReservationError::NotFound(m),
			LedgerError::DuplicateKey(m) => ReservationError::DuplicateKey(m),
			LedgerError::Conflict => ReservationError::Conflict,
			LedgerError::Internal(m) => ReservationError::Internal(m),
		}
	}
}

fn insufficient(required: &Money, available: &Money) -> ReservationError {
	ReservationError::InsufficientFunds {
		required: required.to_canonical_string(),
		available: available.to_canonical_string(),
	}
}

pub struct ReservationEngine<R: ReferenceGenerator> {
	ledger: Ledger<R>,
}

impl<R: ReferenceGenerator> ReservationEngine<R> {
	pub fn new(ledger: Ledger<R>) -> Self {
		Self { ledger }
	}

	/// `reserve(walletId, amount)`: checks `balance - lockedBalance >= amount`
	/// then raises `lockedBalance` (Invariant F1). Posts a `pending` ledger
	/// entry recording the lock so the reservation has an audit trail.
	#[tracing::instrument(skip(self, scope))]
	pub fn reserve_fiat(
		&self,
		scope: &Scope<'_>,
		wallet_id: FiatWalletId,
		amount: &Money,
		correlation: &str,
		now: DateTime<Utc>,
	) -> Result<(), ReservationError> {
		let wallet = scope.fiat_wallets().get(wallet_id)?;
		let available = wallet.available();
		if available < *amount {
			return Err(insufficient(amount, &available));
		}
		scope.reservations().create(
			ReservationKind::FiatLock,
			wallet_id.0,
			correlation,
			amount,
			now,
		)?;
		let new_locked = wallet.locked_balance.add(amount);
		scope.fiat_wallets().set_balances(wallet_id, &wallet.balance, &new_locked)?;
		Ok(())
	}

	/// `release(walletId, amount)`: lowers `lockedBalance` back down. Rejects a
	/// release with no matching outstanding reservation (double-release
	/// guard).
	#[tracing::instrument(skip(self, scope))]
	pub fn release_fiat(
		&self,
		scope: &Scope<'_>,
		wallet_id: FiatWalletId,
		correlation: &str,
		now: DateTime<Utc>,
	) -> Result<(), ReservationError> {
		let reservation = scope
			.reservations()
			.get_active(ReservationKind::FiatLock, wallet_id.0, correlation)?
			.ok_or_else(|| {
				ReservationError::Internal(format!(
					"no outstanding fiat lock for wallet {wallet_id} correlation {correlation}"
				))
			})?;
		let wallet = scope.fiat_wallets().get(wallet_id)?;
		let new_locked = wallet.locked_balance.sub(&reservation.amount);
		scope.fiat_wallets().set_balances(wallet_id, &wallet.balance, &new_locked)?;
		scope.reservations().mark_released(reservation.id, now)?;
		Ok(())
	}

	/// `settle(walletId, amount)`: the reserved funds have left. Lowers both
	/// `balance` and `lockedBalance` atomically and marks the reservation
	/// released.
	#[tracing::instrument(skip(self, scope))]
	pub fn settle_fiat(
		&self,
		scope: &Scope<'_>,
		wallet_id: FiatWalletId,
		correlation: &str,
		now: DateTime<Utc>,
	) -> Result<(), ReservationError> {
		let reservation = scope
			.reservations()
			.get_active(ReservationKind::FiatLock, wallet_id.0, correlation)?
			.ok_or_else(|| {
				ReservationError::Internal(format!(
					"no outstanding fiat lock for wallet {wallet_id} correlation {correlation}"
				))
			})?;
		let wallet = scope.fiat_wallets().get(wallet_id)?;
		let new_balance = wallet.balance.sub(&reservation.amount);
		let new_locked = wallet.locked_balance.sub(&reservation.amount);
		scope.fiat_wallets().set_balances(wallet_id, &new_balance, &new_locked)?;
		scope.reservations().mark_released(reservation.id, now)?;
		Ok(())
	}

	/// Fiat credit with no prior reservation on the receiving wallet: raises
	/// `balance` only. Used by the destination leg of a transfer.
	#[tracing::instrument(skip(self, scope))]
	pub fn credit_fiat(
		&self,
		scope: &Scope<'_>,
		wallet_id: FiatWalletId,
		amount: &Money,
	) -> Result<(), ReservationError> {
		let wallet = scope.fiat_wallets().get(wallet_id)?;
		let new_balance = wallet.balance.add(amount);
		scope.fiat_wallets().set_balances(wallet_id, &new_balance, &wallet.locked_balance)?;
		Ok(())
	}

	/// `freeze(virtualAccountId, amount)`: requires `availableBalance >=
	/// amount`, then lowers `availableBalance` only; `accountBalance` is
	/// untouched so the gap becomes escrow (Invariant V1).
	#[tracing::instrument(skip(self, scope))]
	pub fn freeze_crypto(
		&self,
		scope: &Scope<'_>,
		account_id: VirtualAccountId,
		amount: &Money,
		correlation: &str,
		now: DateTime<Utc>,
	) -> Result<(), ReservationError> {
		let account = scope.virtual_accounts().get(account_id)?;
		if account.available_balance < *amount {
			return Err(insufficient(amount, &account.available_balance));
		}
		scope.reservations().create(
			ReservationKind::CryptoFreeze,
			account_id.0,
			correlation,
			amount,
			now,
		)?;
		let new_available = account.available_balance.sub(amount);
		scope
			.virtual_accounts()
			.set_balances(account_id, &account.account_balance, &new_available)?;
		Ok(())
	}

	/// `unfreeze(...)`: reverses a freeze, raising `availableBalance` back.
	#[tracing::instrument(skip(self, scope))]
	pub fn unfreeze_crypto(
		&self,
		scope: &Scope<'_>,
		account_id: VirtualAccountId,
		correlation: &str,
		now: DateTime<Utc>,
	) -> Result<(), ReservationError> {
		let reservation = scope
			.reservations()
			.get_active(ReservationKind::CryptoFreeze, account_id.0, correlation)?
			.ok_or_else(|| {
				ReservationError::Internal(format!(
					"no outstanding crypto freeze for account {account_id} correlation {correlation}"
				))
			})?;
		let account = scope.virtual_accounts().get(account_id)?;
		let new_available = account.available_balance.add(&reservation.amount);
		scope
			.virtual_accounts()
			.set_balances(account_id, &account.account_balance, &new_available)?;
		scope.reservations().mark_released(reservation.id, now)?;
		Ok(())
	}

	/// `settleOut(...)`: crypto has left for good. Lowers both
	/// `accountBalance` and `availableBalance` (the escrow is consumed) and
	/// posts the `crypto_debited` leg.
	#[tracing::instrument(skip(self, scope))]
	pub fn settle_out_crypto(
		&self,
		scope: &Scope<'_>,
		account_id: VirtualAccountId,
		correlation: &str,
		now: DateTime<Utc>,
	) -> Result<(), ReservationError> {
		let reservation = scope
			.reservations()
			.get_active(ReservationKind::CryptoFreeze, account_id.0, correlation)?
			.ok_or_else(|| {
				ReservationError::Internal(format!(
					"no outstanding crypto freeze for account {account_id} correlation {correlation}"
				))
			})?;
		let account = scope.virtual_accounts().get(account_id)?;
		let new_account_balance = account.account_balance.sub(&reservation.amount);
		scope
			.virtual_accounts()
			.set_balances(account_id, &new_account_balance, &account.available_balance)?;
		scope.reservations().mark_released(reservation.id, now)?;
		Ok(())
	}

	/// `settleIn(...)`: received funds are immediately available. Raises both
	/// columns.
	#[tracing::instrument(skip(self, scope))]
	pub fn settle_in_crypto(
		&self,
		scope: &Scope<'_>,
		account_id: VirtualAccountId,
		amount: &Money,
	) -> Result<(), ReservationError> {
		let account = scope.virtual_accounts().get(account_id)?;
		let new_account_balance = account.account_balance.add(amount);
		let new_available = account.available_balance.add(amount);
		scope
			.virtual_accounts()
			.set_balances(account_id, &new_account_balance, &new_available)?;
		Ok(())
	}

	/// Convenience posting a `p2p` ledger entry for a reservation-engine
	/// mutation, tagged with its `P2pStep`, used by the order state machine so
	/// every freeze/release/settle has a mirrored immutable record (`spec.md`
	/// §1 guarantee 2).
	#[allow(clippy::too_many_arguments)]
	pub fn post_step(
		&self,
		scope: &Scope<'_>,
		wallet: WalletRef,
		signed_amount: Money,
		currency: &str,
		description: &str,
		metadata: serde_json::Value,
		p2p_step: P2pStep,
		now: DateTime<Utc>,
	) -> Result<(), ReservationError> {
		self.ledger.post(
			scope,
			wallet,
			TransactionType::P2p,
			signed_amount,
			currency,
			Money::zero(),
			"internal",
			description,
			metadata,
			TransactionStatus::Completed,
			Some(p2p_step),
			None,
			now,
		)?;
		Ok(())
	}
}
