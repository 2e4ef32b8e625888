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

//! The unified error enum the (out-of-scope) HTTP layer maps to status codes
//! (`spec.md` §7). Every core crate's error type funnels in here through a
//! `From` impl, collapsing per-module errors into one outer type at the
//! process boundary.

use exchange_auth::AuthError;
use exchange_history::HistoryError;
use exchange_ledger::LedgerError;
use exchange_money::MoneyError;
use exchange_orders::OrderError;
use exchange_rates::RateError;
use exchange_reservation::ReservationError;
use exchange_store::{OrderStatus, StoreError};
use exchange_transfer::TransferError;

#[derive(Debug, thiserror::Error)]
pub enum DomainError {
	#[error("unauthenticated")]
	Unauthenticated,
	#[error("forbidden: {0}")]
	Forbidden(String),
	#[error("not found: {0}")]
	NotFound(String),
	#[error("invalid input: {0}")]
	InvalidInput(String),
	#[error("invalid transition: order is in {current:?}, cannot {attempted}")]
	InvalidTransition { current: OrderStatus, attempted: String },
	#[error("insufficient funds: required {required}, available {available}")]
	InsufficientFunds { required: String, available: String },
	#[error("payment method mismatch: {0}")]
	PaymentMethodMismatch(String),
	#[error("rate unavailable for {from} -> {to}")]
	RateUnavailable { from: String, to: String },
	#[error("duplicate key: {0}")]
	DuplicateKey(String),
	#[error("serialization conflict")]
	Conflict,
	#[error("deadline exceeded")]
	Timeout,
	#[error("internal error: {0}")]
	Internal(String),
}

impl From<AuthError> for DomainError {
	fn from(_: AuthError) -> Self {
		DomainError::Unauthenticated
	}
}

impl From<MoneyError> for DomainError {
	fn from(err: MoneyError) -> Self {
		DomainError::InvalidInput(err.to_string())
	}
}

impl From<StoreError> for DomainError {
	fn from(err: StoreError) -> Self {
		match err {
			StoreError::NotFound(m) => DomainError::NotFound(m),
			StoreError::DuplicateKey(m) => DomainError::DuplicateKey(m),
			StoreError::Conflict => DomainError::Conflict,
			StoreError::Internal(m) => DomainError::Internal(m),
		}
	}
}

impl From<LedgerError> for DomainError {
	fn from(err: LedgerError) -> Self {
		match err {
			LedgerError::NotFound(m) => DomainError::NotFound(m),
			LedgerError::DuplicateKey(m) => DomainError::DuplicateKey(m),
			LedgerError::Conflict => DomainError::Conflict,
			LedgerError::Internal(m) => DomainError::Internal(m),
		}
	}
}

impl From<ReservationError> for DomainError {
	fn from(err: ReservationError) -> Self {
		match err {
			ReservationError::NotFound(m) => DomainError::NotFound(m),
			ReservationError::InsufficientFunds { required, available } =>
				DomainError::InsufficientFunds { required, available },
			ReservationError::DuplicateKey(m) => DomainError::DuplicateKey(m),
			ReservationError::Conflict => DomainError::Conflict,
			ReservationError::Internal(m) => DomainError::Internal(m),
		}
	}
}

impl From<RateError> for DomainError {
	fn from(err: RateError) -> Self {
		match err {
			RateError::RateUnavailable { from, to } => DomainError::RateUnavailable { from, to },
			RateError::InvalidAmount(e) => DomainError::InvalidInput(e.to_string()),
			RateError::Internal(m) => DomainError::Internal(m),
		}
	}
}

impl From<TransferError> for DomainError {
	fn from(err: TransferError) -> Self {
		match err {
			TransferError::NotFound(m) => DomainError::NotFound(m),
			TransferError::InvalidInput(m) => DomainError::InvalidInput(m),
			TransferError::InsufficientFunds { required, available } =>
				DomainError::InsufficientFunds { required, available },
			TransferError::Conflict => DomainError::Conflict,
			TransferError::Internal(m) => DomainError::Internal(m),
		}
	}
}

impl From<HistoryError> for DomainError {
	fn from(err: HistoryError) -> Self {
		match err {
			HistoryError::InvalidRange => DomainError::InvalidInput("start must be <= end".into()),
			HistoryError::Internal(m) => DomainError::Internal(m),
		}
	}
}

impl From<OrderError> for DomainError {
	fn from(err: OrderError) -> Self {
		match err {
			OrderError::NotFound(m) => DomainError::NotFound(m),
			OrderError::Forbidden(m) => DomainError::Forbidden(m),
			OrderError::InvalidInput(m) => DomainError::InvalidInput(m),
			OrderError::InvalidTransition { current, attempted } =>
				DomainError::InvalidTransition { current, attempted: attempted.to_string() },
			OrderError::InsufficientFunds { required, available } =>
				DomainError::InsufficientFunds { required, available },
			OrderError::PaymentMethodMismatch(m) => DomainError::PaymentMethodMismatch(m),
			OrderError::Conflict => DomainError::Conflict,
			OrderError::Internal(m) => DomainError::Internal(m),
		}
	}
}
