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

use exchange_ledger::LedgerError;
use exchange_reservation::ReservationError;
use exchange_store::{OrderStatus, StoreError};
use exchange_transfer::TransferError;

use crate::payment_methods::PaymentMethodError;

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
	#[error("not found: {0}")]
	NotFound(String),
	#[error("forbidden: {0}")]
	Forbidden(String),
	#[error("invalid input: {0}")]
	InvalidInput(String),
	#[error("invalid transition: order is in {current:?}, cannot {attempted}")]
	InvalidTransition { current: OrderStatus, attempted: &'static str },
	#[error("insufficient funds: required {required}, available {available}")]
	InsufficientFunds { required: String, available: String },
	#[error("payment method mismatch: {0}")]
	PaymentMethodMismatch(String),
	#[error("serialization conflict")]
	Conflict,
	#[error("internal order error: {0}")]
	Internal(String),
}

impl From<StoreError> for OrderError {
	fn from(err: StoreError) -> Self {
		match err {
			StoreError::NotFound(m) => OrderError::NotFound(m),
			StoreError::DuplicateKey(m) => OrderError::Internal(format!("duplicate key: {m}")),
			StoreError::Conflict => OrderError::Conflict,
			StoreError::Internal(m) => OrderError::Internal(m),
		}
	}
}

impl From<LedgerError> for OrderError {
	fn from(err: LedgerError) -> Self {
		match err {
			LedgerError::NotFound(m) => OrderError::NotFound(m),
			LedgerError::DuplicateKey(m) => OrderError::Internal(format!("duplicate key: {m}")),
			LedgerError::Conflict => OrderError::Conflict,
			LedgerError::Internal(m) => OrderError::Internal(m),
		}
	}
}

impl From<ReservationError> for OrderError {
	fn from(err: ReservationError) -> Self {
		match err {
			ReservationError::NotFound(m) => OrderError::NotFound(m),
			ReservationError::InsufficientFunds { required, available } =>
				OrderError::InsufficientFunds { required, available },
			ReservationError::DuplicateKey(m) => OrderError::Internal(format!("duplicate key: {m}")),
			ReservationError::Conflict => OrderError::Conflict,
			ReservationError::Internal(m) => OrderError::Internal(m),
		}
	}
}

impl From<TransferError> for OrderError {
	fn from(err: TransferError) -> Self {
		match err {
			TransferError::NotFound(m) => OrderError::NotFound(m),
			TransferError::InvalidInput(m) => OrderError::InvalidInput(m),
			TransferError::InsufficientFunds { required, available } =>
				OrderError::InsufficientFunds { required, available },
			TransferError::Conflict => OrderError::Conflict,
			TransferError::Internal(m) => OrderError::Internal(m),
		}
	}
}

impl From<PaymentMethodError> for OrderError {
	fn from(err: PaymentMethodError) -> Self {
		OrderError::PaymentMethodMismatch(err.to_string())
	}
}
