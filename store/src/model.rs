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

//! The entities of `spec.md` §3, as plain Rust types. Every identifier is an
//! opaque newtype over `i64` internally; the API boundary is responsible for
//! the string <-> integer conversion (see `spec.md` §9's note on loose id
//! coercion, which this workspace deliberately does not repeat).

use chrono::{DateTime, Utc};
use exchange_money::Money;
use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
	($name:ident) => {
		#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
		pub struct $name(pub i64);

		impl std::fmt::Display for $name {
			fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
				write!(f, "{}", self.0)
			}
		}
	};
}

id_newtype!(UserId);
id_newtype!(FiatWalletId);
id_newtype!(VirtualAccountId);
id_newtype!(CryptoWalletId);
id_newtype!(TransactionId);
id_newtype!(ExchangeRateId);
id_newtype!(AdId);
id_newtype!(PaymentMethodId);
id_newtype!(OrderId);
id_newtype!(ReservationId);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
	pub id: UserId,
	pub email: String,
	pub phone: String,
	pub email_verified: bool,
	pub phone_verified: bool,
	pub kyc_verified: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FiatWallet {
	pub id: FiatWalletId,
	pub user_id: UserId,
	pub currency: String,
	pub balance: Money,
	pub locked_balance: Money,
	pub active: bool,
}

impl FiatWallet {
	/// `balance - lockedBalance`, the amount the user may spend (Invariant F1).
	pub fn available(&self) -> Money {
		self.balance.sub(&self.locked_balance)
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualAccount {
	pub id: VirtualAccountId,
	pub user_id: UserId,
	pub blockchain: String,
	pub currency: String,
	pub account_balance: Money,
	pub available_balance: Money,
	pub active: bool,
	pub frozen: bool,
}

impl VirtualAccount {
	/// `accountBalance - availableBalance`, the amount committed to in-flight
	/// P2P orders (Invariant V1, audited by P-escrow-released).
	pub fn escrowed(&self) -> Money {
		self.account_balance.sub(&self.available_balance)
	}
}

/// A synthetic anchor for crypto ledger entries; carries no authoritative
/// balance (`VirtualAccount` is authoritative for crypto balances).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CryptoWallet {
	pub id: CryptoWalletId,
	pub user_id: UserId,
	pub currency: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WalletRef {
	Fiat(FiatWalletId),
	Crypto(CryptoWalletId),
}

impl WalletRef {
	pub fn raw_id(self) -> i64 {
		match self {
			WalletRef::Fiat(id) => id.0,
			WalletRef::Crypto(id) => id.0,
		}
	}

	pub fn kind(self) -> &'static str {
		match self {
			WalletRef::Fiat(_) => "fiat",
			WalletRef::Crypto(_) => "crypto",
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
	Deposit,
	Withdrawal,
	Transfer,
	Conversion,
	P2p,
	BillPayment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
	Pending,
	Processing,
	Completed,
	Failed,
}

/// The tagged P2P leg a `Transaction` represents, promoted out of the source
/// system's free-form metadata map per `spec.md` §9.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum P2pStep {
	OrderAccepted,
	PaymentReceived,
	CryptoFrozen,
	CryptoDebited,
	CryptoCredited,
	FiatSent,
	FiatReceived,
	FiatDebited,
	FiatCredited,
}

/// An immutable ledger entry (`spec.md` §3 "Transaction").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
	pub id: TransactionId,
	pub wallet: WalletRef,
	pub tx_type: TransactionType,
	pub status: TransactionStatus,
	pub amount: Money,
	pub currency: String,
	pub fee: Money,
	pub reference: String,
	pub channel: String,
	pub description: String,
	pub metadata: serde_json::Value,
	pub p2p_step: Option<P2pStep>,
	pub created_at: DateTime<Utc>,
	pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeRate {
	pub id: ExchangeRateId,
	pub from_currency: String,
	pub to_currency: String,
	pub rate: Money,
	pub inverse_rate: Option<Money>,
	pub active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdType {
	Buy,
	Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdStatus {
	Available,
	Unavailable,
	Paused,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct P2pAd {
	pub id: AdId,
	pub vendor_user_id: UserId,
	pub ad_type: AdType,
	pub crypto_currency: String,
	pub fiat_currency: String,
	pub price: Money,
	pub volume: Money,
	pub min_order: Money,
	pub max_order: Money,
	pub auto_accept: bool,
	pub accepted_payment_method_ids: Vec<PaymentMethodId>,
	pub processing_time_minutes: i64,
	pub status: AdStatus,
	pub is_online: bool,
	pub orders_received: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethodType {
	BankAccount,
	MobileMoney,
	RhinoxpayId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPaymentMethod {
	pub id: PaymentMethodId,
	pub user_id: UserId,
	pub method_type: PaymentMethodType,
	pub bank_name: Option<String>,
	pub provider_id: Option<String>,
	pub rhinoxpay_currency: Option<String>,
	pub is_active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentChannel {
	Offline,
	RhinoxpayId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
	Pending,
	AwaitingPayment,
	PaymentMade,
	AwaitingCoinRelease,
	Completed,
	Cancelled,
	Expired,
	Disputed,
	Refunded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct P2pOrder {
	pub id: OrderId,
	pub ad_id: AdId,
	pub vendor_user_id: UserId,
	pub counterparty_user_id: UserId,
	pub ad_type: AdType,
	pub crypto_currency: String,
	pub fiat_currency: String,
	pub crypto_amount: Money,
	pub fiat_amount: Money,
	pub price: Money,
	pub payment_method_id: PaymentMethodId,
	pub payment_channel: PaymentChannel,
	pub status: OrderStatus,
	/// Cached role ids, derived once at creation purely from `ad_type` and
	/// never consulted to *determine* roles again (`spec.md` §4.6/§9) — role
	/// resolution always recomputes from `ad_type`; these are an audit cache.
	pub buyer_id: UserId,
	pub seller_id: UserId,
	pub processing_time_minutes: i64,
	pub metadata: serde_json::Value,
	pub created_at: DateTime<Utc>,
	pub accepted_at: Option<DateTime<Utc>>,
	pub expires_at: Option<DateTime<Utc>>,
	pub payment_made_at: Option<DateTime<Utc>>,
	pub payment_received_at: Option<DateTime<Utc>>,
	pub completed_at: Option<DateTime<Utc>>,
	pub cancelled_at: Option<DateTime<Utc>>,
}

/// What asset class a reservation covers; fiat locks `lockedBalance`, crypto
/// freezes reduce `availableBalance` only (`spec.md` §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationKind {
	FiatLock,
	CryptoFreeze,
}

/// An outstanding (or historical) reservation against a wallet, keyed by a
/// caller-supplied correlation id (typically an order reference), used to
/// reject double-release/double-freeze (`spec.md` §4.4, §5 idempotency).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
	pub id: ReservationId,
	pub kind: ReservationKind,
	pub wallet_id: i64,
	pub correlation: String,
	pub amount: Money,
	pub created_at: DateTime<Utc>,
	pub released_at: Option<DateTime<Utc>>,
}
