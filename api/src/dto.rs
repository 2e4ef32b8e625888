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

//! Request/response shapes for the external interface (`spec.md` §6). These
//! are the only place in the workspace that know about wire representation:
//! amounts ride as [`exchange_money::Money`] (already a decimal string over
//! `serde`), timestamps as `chrono::DateTime<Utc>` (RFC-3339 over `serde`),
//! and ids as opaque integers wrapped in the core's newtypes. No HTTP
//! framing, routing or OpenAPI schema lives here (`spec.md` §1: explicitly
//! out of scope).

use chrono::{DateTime, Utc};
use exchange_money::Money;
use exchange_store::{
	AdId, AdStatus, AdType, FiatWalletId, OrderId, OrderStatus, PaymentChannel, PaymentMethodId,
	PaymentMethodType, TransactionId, TransactionStatus, TransactionType, UserId, VirtualAccountId,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WalletKind {
	Fiat,
	Crypto,
}

#[derive(Debug, Clone, Serialize)]
pub struct FiatWalletView {
	pub id: FiatWalletId,
	pub currency: String,
	pub balance: Money,
	pub locked_balance: Money,
	pub available: Money,
	pub active: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct VirtualAccountView {
	pub id: VirtualAccountId,
	pub blockchain: String,
	pub currency: String,
	pub account_balance: Money,
	pub available_balance: Money,
	pub escrowed: Money,
	pub active: bool,
	pub frozen: bool,
}

/// `getBalances(user)`: fiat list + crypto list + USD-normalized totals.
#[derive(Debug, Clone, Serialize)]
pub struct BalancesView {
	pub fiat: Vec<FiatWalletView>,
	pub crypto: Vec<VirtualAccountView>,
	pub total_usd: Money,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserProfileView {
	pub id: UserId,
	pub email: String,
	pub phone: String,
	pub email_verified: bool,
	pub phone_verified: bool,
	pub kyc_verified: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateAdRequest {
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
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct UpdateAdRequest {
	pub price: Option<Money>,
	pub volume: Option<Money>,
	pub min_order: Option<Money>,
	pub max_order: Option<Money>,
	pub auto_accept: Option<bool>,
	pub accepted_payment_method_ids: Option<Vec<PaymentMethodId>>,
	pub processing_time_minutes: Option<i64>,
	pub is_online: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AdView {
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

/// The ad as shown to a prospective counterparty: the `adType` label is
/// inverted to the user-facing "what can I do with this ad" action, per
/// `spec.md` §4.6 ("the user action shown externally is the inverse of
/// `adType`"). Internal code must never switch on this label.
#[derive(Debug, Clone, Serialize)]
pub struct AdPublicView {
	#[serde(flatten)]
	pub ad: AdView,
	pub user_action: &'static str,
}

#[derive(Debug, Clone, Default)]
pub struct AdFilters {
	pub status: Option<AdStatus>,
	pub crypto_currency: Option<String>,
	pub fiat_currency: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentMethodView {
	pub id: PaymentMethodId,
	pub method_type: PaymentMethodType,
	pub bank_name: Option<String>,
	pub provider_id: Option<String>,
	pub rhinoxpay_currency: Option<String>,
	pub is_active: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderView {
	pub id: OrderId,
	pub ad_id: AdId,
	pub vendor_user_id: UserId,
	pub counterparty_user_id: UserId,
	pub buyer_id: UserId,
	pub seller_id: UserId,
	pub crypto_currency: String,
	pub fiat_currency: String,
	pub crypto_amount: Money,
	pub fiat_amount: Money,
	pub price: Money,
	pub payment_method_id: PaymentMethodId,
	pub payment_channel: PaymentChannel,
	pub status: OrderStatus,
	pub created_at: DateTime<Utc>,
	pub accepted_at: Option<DateTime<Utc>>,
	pub expires_at: Option<DateTime<Utc>>,
	pub payment_made_at: Option<DateTime<Utc>>,
	pub payment_received_at: Option<DateTime<Utc>>,
	pub completed_at: Option<DateTime<Utc>>,
	pub cancelled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct OrderFilters {
	pub status: Option<OrderStatus>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RateView {
	pub from_currency: String,
	pub to_currency: String,
	pub rate: Money,
	pub inverse_rate: Option<Money>,
	pub active: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransactionView {
	pub id: TransactionId,
	pub tx_type: TransactionType,
	pub status: TransactionStatus,
	pub amount: Money,
	pub currency: String,
	pub fee: Money,
	pub reference: String,
	pub channel: String,
	pub description: String,
	pub created_at: DateTime<Utc>,
	pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodRequest {
	D,
	W,
	M,
	Custom { start: DateTime<Utc>, end: DateTime<Utc> },
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryView {
	pub incoming: Money,
	pub outgoing: Money,
	pub net: Money,
	pub chart: Vec<ChartBucketView>,
	pub type_summary: Vec<TypeSummaryView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChartBucketView {
	pub label: String,
	pub total: Money,
}

#[derive(Debug, Clone, Serialize)]
pub struct TypeSummaryView {
	pub type_label: &'static str,
	pub currency: String,
	pub wallet_kind: &'static str,
	pub count: u64,
	pub total_native: Money,
	pub total_usd: Money,
}
