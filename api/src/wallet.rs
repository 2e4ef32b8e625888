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

//! `spec.md` §6 wallet operations: `createWallet`, `listWallets`,
//! `getBalances`. Thin reads/inserts over the store; balance mutation
//! itself always goes through the Reservation Engine or Transfer Executor,
//! never through this service.

use exchange_auth::Principal;
use exchange_money::Money;
use exchange_rates::RateService;
use exchange_store::Scope;

use crate::dto::{BalancesView, FiatWalletView, VirtualAccountView, WalletKind};
use crate::error::DomainError;

pub struct WalletService {
	rates: RateService,
}

impl WalletService {
	pub fn new() -> Self {
		Self { rates: RateService::new() }
	}

	#[tracing::instrument(skip(self, scope))]
	pub fn create_wallet(
		&self,
		scope: &Scope<'_>,
		caller: Principal,
		currency: &str,
		blockchain: Option<&str>,
		kind: WalletKind,
	) -> Result<(), DomainError> {
		match kind {
			WalletKind::Fiat => {
				if scope.fiat_wallets().get_by_user_currency(caller.user_id(), currency)?.is_some() {
					return Err(DomainError::DuplicateKey(format!("fiat wallet for {currency} already exists")));
				}
				scope.fiat_wallets().insert(caller.user_id(), currency, &Money::zero(), &Money::zero())?;
			}
			WalletKind::Crypto => {
				let blockchain = blockchain
					.ok_or_else(|| DomainError::InvalidInput("blockchain is required for a crypto wallet".into()))?;
				if scope
					.virtual_accounts()
					.get_by_user_blockchain_currency(caller.user_id(), blockchain, currency)?
					.is_some()
				{
					return Err(DomainError::DuplicateKey(format!(
						"virtual account for {blockchain}/{currency} already exists"
					)));
				}
				scope.virtual_accounts().insert(
					caller.user_id(),
					blockchain,
					currency,
					&Money::zero(),
					&Money::zero(),
				)?;
			}
		}
		Ok(())
	}

	#[tracing::instrument(skip(self, scope))]
	pub fn list_wallets(
		&self,
		scope: &Scope<'_>,
		caller: Principal,
	) -> Result<(Vec<FiatWalletView>, Vec<VirtualAccountView>), DomainError> {
		let fiat = scope
			.fiat_wallets()
			.list_by_user(caller.user_id())?
			.into_iter()
			.map(|w| FiatWalletView {
				id: w.id,
				currency: w.currency,
				available: w.available(),
				balance: w.balance,
				locked_balance: w.locked_balance,
				active: w.active,
			})
			.collect();
		let crypto = scope
			.virtual_accounts()
			.list_by_user(caller.user_id())?
			.into_iter()
			.map(|a| VirtualAccountView {
				id: a.id,
				blockchain: a.blockchain,
				currency: a.currency,
				escrowed: a.escrowed(),
				account_balance: a.account_balance,
				available_balance: a.available_balance,
				active: a.active,
				frozen: a.frozen,
			})
			.collect();
		Ok((fiat, crypto))
	}

	/// `getBalances(user)`: the two lists plus a USD-normalized total,
	/// resolved through the Rate Service the same way `HistoryAggregator`
	/// normalizes type summaries (`spec.md` §4.10).
	#[tracing::instrument(skip(self, scope))]
	pub fn get_balances(&self, scope: &Scope<'_>, caller: Principal) -> Result<BalancesView, DomainError> {
		let (fiat, crypto) = self.list_wallets(scope, caller)?;
		let mut total_usd = Money::zero();
		for wallet in &fiat {
			total_usd = total_usd.add(&self.to_usd(scope, &wallet.balance, &wallet.currency));
		}
		for account in &crypto {
			total_usd = total_usd.add(&self.to_usd(scope, &account.account_balance, &account.currency));
		}
		Ok(BalancesView { fiat, crypto, total_usd: total_usd.round(2) })
	}

	fn to_usd(&self, scope: &Scope<'_>, amount: &Money, currency: &str) -> Money {
		match self.rates.convert(scope, amount, currency, "USD", 2) {
			Ok(usd) => usd,
			Err(err) => {
				tracing::warn!(currency, error = %err, "no USD rate available, excluding wallet from total");
				Money::zero()
			}
		}
	}
}

impl Default for WalletService {
	fn default() -> Self {
		Self::new()
	}
}
