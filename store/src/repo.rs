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

//! Typed repositories, one per `spec.md` §3 entity, each a thin wrapper
//! around the current transaction's connection. Mirrors the shape of
//! `engine::quoter::database::Database`'s per-event-type insert/query
//! helpers, but generalized to real repository types instead of one big
//! `LocalEvent` enum.

use chrono::{DateTime, Utc};
use exchange_money::Money;
use rusqlite::{params, OptionalExtension, Row};

use crate::error::StoreError;
use crate::model::*;

fn parse_money(raw: String) -> Result<Money, StoreError> {
	Money::parse(&raw).map_err(|e| StoreError::Internal(format!("corrupt decimal in store: {e}")))
}

fn parse_time(raw: String) -> Result<DateTime<Utc>, StoreError> {
	DateTime::parse_from_rfc3339(&raw)
		.map(|dt| dt.with_timezone(&Utc))
		.map_err(|e| StoreError::Internal(format!("corrupt timestamp in store: {e}")))
}

fn opt_time(raw: Option<String>) -> Result<Option<DateTime<Utc>>, StoreError> {
	raw.map(parse_time).transpose()
}

macro_rules! repo {
	($name:ident) => {
		pub struct $name<'a> {
			pub(crate) conn: &'a rusqlite::Transaction<'a>,
		}
	};
}

repo!(UserRepo);
repo!(FiatWalletRepo);
repo!(VirtualAccountRepo);
repo!(CryptoWalletRepo);
repo!(TransactionRepo);
repo!(RateRepo);
repo!(AdRepo);
repo!(PaymentMethodRepo);
repo!(OrderRepo);
repo!(ReservationRepo);

impl<'a> UserRepo<'a> {
	pub fn insert(&self, email: &str, phone: &str) -> Result<User, StoreError> {
		self.conn.execute(
			"INSERT INTO users(email, phone, email_verified, phone_verified, kyc_verified)
			 VALUES (?1, ?2, 0, 0, 0)",
			params![email, phone],
		)?;
		self.get(UserId(self.conn.last_insert_rowid()))
	}

	pub fn get(&self, id: UserId) -> Result<User, StoreError> {
		self.conn
			.query_row(
				"SELECT id, email, phone, email_verified, phone_verified, kyc_verified
				 FROM users WHERE id = ?1",
				params![id.0],
				row_to_user,
			)
			.optional()?
			.ok_or_else(|| StoreError::NotFound(format!("user {id}")))
	}
}

fn row_to_user(row: &Row) -> rusqlite::Result<User> {
	Ok(User {
		id: UserId(row.get(0)?),
		email: row.get(1)?,
		phone: row.get(2)?,
		email_verified: row.get::<_, i64>(3)? != 0,
		phone_verified: row.get::<_, i64>(4)? != 0,
		kyc_verified: row.get::<_, i64>(5)? != 0,
	})
}

impl<'a> FiatWalletRepo<'a> {
	pub fn insert(
		&self,
		user_id: UserId,
		currency: &str,
		balance: &Money,
		locked_balance: &Money,
	) -> Result<FiatWallet, StoreError> {
		self.conn.execute(
			"INSERT INTO fiat_wallets(user_id, currency, balance, locked_balance, active)
			 VALUES (?1, ?2, ?3, ?4, 1)",
			params![
				user_id.0,
				currency,
				balance.to_canonical_string(),
				locked_balance.to_canonical_string()
			],
		)?;
		self.get(FiatWalletId(self.conn.last_insert_rowid()))
	}

	pub fn get(&self, id: FiatWalletId) -> Result<FiatWallet, StoreError> {
		self.conn
			.query_row(
				"SELECT id, user_id, currency, balance, locked_balance, active
				 FROM fiat_wallets WHERE id = ?1",
				params![id.0],
				row_to_fiat_wallet,
			)
			.optional()?
			.ok_or_else(|| StoreError::NotFound(format!("fiat wallet {id}")))
	}

	pub fn get_by_user_currency(
		&self,
		user_id: UserId,
		currency: &str,
	) -> Result<Option<FiatWallet>, StoreError> {
		Ok(self
			.conn
			.query_row(
				"SELECT id, user_id, currency, balance, locked_balance, active
				 FROM fiat_wallets WHERE user_id = ?1 AND currency = ?2",
				params![user_id.0, currency],
				row_to_fiat_wallet,
			)
			.optional()?
			.transpose()?)
	}

	pub fn list_by_user(&self, user_id: UserId) -> Result<Vec<FiatWallet>, StoreError> {
		let mut stmt = self.conn.prepare(
			"SELECT id, user_id, currency, balance, locked_balance, active
			 FROM fiat_wallets WHERE user_id = ?1 ORDER BY currency",
		)?;
		let rows = stmt.query_map(params![user_id.0], row_to_fiat_wallet)?;
		rows.collect::<rusqlite::Result<Vec<_>>>()?.into_iter().collect()
	}

	/// Writes back `balance`/`lockedBalance`. Callers must have already
	/// checked F1 (`spec.md` §3) before calling this.
	pub fn set_balances(
		&self,
		id: FiatWalletId,
		balance: &Money,
		locked_balance: &Money,
	) -> Result<(), StoreError> {
		let changed = self.conn.execute(
			"UPDATE fiat_wallets SET balance = ?1, locked_balance = ?2 WHERE id = ?3",
			params![balance.to_canonical_string(), locked_balance.to_canonical_string(), id.0],
		)?;
		if changed == 0 {
			return Err(StoreError::NotFound(format!("fiat wallet {id}")));
		}
		Ok(())
	}
}

fn row_to_fiat_wallet(row: &Row) -> rusqlite::Result<Result<FiatWallet, StoreError>> {
	Ok((|| {
		Ok(FiatWallet {
			id: FiatWalletId(row.get(0)?),
			user_id: UserId(row.get(1)?),
			currency: row.get(2)?,
			balance: parse_money(row.get(3)?)?,
			locked_balance: parse_money(row.get(4)?)?,
			active: row.get::<_, i64>(5)? != 0,
		})
	})())
}

impl<'a> VirtualAccountRepo<'a> {
	pub fn insert(
		&self,
		user_id: UserId,
		blockchain: &str,
		currency: &str,
		account_balance: &Money,
		available_balance: &Money,
	) -> Result<VirtualAccount, StoreError> {
		self.conn.execute(
			"INSERT INTO virtual_accounts(user_id, blockchain, currency, account_balance, available_balance, active, frozen)
			 VALUES (?1, ?2, ?3, ?4, ?5, 1, 0)",
			params![
				user_id.0,
				blockchain,
				currency,
				account_balance.to_canonical_string(),
				available_balance.to_canonical_string()
			],
		)?;
		self.get(VirtualAccountId(self.conn.last_insert_rowid()))
	}

	pub fn get(&self, id: VirtualAccountId) -> Result<VirtualAccount, StoreError> {
		self.conn
			.query_row(
				"SELECT id, user_id, blockchain, currency, account_balance, available_balance, active, frozen
				 FROM virtual_accounts WHERE id = ?1",
				params![id.0],
				row_to_virtual_account,
			)
			.optional()?
			.ok_or_else(|| StoreError::NotFound(format!("virtual account {id}")))?
	}

	pub fn get_by_user_blockchain_currency(
		&self,
		user_id: UserId,
		blockchain: &str,
		currency: &str,
	) -> Result<Option<VirtualAccount>, StoreError> {
		self.conn
			.query_row(
				"SELECT id, user_id, blockchain, currency, account_balance, available_balance, active, frozen
				 FROM virtual_accounts WHERE user_id = ?1 AND blockchain = ?2 AND currency = ?3",
				params![user_id.0, blockchain, currency],
				row_to_virtual_account,
			)
			.optional()?
			.transpose()
	}

	pub fn list_by_user(&self, user_id: UserId) -> Result<Vec<VirtualAccount>, StoreError> {
		let mut stmt = self.conn.prepare(
			"SELECT id, user_id, blockchain, currency, account_balance, available_balance, active, frozen
			 FROM virtual_accounts WHERE user_id = ?1 ORDER BY blockchain, currency",
		)?;
		let rows = stmt.query_map(params![user_id.0], row_to_virtual_account)?;
		rows.collect::<rusqlite::Result<Vec<_>>>()?.into_iter().collect()
	}

	pub fn set_balances(
		&self,
		id: VirtualAccountId,
		account_balance: &Money,
		available_balance: &Money,
	) -> Result<(), StoreError> {
		let changed = self.conn.execute(
			"UPDATE virtual_accounts SET account_balance = ?1, available_balance = ?2 WHERE id = ?3",
			params![
				account_balance.to_canonical_string(),
				available_balance.to_canonical_string(),
				id.0
			],
		)?;
		if changed == 0 {
			return Err(StoreError::NotFound(format!("virtual account {id}")));
		}
		Ok(())
	}
}

fn row_to_virtual_account(row: &Row) -> rusqlite::Result<Result<VirtualAccount, StoreError>> {
	Ok((|| {
		Ok(VirtualAccount {
			id: VirtualAccountId(row.get(0)?),
			user_id: UserId(row.get(1)?),
			blockchain: row.get(2)?,
			currency: row.get(3)?,
			account_balance: parse_money(row.get(4)?)?,
			available_balance: parse_money(row.get(5)?)?,
			active: row.get::<_, i64>(6)? != 0,
			frozen: row.get::<_, i64>(7)? != 0,
		})
	})())
}

impl<'a> CryptoWalletRepo<'a> {
	pub fn find_or_create(&self, user_id: UserId, currency: &str) -> Result<CryptoWallet, StoreError> {
		if let Some(existing) = self
			.conn
			.query_row(
				"SELECT id, user_id, currency FROM crypto_wallets WHERE user_id = ?1 AND currency = ?2",
				params![user_id.0, currency],
				|row| {
					Ok(CryptoWallet {
						id: CryptoWalletId(row.get(0)?),
						user_id: UserId(row.get(1)?),
						currency: row.get(2)?,
					})
				},
			)
			.optional()?
		{
			return Ok(existing);
		}
		self.conn.execute(
			"INSERT INTO crypto_wallets(user_id, currency) VALUES (?1, ?2)",
			params![user_id.0, currency],
		)?;
		Ok(CryptoWallet {
			id: CryptoWalletId(self.conn.last_insert_rowid()),
			user_id,
			currency: currency.to_string(),
		})
	}

	pub fn get(&self, id: CryptoWalletId) -> Result<CryptoWallet, StoreError> {
		self.conn
			.query_row(
				"SELECT id, user_id, currency FROM crypto_wallets WHERE id = ?1",
				params![id.0],
				|row| {
					Ok(CryptoWallet {
						id: CryptoWalletId(row.get(0)?),
						user_id: UserId(row.get(1)?),
						currency: row.get(2)?,
					})
				},
			)
			.optional()?
			.ok_or_else(|| StoreError::NotFound(format!("crypto wallet {id}")))
	}

	pub fn list_by_user(&self, user_id: UserId) -> Result<Vec<CryptoWallet>, StoreError> {
		let mut stmt = self
			.conn
			.prepare("SELECT id, user_id, currency FROM crypto_wallets WHERE user_id = ?1")?;
		let rows = stmt.query_map(params![user_id.0], |row| {
			Ok(CryptoWallet { id: CryptoWalletId(row.get(0)?), user_id: UserId(row.get(1)?), currency: row.get(2)? })
		})?;
		rows.collect::<rusqlite::Result<Vec<_>>>().map_err(StoreError::from)
	}
}

impl<'a> TransactionRepo<'a> {
	#[allow(clippy::too_many_arguments)]
	pub fn insert(
		&self,
		wallet: WalletRef,
		tx_type: TransactionType,
		status: TransactionStatus,
		amount: &Money,
		currency: &str,
		fee: &Money,
		reference: &str,
		channel: &str,
		description: &str,
		metadata: &serde_json::Value,
		p2p_step: Option<P2pStep>,
		created_at: DateTime<Utc>,
		completed_at: Option<DateTime<Utc>>,
	) -> Result<Transaction, StoreError> {
		let type_str = serde_json::to_value(tx_type).unwrap().as_str().unwrap().to_string();
		let status_str = serde_json::to_value(status).unwrap().as_str().unwrap().to_string();
		let step_str = p2p_step.map(|s| serde_json::to_value(s).unwrap().as_str().unwrap().to_string());
		self.conn
			.execute(
				"INSERT INTO transactions(
					wallet_kind, wallet_id, tx_type, status, amount, currency, fee,
					reference, channel, description, metadata, p2p_step, created_at, completed_at
				) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
				params![
					wallet.kind(),
					wallet.raw_id(),
					type_str,
					status_str,
					amount.to_canonical_string(),
					currency,
					fee.to_canonical_string(),
					reference,
					channel,
					description,
					metadata.to_string(),
					step_str,
					created_at.to_rfc3339(),
					completed_at.map(|t| t.to_rfc3339()),
				],
			)
			.map_err(|e| match StoreError::from(e) {
				StoreError::DuplicateKey(_) =>
					StoreError::DuplicateKey(format!("transaction reference {reference}")),
				other => other,
			})?;
		self.get(TransactionId(self.conn.last_insert_rowid()))
	}

	pub fn get(&self, id: TransactionId) -> Result<Transaction, StoreError> {
		self.conn
			.query_row(&format!("{SELECT_TX} WHERE id = ?1"), params![id.0], row_to_transaction)
			.optional()?
			.ok_or_else(|| StoreError::NotFound(format!("transaction {id}")))?
	}

	pub fn get_by_reference(&self, reference: &str) -> Result<Option<Transaction>, StoreError> {
		self.conn
			.query_row(&format!("{SELECT_TX} WHERE reference = ?1"), params![reference], row_to_transaction)
			.optional()?
			.transpose()
	}

	pub fn list_by_wallet_in_range(
		&self,
		wallet: WalletRef,
		start: DateTime<Utc>,
		end: DateTime<Utc>,
	) -> Result<Vec<Transaction>, StoreError> {
		let mut stmt = self.conn.prepare(&format!(
			"{SELECT_TX} WHERE wallet_kind = ?1 AND wallet_id = ?2 AND created_at >= ?3 AND created_at <= ?4
			 ORDER BY created_at ASC"
		))?;
		let rows = stmt.query_map(
			params![wallet.kind(), wallet.raw_id(), start.to_rfc3339(), end.to_rfc3339()],
			row_to_transaction,
		)?;
		rows.collect::<rusqlite::Result<Vec<_>>>()?.into_iter().collect()
	}

	pub fn list_by_wallets_in_range(
		&self,
		wallets: &[WalletRef],
		start: DateTime<Utc>,
		end: DateTime<Utc>,
	) -> Result<Vec<Transaction>, StoreError> {
		let mut all = Vec::new();
		for wallet in wallets {
			all.extend(self.list_by_wallet_in_range(*wallet, start, end)?);
		}
		all.sort_by_key(|tx| tx.created_at);
		Ok(all)
	}
}

const SELECT_TX: &str = "SELECT id, wallet_kind, wallet_id, tx_type, status, amount, currency, fee,
	reference, channel, description, metadata, p2p_step, created_at, completed_at FROM transactions";

fn row_to_transaction(row: &Row) -> rusqlite::Result<Result<Transaction, StoreError>> {
	Ok((|| {
		let wallet_kind: String = row.get(1)?;
		let wallet_id: i64 = row.get(2)?;
		let wallet = match wallet_kind.as_str() {
			"fiat" => WalletRef::Fiat(FiatWalletId(wallet_id)),
			_ => WalletRef::Crypto(CryptoWalletId(wallet_id)),
		};
		let tx_type: String = row.get(3)?;
		let status: String = row.get(4)?;
		let p2p_step: Option<String> = row.get(12)?;
		let metadata_raw: String = row.get(11)?;
		Ok(Transaction {
			id: TransactionId(row.get(0)?),
			wallet,
			tx_type: serde_json::from_value(serde_json::Value::String(tx_type))
				.map_err(|e| StoreError::Internal(e.to_string()))?,
			status: serde_json::from_value(serde_json::Value::String(status))
				.map_err(|e| StoreError::Internal(e.to_string()))?,
			amount: parse_money(row.get(5)?)?,
			currency: row.get(6)?,
			fee: parse_money(row.get(7)?)?,
			reference: row.get(8)?,
			channel: row.get(9)?,
			description: row.get(10)?,
			metadata: serde_json::from_str(&metadata_raw)
				.map_err(|e| StoreError::Internal(e.to_string()))?,
			p2p_step: p2p_step
				.map(|s| serde_json::from_value(serde_json::Value::String(s)))
				.transpose()
				.map_err(|e| StoreError::Internal(e.to_string()))?,
			created_at: parse_time(row.get(13)?)?,
			completed_at: opt_time(row.get(14)?)?,
		})
	})())
}

impl<'a> RateRepo<'a> {
	pub fn upsert(
		&self,
		from_currency: &str,
		to_currency: &str,
		rate: &Money,
		inverse_rate: Option<&Money>,
	) -> Result<ExchangeRate, StoreError> {
		self.conn.execute(
			"INSERT INTO exchange_rates(from_currency, to_currency, rate, inverse_rate, active)
			 VALUES (?1, ?2, ?3, ?4, 1)
			 ON CONFLICT(from_currency, to_currency) DO UPDATE SET
				rate = excluded.rate, inverse_rate = excluded.inverse_rate, active = 1",
			params![
				from_currency,
				to_currency,
				rate.to_canonical_string(),
				inverse_rate.map(|m| m.to_canonical_string())
			],
		)?;
		self.get_by_pair(from_currency, to_currency)?
			.ok_or_else(|| StoreError::Internal("rate upsert did not persist".into()))
	}

	pub fn get_by_pair(
		&self,
		from_currency: &str,
		to_currency: &str,
	) -> Result<Option<ExchangeRate>, StoreError> {
		self.conn
			.query_row(
				"SELECT id, from_currency, to_currency, rate, inverse_rate, active
				 FROM exchange_rates WHERE from_currency = ?1 AND to_currency = ?2",
				params![from_currency, to_currency],
				row_to_rate,
			)
			.optional()?
			.transpose()
	}

	pub fn list(&self, active_only: bool) -> Result<Vec<ExchangeRate>, StoreError> {
		let sql = if active_only {
			"SELECT id, from_currency, to_currency, rate, inverse_rate, active FROM exchange_rates WHERE active = 1"
		} else {
			"SELECT id, from_currency, to_currency, rate, inverse_rate, active FROM exchange_rates"
		};
		let mut stmt = self.conn.prepare(sql)?;
		let rows = stmt.query_map([], row_to_rate)?;
		rows.collect::<rusqlite::Result<Vec<_>>>()?.into_iter().collect()
	}

	pub fn list_from_base(&self, base: &str) -> Result<Vec<ExchangeRate>, StoreError> {
		let mut stmt = self.conn.prepare(
			"SELECT id, from_currency, to_currency, rate, inverse_rate, active
			 FROM exchange_rates WHERE from_currency = ?1 AND active = 1",
		)?;
		let rows = stmt.query_map(params![base], row_to_rate)?;
		rows.collect::<rusqlite::Result<Vec<_>>>()?.into_iter().collect()
	}
}

fn row_to_rate(row: &Row) -> rusqlite::Result<Result<ExchangeRate, StoreError>> {
	Ok((|| {
		let inverse: Option<String> = row.get(4)?;
		Ok(ExchangeRate {
			id: ExchangeRateId(row.get(0)?),
			from_currency: row.get(1)?,
			to_currency: row.get(2)?,
			rate: parse_money(row.get(3)?)?,
			inverse_rate: inverse.map(parse_money).transpose()?,
			active: row.get::<_, i64>(5)? != 0,
		})
	})())
}

impl<'a> AdRepo<'a> {
	pub fn insert(&self, ad: &P2pAd) -> Result<P2pAd, StoreError> {
		self.conn.execute(
			"INSERT INTO p2p_ads(
				vendor_user_id, ad_type, crypto_currency, fiat_currency, price, volume,
				min_order, max_order, auto_accept, accepted_payment_method_ids,
				processing_time_minutes, status, is_online, orders_received
			) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
			params![
				ad.vendor_user_id.0,
				ad_type_str(ad.ad_type),
				ad.crypto_currency,
				ad.fiat_currency,
				ad.price.to_canonical_string(),
				ad.volume.to_canonical_string(),
				ad.min_order.to_canonical_string(),
				ad.max_order.to_canonical_string(),
				ad.auto_accept as i64,
				serde_json::to_string(&ad.accepted_payment_method_ids).unwrap(),
				ad.processing_time_minutes,
				ad_status_str(ad.status),
				ad.is_online as i64,
				ad.orders_received,
			],
		)?;
		self.get(AdId(self.conn.last_insert_rowid()))
	}

	pub fn get(&self, id: AdId) -> Result<P2pAd, StoreError> {
		self.conn
			.query_row(&format!("{SELECT_AD} WHERE id = ?1"), params![id.0], row_to_ad)
			.optional()?
			.ok_or_else(|| StoreError::NotFound(format!("ad {id}")))?
	}

	pub fn list_by_vendor(&self, vendor_user_id: UserId) -> Result<Vec<P2pAd>, StoreError> {
		let mut stmt = self.conn.prepare(&format!("{SELECT_AD} WHERE vendor_user_id = ?1"))?;
		let rows = stmt.query_map(params![vendor_user_id.0], row_to_ad)?;
		rows.collect::<rusqlite::Result<Vec<_>>>()?.into_iter().collect()
	}

	pub fn list_available(&self) -> Result<Vec<P2pAd>, StoreError> {
		let mut stmt = self.conn.prepare(&format!(
			"{SELECT_AD} WHERE status = 'available' AND is_online = 1"
		))?;
		let rows = stmt.query_map([], row_to_ad)?;
		rows.collect::<rusqlite::Result<Vec<_>>>()?.into_iter().collect()
	}

	pub fn update(&self, ad: &P2pAd) -> Result<(), StoreError> {
		let changed = self.conn.execute(
			"UPDATE p2p_ads SET ad_type = ?1, crypto_currency = ?2, fiat_currency = ?3, price = ?4,
				volume = ?5, min_order = ?6, max_order = ?7, auto_accept = ?8,
				accepted_payment_method_ids = ?9, processing_time_minutes = ?10, status = ?11,
				is_online = ?12, orders_received = ?13
			 WHERE id = ?14",
			params![
				ad_type_str(ad.ad_type),
				ad.crypto_currency,
				ad.fiat_currency,
				ad.price.to_canonical_string(),
				ad.volume.to_canonical_string(),
				ad.min_order.to_canonical_string(),
				ad.max_order.to_canonical_string(),
				ad.auto_accept as i64,
				serde_json::to_string(&ad.accepted_payment_method_ids).unwrap(),
				ad.processing_time_minutes,
				ad_status_str(ad.status),
				ad.is_online as i64,
				ad.orders_received,
				ad.id.0,
			],
		)?;
		if changed == 0 {
			return Err(StoreError::NotFound(format!("ad {}", ad.id)));
		}
		Ok(())
	}

	pub fn increment_orders_received(&self, id: AdId) -> Result<(), StoreError> {
		let changed = self
			.conn
			.execute("UPDATE p2p_ads SET orders_received = orders_received + 1 WHERE id = ?1", params![id.0])?;
		if changed == 0 {
			return Err(StoreError::NotFound(format!("ad {id}")));
		}
		Ok(())
	}
}

const SELECT_AD: &str = "SELECT id, vendor_user_id, ad_type, crypto_currency, fiat_currency, price, volume,
	min_order, max_order, auto_accept, accepted_payment_method_ids, processing_time_minutes, status,
	is_online, orders_received FROM p2p_ads";

fn ad_type_str(t: AdType) -> &'static str {
	match t {
		AdType::Buy => "buy",
		AdType::Sell => "sell",
	}
}

fn ad_status_str(s: AdStatus) -> &'static str {
	match s {
		AdStatus::Available => "available",
		AdStatus::Unavailable => "unavailable",
		AdStatus::Paused => "paused",
	}
}

fn row_to_ad(row: &Row) -> rusqlite::Result<Result<P2pAd, StoreError>> {
	Ok((|| {
		let ad_type: String = row.get(2)?;
		let status: String = row.get(12)?;
		let method_ids_raw: String = row.get(10)?;
		Ok(P2pAd {
			id: AdId(row.get(0)?),
			vendor_user_id: UserId(row.get(1)?),
			ad_type: if ad_type == "buy" { AdType::Buy } else { AdType::Sell },
			crypto_currency: row.get(3)?,
			fiat_currency: row.get(4)?,
			price: parse_money(row.get(5)?)?,
			volume: parse_money(row.get(6)?)?,
			min_order: parse_money(row.get(7)?)?,
			max_order: parse_money(row.get(8)?)?,
			auto_accept: row.get::<_, i64>(9)? != 0,
			accepted_payment_method_ids: serde_json::from_str(&method_ids_raw)
				.map_err(|e| StoreError::Internal(e.to_string()))?,
			processing_time_minutes: row.get(11)?,
			status: match status.as_str() {
				"available" => AdStatus::Available,
				"paused" => AdStatus::Paused,
				_ => AdStatus::Unavailable,
			},
			is_online: row.get::<_, i64>(13)? != 0,
			orders_received: row.get(14)?,
		})
	})())
}

impl<'a> PaymentMethodRepo<'a> {
	pub fn insert(&self, method: &UserPaymentMethod) -> Result<UserPaymentMethod, StoreError> {
		self.conn.execute(
			"INSERT INTO user_payment_methods(user_id, method_type, bank_name, provider_id, rhinoxpay_currency, is_active)
			 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
			params![
				method.user_id.0,
				payment_method_type_str(method.method_type),
				method.bank_name,
				method.provider_id,
				method.rhinoxpay_currency,
				method.is_active as i64,
			],
		)?;
		self.get(PaymentMethodId(self.conn.last_insert_rowid()))
	}

	pub fn get(&self, id: PaymentMethodId) -> Result<UserPaymentMethod, StoreError> {
		self.conn
			.query_row(&format!("{SELECT_PM} WHERE id = ?1"), params![id.0], row_to_payment_method)
			.optional()?
			.ok_or_else(|| StoreError::NotFound(format!("payment method {id}")))?
	}

	pub fn list_by_user(&self, user_id: UserId) -> Result<Vec<UserPaymentMethod>, StoreError> {
		let mut stmt = self.conn.prepare(&format!("{SELECT_PM} WHERE user_id = ?1"))?;
		let rows = stmt.query_map(params![user_id.0], row_to_payment_method)?;
		rows.collect::<rusqlite::Result<Vec<_>>>()?.into_iter().collect()
	}
}

const SELECT_PM: &str =
	"SELECT id, user_id, method_type, bank_name, provider_id, rhinoxpay_currency, is_active FROM user_payment_methods";

fn payment_method_type_str(t: PaymentMethodType) -> &'static str {
	match t {
		PaymentMethodType::BankAccount => "bank_account",
		PaymentMethodType::MobileMoney => "mobile_money",
		PaymentMethodType::RhinoxpayId => "rhinoxpay_id",
	}
}

fn row_to_payment_method(row: &Row) -> rusqlite::Result<Result<UserPaymentMethod, StoreError>> {
	Ok((|| {
		let method_type: String = row.get(2)?;
		Ok(UserPaymentMethod {
			id: PaymentMethodId(row.get(0)?),
			user_id: UserId(row.get(1)?),
			method_type: match method_type.as_str() {
				"bank_account" => PaymentMethodType::BankAccount,
				"mobile_money" => PaymentMethodType::MobileMoney,
				_ => PaymentMethodType::RhinoxpayId,
			},
			bank_name: row.get(3)?,
			provider_id: row.get(4)?,
			rhinoxpay_currency: row.get(5)?,
			is_active: row.get::<_, i64>(6)? != 0,
		})
	})())
}

impl<'a> OrderRepo<'a> {
	pub fn insert(&self, order: &P2pOrder) -> Result<P2pOrder, StoreError> {
		self.conn.execute(
			"INSERT INTO p2p_orders(
				ad_id, vendor_user_id, counterparty_user_id, ad_type, crypto_currency, fiat_currency,
				crypto_amount, fiat_amount, price, payment_method_id, payment_channel, status,
				buyer_id, seller_id, processing_time_minutes, metadata, created_at,
				accepted_at, expires_at, payment_made_at, payment_received_at, completed_at, cancelled_at
			) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18,?19,?20,?21,?22,?23)",
			params![
				order.ad_id.0,
				order.vendor_user_id.0,
				order.counterparty_user_id.0,
				ad_type_str(order.ad_type),
				order.crypto_currency,
				order.fiat_currency,
				order.crypto_amount.to_canonical_string(),
				order.fiat_amount.to_canonical_string(),
				order.price.to_canonical_string(),
				order.payment_method_id.0,
				payment_channel_str(order.payment_channel),
				order_status_str(order.status),
				order.buyer_id.0,
				order.seller_id.0,
				order.processing_time_minutes,
				order.metadata.to_string(),
				order.created_at.to_rfc3339(),
				order.accepted_at.map(|t| t.to_rfc3339()),
				order.expires_at.map(|t| t.to_rfc3339()),
				order.payment_made_at.map(|t| t.to_rfc3339()),
				order.payment_received_at.map(|t| t.to_rfc3339()),
				order.completed_at.map(|t| t.to_rfc3339()),
				order.cancelled_at.map(|t| t.to_rfc3339()),
			],
		)?;
		self.get(OrderId(self.conn.last_insert_rowid()))
	}

	pub fn get(&self, id: OrderId) -> Result<P2pOrder, StoreError> {
		self.conn
			.query_row(&format!("{SELECT_ORDER} WHERE id = ?1"), params![id.0], row_to_order)
			.optional()?
			.ok_or_else(|| StoreError::NotFound(format!("order {id}")))?
	}

	/// Re-reads the order inside the current transaction immediately before
	/// mutating it, so every transition observes the latest committed state
	/// (`spec.md` §5: "no transition may observe another transaction's
	/// partial writes").
	pub fn get_for_update(&self, id: OrderId) -> Result<P2pOrder, StoreError> {
		self.get(id)
	}

	pub fn update(&self, order: &P2pOrder) -> Result<(), StoreError> {
		let changed = self.conn.execute(
			"UPDATE p2p_orders SET status = ?1, metadata = ?2, accepted_at = ?3, expires_at = ?4,
				payment_made_at = ?5, payment_received_at = ?6, completed_at = ?7, cancelled_at = ?8
			 WHERE id = ?9",
			params![
				order_status_str(order.status),
				order.metadata.to_string(),
				order.accepted_at.map(|t| t.to_rfc3339()),
				order.expires_at.map(|t| t.to_rfc3339()),
				order.payment_made_at.map(|t| t.to_rfc3339()),
				order.payment_received_at.map(|t| t.to_rfc3339()),
				order.completed_at.map(|t| t.to_rfc3339()),
				order.cancelled_at.map(|t| t.to_rfc3339()),
				order.id.0,
			],
		)?;
		if changed == 0 {
			return Err(StoreError::NotFound(format!("order {}", order.id)));
		}
		Ok(())
	}

	pub fn list_by_user(&self, user_id: UserId) -> Result<Vec<P2pOrder>, StoreError> {
		let mut stmt = self.conn.prepare(&format!(
			"{SELECT_ORDER} WHERE vendor_user_id = ?1 OR counterparty_user_id = ?1 ORDER BY created_at DESC"
		))?;
		let rows = stmt.query_map(params![user_id.0], row_to_order)?;
		rows.collect::<rusqlite::Result<Vec<_>>>()?.into_iter().collect()
	}

	/// Orders in `awaiting_payment` whose `expires_at` has passed, for the
	/// expiry sweeper (`spec.md` §4.7).
	pub fn list_expired_awaiting_payment(
		&self,
		now: DateTime<Utc>,
	) -> Result<Vec<P2pOrder>, StoreError> {
		let mut stmt = self.conn.prepare(&format!(
			"{SELECT_ORDER} WHERE status = 'awaiting_payment' AND expires_at IS NOT NULL AND expires_at < ?1"
		))?;
		let rows = stmt.query_map(params![now.to_rfc3339()], row_to_order)?;
		rows.collect::<rusqlite::Result<Vec<_>>>()?.into_iter().collect()
	}
}

const SELECT_ORDER: &str = "SELECT id, ad_id, vendor_user_id, counterparty_user_id, ad_type, crypto_currency,
	fiat_currency, crypto_amount, fiat_amount, price, payment_method_id, payment_channel, status,
	buyer_id, seller_id, processing_time_minutes, metadata, created_at, accepted_at, expires_at,
	payment_made_at, payment_received_at, completed_at, cancelled_at FROM p2p_orders";

fn payment_channel_str(c: PaymentChannel) -> &'static str {
	match c {
		PaymentChannel::Offline => "offline",
		PaymentChannel::RhinoxpayId => "rhinoxpay_id",
	}
}

fn order_status_str(s: OrderStatus) -> &'static str {
	match s {
		OrderStatus::Pending => "pending",
		OrderStatus::AwaitingPayment => "awaiting_payment",
		OrderStatus::PaymentMade => "payment_made",
		OrderStatus::AwaitingCoinRelease => "awaiting_coin_release",
		OrderStatus::Completed => "completed",
		OrderStatus::Cancelled => "cancelled",
		OrderStatus::Expired => "expired",
		OrderStatus::Disputed => "disputed",
		OrderStatus::Refunded => "refunded",
	}
}

fn row_to_order(row: &Row) -> rusqlite::Result<Result<P2pOrder, StoreError>> {
	Ok((|| {
		let ad_type: String = row.get(4)?;
		let channel: String = row.get(11)?;
		let status: String = row.get(12)?;
		let metadata_raw: String = row.get(16)?;
		Ok(P2pOrder {
			id: OrderId(row.get(0)?),
			ad_id: AdId(row.get(1)?),
			vendor_user_id: UserId(row.get(2)?),
			counterparty_user_id: UserId(row.get(3)?),
			ad_type: if ad_type == "buy" { AdType::Buy } else { AdType::Sell },
			crypto_currency: row.get(5)?,
			fiat_currency: row.get(6)?,
			crypto_amount: parse_money(row.get(7)?)?,
			fiat_amount: parse_money(row.get(8)?)?,
			price: parse_money(row.get(9)?)?,
			payment_method_id: PaymentMethodId(row.get(10)?),
			payment_channel: if channel == "offline" {
				PaymentChannel::Offline
			} else {
				PaymentChannel::RhinoxpayId
			},
			status: match status.as_str() {
				"pending" => OrderStatus::Pending,
				"awaiting_payment" => OrderStatus::AwaitingPayment,
				"payment_made" => OrderStatus::PaymentMade,
				"awaiting_coin_release" => OrderStatus::AwaitingCoinRelease,
				"completed" => OrderStatus::Completed,
				"cancelled" => OrderStatus::Cancelled,
				"expired" => OrderStatus::Expired,
				"disputed" => OrderStatus::Disputed,
				_ => OrderStatus::Refunded,
			},
			buyer_id: UserId(row.get(13)?),
			seller_id: UserId(row.get(14)?),
			processing_time_minutes: row.get(15)?,
			metadata: serde_json::from_str(&metadata_raw)
				.map_err(|e| StoreError::Internal(e.to_string()))?,
			created_at: parse_time(row.get(17)?)?,
			accepted_at: opt_time(row.get(18)?)?,
			expires_at: opt_time(row.get(19)?)?,
			payment_made_at: opt_time(row.get(20)?)?,
			payment_received_at: opt_time(row.get(21)?)?,
			completed_at: opt_time(row.get(22)?)?,
			cancelled_at: opt_time(row.get(23)?)?,
		})
	})())
}

impl<'a> ReservationRepo<'a> {
	/// Records a new outstanding reservation. The unique index on
	/// `(kind, wallet_id, correlation)` rejects a second freeze/lock for the
	/// same order against the same wallet with `DuplicateKey`, which is the
	/// store-level backstop against double-freeze (`spec.md` §4.4).
	pub fn create(
		&self,
		kind: ReservationKind,
		wallet_id: i64,
		correlation: &str,
		amount: &Money,
		created_at: DateTime<Utc>,
	) -> Result<Reservation, StoreError> {
		let kind_str = reservation_kind_str(kind);
		self.conn
			.execute(
				"INSERT INTO reservations(kind, wallet_id, correlation, amount, created_at, released_at)
				 VALUES (?1, ?2, ?3, ?4, ?5, NULL)",
				params![kind_str, wallet_id, correlation, amount.to_canonical_string(), created_at.to_rfc3339()],
			)
			.map_err(|e| match StoreError::from(e) {
				StoreError::DuplicateKey(_) => StoreError::DuplicateKey(format!(
					"reservation already exists for {kind_str}/{wallet_id}/{correlation}"
				)),
				other => other,
			})?;
		Ok(Reservation {
			id: ReservationId(self.conn.last_insert_rowid()),
			kind,
			wallet_id,
			correlation: correlation.to_string(),
			amount: amount.clone(),
			created_at,
			released_at: None,
		})
	}

	pub fn get_active(
		&self,
		kind: ReservationKind,
		wallet_id: i64,
		correlation: &str,
	) -> Result<Option<Reservation>, StoreError> {
		self.conn
			.query_row(
				"SELECT id, kind, wallet_id, correlation, amount, created_at, released_at
				 FROM reservations WHERE kind = ?1 AND wallet_id = ?2 AND correlation = ?3 AND released_at IS NULL",
				params![reservation_kind_str(kind), wallet_id, correlation],
				row_to_reservation,
			)
			.optional()?
			.transpose()
	}

	pub fn mark_released(&self, id: ReservationId, released_at: DateTime<Utc>) -> Result<(), StoreError> {
		let changed = self.conn.execute(
			"UPDATE reservations SET released_at = ?1 WHERE id = ?2 AND released_at IS NULL",
			params![released_at.to_rfc3339(), id.0],
		)?;
		if changed == 0 {
			return Err(StoreError::Conflict);
		}
		Ok(())
	}
}

fn reservation_kind_str(k: ReservationKind) -> &'static str {
	match k {
		ReservationKind::FiatLock => "fiat_lock",
		ReservationKind::CryptoFreeze => "crypto_freeze",
	}
}

fn row_to_reservation(row: &Row) -> rusqlite::Result<Result<Reservation, StoreError>> {
	Ok((|| {
		let kind: String = row.get(1)?;
		let released: Option<String> = row.get(6)?;
		Ok(Reservation {
			id: ReservationId(row.get(0)?),
			kind: if kind == "fiat_lock" { ReservationKind::FiatLock } else { ReservationKind::CryptoFreeze },
			wallet_id: row.get(2)?,
			correlation: row.get(3)?,
			amount: parse_money(row.get(4)?)?,
			created_at: parse_time(row.get(5)?)?,
			released_at: opt_time(released)?,
		})
	})())
}
