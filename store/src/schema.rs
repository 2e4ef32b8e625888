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

//! Schema definition and migration, in the shape of `engine`'s own
//! `quoter::database::migration` module: a monotonically increasing version
//! recorded in a metadata table, applied once at `Store::open`.

use rusqlite::Connection;

const LATEST_SCHEMA_VERSION: i64 = 1;

const DDL: &str = r#"
CREATE TABLE IF NOT EXISTS users (
	id INTEGER PRIMARY KEY,
	email TEXT NOT NULL UNIQUE,
	phone TEXT NOT NULL UNIQUE,
	email_verified INTEGER NOT NULL,
	phone_verified INTEGER NOT NULL,
	kyc_verified INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS fiat_wallets (
	id INTEGER PRIMARY KEY,
	user_id INTEGER NOT NULL REFERENCES users(id),
	currency TEXT NOT NULL,
	balance TEXT NOT NULL,
	locked_balance TEXT NOT NULL,
	active INTEGER NOT NULL,
	UNIQUE(user_id, currency)
);

CREATE TABLE IF NOT EXISTS virtual_accounts (
	id INTEGER PRIMARY KEY,
	user_id INTEGER NOT NULL REFERENCES users(id),
	blockchain TEXT NOT NULL,
	currency TEXT NOT NULL,
	account_balance TEXT NOT NULL,
	available_balance TEXT NOT NULL,
	active INTEGER NOT NULL,
	frozen INTEGER NOT NULL,
	UNIQUE(user_id, blockchain, currency)
);

CREATE TABLE IF NOT EXISTS crypto_wallets (
	id INTEGER PRIMARY KEY,
	user_id INTEGER NOT NULL REFERENCES users(id),
	currency TEXT NOT NULL,
	UNIQUE(user_id, currency)
);

CREATE TABLE IF NOT EXISTS transactions (
	id INTEGER PRIMARY KEY,
	wallet_kind TEXT NOT NULL CHECK(wallet_kind IN ('fiat', 'crypto')),
	wallet_id INTEGER NOT NULL,
	tx_type TEXT NOT NULL,
	status TEXT NOT NULL,
	amount TEXT NOT NULL,
	currency TEXT NOT NULL,
	fee TEXT NOT NULL,
	reference TEXT NOT NULL UNIQUE,
	channel TEXT NOT NULL,
	description TEXT NOT NULL,
	metadata TEXT NOT NULL,
	p2p_step TEXT,
	created_at TEXT NOT NULL,
	completed_at TEXT
);
CREATE INDEX IF NOT EXISTS idx_transactions_wallet ON transactions(wallet_kind, wallet_id);

CREATE TABLE IF NOT EXISTS exchange_rates (
	id INTEGER PRIMARY KEY,
	from_currency TEXT NOT NULL,
	to_currency TEXT NOT NULL,
	rate TEXT NOT NULL,
	inverse_rate TEXT,
	active INTEGER NOT NULL,
	UNIQUE(from_currency, to_currency)
);

CREATE TABLE IF NOT EXISTS p2p_ads (
	id INTEGER PRIMARY KEY,
	vendor_user_id INTEGER NOT NULL REFERENCES users(id),
	ad_type TEXT NOT NULL,
	crypto_currency TEXT NOT NULL,
	fiat_currency TEXT NOT NULL,
	price TEXT NOT NULL,
	volume TEXT NOT NULL,
	min_order TEXT NOT NULL,
	max_order TEXT NOT NULL,
	auto_accept INTEGER NOT NULL,
	accepted_payment_method_ids TEXT NOT NULL,
	processing_time_minutes INTEGER NOT NULL,
	status TEXT NOT NULL,
	is_online INTEGER NOT NULL,
	orders_received INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS user_payment_methods (
	id INTEGER PRIMARY KEY,
	user_id INTEGER NOT NULL REFERENCES users(id),
	method_type TEXT NOT NULL,
	bank_name TEXT,
	provider_id TEXT,
	rhinoxpay_currency TEXT,
	is_active INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS p2p_orders (
	id INTEGER PRIMARY KEY,
	ad_id INTEGER NOT NULL REFERENCES p2p_ads(id),
	vendor_user_id INTEGER NOT NULL REFERENCES users(id),
	counterparty_user_id INTEGER NOT NULL REFERENCES users(id),
	ad_type TEXT NOT NULL,
	crypto_currency TEXT NOT NULL,
	fiat_currency TEXT NOT NULL,
	crypto_amount TEXT NOT NULL,
	fiat_amount TEXT NOT NULL,
	price TEXT NOT NULL,
	payment_method_id INTEGER NOT NULL REFERENCES user_payment_methods(id),
	payment_channel TEXT NOT NULL,
	status TEXT NOT NULL,
	buyer_id INTEGER NOT NULL,
	seller_id INTEGER NOT NULL,
	processing_time_minutes INTEGER NOT NULL,
	metadata TEXT NOT NULL,
	created_at TEXT NOT NULL,
	accepted_at TEXT,
	expires_at TEXT,
	payment_made_at TEXT,
	payment_received_at TEXT,
	completed_at TEXT,
	cancelled_at TEXT
);
CREATE INDEX IF NOT EXISTS idx_p2p_orders_status ON p2p_orders(status);

CREATE TABLE IF NOT EXISTS reservations (
	id INTEGER PRIMARY KEY,
	kind TEXT NOT NULL CHECK(kind IN ('fiat_lock', 'crypto_freeze')),
	wallet_id INTEGER NOT NULL,
	correlation TEXT NOT NULL,
	amount TEXT NOT NULL,
	created_at TEXT NOT NULL,
	released_at TEXT,
	UNIQUE(kind, wallet_id, correlation)
);

CREATE TABLE IF NOT EXISTS schema_metadata (
	key TEXT PRIMARY KEY,
	value TEXT NOT NULL
);
"#;

pub fn open_and_migrate(path: &str) -> rusqlite::Result<Connection> {
	let conn = if path == ":memory:" {
		Connection::open_in_memory()?
	} else {
		Connection::open(path)?
	};
	conn.execute_batch("PRAGMA foreign_keys = ON;")?;
	migrate(&conn)?;
	Ok(conn)
}

fn migrate(conn: &Connection) -> rusqlite::Result<()> {
	conn.execute_batch(DDL)?;
	conn.execute(
		"INSERT INTO schema_metadata(key, value) VALUES ('version', ?1)
		 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
		rusqlite::params![LATEST_SCHEMA_VERSION.to_string()],
	)?;
	tracing::info!(version = LATEST_SCHEMA_VERSION, "store schema migrated");
	Ok(())
}
