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

//! Serializable transactional persistence, grounded on
//! `engine::quoter::database::Database`'s single-connection rusqlite store:
//! one `Mutex`-guarded `Connection`, `BEGIN IMMEDIATE` transactions, blocking
//! work shipped out to `spawn_blocking` so the async runtime never stalls on
//! file IO.

mod error;
mod model;
mod repo;
mod schema;

pub use error::StoreError;
pub use model::*;
pub use repo::{
	AdRepo, CryptoWalletRepo, FiatWalletRepo, OrderRepo, PaymentMethodRepo, RateRepo,
	ReservationRepo, TransactionRepo, UserRepo, VirtualAccountRepo,
};

use std::sync::{Arc, Mutex};
use std::time::Duration;

use rand::Rng;
use rusqlite::{Connection, TransactionBehavior};

/// A single serializable unit of work. Every repository accessor borrows the
/// same `&rusqlite::Transaction`, so all reads and writes within one
/// `Store::transact` call observe a single consistent snapshot and commit or
/// roll back atomically.
pub struct Scope<'a> {
	tx: &'a rusqlite::Transaction<'a>,
}

impl<'a> Scope<'a> {
	pub fn users(&self) -> UserRepo<'a> {
		UserRepo { conn: self.tx }
	}
	pub fn fiat_wallets(&self) -> FiatWalletRepo<'a> {
		FiatWalletRepo { conn: self.tx }
	}
	pub fn virtual_accounts(&self) -> VirtualAccountRepo<'a> {
		VirtualAccountRepo { conn: self.tx }
	}
	pub fn crypto_wallets(&self) -> CryptoWalletRepo<'a> {
		CryptoWalletRepo { conn: self.tx }
	}
	pub fn transactions(&self) -> TransactionRepo<'a> {
		TransactionRepo { conn: self.tx }
	}
	pub fn rates(&self) -> RateRepo<'a> {
		RateRepo { conn: self.tx }
	}
	pub fn ads(&self) -> AdRepo<'a> {
		AdRepo { conn: self.tx }
	}
	pub fn payment_methods(&self) -> PaymentMethodRepo<'a> {
		PaymentMethodRepo { conn: self.tx }
	}
	pub fn orders(&self) -> OrderRepo<'a> {
		OrderRepo { conn: self.tx }
	}
	pub fn reservations(&self) -> ReservationRepo<'a> {
		ReservationRepo { conn: self.tx }
	}
}

#[derive(Clone)]
pub struct Store {
	conn: Arc<Mutex<Connection>>,
}

impl Store {
	pub fn open(path: &str) -> Result<Self, StoreError> {
		let conn = schema::open_and_migrate(path)?;
		Ok(Self { conn: Arc::new(Mutex::new(conn)) })
	}

	pub fn open_in_memory() -> Result<Self, StoreError> {
		Self::open(":memory:")
	}

	/// Runs `f` inside a single `BEGIN IMMEDIATE` transaction. `f` returning
	/// `Err` rolls back; returning `Ok` commits. The whole closure runs on a
	/// blocking thread since `rusqlite` is synchronous (`spec.md` §4.2, §6:
	/// "never block the async runtime on disk IO").
	pub async fn transact<T, F>(&self, f: F) -> Result<T, StoreError>
	where
		T: Send + 'static,
		F: for<'a> FnOnce(&Scope<'a>) -> Result<T, StoreError> + Send + 'static,
	{
		let conn = self.conn.clone();
		tokio::task::spawn_blocking(move || {
			let mut guard = conn.lock().expect("store connection mutex poisoned");
			let tx = guard
				.transaction_with_behavior(TransactionBehavior::Immediate)
				.map_err(StoreError::from)?;
			let scope = Scope { tx: &tx };
			match f(&scope) {
				Ok(value) => {
					tx.commit().map_err(StoreError::from)?;
					Ok(value)
				}
				Err(e) => {
					let _ = tx.rollback();
					Err(e)
				}
			}
		})
		.await
		.map_err(|e| StoreError::Internal(format!("transaction task panicked: {e}")))?
	}

	/// Retries `f` up to `max_attempts` times on `StoreError::Conflict`, with
	/// exponential backoff and jitter, matching the recommendation in
	/// `spec.md` §4.2 ("recommended: 3, exponential backoff with jitter").
	pub async fn transact_with_retry<T, F>(&self, max_attempts: u32, f: F) -> Result<T, StoreError>
	where
		T: Send + 'static,
		F: for<'a> Fn(&Scope<'a>) -> Result<T, StoreError> + Send + Sync + 'static,
	{
		let f = Arc::new(f);
		let mut attempt = 0u32;
		loop {
			attempt += 1;
			let f = f.clone();
			match self.transact(move |scope| f(scope)).await {
				Ok(value) => return Ok(value),
				Err(StoreError::Conflict) if attempt < max_attempts => {
					let backoff_ms = 10u64 * (1u64 << (attempt - 1));
					let jitter_ms = rand::thread_rng().gen_range(0..=backoff_ms / 2 + 1);
					tokio::time::sleep(Duration::from_millis(backoff_ms + jitter_ms)).await;
				}
				Err(other) => return Err(other),
			}
		}
	}
}
