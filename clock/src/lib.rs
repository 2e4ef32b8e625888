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

//! A time source and a reference-id generator, both injected rather than
//! reached for globally, so the order state machine and the expiry sweeper
//! are deterministically testable.

use std::sync::{
	atomic::{AtomicI64, Ordering},
	Arc, Mutex,
};

use chrono::{DateTime, Utc};
use rand::{distributions::Alphanumeric, Rng};

pub trait Clock: Send + Sync {
	fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time via `chrono::Utc::now()`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
	fn now(&self) -> DateTime<Utc> {
		Utc::now()
	}
}

/// A clock whose value is fixed until explicitly advanced. Used by state
/// machine and expiry-sweeper tests that need exact control over `now()`.
#[derive(Debug, Clone)]
pub struct SteppingClock {
	millis: Arc<AtomicI64>,
}

impl SteppingClock {
	pub fn at(start: DateTime<Utc>) -> Self {
		SteppingClock { millis: Arc::new(AtomicI64::new(start.timestamp_millis())) }
	}

	pub fn advance(&self, duration: chrono::Duration) {
		self.millis.fetch_add(duration.num_milliseconds(), Ordering::SeqCst);
	}

	pub fn set(&self, at: DateTime<Utc>) {
		self.millis.store(at.timestamp_millis(), Ordering::SeqCst);
	}
}

impl Clock for SteppingClock {
	fn now(&self) -> DateTime<Utc> {
		DateTime::from_timestamp_millis(self.millis.load(Ordering::SeqCst))
			.expect("stepping clock millis always in range")
	}
}

/// Generates the globally-unique, collision-free-per-tick `Transaction`
/// reference used as the ledger's idempotency key.
pub trait ReferenceGenerator: Send + Sync {
	fn next(&self) -> String;
}

/// Time-based prefix plus a random suffix, so two references generated in the
/// same clock tick never collide in practice; the store's unique index on
/// `Transaction.reference` is the final backstop (`DuplicateKey`).
pub struct DefaultReferenceGenerator<C: Clock> {
	clock: C,
	// Only used by the deterministic test double below; kept here so a single
	// generator type can be reused in both modes without an extra trait object.
	fixed_suffixes: Mutex<Option<Vec<String>>>,
}

impl<C: Clock + Clone> Clone for DefaultReferenceGenerator<C> {
	fn clone(&self) -> Self {
		let suffixes = self.fixed_suffixes.lock().expect("reference generator mutex poisoned").clone();
		DefaultReferenceGenerator { clock: self.clock.clone(), fixed_suffixes: Mutex::new(suffixes) }
	}
}

impl<C: Clock> DefaultReferenceGenerator<C> {
	pub fn new(clock: C) -> Self {
		DefaultReferenceGenerator { clock, fixed_suffixes: Mutex::new(None) }
	}

	/// Test-only constructor that yields deterministic suffixes in order.
	pub fn with_fixed_suffixes(clock: C, suffixes: Vec<String>) -> Self {
		DefaultReferenceGenerator { clock, fixed_suffixes: Mutex::new(Some(suffixes)) }
	}

	fn suffix(&self) -> String {
		let mut guard = self.fixed_suffixes.lock().expect("reference generator mutex poisoned");
		if let Some(queue) = guard.as_mut() {
			if !queue.is_empty() {
				return queue.remove(0);
			}
		}
		rand::thread_rng().sample_iter(&Alphanumeric).take(6).map(char::from).collect()
	}
}

impl<C: Clock> ReferenceGenerator for DefaultReferenceGenerator<C> {
	fn next(&self) -> String {
		let millis = self.clock.now().timestamp_millis();
		format!("{}-{}", radix36(millis), self.suffix())
	}
}

fn radix36(mut value: i64) -> String {
	const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
	if value == 0 {
		return "0".to_string();
	}
	let negative = value < 0;
	if negative {
		value = -value;
	}
	let mut out = Vec::new();
	while value > 0 {
		out.push(DIGITS[(value % 36) as usize]);
		value /= 36;
	}
	if negative {
		out.push(b'-');
	}
	out.reverse();
	String::from_utf8(out).expect("radix36 digits are ascii")
}
