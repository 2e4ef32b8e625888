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

//! Standalone expiry-sweeper process (`spec.md` §4.7's background scanner,
//! `DESIGN.md`'s Open Question 1): loads [`Settings`], opens the [`Store`]
//! at the configured path, and drives `exchange_orders::sweeper::spawn` on
//! an interval until killed. Mirrors the shape of `engine/src/bin/vault` —
//! parse CLI options, load settings, build clients, run forever.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use exchange_cli::{init_logging, CommandLineOptions, Settings};
use exchange_clock::{DefaultReferenceGenerator, SystemClock};
use exchange_orders::{sweeper, OrderService};
use exchange_store::Store;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let opts = CommandLineOptions::parse();
	init_logging(std::env::var("EXCHANGE_LOG_JSON").as_deref() == Ok("1"));

	let settings = Settings::load(&opts)?;
	tracing::info!(database_path = %settings.database.path, interval_seconds = settings.sweeper.interval_seconds, "starting expiry sweeper");

	let store = Store::open(&settings.database.path)?;
	let clock = SystemClock;
	let refs = DefaultReferenceGenerator::new(clock);
	let orders = Arc::new(OrderService::new(refs));

	let handle = sweeper::spawn(store, orders, clock, Duration::from_secs(settings.sweeper.interval_seconds));
	handle.await?;
	Ok(())
}
