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

//! TOML-plus-environment settings, mirroring `engine/src/settings.rs`'s
//! `Settings::new()` shape but on the modern `config` builder API, plus a
//! `clap` CLI for the settings an operator may want to override without
//! editing the file (`spec.md`'s SPEC_FULL.md Config row).

use clap::Parser;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Database {
	/// `rusqlite` connection string, e.g. a file path or `:memory:`.
	pub path: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Sweeper {
	/// How often the expiry sweeper scans `awaiting_payment` orders, in
	/// seconds. `spec.md` §4.7: cadence SHOULD be <= the minimum
	/// `processingTime` across active ads.
	pub interval_seconds: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
	pub database: Database,
	pub sweeper: Sweeper,
}

impl Settings {
	/// Merges `config/default.toml` with an optional override file and
	/// `EXCHANGE_`-prefixed environment variables, then applies any
	/// CLI-supplied overrides, matching `engine/src/settings.rs`'s layering.
	pub fn load(opts: &CommandLineOptions) -> Result<Self, ConfigError> {
		let mut builder = Config::builder()
			.set_default("database.path", "exchange.sqlite3")?
			.set_default("sweeper.interval_seconds", 60i64)?
			.add_source(File::with_name("config/default").required(false));

		if let Some(path) = &opts.config_path {
			builder = builder.add_source(File::with_name(path).required(true));
		}
		builder = builder.add_source(Environment::with_prefix("exchange").separator("__"));

		let mut settings: Settings = builder.build()?.try_deserialize()?;

		if let Some(path) = &opts.database_path {
			settings.database.path = path.clone();
		}
		if let Some(interval) = opts.sweeper_interval_seconds {
			settings.sweeper.interval_seconds = interval;
		}
		Ok(settings)
	}
}

/// CLI overrides for the settings above; flattened into every binary in this
/// workspace the way `engine`'s `CommandLineOptions` is, per-subsystem.
#[derive(Parser, Clone, Debug, Default)]
pub struct CommandLineOptions {
	#[clap(short = 'c', long = "config-path", env = "EXCHANGE_CONFIG_PATH")]
	pub config_path: Option<String>,

	#[clap(long = "database-path", env = "EXCHANGE_DATABASE_PATH")]
	pub database_path: Option<String>,

	#[clap(long = "sweeper-interval-seconds", env = "EXCHANGE_SWEEPER_INTERVAL_SECONDS")]
	pub sweeper_interval_seconds: Option<u64>,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults_apply_with_no_file_and_no_overrides() {
		let opts = CommandLineOptions::default();
		let settings = Settings::load(&opts).unwrap();
		assert_eq!(settings.database.path, "exchange.sqlite3");
		assert_eq!(settings.sweeper.interval_seconds, 60);
	}

	#[test]
	fn cli_overrides_take_precedence_over_defaults() {
		let opts = CommandLineOptions {
			config_path: None,
			database_path: Some("/tmp/custom.sqlite3".into()),
			sweeper_interval_seconds: Some(15),
		};
		let settings = Settings::load(&opts).unwrap();
		assert_eq!(settings.database.path, "/tmp/custom.sqlite3");
		assert_eq!(settings.sweeper.interval_seconds, 15);
	}
}
