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

//! Process-wide logging init, mirroring `engine/src/logging.rs`'s role
//! (install one subscriber, once, at process start) but on `tracing` rather
//! than `slog` — every `#[tracing::instrument]` span in the core crates
//! reports through whatever this installs.

use tracing_subscriber::{fmt, EnvFilter};

/// Installs a `tracing-subscriber` layer reading its filter from
/// `RUST_LOG` (defaulting to `info`). JSON output for anything that looks
/// like a production environment, human-readable otherwise, matching the
/// two-mode split `engine/src/logging.rs` offers between its JSON and
/// plain-text drains.
pub fn init_logging(json: bool) {
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
	let subscriber = fmt().with_env_filter(filter);
	if json {
		subscriber.json().init();
	} else {
		subscriber.init();
	}
}
