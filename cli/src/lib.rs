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

//! The composition root: settings loading and logging init shared by every
//! deployable in this workspace, mirroring `engine/src/settings.rs` and
//! `engine/src/logging.rs` (config-file-plus-CLI settings, a tracing
//! subscriber installed once at process start). The HTTP/RPC transport that
//! would otherwise live here is an explicit external collaborator per
//! `spec.md` §1 — this crate only wires the core crates together for the
//! processes that do exist: the expiry-sweeper binary.

pub mod logging;
pub mod settings;

pub use logging::init_logging;
pub use settings::{CommandLineOptions, Settings};
