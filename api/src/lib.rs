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

//! The API boundary (`spec.md` §6): request/response DTOs and thin
//! per-component service facades over the core crates. No HTTP routing,
//! request-body validation, or OpenAPI surface lives here — those remain
//! explicit external collaborators per `spec.md` §1. [`AppServices`] is the
//! single wiring point a transport layer constructs once at process start
//! and hands a [`Store`] plus a resolved [`Principal`] per request.

pub mod ads;
pub mod dto;
pub mod error;
pub mod exchange;
pub mod history;
pub mod p2p;
pub mod wallet;

pub use ads::AdService;
pub use error::DomainError;
pub use exchange::ExchangeService;
pub use history::HistoryService;
pub use p2p::OrderFacade;
pub use wallet::WalletService;

use exchange_clock::{Clock, ReferenceGenerator};

/// Bundles every per-component facade behind one type so a transport layer
/// constructs the whole surface once. Generic over the injected [`Clock`]
/// and [`ReferenceGenerator`] so tests can swap in deterministic doubles
/// (`spec.md` §4.11), mirroring how `engine`'s duty manager is parameterized
/// over its clients.
pub struct AppServices<C: Clock, R: ReferenceGenerator + Clone> {
	pub clock: C,
	pub wallet: WalletService,
	pub exchange: ExchangeService,
	pub ads: AdService,
	pub orders: OrderFacade<R>,
	pub history: HistoryService,
}

impl<C: Clock, R: ReferenceGenerator + Clone> AppServices<C, R> {
	pub fn new(clock: C, refs: R) -> Self {
		Self {
			clock,
			wallet: WalletService::new(),
			exchange: ExchangeService::new(),
			ads: AdService::new(),
			orders: OrderFacade::new(refs),
			history: HistoryService::new(),
		}
	}
}
