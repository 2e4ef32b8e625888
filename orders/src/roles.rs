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

//! P2P role resolution (`spec.md` §4.6). This is the only place in the crate
//! allowed to switch on `AdType` to decide who is buyer and who is seller;
//! every other module calls [`resolve`] and uses its output unchanged
//! (Core Invariant C1).

use exchange_store::{AdType, UserId};

/// The resolved (buyer, seller) principals for one ad + counterparty pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Roles {
	pub buyer_id: UserId,
	pub seller_id: UserId,
}

/// `adType = buy` -> vendor is BUYER, counterparty is SELLER.
/// `adType = sell` -> vendor is SELLER, counterparty is BUYER.
///
/// Never consult cached role ids to *determine* roles; they are an audit
/// cache only (`spec.md` §9's tagged-variant note). Always recompute from
/// `ad_type` plus the two known principals.
pub fn resolve(ad_type: AdType, vendor_user_id: UserId, counterparty_user_id: UserId) -> Roles {
	match ad_type {
		AdType::Buy => Roles { buyer_id: vendor_user_id, seller_id: counterparty_user_id },
		AdType::Sell => Roles { buyer_id: counterparty_user_id, seller_id: vendor_user_id },
	}
}
