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

//! The core never sees a raw credential. Whatever transport sits in front of
//! it (out of scope for this crate) resolves one into a [`Principal`] and
//! hands that down; every core operation that needs a caller identity takes
//! one of these instead of touching headers, tokens or cookies.

use exchange_store::UserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal(pub UserId);

impl Principal {
	pub fn user_id(&self) -> UserId {
		self.0
	}

	pub fn is(&self, user_id: UserId) -> bool {
		self.0 == user_id
	}
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
	#[error("unauthenticated")]
	Unauthenticated,
}

/// Implemented by the (out-of-scope) transport layer. Core crates accept an
/// already-resolved [`Principal`]; only the boundary needs this trait. Async
/// because a real transport typically resolves a principal from a session
/// store or token-introspection call, not purely in-memory.
#[async_trait::async_trait]
pub trait AuthContext {
	async fn principal(&self) -> Result<Principal, AuthError>;
}
