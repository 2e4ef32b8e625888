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

//! The P2P core: role resolution, payment-method matching, and the order
//! state machine that ties them together with the Ledger and Reservation
//! Engine (`spec.md` §4.6-§4.8).

mod error;
mod payment_methods;
mod roles;
mod state_machine;
pub mod sweeper;

pub use error::OrderError;
pub use payment_methods::{find_match, PaymentMethodError};
pub use roles::{resolve as resolve_roles, Roles};
pub use state_machine::OrderService;
