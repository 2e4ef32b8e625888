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

//! Payment-method matching (`spec.md` §4.8): the counterparty selects one of
//! their own payment methods by id; the engine must find a vendor-accepted
//! method that matches it by the rules below.

use itertools::Itertools;

use exchange_store::{PaymentMethodType, UserId, UserPaymentMethod};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PaymentMethodError {
	#[error("payment method does not belong to the caller")]
	NotOwner,
	#[error("payment method is not active")]
	Inactive,
	#[error("no accepted payment method matches; vendor accepts: {accepted_types}")]
	Mismatch { accepted_types: String },
}

/// Returns the id of the vendor's accepted method that matches
/// `counterparty_method`, or a [`PaymentMethodError`] explaining why none
/// did.
pub fn find_match<'a>(
	caller: UserId,
	counterparty_method: &UserPaymentMethod,
	vendor_methods: &'a [UserPaymentMethod],
) -> Result<&'a UserPaymentMethod, PaymentMethodError> {
	if counterparty_method.user_id != caller {
		return Err(PaymentMethodError::NotOwner);
	}
	if !counterparty_method.is_active {
		return Err(PaymentMethodError::Inactive);
	}

	let matched = vendor_methods.iter().find(|vendor_method| matches(counterparty_method, vendor_method));

	matched.ok_or_else(|| {
		let types = vendor_methods.iter().map(|m| type_label(m.method_type)).sorted().dedup().join(", ");
		PaymentMethodError::Mismatch { accepted_types: types }
	})
}

fn matches(a: &UserPaymentMethod, b: &UserPaymentMethod) -> bool {
	if a.method_type != b.method_type {
		return false;
	}
	match a.method_type {
		PaymentMethodType::BankAccount => {
			let (Some(name_a), Some(name_b)) = (&a.bank_name, &b.bank_name) else { return false };
			let (na, nb) = (name_a.trim().to_lowercase(), name_b.trim().to_lowercase());
			!na.is_empty() && na == nb
		}
		PaymentMethodType::MobileMoney => {
			let (Some(id_a), Some(id_b)) = (&a.provider_id, &b.provider_id) else { return false };
			id_a == id_b
		}
		PaymentMethodType::RhinoxpayId => match (&a.rhinoxpay_currency, &b.rhinoxpay_currency) {
			(Some(ca), Some(cb)) => ca == cb,
			(None, None) => true,
			_ => false,
		},
	}
}

fn type_label(t: PaymentMethodType) -> &'static str {
	match t {
		PaymentMethodType::BankAccount => "bank_account",
		PaymentMethodType::MobileMoney => "mobile_money",
		PaymentMethodType::RhinoxpayId => "rhinoxpay_id",
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use exchange_store::PaymentMethodId;

	fn bank(user: UserId, name: &str, active: bool) -> UserPaymentMethod {
		UserPaymentMethod {
			id: PaymentMethodId(1),
			user_id: user,
			method_type: PaymentMethodType::BankAccount,
			bank_name: Some(name.to_string()),
			provider_id: None,
			rhinoxpay_currency: None,
			is_active: active,
		}
	}

	#[test]
	fn matches_bank_names_case_and_whitespace_insensitively() {
		let counterparty = bank(UserId(2), "  GTBank ", true);
		let vendor = bank(UserId(1), "gtbank", true);
		let matched = find_match(UserId(2), &counterparty, std::slice::from_ref(&vendor)).unwrap();
		assert_eq!(matched.id, vendor.id);
	}

	#[test]
	fn rejects_non_owner() {
		let counterparty = bank(UserId(99), "GTBank", true);
		let vendor = bank(UserId(1), "gtbank", true);
		let result = find_match(UserId(2), &counterparty, std::slice::from_ref(&vendor));
		assert_eq!(result, Err(PaymentMethodError::NotOwner));
	}

	#[test]
	fn rejects_inactive_method() {
		let counterparty = bank(UserId(2), "GTBank", false);
		let vendor = bank(UserId(1), "gtbank", true);
		let result = find_match(UserId(2), &counterparty, std::slice::from_ref(&vendor));
		assert_eq!(result, Err(PaymentMethodError::Inactive));
	}

	#[test]
	fn no_match_lists_accepted_types() {
		let counterparty = UserPaymentMethod {
			id: PaymentMethodId(2),
			user_id: UserId(2),
			method_type: PaymentMethodType::MobileMoney,
			bank_name: None,
			provider_id: Some("mtn".into()),
			rhinoxpay_currency: None,
			is_active: true,
		};
		let vendor = bank(UserId(1), "gtbank", true);
		let result = find_match(UserId(2), &counterparty, std::slice::from_ref(&vendor));
		assert_eq!(result, Err(PaymentMethodError::Mismatch { accepted_types: "bank_account".into() }));
	}

	#[test]
	fn rhinoxpay_matches_by_currency_when_both_present() {
		let counterparty = UserPaymentMethod {
			id: PaymentMethodId(3),
			user_id: UserId(2),
			method_type: PaymentMethodType::RhinoxpayId,
			bank_name: None,
			provider_id: None,
			rhinoxpay_currency: Some("NGN".into()),
			is_active: true,
		};
		let vendor = UserPaymentMethod {
			id: PaymentMethodId(4),
			user_id: UserId(1),
			method_type: PaymentMethodType::RhinoxpayId,
			bank_name: None,
			provider_id: None,
			rhinoxpay_currency: Some("NGN".into()),
			is_active: true,
		};
		let matched = find_match(UserId(2), &counterparty, std::slice::from_ref(&vendor)).unwrap();
		assert_eq!(matched.id, vendor.id);
	}
}
