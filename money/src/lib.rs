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

//! Arbitrary-precision decimal arithmetic for the exchange core.
//!
//! [`Money`] wraps [`bigdecimal::BigDecimal`] and is the only numeric type
//! allowed to cross a balance or ledger boundary anywhere in this workspace.
//! Binary floating point never appears on the wire or in storage.

use std::{
	cmp::Ordering,
	fmt,
	str::FromStr,
};

use bigdecimal::{BigDecimal, RoundingMode, Signed, Zero};
use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};

/// Minimum scale (digits after the decimal point) fiat amounts are stored at.
pub const FIAT_SCALE: i64 = 2;
/// Minimum scale crypto amounts are stored at.
pub const CRYPTO_SCALE: i64 = 8;

#[derive(Debug, thiserror::Error, PartialEq, Eq, Clone)]
pub enum MoneyError {
	#[error("invalid decimal number: {0:?}")]
	InvalidNumber(String),
	#[error("division by zero")]
	DivisionByZero,
}

/// An arbitrary-precision, base-10 amount.
///
/// `Money` never implements `From<f32>`/`From<f64>` on purpose: amounts only
/// ever enter the system as decimal strings (the API boundary) or as the
/// result of another `Money` operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Money(BigDecimal);

impl Money {
	pub fn zero() -> Self {
		Money(BigDecimal::zero())
	}

	/// Parses a canonical decimal string such as `"12.34"` or `"-0.00000001"`.
	/// Rejects exponential notation, `NaN`/`Infinity`, and empty input so that
	/// malformed wire amounts are caught at the boundary.
	pub fn parse(input: &str) -> Result<Self, MoneyError> {
		let trimmed = input.trim();
		if trimmed.is_empty() || trimmed.contains(['e', 'E']) {
			return Err(MoneyError::InvalidNumber(input.to_string()));
		}
		BigDecimal::from_str(trimmed)
			.map(Money)
			.map_err(|_| MoneyError::InvalidNumber(input.to_string()))
	}

	/// Canonical string form, e.g. for putting on the wire or into storage.
	pub fn to_canonical_string(&self) -> String {
		self.0.normalized().to_string()
	}

	pub fn add(&self, other: &Money) -> Money {
		Money(&self.0 + &other.0)
	}

	pub fn sub(&self, other: &Money) -> Money {
		Money(&self.0 - &other.0)
	}

	pub fn mul(&self, other: &Money) -> Money {
		Money(&self.0 * &other.0)
	}

	/// Divides, rounding half-even to `scale` digits after the decimal point.
	pub fn div(&self, other: &Money, scale: i64) -> Result<Money, MoneyError> {
		if other.0.is_zero() {
			return Err(MoneyError::DivisionByZero);
		}
		let quotient = (&self.0 / &other.0).with_scale_round(scale, RoundingMode::HalfEven);
		Ok(Money(quotient))
	}

	/// Rounds to `scale` digits after the decimal point, half-even.
	pub fn round(&self, scale: i64) -> Money {
		Money(self.0.with_scale_round(scale, RoundingMode::HalfEven))
	}

	pub fn abs(&self) -> Money {
		Money(self.0.abs())
	}

	pub fn negate(&self) -> Money {
		Money(-&self.0)
	}

	pub fn is_zero(&self) -> bool {
		self.0.is_zero()
	}

	pub fn is_positive(&self) -> bool {
		self.0.is_positive()
	}

	pub fn is_negative(&self) -> bool {
		self.0.is_negative()
	}

	/// -1, 0 or 1.
	pub fn sign(&self) -> i32 {
		if self.is_zero() {
			0
		} else if self.is_negative() {
			-1
		} else {
			1
		}
	}

	pub fn checked_reciprocal(&self, scale: i64) -> Result<Money, MoneyError> {
		Money::from(1u32).div(self, scale)
	}
}

impl From<u32> for Money {
	fn from(value: u32) -> Self {
		Money(BigDecimal::from(value))
	}
}

impl From<i64> for Money {
	fn from(value: i64) -> Self {
		Money(BigDecimal::from(value))
	}
}

impl fmt::Display for Money {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.to_canonical_string())
	}
}

impl PartialOrd for Money {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}

impl Ord for Money {
	fn cmp(&self, other: &Self) -> Ordering {
		self.0.cmp(&other.0)
	}
}

impl FromStr for Money {
	type Err = MoneyError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Money::parse(s)
	}
}

impl Serialize for Money {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_str(&self.to_canonical_string())
	}
}

impl<'de> Deserialize<'de> for Money {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		let raw = String::deserialize(deserializer)?;
		Money::parse(&raw).map_err(D::Error::custom)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_and_round_trips() {
		let m = Money::parse("1500.50").unwrap();
		assert_eq!(m.to_canonical_string(), "1500.50");
	}

	#[test]
	fn rejects_exponential_and_empty() {
		assert_eq!(Money::parse("1e10"), Err(MoneyError::InvalidNumber("1e10".into())));
		assert_eq!(Money::parse(""), Err(MoneyError::InvalidNumber("".into())));
	}

	#[test]
	fn half_even_rounding_on_divide() {
		let a = Money::parse("1").unwrap();
		let b = Money::parse("8").unwrap();
		// 1/8 = 0.125 -> half-even to 2dp rounds the 5 to the even neighbour (0.12)
		let result = a.div(&b, 2).unwrap();
		assert_eq!(result.to_canonical_string(), "0.12");
	}

	#[test]
	fn division_by_zero_fails() {
		let a = Money::parse("1").unwrap();
		let zero = Money::zero();
		assert_eq!(a.div(&zero, 2), Err(MoneyError::DivisionByZero));
	}

	#[test]
	fn ordering_and_sign() {
		let a = Money::parse("-0.5").unwrap();
		let b = Money::parse("0.5").unwrap();
		assert!(a < b);
		assert_eq!(a.sign(), -1);
		assert_eq!(Money::zero().sign(), 0);
	}

	#[test]
	fn serde_round_trip() {
		let m = Money::parse("2.00000001").unwrap();
		let json = serde_json::to_string(&m).unwrap();
		assert_eq!(json, "\"2.00000001\"");
		let back: Money = serde_json::from_str(&json).unwrap();
		assert_eq!(back, m);
	}
}
