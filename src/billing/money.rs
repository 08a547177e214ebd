//! Money value type and boundary parsing.
//!
//! Amounts reach the billing engine as numbers, strings (sometimes with
//! thousands separators), or null. They are normalized here, once, so the
//! calculators only ever see `Decimal`.

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Sub};
use std::str::FromStr;

use rust_decimal::prelude::*;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// A monetary amount.
///
/// Deserializes leniently (anything unparseable becomes zero) and
/// serializes as a decimal string. Addition and subtraction saturate at the
/// `Decimal` bounds instead of panicking.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);

    pub fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    pub fn amount(self) -> Decimal {
        self.0
    }

    /// Parse any JSON value into money, falling back to zero.
    pub fn from_json(value: &Value) -> Self {
        Self(parse_amount(value))
    }

    /// Parse a text amount into money, falling back to zero.
    pub fn parse_lenient(text: &str) -> Self {
        Self(parse_amount_str(text))
    }
}

impl From<Decimal> for Money {
    fn from(amount: Decimal) -> Self {
        Self(amount)
    }
}

impl From<Option<Decimal>> for Money {
    fn from(amount: Option<Decimal>) -> Self {
        Self(amount.unwrap_or(Decimal::ZERO))
    }
}

impl From<Money> for Decimal {
    fn from(money: Money) -> Self {
        money.0
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0.saturating_add(rhs.0))
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        Money(self.0.saturating_sub(rhs.0))
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Money {
        iter.copied().sum()
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        rust_decimal::serde::str::serialize(&self.0, serializer)
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(Money::from_json(&value))
    }
}

/// Normalize a JSON amount to a decimal. Null, booleans, arrays, objects and
/// unparseable strings all yield zero.
pub fn parse_amount(value: &Value) -> Decimal {
    match value {
        Value::Number(n) => parse_amount_str(&n.to_string()),
        Value::String(s) => parse_amount_str(s),
        _ => Decimal::ZERO,
    }
}

/// Normalize a text amount such as `"1,250.50"` to a decimal.
pub fn parse_amount_str(text: &str) -> Decimal {
    let cleaned: String = text
        .trim()
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();

    if cleaned.is_empty() {
        return Decimal::ZERO;
    }

    Decimal::from_str(&cleaned)
        .or_else(|_| Decimal::from_scientific(&cleaned))
        .unwrap_or(Decimal::ZERO)
}

/// Lenient deserializer for whole counts such as `advance_payment_months`.
///
/// Accepts the same shapes as [`Money`]; fractions are truncated and values
/// outside `i32` collapse to zero.
pub fn lenient_count<'de, D>(deserializer: D) -> Result<i32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(parse_amount(&value).trunc().to_i32().unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_parse_amount_non_numeric_is_zero() {
        assert_eq!(parse_amount(&Value::Null), dec!(0));
        assert_eq!(parse_amount(&json!("abc")), dec!(0));
        assert_eq!(parse_amount(&json!("")), dec!(0));
        assert_eq!(parse_amount(&json!("   ")), dec!(0));
        assert_eq!(parse_amount(&json!(true)), dec!(0));
        assert_eq!(parse_amount(&json!([1, 2])), dec!(0));
        assert_eq!(parse_amount(&json!({"amount": 5})), dec!(0));
    }

    #[test]
    fn test_parse_amount_numbers_and_strings() {
        assert_eq!(parse_amount(&json!(500)), dec!(500));
        assert_eq!(parse_amount(&json!(12.5)), dec!(12.5));
        assert_eq!(parse_amount(&json!("250.75")), dec!(250.75));
        assert_eq!(parse_amount(&json!(" 42 ")), dec!(42));
        assert_eq!(parse_amount(&json!("-300")), dec!(-300));
    }

    #[test]
    fn test_parse_amount_comma_formatted() {
        assert_eq!(parse_amount(&json!("1,250.50")), dec!(1250.50));
        assert_eq!(parse_amount(&json!("10,000")), dec!(10000));
        assert_eq!(parse_amount_str("1 000"), dec!(1000));
    }

    #[test]
    fn test_parse_amount_scientific() {
        assert_eq!(parse_amount_str("1e3"), dec!(1000));
    }

    #[test]
    fn test_money_deserialize_lenient() {
        #[derive(Deserialize)]
        struct Line {
            #[serde(default)]
            amount: Money,
        }

        let line: Line = serde_json::from_value(json!({"amount": "2,000"})).unwrap();
        assert_eq!(line.amount.amount(), dec!(2000));

        let line: Line = serde_json::from_value(json!({"amount": null})).unwrap();
        assert_eq!(line.amount, Money::ZERO);

        let line: Line = serde_json::from_value(json!({"amount": "n/a"})).unwrap();
        assert_eq!(line.amount, Money::ZERO);

        let line: Line = serde_json::from_value(json!({})).unwrap();
        assert_eq!(line.amount, Money::ZERO);
    }

    #[test]
    fn test_money_serializes_as_string() {
        let value = serde_json::to_value(Money::new(dec!(9200.00))).unwrap();
        assert_eq!(value, json!("9200.00"));
    }

    #[test]
    fn test_money_sum() {
        let total: Money = [Money::new(dec!(200)), Money::new(dec!(300))].iter().sum();
        assert_eq!(total.amount(), dec!(500));
    }

    #[test]
    fn test_money_arithmetic_saturates() {
        let max = Money::parse_lenient("79228162514264337593543950335");
        assert_eq!(max.amount(), Decimal::MAX);

        assert_eq!((max + max).amount(), Decimal::MAX);
        assert_eq!((Money::ZERO - max - max).amount(), Decimal::MIN);

        let total: Money = [max, max, Money::new(dec!(1))].iter().sum();
        assert_eq!(total.amount(), Decimal::MAX);
    }

    #[test]
    fn test_lenient_count() {
        #[derive(Deserialize)]
        struct Terms {
            #[serde(default, deserialize_with = "lenient_count")]
            months: i32,
        }

        let t: Terms = serde_json::from_value(json!({"months": "2"})).unwrap();
        assert_eq!(t.months, 2);
        let t: Terms = serde_json::from_value(json!({"months": 3.9})).unwrap();
        assert_eq!(t.months, 3);
        let t: Terms = serde_json::from_value(json!({"months": null})).unwrap();
        assert_eq!(t.months, 0);
        let t: Terms = serde_json::from_value(json!({"months": "soon"})).unwrap();
        assert_eq!(t.months, 0);
    }
}
