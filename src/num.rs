/// Arbitrary-precision numeric helpers over `BigDecimal`.
///
/// The walker treats every JSON number as an arbitrary-precision decimal;
/// conversions to and from the narrower host types (i32/i64/f64) round
/// half away from zero and range-check, mirroring SQL numeric casts.
use std::str::FromStr;

use bigdecimal::{BigDecimal, RoundingMode, ToPrimitive, Zero};

use crate::error::Error;

pub(crate) type ArithFn = fn(&BigDecimal, &BigDecimal) -> Result<BigDecimal, Error>;

pub(crate) fn add(a: &BigDecimal, b: &BigDecimal) -> Result<BigDecimal, Error> {
    Ok(a + b)
}

pub(crate) fn sub(a: &BigDecimal, b: &BigDecimal) -> Result<BigDecimal, Error> {
    Ok(a - b)
}

pub(crate) fn mul(a: &BigDecimal, b: &BigDecimal) -> Result<BigDecimal, Error> {
    Ok(a * b)
}

pub(crate) fn div(a: &BigDecimal, b: &BigDecimal) -> Result<BigDecimal, Error> {
    if b.is_zero() {
        return Err(Error::DivisionByZero);
    }
    Ok(a / b)
}

pub(crate) fn rem(a: &BigDecimal, b: &BigDecimal) -> Result<BigDecimal, Error> {
    if b.is_zero() {
        return Err(Error::DivisionByZero);
    }
    Ok(a % b)
}

/// Truncate toward zero to an integral value.
pub(crate) fn trunc(d: &BigDecimal) -> BigDecimal {
    d.with_scale_round(0, RoundingMode::Down)
}

pub(crate) fn floor(d: &BigDecimal) -> BigDecimal {
    d.with_scale_round(0, RoundingMode::Floor)
}

pub(crate) fn ceiling(d: &BigDecimal) -> BigDecimal {
    d.with_scale_round(0, RoundingMode::Ceiling)
}

pub(crate) fn abs(d: &BigDecimal) -> BigDecimal {
    d.abs()
}

/// Round half away from zero to an integral value, then narrow to i32.
/// None when out of range.
pub(crate) fn to_i32_rounded(d: &BigDecimal) -> Option<i32> {
    d.with_scale_round(0, RoundingMode::HalfUp).to_i32()
}

/// Round half away from zero to an integral value, then narrow to i64.
pub(crate) fn to_i64_rounded(d: &BigDecimal) -> Option<i64> {
    d.with_scale_round(0, RoundingMode::HalfUp).to_i64()
}

/// Decimal from a finite f64 using its shortest round-trip rendering, so
/// `0.1f64` arrives as `0.1` and not its full binary expansion.
pub(crate) fn decimal_from_f64(f: f64) -> Option<BigDecimal> {
    if !f.is_finite() {
        return None;
    }
    let mut buf = ryu::Buffer::new();
    BigDecimal::from_str(buf.format(f)).ok()
}

pub(crate) fn decimal_to_f64(d: &BigDecimal) -> Option<f64> {
    d.to_f64()
}

/// Decimal from a JSON number. JSON number grammar is a subset of the
/// decimal grammar, so this cannot fail for numbers serde_json accepted.
pub(crate) fn decimal_from_json(n: &serde_json::Number) -> BigDecimal {
    BigDecimal::from_str(&n.to_string()).expect("JSON number is a valid decimal")
}

/// JSON number from a decimal. The plain rendering of a decimal is always
/// within the JSON number grammar.
pub(crate) fn json_number_from_decimal(d: &BigDecimal) -> serde_json::Number {
    serde_json::Number::from_str(&d.to_string()).expect("decimal renders as a JSON number")
}

/// Apply a `numeric(precision, scale)` typmod: round to `scale` fractional
/// digits, then fail if the integral part needs more than
/// `precision - scale` digits.
pub(crate) fn apply_typmod(
    d: &BigDecimal,
    precision: i32,
    scale: i32,
) -> Result<BigDecimal, ()> {
    if precision < 1 || scale < 0 || scale > precision {
        return Err(());
    }
    let rounded = d.with_scale_round(scale as i64, RoundingMode::HalfUp);
    if rounded.is_zero() {
        return Ok(rounded);
    }
    let integral_digits = rounded.digits() as i64 - rounded.fractional_digit_count().max(0);
    if integral_digits > (precision - scale) as i64 {
        return Err(());
    }
    Ok(rounded)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> BigDecimal {
        s.parse().unwrap()
    }

    #[test]
    fn div_by_zero_is_an_error() {
        assert_eq!(div(&dec("1"), &dec("0")), Err(Error::DivisionByZero));
        assert_eq!(rem(&dec("1"), &dec("0")), Err(Error::DivisionByZero));
        assert_eq!(div(&dec("10"), &dec("4")).unwrap(), dec("2.5"));
    }

    #[test]
    fn rem_follows_dividend_sign() {
        assert_eq!(rem(&dec("7"), &dec("3")).unwrap(), dec("1"));
        assert_eq!(rem(&dec("-7"), &dec("3")).unwrap(), dec("-1"));
    }

    #[test]
    fn trunc_toward_zero() {
        assert_eq!(trunc(&dec("2.9")), dec("2"));
        assert_eq!(trunc(&dec("-2.9")), dec("-2"));
    }

    #[test]
    fn floor_and_ceiling() {
        assert_eq!(floor(&dec("2.1")), dec("2"));
        assert_eq!(floor(&dec("-2.1")), dec("-3"));
        assert_eq!(ceiling(&dec("2.1")), dec("3"));
        assert_eq!(ceiling(&dec("-2.1")), dec("-2"));
    }

    #[test]
    fn narrowing_rounds_half_away() {
        assert_eq!(to_i32_rounded(&dec("2.5")), Some(3));
        assert_eq!(to_i32_rounded(&dec("-2.5")), Some(-3));
        assert_eq!(to_i32_rounded(&dec("2147483648")), None);
        assert_eq!(to_i64_rounded(&dec("2.4")), Some(2));
    }

    #[test]
    fn f64_round_trip_is_shortest() {
        assert_eq!(decimal_from_f64(0.1), Some(dec("0.1")));
        assert_eq!(decimal_from_f64(f64::NAN), None);
        assert_eq!(decimal_from_f64(f64::INFINITY), None);
    }

    #[test]
    fn typmod_rounds_and_checks_width() {
        assert_eq!(apply_typmod(&dec("12.345"), 5, 2), Ok(dec("12.35")));
        assert_eq!(apply_typmod(&dec("12.345"), 4, 0), Ok(dec("12")));
        assert!(apply_typmod(&dec("123.45"), 4, 2).is_err());
        assert_eq!(apply_typmod(&dec("0.004"), 2, 2), Ok(dec("0.00")));
        assert!(apply_typmod(&dec("1"), 0, 0).is_err());
    }
}
