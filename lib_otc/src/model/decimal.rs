//! Decimal values travel as strings on both wires. [`Decimal`] keeps the text
//! exactly as received, so a value of any precision survives a decode/encode
//! cycle unchanged (`"1.50"` stays `"1.50"`, `"-0"` stays `"-0"`). Arithmetic
//! goes through [`Decimal::to_decimal`], which yields a `rust_decimal` value and
//! fails for numbers outside its 96-bit range instead of rounding them.

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use crate::error::{OtcError, OtcResult};

/// A syntactically valid decimal number in its wire representation.
///
/// Equality is textual: `"1.5"` and `"1.50"` are different wire values.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Decimal(Cow<'static, str>);

impl Decimal {
    pub const ZERO: Decimal = Decimal(Cow::Borrowed("0"));
    pub const ONE: Decimal = Decimal(Cow::Borrowed("1"));

    /// `num * 10^-scale`, e.g. `Decimal::new(7150, 2)` is `"71.50"`.
    pub fn new(num: i64, scale: u32) -> Self {
        Self::from(rust_decimal::Decimal::new(num, scale))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The value as a `rust_decimal::Decimal` for arithmetic. Plain and
    /// scientific notation are accepted; values that do not fit are an error.
    pub fn to_decimal(&self) -> OtcResult<rust_decimal::Decimal> {
        let text = self.as_str();
        let parsed = if text.contains(['e', 'E']) {
            rust_decimal::Decimal::from_scientific(text)
        } else {
            rust_decimal::Decimal::from_str_exact(text)
        };
        parsed.map_err(|e| OtcError::InvalidInput(format!("decimal '{text}' out of range: {e}")))
    }
}

impl Default for Decimal {
    fn default() -> Self {
        Self::ZERO
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Decimal {
    type Err = OtcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        from_wire(s)
    }
}

impl From<rust_decimal::Decimal> for Decimal {
    fn from(value: rust_decimal::Decimal) -> Self {
        Self(Cow::Owned(value.to_string()))
    }
}

macro_rules! from_integer {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Decimal {
                fn from(value: $ty) -> Self {
                    Self(Cow::Owned(value.to_string()))
                }
            }
        )*
    };
}

from_integer!(i32, i64, u32, u64);

/// Formats a decimal for the wire.
pub fn to_wire(value: &Decimal) -> String {
    value.as_str().to_string()
}

/// Parses a wire decimal string: an optional sign, digits with at most one
/// decimal point and an optional exponent. Surrounding whitespace is dropped.
pub fn from_wire(value: &str) -> Result<Decimal, OtcError> {
    let trimmed = value.trim();
    if is_decimal_text(trimmed) {
        Ok(Decimal(Cow::Owned(trimmed.to_string())))
    } else {
        Err(OtcError::Decode(format!("invalid decimal '{value}'")))
    }
}

fn is_decimal_text(text: &str) -> bool {
    let unsigned = text.strip_prefix(['-', '+']).unwrap_or(text);
    let (mantissa, exponent) = match unsigned.find(['e', 'E']) {
        Some(at) => (&unsigned[..at], Some(&unsigned[at + 1..])),
        None => (unsigned, None),
    };
    let (whole, fraction) = mantissa.split_once('.').unwrap_or((mantissa, ""));
    let digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    let mantissa_ok = digits(whole) && digits(fraction) && !(whole.is_empty() && fraction.is_empty());
    let exponent_ok = match exponent {
        None => true,
        Some(exp) => {
            let exp = exp.strip_prefix(['-', '+']).unwrap_or(exp);
            !exp.is_empty() && digits(exp)
        }
    };
    mantissa_ok && exponent_ok
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preserves_exact_text() {
        for text in ["1", "1.50", "0.000001", "-42.1000", "123456789012345.678901234", "-0", ".5"] {
            assert_eq!(to_wire(&from_wire(text).unwrap()), text);
        }
    }

    #[test]
    fn keeps_precision_beyond_96_bits() {
        let long_fraction = "0.12345678901234567890123456789";
        let long_integer = "123456789012345678901234567890";
        assert_eq!(to_wire(&from_wire(long_fraction).unwrap()), long_fraction);
        assert_eq!(to_wire(&from_wire(long_integer).unwrap()), long_integer);
        assert!(from_wire(long_integer).unwrap().to_decimal().is_err());
    }

    #[test]
    fn accepts_scientific_notation() {
        let value = from_wire("1.5e3").unwrap();
        assert_eq!(value.as_str(), "1.5e3");
        assert_eq!(value.to_decimal().unwrap(), rust_decimal::Decimal::from(1500));
    }

    #[test]
    fn converts_for_arithmetic() {
        assert_eq!(Decimal::new(7150, 2).as_str(), "71.50");
        assert_eq!(Decimal::from(5).as_str(), "5");
        let sum = Decimal::new(125, 2).to_decimal().unwrap() + Decimal::ONE.to_decimal().unwrap();
        assert_eq!(Decimal::from(sum).as_str(), "2.25");
    }

    #[test]
    fn rejects_non_numbers() {
        for text in ["", "abc", ".", "-", "1.2.3", "1e", "1e+", "12a", "--1"] {
            assert!(from_wire(text).is_err(), "{text} should be rejected");
        }
    }
}
