//! Money Module
//!
//! Fixed-point currency amounts for ACH entries. All amounts are held as
//! integer cents next to an ISO-4217 currency code and exchanged with clients
//! in the normalized form `"USD 12.34"`.
//!
//! ## Design Principles
//! 1. No floats: decimal strings are parsed with `rust_decimal`
//! 2. Explicit rounding: fractions beyond two places round half-up to cents
//! 3. Explicit errors: mixing currencies is a typed error, never a panic
//!
//! ## Usage
//! ```rust
//! use paygate::money::Amount;
//!
//! let a = Amount::parse("USD", "0.12").unwrap();
//! let b: Amount = "USD 0.37".parse().unwrap();
//! assert_eq!(a.plus(&b).unwrap().to_string(), "USD 0.49");
//! ```

use rust_decimal::prelude::*;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

use crate::error::ErrorKind;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AmountError {
    #[error("invalid Amount format: {0}")]
    InvalidFormat(String),

    #[error("unknown ISO-4217 currency: {0}")]
    UnknownCurrency(String),

    #[error("negative amounts are not allowed")]
    Negative,

    #[error("amount too large, would overflow")]
    Overflow,

    #[error("different currencies: {0} and {1}")]
    DifferentCurrencies(Currency, Currency),
}

impl AmountError {
    pub fn code(&self) -> &'static str {
        match self {
            AmountError::InvalidFormat(_) => "INVALID_AMOUNT_FORMAT",
            AmountError::UnknownCurrency(_) => "UNKNOWN_CURRENCY",
            AmountError::Negative => "NEGATIVE_AMOUNT",
            AmountError::Overflow => "AMOUNT_OVERFLOW",
            AmountError::DifferentCurrencies(_, _) => "DIFFERENT_CURRENCIES",
        }
    }

    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Validation
    }
}

// ============================================================================
// Currency
// ============================================================================

/// Three-letter ISO-4217 currency code, always upper case.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Currency([u8; 3]);

impl Currency {
    pub const USD: Currency = Currency(*b"USD");

    /// Parse a currency code, case-insensitively.
    pub fn parse(code: &str) -> Result<Self, AmountError> {
        let normalized = code.trim().to_ascii_uppercase();
        if ISO_4217_CODES.binary_search(&normalized.as_str()).is_err() {
            return Err(AmountError::UnknownCurrency(code.to_string()));
        }
        let bytes = normalized.as_bytes();
        Ok(Currency([bytes[0], bytes[1], bytes[2]]))
    }

    pub fn as_str(&self) -> &str {
        // Only constructed from validated ASCII codes
        std::str::from_utf8(&self.0).unwrap_or("XXX")
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Currency({})", self.as_str())
    }
}

// ============================================================================
// Amount
// ============================================================================

/// Non-negative amount of money in cents.
///
/// Equality and ordering follow the normalized `"SYM D.DD"` form: two amounts
/// are equal exactly when they print the same. Ordering groups by currency
/// first and then by value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Amount {
    symbol: Currency,
    number: i64,
}

impl Amount {
    /// Parse a decimal string in the given currency.
    ///
    /// Fractions beyond two decimal places are rounded half-up.
    pub fn parse(symbol: &str, number: &str) -> Result<Self, AmountError> {
        let symbol = Currency::parse(symbol)?;
        let number = parse_cents(number)?;
        Ok(Self { symbol, number })
    }

    /// Build an amount from integer cents.
    pub fn from_cents(symbol: Currency, cents: i64) -> Result<Self, AmountError> {
        if cents < 0 {
            return Err(AmountError::Negative);
        }
        Ok(Self {
            symbol,
            number: cents,
        })
    }

    /// `USD 0.00`
    pub fn empty() -> Self {
        Self {
            symbol: Currency::USD,
            number: 0,
        }
    }

    /// Value in cents (the ACH entry amount).
    #[inline]
    pub fn cents(&self) -> i64 {
        self.number
    }

    #[inline]
    pub fn symbol(&self) -> Currency {
        self.symbol
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.number == 0
    }

    /// Add two amounts of the same currency.
    pub fn plus(&self, other: &Amount) -> Result<Amount, AmountError> {
        if self.symbol != other.symbol {
            return Err(AmountError::DifferentCurrencies(self.symbol, other.symbol));
        }
        let number = self
            .number
            .checked_add(other.number)
            .ok_or(AmountError::Overflow)?;
        Ok(Amount {
            symbol: self.symbol,
            number,
        })
    }

    /// `self - other`, or `None` when other is larger or in another currency.
    pub fn checked_sub(&self, other: &Amount) -> Option<Amount> {
        if self.symbol != other.symbol || other.number > self.number {
            return None;
        }
        Some(Amount {
            symbol: self.symbol,
            number: self.number - other.number,
        })
    }
}

impl Default for Amount {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}.{:02}",
            self.symbol,
            self.number / 100,
            self.number % 100
        )
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    /// Parse the normalized `"SYM D.DD"` form.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split_whitespace().collect();
        if parts.len() != 2 {
            return Err(AmountError::InvalidFormat(s.to_string()));
        }
        Amount::parse(parts[0], parts[1])
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Strict decimal parse: digits with an optional single fractional part.
fn parse_cents(number: &str) -> Result<i64, AmountError> {
    let number = number.trim();
    if number.starts_with('-') {
        return Err(AmountError::Negative);
    }

    let mut parts = number.splitn(2, '.');
    let whole = parts.next().unwrap_or_default();
    let frac = parts.next();

    let digits_only = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if !digits_only(whole) || frac.is_some_and(|f| !digits_only(f)) {
        return Err(AmountError::InvalidFormat(number.to_string()));
    }

    let value =
        Decimal::from_str(number).map_err(|_| AmountError::InvalidFormat(number.to_string()))?;
    value
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
        .checked_mul(Decimal::ONE_HUNDRED)
        .and_then(|cents| cents.to_i64())
        .ok_or(AmountError::Overflow)
}

/// Active ISO-4217 codes, sorted for binary search.
const ISO_4217_CODES: &[&str] = &[
    "AED", "AFN", "ALL", "AMD", "ANG", "AOA", "ARS", "AUD", "AWG", "AZN", "BAM", "BBD", "BDT",
    "BGN", "BHD", "BIF", "BMD", "BND", "BOB", "BOV", "BRL", "BSD", "BTN", "BWP", "BYN", "BZD",
    "CAD", "CDF", "CHE", "CHF", "CHW", "CLF", "CLP", "CNY", "COP", "COU", "CRC", "CUC", "CUP",
    "CVE", "CZK", "DJF", "DKK", "DOP", "DZD", "EGP", "ERN", "ETB", "EUR", "FJD", "FKP", "GBP",
    "GEL", "GHS", "GIP", "GMD", "GNF", "GTQ", "GYD", "HKD", "HNL", "HTG", "HUF", "IDR", "ILS",
    "INR", "IQD", "IRR", "ISK", "JMD", "JOD", "JPY", "KES", "KGS", "KHR", "KMF", "KPW", "KRW",
    "KWD", "KYD", "KZT", "LAK", "LBP", "LKR", "LRD", "LSL", "LYD", "MAD", "MDL", "MGA", "MKD",
    "MMK", "MNT", "MOP", "MRU", "MUR", "MVR", "MWK", "MXN", "MXV", "MYR", "MZN", "NAD", "NGN",
    "NIO", "NOK", "NPR", "NZD", "OMR", "PAB", "PEN", "PGK", "PHP", "PKR", "PLN", "PYG", "QAR",
    "RON", "RSD", "RUB", "RWF", "SAR", "SBD", "SCR", "SDG", "SEK", "SGD", "SHP", "SLE", "SLL",
    "SOS", "SRD", "SSP", "STN", "SVC", "SYP", "SZL", "THB", "TJS", "TMT", "TND", "TOP", "TRY",
    "TTD", "TWD", "TZS", "UAH", "UGX", "USD", "USN", "UYI", "UYU", "UYW", "UZS", "VED", "VES",
    "VND", "VUV", "WST", "XAF", "XAG", "XAU", "XBA", "XBB", "XBC", "XBD", "XCD", "XDR", "XOF",
    "XPD", "XPF", "XPT", "XSU", "XTS", "XUA", "XXX", "YER", "ZAR", "ZMW", "ZWL",
];

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn usd(s: &str) -> Amount {
        Amount::parse("USD", s).unwrap()
    }

    #[test]
    fn test_iso_table_sorted() {
        assert!(ISO_4217_CODES.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_parse_and_format() {
        assert_eq!(usd("12.34").to_string(), "USD 12.34");
        assert_eq!(usd("12.34").cents(), 1234);
        assert_eq!(usd("7").to_string(), "USD 7.00");
        assert_eq!(usd("0.5").to_string(), "USD 0.50");
        assert_eq!(usd("0").to_string(), "USD 0.00");
        assert_eq!(Amount::parse("eur", "1.00").unwrap().to_string(), "EUR 1.00");
    }

    #[test]
    fn test_parse_rounds_half_up() {
        assert_eq!(usd("1.005").cents(), 101);
        assert_eq!(usd("1.004").cents(), 100);
        assert_eq!(usd("0.125").cents(), 13);
        assert_eq!(usd("0.999").cents(), 100);
    }

    #[test]
    fn test_parse_rejects() {
        assert_eq!(Amount::parse("USD", "-1.00"), Err(AmountError::Negative));
        assert!(matches!(
            Amount::parse("ZZZ", "1.00"),
            Err(AmountError::UnknownCurrency(_))
        ));
        for bad in ["", "1.2.3", "1,000", "abc", ".5", "5.", "1e2", "+1"] {
            assert!(
                matches!(Amount::parse("USD", bad), Err(AmountError::InvalidFormat(_))),
                "should reject {:?}",
                bad
            );
        }
        assert!(matches!(
            "USD".parse::<Amount>(),
            Err(AmountError::InvalidFormat(_))
        ));
        assert!(matches!(
            "USD 1.00 extra".parse::<Amount>(),
            Err(AmountError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_plus() {
        assert_eq!(usd("0.12").plus(&usd("0.37")).unwrap().to_string(), "USD 0.49");

        let eur = Amount::parse("EUR", "0.10").unwrap();
        let err = usd("0.10").plus(&eur).unwrap_err();
        assert_eq!(err.code(), "DIFFERENT_CURRENCIES");
    }

    #[test]
    fn test_empty_sentinel() {
        assert_eq!(Amount::default().to_string(), "USD 0.00");
        assert!(Amount::empty().is_zero());
    }

    #[test]
    fn test_equality_follows_string_form() {
        assert_eq!(usd("0.10"), usd("0.1"));
        assert_eq!(usd("0.10"), "usd 0.10".parse().unwrap());
        assert_ne!(usd("0.10"), Amount::parse("CAD", "0.10").unwrap());
        assert!(usd("9.00") < usd("10.00"));
    }

    #[test]
    fn test_serde_string_form() {
        let json = serde_json::to_string(&usd("3.50")).unwrap();
        assert_eq!(json, "\"USD 3.50\"");
        let back: Amount = serde_json::from_str(&json).unwrap();
        assert_eq!(back, usd("3.50"));
        assert!(serde_json::from_str::<Amount>("\"USD -1\"").is_err());
    }

    #[test]
    fn test_checked_sub() {
        assert_eq!(usd("5.00").checked_sub(&usd("1.25")), Some(usd("3.75")));
        assert_eq!(usd("1.00").checked_sub(&usd("1.25")), None);
    }

    proptest! {
        #[test]
        fn prop_string_roundtrip(cents in 0i64..10_000_000_000, code in prop::sample::select(ISO_4217_CODES)) {
            let currency = Currency::parse(code).unwrap();
            let amount = Amount::from_cents(currency, cents).unwrap();
            let back: Amount = amount.to_string().parse().unwrap();
            prop_assert_eq!(back, amount);
        }

        #[test]
        fn prop_plus_commutative(a in 0i64..1_000_000_000, b in 0i64..1_000_000_000) {
            let x = Amount::from_cents(Currency::USD, a).unwrap();
            let y = Amount::from_cents(Currency::USD, b).unwrap();
            prop_assert_eq!(x.plus(&y).unwrap(), y.plus(&x).unwrap());
        }
    }
}
