use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::PortfolioError;

/// ISO 4217 currency code (three ASCII letters, stored upper-case)
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Currency([u8; 3]);

impl Currency {
    pub const EUR: Currency = Currency(*b"EUR");
    pub const USD: Currency = Currency(*b"USD");

    pub fn new(code: &str) -> Result<Self, PortfolioError> {
        let code = code.trim();
        let bytes = code.as_bytes();
        if bytes.len() != 3 || !bytes.iter().all(u8::is_ascii_alphabetic) {
            return Err(PortfolioError::InvalidCurrency(code.to_string()));
        }
        Ok(Self([
            bytes[0].to_ascii_uppercase(),
            bytes[1].to_ascii_uppercase(),
            bytes[2].to_ascii_uppercase(),
        ]))
    }

    pub fn as_str(&self) -> &str {
        // Only ASCII letters are ever stored
        std::str::from_utf8(&self.0).unwrap_or("???")
    }
}

impl FromStr for Currency {
    type Err = PortfolioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Currency::new(s)
    }
}

impl TryFrom<String> for Currency {
    type Error = PortfolioError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Currency::new(&value)
    }
}

impl From<Currency> for String {
    fn from(value: Currency) -> Self {
        value.as_str().to_string()
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

/// An amount tagged with its currency.
///
/// Arithmetic between two `Money` values is only defined for the same
/// currency; converting between currencies needs an exchange rate from the
/// journal (see `Snapshot::convert`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Money {
    pub amount: Decimal,
    pub currency: Currency,
}

impl Money {
    pub fn new(amount: Decimal, currency: Currency) -> Self {
        Self { amount, currency }
    }

    pub fn zero(currency: Currency) -> Self {
        Self::new(Decimal::ZERO, currency)
    }

    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        self.amount > Decimal::ZERO
    }

    pub fn abs(&self) -> Self {
        Self::new(self.amount.abs(), self.currency)
    }

    /// Multiply by a plain factor, keeping the currency
    pub fn scale(&self, factor: Decimal) -> Self {
        Self::new(self.amount * factor, self.currency)
    }

    pub fn checked_add(&self, other: &Money) -> Result<Money, PortfolioError> {
        self.ensure_same_currency(other)?;
        Ok(Self::new(self.amount + other.amount, self.currency))
    }

    pub fn checked_sub(&self, other: &Money) -> Result<Money, PortfolioError> {
        self.ensure_same_currency(other)?;
        Ok(Self::new(self.amount - other.amount, self.currency))
    }

    fn ensure_same_currency(&self, other: &Money) -> Result<(), PortfolioError> {
        if self.currency != other.currency {
            return Err(PortfolioError::CurrencyMismatch {
                expected: self.currency.to_string(),
                found: other.currency.to_string(),
            });
        }
        Ok(())
    }
}

impl std::ops::Neg for Money {
    type Output = Money;

    fn neg(self) -> Money {
        Money::new(-self.amount, self.currency)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.currency)
    }
}

/// Identifier that keys market data (ISIN, exchange symbol, currency pair)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SecurityId(String);

impl SecurityId {
    pub fn new(id: &str) -> Result<Self, PortfolioError> {
        let id = id.trim();
        if id.is_empty() || id.chars().any(char::is_whitespace) {
            return Err(PortfolioError::InvalidSecurityId(id.to_string()));
        }
        Ok(Self(id.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Base and quote currency when this ID is a currency pair such as
    /// `EURUSD` (one EUR is worth `price` USD).
    pub fn currency_pair(&self) -> Option<(Currency, Currency)> {
        let bytes = self.0.as_bytes();
        if bytes.len() != 6 || !bytes.iter().all(u8::is_ascii_uppercase) {
            return None;
        }
        let base = Currency::new(&self.0[..3]).ok()?;
        let quote = Currency::new(&self.0[3..]).ok()?;
        Some((base, quote))
    }
}

impl FromStr for SecurityId {
    type Err = PortfolioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SecurityId::new(s)
    }
}

impl TryFrom<String> for SecurityId {
    type Error = PortfolioError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        SecurityId::new(&value)
    }
}

impl From<SecurityId> for String {
    fn from(value: SecurityId) -> Self {
        value.0
    }
}

impl fmt::Display for SecurityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Share split ratio, e.g. 4:1 turns every share into four.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawSplitRatio")]
pub struct SplitRatio {
    numerator: u32,
    denominator: u32,
}

#[derive(Deserialize)]
struct RawSplitRatio {
    numerator: u32,
    denominator: u32,
}

impl TryFrom<RawSplitRatio> for SplitRatio {
    type Error = PortfolioError;

    fn try_from(raw: RawSplitRatio) -> Result<Self, Self::Error> {
        SplitRatio::new(raw.numerator, raw.denominator)
    }
}

impl SplitRatio {
    pub fn new(numerator: u32, denominator: u32) -> Result<Self, PortfolioError> {
        if numerator == 0 || denominator == 0 {
            return Err(PortfolioError::InvalidSplitRatio {
                numerator,
                denominator,
            });
        }
        Ok(Self {
            numerator,
            denominator,
        })
    }

    pub fn numerator(&self) -> u32 {
        self.numerator
    }

    pub fn denominator(&self) -> u32 {
        self.denominator
    }

    /// Scale a share quantity by this ratio
    pub fn apply(&self, quantity: Decimal) -> Decimal {
        quantity * Decimal::from(self.numerator) / Decimal::from(self.denominator)
    }
}

impl fmt::Display for SplitRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.numerator, self.denominator)
    }
}

/// How a dividend was recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "amount")]
pub enum DividendAmount {
    /// Cash actually received
    Total(Money),
    /// Amount paid per share held on the dividend date
    PerShare(Money),
}

impl DividendAmount {
    pub fn currency(&self) -> Currency {
        match self {
            DividendAmount::Total(m) | DividendAmount::PerShare(m) => m.currency,
        }
    }

    /// Cash received for the given position
    pub fn resolve(&self, position: Decimal) -> Money {
        match self {
            DividendAmount::Total(m) => *m,
            DividendAmount::PerShare(m) => m.scale(position),
        }
    }
}
