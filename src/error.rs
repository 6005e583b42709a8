//! Error handling for the journal engine
//!
//! Journal construction and value parsing return the typed `PortfolioError`
//! so callers can match on the failure. Configuration loading uses the
//! anyhow-based `Result` alias for context chaining.

use chrono::NaiveDate;
use thiserror::Error;

/// Core error types for journal construction and domain values
#[derive(Error, Debug)]
pub enum PortfolioError {
    #[error("security {ticker} referenced on {date} before it was declared")]
    UndeclaredSecurity { ticker: String, date: NaiveDate },

    #[error("security {ticker} declared more than once")]
    DuplicateDeclaration { ticker: String },

    #[error("currency mismatch: expected {expected}, found {found}")]
    CurrencyMismatch { expected: String, found: String },

    #[error("invalid currency code: {0}")]
    InvalidCurrency(String),

    #[error("invalid security id: {0}")]
    InvalidSecurityId(String),

    #[error("invalid split ratio {numerator}:{denominator}")]
    InvalidSplitRatio { numerator: u32, denominator: u32 },

    #[error("invalid period: {from} is after {to}")]
    InvalidPeriod { from: NaiveDate, to: NaiveDate },

    #[error("unrecognized period: {0}")]
    InvalidPeriodSpec(String),

    #[error("config error: {0}")]
    ConfigError(String),

    #[error("io error")]
    Io(#[from] std::io::Error),
}

/// Result type alias for configuration and other context-chained operations
pub type Result<T> = anyhow::Result<T>;
