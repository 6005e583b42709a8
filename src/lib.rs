//! Folio - event-sourced portfolio metrics
//!
//! A [`Ledger`] of user transactions and a [`MarketData`] archive are
//! normalized into an immutable [`Journal`]. A [`Snapshot`] answers
//! point-in-time questions (positions, cash, cost basis, gains) by replaying
//! the journal up to a date, and a [`Review`] compares two snapshots to
//! report flows and time-weighted returns over a [`Period`].

pub mod config;
pub mod cost_basis;
pub mod error;
pub mod journal;
pub mod ledger;
pub mod models;
pub mod reports;

pub use config::Config;
pub use cost_basis::CostBasisMethod;
pub use error::PortfolioError;
pub use journal::{Event, EventKind, Journal, JournalBuilder};
pub use ledger::{Ledger, MarketData, Transaction, TransactionKind};
pub use models::{Currency, DividendAmount, Money, SecurityId, SplitRatio};
pub use reports::{Holding, Period, Review, Snapshot};
