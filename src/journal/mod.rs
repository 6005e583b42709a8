//! Journal - normalized, date-sorted stream of atomic events
//!
//! The journal is derived from a ledger and market data by
//! [`builder::JournalBuilder`] and never changes afterwards. Every metric in
//! [`crate::reports`] is computed by replaying a prefix of it.

pub mod builder;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::PortfolioError;
use crate::ledger::{Ledger, MarketData};
use crate::models::{Currency, DividendAmount, Money, SecurityId, SplitRatio};

pub use builder::JournalBuilder;

/// One atomic fact on a given date
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    pub date: NaiveDate,
    pub kind: EventKind,
}

/// Event payloads. `external` marks money crossing the portfolio boundary
/// (capital flows) as opposed to transfers inside it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EventKind {
    CreditCash {
        amount: Money,
        external: bool,
    },
    DebitCash {
        amount: Money,
        external: bool,
    },
    AcquireLot {
        ticker: String,
        quantity: Decimal,
        cost: Money,
    },
    DisposeLot {
        ticker: String,
        quantity: Decimal,
        proceeds: Money,
    },
    CreditCounterparty {
        account: String,
        amount: Money,
        external: bool,
    },
    DebitCounterparty {
        account: String,
        amount: Money,
        external: bool,
    },
    DeclareSecurity {
        ticker: String,
        id: SecurityId,
        currency: Currency,
    },
    DeclareCounterparty {
        account: String,
        currency: Currency,
    },
    UpdatePrice {
        ticker: String,
        price: Money,
    },
    /// Value of one unit of `currency` in the reporting currency
    UpdateForex {
        currency: Currency,
        rate: Decimal,
    },
    SplitShare {
        ticker: String,
        ratio: SplitRatio,
    },
    ReceiveDividend {
        ticker: String,
        amount: DividendAmount,
    },
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::CreditCash { .. } => "CREDIT_CASH",
            EventKind::DebitCash { .. } => "DEBIT_CASH",
            EventKind::AcquireLot { .. } => "ACQUIRE_LOT",
            EventKind::DisposeLot { .. } => "DISPOSE_LOT",
            EventKind::CreditCounterparty { .. } => "CREDIT_COUNTERPARTY",
            EventKind::DebitCounterparty { .. } => "DEBIT_COUNTERPARTY",
            EventKind::DeclareSecurity { .. } => "DECLARE_SECURITY",
            EventKind::DeclareCounterparty { .. } => "DECLARE_COUNTERPARTY",
            EventKind::UpdatePrice { .. } => "UPDATE_PRICE",
            EventKind::UpdateForex { .. } => "UPDATE_FOREX",
            EventKind::SplitShare { .. } => "SPLIT_SHARE",
            EventKind::ReceiveDividend { .. } => "RECEIVE_DIVIDEND",
        }
    }

    /// Ticker of the security this event is about, if any
    pub fn ticker(&self) -> Option<&str> {
        match self {
            EventKind::AcquireLot { ticker, .. }
            | EventKind::DisposeLot { ticker, .. }
            | EventKind::DeclareSecurity { ticker, .. }
            | EventKind::UpdatePrice { ticker, .. }
            | EventKind::SplitShare { ticker, .. }
            | EventKind::ReceiveDividend { ticker, .. } => Some(ticker),
            _ => None,
        }
    }
}

/// Immutable, date-sorted event sequence plus the reporting currency
#[derive(Debug, Clone, PartialEq)]
pub struct Journal {
    currency: Currency,
    events: Vec<Event>,
}

impl Journal {
    /// Build a journal with the default builder settings
    pub fn build(
        ledger: &Ledger,
        market: &MarketData,
        currency: Currency,
    ) -> Result<Journal, PortfolioError> {
        JournalBuilder::new(currency).build(ledger, market)
    }

    /// Events must already be sorted by date
    pub(crate) fn from_sorted(currency: Currency, events: Vec<Event>) -> Self {
        debug_assert!(events.windows(2).all(|w| w[0].date <= w[1].date));
        Self { currency, events }
    }

    pub fn reporting_currency(&self) -> Currency {
        self.currency
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// All events dated on or before `date`
    pub fn events_until(&self, date: NaiveDate) -> &[Event] {
        let end = self.events.partition_point(|e| e.date <= date);
        &self.events[..end]
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.events.first().map(|e| e.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.events.last().map(|e| e.date)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
