//! Ledger - the user's append-only record of transactions
//!
//! Transactions are validated by whoever appends them; the journal builder
//! only checks what it needs to replay them (declarations and currencies).

pub mod market_data;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{Currency, DividendAmount, Money, SecurityId, SplitRatio};

pub use market_data::{MarketData, SecurityHistory};

/// A single dated ledger entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
    #[serde(flatten)]
    pub kind: TransactionKind,
}

/// What a transaction does. Securities are referenced by ticker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransactionKind {
    Buy {
        security: String,
        quantity: Decimal,
        /// Total cost paid
        amount: Money,
    },
    Sell {
        security: String,
        quantity: Decimal,
        /// Total proceeds received
        amount: Money,
    },
    Dividend {
        security: String,
        amount: DividendAmount,
    },
    Deposit {
        amount: Money,
        /// Counterparty account this deposit settles, if any
        #[serde(default, skip_serializing_if = "Option::is_none")]
        settles: Option<String>,
    },
    Withdraw {
        amount: Money,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        settles: Option<String>,
    },
    Convert {
        from: Money,
        to: Money,
    },
    Declare {
        security: String,
        id: SecurityId,
        currency: Currency,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    /// Positive amounts are receivables, negative amounts payables
    Accrue {
        counterparty: String,
        amount: Money,
    },
    UpdatePrice {
        security: String,
        price: Money,
    },
    Split {
        security: String,
        ratio: SplitRatio,
    },
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Buy { .. } => "BUY",
            TransactionKind::Sell { .. } => "SELL",
            TransactionKind::Dividend { .. } => "DIVIDEND",
            TransactionKind::Deposit { .. } => "DEPOSIT",
            TransactionKind::Withdraw { .. } => "WITHDRAW",
            TransactionKind::Convert { .. } => "CONVERT",
            TransactionKind::Declare { .. } => "DECLARE",
            TransactionKind::Accrue { .. } => "ACCRUE",
            TransactionKind::UpdatePrice { .. } => "UPDATE_PRICE",
            TransactionKind::Split { .. } => "SPLIT",
        }
    }

    /// Ticker of a previously declared security this transaction refers to
    pub fn referenced_security(&self) -> Option<&str> {
        match self {
            TransactionKind::Buy { security, .. }
            | TransactionKind::Sell { security, .. }
            | TransactionKind::Dividend { security, .. }
            | TransactionKind::UpdatePrice { security, .. }
            | TransactionKind::Split { security, .. } => Some(security),
            TransactionKind::Deposit { .. }
            | TransactionKind::Withdraw { .. }
            | TransactionKind::Convert { .. }
            | TransactionKind::Declare { .. }
            | TransactionKind::Accrue { .. } => None,
        }
    }

    /// Counterparty account and the amount moved against it
    pub fn counterparty(&self) -> Option<(&str, &Money)> {
        match self {
            TransactionKind::Accrue {
                counterparty,
                amount,
            } => Some((counterparty, amount)),
            TransactionKind::Deposit {
                amount,
                settles: Some(account),
            }
            | TransactionKind::Withdraw {
                amount,
                settles: Some(account),
            } => Some((account, amount)),
            _ => None,
        }
    }
}

impl Transaction {
    pub fn new(date: NaiveDate, kind: TransactionKind) -> Self {
        Self {
            date,
            memo: None,
            kind,
        }
    }

    pub fn with_memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = Some(memo.into());
        self
    }

    pub fn declare(date: NaiveDate, ticker: &str, id: SecurityId, currency: Currency) -> Self {
        Self::new(
            date,
            TransactionKind::Declare {
                security: ticker.to_string(),
                id,
                currency,
                description: None,
            },
        )
    }

    pub fn buy(date: NaiveDate, ticker: &str, quantity: Decimal, amount: Money) -> Self {
        Self::new(
            date,
            TransactionKind::Buy {
                security: ticker.to_string(),
                quantity,
                amount,
            },
        )
    }

    pub fn sell(date: NaiveDate, ticker: &str, quantity: Decimal, amount: Money) -> Self {
        Self::new(
            date,
            TransactionKind::Sell {
                security: ticker.to_string(),
                quantity,
                amount,
            },
        )
    }

    pub fn dividend(date: NaiveDate, ticker: &str, amount: DividendAmount) -> Self {
        Self::new(
            date,
            TransactionKind::Dividend {
                security: ticker.to_string(),
                amount,
            },
        )
    }

    pub fn deposit(date: NaiveDate, amount: Money, settles: Option<&str>) -> Self {
        Self::new(
            date,
            TransactionKind::Deposit {
                amount,
                settles: settles.map(str::to_string),
            },
        )
    }

    pub fn withdraw(date: NaiveDate, amount: Money, settles: Option<&str>) -> Self {
        Self::new(
            date,
            TransactionKind::Withdraw {
                amount,
                settles: settles.map(str::to_string),
            },
        )
    }

    pub fn convert(date: NaiveDate, from: Money, to: Money) -> Self {
        Self::new(date, TransactionKind::Convert { from, to })
    }

    pub fn accrue(date: NaiveDate, counterparty: &str, amount: Money) -> Self {
        Self::new(
            date,
            TransactionKind::Accrue {
                counterparty: counterparty.to_string(),
                amount,
            },
        )
    }

    pub fn update_price(date: NaiveDate, ticker: &str, price: Money) -> Self {
        Self::new(
            date,
            TransactionKind::UpdatePrice {
                security: ticker.to_string(),
                price,
            },
        )
    }

    pub fn split(date: NaiveDate, ticker: &str, ratio: SplitRatio) -> Self {
        Self::new(
            date,
            TransactionKind::Split {
                security: ticker.to_string(),
                ratio,
            },
        )
    }
}

/// Ordered sequence of transactions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ledger {
    transactions: Vec<Transaction>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, transaction: Transaction) {
        self.transactions.push(transaction);
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Transaction> {
        self.transactions.iter()
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    /// Canonical form: stably sorted by date, same-day entries keep their order
    pub fn sorted(&self) -> Ledger {
        let mut transactions = self.transactions.clone();
        transactions.sort_by_key(|tx| tx.date);
        Ledger { transactions }
    }
}

impl FromIterator<Transaction> for Ledger {
    fn from_iter<I: IntoIterator<Item = Transaction>>(iter: I) -> Self {
        Ledger {
            transactions: iter.into_iter().collect(),
        }
    }
}

impl Extend<Transaction> for Ledger {
    fn extend<I: IntoIterator<Item = Transaction>>(&mut self, iter: I) {
        self.transactions.extend(iter);
    }
}

impl<'a> IntoIterator for &'a Ledger {
    type Item = &'a Transaction;
    type IntoIter = std::slice::Iter<'a, Transaction>;

    fn into_iter(self) -> Self::IntoIter {
        self.transactions.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn eur(amount: Decimal) -> Money {
        Money::new(amount, Currency::new("EUR").unwrap())
    }

    #[test]
    fn test_sorted_is_stable_for_same_day_entries() {
        let ledger: Ledger = vec![
            Transaction::deposit(date(2024, 2, 1), eur(dec!(3)), None).with_memo("third"),
            Transaction::deposit(date(2024, 1, 1), eur(dec!(1)), None).with_memo("first"),
            Transaction::deposit(date(2024, 2, 1), eur(dec!(4)), None).with_memo("fourth"),
            Transaction::deposit(date(2024, 1, 1), eur(dec!(2)), None).with_memo("second"),
        ]
        .into_iter()
        .collect();

        let memos: Vec<_> = ledger
            .sorted()
            .iter()
            .map(|tx| tx.memo.clone().unwrap())
            .collect();
        assert_eq!(memos, vec!["first", "second", "third", "fourth"]);
        // The original is untouched
        assert_eq!(ledger.transactions()[0].memo.as_deref(), Some("third"));
    }

    #[test]
    fn test_referenced_security_and_counterparty() {
        let buy = Transaction::buy(date(2024, 1, 1), "AAPL", dec!(1), eur(dec!(100)));
        assert_eq!(buy.kind.referenced_security(), Some("AAPL"));
        assert_eq!(buy.kind.as_str(), "BUY");

        let settle = Transaction::deposit(date(2024, 1, 1), eur(dec!(10)), Some("bux"));
        assert_eq!(settle.kind.referenced_security(), None);
        assert_eq!(settle.kind.counterparty().map(|(a, _)| a), Some("bux"));

        let plain = Transaction::deposit(date(2024, 1, 1), eur(dec!(10)), None);
        assert!(plain.kind.counterparty().is_none());
    }
}
