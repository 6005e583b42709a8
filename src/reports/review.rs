//! Review - performance over a period
//!
//! A review compares two snapshots: one on the day before the period starts
//! and one on its last day. Flow metrics are differences of cumulative
//! totals; returns come from the virtual asset value.

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::cost_basis::CostBasisMethod;
use crate::journal::Journal;
use crate::models::Money;
use crate::reports::period::Period;
use crate::reports::snapshot::{SecurityInfo, Snapshot};

#[derive(Debug, Clone, Copy)]
pub struct Review<'a> {
    period: Period,
    start: Snapshot<'a>,
    end: Snapshot<'a>,
}

impl<'a> Review<'a> {
    pub fn new(journal: &'a Journal, period: Period) -> Self {
        let before = period.from().pred_opt().unwrap_or(NaiveDate::MIN);
        Self {
            period,
            start: Snapshot::new(journal, before),
            end: Snapshot::new(journal, period.to()),
        }
    }

    pub fn period(&self) -> Period {
        self.period
    }

    /// Snapshot on the day before the period
    pub fn start(&self) -> &Snapshot<'a> {
        &self.start
    }

    /// Snapshot on the last day of the period
    pub fn end(&self) -> &Snapshot<'a> {
        &self.end
    }

    fn delta(&self, metric: impl Fn(&Snapshot<'a>) -> Money) -> Money {
        let end = metric(&self.end);
        let start = metric(&self.start);
        Money::new(end.amount - start.amount, end.currency)
    }

    pub fn start_value(&self) -> Money {
        self.start.total_value()
    }

    pub fn end_value(&self) -> Money {
        self.end.total_value()
    }

    /// External capital moved in (positive) or out (negative) during the period
    pub fn cash_flow(&self) -> Money {
        self.delta(|s| s.total_cash_flow())
    }

    pub fn net_trading_flow(&self) -> Money {
        self.delta(|s| s.total_net_trading_flow())
    }

    pub fn realized_gains(&self, method: CostBasisMethod) -> Money {
        self.delta(|s| s.total_realized_gains(method))
    }

    pub fn dividends(&self) -> Money {
        self.delta(|s| s.total_dividends())
    }

    /// Change in market value not explained by buying or selling
    pub fn market_gain_loss(&self) -> Money {
        let change = self.delta(|s| s.total_market_value());
        let trading = self.net_trading_flow();
        Money::new(change.amount - trading.amount, change.currency)
    }

    pub fn total_return(&self) -> Money {
        let gain = self.market_gain_loss();
        let dividends = self.dividends();
        Money::new(gain.amount + dividends.amount, gain.currency)
    }

    /// `None` when the security had no value at the start of the period
    pub fn time_weighted_return(&self, ticker: &str) -> Option<Decimal> {
        let start = self.start.virtual_asset_value(ticker).amount;
        if start.is_zero() {
            return None;
        }
        let end = self.end.virtual_asset_value(ticker).amount;
        Some(end / start - Decimal::ONE)
    }

    /// Market gain or loss of one security, in its own currency
    pub fn market_gain_loss_of(&self, ticker: &str) -> Money {
        let change = self.delta(|s| s.market_value(ticker));
        let trading = self.delta(|s| s.net_trading_flow(ticker));
        Money::new(change.amount - trading.amount, change.currency)
    }

    pub fn dividends_of(&self, ticker: &str) -> Money {
        self.delta(|s| s.dividends(ticker))
    }

    /// Securities held at either end of the period or traded during it
    pub fn securities(&self) -> Vec<SecurityInfo> {
        self.end
            .securities()
            .into_iter()
            .filter(|s| {
                !self.start.position(&s.ticker).is_zero()
                    || !self.end.position(&s.ticker).is_zero()
                    || self.start.buys(&s.ticker) != self.end.buys(&s.ticker)
                    || self.start.sells(&s.ticker) != self.end.sells(&s.ticker)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{Ledger, MarketData, Transaction};
    use crate::models::{Currency, SecurityId};
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn eur(amount: Decimal) -> Money {
        Money::new(amount, Currency::new("EUR").unwrap())
    }

    fn journal(transactions: Vec<Transaction>) -> Journal {
        let ledger: Ledger = transactions.into_iter().collect();
        Journal::build(&ledger, &MarketData::new(), Currency::new("EUR").unwrap()).unwrap()
    }

    #[test]
    fn test_flows_are_differences_over_the_period() {
        let journal = journal(vec![
            Transaction::deposit(date(2024, 1, 5), eur(dec!(1000)), None),
            Transaction::deposit(date(2024, 2, 5), eur(dec!(500)), None),
            Transaction::withdraw(date(2024, 2, 20), eur(dec!(200)), None),
            Transaction::deposit(date(2024, 3, 5), eur(dec!(50)), None),
        ]);
        let review = Review::new(&journal, Period::month(2024, 2).unwrap());

        assert_eq!(review.start().date(), date(2024, 1, 31));
        assert_eq!(review.cash_flow().amount, dec!(300));
        assert_eq!(review.start_value().amount, dec!(1000));
        assert_eq!(review.end_value().amount, dec!(1300));
    }

    #[test]
    fn test_time_weighted_return_requires_starting_value() {
        let vwce = SecurityId::new("IE00BK5BQT80").unwrap();
        let journal = journal(vec![
            Transaction::declare(date(2024, 2, 15), "VWCE", vwce, Currency::new("EUR").unwrap()),
            Transaction::buy(date(2024, 3, 4), "VWCE", dec!(10), eur(dec!(1000))),
            Transaction::update_price(date(2024, 3, 31), "VWCE", eur(dec!(121))),
        ]);

        // Not yet declared when the period starts
        let before = Review::new(&journal, Period::month(2024, 2).unwrap());
        assert_eq!(before.time_weighted_return("VWCE"), None);

        let march = Review::new(&journal, Period::month(2024, 3).unwrap());
        assert_eq!(march.time_weighted_return("VWCE"), Some(dec!(0.21)));
        assert_eq!(march.market_gain_loss().amount, dec!(210));
        assert_eq!(march.total_return().amount, dec!(210));
        assert_eq!(march.securities().len(), 1);
    }
}
