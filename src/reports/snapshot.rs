//! Snapshot - point-in-time portfolio calculator
//!
//! A snapshot is a journal plus a date. It stores nothing: every query folds
//! over the events dated on or before the snapshot date. Unknown tickers,
//! accounts and currencies produce zero values instead of errors.

use chrono::NaiveDate;
use itertools::Itertools;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::debug;

use crate::cost_basis::{CostBasisMethod, CostTracker, Lot};
use crate::journal::{Event, EventKind, Journal};
use crate::models::{Currency, Money, SecurityId};

/// A security as declared in the journal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityInfo {
    pub ticker: String,
    pub id: SecurityId,
    pub currency: Currency,
    pub declared: NaiveDate,
}

/// A counterparty account as declared in the journal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterpartyInfo {
    pub account: String,
    pub currency: Currency,
    pub declared: NaiveDate,
}

/// Summary of a single open position
#[derive(Debug, Clone, PartialEq)]
pub struct Holding {
    pub ticker: String,
    pub id: SecurityId,
    pub quantity: Decimal,
    pub price: Money,
    pub market_value: Money,
    pub cost_basis: Money,
    pub unrealized_gain: Money,
    /// Market value converted to the reporting currency
    pub reporting_value: Money,
}

/// Running share counts per ticker, for folds that need the position at
/// the moment of another event (per-share dividends).
#[derive(Debug, Default)]
struct Positions<'e> {
    by_ticker: HashMap<&'e str, Decimal>,
}

impl<'e> Positions<'e> {
    fn observe(&mut self, kind: &'e EventKind) {
        match kind {
            EventKind::AcquireLot {
                ticker, quantity, ..
            } => *self.by_ticker.entry(ticker.as_str()).or_default() += *quantity,
            EventKind::DisposeLot {
                ticker, quantity, ..
            } => *self.by_ticker.entry(ticker.as_str()).or_default() -= *quantity,
            EventKind::SplitShare { ticker, ratio } => {
                if let Some(position) = self.by_ticker.get_mut(ticker.as_str()) {
                    *position = ratio.apply(*position);
                }
            }
            _ => {}
        }
    }

    fn get(&self, ticker: &str) -> Decimal {
        self.by_ticker.get(ticker).copied().unwrap_or(Decimal::ZERO)
    }
}

/// Point-in-time view over a journal
#[derive(Debug, Clone, Copy)]
pub struct Snapshot<'a> {
    journal: &'a Journal,
    date: NaiveDate,
}

impl<'a> Snapshot<'a> {
    pub fn new(journal: &'a Journal, date: NaiveDate) -> Self {
        Self { journal, date }
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn journal(&self) -> &'a Journal {
        self.journal
    }

    pub fn reporting_currency(&self) -> Currency {
        self.journal.reporting_currency()
    }

    fn events(&self) -> &'a [Event] {
        self.journal.events_until(self.date)
    }

    fn ticker_events<'t>(&self, ticker: &'t str) -> impl Iterator<Item = &'a Event> + 't
    where
        'a: 't,
    {
        self.events()
            .iter()
            .filter(move |e| e.kind.ticker() == Some(ticker))
    }

    /// Declared currency of a ticker, or the reporting currency if unknown
    fn currency_of(&self, ticker: &str) -> Currency {
        self.security(ticker)
            .map(|s| s.currency)
            .unwrap_or_else(|| self.reporting_currency())
    }

    // ── Enumeration ─────────────────────────────────────────────────

    /// Securities declared up to the snapshot date, in declaration order
    pub fn securities(&self) -> Vec<SecurityInfo> {
        self.events()
            .iter()
            .filter_map(|e| match &e.kind {
                EventKind::DeclareSecurity {
                    ticker,
                    id,
                    currency,
                } => Some(SecurityInfo {
                    ticker: ticker.clone(),
                    id: id.clone(),
                    currency: *currency,
                    declared: e.date,
                }),
                _ => None,
            })
            .collect()
    }

    pub fn security(&self, ticker: &str) -> Option<SecurityInfo> {
        self.ticker_events(ticker).find_map(|e| match &e.kind {
            EventKind::DeclareSecurity { id, currency, .. } => Some(SecurityInfo {
                ticker: ticker.to_string(),
                id: id.clone(),
                currency: *currency,
                declared: e.date,
            }),
            _ => None,
        })
    }

    pub fn counterparties(&self) -> Vec<CounterpartyInfo> {
        self.events()
            .iter()
            .filter_map(|e| match &e.kind {
                EventKind::DeclareCounterparty { account, currency } => Some(CounterpartyInfo {
                    account: account.clone(),
                    currency: *currency,
                    declared: e.date,
                }),
                _ => None,
            })
            .collect()
    }

    /// Reporting currency plus every currency used by cash, counterparties
    /// or securities so far, sorted
    pub fn currencies(&self) -> Vec<Currency> {
        let reporting = self.reporting_currency();
        self.events()
            .iter()
            .filter_map(|e| match &e.kind {
                EventKind::CreditCash { amount, .. } | EventKind::DebitCash { amount, .. } => {
                    Some(amount.currency)
                }
                EventKind::DeclareCounterparty { currency, .. }
                | EventKind::DeclareSecurity { currency, .. } => Some(*currency),
                _ => None,
            })
            .chain(std::iter::once(reporting))
            .sorted()
            .dedup()
            .collect()
    }

    // ── Securities ──────────────────────────────────────────────────

    /// Shares held: acquisitions minus disposals, rescaled by every split
    pub fn position(&self, ticker: &str) -> Decimal {
        self.ticker_events(ticker)
            .fold(Decimal::ZERO, |position, e| match &e.kind {
                EventKind::AcquireLot { quantity, .. } => position + *quantity,
                EventKind::DisposeLot { quantity, .. } => position - *quantity,
                EventKind::SplitShare { ratio, .. } => ratio.apply(position),
                _ => position,
            })
    }

    /// Last known price, zero if none was recorded yet
    pub fn price(&self, ticker: &str) -> Money {
        self.ticker_events(ticker)
            .filter_map(|e| match &e.kind {
                EventKind::UpdatePrice { price, .. } => Some(*price),
                _ => None,
            })
            .last()
            .unwrap_or_else(|| Money::zero(self.currency_of(ticker)))
    }

    pub fn market_value(&self, ticker: &str) -> Money {
        self.price(ticker).scale(self.position(ticker))
    }

    /// Replay acquisitions, disposals and splits through a cost tracker.
    /// Returns the tracker and the accumulated realized gain.
    fn replay_costs(&self, ticker: &str, method: CostBasisMethod) -> (CostTracker, Decimal) {
        let mut tracker = CostTracker::new(method);
        let mut realized = Decimal::ZERO;

        for e in self.ticker_events(ticker) {
            match &e.kind {
                EventKind::AcquireLot { quantity, cost, .. } => {
                    tracker.acquire(e.date, *quantity, cost.amount)
                }
                EventKind::DisposeLot {
                    quantity, proceeds, ..
                } => {
                    let cost_of_sale = tracker.dispose(*quantity);
                    realized += proceeds.amount - cost_of_sale;
                }
                EventKind::SplitShare { ratio, .. } => tracker.split(*ratio),
                _ => {}
            }
        }

        (tracker, realized)
    }

    pub fn cost_basis(&self, ticker: &str, method: CostBasisMethod) -> Money {
        let (tracker, _) = self.replay_costs(ticker, method);
        Money::new(tracker.cost_basis(), self.currency_of(ticker))
    }

    pub fn realized_gains(&self, ticker: &str, method: CostBasisMethod) -> Money {
        let (_, realized) = self.replay_costs(ticker, method);
        Money::new(realized, self.currency_of(ticker))
    }

    pub fn unrealized_gains(&self, ticker: &str, method: CostBasisMethod) -> Money {
        let market_value = self.market_value(ticker);
        let cost_basis = self.cost_basis(ticker, method);
        Money::new(market_value.amount - cost_basis.amount, market_value.currency)
    }

    /// Open FIFO lots, oldest first
    pub fn lots(&self, ticker: &str) -> Vec<Lot> {
        let (tracker, _) = self.replay_costs(ticker, CostBasisMethod::Fifo);
        tracker.lots()
    }

    /// Dividends received, per-share amounts resolved against the position
    /// held on the dividend date
    pub fn dividends(&self, ticker: &str) -> Money {
        let mut positions = Positions::default();
        let mut total = Decimal::ZERO;

        for e in self.ticker_events(ticker) {
            positions.observe(&e.kind);
            if let EventKind::ReceiveDividend { amount, .. } = &e.kind {
                total += amount.resolve(positions.get(ticker)).amount;
            }
        }

        Money::new(total, self.currency_of(ticker))
    }

    /// Cumulative cost of acquisitions
    pub fn buys(&self, ticker: &str) -> Money {
        let total: Decimal = self
            .ticker_events(ticker)
            .filter_map(|e| match &e.kind {
                EventKind::AcquireLot { cost, .. } => Some(cost.amount),
                _ => None,
            })
            .sum();
        Money::new(total, self.currency_of(ticker))
    }

    /// Cumulative proceeds of disposals
    pub fn sells(&self, ticker: &str) -> Money {
        let total: Decimal = self
            .ticker_events(ticker)
            .filter_map(|e| match &e.kind {
                EventKind::DisposeLot { proceeds, .. } => Some(proceeds.amount),
                _ => None,
            })
            .sum();
        Money::new(total, self.currency_of(ticker))
    }

    /// Money put into the security minus money taken out of it
    pub fn net_trading_flow(&self, ticker: &str) -> Money {
        let buys = self.buys(ticker);
        let sells = self.sells(ticker);
        Money::new(buys.amount - sells.amount, buys.currency)
    }

    /// Value of a notional one-unit investment that follows only the timing
    /// of the real position (in when it opens, out when it closes). The ratio
    /// of two such values is the time-weighted return between their dates.
    pub fn virtual_asset_value(&self, ticker: &str) -> Money {
        let Some(info) = self.security(ticker) else {
            return Money::zero(self.reporting_currency());
        };

        let mut virtual_cash = Decimal::ZERO;
        let mut virtual_position = Decimal::ZERO;
        let mut actual_position = Decimal::ZERO;
        let mut last_price = Decimal::ZERO;

        for e in self.ticker_events(ticker) {
            match &e.kind {
                EventKind::DeclareSecurity { .. } => virtual_cash = Decimal::ONE,
                EventKind::AcquireLot { quantity, cost, .. } => {
                    if actual_position.is_zero()
                        && !quantity.is_zero()
                        && !cost.amount.is_zero()
                    {
                        virtual_position = virtual_cash * *quantity / cost.amount;
                        virtual_cash = Decimal::ZERO;
                        if last_price.is_zero() {
                            last_price = cost.amount / *quantity;
                        }
                    }
                    actual_position += *quantity;
                }
                EventKind::DisposeLot { quantity, .. } => {
                    actual_position -= *quantity;
                    if actual_position <= Decimal::ZERO {
                        actual_position = Decimal::ZERO;
                        virtual_cash += last_price * virtual_position;
                        virtual_position = Decimal::ZERO;
                    }
                }
                EventKind::UpdatePrice { price, .. } => last_price = price.amount,
                EventKind::SplitShare { ratio, .. } => {
                    virtual_position = ratio.apply(virtual_position);
                    actual_position = ratio.apply(actual_position);
                }
                _ => {}
            }
        }

        Money::new(virtual_cash + last_price * virtual_position, info.currency)
    }

    // ── Cash and counterparties ─────────────────────────────────────

    /// Cash balance in one currency, including dividends received
    pub fn cash(&self, currency: Currency) -> Money {
        let mut positions = Positions::default();
        let mut total = Decimal::ZERO;

        for e in self.events() {
            positions.observe(&e.kind);
            match &e.kind {
                EventKind::CreditCash { amount, .. } if amount.currency == currency => {
                    total += amount.amount
                }
                EventKind::DebitCash { amount, .. } if amount.currency == currency => {
                    total -= amount.amount
                }
                EventKind::ReceiveDividend { ticker, amount } if amount.currency() == currency => {
                    total += amount.resolve(positions.get(ticker)).amount
                }
                _ => {}
            }
        }

        Money::new(total, currency)
    }

    /// Receivable (positive) or payable (negative) balance with an account
    pub fn counterparty(&self, account: &str) -> Money {
        let mut balance: Option<Money> = None;

        for e in self.events() {
            match &e.kind {
                EventKind::DeclareCounterparty {
                    account: a,
                    currency,
                } if a == account => balance = Some(Money::zero(*currency)),
                EventKind::CreditCounterparty {
                    account: a, amount, ..
                } if a == account => {
                    let current = balance.get_or_insert(Money::zero(amount.currency));
                    current.amount += amount.amount;
                }
                EventKind::DebitCounterparty {
                    account: a, amount, ..
                } if a == account => {
                    let current = balance.get_or_insert(Money::zero(amount.currency));
                    current.amount -= amount.amount;
                }
                _ => {}
            }
        }

        balance.unwrap_or_else(|| Money::zero(self.reporting_currency()))
    }

    /// Capital flow in one currency: external credits minus external debits,
    /// over cash and counterparty events. Internal transfers do not count.
    pub fn cash_flow(&self, currency: Currency) -> Money {
        let total: Decimal = self
            .events()
            .iter()
            .filter_map(|e| match &e.kind {
                EventKind::CreditCash {
                    amount,
                    external: true,
                }
                | EventKind::CreditCounterparty {
                    amount,
                    external: true,
                    ..
                } if amount.currency == currency => Some(amount.amount),
                EventKind::DebitCash {
                    amount,
                    external: true,
                }
                | EventKind::DebitCounterparty {
                    amount,
                    external: true,
                    ..
                } if amount.currency == currency => Some(-amount.amount),
                _ => None,
            })
            .sum();
        Money::new(total, currency)
    }

    // ── Currency conversion ─────────────────────────────────────────

    /// Value of one unit of `currency` in the reporting currency; zero when
    /// no rate is known yet
    pub fn exchange_rate(&self, currency: Currency) -> Decimal {
        if currency == self.reporting_currency() {
            return Decimal::ONE;
        }
        self.events()
            .iter()
            .rev()
            .find_map(|e| match &e.kind {
                EventKind::UpdateForex { currency: c, rate } if *c == currency => Some(*rate),
                _ => None,
            })
            .unwrap_or(Decimal::ZERO)
    }

    /// Convert to the reporting currency at the latest known rate
    pub fn convert(&self, money: Money) -> Money {
        let rate = self.exchange_rate(money.currency);
        if rate.is_zero() && !money.is_zero() {
            debug!(
                "No exchange rate for {} on {}; {} counts as zero",
                money.currency, self.date, money
            );
        }
        Money::new(money.amount * rate, self.reporting_currency())
    }

    fn sum_converted(&self, amounts: impl Iterator<Item = Money>) -> Money {
        let total: Decimal = amounts.map(|m| self.convert(m).amount).sum();
        Money::new(total, self.reporting_currency())
    }

    fn sum_over_securities(&self, metric: impl Fn(&str) -> Money) -> Money {
        let securities = self.securities();
        self.sum_converted(securities.iter().map(|s| metric(&s.ticker)))
    }

    // ── Totals in the reporting currency ────────────────────────────

    pub fn total_cash(&self) -> Money {
        self.sum_converted(self.currencies().into_iter().map(|c| self.cash(c)))
    }

    pub fn total_counterparties(&self) -> Money {
        self.sum_converted(
            self.counterparties()
                .iter()
                .map(|c| self.counterparty(&c.account)),
        )
    }

    pub fn total_market_value(&self) -> Money {
        self.sum_over_securities(|t| self.market_value(t))
    }

    pub fn total_cost_basis(&self, method: CostBasisMethod) -> Money {
        self.sum_over_securities(|t| self.cost_basis(t, method))
    }

    pub fn total_realized_gains(&self, method: CostBasisMethod) -> Money {
        self.sum_over_securities(|t| self.realized_gains(t, method))
    }

    pub fn total_unrealized_gains(&self, method: CostBasisMethod) -> Money {
        self.sum_over_securities(|t| self.unrealized_gains(t, method))
    }

    pub fn total_dividends(&self) -> Money {
        self.sum_over_securities(|t| self.dividends(t))
    }

    pub fn total_buys(&self) -> Money {
        self.sum_over_securities(|t| self.buys(t))
    }

    pub fn total_sells(&self) -> Money {
        self.sum_over_securities(|t| self.sells(t))
    }

    pub fn total_net_trading_flow(&self) -> Money {
        self.sum_over_securities(|t| self.net_trading_flow(t))
    }

    pub fn total_cash_flow(&self) -> Money {
        self.sum_converted(self.currencies().into_iter().map(|c| self.cash_flow(c)))
    }

    /// Net worth: cash, counterparty balances and market value
    pub fn total_value(&self) -> Money {
        let total = self.total_cash().amount
            + self.total_counterparties().amount
            + self.total_market_value().amount;
        Money::new(total, self.reporting_currency())
    }

    /// Open positions, largest reporting-currency value first
    pub fn holdings(&self, method: CostBasisMethod) -> Vec<Holding> {
        let mut holdings: Vec<Holding> = self
            .securities()
            .into_iter()
            .filter_map(|s| {
                let quantity = self.position(&s.ticker);
                if quantity.is_zero() {
                    return None;
                }
                let price = self.price(&s.ticker);
                let market_value = price.scale(quantity);
                let cost_basis = self.cost_basis(&s.ticker, method);
                Some(Holding {
                    unrealized_gain: Money::new(
                        market_value.amount - cost_basis.amount,
                        market_value.currency,
                    ),
                    reporting_value: self.convert(market_value),
                    ticker: s.ticker,
                    id: s.id,
                    quantity,
                    price,
                    market_value,
                    cost_basis,
                })
            })
            .collect();

        holdings.sort_by(|a, b| b.reporting_value.amount.cmp(&a.reporting_value.amount));
        holdings
    }
}
