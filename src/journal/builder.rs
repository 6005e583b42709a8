// Journal builder - translates ledger transactions and market data into events

use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

use super::{Event, EventKind, Journal};
use crate::error::PortfolioError;
use crate::ledger::{Ledger, MarketData, Transaction, TransactionKind};
use crate::models::{Currency, Money, SecurityId};

/// Decimal places kept when inverting a currency-pair quote
pub const DEFAULT_FOREX_PRECISION: u32 = 5;

#[derive(Debug, Clone)]
struct Declaration {
    ticker: String,
    id: SecurityId,
    currency: Currency,
    date: NaiveDate,
}

/// Declared securities in ledger order, with lookup by ticker
#[derive(Debug, Default)]
struct Declarations {
    ordered: Vec<Declaration>,
    by_ticker: HashMap<String, usize>,
}

impl Declarations {
    fn collect(ledger: &Ledger) -> Result<Self, PortfolioError> {
        let mut declarations = Declarations::default();
        for tx in ledger {
            if let TransactionKind::Declare {
                security,
                id,
                currency,
                ..
            } = &tx.kind
            {
                if declarations.by_ticker.contains_key(security) {
                    return Err(PortfolioError::DuplicateDeclaration {
                        ticker: security.clone(),
                    });
                }
                declarations
                    .by_ticker
                    .insert(security.clone(), declarations.ordered.len());
                declarations.ordered.push(Declaration {
                    ticker: security.clone(),
                    id: id.clone(),
                    currency: *currency,
                    date: tx.date,
                });
            }
        }
        Ok(declarations)
    }

    /// Declaration of `ticker`, provided it is not dated after `date`
    fn require(&self, ticker: &str, date: NaiveDate) -> Result<&Declaration, PortfolioError> {
        self.by_ticker
            .get(ticker)
            .map(|&idx| &self.ordered[idx])
            .filter(|decl| decl.date <= date)
            .ok_or_else(|| PortfolioError::UndeclaredSecurity {
                ticker: ticker.to_string(),
                date,
            })
    }
}

/// Price and split facts that came from the ledger itself
#[derive(Debug, Default)]
struct LedgerFacts {
    prices: HashSet<(NaiveDate, String)>,
    splits: HashSet<(NaiveDate, String)>,
    forex: HashSet<(NaiveDate, Currency)>,
}

/// Builds a [`Journal`] from a ledger and market data.
///
/// Ledger transactions are translated in their original order, market data
/// facts are merged in afterwards, and the whole sequence is then stably
/// sorted by date so same-day events keep ledger-before-market order.
#[derive(Debug, Clone)]
pub struct JournalBuilder {
    currency: Currency,
    forex_precision: u32,
}

impl JournalBuilder {
    pub fn new(currency: Currency) -> Self {
        Self {
            currency,
            forex_precision: DEFAULT_FOREX_PRECISION,
        }
    }

    pub fn forex_precision(mut self, decimal_places: u32) -> Self {
        self.forex_precision = decimal_places;
        self
    }

    pub fn build(&self, ledger: &Ledger, market: &MarketData) -> Result<Journal, PortfolioError> {
        let declarations = Declarations::collect(ledger)?;
        let mut events = Vec::with_capacity(ledger.len() * 2);
        let mut facts = LedgerFacts::default();

        self.declare_counterparties(ledger, &mut events)?;

        for tx in ledger {
            self.translate(tx, &declarations, &mut facts, &mut events)?;
        }
        let ledger_events = events.len();

        self.merge_market_data(market, &declarations, &mut facts, &mut events);

        // Stable: same-day events keep ledger-then-market order
        events.sort_by_key(|e| e.date);

        info!(
            "Built journal with {} events ({} from ledger, {} from market data) in {}",
            events.len(),
            ledger_events,
            events.len() - ledger_events,
            self.currency
        );

        Ok(Journal::from_sorted(self.currency, events))
    }

    /// Counterparties are declared at the earliest date any transaction
    /// references them, in the currency of that first reference.
    fn declare_counterparties(
        &self,
        ledger: &Ledger,
        events: &mut Vec<Event>,
    ) -> Result<(), PortfolioError> {
        let mut order: Vec<String> = Vec::new();
        let mut seen: HashMap<String, (NaiveDate, Currency)> = HashMap::new();

        for tx in ledger {
            let Some((account, amount)) = tx.kind.counterparty() else {
                continue;
            };
            match seen.get_mut(account) {
                Some((first_date, currency)) => {
                    if *currency != amount.currency {
                        return Err(PortfolioError::CurrencyMismatch {
                            expected: currency.to_string(),
                            found: amount.currency.to_string(),
                        });
                    }
                    *first_date = (*first_date).min(tx.date);
                }
                None => {
                    order.push(account.to_string());
                    seen.insert(account.to_string(), (tx.date, amount.currency));
                }
            }
        }

        for account in order {
            let (date, currency) = seen[&account];
            events.push(Event {
                date,
                kind: EventKind::DeclareCounterparty { account, currency },
            });
        }
        Ok(())
    }

    fn translate(
        &self,
        tx: &Transaction,
        declarations: &Declarations,
        facts: &mut LedgerFacts,
        events: &mut Vec<Event>,
    ) -> Result<(), PortfolioError> {
        let date = tx.date;
        let mut emit = |kind: EventKind| events.push(Event { date, kind });

        match &tx.kind {
            TransactionKind::Buy {
                security,
                quantity,
                amount,
            } => {
                let decl = declarations.require(security, date)?;
                ensure_currency(decl.currency, amount.currency)?;
                emit(EventKind::AcquireLot {
                    ticker: security.clone(),
                    quantity: *quantity,
                    cost: *amount,
                });
                emit(EventKind::DebitCash {
                    amount: *amount,
                    external: false,
                });
            }
            TransactionKind::Sell {
                security,
                quantity,
                amount,
            } => {
                let decl = declarations.require(security, date)?;
                ensure_currency(decl.currency, amount.currency)?;
                emit(EventKind::DisposeLot {
                    ticker: security.clone(),
                    quantity: *quantity,
                    proceeds: *amount,
                });
                emit(EventKind::CreditCash {
                    amount: *amount,
                    external: false,
                });
            }
            TransactionKind::Dividend { security, amount } => {
                let decl = declarations.require(security, date)?;
                ensure_currency(decl.currency, amount.currency())?;
                emit(EventKind::ReceiveDividend {
                    ticker: security.clone(),
                    amount: *amount,
                });
            }
            TransactionKind::Deposit { amount, settles } => {
                emit(EventKind::CreditCash {
                    amount: *amount,
                    external: settles.is_none(),
                });
                if let Some(account) = settles {
                    emit(EventKind::DebitCounterparty {
                        account: account.clone(),
                        amount: *amount,
                        external: false,
                    });
                }
            }
            TransactionKind::Withdraw { amount, settles } => {
                emit(EventKind::DebitCash {
                    amount: *amount,
                    external: settles.is_none(),
                });
                if let Some(account) = settles {
                    emit(EventKind::CreditCounterparty {
                        account: account.clone(),
                        amount: *amount,
                        external: false,
                    });
                }
            }
            TransactionKind::Convert { from, to } => {
                emit(EventKind::DebitCash {
                    amount: *from,
                    external: false,
                });
                emit(EventKind::CreditCash {
                    amount: *to,
                    external: false,
                });
            }
            TransactionKind::Declare {
                security,
                id,
                currency,
                ..
            } => {
                emit(EventKind::DeclareSecurity {
                    ticker: security.clone(),
                    id: id.clone(),
                    currency: *currency,
                });
            }
            TransactionKind::Accrue {
                counterparty,
                amount,
            } => {
                if amount.is_positive() {
                    emit(EventKind::CreditCounterparty {
                        account: counterparty.clone(),
                        amount: *amount,
                        external: true,
                    });
                } else if !amount.is_zero() {
                    emit(EventKind::DebitCounterparty {
                        account: counterparty.clone(),
                        amount: amount.abs(),
                        external: true,
                    });
                }
            }
            TransactionKind::UpdatePrice { security, price } => {
                let decl = declarations.require(security, date)?;
                ensure_currency(decl.currency, price.currency)?;
                facts.prices.insert((date, security.clone()));
                emit(EventKind::UpdatePrice {
                    ticker: security.clone(),
                    price: *price,
                });
                if let Some(kind) = self.forex_for(&decl.id, price.amount) {
                    if let EventKind::UpdateForex { currency, .. } = &kind {
                        facts.forex.insert((date, *currency));
                    }
                    emit(kind);
                }
            }
            TransactionKind::Split { security, ratio } => {
                declarations.require(security, date)?;
                facts.splits.insert((date, security.clone()));
                emit(EventKind::SplitShare {
                    ticker: security.clone(),
                    ratio: *ratio,
                });
            }
        }
        Ok(())
    }

    fn merge_market_data(
        &self,
        market: &MarketData,
        declarations: &Declarations,
        facts: &mut LedgerFacts,
        events: &mut Vec<Event>,
    ) {
        for decl in &declarations.ordered {
            for (date, price) in market.prices(&decl.id) {
                if date < decl.date {
                    continue;
                }
                if facts.prices.contains(&(date, decl.ticker.clone())) {
                    debug!(
                        "Skipping market price for {} on {}: recorded in ledger",
                        decl.ticker, date
                    );
                    continue;
                }
                events.push(Event {
                    date,
                    kind: EventKind::UpdatePrice {
                        ticker: decl.ticker.clone(),
                        price: Money::new(price, decl.currency),
                    },
                });
                if let Some(kind) = self.forex_for(&decl.id, price) {
                    if let EventKind::UpdateForex { currency, .. } = &kind {
                        if !facts.forex.insert((date, *currency)) {
                            continue;
                        }
                    }
                    events.push(Event { date, kind });
                }
            }

            for (date, ratio) in market.splits(&decl.id) {
                if date < decl.date {
                    continue;
                }
                if facts.splits.contains(&(date, decl.ticker.clone())) {
                    debug!(
                        "Skipping market split for {} on {}: recorded in ledger",
                        decl.ticker, date
                    );
                    continue;
                }
                events.push(Event {
                    date,
                    kind: EventKind::SplitShare {
                        ticker: decl.ticker.clone(),
                        ratio,
                    },
                });
            }
        }
    }

    /// Exchange rate implied by a currency-pair quote, relative to the
    /// reporting currency. Pairs not involving it yield nothing.
    fn forex_for(&self, id: &SecurityId, price: Decimal) -> Option<EventKind> {
        let (base, quote) = id.currency_pair()?;
        if price <= Decimal::ZERO || base == quote {
            return None;
        }
        if quote == self.currency {
            Some(EventKind::UpdateForex {
                currency: base,
                rate: price,
            })
        } else if base == self.currency {
            let inverse = Decimal::ONE.checked_div(price)?;
            Some(EventKind::UpdateForex {
                currency: quote,
                rate: inverse
                    .round_dp_with_strategy(self.forex_precision, RoundingStrategy::MidpointAwayFromZero),
            })
        } else {
            None
        }
    }
}

fn ensure_currency(expected: Currency, found: Currency) -> Result<(), PortfolioError> {
    if expected != found {
        return Err(PortfolioError::CurrencyMismatch {
            expected: expected.to_string(),
            found: found.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DividendAmount, SplitRatio};
    use rust_decimal_macros::dec;

    fn total(amount: Decimal, currency: Currency) -> DividendAmount {
        DividendAmount::Total(Money::new(amount, currency))
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn cur(code: &str) -> Currency {
        Currency::new(code).unwrap()
    }

    fn usd(amount: Decimal) -> Money {
        Money::new(amount, cur("USD"))
    }

    fn aapl_id() -> SecurityId {
        SecurityId::new("US0378331005").unwrap()
    }

    fn kinds(journal: &Journal) -> Vec<&'static str> {
        journal.events().iter().map(|e| e.kind.as_str()).collect()
    }

    #[test]
    fn test_buy_emits_acquire_and_debit() {
        let ledger: Ledger = vec![
            Transaction::declare(date(2024, 1, 1), "AAPL", aapl_id(), cur("USD")),
            Transaction::buy(date(2024, 1, 10), "AAPL", dec!(100), usd(dec!(15000))),
        ]
        .into_iter()
        .collect();

        let journal = JournalBuilder::new(cur("USD"))
            .build(&ledger, &MarketData::new())
            .unwrap();
        assert_eq!(
            kinds(&journal),
            vec!["DECLARE_SECURITY", "ACQUIRE_LOT", "DEBIT_CASH"]
        );
        match &journal.events()[2].kind {
            EventKind::DebitCash { amount, external } => {
                assert_eq!(amount.amount, dec!(15000));
                assert!(!external);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_undeclared_security_aborts_construction() {
        let ledger: Ledger = vec![Transaction::buy(
            date(2024, 1, 10),
            "AAPL",
            dec!(1),
            usd(dec!(150)),
        )]
        .into_iter()
        .collect();

        let err = JournalBuilder::new(cur("USD"))
            .build(&ledger, &MarketData::new())
            .unwrap_err();
        assert!(matches!(err, PortfolioError::UndeclaredSecurity { .. }));
    }

    #[test]
    fn test_declaration_after_reference_is_rejected() {
        let ledger: Ledger = vec![
            Transaction::buy(date(2024, 1, 10), "AAPL", dec!(1), usd(dec!(150))),
            Transaction::declare(date(2024, 2, 1), "AAPL", aapl_id(), cur("USD")),
        ]
        .into_iter()
        .collect();

        assert!(Journal::build(&ledger, &MarketData::new(), cur("USD")).is_err());
    }

    #[test]
    fn test_duplicate_declaration_is_rejected() {
        let ledger: Ledger = vec![
            Transaction::declare(date(2024, 1, 1), "AAPL", aapl_id(), cur("USD")),
            Transaction::declare(date(2024, 1, 2), "AAPL", aapl_id(), cur("USD")),
        ]
        .into_iter()
        .collect();

        let err = Journal::build(&ledger, &MarketData::new(), cur("USD")).unwrap_err();
        assert!(matches!(err, PortfolioError::DuplicateDeclaration { .. }));
    }

    #[test]
    fn test_trade_in_wrong_currency_is_rejected() {
        let ledger: Ledger = vec![
            Transaction::declare(date(2024, 1, 1), "AAPL", aapl_id(), cur("USD")),
            Transaction::buy(
                date(2024, 1, 2),
                "AAPL",
                dec!(1),
                Money::new(dec!(140), cur("EUR")),
            ),
        ]
        .into_iter()
        .collect();

        let err = Journal::build(&ledger, &MarketData::new(), cur("USD")).unwrap_err();
        assert!(matches!(err, PortfolioError::CurrencyMismatch { .. }));
    }

    #[test]
    fn test_ledger_price_shadows_market_price_on_same_day() {
        let ledger: Ledger = vec![
            Transaction::declare(date(2024, 1, 1), "AAPL", aapl_id(), cur("USD")),
            Transaction::update_price(date(2024, 1, 5), "AAPL", usd(dec!(190))),
        ]
        .into_iter()
        .collect();
        let mut market = MarketData::new();
        market.add_price(&aapl_id(), date(2024, 1, 5), dec!(181.18));
        market.add_price(&aapl_id(), date(2024, 1, 8), dec!(185.56));
        // Before the declaration: dropped
        market.add_price(&aapl_id(), date(2023, 12, 29), dec!(192.53));

        let journal = Journal::build(&ledger, &market, cur("USD")).unwrap();
        let prices: Vec<_> = journal
            .events()
            .iter()
            .filter_map(|e| match &e.kind {
                EventKind::UpdatePrice { price, .. } => Some((e.date, price.amount)),
                _ => None,
            })
            .collect();
        assert_eq!(
            prices,
            vec![(date(2024, 1, 5), dec!(190)), (date(2024, 1, 8), dec!(185.56))]
        );
    }

    #[test]
    fn test_ledger_split_shadows_market_split_but_not_prices() {
        let ratio = SplitRatio::new(4, 1).unwrap();
        let ledger: Ledger = vec![
            Transaction::declare(date(2020, 1, 1), "AAPL", aapl_id(), cur("USD")),
            Transaction::split(date(2020, 8, 31), "AAPL", ratio),
        ]
        .into_iter()
        .collect();
        let mut market = MarketData::new();
        market.add_split(&aapl_id(), date(2020, 8, 31), ratio);
        market.add_price(&aapl_id(), date(2020, 8, 31), dec!(129.04));

        let journal = Journal::build(&ledger, &market, cur("USD")).unwrap();
        let splits = journal
            .events()
            .iter()
            .filter(|e| matches!(e.kind, EventKind::SplitShare { .. }))
            .count();
        let prices = journal
            .events()
            .iter()
            .filter(|e| matches!(e.kind, EventKind::UpdatePrice { .. }))
            .count();
        assert_eq!(splits, 1);
        assert_eq!(prices, 1);
    }

    #[test]
    fn test_forex_direct_and_inverse_quotes() {
        let eurusd = SecurityId::new("EURUSD").unwrap();
        let ledger: Ledger = vec![Transaction::declare(
            date(2024, 1, 1),
            "EURUSD",
            eurusd.clone(),
            cur("USD"),
        )]
        .into_iter()
        .collect();
        let mut market = MarketData::new();
        market.add_price(&eurusd, date(2024, 1, 2), dec!(1.09));

        // Reporting in USD: the quote currency, rate for EUR is the price
        let journal = Journal::build(&ledger, &market, cur("USD")).unwrap();
        let forex: Vec<_> = journal
            .events()
            .iter()
            .filter_map(|e| match &e.kind {
                EventKind::UpdateForex { currency, rate } => Some((*currency, *rate)),
                _ => None,
            })
            .collect();
        assert_eq!(forex, vec![(cur("EUR"), dec!(1.09))]);

        // Reporting in EUR: the base currency, rate for USD is the inverse
        let journal = Journal::build(&ledger, &market, cur("EUR")).unwrap();
        let forex: Vec<_> = journal
            .events()
            .iter()
            .filter_map(|e| match &e.kind {
                EventKind::UpdateForex { currency, rate } => Some((*currency, *rate)),
                _ => None,
            })
            .collect();
        assert_eq!(forex, vec![(cur("USD"), dec!(0.91743))]);

        // Reporting in GBP: pair is unrelated
        let journal = Journal::build(&ledger, &market, cur("GBP")).unwrap();
        assert!(!journal
            .events()
            .iter()
            .any(|e| matches!(e.kind, EventKind::UpdateForex { .. })));
    }

    #[test]
    fn test_forex_precision_is_configurable() {
        let eurusd = SecurityId::new("EURUSD").unwrap();
        let ledger: Ledger = vec![Transaction::declare(
            date(2024, 1, 1),
            "EURUSD",
            eurusd.clone(),
            cur("USD"),
        )]
        .into_iter()
        .collect();
        let mut market = MarketData::new();
        market.add_price(&eurusd, date(2024, 1, 2), dec!(1.09));

        let journal = JournalBuilder::new(cur("EUR"))
            .forex_precision(2)
            .build(&ledger, &market)
            .unwrap();
        let rate = journal.events().iter().find_map(|e| match &e.kind {
            EventKind::UpdateForex { rate, .. } => Some(*rate),
            _ => None,
        });
        assert_eq!(rate, Some(dec!(0.92)));
    }

    #[test]
    fn test_same_day_events_keep_ledger_then_market_order() {
        let ledger: Ledger = vec![
            Transaction::declare(date(2024, 1, 1), "AAPL", aapl_id(), cur("USD")),
            Transaction::buy(date(2024, 1, 5), "AAPL", dec!(1), usd(dec!(180))),
        ]
        .into_iter()
        .collect();
        let mut market = MarketData::new();
        market.add_price(&aapl_id(), date(2024, 1, 5), dec!(181.18));

        let journal = Journal::build(&ledger, &market, cur("USD")).unwrap();
        assert_eq!(
            kinds(&journal),
            vec!["DECLARE_SECURITY", "ACQUIRE_LOT", "DEBIT_CASH", "UPDATE_PRICE"]
        );
    }

    #[test]
    fn test_counterparty_declared_at_earliest_reference() {
        let eur = |a| Money::new(a, cur("EUR"));
        // Ledger is not in date order
        let ledger: Ledger = vec![
            Transaction::deposit(date(2024, 3, 1), eur(dec!(10)), Some("bux")),
            Transaction::accrue(date(2024, 2, 1), "bux", eur(dec!(10))),
        ]
        .into_iter()
        .collect();

        let journal = Journal::build(&ledger, &MarketData::new(), cur("EUR")).unwrap();
        let first = &journal.events()[0];
        assert_eq!(first.date, date(2024, 2, 1));
        assert!(matches!(
            &first.kind,
            EventKind::DeclareCounterparty { account, .. } if account == "bux"
        ));
        assert_eq!(
            kinds(&journal),
            vec![
                "DECLARE_COUNTERPARTY",
                "CREDIT_COUNTERPARTY",
                "CREDIT_CASH",
                "DEBIT_COUNTERPARTY"
            ]
        );
    }

    #[test]
    fn test_counterparty_in_two_currencies_is_rejected() {
        let ledger: Ledger = vec![
            Transaction::accrue(date(2024, 2, 1), "bux", Money::new(dec!(10), cur("EUR"))),
            Transaction::accrue(date(2024, 2, 2), "bux", usd(dec!(10))),
        ]
        .into_iter()
        .collect();

        assert!(Journal::build(&ledger, &MarketData::new(), cur("EUR")).is_err());
    }

    #[test]
    fn test_negative_accrual_debits_counterparty() {
        let ledger: Ledger = vec![Transaction::accrue(
            date(2024, 2, 1),
            "broker",
            Money::new(dec!(-4.5), cur("EUR")),
        )]
        .into_iter()
        .collect();

        let journal = Journal::build(&ledger, &MarketData::new(), cur("EUR")).unwrap();
        match &journal.events()[1].kind {
            EventKind::DebitCounterparty {
                amount, external, ..
            } => {
                assert_eq!(amount.amount, dec!(4.5));
                assert!(external);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_dividend_currency_must_match_security() {
        let ledger: Ledger = vec![
            Transaction::declare(date(2024, 1, 1), "AAPL", aapl_id(), cur("USD")),
            Transaction::dividend(date(2024, 2, 15), "AAPL", total(dec!(24), cur("EUR"))),
        ]
        .into_iter()
        .collect();

        assert!(Journal::build(&ledger, &MarketData::new(), cur("USD")).is_err());
    }
}
