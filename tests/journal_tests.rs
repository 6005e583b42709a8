//! Journal construction tests
//!
//! - Declaration ordering and duplicate detection
//! - Market data merge rules (declaration date, ledger precedence)
//! - Forex synthesis from currency-pair securities
//! - Same-day ordering and determinism


use anyhow::Result;
use folio::{
    Currency, DividendAmount, EventKind, MarketData, PortfolioError, SplitRatio, Transaction,
};
use ledger_helpers::{build, currency, date, declare_aapl, eur, security_id, usd};
use rust_decimal_macros::dec;

fn kinds(journal: &folio::Journal) -> Vec<&'static str> {
    journal.events().iter().map(|e| e.kind.as_str()).collect()
}

#[test]
fn test_buy_before_declaration_is_rejected() {
    let result = build(
        vec![
            Transaction::buy(date(2024, 1, 1), "AAPL", dec!(1), usd(dec!(185))),
            declare_aapl(),
        ],
        &MarketData::new(),
        Currency::USD,
    );

    let err = result.unwrap_err();
    match err.downcast_ref::<PortfolioError>() {
        Some(PortfolioError::UndeclaredSecurity { ticker, date: on }) => {
            assert_eq!(ticker, "AAPL");
            assert_eq!(*on, date(2024, 1, 1));
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn test_duplicate_declaration_is_rejected() {
    let result = build(
        vec![declare_aapl(), declare_aapl()],
        &MarketData::new(),
        Currency::USD,
    );
    assert!(matches!(
        result.unwrap_err().downcast_ref::<PortfolioError>(),
        Some(PortfolioError::DuplicateDeclaration { .. })
    ));
}

#[test]
fn test_trade_in_wrong_currency_is_rejected() {
    let result = build(
        vec![
            declare_aapl(),
            Transaction::buy(date(2024, 1, 3), "AAPL", dec!(1), eur(dec!(170))),
        ],
        &MarketData::new(),
        Currency::USD,
    );
    assert!(matches!(
        result.unwrap_err().downcast_ref::<PortfolioError>(),
        Some(PortfolioError::CurrencyMismatch { .. })
    ));
}

#[test]
fn test_same_day_events_keep_ledger_order() -> Result<()> {
    let journal = build(
        vec![
            Transaction::deposit(date(2024, 1, 3), usd(dec!(2000)), None),
            declare_aapl(),
            Transaction::buy(date(2024, 1, 3), "AAPL", dec!(10), usd(dec!(1850))),
            Transaction::dividend(
                date(2024, 1, 3),
                "AAPL",
                DividendAmount::Total(usd(dec!(2.40))),
            ),
        ],
        &MarketData::new(),
        Currency::USD,
    )?;

    assert_eq!(
        kinds(&journal),
        vec![
            "DECLARE_SECURITY",
            "CREDIT_CASH",
            "ACQUIRE_LOT",
            "DEBIT_CASH",
            "RECEIVE_DIVIDEND",
        ]
    );
    Ok(())
}

#[test]
fn test_market_data_merges_after_declaration_only() -> Result<()> {
    let id = security_id("US0378331005");
    let mut market = MarketData::new();
    market.add_price(&id, date(2023, 12, 29), dec!(192.53));
    market.add_price(&id, date(2024, 1, 2), dec!(185.64));
    market.add_price(&id, date(2024, 1, 3), dec!(184.25));
    market.add_split(&id, date(2020, 8, 31), SplitRatio::new(4, 1)?);

    let journal = build(
        vec![
            declare_aapl(),
            Transaction::update_price(date(2024, 1, 3), "AAPL", usd(dec!(184.00))),
        ],
        &market,
        Currency::USD,
    )?;

    let prices: Vec<_> = journal
        .events()
        .iter()
        .filter_map(|e| match &e.kind {
            EventKind::UpdatePrice { price, .. } => Some((e.date, price.amount)),
            _ => None,
        })
        .collect();

    // 2023 price and 2020 split predate the declaration; the ledger price
    // wins on 2024-01-03
    assert_eq!(
        prices,
        vec![
            (date(2024, 1, 2), dec!(185.64)),
            (date(2024, 1, 3), dec!(184.00)),
        ]
    );
    assert!(!kinds(&journal).contains(&"SPLIT_SHARE"));
    Ok(())
}

#[test]
fn test_currency_pair_prices_produce_exchange_rates() -> Result<()> {
    let eurusd = security_id("EURUSD");
    let mut market = MarketData::new();
    market.add_price(&eurusd, date(2024, 1, 2), dec!(1.09));
    market.add_price(&eurusd, date(2024, 1, 3), dec!(1.0925));

    let journal = build(
        vec![Transaction::declare(
            date(2024, 1, 1),
            "EURUSD",
            eurusd.clone(),
            Currency::USD,
        )],
        &market,
        Currency::EUR,
    )?;

    let rates: Vec<_> = journal
        .events()
        .iter()
        .filter_map(|e| match &e.kind {
            EventKind::UpdateForex { currency, rate } => Some((e.date, *currency, *rate)),
            _ => None,
        })
        .collect();

    assert_eq!(
        rates,
        vec![
            (date(2024, 1, 2), Currency::USD, dec!(0.91743)),
            (date(2024, 1, 3), Currency::USD, dec!(0.91533)),
        ]
    );

    // Quoted in the reporting currency: the price is the rate
    let journal = build(
        vec![Transaction::declare(
            date(2024, 1, 1),
            "EURUSD",
            eurusd,
            Currency::USD,
        )],
        &market,
        Currency::USD,
    )?;
    let last = journal.events().last().map(|e| e.kind.clone());
    assert_eq!(
        last,
        Some(EventKind::UpdateForex {
            currency: Currency::EUR,
            rate: dec!(1.0925),
        })
    );
    Ok(())
}

#[test]
fn test_pairs_without_reporting_currency_are_ignored() -> Result<()> {
    let gbpjpy = security_id("GBPJPY");
    let mut market = MarketData::new();
    market.add_price(&gbpjpy, date(2024, 1, 2), dec!(180.5));

    let journal = build(
        vec![Transaction::declare(
            date(2024, 1, 1),
            "GBPJPY",
            gbpjpy,
            currency("JPY"),
        )],
        &market,
        Currency::EUR,
    )?;
    assert!(!kinds(&journal).contains(&"UPDATE_FOREX"));
    assert!(kinds(&journal).contains(&"UPDATE_PRICE"));
    Ok(())
}

#[test]
fn test_counterparty_declared_at_first_reference() -> Result<()> {
    let journal = build(
        vec![
            Transaction::deposit(date(2024, 2, 1), eur(dec!(10)), Some("bux")),
            Transaction::accrue(date(2024, 1, 15), "bux", eur(dec!(10))),
        ],
        &MarketData::new(),
        Currency::EUR,
    )?;

    let first = &journal.events()[0];
    assert_eq!(first.date, date(2024, 1, 15));
    assert_eq!(
        first.kind,
        EventKind::DeclareCounterparty {
            account: "bux".to_string(),
            currency: Currency::EUR,
        }
    );
    Ok(())
}

#[test]
fn test_building_twice_is_deterministic() -> Result<()> {
    let id = security_id("US0378331005");
    let mut market = MarketData::new();
    for (day, price) in [(2, dec!(185.64)), (3, dec!(184.25)), (4, dec!(181.91))] {
        market.add_price(&id, date(2024, 1, day), price);
    }
    let transactions = vec![
        Transaction::deposit(date(2024, 1, 2), usd(dec!(5000)), None),
        declare_aapl(),
        Transaction::buy(date(2024, 1, 3), "AAPL", dec!(20), usd(dec!(3685))),
        Transaction::sell(date(2024, 1, 4), "AAPL", dec!(5), usd(dec!(909.55))),
    ];

    let first = build(transactions.clone(), &market, Currency::USD)?;
    let second = build(transactions, &market, Currency::USD)?;
    assert_eq!(first, second);
    assert_eq!(first.first_date(), Some(date(2024, 1, 2)));
    assert_eq!(first.last_date(), Some(date(2024, 1, 4)));
    Ok(())
}
