// Market data archive - price and split history keyed by security id

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::{SecurityId, SplitRatio};

/// Dated price and split facts for one security id.
/// Prices are in the declared currency of the tickers mapped to the id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SecurityHistory {
    #[serde(default)]
    pub prices: BTreeMap<NaiveDate, Decimal>,
    #[serde(default)]
    pub splits: BTreeMap<NaiveDate, SplitRatio>,
}

/// Read-only market data handed to the journal builder
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MarketData {
    securities: BTreeMap<SecurityId, SecurityHistory>,
}

impl MarketData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a closing price; a later call for the same date replaces it
    pub fn add_price(&mut self, id: &SecurityId, date: NaiveDate, price: Decimal) {
        self.securities
            .entry(id.clone())
            .or_default()
            .prices
            .insert(date, price);
    }

    pub fn add_split(&mut self, id: &SecurityId, date: NaiveDate, ratio: SplitRatio) {
        self.securities
            .entry(id.clone())
            .or_default()
            .splits
            .insert(date, ratio);
    }

    pub fn history(&self, id: &SecurityId) -> Option<&SecurityHistory> {
        self.securities.get(id)
    }

    pub fn prices(&self, id: &SecurityId) -> impl Iterator<Item = (NaiveDate, Decimal)> + '_ {
        self.securities
            .get(id)
            .into_iter()
            .flat_map(|h| h.prices.iter().map(|(d, p)| (*d, *p)))
    }

    pub fn splits(&self, id: &SecurityId) -> impl Iterator<Item = (NaiveDate, SplitRatio)> + '_ {
        self.securities
            .get(id)
            .into_iter()
            .flat_map(|h| h.splits.iter().map(|(d, r)| (*d, *r)))
    }

    /// Last known price at or before `date`
    pub fn price_on(&self, id: &SecurityId, date: NaiveDate) -> Option<(NaiveDate, Decimal)> {
        self.securities
            .get(id)?
            .prices
            .range(..=date)
            .next_back()
            .map(|(d, p)| (*d, *p))
    }

    pub fn ids(&self) -> impl Iterator<Item = &SecurityId> {
        self.securities.keys()
    }

    pub fn is_empty(&self) -> bool {
        self.securities.is_empty()
    }
}
