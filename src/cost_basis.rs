//! Lot engine - cost basis tracking for FIFO and average-cost accounting
//!
//! Both matchers consume acquisitions, disposals and splits in date order and
//! report the cost attributed to each disposal. Splits change quantities only;
//! the pooled cost is never touched by them.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::str::FromStr;
use tracing::warn;

use crate::models::SplitRatio;

/// Cost basis method used to attribute cost to disposals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostBasisMethod {
    /// Oldest lots are consumed first
    #[default]
    Fifo,
    /// Cost is pooled and prorated over the whole position
    #[serde(alias = "average", alias = "avg")]
    AverageCost,
}

impl CostBasisMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            CostBasisMethod::Fifo => "FIFO",
            CostBasisMethod::AverageCost => "AVERAGE_COST",
        }
    }
}

impl FromStr for CostBasisMethod {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "FIFO" => Ok(CostBasisMethod::Fifo),
            "AVERAGE_COST" | "AVERAGE" | "AVG" => Ok(CostBasisMethod::AverageCost),
            _ => Err(()),
        }
    }
}

/// An acquisition still (partially) held
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lot {
    pub acquired: NaiveDate,
    pub quantity: Decimal,
    pub cost: Decimal,
}

/// Average-cost matcher: a single pool of quantity and cost
#[derive(Debug, Clone, Default)]
pub struct AverageCostMatcher {
    total_quantity: Decimal,
    total_cost: Decimal,
}

impl AverageCostMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_purchase(&mut self, quantity: Decimal, cost: Decimal) {
        self.total_quantity += quantity;
        self.total_cost += cost;
    }

    /// Split/reverse-split: quantity changes, total cost does not
    pub fn apply_split(&mut self, ratio: SplitRatio) {
        self.total_quantity = ratio.apply(self.total_quantity);
    }

    /// Remove `quantity` from the pool and return the cost attributed to it
    pub fn match_sale(&mut self, quantity: Decimal) -> Decimal {
        if quantity <= Decimal::ZERO || self.total_quantity <= Decimal::ZERO {
            if quantity > Decimal::ZERO {
                warn!("Disposing {} units from an empty average-cost pool", quantity);
            }
            return Decimal::ZERO;
        }

        if quantity >= self.total_quantity {
            if quantity > self.total_quantity {
                warn!(
                    "Disposing {} units but only {} held; excess carries no cost",
                    quantity, self.total_quantity
                );
            }
            let cost_of_sale = self.total_cost;
            self.total_quantity = Decimal::ZERO;
            self.total_cost = Decimal::ZERO;
            return cost_of_sale;
        }

        let cost_of_sale = self.total_cost * quantity / self.total_quantity;
        self.total_quantity -= quantity;
        self.total_cost -= cost_of_sale;
        cost_of_sale
    }

    pub fn remaining_quantity(&self) -> Decimal {
        self.total_quantity
    }

    pub fn total_cost(&self) -> Decimal {
        self.total_cost
    }

    pub fn average_cost(&self) -> Decimal {
        if self.total_quantity > Decimal::ZERO {
            self.total_cost / self.total_quantity
        } else {
            Decimal::ZERO
        }
    }
}

/// FIFO matcher: ordered lots, oldest consumed first
#[derive(Debug, Clone, Default)]
pub struct FifoMatcher {
    lots: VecDeque<Lot>,
}

impl FifoMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_purchase(&mut self, acquired: NaiveDate, quantity: Decimal, cost: Decimal) {
        if quantity <= Decimal::ZERO {
            return;
        }
        self.lots.push_back(Lot {
            acquired,
            quantity,
            cost,
        });
    }

    /// Every open lot is rescaled; lot costs stay as they are
    pub fn apply_split(&mut self, ratio: SplitRatio) {
        for lot in self.lots.iter_mut() {
            lot.quantity = ratio.apply(lot.quantity);
        }
    }

    /// Consume lots oldest-first and return the cost of the consumed part.
    /// A partially consumed lot keeps a prorated share of its cost.
    pub fn match_sale(&mut self, quantity: Decimal) -> Decimal {
        let mut remaining = quantity;
        let mut cost_of_sale = Decimal::ZERO;

        while remaining > Decimal::ZERO {
            let Some(lot) = self.lots.front_mut() else {
                warn!(
                    "Disposing {} units more than held; excess carries no cost",
                    remaining
                );
                break;
            };

            if lot.quantity <= remaining {
                remaining -= lot.quantity;
                cost_of_sale += lot.cost;
                self.lots.pop_front();
            } else {
                let portion = lot.cost * remaining / lot.quantity;
                lot.quantity -= remaining;
                lot.cost -= portion;
                cost_of_sale += portion;
                remaining = Decimal::ZERO;
            }
        }

        cost_of_sale
    }

    pub fn lots(&self) -> impl Iterator<Item = &Lot> {
        self.lots.iter()
    }

    pub fn remaining_quantity(&self) -> Decimal {
        self.lots.iter().map(|l| l.quantity).sum()
    }

    pub fn total_cost(&self) -> Decimal {
        self.lots.iter().map(|l| l.cost).sum()
    }
}

/// Either matcher behind one interface, chosen by [`CostBasisMethod`]
#[derive(Debug, Clone)]
pub enum CostTracker {
    Fifo(FifoMatcher),
    AverageCost(AverageCostMatcher),
}

impl CostTracker {
    pub fn new(method: CostBasisMethod) -> Self {
        match method {
            CostBasisMethod::Fifo => CostTracker::Fifo(FifoMatcher::new()),
            CostBasisMethod::AverageCost => CostTracker::AverageCost(AverageCostMatcher::new()),
        }
    }

    pub fn acquire(&mut self, acquired: NaiveDate, quantity: Decimal, cost: Decimal) {
        match self {
            CostTracker::Fifo(m) => m.add_purchase(acquired, quantity, cost),
            CostTracker::AverageCost(m) => m.add_purchase(quantity, cost),
        }
    }

    /// Returns the cost of sale
    pub fn dispose(&mut self, quantity: Decimal) -> Decimal {
        match self {
            CostTracker::Fifo(m) => m.match_sale(quantity),
            CostTracker::AverageCost(m) => m.match_sale(quantity),
        }
    }

    pub fn split(&mut self, ratio: SplitRatio) {
        match self {
            CostTracker::Fifo(m) => m.apply_split(ratio),
            CostTracker::AverageCost(m) => m.apply_split(ratio),
        }
    }

    pub fn quantity(&self) -> Decimal {
        match self {
            CostTracker::Fifo(m) => m.remaining_quantity(),
            CostTracker::AverageCost(m) => m.remaining_quantity(),
        }
    }

    pub fn cost_basis(&self) -> Decimal {
        match self {
            CostTracker::Fifo(m) => m.total_cost(),
            CostTracker::AverageCost(m) => m.total_cost(),
        }
    }

    /// Open lots, oldest first. The average-cost pool keeps no lots.
    pub fn lots(&self) -> Vec<Lot> {
        match self {
            CostTracker::Fifo(m) => m.lots().cloned().collect(),
            CostTracker::AverageCost(_) => Vec::new(),
        }
    }
}
