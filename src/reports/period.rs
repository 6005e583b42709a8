// Reporting periods - inclusive date ranges for reviews

use chrono::{Datelike, Days, Months, NaiveDate};
use std::fmt;
use std::str::FromStr;

use crate::error::PortfolioError;

/// Inclusive date range `from..=to`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Period {
    from: NaiveDate,
    to: NaiveDate,
}

impl Period {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Result<Self, PortfolioError> {
        if from > to {
            return Err(PortfolioError::InvalidPeriod { from, to });
        }
        Ok(Self { from, to })
    }

    /// A calendar month
    pub fn month(year: i32, month: u32) -> Result<Self, PortfolioError> {
        let invalid = || PortfolioError::InvalidPeriodSpec(format!("{}-{:02}", year, month));
        let from = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(invalid)?;
        let to = from
            .checked_add_months(Months::new(1))
            .and_then(|d| d.pred_opt())
            .ok_or_else(invalid)?;
        Ok(Self { from, to })
    }

    /// A calendar year
    pub fn year(year: i32) -> Result<Self, PortfolioError> {
        let invalid = || PortfolioError::InvalidPeriodSpec(year.to_string());
        let from = NaiveDate::from_ymd_opt(year, 1, 1).ok_or_else(invalid)?;
        let to = NaiveDate::from_ymd_opt(year, 12, 31).ok_or_else(invalid)?;
        Ok(Self { from, to })
    }

    pub fn month_to_date(today: NaiveDate) -> Self {
        let from = today - Days::new(u64::from(today.day0()));
        Self { from, to: today }
    }

    pub fn quarter_to_date(today: NaiveDate) -> Self {
        let month_start = today - Days::new(u64::from(today.day0()));
        let from = month_start - Months::new(today.month0() % 3);
        Self { from, to: today }
    }

    pub fn year_to_date(today: NaiveDate) -> Self {
        let from = today - Days::new(u64::from(today.ordinal0()));
        Self { from, to: today }
    }

    /// Last 365 days up to and including `today`
    pub fn trailing_year(today: NaiveDate) -> Self {
        let from = today
            .checked_sub_days(Days::new(365))
            .unwrap_or(NaiveDate::MIN);
        Self { from, to: today }
    }

    pub fn from(&self) -> NaiveDate {
        self.from
    }

    pub fn to(&self) -> NaiveDate {
        self.to
    }

    /// Number of days covered, both ends included
    pub fn days(&self) -> i64 {
        (self.to - self.from).num_days() + 1
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from <= date && date <= self.to
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.from, self.to)
    }
}

/// Accepts `2024`, `2024-03` or `2024-01-15..2024-06-30`
impl FromStr for Period {
    type Err = PortfolioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || PortfolioError::InvalidPeriodSpec(s.to_string());

        if let Some((from, to)) = s.split_once("..") {
            let from = NaiveDate::parse_from_str(from.trim(), "%Y-%m-%d").map_err(|_| invalid())?;
            let to = NaiveDate::parse_from_str(to.trim(), "%Y-%m-%d").map_err(|_| invalid())?;
            return Period::new(from, to);
        }

        match s.split_once('-') {
            Some((year, month)) if year.len() == 4 && month.len() == 2 => {
                let year: i32 = year.parse().map_err(|_| invalid())?;
                let month: u32 = month.parse().map_err(|_| invalid())?;
                Period::month(year, month)
            }
            None if s.len() == 4 => {
                let year: i32 = s.parse().map_err(|_| invalid())?;
                Period::year(year)
            }
            _ => Err(invalid()),
        }
    }
}
