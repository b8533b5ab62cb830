use crate::error::{FactsError, Result};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const MIN_YEAR: i32 = 1900;
pub const MAX_YEAR: i32 = 2099;

/// A calendar month used as the aggregation bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Period {
    pub year: i32,
    pub month: u32,
}

impl Period {
    /// Validated constructor: month 1..=12, year 1900..=2099
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(FactsError::InvalidMonth(month));
        }
        if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
            return Err(FactsError::InvalidYear(year));
        }
        Ok(Self { year, month })
    }

    /// Bucket a contact date. Dates outside the supported year window are still bucketed so
    /// they stay visible to the auditor.
    #[must_use]
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }

    #[must_use]
    pub fn next(self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// Every month from `self` to `end` inclusive; empty when `end` precedes `self`
    #[must_use]
    pub fn through(self, end: Self) -> Vec<Self> {
        let mut out = Vec::new();
        let mut current = self;
        while current <= end {
            out.push(current);
            current = current.next();
        }
        out
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:02}", self.year, self.month)
    }
}

impl FromStr for Period {
    type Err = FactsError;

    fn from_str(s: &str) -> Result<Self> {
        let (year, month) = s
            .trim()
            .split_once('-')
            .ok_or_else(|| FactsError::InvalidPeriod(s.to_string()))?;
        let year: i32 = year
            .parse()
            .map_err(|_| FactsError::InvalidPeriod(s.to_string()))?;
        let month: u32 = month
            .parse()
            .map_err(|_| FactsError::InvalidPeriod(s.to_string()))?;
        Self::new(year, month)
    }
}

/// Which periods a batch run covers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    #[default]
    All,
    Period(Period),
}

impl Scope {
    #[must_use]
    pub fn contains_date(&self, date: NaiveDate) -> bool {
        match self {
            Self::All => true,
            Self::Period(period) => period.contains(date),
        }
    }

    #[must_use]
    pub fn contains(&self, period: Period) -> bool {
        match self {
            Self::All => true,
            Self::Period(scoped) => *scoped == period,
        }
    }
}

impl From<Option<Period>> for Scope {
    fn from(period: Option<Period>) -> Self {
        period.map_or(Self::All, Self::Period)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all periods"),
            Self::Period(period) => write!(f, "{period}"),
        }
    }
}
