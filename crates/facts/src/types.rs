use crate::catalog::ServiceCode;
use crate::error::{FactsError, Result};
use crate::period::Period;
use chrono::{DateTime, NaiveDate, Utc};
use serde::de::{Deserializer, MapAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// A service marked as delivered during a contact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvidedService {
    /// Service name as entered (display name or code)
    pub service: String,

    /// Who delivered the service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,

    /// When the service was marked complete
    #[serde(
        default,
        alias = "completedAt",
        skip_serializing_if = "Option::is_none"
    )]
    pub completed_at: Option<DateTime<Utc>>,
}

impl ProvidedService {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            provider: None,
            completed_at: None,
        }
    }

    /// Builder: set provider
    #[must_use]
    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Builder: set completion time
    #[must_use]
    pub const fn completed_at(mut self, at: DateTime<Utc>) -> Self {
        self.completed_at = Some(at);
        self
    }
}

/// The list representation of one contact's services
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactFacts {
    #[serde(default, rename = "requested_services", alias = "requested")]
    pub requested: Vec<String>,

    #[serde(default, rename = "provided_services", alias = "provided")]
    pub provided: Vec<ProvidedService>,

    pub contact_date: NaiveDate,
}

impl ContactFacts {
    pub fn new(contact_date: NaiveDate) -> Self {
        Self {
            requested: Vec::new(),
            provided: Vec::new(),
            contact_date,
        }
    }

    /// Builder: add a requested service
    #[must_use]
    pub fn request(mut self, service: impl Into<String>) -> Self {
        self.requested.push(service.into());
        self
    }

    /// Builder: add a provided service
    #[must_use]
    pub fn provide(mut self, service: ProvidedService) -> Self {
        self.provided.push(service);
        self
    }

    /// Distinct requested names
    #[must_use]
    pub fn requested_names(&self) -> BTreeSet<&str> {
        self.requested.iter().map(String::as_str).collect()
    }

    /// Distinct provided names
    #[must_use]
    pub fn provided_names(&self) -> BTreeSet<&str> {
        self.provided.iter().map(|p| p.service.as_str()).collect()
    }

    #[must_use]
    pub fn period(&self) -> Period {
        Period::of(self.contact_date)
    }
}

/// Requested/provided flags of one service on one contact
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct FlagPair {
    pub requested: bool,
    pub provided: bool,
}

/// Which half of a flag pair (or which list) an observation refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Requested,
    Provided,
}

impl Side {
    #[must_use]
    pub const fn column(self, code: ServiceCode) -> &'static str {
        match self {
            Self::Requested => code.requested_column(),
            Self::Provided => code.provided_column(),
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Requested => f.write_str("requested"),
            Self::Provided => f.write_str("provided"),
        }
    }
}

/// The flag representation of one contact: one pair per catalogued service.
///
/// Persisted as a flat `column -> 0|1` map. Missing columns read as 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct FlagRow {
    pairs: [FlagPair; ServiceCode::COUNT],
}

impl FlagRow {
    /// All flags cleared
    #[must_use]
    pub fn zeroed() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn get(&self, code: ServiceCode) -> FlagPair {
        self.pairs[code.index()]
    }

    #[must_use]
    pub const fn flag(&self, code: ServiceCode, side: Side) -> bool {
        let pair = self.pairs[code.index()];
        match side {
            Side::Requested => pair.requested,
            Side::Provided => pair.provided,
        }
    }

    pub fn set(&mut self, code: ServiceCode, side: Side, value: bool) {
        let pair = &mut self.pairs[code.index()];
        match side {
            Side::Requested => pair.requested = value,
            Side::Provided => pair.provided = value,
        }
    }

    /// Integer value of a named column, or `None` if no such column exists
    #[must_use]
    pub fn column(&self, name: &str) -> Option<u8> {
        ServiceCode::ALL.into_iter().find_map(|code| {
            if code.requested_column() == name {
                Some(u8::from(self.get(code).requested))
            } else if code.provided_column() == name {
                Some(u8::from(self.get(code).provided))
            } else {
                None
            }
        })
    }

    /// Every column in catalog order as `(name, 0|1)`
    pub fn columns(&self) -> impl Iterator<Item = (&'static str, u8)> + '_ {
        ServiceCode::ALL.into_iter().flat_map(move |code| {
            let pair = self.get(code);
            [
                (code.requested_column(), u8::from(pair.requested)),
                (code.provided_column(), u8::from(pair.provided)),
            ]
        })
    }

    /// Columns whose value differs between `self` (before) and `after`
    #[must_use]
    pub fn diff(&self, after: &Self) -> Vec<FlagChange> {
        self.columns()
            .zip(after.columns())
            .filter(|((_, before), (_, now))| before != now)
            .map(|((column, before), (_, now))| FlagChange {
                column,
                before,
                after: now,
            })
            .collect()
    }

    /// Number of set flags
    #[must_use]
    pub fn count_set(&self) -> usize {
        self.columns().filter(|(_, v)| *v == 1).count()
    }

    fn set_column(&mut self, name: &str, value: i64) -> Result<()> {
        let flag = match value {
            0 => false,
            1 => true,
            other => {
                return Err(FactsError::InvalidFlag {
                    column: name.to_string(),
                    value: other,
                })
            }
        };
        for code in ServiceCode::ALL {
            if code.requested_column() == name {
                self.set(code, Side::Requested, flag);
                return Ok(());
            }
            if code.provided_column() == name {
                self.set(code, Side::Provided, flag);
                return Ok(());
            }
        }
        Err(FactsError::UnknownColumn(name.to_string()))
    }
}

impl Serialize for FlagRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(ServiceCode::COUNT * 2))?;
        for (column, value) in self.columns() {
            map.serialize_entry(column, &value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for FlagRow {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct FlagRowVisitor;

        impl<'de> Visitor<'de> for FlagRowVisitor {
            type Value = FlagRow;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of flag columns to 0 or 1")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut access: A,
            ) -> std::result::Result<FlagRow, A::Error> {
                let mut row = FlagRow::zeroed();
                while let Some((column, value)) = access.next_entry::<String, i64>()? {
                    row.set_column(&column, value)
                        .map_err(serde::de::Error::custom)?;
                }
                Ok(row)
            }
        }

        deserializer.deserialize_map(FlagRowVisitor)
    }
}

/// One flag column that changed during a re-synchronization
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlagChange {
    pub column: &'static str,
    pub before: u8,
    pub after: u8,
}

/// Summed flags for one service over a set of contacts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceTotals {
    pub requested: u64,
    pub provided: u64,
}

impl ServiceTotals {
    pub fn add(&mut self, pair: FlagPair) {
        self.requested += u64::from(pair.requested);
        self.provided += u64::from(pair.provided);
    }

    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.requested == 0 && self.provided == 0
    }

    #[must_use]
    pub fn completion_rate(&self) -> f64 {
        completion_rate(self.requested, self.provided)
    }
}

/// `provided / requested * 100` rounded to two decimals; 0 when nothing was requested.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn completion_rate(requested: u64, provided: u64) -> f64 {
    if requested == 0 {
        return 0.0;
    }
    let rate = provided as f64 * 100.0 / requested as f64;
    (rate * 100.0).round() / 100.0
}

/// One row of the monthly aggregate table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateRow {
    pub year: i32,
    pub month: u32,
    pub service: ServiceCode,
    pub service_name: String,
    pub total_requested: u64,
    pub total_provided: u64,
    pub completion_rate: f64,
}

impl AggregateRow {
    pub fn new(
        period: Period,
        service: ServiceCode,
        service_name: impl Into<String>,
        totals: ServiceTotals,
    ) -> Self {
        Self {
            year: period.year,
            month: period.month,
            service,
            service_name: service_name.into(),
            total_requested: totals.requested,
            total_provided: totals.provided,
            completion_rate: totals.completion_rate(),
        }
    }

    #[must_use]
    pub const fn period(&self) -> Period {
        Period {
            year: self.year,
            month: self.month,
        }
    }

    #[must_use]
    pub const fn key(&self) -> (i32, u32, ServiceCode) {
        (self.year, self.month, self.service)
    }

    #[must_use]
    pub const fn totals(&self) -> ServiceTotals {
        ServiceTotals {
            requested: self.total_requested,
            provided: self.total_provided,
        }
    }
}
