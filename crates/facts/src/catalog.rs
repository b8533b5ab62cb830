use crate::error::{FactsError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Stable identifier of a catalogued service.
///
/// The enum is the single source of truth for flag column names: every code maps to a pair of
/// `&'static str` columns, so no column identifier is ever assembled from runtime data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceCode {
    CaseManagement,
    OccupationalTherapy,
    Food,
    Healthcare,
    Housing,
    Employment,
    Benefits,
    Legal,
    Transportation,
    Childcare,
    MentalHealth,
    SubstanceAbuse,
    Education,
}

impl ServiceCode {
    pub const COUNT: usize = 13;

    /// Every code in catalog order
    pub const ALL: [Self; Self::COUNT] = [
        Self::CaseManagement,
        Self::OccupationalTherapy,
        Self::Food,
        Self::Healthcare,
        Self::Housing,
        Self::Employment,
        Self::Benefits,
        Self::Legal,
        Self::Transportation,
        Self::Childcare,
        Self::MentalHealth,
        Self::SubstanceAbuse,
        Self::Education,
    ];

    /// Stable code string, also the flag column prefix
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CaseManagement => "case_management",
            Self::OccupationalTherapy => "occupational_therapy",
            Self::Food => "food",
            Self::Healthcare => "healthcare",
            Self::Housing => "housing",
            Self::Employment => "employment",
            Self::Benefits => "benefits",
            Self::Legal => "legal",
            Self::Transportation => "transportation",
            Self::Childcare => "childcare",
            Self::MentalHealth => "mental_health",
            Self::SubstanceAbuse => "substance_abuse",
            Self::Education => "education",
        }
    }

    #[must_use]
    pub const fn requested_column(self) -> &'static str {
        match self {
            Self::CaseManagement => "case_management_requested",
            Self::OccupationalTherapy => "occupational_therapy_requested",
            Self::Food => "food_requested",
            Self::Healthcare => "healthcare_requested",
            Self::Housing => "housing_requested",
            Self::Employment => "employment_requested",
            Self::Benefits => "benefits_requested",
            Self::Legal => "legal_requested",
            Self::Transportation => "transportation_requested",
            Self::Childcare => "childcare_requested",
            Self::MentalHealth => "mental_health_requested",
            Self::SubstanceAbuse => "substance_abuse_requested",
            Self::Education => "education_requested",
        }
    }

    #[must_use]
    pub const fn provided_column(self) -> &'static str {
        match self {
            Self::CaseManagement => "case_management_provided",
            Self::OccupationalTherapy => "occupational_therapy_provided",
            Self::Food => "food_provided",
            Self::Healthcare => "healthcare_provided",
            Self::Housing => "housing_provided",
            Self::Employment => "employment_provided",
            Self::Benefits => "benefits_provided",
            Self::Legal => "legal_provided",
            Self::Transportation => "transportation_provided",
            Self::Childcare => "childcare_provided",
            Self::MentalHealth => "mental_health_provided",
            Self::SubstanceAbuse => "substance_abuse_provided",
            Self::Education => "education_provided",
        }
    }

    /// Display name used by the standard catalog
    #[must_use]
    pub const fn standard_display_name(self) -> &'static str {
        match self {
            Self::CaseManagement => "Case Management",
            Self::OccupationalTherapy => "Occupational Therapy",
            Self::Food => "Food",
            Self::Healthcare => "Healthcare",
            Self::Housing => "Housing",
            Self::Employment => "Employment",
            Self::Benefits => "Benefits",
            Self::Legal => "Legal",
            Self::Transportation => "Transportation",
            Self::Childcare => "Childcare",
            Self::MentalHealth => "Mental Health",
            Self::SubstanceAbuse => "Substance Abuse",
            Self::Education => "Education",
        }
    }

    /// Other spellings the standard catalog accepts in contact lists
    #[must_use]
    pub const fn standard_aliases(self) -> &'static [&'static str] {
        match self {
            Self::OccupationalTherapy => &["Occupational"],
            _ => &[],
        }
    }

    /// Position of this code in [`ServiceCode::ALL`]
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Parse a stable code string (`"mental_health"`)
    #[must_use]
    pub fn parse(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == code)
    }
}

impl fmt::Display for ServiceCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the service catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub code: ServiceCode,
    pub display_name: String,

    /// Alternate list spellings that resolve to this entry
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
}

impl CatalogEntry {
    pub fn new(code: ServiceCode, display_name: impl Into<String>) -> Self {
        Self {
            code,
            display_name: display_name.into(),
            aliases: Vec::new(),
        }
    }

    #[must_use]
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    /// Display name followed by aliases
    pub fn names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.display_name.as_str()).chain(self.aliases.iter().map(String::as_str))
    }

    /// Flag column prefix (`<prefix>_requested`, `<prefix>_provided`)
    #[must_use]
    pub const fn column_prefix(&self) -> &'static str {
        self.code.as_str()
    }
}

/// Canonical, immutable service catalog.
///
/// A catalog always covers every [`ServiceCode`] exactly once; construction fails otherwise.
#[derive(Debug, Clone)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
    by_code: [usize; ServiceCode::COUNT],
}

impl Catalog {
    /// The catalog shipped with the deployment
    #[must_use]
    pub fn standard() -> Self {
        let entries: Vec<CatalogEntry> = ServiceCode::ALL
            .into_iter()
            .map(|code| {
                code.standard_aliases()
                    .iter()
                    .fold(CatalogEntry::new(code, code.standard_display_name()), |entry, alias| {
                        entry.alias(*alias)
                    })
            })
            .collect();
        let mut by_code = [0usize; ServiceCode::COUNT];
        for (pos, entry) in entries.iter().enumerate() {
            by_code[entry.code.index()] = pos;
        }
        Self { entries, by_code }
    }

    /// Build a catalog from explicit entries, validating uniqueness and coverage
    pub fn new(entries: Vec<CatalogEntry>) -> Result<Self> {
        if entries.is_empty() {
            return Err(FactsError::invalid_catalog("catalog has no entries"));
        }

        let mut seen_codes = HashSet::new();
        let mut seen_names = HashSet::new();
        let mut by_code = [usize::MAX; ServiceCode::COUNT];
        for (pos, entry) in entries.iter().enumerate() {
            if !seen_codes.insert(entry.code) {
                return Err(FactsError::invalid_catalog(format!(
                    "duplicate code {}",
                    entry.code
                )));
            }
            for name in entry.names() {
                if name.trim().is_empty() {
                    return Err(FactsError::invalid_catalog(format!(
                        "entry {} has an empty name",
                        entry.code
                    )));
                }
                if name.trim() != name {
                    return Err(FactsError::invalid_catalog(format!(
                        "name \"{name}\" of {} has surrounding whitespace",
                        entry.code
                    )));
                }
                if !seen_names.insert(name) {
                    return Err(FactsError::invalid_catalog(format!(
                        "duplicate display name \"{name}\""
                    )));
                }
            }
            by_code[entry.code.index()] = pos;
        }

        let missing: Vec<&str> = ServiceCode::ALL
            .iter()
            .filter(|code| by_code[code.index()] == usize::MAX)
            .map(|code| code.as_str())
            .collect();
        if !missing.is_empty() {
            return Err(FactsError::invalid_catalog(format!(
                "missing entries for {}",
                missing.join(", ")
            )));
        }

        Ok(Self { entries, by_code })
    }

    /// Entries in catalog order
    #[must_use]
    pub fn all(&self) -> &[CatalogEntry] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up an entry by its stable code string
    #[must_use]
    pub fn lookup(&self, code: &str) -> Option<&CatalogEntry> {
        ServiceCode::parse(code).map(|code| self.entry(code))
    }

    #[must_use]
    pub fn entry(&self, code: ServiceCode) -> &CatalogEntry {
        &self.entries[self.by_code[code.index()]]
    }

    #[must_use]
    pub fn display_name(&self, code: ServiceCode) -> &str {
        &self.entry(code).display_name
    }

    /// Resolve a service name as written in a contact's lists.
    ///
    /// Exact display-name or alias match first, then the stable code. Anything else is unknown.
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<&CatalogEntry> {
        self.entries
            .iter()
            .find(|entry| entry.names().any(|known| known == name))
            .or_else(|| self.lookup(name))
    }

    #[must_use]
    pub fn contains_name(&self, name: &str) -> bool {
        self.resolve(name).is_some()
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::standard()
    }
}
