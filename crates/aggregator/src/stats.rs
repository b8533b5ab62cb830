use serde::Serialize;
use svc_facts::{Period, Scope, ServiceCode};

/// A catalog entry whose rows could not be written
#[derive(Debug, Clone, Serialize)]
pub struct ServiceFailure {
    pub service: ServiceCode,
    pub service_name: String,
    pub error: String,
}

/// Outcome of one aggregation run
#[derive(Debug, Clone, Serialize)]
pub struct AggregateSummary {
    pub scope: Scope,

    /// Contacts in the snapshot taken at the start of the run
    pub contacts: usize,

    /// Periods in scope that had at least one contact
    pub periods: usize,

    /// Rows written across all successful catalog entries
    pub rows_written: usize,

    /// Catalog entries whose rows were replaced
    pub services_processed: usize,

    pub failures: Vec<ServiceFailure>,

    /// Time taken in milliseconds
    pub time_ms: u64,
}

impl AggregateSummary {
    pub fn new(scope: Scope) -> Self {
        Self {
            scope,
            contacts: 0,
            periods: 0,
            rows_written: 0,
            services_processed: 0,
            failures: Vec::new(),
            time_ms: 0,
        }
    }

    /// True when at least one catalog entry failed to write
    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }

    pub fn add_failure(&mut self, service: ServiceCode, service_name: &str, error: String) {
        self.failures.push(ServiceFailure {
            service,
            service_name: service_name.to_string(),
            error,
        });
    }
}

/// Outcome of one month inside a historical sweep
#[derive(Debug, Clone, Serialize)]
pub struct MonthOutcome {
    pub period: Period,
    pub rows_written: usize,
    pub failed_services: usize,

    /// Set when the month could not be aggregated at all
    pub error: Option<String>,
}

impl MonthOutcome {
    pub fn succeeded(&self) -> bool {
        self.failed_services == 0 && self.error.is_none()
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct HistorySummary {
    pub months: Vec<MonthOutcome>,
    pub successful_months: usize,
    pub failed_months: usize,
    pub total_rows: usize,
    pub time_ms: u64,
}

impl HistorySummary {
    pub fn add_month(&mut self, outcome: MonthOutcome) {
        if outcome.succeeded() {
            self.successful_months += 1;
        } else {
            self.failed_months += 1;
        }
        self.total_rows += outcome.rows_written;
        self.months.push(outcome);
    }

    pub fn is_partial(&self) -> bool {
        self.failed_months > 0
    }
}
