//! # Service Aggregator
//!
//! Batch job that rolls contact flag rows up into the monthly summary table.
//!
//! ```text
//! contacts in scope (one snapshot)
//!     │
//!     ├──> group by (year, month)
//!     │      └─> sum requested / provided flags per catalog entry
//!     │
//!     └──> replace rows per catalog entry
//!            └─> (year, month, service) → totals + completion rate
//! ```
//!
//! Each catalog entry is its own unit of work. A failure writing one entry is logged and
//! recorded in [`AggregateSummary::failures`]; the run continues with the next entry.
//!
//! ## Example
//!
//! ```no_run
//! use svc_aggregator::Aggregator;
//! use svc_facts::{Catalog, Period, Scope};
//! use svc_store::JsonFileStore;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = JsonFileStore::open(".svc-facts/data").await?;
//!     let catalog = Catalog::standard();
//!
//!     let summary = Aggregator::new(&store, &catalog)
//!         .aggregate(Scope::Period(Period::new(2025, 1)?))
//!         .await?;
//!     println!("{} rows, partial: {}", summary.rows_written, summary.is_partial());
//!     Ok(())
//! }
//! ```

mod aggregator;
mod error;
mod stats;

pub use aggregator::Aggregator;
pub use error::{AggregatorError, Result};
pub use stats::{AggregateSummary, HistorySummary, MonthOutcome, ServiceFailure};
