//! # Service Facts
//!
//! Canonical service catalog and the per-contact flag synchronizer.
//!
//! The same fact ("client X was offered/received service Y on date D") lives in three places:
//!
//! ```text
//! ContactFacts (lists)
//!     │
//!     ├──> synchronize()          one 0/1 pair per catalog entry
//!     │      └─> FlagRow
//!     │
//!     └──> monthly aggregation    (svc-aggregator)
//!            └─> AggregateRow per (year, month, service)
//! ```
//!
//! This crate owns the catalog, the shared row types and the synchronizer. It performs no I/O.
//!
//! ## Example
//!
//! ```rust
//! use svc_facts::{synchronize, Catalog, ServiceCode, Side};
//!
//! let catalog = Catalog::standard();
//! let flags = synchronize(&catalog, &["Food", "Food"], &[]);
//!
//! assert!(flags.flag(ServiceCode::Food, Side::Requested));
//! assert!(!flags.flag(ServiceCode::Food, Side::Provided));
//! assert_eq!(flags.column("food_requested"), Some(1));
//! ```

mod catalog;
mod error;
mod period;
mod sync;
mod types;

pub use catalog::{Catalog, CatalogEntry, ServiceCode};
pub use error::{FactsError, Result};
pub use period::{Period, Scope, MAX_YEAR, MIN_YEAR};
pub use sync::{synchronize, Synchronizer};
pub use types::{
    completion_rate, AggregateRow, ContactFacts, FlagChange, FlagPair, FlagRow, ProvidedService,
    ServiceTotals, Side,
};
