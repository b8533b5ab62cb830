//! # Service Fact Store
//!
//! Persistence for contacts (list representation plus flag row) and the monthly summary table.
//!
//! ## Layout
//!
//! ```text
//! <data_dir>/
//!     contacts.json          schema_version, next_id, contacts[]
//!     monthly_summary.json   schema_version, rows[] keyed by (year, month, service)
//!     store.lock             exclusive write lock
//! ```
//!
//! Readers ([`FactReader`]) never take the lock; writers ([`FactStore`]) always do. All contact
//! writes go through [`ContactWriter`], which re-synchronizes flags before every write.
//!
//! ## Example
//!
//! ```no_run
//! use svc_store::{ContactWriter, JsonFileStore};
//! use svc_facts::{ContactFacts, Synchronizer};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = JsonFileStore::open(".svc-facts/data").await?;
//!     let sync = Synchronizer::default();
//!     let writer = ContactWriter::new(&store, &sync);
//!
//!     let date = chrono::NaiveDate::from_ymd_opt(2025, 1, 15).unwrap();
//!     let record = writer.record(ContactFacts::new(date).request("Food")).await?;
//!     println!("contact {} has {} flag(s) set", record.id, record.flags.count_set());
//!     Ok(())
//! }
//! ```

mod error;
mod json;
mod lock;
mod memory;
pub mod paths;
mod store;
mod writer;

pub use error::{Result, StoreError};
pub use json::{JsonFileStore, CONTACTS_SCHEMA_VERSION, SUMMARY_SCHEMA_VERSION};
pub use memory::MemoryStore;
pub use store::{ContactId, ContactRecord, FactReader, FactStore};
pub use writer::{AmendOutcome, Amendment, ContactWriter, ResyncSummary};
