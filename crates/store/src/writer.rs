use crate::store::{ContactId, ContactRecord, FactStore};
use crate::Result;
use serde::Serialize;
use std::collections::BTreeSet;
use svc_facts::{ContactFacts, FlagChange, ProvidedService, Synchronizer};

/// Replacement lists for an amendment; `None` leaves that list untouched
#[derive(Debug, Clone, Default)]
pub struct Amendment {
    pub requested: Option<Vec<String>>,
    pub provided: Option<Vec<ProvidedService>>,
}

impl Amendment {
    #[must_use]
    pub fn requested(mut self, requested: Vec<String>) -> Self {
        self.requested = Some(requested);
        self
    }

    #[must_use]
    pub fn provided(mut self, provided: Vec<ProvidedService>) -> Self {
        self.provided = Some(provided);
        self
    }
}

/// What an amendment changed, by service name and by flag column
#[derive(Debug, Clone, Serialize)]
pub struct AmendOutcome {
    pub record: ContactRecord,
    pub requested_added: Vec<String>,
    pub requested_removed: Vec<String>,
    pub provided_added: Vec<String>,
    pub provided_removed: Vec<String>,
    pub flag_changes: Vec<FlagChange>,
}

/// Result of re-deriving flags for every stored contact
#[derive(Debug, Clone, Default, Serialize)]
pub struct ResyncSummary {
    pub contacts_scanned: usize,
    pub contacts_changed: usize,
    pub changed_ids: Vec<ContactId>,
}

/// The only sanctioned write path for contacts.
///
/// Every create or amend runs the synchronizer over the final lists and persists lists and
/// flags in the same write, so the flag row can never lag behind its lists through this path.
pub struct ContactWriter<'a, S: FactStore + ?Sized> {
    store: &'a S,
    sync: &'a Synchronizer,
}

impl<'a, S: FactStore + ?Sized> ContactWriter<'a, S> {
    pub const fn new(store: &'a S, sync: &'a Synchronizer) -> Self {
        Self { store, sync }
    }

    /// Create a contact with freshly derived flags
    pub async fn record(&self, facts: ContactFacts) -> Result<ContactRecord> {
        let flags = self.sync.flags_for(&facts);
        let record = self.store.insert_contact(facts, flags).await?;
        log::info!(
            "Recorded contact {} on {} ({} flags set)",
            record.id,
            record.facts.contact_date,
            record.flags.count_set()
        );
        Ok(record)
    }

    /// Replace one or both lists and fully re-synchronize the contact's flags
    pub async fn amend(&self, id: ContactId, amendment: Amendment) -> Result<AmendOutcome> {
        self.change_lists(id, move |facts| {
            if let Some(requested) = amendment.requested {
                facts.requested = requested;
            }
            if let Some(provided) = amendment.provided {
                facts.provided = provided;
            }
        })
        .await
    }

    /// Mark a service as provided on an existing contact.
    ///
    /// A service already listed as provided is left as is (the flag is presence-based).
    pub async fn mark_provided(
        &self,
        id: ContactId,
        service: ProvidedService,
    ) -> Result<AmendOutcome> {
        self.change_lists(id, move |facts| {
            if !facts.provided.iter().any(|p| p.service == service.service) {
                facts.provided.push(service);
            }
        })
        .await
    }

    /// Apply `change` to the latest stored lists and re-derive flags, all under the write lock
    async fn change_lists<F>(&self, id: ContactId, change: F) -> Result<AmendOutcome>
    where
        F: FnOnce(&mut ContactFacts) + Send,
    {
        let sync = self.sync;
        let outcome = self
            .store
            .update_contact(id, move |record| {
                let before_requested = owned_names(record.facts.requested_names());
                let before_provided = owned_names(record.facts.provided_names());
                let before_flags = record.flags;

                change(&mut record.facts);
                record.flags = sync.flags_for(&record.facts);

                let after_requested = owned_names(record.facts.requested_names());
                let after_provided = owned_names(record.facts.provided_names());
                AmendOutcome {
                    record: record.clone(),
                    requested_added: difference(&after_requested, &before_requested),
                    requested_removed: difference(&before_requested, &after_requested),
                    provided_added: difference(&after_provided, &before_provided),
                    provided_removed: difference(&before_provided, &after_provided),
                    flag_changes: before_flags.diff(&record.flags),
                }
            })
            .await?;

        log::info!(
            "Amended contact {id}: provided +{:?} -{:?}, requested +{:?} -{:?}, {} flag change(s)",
            outcome.provided_added,
            outcome.provided_removed,
            outcome.requested_added,
            outcome.requested_removed,
            outcome.flag_changes.len()
        );
        for change in &outcome.flag_changes {
            log::debug!(
                "contact {id}: {} {} -> {}",
                change.column,
                change.before,
                change.after
            );
        }
        Ok(outcome)
    }

    /// Re-derive flags for every contact whose stored flags disagree with its lists
    pub async fn resync_all(&self) -> Result<ResyncSummary> {
        let contacts = self.store.contacts().await?;
        let mut summary = ResyncSummary {
            contacts_scanned: contacts.len(),
            ..Default::default()
        };

        for contact in contacts {
            if self.sync.flags_for(&contact.facts) == contact.flags {
                continue;
            }
            let sync = self.sync;
            let changed = self
                .store
                .update_contact(contact.id, move |record| {
                    let derived = sync.flags_for(&record.facts);
                    let changed = derived != record.flags;
                    record.flags = derived;
                    changed
                })
                .await?;
            if changed {
                log::debug!("Re-synchronized contact {}", contact.id);
                summary.contacts_changed += 1;
                summary.changed_ids.push(contact.id);
            }
        }

        log::info!(
            "Re-synchronized {} of {} contact(s)",
            summary.contacts_changed,
            summary.contacts_scanned
        );
        Ok(summary)
    }
}

fn owned_names(names: BTreeSet<&str>) -> BTreeSet<String> {
    names.into_iter().map(str::to_string).collect()
}

fn difference(left: &BTreeSet<String>, right: &BTreeSet<String>) -> Vec<String> {
    left.difference(right).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FactReader, MemoryStore};
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use svc_facts::{FlagRow, ServiceCode, Side};

    fn jan(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, day).unwrap()
    }

    #[tokio::test]
    async fn record_persists_lists_and_flags_together() {
        let store = MemoryStore::new();
        let sync = Synchronizer::default();
        let writer = ContactWriter::new(&store, &sync);

        let record = writer
            .record(ContactFacts::new(jan(15)).request("Food"))
            .await
            .unwrap();
        let stored = store.contact(record.id).await.unwrap().unwrap();
        assert_eq!(stored, record);
        assert_eq!(stored.flags.column("food_requested"), Some(1));
        assert_eq!(stored.flags.count_set(), 1);
    }

    #[tokio::test]
    async fn marking_provided_later_resyncs_flags() {
        let store = MemoryStore::new();
        let sync = Synchronizer::default();
        let writer = ContactWriter::new(&store, &sync);

        let record = writer
            .record(ContactFacts::new(jan(15)).request("Food"))
            .await
            .unwrap();
        let outcome = writer
            .mark_provided(record.id, ProvidedService::new("Food").provider("Ana"))
            .await
            .unwrap();

        assert_eq!(outcome.provided_added, vec!["Food".to_string()]);
        assert!(outcome.provided_removed.is_empty());
        assert_eq!(outcome.flag_changes.len(), 1);
        assert_eq!(outcome.flag_changes[0].column, "food_provided");
        assert!(outcome.record.flags.flag(ServiceCode::Food, Side::Provided));

        let again = writer
            .mark_provided(record.id, ProvidedService::new("Food").provider("Ben"))
            .await
            .unwrap();
        assert!(again.flag_changes.is_empty());
        assert_eq!(again.record.facts.provided.len(), 1);
    }

    #[tokio::test]
    async fn amend_retraction_clears_flags() {
        let store = MemoryStore::new();
        let sync = Synchronizer::default();
        let writer = ContactWriter::new(&store, &sync);

        let record = writer
            .record(
                ContactFacts::new(jan(3))
                    .request("Housing")
                    .request("Legal")
                    .provide(ProvidedService::new("Legal")),
            )
            .await
            .unwrap();
        let outcome = writer
            .amend(
                record.id,
                Amendment::default()
                    .requested(vec!["Legal".to_string()])
                    .provided(Vec::new()),
            )
            .await
            .unwrap();

        assert_eq!(outcome.requested_removed, vec!["Housing".to_string()]);
        assert_eq!(outcome.provided_removed, vec!["Legal".to_string()]);
        let columns: Vec<&str> = outcome.flag_changes.iter().map(|c| c.column).collect();
        assert_eq!(columns, vec!["housing_requested", "legal_provided"]);
        assert!(outcome
            .flag_changes
            .iter()
            .all(|c| c.before == 1 && c.after == 0));
    }

    #[tokio::test]
    async fn resync_all_repairs_hand_edited_flags() {
        let store = MemoryStore::new();
        let sync = Synchronizer::default();
        let writer = ContactWriter::new(&store, &sync);

        let clean = writer
            .record(ContactFacts::new(jan(1)).request("Food"))
            .await
            .unwrap();
        let stale = store
            .insert_contact(
                ContactFacts::new(jan(2)).request("Benefits"),
                FlagRow::zeroed(),
            )
            .await
            .unwrap();

        let summary = writer.resync_all().await.unwrap();
        assert_eq!(summary.contacts_scanned, 2);
        assert_eq!(summary.changed_ids, vec![stale.id]);

        let repaired = store.contact(stale.id).await.unwrap().unwrap();
        assert!(repaired.flags.flag(ServiceCode::Benefits, Side::Requested));
        assert_eq!(store.contact(clean.id).await.unwrap().unwrap(), clean);

        let second = writer.resync_all().await.unwrap();
        assert_eq!(second.contacts_changed, 0);
    }
}
