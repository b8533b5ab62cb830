use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use svc_facts::{AggregateRow, ContactFacts, FlagRow, ServiceCode, Scope};

pub type ContactId = u64;

/// A persisted contact: the list representation and its derived flag row, stored together
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactRecord {
    pub id: ContactId,

    #[serde(flatten)]
    pub facts: ContactFacts,

    /// Flag columns, one requested/provided pair per catalog entry
    pub flags: FlagRow,
}

/// Read side of the fact store.
///
/// Batch readers receive a point-in-time snapshot; writes committed after a call returns are
/// not reflected in that snapshot.
#[async_trait]
pub trait FactReader: Send + Sync {
    /// Every stored contact ordered by id
    async fn contacts(&self) -> Result<Vec<ContactRecord>>;

    async fn contact(&self, id: ContactId) -> Result<Option<ContactRecord>>;

    /// Every stored aggregate row ordered by (year, month, service)
    async fn aggregate_rows(&self) -> Result<Vec<AggregateRow>>;

    /// Contacts whose date falls inside `scope`
    async fn contacts_in(&self, scope: Scope) -> Result<Vec<ContactRecord>> {
        let mut contacts = self.contacts().await?;
        contacts.retain(|c| scope.contains_date(c.facts.contact_date));
        Ok(contacts)
    }
}

/// Write side of the fact store
#[async_trait]
pub trait FactStore: FactReader {
    /// Persist a new contact together with its flags in one write
    async fn insert_contact(&self, facts: ContactFacts, flags: FlagRow) -> Result<ContactRecord>;

    /// Read-modify-write one contact under the store's write lock.
    ///
    /// `apply` sees the latest persisted record; whatever it leaves behind is written back in a
    /// single write, lists and flags together.
    async fn update_contact<F, T>(&self, id: ContactId, apply: F) -> Result<T>
    where
        F: FnOnce(&mut ContactRecord) -> T + Send,
        T: Send;

    /// Replace every row of `service` whose period lies inside `scope` with `rows`.
    ///
    /// One call is one unit of work: on error, no row of this service changes.
    async fn replace_service_rows(
        &self,
        service: ServiceCode,
        scope: Scope,
        rows: Vec<AggregateRow>,
    ) -> Result<usize>;
}

/// Sort aggregate rows by their unique key
pub(crate) fn sort_rows(rows: &mut [AggregateRow]) {
    rows.sort_by_key(AggregateRow::key);
}

/// Apply a service-scoped replacement to an in-memory row set
pub(crate) fn apply_service_rows(
    existing: &mut Vec<AggregateRow>,
    service: ServiceCode,
    scope: Scope,
    rows: Vec<AggregateRow>,
) -> Result<usize> {
    if let Some(stray) = rows
        .iter()
        .find(|row| row.service != service || !scope.contains(row.period()))
    {
        return Err(crate::StoreError::Other(format!(
            "row {} {} outside unit of work {} {}",
            stray.period(),
            stray.service,
            scope,
            service
        )));
    }

    let mut keys = std::collections::HashSet::new();
    if let Some(dup) = rows.iter().find(|row| !keys.insert(row.key())) {
        return Err(crate::StoreError::Other(format!(
            "duplicate row {} {}",
            dup.period(),
            dup.service
        )));
    }

    existing.retain(|row| !(row.service == service && scope.contains(row.period())));
    let written = rows.len();
    existing.extend(rows);
    sort_rows(existing);
    Ok(written)
}
