use crate::store::{apply_service_rows, ContactId, ContactRecord, FactReader, FactStore};
use crate::{Result, StoreError};
use async_trait::async_trait;
use std::collections::BTreeMap;
use svc_facts::{AggregateRow, ContactFacts, FlagRow, Scope, ServiceCode};
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct MemoryState {
    contacts: BTreeMap<ContactId, ContactRecord>,
    next_id: ContactId,
    rows: Vec<AggregateRow>,
}

/// Process-local store for tests and dry runs
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FactReader for MemoryStore {
    async fn contacts(&self) -> Result<Vec<ContactRecord>> {
        Ok(self.state.read().await.contacts.values().cloned().collect())
    }

    async fn contact(&self, id: ContactId) -> Result<Option<ContactRecord>> {
        Ok(self.state.read().await.contacts.get(&id).cloned())
    }

    async fn aggregate_rows(&self) -> Result<Vec<AggregateRow>> {
        Ok(self.state.read().await.rows.clone())
    }
}

#[async_trait]
impl FactStore for MemoryStore {
    async fn insert_contact(&self, facts: ContactFacts, flags: FlagRow) -> Result<ContactRecord> {
        let mut state = self.state.write().await;
        state.next_id += 1;
        let record = ContactRecord {
            id: state.next_id,
            facts,
            flags,
        };
        state.contacts.insert(record.id, record.clone());
        Ok(record)
    }

    async fn update_contact<F, T>(&self, id: ContactId, apply: F) -> Result<T>
    where
        F: FnOnce(&mut ContactRecord) -> T + Send,
        T: Send,
    {
        let mut state = self.state.write().await;
        let record = state
            .contacts
            .get_mut(&id)
            .ok_or(StoreError::ContactNotFound(id))?;
        let out = apply(record);
        record.id = id;
        Ok(out)
    }

    async fn replace_service_rows(
        &self,
        service: ServiceCode,
        scope: Scope,
        rows: Vec<AggregateRow>,
    ) -> Result<usize> {
        let mut state = self.state.write().await;
        apply_service_rows(&mut state.rows, service, scope, rows)
    }
}
