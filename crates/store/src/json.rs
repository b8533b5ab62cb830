use crate::lock::acquire_store_write_lock;
use crate::paths::{contacts_path, summary_path};
use crate::store::{apply_service_rows, sort_rows, ContactId, ContactRecord, FactReader, FactStore};
use crate::{Result, StoreError};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use svc_facts::{AggregateRow, ContactFacts, FlagRow, Scope, ServiceCode};

pub const CONTACTS_SCHEMA_VERSION: u32 = 1;
pub const SUMMARY_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct PersistedContacts {
    schema_version: u32,
    next_id: ContactId,
    contacts: Vec<ContactRecord>,
}

impl Default for PersistedContacts {
    fn default() -> Self {
        Self {
            schema_version: CONTACTS_SCHEMA_VERSION,
            next_id: 0,
            contacts: Vec::new(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedSummary {
    schema_version: u32,
    rows: Vec<AggregateRow>,
}

impl Default for PersistedSummary {
    fn default() -> Self {
        Self {
            schema_version: SUMMARY_SCHEMA_VERSION,
            rows: Vec::new(),
        }
    }
}

/// Fact store persisted as two JSON documents under a data directory.
///
/// Every write holds an exclusive lock file, rewrites the affected document to a temp file and
/// renames it into place, so readers never observe a half-written contact or summary.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    data_dir: PathBuf,
}

impl JsonFileStore {
    /// Open a store rooted at `data_dir`, creating the directory if needed
    pub async fn open(data_dir: impl AsRef<Path>) -> Result<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        log::info!("Opening fact store at {}", data_dir.display());
        tokio::fs::create_dir_all(&data_dir).await?;
        Ok(Self { data_dir })
    }

    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    async fn load_contacts(&self) -> Result<PersistedContacts> {
        let persisted: PersistedContacts =
            read_document(&contacts_path(&self.data_dir)).await?.unwrap_or_default();
        if persisted.schema_version != CONTACTS_SCHEMA_VERSION {
            return Err(StoreError::SchemaVersion {
                file: "contacts",
                found: persisted.schema_version,
                expected: CONTACTS_SCHEMA_VERSION,
            });
        }
        Ok(persisted)
    }

    async fn load_summary(&self) -> Result<PersistedSummary> {
        let persisted: PersistedSummary =
            read_document(&summary_path(&self.data_dir)).await?.unwrap_or_default();
        if persisted.schema_version != SUMMARY_SCHEMA_VERSION {
            return Err(StoreError::SchemaVersion {
                file: "monthly_summary",
                found: persisted.schema_version,
                expected: SUMMARY_SCHEMA_VERSION,
            });
        }
        Ok(persisted)
    }
}

async fn read_document<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

async fn write_document<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let bytes = serde_json::to_vec_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

#[async_trait]
impl FactReader for JsonFileStore {
    async fn contacts(&self) -> Result<Vec<ContactRecord>> {
        let mut contacts = self.load_contacts().await?.contacts;
        contacts.sort_by_key(|c| c.id);
        Ok(contacts)
    }

    async fn contact(&self, id: ContactId) -> Result<Option<ContactRecord>> {
        Ok(self
            .load_contacts()
            .await?
            .contacts
            .into_iter()
            .find(|c| c.id == id))
    }

    async fn aggregate_rows(&self) -> Result<Vec<AggregateRow>> {
        let mut rows = self.load_summary().await?.rows;
        sort_rows(&mut rows);
        Ok(rows)
    }
}

#[async_trait]
impl FactStore for JsonFileStore {
    async fn insert_contact(&self, facts: ContactFacts, flags: FlagRow) -> Result<ContactRecord> {
        let _lock = acquire_store_write_lock(&self.data_dir).await?;
        let mut persisted = self.load_contacts().await?;

        persisted.next_id += 1;
        let record = ContactRecord {
            id: persisted.next_id,
            facts,
            flags,
        };
        persisted.contacts.push(record.clone());

        write_document(&contacts_path(&self.data_dir), &persisted).await?;
        log::debug!("Inserted contact {}", record.id);
        Ok(record)
    }

    async fn update_contact<F, T>(&self, id: ContactId, apply: F) -> Result<T>
    where
        F: FnOnce(&mut ContactRecord) -> T + Send,
        T: Send,
    {
        let _lock = acquire_store_write_lock(&self.data_dir).await?;
        let mut persisted = self.load_contacts().await?;

        let record = persisted
            .contacts
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(StoreError::ContactNotFound(id))?;
        let out = apply(record);
        record.id = id;

        write_document(&contacts_path(&self.data_dir), &persisted).await?;
        log::debug!("Updated contact {id}");
        Ok(out)
    }

    async fn replace_service_rows(
        &self,
        service: ServiceCode,
        scope: Scope,
        rows: Vec<AggregateRow>,
    ) -> Result<usize> {
        let _lock = acquire_store_write_lock(&self.data_dir).await?;
        let mut persisted = self.load_summary().await?;

        let written = apply_service_rows(&mut persisted.rows, service, scope, rows)?;
        write_document(&summary_path(&self.data_dir), &persisted).await?;
        Ok(written)
    }
}
