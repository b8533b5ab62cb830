use crate::paths::lock_path;
use crate::{Result, StoreError};
use fs2::FileExt;
use std::path::Path;
use std::time::Instant;

/// Exclusive writer lock over a data directory, released on drop
pub(crate) struct StoreWriteLock {
    file: std::fs::File,
}

impl Drop for StoreWriteLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

pub(crate) async fn acquire_store_write_lock(data_dir: &Path) -> Result<StoreWriteLock> {
    tokio::fs::create_dir_all(data_dir).await?;
    let path = lock_path(data_dir);

    tokio::task::spawn_blocking(move || -> Result<StoreWriteLock> {
        use std::fs::OpenOptions;

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(|err| StoreError::LockError(format!("open {}: {err}", path.display())))?;

        let start = Instant::now();
        file.lock_exclusive()
            .map_err(|err| StoreError::LockError(format!("acquire {}: {err}", path.display())))?;
        log::debug!(
            "acquired store lock {} after {}ms",
            path.display(),
            start.elapsed().as_millis()
        );

        Ok(StoreWriteLock { file })
    })
    .await
    .map_err(|err| StoreError::LockError(format!("join lock task: {err}")))?
}
