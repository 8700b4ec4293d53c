use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::fs;
use tokio::sync::Mutex;

use super::{Record, RecordStore, StorageError, StoreState, StoredRecord};

/// A store persisted as one JSON document.
///
/// The whole document is rewritten on every put, through a temporary file
/// renamed over the old one, so a crash never leaves a half-written file.
/// A put runs to completion even if its caller is cancelled, so the file and
/// the in-memory state never disagree about the last allocated id.
#[derive(Debug)]
pub struct FileStore {
    path: Arc<Path>,
    state: Arc<Mutex<StoreState>>,
}

impl FileStore {
    /// Opens the store at `path`, loading what an earlier process saved.
    ///
    /// A missing file is treated as an empty store.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let state = match fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("no storage file at {}, starting empty", path.display());
                StoreState::default()
            }
            Err(err) => return Err(err.into()),
        };
        info!(
            tickets = state.tickets.len(),
            followups = state.followups.len(),
            "opened storage file {}",
            path.display()
        );
        Ok(Self {
            path: path.into(),
            state: Arc::new(Mutex::new(state)),
        })
    }
}

async fn persist(path: &Path, state: &StoreState) -> Result<(), StorageError> {
    let bytes = serde_json::to_vec_pretty(state)?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }
    let mut tmp_path = path.as_os_str().to_owned();
    tmp_path.push(".tmp");
    fs::write(&tmp_path, bytes).await?;
    fs::rename(&tmp_path, path).await?;
    Ok(())
}

#[async_trait]
impl RecordStore for FileStore {
    async fn put(&self, record: Record) -> Result<String, StorageError> {
        let mut state = Arc::clone(&self.state).lock_owned().await;
        let path = Arc::clone(&self.path);
        // Detached, so an aborted caller cannot split the write from the
        // commit.
        let write = tokio::spawn(async move {
            // Only commit in memory what made it to disk.
            let mut next = state.clone();
            let id = next.insert(record);
            persist(&path, &next).await?;
            *state = next;
            debug!("stored {id} in {}", path.display());
            Ok::<_, StorageError>(id)
        });
        write.await.map_err(|err| StorageError::Io(io::Error::other(err)))?
    }

    async fn get(
        &self,
        id: &str,
    ) -> Result<Option<StoredRecord>, StorageError> {
        Ok(self.state.lock().await.get(id))
    }
}
