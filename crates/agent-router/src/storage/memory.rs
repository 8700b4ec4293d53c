use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{Record, RecordStore, StorageError, StoreState, StoredRecord};

/// A store that keeps everything in memory. Records are lost on restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn put(&self, record: Record) -> Result<String, StorageError> {
        let id = self.state.lock().await.insert(record);
        debug!("stored {id} in memory");
        Ok(id)
    }

    async fn get(
        &self,
        id: &str,
    ) -> Result<Option<StoredRecord>, StorageError> {
        Ok(self.state.lock().await.get(id))
    }
}
