//! Persistence for the records created by tools.

mod file;
mod memory;
mod record;
mod sqlite;

use std::collections::BTreeMap;
use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::StorageConfig;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use record::{
    Channel, Followup, Priority, Record, RecordStatus, Stored, StoredRecord,
    Ticket,
};

const TICKET_ID_PREFIX: &str = "TICK";
const FOLLOWUP_ID_PREFIX: &str = "FUP";

/// A storage operation failed.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Reading or writing the backing file failed.
    #[error("storage I/O failed: {0}")]
    Io(#[from] io::Error),
    /// The backing file could not be decoded or encoded.
    #[error("malformed storage document: {0}")]
    Format(#[from] serde_json::Error),
    /// The database rejected a query.
    #[error("storage database failed: {0}")]
    Database(#[from] sqlx::Error),
}

/// Keeps tickets and follow-ups.
///
/// Ids are allocated by the store, sequentially and under a lock, so
/// concurrent tool calls never share one.
#[async_trait]
pub trait RecordStore: Send + Sync + 'static {
    /// Stores a new record and returns the id allocated for it.
    async fn put(&self, record: Record) -> Result<String, StorageError>;

    /// Looks a record up by id.
    async fn get(&self, id: &str)
    -> Result<Option<StoredRecord>, StorageError>;
}

/// Opens the backend named by `config`.
pub async fn open_store(
    config: &StorageConfig,
) -> Result<Arc<dyn RecordStore>, StorageError> {
    let store: Arc<dyn RecordStore> = match config {
        StorageConfig::Memory => Arc::new(MemoryStore::new()),
        StorageConfig::File(path) => Arc::new(FileStore::open(path).await?),
        StorageConfig::Sqlite(path) => Arc::new(SqliteStore::open(path).await?),
    };
    Ok(store)
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
struct Counters {
    tickets: u64,
    followups: u64,
}

/// Everything a store keeps. The file backend writes this out as a whole.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
struct StoreState {
    #[serde(default)]
    tickets: BTreeMap<String, Stored<Ticket>>,
    #[serde(default)]
    followups: BTreeMap<String, Stored<Followup>>,
    #[serde(default)]
    counters: Counters,
}

impl StoreState {
    fn insert(&mut self, record: Record) -> String {
        let created_at = Utc::now();
        match record {
            Record::Ticket(ticket) => {
                self.counters.tickets += 1;
                let id = format_id(TICKET_ID_PREFIX, self.counters.tickets);
                self.tickets.insert(
                    id.clone(),
                    Stored {
                        id: id.clone(),
                        status: RecordStatus::Created,
                        created_at,
                        data: ticket,
                    },
                );
                id
            }
            Record::Followup(followup) => {
                self.counters.followups += 1;
                let id =
                    format_id(FOLLOWUP_ID_PREFIX, self.counters.followups);
                self.followups.insert(
                    id.clone(),
                    Stored {
                        id: id.clone(),
                        status: RecordStatus::Scheduled,
                        created_at,
                        data: followup,
                    },
                );
                id
            }
        }
    }

    fn get(&self, id: &str) -> Option<StoredRecord> {
        if let Some(ticket) = self.tickets.get(id) {
            return Some(StoredRecord::Ticket(ticket.clone()));
        }
        self.followups
            .get(id)
            .map(|followup| StoredRecord::Followup(followup.clone()))
    }
}

#[inline]
fn format_id(prefix: &str, seq: u64) -> String {
    format!("{prefix}-{seq:06}")
}
