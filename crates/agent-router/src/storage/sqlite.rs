use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteConnection, SqliteJournalMode, SqlitePool,
    SqlitePoolOptions,
};
use sqlx::FromRow;
use tokio::fs;

use super::{
    FOLLOWUP_ID_PREFIX, Followup, Record, RecordStatus, RecordStore,
    StorageError, Stored, StoredRecord, TICKET_ID_PREFIX, Ticket, format_id,
};

const TICKET_COUNTER: &str = "ticket_counter";
const FOLLOWUP_COUNTER: &str = "followup_counter";

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS tickets (
        ticket_id TEXT PRIMARY KEY,
        customer_id TEXT NOT NULL,
        summary TEXT NOT NULL,
        priority TEXT NOT NULL CHECK(priority IN ('low', 'medium', 'high')),
        details TEXT,
        status TEXT NOT NULL DEFAULT 'created',
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS followups (
        followup_id TEXT PRIMARY KEY,
        customer_id TEXT NOT NULL,
        datetime_iso TEXT NOT NULL,
        channel TEXT NOT NULL CHECK(channel IN ('email', 'phone', 'whatsapp')),
        contact TEXT,
        scheduled INTEGER NOT NULL DEFAULT 1,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS storage_counters (
        counter_name TEXT PRIMARY KEY,
        counter_value INTEGER NOT NULL DEFAULT 0
    )
    "#,
    r#"
    INSERT OR IGNORE INTO storage_counters (counter_name, counter_value)
    VALUES ('ticket_counter', 0), ('followup_counter', 0)
    "#,
];

/// A store backed by a SQLite database.
///
/// Each put allocates its id and inserts the record in one transaction, so
/// an interrupted put leaves neither behind.
#[derive(Clone, Debug)]
pub struct SqliteStore {
    pool: SqlitePool,
}

#[derive(Debug, FromRow)]
struct TicketRow {
    ticket_id: String,
    customer_id: String,
    summary: String,
    priority: String,
    details: Option<String>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct FollowupRow {
    followup_id: String,
    customer_id: String,
    datetime_iso: String,
    channel: String,
    contact: Option<String>,
    created_at: DateTime<Utc>,
}

impl SqliteStore {
    /// Opens the database at `path`, creating it and its tables if needed.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        let store = Self { pool };
        store.migrate().await?;
        info!("opened storage database {}", path.display());
        Ok(store)
    }

    #[cfg(test)]
    async fn in_memory() -> Result<Self, StorageError> {
        // Every connection to `:memory:` is its own database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<(), StorageError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    async fn get_ticket(
        &self,
        id: &str,
    ) -> Result<Option<Stored<Ticket>>, StorageError> {
        let row: Option<TicketRow> = sqlx::query_as(
            r#"
            SELECT ticket_id, customer_id, summary, priority, details, created_at
            FROM tickets WHERE ticket_id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(Stored {
            id: row.ticket_id,
            status: RecordStatus::Created,
            created_at: row.created_at,
            data: Ticket {
                customer_id: row.customer_id,
                summary: row.summary,
                priority: decode_name(row.priority)?,
                details: row.details,
            },
        }))
    }

    async fn get_followup(
        &self,
        id: &str,
    ) -> Result<Option<Stored<Followup>>, StorageError> {
        let row: Option<FollowupRow> = sqlx::query_as(
            r#"
            SELECT followup_id, customer_id, datetime_iso, channel, contact,
                created_at
            FROM followups WHERE followup_id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(Stored {
            id: row.followup_id,
            status: RecordStatus::Scheduled,
            created_at: row.created_at,
            data: Followup {
                customer_id: row.customer_id,
                datetime: row.datetime_iso,
                channel: decode_name(row.channel)?,
                contact: row.contact,
            },
        }))
    }
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn put(&self, record: Record) -> Result<String, StorageError> {
        let created_at = Utc::now();
        // Dropping the transaction unfinished rolls it back.
        let mut tx = self.pool.begin().await?;
        let id = match record {
            Record::Ticket(ticket) => {
                let seq = next_value(&mut tx, TICKET_COUNTER).await?;
                let id = format_id(TICKET_ID_PREFIX, seq);
                sqlx::query(
                    r#"
                    INSERT INTO tickets
                        (ticket_id, customer_id, summary, priority, details,
                        created_at)
                    VALUES (?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(&id)
                .bind(&ticket.customer_id)
                .bind(&ticket.summary)
                .bind(ticket.priority.as_str())
                .bind(&ticket.details)
                .bind(created_at)
                .execute(&mut *tx)
                .await?;
                id
            }
            Record::Followup(followup) => {
                let seq = next_value(&mut tx, FOLLOWUP_COUNTER).await?;
                let id = format_id(FOLLOWUP_ID_PREFIX, seq);
                sqlx::query(
                    r#"
                    INSERT INTO followups
                        (followup_id, customer_id, datetime_iso, channel,
                        contact, created_at)
                    VALUES (?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(&id)
                .bind(&followup.customer_id)
                .bind(&followup.datetime)
                .bind(followup.channel.as_str())
                .bind(&followup.contact)
                .bind(created_at)
                .execute(&mut *tx)
                .await?;
                id
            }
        };
        tx.commit().await?;
        debug!("stored {id} in the database");
        Ok(id)
    }

    async fn get(
        &self,
        id: &str,
    ) -> Result<Option<StoredRecord>, StorageError> {
        if let Some(ticket) = self.get_ticket(id).await? {
            return Ok(Some(StoredRecord::Ticket(ticket)));
        }
        Ok(self.get_followup(id).await?.map(StoredRecord::Followup))
    }
}

/// Bumps a counter and returns its new value. The update takes the write
/// lock, so concurrent transactions allocate in turn.
async fn next_value(
    conn: &mut SqliteConnection,
    counter: &str,
) -> Result<u64, StorageError> {
    let (value,): (i64,) = sqlx::query_as(
        r#"
        UPDATE storage_counters SET counter_value = counter_value + 1
        WHERE counter_name = ?
        RETURNING counter_value
        "#,
    )
    .bind(counter)
    .fetch_one(&mut *conn)
    .await?;
    u64::try_from(value)
        .map_err(|err| StorageError::Database(sqlx::Error::Decode(err.into())))
}

fn decode_name<T: DeserializeOwned>(name: String) -> Result<T, StorageError> {
    Ok(serde_json::from_value(Value::String(name))?)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::storage::{Channel, Priority};

    fn ticket(summary: &str) -> Record {
        Record::Ticket(Ticket {
            customer_id: "c_42".to_owned(),
            summary: summary.to_owned(),
            priority: Priority::Medium,
            details: None,
        })
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let store = SqliteStore::in_memory().await.unwrap();
        assert_eq!(
            store.put(ticket("Export stuck")).await.unwrap(),
            "TICK-000001"
        );
        assert_eq!(
            store
                .put(Record::Followup(Followup {
                    customer_id: "c_42".to_owned(),
                    datetime: "2025-12-15T10:30:00".to_owned(),
                    channel: Channel::Whatsapp,
                    contact: Some("+1234567890".to_owned()),
                }))
                .await
                .unwrap(),
            "FUP-000001"
        );

        let Some(StoredRecord::Ticket(stored)) =
            store.get("TICK-000001").await.unwrap()
        else {
            panic!("ticket not found");
        };
        assert_eq!(stored.status, RecordStatus::Created);
        assert_eq!(stored.data.priority, Priority::Medium);
        assert_eq!(stored.data.summary, "Export stuck");

        let Some(StoredRecord::Followup(stored)) =
            store.get("FUP-000001").await.unwrap()
        else {
            panic!("follow-up not found");
        };
        assert_eq!(stored.status, RecordStatus::Scheduled);
        assert_eq!(stored.data.channel, Channel::Whatsapp);
        assert_eq!(stored.data.datetime, "2025-12-15T10:30:00");

        assert!(store.get("TICK-000002").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_reopen_and_concurrent_puts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db").join("agent_router.db");

        let store = Arc::new(SqliteStore::open(&path).await.unwrap());
        let handles: Vec<_> = (0..8)
            .map(|n| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    store.put(ticket(&format!("ticket {n}"))).await.unwrap()
                })
            })
            .collect();
        let mut ids = vec![];
        for handle in handles {
            ids.push(handle.await.unwrap());
        }
        ids.sort();
        let expected: Vec<_> =
            (1..=8).map(|n| format!("TICK-{n:06}")).collect();
        assert_eq!(ids, expected);
        store.pool.close().await;
        drop(store);

        // Counters and records survive the restart.
        let store = SqliteStore::open(&path).await.unwrap();
        assert!(store.get("TICK-000008").await.unwrap().is_some());
        assert_eq!(store.put(ticket("again")).await.unwrap(), "TICK-000009");
    }
}
