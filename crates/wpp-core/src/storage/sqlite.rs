//! SQLite-backed table store

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, error, info};

use crate::error::{CoreError, Result};
use crate::storage::item::{Item, PrimaryKey};
use crate::storage::store::{QueryPage, TableStore};
use crate::storage::stream::{StreamEventName, StreamRecord, StreamSender};

/// SQLite-based table store
///
/// Several logical tables can live in one database file; rows are scoped by
/// table name. When a stream sender is attached, every write emits a
/// NEW_IMAGE [`StreamRecord`].
pub struct SqliteTableStore {
    conn: Arc<Mutex<Connection>>,
    table_name: String,
    stream: Option<StreamSender>,
    sequence: AtomicU64,
}

impl SqliteTableStore {
    /// Open a table in the database at the given path
    pub fn new(db_path: &str, table_name: &str) -> Result<Self> {
        if let Some(parent) = std::path::Path::new(db_path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(db_path)?;
        Self::with_connection(conn, table_name)
    }

    /// Create an in-memory table store (for testing)
    pub fn in_memory(table_name: &str) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn, table_name)
    }

    fn with_connection(conn: Connection, table_name: &str) -> Result<Self> {
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            table_name: table_name.to_string(),
            stream: None,
            sequence: AtomicU64::new(0),
        };
        store.init_tables()?;
        Ok(store)
    }

    /// Attach a change stream; every later write emits a record on it
    pub fn with_stream(mut self, stream: StreamSender) -> Self {
        self.stream = Some(stream);
        self
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| CoreError::LockPoisoned)
    }

    /// Initialize database tables
    fn init_tables(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS items (
                table_name TEXT NOT NULL,
                pk TEXT NOT NULL,
                sk TEXT NOT NULL,
                item TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (table_name, pk, sk)
            )",
            [],
        )?;
        Ok(())
    }

    fn emit(&self, event_name: StreamEventName, key: &PrimaryKey, item: Item) {
        let Some(stream) = &self.stream else {
            return;
        };

        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let record = StreamRecord::new_image(&self.table_name, event_name, key, item, sequence);
        if stream.send(record).is_err() {
            error!(
                "Change stream for table {} is closed, record for pk: ({}) sk: ({}) dropped",
                self.table_name, key.pk, key.sk
            );
        }
    }
}

#[async_trait]
impl TableStore for SqliteTableStore {
    fn table_name(&self) -> &str {
        &self.table_name
    }

    async fn put_item(&self, item: Item) -> Result<()> {
        info!("Starting put_item operation.");
        debug!("data: {:?}", item);

        let key = PrimaryKey::of(&item)?;
        let item_json = serde_json::to_string(&item)?;

        let event_name = {
            let conn = self.conn()?;
            let existing: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM items WHERE table_name = ?1 AND pk = ?2 AND sk = ?3",
                    params![self.table_name, key.pk, key.sk],
                    |row| row.get(0),
                )
                .optional()?;

            conn.execute(
                "INSERT OR REPLACE INTO items (table_name, pk, sk, item, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    self.table_name,
                    key.pk,
                    key.sk,
                    item_json,
                    chrono::Utc::now().to_rfc3339(),
                ],
            )
            .inspect_err(|e| {
                error!(
                    "put_item operation failed for: table_name: {}. pk: {}. sk: {}. error: {}.",
                    self.table_name, key.pk, key.sk, e
                )
            })?;

            if existing.is_some() {
                StreamEventName::Modify
            } else {
                StreamEventName::Insert
            }
        };

        self.emit(event_name, &key, item);
        Ok(())
    }

    async fn get_item_by_pk_and_sk(
        &self,
        partition_key: &str,
        sort_key: &str,
    ) -> Result<Option<Item>> {
        info!(
            "Starting get_item_by_pk_and_sk with pk: ({}) and sk: ({})",
            partition_key, sort_key
        );

        let conn = self.conn()?;
        let item_json: Option<String> = conn
            .query_row(
                "SELECT item FROM items WHERE table_name = ?1 AND pk = ?2 AND sk = ?3",
                params![self.table_name, partition_key, sort_key],
                |row| row.get(0),
            )
            .optional()?;

        match item_json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn query_page(
        &self,
        partition_key: &str,
        sort_key_portion: &str,
        limit: usize,
        exclusive_start_key: Option<&PrimaryKey>,
    ) -> Result<QueryPage> {
        let start_sk = exclusive_start_key.map(|k| k.sk.as_str()).unwrap_or("");

        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT item FROM items
             WHERE table_name = ?1 AND pk = ?2
               AND substr(sk, 1, length(?3)) = ?3
               AND sk > ?4
             ORDER BY sk ASC
             LIMIT ?5",
        )?;

        let rows = stmt.query_map(
            params![
                self.table_name,
                partition_key,
                sort_key_portion,
                start_sk,
                limit as i64
            ],
            |row| row.get::<_, String>(0),
        )?;

        let mut items = Vec::new();
        for row in rows {
            items.push(serde_json::from_str::<Item>(&row?)?);
        }

        // A full page means more rows may follow
        let last_evaluated_key = if limit > 0 && items.len() == limit {
            items.last().map(PrimaryKey::of).transpose()?
        } else {
            None
        };

        debug!(
            "query_page returned {} items for pk: ({}) sk prefix: ({})",
            items.len(),
            partition_key,
            sort_key_portion
        );

        Ok(QueryPage {
            items,
            last_evaluated_key,
        })
    }
}
