//! SQLite implementation of the Store trait.
//!
//! This is the primary storage backend for Labeller. It uses rusqlite with
//! bundled SQLite, wrapped in async via tokio::spawn_blocking.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rusqlite::types::Type;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, TransactionBehavior};

use labeller_core::{
    now_millis, Checkpoint, ContextId, PlacedLabel, Polarity, UserId, UserType, VisitId,
};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{CommitResult, Context, LabelRecord, Store, User, Visit};

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteStore {
    /// The SQLite connection, protected by a mutex.
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn run<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();

        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| StoreError::Task(format!("mutex poisoned: {}", e)))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Task(format!("spawn_blocking failed: {}", e)))?
    }
}

fn polarity_at(row: &rusqlite::Row<'_>, column: &str) -> rusqlite::Result<Polarity> {
    let text: String = row.get(column)?;
    text.parse()
        .map_err(|_| rusqlite::Error::InvalidColumnType(0, column.into(), Type::Text))
}

// Helper to convert a row to LabelRecord
fn row_to_label(row: &rusqlite::Row<'_>) -> rusqlite::Result<LabelRecord> {
    Ok(LabelRecord {
        sequence_index: row.get("sequence_index")?,
        user_id: UserId(row.get("user_id")?),
        visit_id: VisitId(row.get("visit_id")?),
        intent_label: polarity_at(row, "intent_label")?,
        abuse_label: polarity_at(row, "abuse_label")?,
        created_at: row.get("created_at")?,
    })
}

fn row_to_visit(row: &rusqlite::Row<'_>) -> rusqlite::Result<Visit> {
    Ok(Visit {
        visit_id: VisitId(row.get("visit_id")?),
        user_id: UserId(row.get("user_id")?),
        client_address: row.get("client_address")?,
        timestamp: row.get("timestamp")?,
    })
}

#[async_trait]
impl Store for SqliteStore {
    async fn insert_user(&self, user_type: UserType) -> Result<UserId> {
        self.run(move |conn| {
            let user_id: i64 = conn.query_row(
                "INSERT INTO users (user_type, created_at) VALUES (?1, ?2) RETURNING user_id",
                params![user_type.as_str(), now_millis()],
                |row| row.get(0),
            )?;
            Ok(UserId(user_id))
        })
        .await
    }

    async fn get_user(&self, user_id: UserId) -> Result<Option<User>> {
        self.run(move |conn| {
            conn.query_row(
                "SELECT user_id, user_type, created_at FROM users WHERE user_id = ?1",
                params![user_id.0],
                |row| {
                    Ok(User {
                        user_id: UserId(row.get("user_id")?),
                        user_type: polarity_at(row, "user_type")?,
                        created_at: row.get("created_at")?,
                    })
                },
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn insert_visit(&self, user_id: UserId, client_address: Option<&str>) -> Result<VisitId> {
        let client_address = client_address.map(str::to_owned);

        self.run(move |conn| {
            let visit_id: i64 = conn.query_row(
                "INSERT INTO visits (user_id, client_address, timestamp)
                 VALUES (?1, ?2, ?3) RETURNING visit_id",
                params![user_id.0, client_address, now_millis()],
                |row| row.get(0),
            )?;
            Ok(VisitId(visit_id))
        })
        .await
    }

    async fn latest_visit(&self, user_id: UserId) -> Result<Option<Visit>> {
        self.run(move |conn| {
            conn.query_row(
                "SELECT visit_id, user_id, client_address, timestamp FROM visits
                 WHERE user_id = ?1 ORDER BY visit_id DESC LIMIT 1",
                params![user_id.0],
                row_to_visit,
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn last_label(&self, user_id: UserId) -> Result<Option<LabelRecord>> {
        self.run(move |conn| {
            conn.query_row(
                "SELECT sequence_index, user_id, visit_id, intent_label, abuse_label, created_at
                 FROM labels WHERE user_id = ?1 ORDER BY sequence_index DESC LIMIT 1",
                params![user_id.0],
                row_to_label,
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn commit_labels(
        &self,
        user_id: UserId,
        expected: Checkpoint,
        labels: &[PlacedLabel],
    ) -> Result<CommitResult> {
        let labels = labels.to_vec();

        self.run(move |conn| {
            for (i, label) in labels.iter().enumerate() {
                if label.sequence_index != expected.next_index() + i as i64 {
                    return Err(StoreError::InvalidData(format!(
                        "label {} placed at {} after checkpoint {}",
                        i, label.sequence_index, expected
                    )));
                }
            }

            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let last: Option<i64> = tx.query_row(
                "SELECT MAX(sequence_index) FROM labels WHERE user_id = ?1",
                params![user_id.0],
                |row| row.get(0),
            )?;
            let current = Checkpoint::from_last(last);
            if current != expected {
                return Ok(CommitResult::Stale { current });
            }

            let visit_id: i64 = tx
                .query_row(
                    "SELECT visit_id FROM visits WHERE user_id = ?1
                     ORDER BY visit_id DESC LIMIT 1",
                    params![user_id.0],
                    |row| row.get(0),
                )
                .optional()?
                .ok_or_else(|| StoreError::NotFound(format!("no visit for user {}", user_id)))?;

            let now = now_millis();
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO labels (
                        sequence_index, user_id, visit_id, intent_label, abuse_label, created_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                )?;

                for label in &labels {
                    let inserted = stmt.execute(params![
                        label.sequence_index,
                        user_id.0,
                        visit_id,
                        label.intent_label.as_str(),
                        label.abuse_label.as_str(),
                        now,
                    ]);

                    match inserted {
                        Ok(_) => {}
                        Err(rusqlite::Error::SqliteFailure(err, _))
                            if err.code == ErrorCode::ConstraintViolation =>
                        {
                            return Err(StoreError::Conflict {
                                user_id,
                                sequence_index: label.sequence_index,
                            });
                        }
                        Err(err) => return Err(err.into()),
                    }
                }
            }

            tx.commit()?;
            tracing::debug!(%user_id, count = labels.len(), visit_id, "committed labels");

            Ok(CommitResult::Committed {
                checkpoint: expected.advance(labels.len()),
                visit_id: VisitId(visit_id),
            })
        })
        .await
    }

    async fn labels_for_user(&self, user_id: UserId) -> Result<Vec<LabelRecord>> {
        self.run(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT sequence_index, user_id, visit_id, intent_label, abuse_label, created_at
                 FROM labels WHERE user_id = ?1 ORDER BY sequence_index",
            )?;

            let labels = stmt
                .query_map(params![user_id.0], row_to_label)?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            Ok(labels)
        })
        .await
    }

    async fn insert_contexts(&self, contexts: &[Context]) -> Result<usize> {
        let contexts = contexts.to_vec();

        self.run(move |conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt =
                    tx.prepare("INSERT INTO contexts (context_id, content) VALUES (?1, ?2)")?;
                for context in &contexts {
                    stmt.execute(params![context.context_id.0, context.content])?;
                }
            }
            tx.commit()?;
            Ok(contexts.len())
        })
        .await
    }

    async fn count_contexts(&self) -> Result<u64> {
        self.run(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM contexts", [], |row| row.get(0))?;
            Ok(count as u64)
        })
        .await
    }

    async fn contexts_after(&self, after: Checkpoint, limit: usize) -> Result<Vec<Context>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.run(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT context_id, content FROM contexts
                 WHERE context_id > ?1
                 ORDER BY context_id
                 LIMIT ?2",
            )?;

            let contexts = stmt
                .query_map(params![after.index(), limit], |row| {
                    Ok(Context {
                        context_id: ContextId(row.get(0)?),
                        content: row.get(1)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            Ok(contexts)
        })
        .await
    }
}
