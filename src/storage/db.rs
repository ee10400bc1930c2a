use std::collections::HashSet;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use dirs::home_dir;
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use tokio::sync::{watch, Mutex};
use tracing::{debug, warn};

use super::{MessageStore, Snapshot};
use crate::errors::{StoreError, StoreResult};
use crate::types::{Direction, Message};

const DB_FILE_NAME: &str = "spamguard.db";

const MESSAGE_COLUMNS: &str =
    "id, conversation_id, address, body, timestamp, direction, read, seen, spam_score";

/// SQLite-backed message store. Every successful mutation republishes the
/// full message set to subscribers.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
    path: PathBuf,
    changes: Arc<watch::Sender<Snapshot>>,
    publish_lock: Arc<Mutex<()>>,
}

impl Database {
    pub async fn new_default() -> Result<Self> {
        let base = default_data_dir()?;
        Self::open(&base.join(DB_FILE_NAME)).await
    }

    pub async fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating data directory {}", parent.display()))?;
        }

        let url = format!("sqlite://{}?mode=rwc", db_path.display());
        let pool = SqlitePool::connect(&url)
            .await
            .with_context(|| format!("connecting to sqlite at {}", db_path.display()))?;

        Self::from_pool(pool, db_path.to_path_buf()).await
    }

    /// Private in-memory database. A single connection keeps every query on
    /// the same database.
    pub async fn open_in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .context("opening in-memory sqlite")?;
        Self::from_pool(pool, PathBuf::from(":memory:")).await
    }

    async fn from_pool(pool: SqlitePool, path: PathBuf) -> Result<Self> {
        let (changes, _) = watch::channel(Snapshot::default());
        let db = Database {
            pool,
            path,
            changes: Arc::new(changes),
            publish_lock: Arc::new(Mutex::new(())),
        };
        db.migrate().await?;
        db.publish().await.context("loading initial snapshot")?;
        Ok(db)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY,
                conversation_id INTEGER NOT NULL,
                address TEXT NOT NULL,
                body TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                direction TEXT NOT NULL DEFAULT 'inbound',
                read INTEGER NOT NULL DEFAULT 0,
                seen INTEGER NOT NULL DEFAULT 0,
                spam_score REAL
            );
            CREATE INDEX IF NOT EXISTS idx_messages_conversation ON messages(conversation_id, timestamp);
            CREATE INDEX IF NOT EXISTS idx_messages_unscored ON messages(timestamp DESC) WHERE spam_score IS NULL;
            "#,
        )
        .execute(&self.pool)
        .await
        .context("running migrations")?;
        Ok(())
    }

    /// Reloads the message set and hands it to subscribers. Serialized so a
    /// slow reload can never overwrite a newer one.
    async fn publish(&self) -> StoreResult<()> {
        let _guard = self.publish_lock.lock().await;
        let all = self.load_all().await?;
        debug!(messages = all.len(), "Publishing message snapshot");
        self.changes.send_replace(Arc::new(all));
        Ok(())
    }

    /// Patches one score into the current snapshot. Falls back to a full
    /// reload when the snapshot does not hold the message yet.
    async fn publish_score(&self, id: i64, score: f32) -> StoreResult<()> {
        let _guard = self.publish_lock.lock().await;
        let patched = self.changes.send_if_modified(|snapshot| {
            let Some(pos) = snapshot.iter().position(|m| m.id == id) else {
                return false;
            };
            Arc::make_mut(snapshot)[pos].spam_score = Some(score);
            true
        });
        if patched {
            return Ok(());
        }

        let all = self.load_all().await?;
        debug!(messages = all.len(), "Snapshot missed a scored message; reloaded");
        self.changes.send_replace(Arc::new(all));
        Ok(())
    }

    /// Republishes the current contents, picking up writes made by other
    /// processes sharing the database file.
    pub async fn refresh(&self) -> StoreResult<()> {
        self.publish().await
    }

    pub async fn load_all(&self) -> StoreResult<Vec<Message>> {
        let sql = format!(
            "SELECT {} FROM messages ORDER BY timestamp DESC, id DESC",
            MESSAGE_COLUMNS
        );
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(message_from_row).collect()
    }

    /// Inserts new messages; ids that already exist are left untouched.
    pub async fn insert_messages(&self, messages: &[Message]) -> StoreResult<u64> {
        if messages.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut inserted = 0u64;
        for message in messages {
            let res = sqlx::query(
                r#"
                INSERT OR IGNORE INTO messages (id, conversation_id, address, body, timestamp, direction, read, seen, spam_score)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);
                "#,
            )
            .bind(message.id)
            .bind(message.conversation_id)
            .bind(&message.address)
            .bind(&message.body)
            .bind(message.timestamp)
            .bind(message.direction.as_str())
            .bind(message.read)
            .bind(message.seen)
            .bind(message.spam_score.map(|s| s as f64))
            .execute(&mut *tx)
            .await?;
            inserted += res.rows_affected();
        }
        tx.commit().await?;

        if inserted > 0 {
            self.publish().await?;
        }
        Ok(inserted)
    }

    /// Messages of one conversation, oldest first.
    pub async fn conversation_messages(&self, conversation_id: i64) -> StoreResult<Vec<Message>> {
        let sql = format!(
            "SELECT {} FROM messages WHERE conversation_id = ?1 ORDER BY timestamp ASC, id ASC",
            MESSAGE_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(conversation_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(message_from_row).collect()
    }

    pub async fn mark_conversation_read(&self, conversation_id: i64) -> StoreResult<u64> {
        let res = sqlx::query("UPDATE messages SET read = 1 WHERE conversation_id = ?1 AND read = 0")
            .bind(conversation_id)
            .execute(&self.pool)
            .await?;
        if res.rows_affected() > 0 {
            self.publish().await?;
        }
        Ok(res.rows_affected())
    }

    pub async fn delete_conversations(&self, conversation_ids: &[i64]) -> StoreResult<u64> {
        if conversation_ids.is_empty() {
            return Ok(0);
        }

        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new("DELETE FROM messages WHERE conversation_id IN (");
        {
            let mut separated = qb.separated(", ");
            for id in conversation_ids {
                separated.push_bind(*id);
            }
        }
        qb.push(")");

        let res = qb.build().execute(&self.pool).await?;
        if res.rows_affected() > 0 {
            self.publish().await?;
        }
        Ok(res.rows_affected())
    }
}

#[async_trait]
impl MessageStore for Database {
    async fn fetch_unscored(&self, limit: usize) -> StoreResult<Vec<Message>> {
        self.fetch_unscored_excluding(limit, &HashSet::new()).await
    }

    async fn fetch_unscored_excluding(
        &self,
        limit: usize,
        exclude: &HashSet<i64>,
    ) -> StoreResult<Vec<Message>> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {} FROM messages WHERE spam_score IS NULL",
            MESSAGE_COLUMNS
        ));
        if !exclude.is_empty() {
            qb.push(" AND id NOT IN (");
            {
                let mut separated = qb.separated(", ");
                for id in exclude {
                    separated.push_bind(*id);
                }
            }
            qb.push(")");
        }
        qb.push(" ORDER BY timestamp DESC, id DESC LIMIT ");
        qb.push_bind(limit as i64);

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter().map(message_from_row).collect()
    }

    async fn write_score(&self, id: i64, score: f32) -> StoreResult<bool> {
        let res = sqlx::query("UPDATE messages SET spam_score = ?1 WHERE id = ?2 AND spam_score IS NULL")
            .bind(score as f64)
            .bind(id)
            .execute(&self.pool)
            .await?;
        let written = res.rows_affected() > 0;
        if written {
            self.publish_score(id, score).await?;
        }
        Ok(written)
    }

    async fn read(&self, id: i64) -> StoreResult<Option<Message>> {
        let sql = format!("SELECT {} FROM messages WHERE id = ?1", MESSAGE_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(message_from_row).transpose()
    }

    async fn delete(&self, ids: &[i64]) -> StoreResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("DELETE FROM messages WHERE id IN (");
        {
            let mut separated = qb.separated(", ");
            for id in ids {
                separated.push_bind(*id);
            }
        }
        qb.push(")");

        let res = qb.build().execute(&self.pool).await?;
        if res.rows_affected() > 0 {
            self.publish().await?;
        }
        Ok(res.rows_affected())
    }

    async fn unscored_count(&self) -> StoreResult<u64> {
        let row = sqlx::query("SELECT COUNT(*) FROM messages WHERE spam_score IS NULL")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get::<i64, _>(0)?.max(0) as u64)
    }

    fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.changes.subscribe()
    }
}

fn message_from_row(row: &SqliteRow) -> StoreResult<Message> {
    let direction_raw: String = row.try_get("direction")?;
    let direction = Direction::parse(&direction_raw)
        .ok_or_else(|| StoreError::Corrupt(format!("unknown direction {:?}", direction_raw)))?;

    Ok(Message {
        id: row.try_get("id")?,
        conversation_id: row.try_get("conversation_id")?,
        address: row.try_get("address")?,
        body: row.try_get("body")?,
        timestamp: row.try_get("timestamp")?,
        direction,
        read: row.try_get("read")?,
        seen: row.try_get("seen")?,
        spam_score: row
            .try_get::<Option<f64>, _>("spam_score")?
            .map(|v| v as f32),
    })
}

pub fn default_data_dir() -> Result<PathBuf> {
    if let Ok(custom) = env::var("SPAMGUARD_DATA_DIR") {
        let path = PathBuf::from(custom);
        std::fs::create_dir_all(&path)
            .with_context(|| format!("creating SPAMGUARD_DATA_DIR at {}", path.display()))?;
        return Ok(path);
    }

    if let Some(home) = home_dir() {
        let path = home.join("spamguard");
        if std::fs::create_dir_all(&path).is_ok() {
            return Ok(path);
        } else {
            warn!(
                "Unable to create {}/spamguard; falling back to workspace-local storage",
                home.display()
            );
        }
    }

    let cwd = env::current_dir().context("determining current directory")?;
    let path = cwd.join("spamguard-data");
    std::fs::create_dir_all(&path)
        .with_context(|| format!("creating fallback data directory {}", path.display()))?;
    Ok(path)
}
