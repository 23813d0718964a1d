// Storage module - append-only SQLite log of audit records
//
// Every operation opens its own connection on a blocking thread and drops it
// when done; there is no long-lived handle to share. SQLite's own locking
// serializes writers (BEGIN IMMEDIATE + busy_timeout), which is also what
// keeps `logged_at` non-decreasing in id order.
//
// After a successful append the stored record is broadcast to any UI
// listeners. Broadcasts are fire-and-forget: nobody listening is fine, and a
// listener that falls behind simply misses entries.

use crate::events::{Activity, LogRecord, LogSaved, ReactionType, StoredRecord};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::broadcast;

const SCHEMA_VERSION: i32 = 1;
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("failed to prepare database directory {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("storage task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Handle to the audit log database
pub struct LogStore {
    db_path: PathBuf,
    notify: broadcast::Sender<LogSaved>,
}

impl LogStore {
    /// Create the database (and its directory) if needed and bring the schema up to date
    pub fn open(db_path: impl Into<PathBuf>, notify_buffer: usize) -> Result<Self> {
        let db_path = db_path.into();

        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let conn = connect(&db_path)?;
        init_schema(&conn)?;

        let (notify, _) = broadcast::channel(notify_buffer.max(1));
        tracing::info!("Audit log opened at {:?}", db_path);

        Ok(Self { db_path, notify })
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Receive a `LogSaved` for every append from now on
    pub fn subscribe(&self) -> broadcast::Receiver<LogSaved> {
        self.notify.subscribe()
    }

    /// Persist one record and notify listeners
    ///
    /// A record without `logged_at` gets one assigned here. A preset value is
    /// kept only if it is neither in the future nor earlier than the last
    /// stored record.
    pub async fn append(&self, record: LogRecord) -> Result<StoredRecord> {
        let path = self.db_path.clone();
        let stored = tokio::task::spawn_blocking(move || insert(&path, record)).await??;

        tracing::debug!(
            id = stored.id,
            kind = stored.record.kind(),
            channel = stored.record.channel_id(),
            "Record stored"
        );

        // No receivers is not an error
        let _ = self.notify.send(LogSaved::new(stored.clone()));
        Ok(stored)
    }

    /// All records in insertion order
    pub async fn list_all(&self) -> Result<Vec<StoredRecord>> {
        let path = self.db_path.clone();
        tokio::task::spawn_blocking(move || select_all(&path)).await?
    }
}

fn connect(path: &Path) -> rusqlite::Result<Connection> {
    let conn = Connection::open(path)?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    Ok(conn)
}

fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode=WAL;
        PRAGMA synchronous=NORMAL;

        CREATE TABLE IF NOT EXISTS metadata (
            key TEXT PRIMARY KEY,
            value TEXT
        );
        "#,
    )?;

    let current_version: i32 = conn
        .query_row(
            "SELECT COALESCE(
                (SELECT CAST(value AS INTEGER) FROM metadata WHERE key = 'schema_version'),
                0
            )",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    if current_version < 1 {
        apply_schema_v1(conn)?;
    }

    Ok(())
}

fn apply_schema_v1(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS logs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            app TEXT NOT NULL,
            kind TEXT NOT NULL,
            ts TEXT NOT NULL,
            channel_id TEXT NOT NULL,
            channel_name TEXT,
            text TEXT,
            emoji TEXT,
            reaction_type TEXT,
            user TEXT,
            logged_at TEXT NOT NULL
        );
        "#,
    )?;

    conn.execute(
        "INSERT OR REPLACE INTO metadata (key, value) VALUES ('schema_version', ?1)",
        params![SCHEMA_VERSION.to_string()],
    )?;

    tracing::debug!("Applied audit log schema v{}", SCHEMA_VERSION);
    Ok(())
}

fn format_time(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_time(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// A preset time is capped at `now`, and the result never precedes the last
/// stored row
fn next_logged_at(
    preset: Option<DateTime<Utc>>,
    last: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> DateTime<Utc> {
    let requested = preset.map_or(now, |t| t.min(now));
    match last {
        Some(last) if last > requested => last,
        _ => requested,
    }
}

fn insert(path: &Path, mut record: LogRecord) -> Result<StoredRecord> {
    let mut conn = connect(path)?;
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let last: Option<String> = tx
        .query_row(
            "SELECT logged_at FROM logs ORDER BY id DESC LIMIT 1",
            [],
            |row| row.get(0),
        )
        .optional()?;
    record.logged_at = Some(next_logged_at(
        record.logged_at,
        last.as_deref().and_then(parse_time),
        Utc::now(),
    ));

    let logged_at = record.logged_at.as_ref().map(format_time);

    let (channel_name, text, emoji, reaction_type, user) = match &record.activity {
        Activity::Post {
            channel_name, text, ..
        } => (channel_name.as_deref(), Some(text.as_str()), None, None, None),
        Activity::Reaction {
            channel_name,
            emoji,
            reaction_type,
            text,
            user,
            ..
        } => (
            channel_name.as_deref(),
            text.as_deref(),
            Some(emoji.as_str()),
            Some(reaction_type.as_str()),
            user.as_deref(),
        ),
    };

    tx.execute(
        "INSERT INTO logs (app, kind, ts, channel_id, channel_name, text, emoji, reaction_type, user, logged_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            record.app,
            record.kind(),
            record.timestamp(),
            record.channel_id(),
            channel_name,
            text,
            emoji,
            reaction_type,
            user,
            logged_at,
        ],
    )?;
    let id = tx.last_insert_rowid();
    tx.commit()?;

    Ok(StoredRecord { id, record })
}

/// Raw column values of one `logs` row
struct LogRow {
    id: i64,
    app: String,
    kind: String,
    ts: String,
    channel_id: String,
    channel_name: Option<String>,
    text: Option<String>,
    emoji: Option<String>,
    reaction_type: Option<String>,
    user: Option<String>,
    logged_at: Option<String>,
}

impl LogRow {
    fn into_stored(self) -> Option<StoredRecord> {
        let activity = match self.kind.as_str() {
            "post" => Activity::Post {
                timestamp: self.ts,
                channel_id: self.channel_id,
                channel_name: self.channel_name,
                text: self.text.unwrap_or_default(),
            },
            "reaction" => Activity::Reaction {
                timestamp: self.ts,
                channel_id: self.channel_id,
                channel_name: self.channel_name,
                emoji: self.emoji.unwrap_or_default(),
                reaction_type: ReactionType::from_str(self.reaction_type.as_deref().unwrap_or("")),
                text: self.text,
                user: self.user,
            },
            other => {
                tracing::warn!("Skipping log row {} with unknown kind '{}'", self.id, other);
                return None;
            }
        };

        Some(StoredRecord {
            id: self.id,
            record: LogRecord {
                app: self.app,
                logged_at: self.logged_at.as_deref().and_then(parse_time),
                activity,
            },
        })
    }
}

fn select_all(path: &Path) -> Result<Vec<StoredRecord>> {
    let conn = connect(path)?;
    let mut stmt = conn.prepare(
        "SELECT id, app, kind, ts, channel_id, channel_name, text, emoji, reaction_type, user, logged_at
         FROM logs ORDER BY id ASC",
    )?;

    let rows = stmt.query_map([], |row| {
        Ok(LogRow {
            id: row.get(0)?,
            app: row.get(1)?,
            kind: row.get(2)?,
            ts: row.get(3)?,
            channel_id: row.get(4)?,
            channel_name: row.get(5)?,
            text: row.get(6)?,
            emoji: row.get(7)?,
            reaction_type: row.get(8)?,
            user: row.get(9)?,
            logged_at: row.get(10)?,
        })
    })?;

    let mut records = Vec::new();
    for row in rows {
        if let Some(stored) = row?.into_stored() {
            records.push(stored);
        }
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{Enrichment, PendingEvent};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn open_temp() -> (TempDir, LogStore) {
        let dir = TempDir::new().unwrap();
        let store = LogStore::open(dir.path().join("nested").join("audit.db"), 16).unwrap();
        (dir, store)
    }

    fn post(ts: &str, text: &str) -> LogRecord {
        PendingEvent::Post {
            timestamp: ts.to_string(),
            channel_id: "C1".to_string(),
            text: text.to_string(),
        }
        .finalize(Enrichment {
            channel_name: Some("general".to_string()),
            ..Default::default()
        })
    }

    fn reaction(ts: &str) -> LogRecord {
        PendingEvent::Reaction {
            timestamp: ts.to_string(),
            channel_id: "C1".to_string(),
            emoji: "eyes".to_string(),
            reaction_type: ReactionType::Add,
        }
        .finalize(Enrichment::default())
    }

    #[tokio::test]
    async fn test_two_appends_list_in_order() {
        let (_dir, store) = open_temp();

        let first = store.append(post("100.1", "hello")).await.unwrap();
        let second = store.append(reaction("200.2")).await.unwrap();
        assert_ne!(first.id, second.id);

        let all = store.list_all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0], first);
        assert_eq!(all[1], second);
        assert_eq!(all[0].record.text(), Some("hello"));
        assert_eq!(all[0].record.channel_name(), Some("general"));
    }

    #[tokio::test]
    async fn test_unresolved_reaction_reads_back_without_text_or_user() {
        let (_dir, store) = open_temp();
        store.append(reaction("200.2")).await.unwrap();

        let all = store.list_all().await.unwrap();
        match &all[0].record.activity {
            Activity::Reaction {
                emoji,
                reaction_type,
                text,
                user,
                channel_name,
                ..
            } => {
                assert_eq!(emoji, "eyes");
                assert_eq!(*reaction_type, ReactionType::Add);
                assert!(text.is_none());
                assert!(user.is_none());
                assert!(channel_name.is_none());
            }
            other => panic!("Expected reaction, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_logged_at_assigned_and_non_decreasing() {
        let (_dir, store) = open_temp();
        for i in 0..5 {
            store.append(post(&format!("{}.0", i), "x")).await.unwrap();
        }

        let all = store.list_all().await.unwrap();
        let stamps: Vec<_> = all.iter().map(|r| r.record.logged_at.unwrap()).collect();
        assert!(stamps.windows(2).all(|w| w[0] <= w[1]));
    }

    #[tokio::test]
    async fn test_preset_logged_at_is_kept() {
        let (_dir, store) = open_temp();
        let preset = parse_time("2025-05-05T12:00:00.123456789Z").unwrap();

        let mut record = reaction("300.3");
        record.logged_at = Some(preset);
        let stored = store.append(record).await.unwrap();
        assert_eq!(stored.record.logged_at, Some(preset));

        let all = store.list_all().await.unwrap();
        assert_eq!(all[0].record.logged_at, Some(preset));
    }

    #[tokio::test]
    async fn test_past_preset_does_not_go_backwards() {
        let (_dir, store) = open_temp();
        let first = store.append(post("1.0", "auto")).await.unwrap();

        let mut record = reaction("2.0");
        record.logged_at = parse_time("2020-01-01T00:00:00Z");
        let second = store.append(record).await.unwrap();

        assert_eq!(second.record.logged_at, first.record.logged_at);
        let all = store.list_all().await.unwrap();
        let stamps: Vec<_> = all.iter().map(|r| r.record.logged_at.unwrap()).collect();
        assert!(stamps.windows(2).all(|w| w[0] <= w[1]));
    }

    #[tokio::test]
    async fn test_future_preset_is_capped_at_now() {
        let (_dir, store) = open_temp();

        let mut record = reaction("1.0");
        record.logged_at = parse_time("2999-01-01T00:00:00Z");
        let pushed = store.append(record).await.unwrap();
        let later = store.append(post("2.0", "auto")).await.unwrap();
        let after = Utc::now();

        assert!(pushed.record.logged_at.unwrap() <= after);
        assert!(later.record.logged_at.unwrap() <= after);
        assert!(pushed.record.logged_at <= later.record.logged_at);
    }

    #[test]
    fn test_next_logged_at_rules() {
        let now = parse_time("2026-01-01T00:00:00Z").unwrap();
        let last = parse_time("2025-06-01T00:00:00Z").unwrap();
        let early = parse_time("2025-01-01T00:00:00Z").unwrap();
        let between = parse_time("2025-09-01T00:00:00Z").unwrap();

        assert_eq!(next_logged_at(None, None, now), now);
        assert_eq!(next_logged_at(Some(between), Some(last), now), between);
        assert_eq!(next_logged_at(Some(early), Some(last), now), last);
        // Clock went backwards: stay on the last stored value
        assert_eq!(next_logged_at(None, Some(now), last), now);
    }

    #[tokio::test]
    async fn test_append_notifies_subscribers() {
        let (_dir, store) = open_temp();
        let mut rx = store.subscribe();

        let stored = store.append(post("100.1", "hello")).await.unwrap();
        let saved = rx.recv().await.unwrap();
        assert_eq!(saved.action, "LOG_SAVED");
        assert_eq!(saved.entry, stored);
    }

    #[tokio::test]
    async fn test_append_without_listeners_succeeds() {
        let (_dir, store) = open_temp();
        assert!(store.append(post("1.0", "quiet")).await.is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_appends_get_distinct_ids() {
        let (_dir, store) = open_temp();
        let store = Arc::new(store);

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move { store.append(post(&format!("{}.0", i), "c")).await })
            })
            .collect();

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap().unwrap().id);
        }
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 8);

        let all = store.list_all().await.unwrap();
        assert_eq!(all.len(), 8);
        let stamps: Vec<_> = all.iter().map(|r| r.record.logged_at.unwrap()).collect();
        assert!(stamps.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_schema_is_versioned_without_unused_indexes() {
        let (_dir, store) = open_temp();
        let conn = connect(store.db_path()).unwrap();

        let version: String = conn
            .query_row("SELECT value FROM metadata WHERE key = 'schema_version'", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, SCHEMA_VERSION.to_string());

        let indexes: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'index' AND tbl_name = 'logs' AND sql IS NOT NULL",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(indexes, 0);
    }

    #[tokio::test]
    async fn test_reopen_keeps_records() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("audit.db");

        {
            let store = LogStore::open(&path, 4).unwrap();
            store.append(post("1.0", "persisted")).await.unwrap();
        }

        let store = LogStore::open(&path, 4).unwrap();
        let all = store.list_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].record.text(), Some("persisted"));
    }
}
