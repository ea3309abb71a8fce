//! SQLite Storage Implementation
//!
//! Card catalog and review records in one database file.

use chrono::{DateTime, SecondsFormat, Utc};
use directories::ProjectDirs;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::PathBuf;
use std::sync::Mutex;

use super::{CardCatalog, Result, ReviewStore, StorageError};
use crate::memory::{CardId, CardMemoryState, LearningState, ReviewStats};

const SELECT_STATE: &str =
    "SELECT card_id, state, step, stability, difficulty, due, last_review FROM card_reviews";

// ============================================================================
// ROW DECODING
// ============================================================================

// Raw column values; the learning state is checked after the row is read
struct StoredRow {
    card_id: String,
    state: i64,
    step: Option<i64>,
    stability: f64,
    difficulty: f64,
    due: DateTime<Utc>,
    last_review: Option<DateTime<Utc>>,
}

impl StoredRow {
    fn into_state(self) -> Result<CardMemoryState> {
        let card_id = CardId::from(self.card_id);
        let state = LearningState::from_parts(self.state, self.step)
            .map_err(|source| StorageError::InvalidState {
                card_id: card_id.clone(),
                source,
            })?;

        Ok(CardMemoryState {
            card_id,
            state,
            stability: self.stability,
            difficulty: self.difficulty,
            due: self.due,
            last_review: self.last_review,
        })
    }
}

/// Fixed-width UTC timestamps so text order matches time order
fn format_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

// ============================================================================
// STORAGE
// ============================================================================

/// SQLite-backed review store and card catalog
///
/// Uses separate reader/writer connections for interior mutability.
/// All methods take `&self`, making the store `Send + Sync` so it can be
/// shared as `Arc<SqliteStore>`.
pub struct SqliteStore {
    writer: Mutex<Connection>,
    reader: Mutex<Connection>,
}

impl SqliteStore {
    /// Apply PRAGMAs to a connection
    fn configure_connection(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA cache_size = -16000;
             PRAGMA temp_store = MEMORY;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;
             PRAGMA journal_size_limit = 67108864;",
        )?;

        Ok(())
    }

    /// Open (or create) the database; `None` uses the per-user data directory
    pub fn new(db_path: Option<PathBuf>) -> Result<Self> {
        let path = match db_path {
            Some(p) => p,
            None => {
                let proj_dirs = ProjectDirs::from("com", "cadence", "core").ok_or_else(|| {
                    StorageError::Init("Could not determine project directories".to_string())
                })?;

                let data_dir = proj_dirs.data_dir();
                std::fs::create_dir_all(data_dir)?;
                // Restrict directory permissions to owner-only on Unix
                #[cfg(unix)]
                {
                    use std::os::unix::fs::PermissionsExt;
                    let perms = std::fs::Permissions::from_mode(0o700);
                    let _ = std::fs::set_permissions(data_dir, perms);
                }
                data_dir.join("cadence.db")
            }
        };

        let writer_conn = Connection::open(&path)?;

        // Restrict database file permissions to owner-only on Unix
        #[cfg(unix)]
        if path.exists() {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            let _ = std::fs::set_permissions(&path, perms);
        }

        Self::configure_connection(&writer_conn)?;

        // Apply migrations on writer only
        super::migrations::apply_migrations(&writer_conn)?;

        let reader_conn = Connection::open(&path)?;
        Self::configure_connection(&reader_conn)?;

        Ok(Self {
            writer: Mutex::new(writer_conn),
            reader: Mutex::new(reader_conn),
        })
    }

    /// Parse RFC3339 timestamp
    fn parse_timestamp(value: &str, field_name: &str) -> rusqlite::Result<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(value)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    0,
                    rusqlite::types::Type::Text,
                    Box::new(std::io::Error::new(
                        std::io::ErrorKind::InvalidData,
                        format!("Invalid {} timestamp '{}': {}", field_name, value, e),
                    )),
                )
            })
    }

    fn read_row(row: &rusqlite::Row) -> rusqlite::Result<StoredRow> {
        let due: String = row.get("due")?;
        let last_review: Option<String> = row.get("last_review")?;

        Ok(StoredRow {
            card_id: row.get("card_id")?,
            state: row.get("state")?,
            step: row.get("step")?,
            stability: row.get("stability")?,
            difficulty: row.get("difficulty")?,
            due: Self::parse_timestamp(&due, "due")?,
            last_review: last_review
                .map(|s| Self::parse_timestamp(&s, "last_review"))
                .transpose()?,
        })
    }

    // ========================================================================
    // CATALOG
    // ========================================================================

    /// Create a card with a fresh UUID v4 id
    pub fn create_card(&self, deck: Option<&str>) -> Result<CardId> {
        let id = CardId::generate();
        self.register_card(&id, deck)?;
        Ok(id)
    }

    /// Register an externally identified card; returns false if it already existed
    pub fn register_card(&self, card_id: &CardId, deck: Option<&str>) -> Result<bool> {
        let writer = self.writer.lock()
            .map_err(|_| StorageError::Init("Writer lock poisoned".into()))?;
        let rows = writer.execute(
            "INSERT OR IGNORE INTO cards (id, deck, created_at) VALUES (?1, ?2, ?3)",
            params![card_id.as_str(), deck, format_timestamp(Utc::now())],
        )?;
        Ok(rows > 0)
    }

    /// Delete a card; its review record goes with it
    pub fn delete_card(&self, card_id: &CardId) -> Result<bool> {
        let writer = self.writer.lock()
            .map_err(|_| StorageError::Init("Writer lock poisoned".into()))?;
        let rows = writer.execute("DELETE FROM cards WHERE id = ?1", params![card_id.as_str()])?;
        Ok(rows > 0)
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    /// Due states restricted to one deck
    pub fn due_in_deck(
        &self,
        deck: &str,
        now: DateTime<Utc>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<CardMemoryState>> {
        let reader = self.reader.lock()
            .map_err(|_| StorageError::Init("Reader lock poisoned".into()))?;
        let mut stmt = reader.prepare(
            "SELECT r.card_id, r.state, r.step, r.stability, r.difficulty, r.due, r.last_review
             FROM card_reviews r JOIN cards c ON c.id = r.card_id
             WHERE c.deck = ?1 AND r.due <= ?2
             ORDER BY r.due ASC, r.card_id ASC
             LIMIT ?3 OFFSET ?4",
        )?;

        let rows = stmt.query_map(
            params![deck, format_timestamp(now), to_sql_count(limit), to_sql_count(offset)],
            |row| Self::read_row(row),
        )?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row?.into_state()?);
        }
        Ok(result)
    }

    /// Number of stored review records
    pub fn count(&self) -> Result<i64> {
        let reader = self.reader.lock()
            .map_err(|_| StorageError::Init("Reader lock poisoned".into()))?;
        Ok(reader.query_row("SELECT COUNT(*) FROM card_reviews", [], |row| row.get(0))?)
    }

    pub fn stats(&self, now: DateTime<Utc>) -> Result<ReviewStats> {
        let reader = self.reader.lock()
            .map_err(|_| StorageError::Init("Reader lock poisoned".into()))?;

        let total_cards: i64 =
            reader.query_row("SELECT COUNT(*) FROM cards", [], |row| row.get(0))?;

        let due_now: i64 = reader.query_row(
            "SELECT COUNT(*) FROM card_reviews WHERE due <= ?1",
            params![format_timestamp(now)],
            |row| row.get(0),
        )?;

        let mut stats = ReviewStats {
            total_cards,
            due_now,
            ..Default::default()
        };

        let mut stmt = reader.prepare("SELECT state, COUNT(*) FROM card_reviews GROUP BY state")?;
        let counts = stmt.query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)))?;
        for count in counts {
            match count? {
                (1, n) => stats.learning = n,
                (2, n) => stats.review = n,
                (3, n) => stats.relearning = n,
                _ => {}
            }
        }

        Ok(stats)
    }
}

fn to_sql_count(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

// ============================================================================
// CONTRACT IMPLEMENTATIONS
// ============================================================================

impl ReviewStore for SqliteStore {
    fn get(&self, card_id: &CardId) -> Result<Option<CardMemoryState>> {
        let reader = self.reader.lock()
            .map_err(|_| StorageError::Init("Reader lock poisoned".into()))?;
        let mut stmt = reader.prepare(&format!("{} WHERE card_id = ?1", SELECT_STATE))?;

        let row = stmt
            .query_row(params![card_id.as_str()], |row| Self::read_row(row))
            .optional()?;
        row.map(StoredRow::into_state).transpose()
    }

    fn upsert(&self, card_id: &CardId, state: &CardMemoryState) -> Result<()> {
        let writer = self.writer.lock()
            .map_err(|_| StorageError::Init("Writer lock poisoned".into()))?;
        writer.execute(
            "INSERT INTO card_reviews
                (card_id, state, step, stability, difficulty, due, last_review, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(card_id) DO UPDATE SET
                state = excluded.state,
                step = excluded.step,
                stability = excluded.stability,
                difficulty = excluded.difficulty,
                due = excluded.due,
                last_review = excluded.last_review,
                updated_at = excluded.updated_at",
            params![
                card_id.as_str(),
                state.state.code(),
                state.state.step().map(i64::from),
                state.stability,
                state.difficulty,
                format_timestamp(state.due),
                state.last_review.map(format_timestamp),
                format_timestamp(Utc::now()),
            ],
        )?;
        Ok(())
    }

    fn due(&self, now: DateTime<Utc>, limit: usize, offset: usize) -> Result<Vec<CardMemoryState>> {
        let reader = self.reader.lock()
            .map_err(|_| StorageError::Init("Reader lock poisoned".into()))?;
        let mut stmt = reader.prepare(&format!(
            "{} WHERE due <= ?1 ORDER BY due ASC, card_id ASC LIMIT ?2 OFFSET ?3",
            SELECT_STATE
        ))?;

        let rows = stmt.query_map(
            params![format_timestamp(now), to_sql_count(limit), to_sql_count(offset)],
            |row| Self::read_row(row),
        )?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row?.into_state()?);
        }
        Ok(result)
    }
}

impl CardCatalog for SqliteStore {
    fn contains_card(&self, card_id: &CardId) -> Result<bool> {
        let reader = self.reader.lock()
            .map_err(|_| StorageError::Init("Reader lock poisoned".into()))?;
        let found: Option<i64> = reader
            .query_row(
                "SELECT 1 FROM cards WHERE id = ?1",
                params![card_id.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }
}
