//! Database Migrations
//!
//! Schema migration definitions for the SQLite store.

/// Migration definitions
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "Initial schema: card catalog and review records",
        up: MIGRATION_V1_UP,
    },
    Migration {
        version: 2,
        description: "Due-queue and deck indexes",
        up: MIGRATION_V2_UP,
    },
];

/// A database migration
#[derive(Debug, Clone)]
pub struct Migration {
    /// Version number
    pub version: u32,
    /// Description
    pub description: &'static str,
    /// SQL to apply
    pub up: &'static str,
}

/// V1: Initial schema
const MIGRATION_V1_UP: &str = r#"
CREATE TABLE IF NOT EXISTS cards (
    id TEXT PRIMARY KEY,
    deck TEXT,
    created_at TEXT NOT NULL
);

-- One scheduling record per card; state codes 0 new, 1 learning, 2 review, 3 relearning
CREATE TABLE IF NOT EXISTS card_reviews (
    card_id TEXT PRIMARY KEY REFERENCES cards(id) ON DELETE CASCADE,
    state INTEGER NOT NULL,
    step INTEGER,
    stability REAL NOT NULL,
    difficulty REAL NOT NULL,
    due TEXT NOT NULL,
    last_review TEXT,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL
);

INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (1, datetime('now'));
"#;

/// V2: Indexes for the due queue
const MIGRATION_V2_UP: &str = r#"
CREATE INDEX IF NOT EXISTS idx_card_reviews_due ON card_reviews(due);
CREATE INDEX IF NOT EXISTS idx_card_reviews_state ON card_reviews(state);
CREATE INDEX IF NOT EXISTS idx_cards_deck ON cards(deck);

UPDATE schema_version SET version = 2, applied_at = datetime('now');
"#;

/// Get current schema version from database
pub fn get_current_version(conn: &rusqlite::Connection) -> rusqlite::Result<u32> {
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )
    .or(Ok(0))
}

/// Apply pending migrations
pub fn apply_migrations(conn: &rusqlite::Connection) -> rusqlite::Result<u32> {
    let current_version = get_current_version(conn)?;
    let mut applied = 0;

    for migration in MIGRATIONS {
        if migration.version > current_version {
            tracing::info!(
                "Applying migration v{}: {}",
                migration.version,
                migration.description
            );

            conn.execute_batch(migration.up)?;
            applied += 1;
        }
    }

    Ok(applied)
}
