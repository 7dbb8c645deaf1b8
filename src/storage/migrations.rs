//! Database migrations.
//!
//! Schema evolves through an ordered list of forward-only migrations rather
//! than a single monolithic `CREATE TABLE` script, so an on-disk database can
//! be upgraded in place as the schema grows.

/// Migration definitions, applied in order.
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "Initial schema: memories, FTS index, Hebbian links, config",
        up: MIGRATION_V1_UP,
    },
];

/// A single database migration.
#[derive(Debug, Clone)]
pub struct Migration {
    /// Monotonically increasing version number.
    pub version: u32,
    /// Human-readable description, logged when applied.
    pub description: &'static str,
    /// SQL executed to bring the schema to this version.
    pub up: &'static str,
}

const MIGRATION_V1_UP: &str = r#"
CREATE TABLE IF NOT EXISTS memories (
    id TEXT PRIMARY KEY,
    content TEXT NOT NULL,
    memory_type TEXT NOT NULL,
    importance REAL NOT NULL,
    layer TEXT NOT NULL DEFAULT 'working',
    created_at TEXT NOT NULL,
    last_accessed_at TEXT NOT NULL,
    access_count INTEGER NOT NULL DEFAULT 0,
    reinforcement REAL NOT NULL DEFAULT 0.0,
    contradicts TEXT REFERENCES memories(id) ON DELETE SET NULL,
    embedding BLOB
);

CREATE INDEX IF NOT EXISTS idx_memories_layer ON memories(layer);
CREATE INDEX IF NOT EXISTS idx_memories_last_accessed ON memories(last_accessed_at);
CREATE INDEX IF NOT EXISTS idx_memories_contradicts ON memories(contradicts);

-- FTS5 virtual table mirroring `content`, kept in sync via triggers.
CREATE VIRTUAL TABLE IF NOT EXISTS memories_fts USING fts5(
    id,
    content,
    content='memories',
    content_rowid='rowid'
);

CREATE TRIGGER IF NOT EXISTS memories_ai AFTER INSERT ON memories BEGIN
    INSERT INTO memories_fts(rowid, id, content) VALUES (NEW.rowid, NEW.id, NEW.content);
END;

CREATE TRIGGER IF NOT EXISTS memories_ad AFTER DELETE ON memories BEGIN
    INSERT INTO memories_fts(memories_fts, rowid, id, content)
    VALUES ('delete', OLD.rowid, OLD.id, OLD.content);
END;

CREATE TRIGGER IF NOT EXISTS memories_au AFTER UPDATE ON memories BEGIN
    INSERT INTO memories_fts(memories_fts, rowid, id, content)
    VALUES ('delete', OLD.rowid, OLD.id, OLD.content);
    INSERT INTO memories_fts(rowid, id, content) VALUES (NEW.rowid, NEW.id, NEW.content);
END;

-- Hebbian links and their pre-link co-activation counters. A row with
-- strength IS NULL represents a counter that has not yet crossed threshold;
-- once it does, strength is set and the row also becomes a live link.
CREATE TABLE IF NOT EXISTS hebbian_links (
    source_id TEXT NOT NULL,
    target_id TEXT NOT NULL,
    strength REAL,
    coactivation_count INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    PRIMARY KEY (source_id, target_id),
    FOREIGN KEY (source_id) REFERENCES memories(id) ON DELETE CASCADE,
    FOREIGN KEY (target_id) REFERENCES memories(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_hebbian_source ON hebbian_links(source_id);
CREATE INDEX IF NOT EXISTS idx_hebbian_target ON hebbian_links(target_id);
CREATE INDEX IF NOT EXISTS idx_hebbian_strength ON hebbian_links(strength);

-- Single-row table holding the runtime-mutable configuration.
CREATE TABLE IF NOT EXISTS config (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    mu1 REAL NOT NULL,
    mu2 REAL NOT NULL,
    alpha REAL NOT NULL,
    min_activation REAL NOT NULL,
    context_weight REAL NOT NULL,
    working_to_core_threshold REAL NOT NULL,
    hebbian_enabled INTEGER NOT NULL,
    hebbian_threshold INTEGER NOT NULL,
    hebbian_decay REAL NOT NULL,
    hebbian_prune_floor REAL NOT NULL,
    hebbian_cap REAL NOT NULL
);

CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL
);

INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (1, datetime('now'));
"#;

/// Reads the highest applied migration version, `0` if none have run.
pub fn get_current_version(conn: &rusqlite::Connection) -> rusqlite::Result<u32> {
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )
    .or(Ok(0))
}

/// Applies every migration newer than the current schema version, in order.
/// Returns the number of migrations applied.
pub fn apply_migrations(conn: &rusqlite::Connection) -> rusqlite::Result<u32> {
    let current_version = get_current_version(conn)?;
    let mut applied = 0;

    for migration in MIGRATIONS {
        if migration.version > current_version {
            tracing::info!(
                version = migration.version,
                description = migration.description,
                "applying migration"
            );
            conn.execute_batch(migration.up)?;
            applied += 1;
        }
    }

    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn applies_fresh_database_to_latest_version() {
        let conn = Connection::open_in_memory().unwrap();
        let applied = apply_migrations(&conn).unwrap();
        assert_eq!(applied, MIGRATIONS.len() as u32);
        assert_eq!(get_current_version(&conn).unwrap(), MIGRATIONS.last().unwrap().version);
    }

    #[test]
    fn second_call_is_a_no_op() {
        let conn = Connection::open_in_memory().unwrap();
        apply_migrations(&conn).unwrap();
        let applied_again = apply_migrations(&conn).unwrap();
        assert_eq!(applied_again, 0);
    }
}
