//! Store (C1): durable persistence of memories, Hebbian links, and the FTS
//! index, over a single embedded SQLite database.
//!
//! Uses separate reader/writer connections for interior mutability — every
//! method takes `&self`, so [`Store`] is `Send + Sync` and callers may share
//! it behind an `Arc` without an outer lock, the same shape the teacher uses
//! for its `Storage` type.

pub mod migrations;

use crate::config::Config;
use crate::error::{StorageError, StorageResult};
use crate::memory::{Layer, Memory, MemoryType};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;
use uuid::Uuid;

/// A Hebbian link or pre-link counter row.
#[derive(Debug, Clone, PartialEq)]
pub struct HebbianRow {
    /// Source memory id.
    pub source_id: String,
    /// Target memory id.
    pub target_id: String,
    /// Link strength, `None` until the co-activation counter crosses threshold.
    pub strength: Option<f64>,
    /// Number of co-activations observed for this pair.
    pub coactivation_count: i64,
    /// When the row was first created.
    pub created_at: DateTime<Utc>,
}

/// A lexical or vector candidate surfaced during recall.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// Candidate memory id.
    pub id: String,
    /// Cosine similarity for vector candidates, `None` for lexical-only hits.
    pub similarity: Option<f64>,
}

fn configure_connection(conn: &Connection) -> StorageResult<()> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;
         PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = 5000;",
    )?;
    Ok(())
}

/// The embedded relational store.
pub struct Store {
    writer: Mutex<Connection>,
    reader: Mutex<Connection>,
}

impl Store {
    /// Opens (creating if necessary) a database file at `path`.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let writer_conn = Connection::open(path.as_ref())?;
        configure_connection(&writer_conn)?;
        migrations::apply_migrations(&writer_conn)?;

        let reader_conn = Connection::open(path.as_ref())?;
        configure_connection(&reader_conn)?;

        Ok(Self {
            writer: Mutex::new(writer_conn),
            reader: Mutex::new(reader_conn),
        })
    }

    /// Opens an in-memory database — mainly for tests. A plain `:memory:`
    /// connection is private to itself, so the reader and writer instead
    /// share one database via a uniquely-named shared-cache URI.
    pub fn open_in_memory() -> StorageResult<Self> {
        use rusqlite::OpenFlags;

        let name = format!("mnemosyne-{}", Uuid::new_v4());
        let uri = format!("file:{name}?mode=memory&cache=shared");
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;

        let writer_conn = Connection::open_with_flags(&uri, flags)?;
        configure_connection(&writer_conn)?;
        migrations::apply_migrations(&writer_conn)?;

        let reader_conn = Connection::open_with_flags(&uri, flags)?;
        configure_connection(&reader_conn)?;

        Ok(Self {
            writer: Mutex::new(writer_conn),
            reader: Mutex::new(reader_conn),
        })
    }

    fn writer(&self) -> StorageResult<std::sync::MutexGuard<'_, Connection>> {
        self.writer
            .lock()
            .map_err(|_| StorageError::Init("writer lock poisoned".into()))
    }

    fn reader(&self) -> StorageResult<std::sync::MutexGuard<'_, Connection>> {
        self.reader
            .lock()
            .map_err(|_| StorageError::Init("reader lock poisoned".into()))
    }

    // ========================================================================
    // CONFIG
    // ========================================================================

    /// Loads the persisted configuration, seeding defaults on first use.
    pub fn load_config(&self) -> StorageResult<Config> {
        let writer = self.writer()?;
        let existing: Option<Config> = writer
            .query_row(
                "SELECT mu1, mu2, alpha, min_activation, context_weight,
                        working_to_core_threshold, hebbian_enabled, hebbian_threshold,
                        hebbian_decay, hebbian_prune_floor, hebbian_cap
                 FROM config WHERE id = 1",
                [],
                Self::row_to_config,
            )
            .optional()?;

        match existing {
            Some(config) => Ok(config),
            None => {
                let config = Config::default();
                Self::write_config(&writer, &config)?;
                Ok(config)
            }
        }
    }

    /// Persists `config`, replacing whatever was previously stored.
    pub fn save_config(&self, config: &Config) -> StorageResult<()> {
        let writer = self.writer()?;
        Self::write_config(&writer, config)
    }

    fn write_config(conn: &Connection, config: &Config) -> StorageResult<()> {
        conn.execute(
            "INSERT INTO config (
                id, mu1, mu2, alpha, min_activation, context_weight,
                working_to_core_threshold, hebbian_enabled, hebbian_threshold,
                hebbian_decay, hebbian_prune_floor, hebbian_cap
            ) VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ON CONFLICT(id) DO UPDATE SET
                mu1 = excluded.mu1, mu2 = excluded.mu2, alpha = excluded.alpha,
                min_activation = excluded.min_activation,
                context_weight = excluded.context_weight,
                working_to_core_threshold = excluded.working_to_core_threshold,
                hebbian_enabled = excluded.hebbian_enabled,
                hebbian_threshold = excluded.hebbian_threshold,
                hebbian_decay = excluded.hebbian_decay,
                hebbian_prune_floor = excluded.hebbian_prune_floor,
                hebbian_cap = excluded.hebbian_cap",
            params![
                config.mu1,
                config.mu2,
                config.alpha,
                config.min_activation,
                config.context_weight,
                config.working_to_core_threshold,
                config.hebbian_enabled,
                config.hebbian_threshold,
                config.hebbian_decay,
                config.hebbian_prune_floor,
                config.hebbian_cap,
            ],
        )?;
        Ok(())
    }

    fn row_to_config(row: &rusqlite::Row) -> rusqlite::Result<Config> {
        Ok(Config {
            mu1: row.get(0)?,
            mu2: row.get(1)?,
            alpha: row.get(2)?,
            min_activation: row.get(3)?,
            context_weight: row.get(4)?,
            working_to_core_threshold: row.get(5)?,
            hebbian_enabled: row.get(6)?,
            hebbian_threshold: row.get::<_, i64>(7)? as u32,
            hebbian_decay: row.get(8)?,
            hebbian_prune_floor: row.get(9)?,
            hebbian_cap: row.get(10)?,
        })
    }

    // ========================================================================
    // MEMORY CRUD
    // ========================================================================

    /// Inserts a new memory at the working layer. Fails with
    /// [`StorageError::Conflict`] if `contradicts` is set but does not
    /// reference an extant memory.
    #[allow(clippy::too_many_arguments)]
    pub fn add(
        &self,
        content: &str,
        memory_type: MemoryType,
        importance: f64,
        contradicts: Option<&str>,
        embedding: Option<&[f32]>,
        now: DateTime<Utc>,
    ) -> StorageResult<Memory> {
        let id = Uuid::new_v4().to_string();
        let writer = self.writer()?;

        if let Some(target) = contradicts {
            let exists: bool = writer.query_row(
                "SELECT EXISTS(SELECT 1 FROM memories WHERE id = ?1)",
                params![target],
                |row| row.get(0),
            )?;
            if !exists {
                return Err(StorageError::Conflict(format!(
                    "contradicts target {target} does not exist"
                )));
            }
        }

        let embedding_blob = embedding
            .map(|v| serde_json::to_vec(v).expect("f32 vec always serializes"));

        writer.execute(
            "INSERT INTO memories (
                id, content, memory_type, importance, layer, created_at,
                last_accessed_at, access_count, reinforcement, contradicts, embedding
            ) VALUES (?1, ?2, ?3, ?4, 'working', ?5, ?5, 0, 0.0, ?6, ?7)",
            params![
                id,
                content,
                memory_type.as_str(),
                importance,
                now.to_rfc3339(),
                contradicts,
                embedding_blob,
            ],
        )?;

        drop(writer);
        self.get(&id)?.ok_or(StorageError::NotFound(id))
    }

    /// Fetches a memory by id.
    pub fn get(&self, id: &str) -> StorageResult<Option<Memory>> {
        let reader = self.reader()?;
        reader
            .query_row(
                "SELECT id, content, memory_type, importance, layer, created_at,
                        last_accessed_at, access_count, reinforcement, contradicts, embedding
                 FROM memories WHERE id = ?1",
                params![id],
                Self::row_to_memory,
            )
            .optional()
            .map_err(StorageError::from)
    }

    /// Deletes a memory. Cascades to Hebbian links/counters and nulls out any
    /// `contradicts` reference pointing at it. Returns whether a row was removed.
    pub fn delete(&self, id: &str) -> StorageResult<bool> {
        let writer = self.writer()?;
        let rows = writer.execute("DELETE FROM memories WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    /// Applies the on-access mutation from C3: bumps `last_accessed_at`,
    /// `access_count`, and adds `reinforcement_delta` to `reinforcement`
    /// (clamped at zero).
    pub fn update_activation_fields(
        &self,
        id: &str,
        now: DateTime<Utc>,
        reinforcement_delta: f64,
    ) -> StorageResult<()> {
        let writer = self.writer()?;
        let rows = writer.execute(
            "UPDATE memories SET
                last_accessed_at = ?1,
                access_count = access_count + 1,
                reinforcement = MAX(0.0, reinforcement + ?2)
             WHERE id = ?3",
            params![now.to_rfc3339(), reinforcement_delta, id],
        )?;
        if rows == 0 {
            return Err(StorageError::NotFound(id.to_string()));
        }
        Ok(())
    }

    /// Sets `reinforcement` to an absolute value without bumping
    /// `access_count`/`last_accessed_at` — used by promotion and negative
    /// reward, which mutate reinforcement directly rather than incrementally.
    pub fn set_reinforcement(&self, id: &str, reinforcement: f64) -> StorageResult<()> {
        let writer = self.writer()?;
        let rows = writer.execute(
            "UPDATE memories SET reinforcement = ?1 WHERE id = ?2",
            params![reinforcement, id],
        )?;
        if rows == 0 {
            return Err(StorageError::NotFound(id.to_string()));
        }
        Ok(())
    }

    /// Promotes a memory to the core layer and resets `reinforcement` to zero.
    pub fn promote_to_core(&self, id: &str) -> StorageResult<()> {
        let writer = self.writer()?;
        let rows = writer.execute(
            "UPDATE memories SET layer = 'core', reinforcement = 0.0 WHERE id = ?1",
            params![id],
        )?;
        if rows == 0 {
            return Err(StorageError::NotFound(id.to_string()));
        }
        Ok(())
    }

    /// Lists every memory currently in the working layer.
    pub fn working_layer_memories(&self) -> StorageResult<Vec<Memory>> {
        let reader = self.reader()?;
        let mut stmt = reader.prepare(
            "SELECT id, content, memory_type, importance, layer, created_at,
                    last_accessed_at, access_count, reinforcement, contradicts, embedding
             FROM memories WHERE layer = 'working'",
        )?;
        let rows = stmt.query_map([], Self::row_to_memory)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(StorageError::from)
    }

    /// Counts memories per layer, for `stats()`.
    pub fn layer_counts(&self) -> StorageResult<(i64, i64)> {
        let reader = self.reader()?;
        let working: i64 = reader.query_row(
            "SELECT COUNT(*) FROM memories WHERE layer = 'working'",
            [],
            |row| row.get(0),
        )?;
        let core: i64 = reader.query_row(
            "SELECT COUNT(*) FROM memories WHERE layer = 'core'",
            [],
            |row| row.get(0),
        )?;
        Ok((working, core))
    }

    /// Lexical candidate ids via FTS5, ranked by BM25.
    pub fn lexical_candidates(&self, query: &str, limit: usize) -> StorageResult<Vec<String>> {
        let sanitized = sanitize_fts5_query(query);
        if sanitized.is_empty() {
            return Ok(Vec::new());
        }
        let reader = self.reader()?;
        let mut stmt = reader.prepare(
            "SELECT id FROM memories_fts WHERE memories_fts MATCH ?1 ORDER BY bm25(memories_fts) LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![sanitized, limit as i64], |row| row.get::<_, String>(0))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(StorageError::from)
    }

    /// Vector candidates by cosine similarity against every stored embedding.
    /// Absent an index, this is a linear scan — adequate for the engine's
    /// single-process scale; returns empty when no memory carries an embedding.
    pub fn vector_candidates(&self, query_embedding: &[f32], limit: usize) -> StorageResult<Vec<Candidate>> {
        let reader = self.reader()?;
        let mut stmt = reader.prepare("SELECT id, embedding FROM memories WHERE embedding IS NOT NULL")?;
        let rows = stmt.query_map([], |row| {
            let id: String = row.get(0)?;
            let blob: Vec<u8> = row.get(1)?;
            Ok((id, blob))
        })?;

        let mut scored: Vec<Candidate> = Vec::new();
        for row in rows {
            let (id, blob) = row?;
            let Ok(vector) = serde_json::from_slice::<Vec<f32>>(&blob) else {
                continue;
            };
            if let Some(sim) = cosine_similarity(query_embedding, &vector) {
                scored.push(Candidate { id, similarity: Some(sim) });
            }
        }
        scored.sort_by(|a, b| b.similarity.partial_cmp(&a.similarity).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);
        Ok(scored)
    }

    /// Dimensionality of the first stored embedding, if any memory carries
    /// one. Used to reject a mismatched embedding on `add` (spec §3.1: "if
    /// `embedding` is set, its dimensionality matches a store-wide constant
    /// fixed at first write").
    pub fn embedding_dimension(&self) -> StorageResult<Option<usize>> {
        let reader = self.reader()?;
        let blob: Option<Vec<u8>> = reader
            .query_row(
                "SELECT embedding FROM memories WHERE embedding IS NOT NULL LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;
        Ok(blob.and_then(|b| serde_json::from_slice::<Vec<f32>>(&b).ok()).map(|v| v.len()))
    }

    fn row_to_memory(row: &rusqlite::Row) -> rusqlite::Result<Memory> {
        let memory_type_str: String = row.get(2)?;
        let layer_str: String = row.get(4)?;
        let embedding_blob: Option<Vec<u8>> = row.get(10)?;
        Ok(Memory {
            id: row.get(0)?,
            content: row.get(1)?,
            memory_type: MemoryType::parse(&memory_type_str).unwrap_or(MemoryType::Factual),
            importance: row.get(3)?,
            layer: Layer::parse(&layer_str).unwrap_or(Layer::Working),
            created_at: parse_timestamp(&row.get::<_, String>(5)?)?,
            last_accessed_at: parse_timestamp(&row.get::<_, String>(6)?)?,
            access_count: row.get(7)?,
            reinforcement: row.get(8)?,
            contradicts: row.get(9)?,
            embedding: embedding_blob.and_then(|b| serde_json::from_slice(&b).ok()),
        })
    }

    // ========================================================================
    // HEBBIAN CRUD (C5) — see `crate::hebbian` for the algorithms that call these.
    // ========================================================================

    /// Fetches the row for an ordered `(source, target)` pair, if one exists
    /// in either direction (the table stores both directions separately).
    pub fn hebbian_row(&self, source_id: &str, target_id: &str) -> StorageResult<Option<HebbianRow>> {
        let reader = self.reader()?;
        reader
            .query_row(
                "SELECT source_id, target_id, strength, coactivation_count, created_at
                 FROM hebbian_links WHERE source_id = ?1 AND target_id = ?2",
                params![source_id, target_id],
                Self::row_to_hebbian,
            )
            .optional()
            .map_err(StorageError::from)
    }

    /// Inserts or updates one direction of a pair's counter/link row.
    pub fn upsert_hebbian_row(&self, row: &HebbianRow) -> StorageResult<()> {
        let writer = self.writer()?;
        writer.execute(
            "INSERT INTO hebbian_links (source_id, target_id, strength, coactivation_count, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(source_id, target_id) DO UPDATE SET
                strength = excluded.strength,
                coactivation_count = excluded.coactivation_count",
            params![
                row.source_id,
                row.target_id,
                row.strength,
                row.coactivation_count,
                row.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Neighbors of `id` with `strength >= floor` (NULL/unlinked rows excluded).
    pub fn hebbian_neighbors(&self, id: &str, floor: f64) -> StorageResult<Vec<(String, f64)>> {
        let reader = self.reader()?;
        let mut stmt = reader.prepare(
            "SELECT target_id, strength FROM hebbian_links
             WHERE source_id = ?1 AND strength IS NOT NULL AND strength >= ?2",
        )?;
        let rows = stmt.query_map(params![id, floor], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?))
        })?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(StorageError::from)
    }

    /// All rows that represent a materialized link (`strength IS NOT NULL`).
    pub fn all_hebbian_links(&self) -> StorageResult<Vec<HebbianRow>> {
        let reader = self.reader()?;
        let mut stmt = reader.prepare(
            "SELECT source_id, target_id, strength, coactivation_count, created_at
             FROM hebbian_links WHERE strength IS NOT NULL",
        )?;
        let rows = stmt.query_map([], Self::row_to_hebbian)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(StorageError::from)
    }

    /// Multiplies every link's strength by `factor`, then deletes rows (in
    /// both directions) whose strength falls below `prune_floor`. Returns the
    /// number of link rows deleted.
    pub fn decay_and_prune_links(&self, factor: f64, prune_floor: f64) -> StorageResult<i64> {
        let writer = self.writer()?;
        writer.execute(
            "UPDATE hebbian_links SET strength = strength * ?1 WHERE strength IS NOT NULL",
            params![factor],
        )?;
        let deleted = writer.execute(
            "DELETE FROM hebbian_links WHERE strength IS NOT NULL AND strength < ?1",
            params![prune_floor],
        )?;
        Ok(deleted as i64)
    }

    fn row_to_hebbian(row: &rusqlite::Row) -> rusqlite::Result<HebbianRow> {
        Ok(HebbianRow {
            source_id: row.get(0)?,
            target_id: row.get(1)?,
            strength: row.get(2)?,
            coactivation_count: row.get(3)?,
            created_at: parse_timestamp(&row.get::<_, String>(4)?)?,
        })
    }
}

fn parse_timestamp(value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })
}

/// Strips FTS5 special characters so arbitrary content can't break a MATCH
/// query; wraps each remaining token in double quotes for a literal match.
pub fn sanitize_fts5_query(query: &str) -> String {
    query
        .split_whitespace()
        .map(|tok| {
            let cleaned: String = tok.chars().filter(|c| c.is_alphanumeric()).collect();
            cleaned
        })
        .filter(|tok| !tok.is_empty())
        .map(|tok| format!("\"{tok}\""))
        .collect::<Vec<_>>()
        .join(" OR ")
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f64> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }
    let dot: f64 = a.iter().zip(b).map(|(x, y)| *x as f64 * *y as f64).sum();
    let norm_a: f64 = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return None;
    }
    Some(dot / (norm_a * norm_b))
}
