//! SQLite persistence layer.
//!
//! One database holds every local table of the memory subsystem:
//!
//! | table             | key                  | contents                                  |
//! |-------------------|----------------------|-------------------------------------------|
//! | `chambers`        | `id`                 | name, creation time                       |
//! | `participants`    | `(chamber_id, position)` | persona name and its encoded key      |
//! | `memory_records`  | `id`                 | ciphertext plus authorship and node link  |
//! | `memory_metadata` | `id` (unique chamber) | tier, status, importance, access stats  |
//! | `synaptic_nodes`  | `id`                 | layer, scope, keyword fingerprint, state  |
//! | `synaptic_edges`  | `(low, high)`        | one row per undirected edge               |
//!
//! Timestamps are stored as fixed-width RFC-3339 strings (microseconds, `Z`)
//! so lexical order equals chronological order.

use std::collections::BTreeSet;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use engram_types::{
    Chamber, ConsolidationStatus, CorticalLayer, MemoryMetadata, MemoryRecord, MemoryTier,
    NodeState, Persona, SynapticNode,
};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::debug;
use uuid::Uuid;

use crate::error::MemoryError;

type Result<T> = std::result::Result<T, MemoryError>;

// ─────────────────────────────────────────────────────────────────────────────
// Column helpers
// ─────────────────────────────────────────────────────────────────────────────

pub(crate) fn timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn conversion<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn uuid_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw).map_err(|e| conversion(idx, e))
}

fn opt_uuid_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Uuid>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| Uuid::parse_str(&s).map_err(|e| conversion(idx, e)))
        .transpose()
}

fn time_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    raw.parse::<DateTime<Utc>>().map_err(|e| conversion(idx, e))
}

fn parsed_at<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse::<T>().map_err(|e| conversion(idx, e))
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<MemoryRecord> {
    let content_length: i64 = row.get(6)?;
    Ok(MemoryRecord {
        id: uuid_at(row, 0)?,
        chamber_id: uuid_at(row, 1)?,
        is_user: row.get(2)?,
        persona: row.get(3)?,
        created_at: time_at(row, 4)?,
        ciphertext: row.get(5)?,
        content_length: content_length.max(0) as usize,
        node_id: opt_uuid_at(row, 7)?,
    })
}

fn metadata_from_row(row: &Row<'_>) -> rusqlite::Result<MemoryMetadata> {
    let access_count: i64 = row.get(5)?;
    Ok(MemoryMetadata {
        id: uuid_at(row, 0)?,
        chamber_id: uuid_at(row, 1)?,
        tier: parsed_at::<MemoryTier>(row, 2)?,
        status: parsed_at::<ConsolidationStatus>(row, 3)?,
        importance: row.get(4)?,
        access_count: access_count.max(0) as u64,
        created_at: time_at(row, 6)?,
        last_accessed_at: time_at(row, 7)?,
    })
}

fn node_from_row(row: &Row<'_>) -> rusqlite::Result<SynapticNode> {
    let layer: u8 = row.get(1)?;
    let fingerprint: String = row.get(4)?;
    Ok(SynapticNode {
        id: uuid_at(row, 0)?,
        layer: CorticalLayer::new(layer).map_err(|e| conversion(1, e))?,
        scope: opt_uuid_at(row, 2)?,
        content_ref: row.get(3)?,
        fingerprint: fingerprint
            .split(',')
            .filter(|d| !d.is_empty())
            .map(str::to_string)
            .collect(),
        state: parsed_at::<NodeState>(row, 5)?,
        created_at: time_at(row, 6)?,
        neighbors: BTreeSet::new(),
    })
}

const RECORD_COLUMNS: &str =
    "id, chamber_id, is_user, persona, created_at, ciphertext, content_length, node_id";
const METADATA_COLUMNS: &str =
    "id, chamber_id, tier, status, importance, access_count, created_at, last_accessed_at";
const NODE_COLUMNS: &str = "id, layer, scope, content_ref, fingerprint, state, created_at";

/// Order an undirected edge so each pair has exactly one key.
fn edge_key(a: Uuid, b: Uuid) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// SqliteStore
// ─────────────────────────────────────────────────────────────────────────────

/// SQLite-backed local store for chambers, records, metadata and the graph.
///
/// The connection sits behind a mutex so the store can be shared across
/// tasks; every method is a short synchronous critical section.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a persistent SQLite database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Open a temporary in-memory database (useful for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    pub(crate) fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn init_schema(&self) -> Result<()> {
        self.conn().execute_batch(
            "PRAGMA foreign_keys = ON;
             CREATE TABLE IF NOT EXISTS chambers (
                id         TEXT NOT NULL PRIMARY KEY,
                name       TEXT NOT NULL,
                created_at TEXT NOT NULL
             );
             CREATE TABLE IF NOT EXISTS participants (
                chamber_id TEXT NOT NULL REFERENCES chambers(id) ON DELETE CASCADE,
                position   INTEGER NOT NULL,
                name       TEXT NOT NULL,
                key        TEXT NOT NULL,
                PRIMARY KEY (chamber_id, position)
             );
             CREATE TABLE IF NOT EXISTS memory_records (
                id             TEXT NOT NULL PRIMARY KEY,
                chamber_id     TEXT NOT NULL REFERENCES chambers(id) ON DELETE CASCADE,
                is_user        INTEGER NOT NULL,
                persona        TEXT,
                created_at     TEXT NOT NULL,
                ciphertext     BLOB NOT NULL,
                content_length INTEGER NOT NULL,
                node_id        TEXT
             );
             CREATE INDEX IF NOT EXISTS idx_records_chamber
                ON memory_records (chamber_id, created_at);
             CREATE INDEX IF NOT EXISTS idx_records_node ON memory_records (node_id);
             CREATE TABLE IF NOT EXISTS memory_metadata (
                id               TEXT NOT NULL PRIMARY KEY,
                chamber_id       TEXT NOT NULL UNIQUE REFERENCES chambers(id) ON DELETE CASCADE,
                tier             TEXT NOT NULL,
                status           TEXT NOT NULL,
                importance       REAL NOT NULL,
                access_count     INTEGER NOT NULL,
                created_at       TEXT NOT NULL,
                last_accessed_at TEXT NOT NULL
             );
             CREATE INDEX IF NOT EXISTS idx_metadata_tier_status
                ON memory_metadata (tier, status);
             CREATE INDEX IF NOT EXISTS idx_metadata_chamber ON memory_metadata (chamber_id);
             CREATE TABLE IF NOT EXISTS synaptic_nodes (
                id          TEXT NOT NULL PRIMARY KEY,
                layer       INTEGER NOT NULL,
                scope       TEXT,
                content_ref TEXT NOT NULL,
                fingerprint TEXT NOT NULL,
                state       TEXT NOT NULL,
                created_at  TEXT NOT NULL
             );
             CREATE INDEX IF NOT EXISTS idx_nodes_scope ON synaptic_nodes (scope, created_at);
             CREATE TABLE IF NOT EXISTS synaptic_edges (
                low        TEXT NOT NULL,
                high       TEXT NOT NULL,
                created_at TEXT NOT NULL,
                PRIMARY KEY (low, high)
             );
             CREATE INDEX IF NOT EXISTS idx_edges_high ON synaptic_edges (high);",
        )?;
        Ok(())
    }

    // ── Chambers ────────────────────────────────────────────────────────────

    /// Persist a new chamber, its roster and its metadata atomically.
    pub fn insert_chamber(&self, chamber: &Chamber, metadata: &MemoryMetadata) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO chambers (id, name, created_at) VALUES (?1, ?2, ?3)",
            params![
                chamber.id.to_string(),
                chamber.name,
                timestamp(chamber.created_at)
            ],
        )?;
        for (position, persona) in chamber.participants.iter().enumerate() {
            tx.execute(
                "INSERT INTO participants (chamber_id, position, name, key)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    chamber.id.to_string(),
                    position as i64,
                    persona.name,
                    persona.key
                ],
            )?;
        }
        insert_metadata(&tx, metadata)?;
        tx.commit()?;
        Ok(())
    }

    fn participants(conn: &Connection, chamber_id: Uuid) -> rusqlite::Result<Vec<Persona>> {
        let mut stmt = conn.prepare(
            "SELECT name, key FROM participants WHERE chamber_id = ?1 ORDER BY position ASC",
        )?;
        let rows = stmt.query_map([chamber_id.to_string()], |row| {
            Ok(Persona {
                name: row.get(0)?,
                key: row.get(1)?,
            })
        })?;
        rows.collect()
    }

    pub fn get_chamber(&self, id: Uuid) -> Result<Option<Chamber>> {
        let conn = self.conn();
        let head = conn
            .query_row(
                "SELECT id, name, created_at FROM chambers WHERE id = ?1",
                [id.to_string()],
                |row| Ok((uuid_at(row, 0)?, row.get::<_, String>(1)?, time_at(row, 2)?)),
            )
            .optional()?;
        let Some((id, name, created_at)) = head else {
            return Ok(None);
        };
        let participants = Self::participants(&conn, id)?;
        Ok(Some(Chamber {
            id,
            name,
            participants,
            created_at,
        }))
    }

    /// Every chamber, oldest first.
    pub fn list_chambers(&self) -> Result<Vec<Chamber>> {
        let conn = self.conn();
        let heads = {
            let mut stmt = conn.prepare(
                "SELECT id, name, created_at FROM chambers ORDER BY created_at ASC, id ASC",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok((uuid_at(row, 0)?, row.get::<_, String>(1)?, time_at(row, 2)?))
            })?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        };
        let mut chambers = Vec::with_capacity(heads.len());
        for (id, name, created_at) in heads {
            chambers.push(Chamber {
                id,
                name,
                participants: Self::participants(&conn, id)?,
                created_at,
            });
        }
        Ok(chambers)
    }

    /// Overwrite the first participant's key. Returns `false` when the chamber
    /// has no participants.
    pub fn set_first_participant_key(&self, chamber_id: Uuid, key: &str) -> Result<bool> {
        let changed = self.conn().execute(
            "UPDATE participants SET key = ?2
             WHERE chamber_id = ?1
               AND position = (SELECT MIN(position) FROM participants WHERE chamber_id = ?1)",
            params![chamber_id.to_string(), key],
        )?;
        Ok(changed > 0)
    }

    // ── Records ─────────────────────────────────────────────────────────────

    pub fn insert_record(&self, record: &MemoryRecord) -> Result<()> {
        self.conn().execute(
            "INSERT INTO memory_records
                 (id, chamber_id, is_user, persona, created_at, ciphertext, content_length, node_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                record.id.to_string(),
                record.chamber_id.to_string(),
                record.is_user,
                record.persona,
                timestamp(record.created_at),
                record.ciphertext,
                record.content_length as i64,
                record.node_id.map(|n| n.to_string()),
            ],
        )?;
        Ok(())
    }

    pub fn get_record(&self, id: Uuid) -> Result<Option<MemoryRecord>> {
        let sql = format!("SELECT {RECORD_COLUMNS} FROM memory_records WHERE id = ?1");
        Ok(self
            .conn()
            .query_row(&sql, [id.to_string()], record_from_row)
            .optional()?)
    }

    /// Records of one chamber in creation order.
    pub fn records_for_chamber(&self, chamber_id: Uuid) -> Result<Vec<MemoryRecord>> {
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM memory_records
             WHERE chamber_id = ?1
             ORDER BY created_at ASC, id ASC"
        );
        let conn = self.conn();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([chamber_id.to_string()], record_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// The record a graph node was created for, if it still exists.
    pub fn record_for_node(&self, node_id: Uuid) -> Result<Option<MemoryRecord>> {
        let sql = format!("SELECT {RECORD_COLUMNS} FROM memory_records WHERE node_id = ?1");
        Ok(self
            .conn()
            .query_row(&sql, [node_id.to_string()], record_from_row)
            .optional()?)
    }

    pub fn delete_record(&self, id: Uuid) -> Result<bool> {
        let changed = self
            .conn()
            .execute("DELETE FROM memory_records WHERE id = ?1", [id.to_string()])?;
        Ok(changed > 0)
    }

    /// Delete every record of `chamber_id` created before `cutoff`.
    pub fn delete_records_before(&self, chamber_id: Uuid, cutoff: DateTime<Utc>) -> Result<usize> {
        let deleted = self.conn().execute(
            "DELETE FROM memory_records WHERE chamber_id = ?1 AND created_at < ?2",
            params![chamber_id.to_string(), timestamp(cutoff)],
        )?;
        debug!(chamber = %chamber_id, deleted, "purged records");
        Ok(deleted)
    }

    /// Replace the first participant's key and every listed ciphertext in a
    /// single transaction.
    pub fn rekey_chamber(
        &self,
        chamber_id: Uuid,
        new_key: &str,
        rewritten: &[(Uuid, Vec<u8>)],
    ) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        tx.execute(
            "UPDATE participants SET key = ?2
             WHERE chamber_id = ?1
               AND position = (SELECT MIN(position) FROM participants WHERE chamber_id = ?1)",
            params![chamber_id.to_string(), new_key],
        )?;
        {
            let mut stmt = tx.prepare(
                "UPDATE memory_records SET ciphertext = ?2 WHERE id = ?1 AND chamber_id = ?3",
            )?;
            for (id, ciphertext) in rewritten {
                stmt.execute(params![id.to_string(), ciphertext, chamber_id.to_string()])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    // ── Metadata ────────────────────────────────────────────────────────────

    pub fn get_metadata(&self, id: Uuid) -> Result<Option<MemoryMetadata>> {
        let sql = format!("SELECT {METADATA_COLUMNS} FROM memory_metadata WHERE id = ?1");
        Ok(self
            .conn()
            .query_row(&sql, [id.to_string()], metadata_from_row)
            .optional()?)
    }

    pub fn metadata_for_chamber(&self, chamber_id: Uuid) -> Result<Option<MemoryMetadata>> {
        let sql = format!("SELECT {METADATA_COLUMNS} FROM memory_metadata WHERE chamber_id = ?1");
        Ok(self
            .conn()
            .query_row(&sql, [chamber_id.to_string()], metadata_from_row)
            .optional()?)
    }

    /// Short-term entries not yet consolidated, oldest first.
    pub fn pending_metadata(&self) -> Result<Vec<MemoryMetadata>> {
        let sql = format!(
            "SELECT {METADATA_COLUMNS} FROM memory_metadata
             WHERE tier = ?1 AND status != ?2
             ORDER BY created_at ASC, id ASC"
        );
        let conn = self.conn();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params![
                MemoryTier::ShortTerm.as_str(),
                ConsolidationStatus::Consolidated.as_str()
            ],
            metadata_from_row,
        )?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn set_importance(&self, id: Uuid, importance: f64) -> Result<()> {
        self.conn().execute(
            "UPDATE memory_metadata SET importance = ?2 WHERE id = ?1",
            params![id.to_string(), importance],
        )?;
        Ok(())
    }

    /// Flip a pending entry to `long_term`/`consolidated` in one statement.
    ///
    /// Returns `false` if the entry was already consolidated or is gone.
    pub fn mark_consolidated(&self, id: Uuid, importance: f64) -> Result<bool> {
        let changed = self.conn().execute(
            "UPDATE memory_metadata
             SET tier = ?2, status = ?3, importance = ?4
             WHERE id = ?1 AND tier = ?5 AND status != ?3",
            params![
                id.to_string(),
                MemoryTier::LongTerm.as_str(),
                ConsolidationStatus::Consolidated.as_str(),
                importance,
                MemoryTier::ShortTerm.as_str(),
            ],
        )?;
        Ok(changed > 0)
    }

    /// Return a consolidated chamber's metadata to `short_term`/`pending`.
    pub fn reopen_metadata(&self, chamber_id: Uuid) -> Result<bool> {
        let changed = self.conn().execute(
            "UPDATE memory_metadata SET tier = ?2, status = ?3
             WHERE chamber_id = ?1 AND status = ?4",
            params![
                chamber_id.to_string(),
                MemoryTier::ShortTerm.as_str(),
                ConsolidationStatus::Pending.as_str(),
                ConsolidationStatus::Consolidated.as_str(),
            ],
        )?;
        Ok(changed > 0)
    }

    /// Count one read against the chamber's metadata.
    pub fn record_access(&self, chamber_id: Uuid, at: DateTime<Utc>) -> Result<()> {
        self.conn().execute(
            "UPDATE memory_metadata
             SET access_count = access_count + 1, last_accessed_at = ?2
             WHERE chamber_id = ?1",
            params![chamber_id.to_string(), timestamp(at)],
        )?;
        Ok(())
    }

    /// Overwrite every column of an existing metadata row.
    pub fn update_metadata(&self, metadata: &MemoryMetadata) -> Result<()> {
        self.conn().execute(
            "UPDATE memory_metadata
             SET tier = ?2, status = ?3, importance = ?4, access_count = ?5,
                 created_at = ?6, last_accessed_at = ?7
             WHERE id = ?1",
            params![
                metadata.id.to_string(),
                metadata.tier.as_str(),
                metadata.status.as_str(),
                metadata.importance,
                metadata.access_count as i64,
                timestamp(metadata.created_at),
                timestamp(metadata.last_accessed_at),
            ],
        )?;
        Ok(())
    }

    // ── Synaptic graph ──────────────────────────────────────────────────────

    pub fn insert_node(&self, node: &SynapticNode) -> Result<()> {
        let fingerprint = node
            .fingerprint
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(",");
        self.conn().execute(
            "INSERT INTO synaptic_nodes
                 (id, layer, scope, content_ref, fingerprint, state, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                node.id.to_string(),
                node.layer.get(),
                node.scope.map(|s| s.to_string()),
                node.content_ref,
                fingerprint,
                node.state.as_str(),
                timestamp(node.created_at),
            ],
        )?;
        Ok(())
    }

    /// Load a node together with its neighbour set.
    pub fn get_node(&self, id: Uuid) -> Result<Option<SynapticNode>> {
        let conn = self.conn();
        let sql = format!("SELECT {NODE_COLUMNS} FROM synaptic_nodes WHERE id = ?1");
        let node = conn
            .query_row(&sql, [id.to_string()], node_from_row)
            .optional()?;
        let Some(mut node) = node else {
            return Ok(None);
        };
        node.neighbors = Self::neighbors_of(&conn, id)?.into_iter().collect();
        Ok(Some(node))
    }

    /// Most recent non-archived nodes of `scope` whose layer lies in
    /// `min_layer..=max_layer`, newest first. Neighbour sets are left empty.
    pub fn recent_nodes(
        &self,
        scope: Option<Uuid>,
        min_layer: u8,
        max_layer: u8,
        exclude: Uuid,
        limit: usize,
    ) -> Result<Vec<SynapticNode>> {
        let sql = format!(
            "SELECT {NODE_COLUMNS} FROM synaptic_nodes
             WHERE scope IS ?1 AND layer BETWEEN ?2 AND ?3 AND state != ?4 AND id != ?5
             ORDER BY created_at DESC, id DESC
             LIMIT ?6"
        );
        let conn = self.conn();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params![
                scope.map(|s| s.to_string()),
                min_layer,
                max_layer,
                NodeState::Archived.as_str(),
                exclude.to_string(),
                limit as i64,
            ],
            node_from_row,
        )?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Insert the undirected edge `a`–`b`. Returns `false` if it already
    /// existed.
    pub fn insert_edge(&self, a: Uuid, b: Uuid, at: DateTime<Utc>) -> Result<bool> {
        let (low, high) = edge_key(a, b);
        let changed = self.conn().execute(
            "INSERT OR IGNORE INTO synaptic_edges (low, high, created_at) VALUES (?1, ?2, ?3)",
            params![low, high, timestamp(at)],
        )?;
        Ok(changed > 0)
    }

    fn neighbors_of(conn: &Connection, id: Uuid) -> rusqlite::Result<Vec<Uuid>> {
        let mut stmt = conn.prepare(
            "SELECT high FROM synaptic_edges WHERE low = ?1
             UNION
             SELECT low FROM synaptic_edges WHERE high = ?1",
        )?;
        let rows = stmt.query_map([id.to_string()], |row| uuid_at(row, 0))?;
        rows.collect()
    }

    pub fn neighbor_ids(&self, id: Uuid) -> Result<Vec<Uuid>> {
        Ok(Self::neighbors_of(&self.conn(), id)?)
    }

    pub fn set_node_state(&self, id: Uuid, state: NodeState) -> Result<bool> {
        let changed = self.conn().execute(
            "UPDATE synaptic_nodes SET state = ?2 WHERE id = ?1",
            params![id.to_string(), state.as_str()],
        )?;
        Ok(changed > 0)
    }

    /// Advance `created` nodes among `ids` to `linked`; archived nodes stay
    /// archived.
    pub fn mark_linked(&self, ids: &[Uuid]) -> Result<()> {
        let conn = self.conn();
        let mut stmt = conn.prepare("UPDATE synaptic_nodes SET state = ?2 WHERE id = ?1 AND state = ?3")?;
        for id in ids {
            stmt.execute(params![
                id.to_string(),
                NodeState::Linked.as_str(),
                NodeState::Created.as_str()
            ])?;
        }
        Ok(())
    }

    /// Remove a node and every edge touching it.
    pub fn delete_node(&self, id: Uuid) -> Result<bool> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM synaptic_edges WHERE low = ?1 OR high = ?1",
            [id.to_string()],
        )?;
        let changed = tx.execute("DELETE FROM synaptic_nodes WHERE id = ?1", [id.to_string()])?;
        tx.commit()?;
        Ok(changed > 0)
    }

    pub fn edge_count(&self) -> Result<usize> {
        let count: i64 =
            self.conn()
                .query_row("SELECT COUNT(*) FROM synaptic_edges", [], |row| row.get(0))?;
        Ok(count.max(0) as usize)
    }
}

fn insert_metadata(conn: &Connection, metadata: &MemoryMetadata) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO memory_metadata
             (id, chamber_id, tier, status, importance, access_count, created_at, last_accessed_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            metadata.id.to_string(),
            metadata.chamber_id.to_string(),
            metadata.tier.as_str(),
            metadata.status.as_str(),
            metadata.importance,
            metadata.access_count as i64,
            timestamp(metadata.created_at),
            timestamp(metadata.last_accessed_at),
        ],
    )?;
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
