//! `engram-types` – shared data model for the Engram memory subsystem.
//!
//! Every other crate in the workspace speaks in these types: the persistence
//! layer stores them, the consolidation engine mutates them and the facade
//! hands them to callers.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

// ─────────────────────────────────────────────────────────────────────────────
// Parse errors
// ─────────────────────────────────────────────────────────────────────────────

/// Errors raised when a persisted column cannot be mapped back to a type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("unknown {kind} '{value}'")]
    Unknown { kind: &'static str, value: String },

    #[error("cortical layer {0} is outside {min}..={max}", min = CorticalLayer::MIN, max = CorticalLayer::MAX)]
    LayerOutOfRange(u8),
}

// ─────────────────────────────────────────────────────────────────────────────
// Enumerations
// ─────────────────────────────────────────────────────────────────────────────

/// Storage tier of a memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryTier {
    /// Local, hot.
    ShortTerm,
    /// Consolidated into redundant storage.
    LongTerm,
}

impl MemoryTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryTier::ShortTerm => "short_term",
            MemoryTier::LongTerm => "long_term",
        }
    }
}

impl fmt::Display for MemoryTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MemoryTier {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "short_term" => Ok(MemoryTier::ShortTerm),
            "long_term" => Ok(MemoryTier::LongTerm),
            other => Err(ParseError::Unknown {
                kind: "memory tier",
                value: other.to_string(),
            }),
        }
    }
}

/// Consolidation bookkeeping state of a [`MemoryMetadata`] entry.
///
/// `Failed` is not terminal: failed entries stay eligible on the next cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsolidationStatus {
    Pending,
    Consolidated,
    Failed,
}

impl ConsolidationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsolidationStatus::Pending => "pending",
            ConsolidationStatus::Consolidated => "consolidated",
            ConsolidationStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for ConsolidationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConsolidationStatus {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ConsolidationStatus::Pending),
            "consolidated" => Ok(ConsolidationStatus::Consolidated),
            "failed" => Ok(ConsolidationStatus::Failed),
            other => Err(ParseError::Unknown {
                kind: "consolidation status",
                value: other.to_string(),
            }),
        }
    }
}

/// Lifecycle of a [`SynapticNode`]: `Created → Linked → Archived`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeState {
    Created,
    Linked,
    Archived,
}

impl NodeState {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeState::Created => "created",
            NodeState::Linked => "linked",
            NodeState::Archived => "archived",
        }
    }
}

impl FromStr for NodeState {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(NodeState::Created),
            "linked" => Ok(NodeState::Linked),
            "archived" => Ok(NodeState::Archived),
            other => Err(ParseError::Unknown {
                kind: "node state",
                value: other.to_string(),
            }),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// CorticalLayer
// ─────────────────────────────────────────────────────────────────────────────

/// Processing-stage tag of a graph node, `1..=6`.
///
/// Only used as a grouping/proximity signal when linking nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct CorticalLayer(u8);

impl CorticalLayer {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 6;

    /// Layer IV: where freshly ingested (sensory) memories land.
    pub const INGESTION: CorticalLayer = CorticalLayer(4);

    pub fn new(layer: u8) -> Result<Self, ParseError> {
        if (Self::MIN..=Self::MAX).contains(&layer) {
            Ok(Self(layer))
        } else {
            Err(ParseError::LayerOutOfRange(layer))
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// Absolute distance between two layers.
    pub fn distance(self, other: CorticalLayer) -> u8 {
        self.0.abs_diff(other.0)
    }
}

impl Default for CorticalLayer {
    fn default() -> Self {
        Self::INGESTION
    }
}

impl TryFrom<u8> for CorticalLayer {
    type Error = ParseError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CorticalLayer> for u8 {
    fn from(layer: CorticalLayer) -> Self {
        layer.0
    }
}

impl fmt::Display for CorticalLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// MemoryRecord
// ─────────────────────────────────────────────────────────────────────────────

/// One unit of conversational content, stored encrypted.
///
/// Plaintext never lives in this type; see [`Message`] for the decrypted view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub id: Uuid,
    /// Owning chamber.
    pub chamber_id: Uuid,
    /// `true` when the user authored the message, `false` for the agent.
    pub is_user: bool,
    pub persona: Option<String>,
    pub created_at: DateTime<Utc>,
    /// AEAD ciphertext of the UTF-8 content.
    pub ciphertext: Vec<u8>,
    /// Length in bytes of the plaintext, kept for importance scoring.
    pub content_length: usize,
    /// Weak reference to the node representing this record in the graph.
    pub node_id: Option<Uuid>,
}

/// Decrypted view of a [`MemoryRecord`], produced transiently on read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub chamber_id: Uuid,
    pub is_user: bool,
    pub persona: Option<String>,
    pub created_at: DateTime<Utc>,
    pub node_id: Option<Uuid>,
    pub content: String,
}

impl Message {
    pub fn from_record(record: &MemoryRecord, content: String) -> Self {
        Self {
            id: record.id,
            chamber_id: record.chamber_id,
            is_user: record.is_user,
            persona: record.persona.clone(),
            created_at: record.created_at,
            node_id: record.node_id,
            content,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// MemoryMetadata
// ─────────────────────────────────────────────────────────────────────────────

/// Consolidation bookkeeping for the messages of one chamber.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryMetadata {
    pub id: Uuid,
    pub chamber_id: Uuid,
    pub tier: MemoryTier,
    pub status: ConsolidationStatus,
    /// Importance in `[0, 1]`; only ever replaced by a recomputation.
    pub importance: f64,
    /// Monotonic read counter.
    pub access_count: u64,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
}

impl MemoryMetadata {
    /// Fresh short-term, pending entry for `chamber_id`.
    pub fn new(chamber_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            chamber_id,
            tier: MemoryTier::ShortTerm,
            status: ConsolidationStatus::Pending,
            importance: 0.0,
            access_count: 0,
            created_at: now,
            last_accessed_at: now,
        }
    }

    /// Time elapsed since creation, saturating at zero for future timestamps.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.created_at).max(Duration::zero())
    }

    /// `true` for short-term entries that still await consolidation
    /// (`Failed` counts as pending).
    pub fn awaits_consolidation(&self) -> bool {
        self.tier == MemoryTier::ShortTerm && self.status != ConsolidationStatus::Consolidated
    }

    /// Name of the consolidated object in redundant storage.
    pub fn storage_name(&self) -> String {
        consolidated_object_name(self.id)
    }
}

/// `memory_<metadata_id>.json`, the naming convention for consolidated objects.
pub fn consolidated_object_name(metadata_id: Uuid) -> String {
    format!("memory_{metadata_id}.json")
}

// ─────────────────────────────────────────────────────────────────────────────
// SynapticNode
// ─────────────────────────────────────────────────────────────────────────────

/// An addressable memory fragment in the associative graph.
///
/// Edges are undirected: `neighbors` never contains `id`, and if A lists B
/// then B lists A.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynapticNode {
    pub id: Uuid,
    pub layer: CorticalLayer,
    /// Linking scope (the owning chamber); nodes only link within a scope.
    pub scope: Option<Uuid>,
    /// Reference to the content this node stands for (a record id).
    pub content_ref: String,
    /// Hashed keyword digests used by the linking policy.
    pub fingerprint: BTreeSet<String>,
    pub state: NodeState,
    pub created_at: DateTime<Utc>,
    pub neighbors: BTreeSet<Uuid>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Chamber
// ─────────────────────────────────────────────────────────────────────────────

/// A conversation participant and its symmetric key (encoded form).
///
/// The key string is kept as persisted: it may be a legacy malformed value
/// that the keyring replaces before use.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Persona {
    pub name: String,
    pub key: String,
}

impl fmt::Debug for Persona {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Persona")
            .field("name", &self.name)
            .field("key", if self.key.is_empty() { &"<not set>" } else { &"<redacted>" })
            .finish()
    }
}

/// A conversation container owning a roster of personas and their messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chamber {
    pub id: Uuid,
    pub name: String,
    /// Roster in join order; the first participant's key encrypts the chamber.
    pub participants: Vec<Persona>,
    pub created_at: DateTime<Utc>,
}

impl Chamber {
    pub fn first_participant(&self) -> Option<&Persona> {
        self.participants.first()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Consolidated payload
// ─────────────────────────────────────────────────────────────────────────────

/// One message inside a [`ConsolidatedMemory`] snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidatedMessage {
    pub id: Uuid,
    pub is_user: bool,
    pub persona: Option<String>,
    pub created_at: DateTime<Utc>,
    pub content: String,
}

/// The JSON document written as `memory_<metadata_id>.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidatedMemory {
    pub metadata_id: Uuid,
    pub chamber_id: Uuid,
    pub importance: f64,
    pub consolidated_at: DateTime<Utc>,
    pub messages: Vec<ConsolidatedMessage>,
    /// Records that no longer decrypt under the chamber key, typically after
    /// a malformed key was regenerated. Their content is lost.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unreadable: Vec<Uuid>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Consolidation outcomes
// ─────────────────────────────────────────────────────────────────────────────

/// Why a metadata entry was not consolidated on this cycle.
///
/// Deferral is a normal outcome, not an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DeferReason {
    TooRecent { age_secs: i64, required_secs: i64 },
    InfrequentlyAccessed { access_count: u64, required: u64 },
    LowImportance { score: f64, required: f64 },
}

impl fmt::Display for DeferReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeferReason::TooRecent { age_secs, required_secs } => {
                write!(f, "too recent ({age_secs}s < {required_secs}s)")
            }
            DeferReason::InfrequentlyAccessed { access_count, required } => {
                write!(f, "accessed {access_count} time(s), needs {required}")
            }
            DeferReason::LowImportance { score, required } => {
                write!(f, "importance {score:.3} below {required:.3}")
            }
        }
    }
}

/// Result of evaluating (and possibly migrating) one metadata entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConsolidationOutcome {
    Consolidated {
        bytes: usize,
        backend: String,
        /// Records left out because they failed to decrypt.
        #[serde(default)]
        unreadable: usize,
    },
    Deferred(DeferReason),
    /// The pipeline failed; the entry stays pending for the next cycle.
    Failed(String),
}
