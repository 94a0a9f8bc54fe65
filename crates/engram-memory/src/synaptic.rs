//! Synaptic Graph Store.
//!
//! An undirected graph of memory fragments. Each node sits on a
//! [`CorticalLayer`] and carries a keyword fingerprint: SHA-256 digests of the
//! significant words of its text, so related fragments can be found without
//! keeping plaintext in the graph.
//!
//! # Linking policy
//!
//! When a node is created it is compared against the
//! [`LinkPolicy::candidate_window`] most recent live nodes of the same scope
//! whose layer lies within [`LinkPolicy::layer_radius`]. A candidate sharing at
//! least [`LinkPolicy::min_shared_keywords`] digests is linked; at most
//! [`LinkPolicy::max_links`] links are made, strongest overlap first and the
//! most recent candidate on ties.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use chrono::Utc;
use engram_types::{CorticalLayer, NodeState, SynapticNode};
use sha2::{Digest, Sha256};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::error::MemoryError;
use crate::store::SqliteStore;

/// Upper bound on nodes returned by [`SynapticGraph::get_associated`].
pub const ASSOCIATION_CAP: usize = 20;

const MIN_KEYWORD_CHARS: usize = 3;

const STOP_WORDS: &[&str] = &[
    "about", "after", "again", "all", "also", "and", "any", "are", "because", "been", "before",
    "but", "can", "could", "did", "does", "for", "from", "had", "has", "have", "her", "here",
    "him", "his", "how", "its", "just", "more", "not", "now", "off", "our", "out", "over", "she",
    "should", "some", "than", "that", "the", "their", "them", "then", "there", "these", "they",
    "this", "those", "too", "under", "very", "was", "were", "what", "when", "where", "which",
    "while", "who", "why", "will", "with", "would", "you", "your",
];

// ─────────────────────────────────────────────────────────────────────────────
// Fingerprint
// ─────────────────────────────────────────────────────────────────────────────

/// Hashed keyword set of a fragment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fingerprint(BTreeSet<String>);

impl Fingerprint {
    pub fn from_text(text: &str) -> Self {
        let digests = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.chars().count() >= MIN_KEYWORD_CHARS)
            .map(str::to_lowercase)
            .filter(|w| !STOP_WORDS.contains(&w.as_str()))
            .map(|w| keyword_digest(&w))
            .collect();
        Self(digests)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_digests(self) -> BTreeSet<String> {
        self.0
    }
}

/// First 8 bytes of SHA-256 over `word`, hex encoded.
fn keyword_digest(word: &str) -> String {
    let hash = Sha256::digest(word.as_bytes());
    hash[..8].iter().map(|b| format!("{b:02x}")).collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Policy
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkPolicy {
    pub candidate_window: usize,
    pub layer_radius: u8,
    pub min_shared_keywords: usize,
    pub max_links: usize,
}

impl Default for LinkPolicy {
    fn default() -> Self {
        Self {
            candidate_window: 50,
            layer_radius: 1,
            min_shared_keywords: 1,
            max_links: 8,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// SynapticGraph
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct SynapticGraph {
    store: Arc<SqliteStore>,
    policy: LinkPolicy,
}

impl SynapticGraph {
    pub fn new(store: Arc<SqliteStore>, policy: LinkPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> &LinkPolicy {
        &self.policy
    }

    /// Allocate a node for `content_ref` and link it to related nodes.
    ///
    /// Fails only on storage errors.
    #[instrument(skip(self, fingerprint), fields(keywords = fingerprint.len()))]
    pub fn create_and_connect(
        &self,
        content_ref: &str,
        fingerprint: Fingerprint,
        layer: CorticalLayer,
        scope: Option<Uuid>,
    ) -> Result<Uuid, MemoryError> {
        let node = SynapticNode {
            id: Uuid::new_v4(),
            layer,
            scope,
            content_ref: content_ref.to_string(),
            fingerprint: fingerprint.into_digests(),
            state: NodeState::Created,
            created_at: Utc::now(),
            neighbors: BTreeSet::new(),
        };
        self.store.insert_node(&node)?;

        if node.fingerprint.is_empty() {
            return Ok(node.id);
        }

        let radius = self.policy.layer_radius;
        let min_layer = layer.get().saturating_sub(radius).max(CorticalLayer::MIN);
        let max_layer = layer.get().saturating_add(radius).min(CorticalLayer::MAX);
        let candidates = self.store.recent_nodes(
            scope,
            min_layer,
            max_layer,
            node.id,
            self.policy.candidate_window,
        )?;

        // Candidates arrive newest first; the stable sort keeps that order on ties.
        let mut scored: Vec<(usize, Uuid)> = candidates
            .iter()
            .map(|c| (c.fingerprint.intersection(&node.fingerprint).count(), c.id))
            .filter(|(shared, _)| *shared >= self.policy.min_shared_keywords.max(1))
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        scored.truncate(self.policy.max_links);

        let mut linked = Vec::with_capacity(scored.len());
        for (_, candidate) in &scored {
            self.store.insert_edge(node.id, *candidate, node.created_at)?;
            linked.push(*candidate);
        }
        if !linked.is_empty() {
            linked.push(node.id);
            self.store.mark_linked(&linked)?;
        }
        debug!(node = %node.id, links = scored.len(), "node created");
        Ok(node.id)
    }

    /// Link `a` and `b`. Idempotent; a node is never linked to itself.
    ///
    /// Returns `true` only when a new edge was created.
    pub fn connect(&self, a: Uuid, b: Uuid) -> Result<bool, MemoryError> {
        if a == b {
            return Ok(false);
        }
        let created = self.store.insert_edge(a, b, Utc::now())?;
        if created {
            self.store.mark_linked(&[a, b])?;
        }
        Ok(created)
    }

    pub fn get_node(&self, id: Uuid) -> Result<Option<SynapticNode>, MemoryError> {
        self.store.get_node(id)
    }

    /// Live nodes reachable from `id` within `hops` edges.
    ///
    /// Nearer nodes come first; within one hop the newest comes first. The
    /// origin and archived nodes are never returned and the result holds at
    /// most [`ASSOCIATION_CAP`] nodes.
    pub fn get_associated(&self, id: Uuid, hops: usize) -> Result<Vec<SynapticNode>, MemoryError> {
        let mut visited: HashSet<Uuid> = HashSet::from([id]);
        let mut frontier = vec![id];
        let mut result = Vec::new();

        for _ in 0..hops {
            let mut level = Vec::new();
            for current in &frontier {
                for neighbor in self.store.neighbor_ids(*current)? {
                    if !visited.insert(neighbor) {
                        continue;
                    }
                    match self.store.get_node(neighbor)? {
                        Some(node) if node.state != NodeState::Archived => level.push(node),
                        _ => {}
                    }
                }
            }
            level.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            frontier = level.iter().map(|n| n.id).collect();
            for node in level {
                if result.len() == ASSOCIATION_CAP {
                    return Ok(result);
                }
                result.push(node);
            }
            if frontier.is_empty() {
                break;
            }
        }
        Ok(result)
    }

    /// Take a node out of linking and association. Its edges are kept.
    pub fn archive_node(&self, id: Uuid) -> Result<bool, MemoryError> {
        self.store.set_node_state(id, NodeState::Archived)
    }

    /// Remove a node and its edges. The message it points at is untouched.
    pub fn delete_node(&self, id: Uuid) -> Result<bool, MemoryError> {
        self.store.delete_node(id)
    }
}
