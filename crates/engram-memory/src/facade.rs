//! Memory Facade – the public API of the memory subsystem.
//!
//! Ingestion creates a graph node, encrypts the content under the chamber
//! key and persists the record tagged with the node id. Reads decrypt on the
//! way out and count as accesses for consolidation. Consolidation itself is
//! delegated to the shared [`ConsolidationEngine`].

use std::sync::Arc;

use chrono::{Duration, Utc};
use engram_crypto::{ChamberKey, decrypt, encrypt, generate_key};
use engram_storage::RedundancyRouter;
use engram_types::{
    Chamber, ConsolidatedMemory, CorticalLayer, MemoryMetadata, MemoryRecord, Message, Persona,
};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::consolidation::{ConsolidationEngine, ConsolidationPolicy, ConsolidationReport};
use crate::error::MemoryError;
use crate::keyring::Keyring;
use crate::locks::ChamberLocks;
use crate::store::SqliteStore;
use crate::synaptic::{Fingerprint, LinkPolicy, SynapticGraph};

/// Maximum number of messages returned by
/// [`MemoryFacade::get_associated_memories`].
pub const ASSOCIATION_RESULT_LIMIT: usize = 5;

const ASSOCIATION_HOPS: usize = 2;

pub struct MemoryFacade {
    store: Arc<SqliteStore>,
    graph: SynapticGraph,
    keyring: Keyring,
    locks: Arc<ChamberLocks>,
    engine: Arc<ConsolidationEngine>,
}

impl MemoryFacade {
    /// Wire the facade and its consolidation engine over shared handles.
    pub fn new(
        store: Arc<SqliteStore>,
        router: Arc<RedundancyRouter>,
        policy: ConsolidationPolicy,
        consolidation_secret: ChamberKey,
    ) -> Self {
        let locks = Arc::new(ChamberLocks::new());
        let engine = Arc::new(ConsolidationEngine::new(
            Arc::clone(&store),
            router,
            Arc::clone(&locks),
            policy,
            consolidation_secret,
        ));
        Self {
            graph: SynapticGraph::new(Arc::clone(&store), LinkPolicy::default()),
            keyring: Keyring::new(Arc::clone(&store)),
            store,
            locks,
            engine,
        }
    }

    /// Handle for a background [`ConsolidationScheduler`][crate::ConsolidationScheduler].
    pub fn engine(&self) -> Arc<ConsolidationEngine> {
        Arc::clone(&self.engine)
    }

    pub fn router(&self) -> &Arc<RedundancyRouter> {
        self.engine.router()
    }

    pub fn graph(&self) -> &SynapticGraph {
        &self.graph
    }

    async fn chamber_key(&self, chamber_id: Uuid) -> Result<ChamberKey, MemoryError> {
        let _guard = self.locks.lock(chamber_id).await;
        self.keyring.resolve(chamber_id)
    }

    fn open_record(record: &MemoryRecord, key: &ChamberKey) -> Result<Message, MemoryError> {
        let plaintext = decrypt(&record.ciphertext, key)
            .map_err(|_| MemoryError::DecryptionFailed { record: record.id })?;
        Ok(Message::from_record(
            record,
            String::from_utf8_lossy(&plaintext).into_owned(),
        ))
    }

    // ── Chambers ────────────────────────────────────────────────────────────

    /// Create a chamber with one freshly keyed persona per entry of
    /// `personas`. The first persona's key encrypts the chamber's records.
    pub fn create_chamber(&self, name: &str, personas: &[&str]) -> Result<Chamber, MemoryError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(MemoryError::InvalidInput("chamber name is empty".into()));
        }
        if personas.is_empty() {
            return Err(MemoryError::InvalidInput(
                "a chamber needs at least one persona".into(),
            ));
        }
        if personas.iter().any(|p| p.trim().is_empty()) {
            return Err(MemoryError::InvalidInput("persona name is empty".into()));
        }

        let chamber = Chamber {
            id: Uuid::new_v4(),
            name: name.to_string(),
            participants: personas
                .iter()
                .map(|p| Persona {
                    name: p.trim().to_string(),
                    key: generate_key().encoded(),
                })
                .collect(),
            created_at: Utc::now(),
        };
        let metadata = MemoryMetadata::new(chamber.id);
        self.store.insert_chamber(&chamber, &metadata)?;
        info!(chamber = %chamber.id, name = %chamber.name, personas = personas.len(), "chamber created");
        Ok(chamber)
    }

    pub fn list_chambers(&self) -> Result<Vec<Chamber>, MemoryError> {
        self.store.list_chambers()
    }

    pub fn get_chamber(&self, chamber_id: Uuid) -> Result<Chamber, MemoryError> {
        self.store
            .get_chamber(chamber_id)?
            .ok_or_else(|| MemoryError::chamber_not_found(chamber_id))
    }

    pub fn metadata(&self, chamber_id: Uuid) -> Result<MemoryMetadata, MemoryError> {
        self.store
            .metadata_for_chamber(chamber_id)?
            .ok_or_else(|| MemoryError::chamber_not_found(chamber_id))
    }

    // ── Ingestion ───────────────────────────────────────────────────────────

    /// Encrypt and persist one message, linking it into the graph.
    ///
    /// A chamber that was already consolidated returns to the short-term tier
    /// so the next cycle refreshes its long-term copy.
    #[instrument(skip(self, content), fields(chars = content.chars().count()))]
    pub async fn store_memory(
        &self,
        content: &str,
        is_user: bool,
        persona: Option<&str>,
        chamber_id: Uuid,
    ) -> Result<Message, MemoryError> {
        if content.trim().is_empty() {
            return Err(MemoryError::InvalidInput("message content is empty".into()));
        }
        let _guard = self.locks.lock(chamber_id).await;
        let key = self.keyring.resolve(chamber_id)?;

        let record_id = Uuid::new_v4();
        let ciphertext = encrypt(content.as_bytes(), &key)?;
        let node_id = self.graph.create_and_connect(
            &record_id.to_string(),
            Fingerprint::from_text(content),
            CorticalLayer::INGESTION,
            Some(chamber_id),
        )?;

        let record = MemoryRecord {
            id: record_id,
            chamber_id,
            is_user,
            persona: persona.map(str::to_string),
            created_at: Utc::now(),
            ciphertext,
            content_length: content.len(),
            node_id: Some(node_id),
        };
        if let Err(e) = self.store.insert_record(&record) {
            // Unlink the node so it does not surface as an empty association.
            if let Err(cleanup) = self.graph.delete_node(node_id) {
                warn!(node = %node_id, error = %cleanup, "orphaned graph node left behind");
            }
            return Err(e);
        }

        if self.store.reopen_metadata(chamber_id)? {
            info!(chamber = %chamber_id, "consolidated chamber re-opened by new message");
        }
        debug!(record = %record.id, node = %node_id, "message stored");
        Ok(Message::from_record(&record, content.to_string()))
    }

    // ── Reads ───────────────────────────────────────────────────────────────

    /// Every message of a chamber, decrypted, in creation order.
    ///
    /// A message that fails to decrypt aborts the call with
    /// [`MemoryError::DecryptionFailed`].
    #[instrument(skip(self))]
    pub async fn get_messages(&self, chamber_id: Uuid) -> Result<Vec<Message>, MemoryError> {
        let key = self.chamber_key(chamber_id).await?;
        let messages = self
            .store
            .records_for_chamber(chamber_id)?
            .iter()
            .map(|r| Self::open_record(r, &key))
            .collect::<Result<Vec<_>, _>>()?;
        self.store.record_access(chamber_id, Utc::now())?;
        Ok(messages)
    }

    /// Case-insensitive substring search over every chamber's plaintext.
    ///
    /// Never fails: problems are logged and the affected chamber or message
    /// is left out of the result.
    #[instrument(skip(self))]
    pub async fn search(&self, text: &str) -> Vec<Message> {
        let needle = text.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }
        match self.search_chambers(&needle).await {
            Ok(hits) => hits,
            Err(e) => {
                warn!(error = %e, "search failed");
                Vec::new()
            }
        }
    }

    async fn search_chambers(&self, needle: &str) -> Result<Vec<Message>, MemoryError> {
        let mut hits = Vec::new();
        for chamber in self.store.list_chambers()? {
            let key = match self.chamber_key(chamber.id).await {
                Ok(key) => key,
                Err(e) => {
                    warn!(chamber = %chamber.id, error = %e, "chamber skipped during search");
                    continue;
                }
            };
            let before = hits.len();
            for record in self.store.records_for_chamber(chamber.id)? {
                match Self::open_record(&record, &key) {
                    Ok(message) if message.content.to_lowercase().contains(needle) => {
                        hits.push(message)
                    }
                    Ok(_) => {}
                    Err(e) => warn!(error = %e, "message skipped during search"),
                }
            }
            if hits.len() > before {
                self.store.record_access(chamber.id, Utc::now())?;
            }
        }
        hits.sort_by_key(|m| m.created_at);
        Ok(hits)
    }

    /// Messages associated with `message_id` through the synaptic graph.
    ///
    /// Direct neighbours come before second-hop ones; only messages of the
    /// same chamber are returned, at most [`ASSOCIATION_RESULT_LIMIT`].
    #[instrument(skip(self))]
    pub async fn get_associated_memories(
        &self,
        message_id: Uuid,
        chamber_id: Uuid,
    ) -> Result<Vec<Message>, MemoryError> {
        let record = self
            .store
            .get_record(message_id)?
            .filter(|r| r.chamber_id == chamber_id)
            .ok_or_else(|| MemoryError::message_not_found(message_id))?;
        let Some(node_id) = record.node_id else {
            return Ok(Vec::new());
        };

        let key = self.chamber_key(chamber_id).await?;
        let mut associated = Vec::new();
        for node in self.graph.get_associated(node_id, ASSOCIATION_HOPS)? {
            if associated.len() == ASSOCIATION_RESULT_LIMIT {
                break;
            }
            let Some(linked) = self.store.record_for_node(node.id)? else {
                continue;
            };
            if linked.chamber_id != chamber_id || linked.id == message_id {
                continue;
            }
            associated.push(Self::open_record(&linked, &key)?);
        }
        self.store.record_access(chamber_id, Utc::now())?;
        Ok(associated)
    }

    // ── Maintenance ─────────────────────────────────────────────────────────

    /// Run one consolidation cycle now.
    pub async fn consolidate_now(&self) -> Result<ConsolidationReport, MemoryError> {
        self.engine.run_cycle().await
    }

    /// Fetch and decrypt the long-term copy of a chamber's memory.
    #[instrument(skip(self))]
    pub async fn retrieve_consolidated(
        &self,
        metadata_id: Uuid,
    ) -> Result<ConsolidatedMemory, MemoryError> {
        let meta = self
            .store
            .get_metadata(metadata_id)?
            .ok_or(MemoryError::NotFound { kind: "metadata", id: metadata_id })?;
        let key = self.engine.record_key(meta.id)?;
        let retrieved = self
            .router()
            .retrieve_with_failover(&meta.storage_name(), &key)
            .await
            .map_err(|e| {
                if e.is_miss() {
                    MemoryError::NotFound { kind: "consolidated memory", id: metadata_id }
                } else {
                    MemoryError::BackendUnavailable(e)
                }
            })?;
        if !retrieved.failures.is_empty() {
            debug!(served_by = %retrieved.served_by, skipped = retrieved.failures.len(), "consolidated copy served after failover");
        }
        Ok(serde_json::from_slice(&retrieved.data)?)
    }

    /// Delete one message. Its graph node is kept.
    pub async fn delete_memory(&self, message_id: Uuid) -> Result<(), MemoryError> {
        let record = self
            .store
            .get_record(message_id)?
            .ok_or_else(|| MemoryError::message_not_found(message_id))?;
        let _guard = self.locks.lock(record.chamber_id).await;
        if !self.store.delete_record(message_id)? {
            return Err(MemoryError::message_not_found(message_id));
        }
        info!(record = %message_id, chamber = %record.chamber_id, "message deleted");
        Ok(())
    }

    /// Delete every message of `chamber_id` older than `age`.
    pub async fn purge_older_than(
        &self,
        chamber_id: Uuid,
        age: Duration,
    ) -> Result<usize, MemoryError> {
        self.get_chamber(chamber_id)?;
        let _guard = self.locks.lock(chamber_id).await;
        let purged = self.store.delete_records_before(chamber_id, Utc::now() - age)?;
        info!(chamber = %chamber_id, purged, "old messages purged");
        Ok(purged)
    }

    /// Replace the chamber key and re-encrypt every record under the new one.
    ///
    /// Returns the number of re-encrypted records. Nothing is changed if any
    /// record fails to decrypt under the current key.
    pub async fn rotate_chamber_key(&self, chamber_id: Uuid) -> Result<usize, MemoryError> {
        let _guard = self.locks.lock(chamber_id).await;
        let old = self.keyring.resolve(chamber_id)?;
        let new = generate_key();
        let encoded = new.encoded();

        let mut rewritten = Vec::new();
        for record in self.store.records_for_chamber(chamber_id)? {
            let plaintext = decrypt(&record.ciphertext, &old)
                .map_err(|_| MemoryError::DecryptionFailed { record: record.id })?;
            rewritten.push((record.id, encrypt(&plaintext, &new)?));
        }
        self.store.rekey_chamber(chamber_id, &encoded, &rewritten)?;
        info!(chamber = %chamber_id, records = rewritten.len(), "chamber key rotated");
        Ok(rewritten.len())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use engram_crypto::is_valid;
    use engram_storage::{InMemoryBackend, RouterConfig, StorageBackend};
    use engram_types::{ConsolidationStatus, MemoryTier, NodeState};

    struct Fixture {
        facade: MemoryFacade,
        store: Arc<SqliteStore>,
        backend: Arc<InMemoryBackend>,
    }

    fn fixture_with(policy: ConsolidationPolicy) -> Fixture {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let backend = Arc::new(InMemoryBackend::new("mem", 0));
        let router = Arc::new(RedundancyRouter::new(
            vec![backend.clone() as Arc<dyn StorageBackend>],
            RouterConfig::default(),
        ));
        let facade = MemoryFacade::new(
            Arc::clone(&store),
            router,
            policy,
            ChamberKey::from_bytes([5u8; 32]),
        );
        Fixture { facade, store, backend }
    }

    fn fixture() -> Fixture {
        fixture_with(ConsolidationPolicy::default())
    }

    #[tokio::test]
    async fn stored_message_reads_back_with_ingestion_node() {
        let fx = fixture();
        let c = fx.facade.create_chamber("chat", &["A"]).unwrap();
        fx.facade.store_memory("hello", true, Some("A"), c.id).await.unwrap();

        let messages = fx.facade.get_messages(c.id).await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, "hello");
        assert!(messages[0].is_user);
        assert_eq!(messages[0].persona.as_deref(), Some("A"));

        let node = fx
            .facade
            .graph()
            .get_node(messages[0].node_id.unwrap())
            .unwrap()
            .unwrap();
        assert_eq!(node.layer, CorticalLayer::INGESTION);
        assert_eq!(node.content_ref, messages[0].id.to_string());
    }

    #[tokio::test]
    async fn plaintext_never_reaches_the_database() {
        let fx = fixture();
        let c = fx.facade.create_chamber("chat", &["A"]).unwrap();
        fx.facade
            .store_memory("confidential plans", true, None, c.id)
            .await
            .unwrap();
        let record = &fx.store.records_for_chamber(c.id).unwrap()[0];
        assert!(!record.ciphertext.windows(12).any(|w| w == b"confidential"));
        assert_eq!(record.content_length, "confidential plans".len());
    }

    #[tokio::test]
    async fn overlapping_messages_are_associated() {
        let fx = fixture();
        let c = fx.facade.create_chamber("travel", &["A", "B"]).unwrap();
        let first = fx
            .facade
            .store_memory("planning a trip to Lisbon in spring", true, Some("A"), c.id)
            .await
            .unwrap();
        fx.facade
            .store_memory("the weather forecast looks grey", false, Some("B"), c.id)
            .await
            .unwrap();
        let second = fx
            .facade
            .store_memory("what should the Lisbon budget be?", true, Some("A"), c.id)
            .await
            .unwrap();

        let associated = fx
            .facade
            .get_associated_memories(second.id, c.id)
            .await
            .unwrap();
        let ids: Vec<Uuid> = associated.iter().map(|m| m.id).collect();
        assert_eq!(ids, [first.id]);
        assert_eq!(associated[0].content, "planning a trip to Lisbon in spring");
    }

    #[tokio::test]
    async fn association_requires_matching_chamber() {
        let fx = fixture();
        let c = fx.facade.create_chamber("one", &["A"]).unwrap();
        let other = fx.facade.create_chamber("two", &["A"]).unwrap();
        let msg = fx.facade.store_memory("hello there", true, None, c.id).await.unwrap();
        let err = fx
            .facade
            .get_associated_memories(msg.id, other.id)
            .await
            .unwrap_err();
        assert!(matches!(err, MemoryError::NotFound { kind: "message", .. }));
    }

    #[tokio::test]
    async fn malformed_key_is_regenerated_before_use() {
        let fx = fixture();
        let c = fx.facade.create_chamber("legacy", &["A"]).unwrap();
        fx.store
            .set_first_participant_key(c.id, &Uuid::new_v4().to_string())
            .unwrap();

        fx.facade.store_memory("after repair", true, None, c.id).await.unwrap();
        let stored_key = fx.facade.get_chamber(c.id).unwrap().participants[0].key.clone();
        assert!(is_valid(&stored_key));
        let messages = fx.facade.get_messages(c.id).await.unwrap();
        assert_eq!(messages[0].content, "after repair");
    }

    #[tokio::test]
    async fn decryption_failure_is_surfaced() {
        let fx = fixture();
        let c = fx.facade.create_chamber("chat", &["A"]).unwrap();
        let msg = fx.facade.store_memory("hello", true, None, c.id).await.unwrap();
        fx.store.set_first_participant_key(c.id, &generate_key().encoded()).unwrap();

        match fx.facade.get_messages(c.id).await {
            Err(MemoryError::DecryptionFailed { record }) => assert_eq!(record, msg.id),
            other => panic!("expected DecryptionFailed, got {other:?}"),
        }
        // Search degrades to an empty result instead.
        assert!(fx.facade.search("hello").await.is_empty());
    }

    #[tokio::test]
    async fn search_spans_chambers_and_counts_access() {
        let fx = fixture();
        let a = fx.facade.create_chamber("a", &["A"]).unwrap();
        let b = fx.facade.create_chamber("b", &["B"]).unwrap();
        fx.facade.store_memory("Rust is fun", true, None, a.id).await.unwrap();
        fx.facade.store_memory("I like rust too", false, Some("B"), b.id).await.unwrap();
        fx.facade.store_memory("nothing relevant", true, None, b.id).await.unwrap();

        let hits = fx.facade.search("RUST").await;
        assert_eq!(hits.len(), 2);
        assert!(fx.facade.search("   ").await.is_empty());
        assert!(fx.facade.search("python").await.is_empty());
        assert_eq!(fx.facade.metadata(a.id).unwrap().access_count, 1);
    }

    #[tokio::test]
    async fn reads_increment_access_count() {
        let fx = fixture();
        let c = fx.facade.create_chamber("chat", &["A"]).unwrap();
        fx.facade.store_memory("hi", true, None, c.id).await.unwrap();
        for _ in 0..3 {
            fx.facade.get_messages(c.id).await.unwrap();
        }
        assert_eq!(fx.facade.metadata(c.id).unwrap().access_count, 3);
    }

    #[tokio::test]
    async fn delete_removes_message_but_not_node() {
        let fx = fixture();
        let c = fx.facade.create_chamber("chat", &["A"]).unwrap();
        let msg = fx.facade.store_memory("short lived", true, None, c.id).await.unwrap();

        fx.facade.delete_memory(msg.id).await.unwrap();
        assert!(fx.facade.get_messages(c.id).await.unwrap().is_empty());
        let node = fx.facade.graph().get_node(msg.node_id.unwrap()).unwrap();
        assert_eq!(node.map(|n| n.state), Some(NodeState::Created));
        assert!(matches!(
            fx.facade.delete_memory(msg.id).await,
            Err(MemoryError::NotFound { kind: "message", .. })
        ));
    }

    #[tokio::test]
    async fn consolidation_roundtrip_and_reopen() {
        let fx = fixture_with(ConsolidationPolicy {
            short_term_memory_limit: 0,
            ..ConsolidationPolicy::default()
        });
        let c = fx.facade.create_chamber("archive", &["A"]).unwrap();
        fx.facade.store_memory("first thought", true, None, c.id).await.unwrap();

        let report = fx.facade.consolidate_now().await.unwrap();
        assert_eq!(report.consolidated, 1);
        let meta = fx.facade.metadata(c.id).unwrap();
        assert_eq!(meta.status, ConsolidationStatus::Consolidated);
        assert!(fx.backend.exists(&meta.storage_name()).await.unwrap());

        let memory = fx.facade.retrieve_consolidated(meta.id).await.unwrap();
        assert_eq!(memory.messages.len(), 1);
        assert_eq!(memory.messages[0].content, "first thought");

        fx.facade.store_memory("second thought", true, None, c.id).await.unwrap();
        let reopened = fx.facade.metadata(c.id).unwrap();
        assert_eq!(reopened.tier, MemoryTier::ShortTerm);
        assert_eq!(reopened.status, ConsolidationStatus::Pending);

        fx.facade.consolidate_now().await.unwrap();
        let refreshed = fx.facade.retrieve_consolidated(meta.id).await.unwrap();
        assert_eq!(refreshed.messages.len(), 2);
        assert_eq!(fx.backend.len().await, 1);
    }

    #[tokio::test]
    async fn failed_record_insert_leaves_no_graph_node() {
        let fx = fixture();
        let c = fx.facade.create_chamber("trip", &["A"]).unwrap();
        let first = fx
            .facade
            .store_memory("Lisbon flights are booked", true, None, c.id)
            .await
            .unwrap();
        fx.store
            .conn()
            .execute_batch(
                "CREATE TRIGGER reject_records BEFORE INSERT ON memory_records
                 BEGIN SELECT RAISE(ABORT, 'disk full'); END;",
            )
            .unwrap();

        let err = fx
            .facade
            .store_memory("Lisbon hotel is near the river", true, None, c.id)
            .await
            .unwrap_err();
        assert!(matches!(err, MemoryError::Sqlite(_)), "{err}");
        assert_eq!(fx.store.edge_count().unwrap(), 0);
        let node = fx.facade.graph().get_node(first.node_id.unwrap()).unwrap().unwrap();
        assert!(node.neighbors.is_empty());
    }

    #[tokio::test]
    async fn never_consolidated_chamber_is_not_found() {
        let fx = fixture();
        let c = fx.facade.create_chamber("fresh", &["A"]).unwrap();
        fx.facade.store_memory("not yet archived", true, None, c.id).await.unwrap();
        let meta = fx.facade.metadata(c.id).unwrap();

        match fx.facade.retrieve_consolidated(meta.id).await {
            Err(MemoryError::NotFound { kind: "consolidated memory", id }) => {
                assert_eq!(id, meta.id)
            }
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn rotation_keeps_messages_readable() {
        let fx = fixture();
        let c = fx.facade.create_chamber("chat", &["A"]).unwrap();
        fx.facade.store_memory("one", true, None, c.id).await.unwrap();
        fx.facade.store_memory("two", false, None, c.id).await.unwrap();
        let before = fx.facade.get_chamber(c.id).unwrap().participants[0].key.clone();

        assert_eq!(fx.facade.rotate_chamber_key(c.id).await.unwrap(), 2);
        let after = fx.facade.get_chamber(c.id).unwrap().participants[0].key.clone();
        assert_ne!(before, after);
        let contents: Vec<String> = fx
            .facade
            .get_messages(c.id)
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.content)
            .collect();
        assert_eq!(contents, ["one", "two"]);
    }

    #[tokio::test]
    async fn purge_keeps_recent_messages() {
        let fx = fixture();
        let c = fx.facade.create_chamber("chat", &["A"]).unwrap();
        fx.facade.store_memory("fresh", true, None, c.id).await.unwrap();
        assert_eq!(fx.facade.purge_older_than(c.id, Duration::days(1)).await.unwrap(), 0);
        assert_eq!(fx.facade.purge_older_than(c.id, Duration::zero()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn invalid_inputs_are_rejected() {
        let fx = fixture();
        assert!(matches!(
            fx.facade.create_chamber("empty", &[]),
            Err(MemoryError::InvalidInput(_))
        ));
        assert!(matches!(
            fx.facade.get_messages(Uuid::new_v4()).await,
            Err(MemoryError::NotFound { kind: "chamber", .. })
        ));
        let c = fx.facade.create_chamber("chat", &["A"]).unwrap();
        assert!(matches!(
            fx.facade.store_memory("  ", true, None, c.id).await,
            Err(MemoryError::InvalidInput(_))
        ));
        assert_eq!(fx.facade.list_chambers().unwrap().len(), 1);
    }
}
