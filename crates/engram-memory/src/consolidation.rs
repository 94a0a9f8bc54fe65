//! Consolidation Engine.
//!
//! Each cycle walks the short-term metadata entries that still await
//! consolidation, oldest first, and decides per entry:
//!
//! 1. **Capacity eviction** – when more entries are pending than
//!    [`ConsolidationPolicy::short_term_memory_limit`] allows, the oldest
//!    excess entries migrate unconditionally.
//! 2. **Policy eligibility** – every other entry migrates only if it is old
//!    enough, was read often enough and scores high enough.
//!
//! Migration decrypts the chamber's messages, serialises them to
//! [`ConsolidatedMemory`] JSON and hands them to the
//! [`RedundancyRouter`] under a key derived from the metadata id. The entry is
//! flipped to `consolidated` only after the primary write succeeded; any
//! failure leaves it pending for the next cycle.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use engram_crypto::{ChamberKey, decrypt, derive_record_key};
use engram_storage::{RedundancyRouter, StoreReceipt};
use engram_types::{
    ConsolidatedMemory, ConsolidatedMessage, ConsolidationOutcome, DeferReason, MemoryMetadata,
};
use futures_util::future::join_all;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::error::MemoryError;
use crate::importance::{ImportanceInputs, importance_score};
use crate::keyring::Keyring;
use crate::locks::ChamberLocks;
use crate::store::SqliteStore;

// ─────────────────────────────────────────────────────────────────────────────
// Policy
// ─────────────────────────────────────────────────────────────────────────────

/// Thresholds driving consolidation.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsolidationPolicy {
    pub short_term_memory_limit: usize,
    pub consolidation_threshold: f64,
    pub access_frequency_threshold: u64,
    pub age_threshold: Duration,
}

impl Default for ConsolidationPolicy {
    fn default() -> Self {
        Self {
            short_term_memory_limit: 100,
            consolidation_threshold: 0.7,
            access_frequency_threshold: 3,
            age_threshold: Duration::days(7),
        }
    }
}

/// Which entries one cycle migrates and which it defers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConsolidationPlan {
    /// Oldest entries beyond the short-term capacity.
    pub evicted: Vec<Uuid>,
    /// Entries satisfying every policy condition.
    pub eligible: Vec<Uuid>,
    pub deferred: Vec<(Uuid, DeferReason)>,
}

impl ConsolidationPlan {
    pub fn to_migrate(&self) -> impl Iterator<Item = Uuid> + '_ {
        self.evicted.iter().chain(self.eligible.iter()).copied()
    }
}

impl ConsolidationPolicy {
    /// Check the age, access and importance conditions of one entry.
    ///
    /// All three must hold; the first failing one is reported.
    pub fn evaluate(&self, meta: &MemoryMetadata, now: DateTime<Utc>) -> Result<(), DeferReason> {
        let age = meta.age(now);
        if age < self.age_threshold {
            return Err(DeferReason::TooRecent {
                age_secs: age.num_seconds(),
                required_secs: self.age_threshold.num_seconds(),
            });
        }
        if meta.access_count < self.access_frequency_threshold {
            return Err(DeferReason::InfrequentlyAccessed {
                access_count: meta.access_count,
                required: self.access_frequency_threshold,
            });
        }
        if meta.importance < self.consolidation_threshold {
            return Err(DeferReason::LowImportance {
                score: meta.importance,
                required: self.consolidation_threshold,
            });
        }
        Ok(())
    }

    /// Split `pending` into evicted, eligible and deferred entries.
    pub fn plan(&self, pending: &[MemoryMetadata], now: DateTime<Utc>) -> ConsolidationPlan {
        let mut ordered: Vec<&MemoryMetadata> =
            pending.iter().filter(|m| m.awaits_consolidation()).collect();
        ordered.sort_by_key(|m| m.created_at);

        let excess = ordered.len().saturating_sub(self.short_term_memory_limit);
        let mut plan = ConsolidationPlan::default();
        for (idx, meta) in ordered.into_iter().enumerate() {
            if idx < excess {
                plan.evicted.push(meta.id);
                continue;
            }
            match self.evaluate(meta, now) {
                Ok(()) => plan.eligible.push(meta.id),
                Err(reason) => plan.deferred.push((meta.id, reason)),
            }
        }
        plan
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Report
// ─────────────────────────────────────────────────────────────────────────────

/// Result of one consolidation cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConsolidationReport {
    pub examined: usize,
    pub consolidated: usize,
    pub deferred: usize,
    pub failed: usize,
    pub bytes_written: usize,
    /// Per-entry outcome, keyed by metadata id.
    pub outcomes: Vec<(Uuid, ConsolidationOutcome)>,
}

impl ConsolidationReport {
    pub fn succeeded(&self) -> bool {
        self.failed == 0
    }

    fn push(&mut self, id: Uuid, outcome: ConsolidationOutcome) {
        match &outcome {
            ConsolidationOutcome::Consolidated { bytes, .. } => {
                self.consolidated += 1;
                self.bytes_written += bytes;
            }
            ConsolidationOutcome::Deferred(_) => self.deferred += 1,
            ConsolidationOutcome::Failed(_) => self.failed += 1,
        }
        self.outcomes.push((id, outcome));
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Engine
// ─────────────────────────────────────────────────────────────────────────────

pub struct ConsolidationEngine {
    store: Arc<SqliteStore>,
    router: Arc<RedundancyRouter>,
    keyring: Keyring,
    locks: Arc<ChamberLocks>,
    policy: ConsolidationPolicy,
    secret: ChamberKey,
    cycle: tokio::sync::Mutex<()>,
}

impl ConsolidationEngine {
    pub fn new(
        store: Arc<SqliteStore>,
        router: Arc<RedundancyRouter>,
        locks: Arc<ChamberLocks>,
        policy: ConsolidationPolicy,
        secret: ChamberKey,
    ) -> Self {
        Self {
            keyring: Keyring::new(Arc::clone(&store)),
            store,
            router,
            locks,
            policy,
            secret,
            cycle: tokio::sync::Mutex::new(()),
        }
    }

    pub fn policy(&self) -> &ConsolidationPolicy {
        &self.policy
    }

    pub fn router(&self) -> &Arc<RedundancyRouter> {
        &self.router
    }

    /// Key under which `memory_<metadata_id>.json` is encrypted.
    pub fn record_key(&self, metadata_id: Uuid) -> Result<ChamberKey, MemoryError> {
        Ok(derive_record_key(&self.secret, metadata_id)?)
    }

    /// Run one full cycle. Only one cycle runs at a time.
    ///
    /// Per-entry failures are reported in the returned
    /// [`ConsolidationReport`]; an `Err` means the pending set itself could
    /// not be read.
    #[instrument(skip(self))]
    pub async fn run_cycle(&self) -> Result<ConsolidationReport, MemoryError> {
        let _cycle = self.cycle.lock().await;
        let now = Utc::now();

        let mut pending = self.store.pending_metadata()?;
        for meta in &mut pending {
            let records = self.store.records_for_chamber(meta.chamber_id)?;
            meta.importance = importance_score(&ImportanceInputs::from_records(&records), now);
            self.store.set_importance(meta.id, meta.importance)?;
        }

        let plan = self.policy.plan(&pending, now);
        let mut report = ConsolidationReport {
            examined: pending.len(),
            ..ConsolidationReport::default()
        };

        let migrations = plan.to_migrate().map(|id| async move {
            let outcome = self.consolidate_entry(id).await;
            (id, outcome)
        });
        for (id, outcome) in join_all(migrations).await {
            report.push(id, outcome);
        }
        for (id, reason) in plan.deferred {
            debug!(metadata = %id, %reason, "consolidation deferred");
            report.push(id, ConsolidationOutcome::Deferred(reason));
        }

        info!(
            examined = report.examined,
            consolidated = report.consolidated,
            deferred = report.deferred,
            failed = report.failed,
            bytes = report.bytes_written,
            "consolidation cycle finished"
        );
        Ok(report)
    }

    /// Migrate one entry, converting every failure into an outcome.
    async fn consolidate_entry(&self, metadata_id: Uuid) -> ConsolidationOutcome {
        match self.migrate(metadata_id).await {
            Ok((receipt, unreadable)) => ConsolidationOutcome::Consolidated {
                bytes: receipt.bytes,
                backend: receipt.primary,
                unreadable,
            },
            Err(e) => {
                warn!(metadata = %metadata_id, error = %e, "consolidation failed; entry stays pending");
                ConsolidationOutcome::Failed(e.to_string())
            }
        }
    }

    #[instrument(skip(self))]
    ///
    /// Records that fail to decrypt are left out of the snapshot and counted;
    /// the entry still consolidates.
    async fn migrate(&self, metadata_id: Uuid) -> Result<(StoreReceipt, usize), MemoryError> {
        let chamber_id = self
            .store
            .get_metadata(metadata_id)?
            .ok_or(MemoryError::NotFound { kind: "metadata", id: metadata_id })?
            .chamber_id;
        let _guard = self.locks.lock(chamber_id).await;
        let meta = self
            .store
            .get_metadata(metadata_id)?
            .ok_or(MemoryError::NotFound { kind: "metadata", id: metadata_id })?;

        let key = self.keyring.resolve(chamber_id)?;
        let records = self.store.records_for_chamber(chamber_id)?;
        let now = Utc::now();
        let importance = importance_score(&ImportanceInputs::from_records(&records), now);

        let mut messages = Vec::with_capacity(records.len());
        let mut unreadable = Vec::new();
        for record in &records {
            let Ok(plaintext) = decrypt(&record.ciphertext, &key) else {
                unreadable.push(record.id);
                continue;
            };
            messages.push(ConsolidatedMessage {
                id: record.id,
                is_user: record.is_user,
                persona: record.persona.clone(),
                created_at: record.created_at,
                content: String::from_utf8_lossy(&plaintext).into_owned(),
            });
        }

        let payload = serde_json::to_vec(&ConsolidatedMemory {
            metadata_id: meta.id,
            chamber_id,
            importance,
            consolidated_at: now,
            messages,
            unreadable: unreadable.clone(),
        })?;
        let record_key = self.record_key(meta.id)?;
        let receipt = self
            .router
            .store_with_redundancy(&payload, &meta.storage_name(), &record_key)
            .await?;

        self.store.mark_consolidated(meta.id, importance)?;
        info!(
            metadata = %meta.id,
            chamber = %chamber_id,
            backend = %receipt.primary,
            bytes = receipt.bytes,
            "memory consolidated"
        );
        if !unreadable.is_empty() {
            error!(
                metadata = %meta.id,
                chamber = %chamber_id,
                unreadable = unreadable.len(),
                "records failed to decrypt and were left out of the consolidated copy"
            );
        }
        Ok((receipt, unreadable.len()))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
