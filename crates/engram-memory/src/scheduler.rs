//! Recurring consolidation.
//!
//! [`ConsolidationScheduler::spawn`] drives [`ConsolidationEngine::run_cycle`]
//! on a Tokio interval until the returned [`SchedulerHandle`] is shut down.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::consolidation::ConsolidationEngine;

/// Default cycle period.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60 * 60);

pub struct ConsolidationScheduler;

impl ConsolidationScheduler {
    /// Start the background loop. The first cycle runs one `every` after
    /// spawning.
    pub fn spawn(engine: Arc<ConsolidationEngine>, every: Duration) -> SchedulerHandle {
        let (shutdown, mut stop) = watch::channel(false);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + every, every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(interval_secs = every.as_secs(), "consolidation scheduler started");
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = engine.run_cycle().await {
                            error!(error = %e, "consolidation cycle aborted");
                        }
                    }
                    changed = stop.changed() => {
                        if changed.is_err() || *stop.borrow() {
                            break;
                        }
                    }
                }
            }
            info!("consolidation scheduler stopped");
        });
        SchedulerHandle { shutdown, task }
    }
}

/// Owner of a running scheduler loop.
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stop the loop and wait for it to exit. A cycle already in progress is
    /// allowed to finish.
    pub async fn shutdown(self) {
        if self.shutdown.send(true).is_err() {
            debug!("consolidation scheduler already stopped");
        }
        if let Err(e) = self.task.await
            && e.is_panic()
        {
            warn!(error = %e, "consolidation scheduler task panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consolidation::ConsolidationPolicy;
    use crate::locks::ChamberLocks;
    use crate::store::SqliteStore;
    use chrono::Utc;
    use engram_crypto::{ChamberKey, generate_key};
    use engram_storage::{InMemoryBackend, RedundancyRouter, RouterConfig, StorageBackend};
    use engram_types::{Chamber, ConsolidationStatus, MemoryMetadata, Persona};
    use uuid::Uuid;

    #[tokio::test]
    async fn scheduler_runs_cycles_until_shutdown() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let backend = Arc::new(InMemoryBackend::new("mem", 0));
        let router = Arc::new(RedundancyRouter::new(
            vec![backend.clone() as Arc<dyn StorageBackend>],
            RouterConfig::default(),
        ));
        let engine = Arc::new(ConsolidationEngine::new(
            Arc::clone(&store),
            router,
            Arc::new(ChamberLocks::new()),
            ConsolidationPolicy {
                short_term_memory_limit: 0,
                ..ConsolidationPolicy::default()
            },
            ChamberKey::from_bytes([4u8; 32]),
        ));

        let chamber = Chamber {
            id: Uuid::new_v4(),
            name: "timed".into(),
            participants: vec![Persona { name: "A".into(), key: generate_key().encoded() }],
            created_at: Utc::now(),
        };
        let meta = MemoryMetadata::new(chamber.id);
        store.insert_chamber(&chamber, &meta).unwrap();

        let handle = ConsolidationScheduler::spawn(engine, Duration::from_millis(20));
        let mut consolidated = false;
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(20)).await;
            let status = store.get_metadata(meta.id).unwrap().unwrap().status;
            if status == ConsolidationStatus::Consolidated {
                consolidated = true;
                break;
            }
        }
        assert!(consolidated);
        assert!(handle.is_running());
        handle.shutdown().await;
        assert_eq!(backend.len().await, 1);
    }

    #[tokio::test]
    async fn shutdown_after_the_loop_is_gone_returns() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let router = Arc::new(RedundancyRouter::new(
            vec![Arc::new(InMemoryBackend::new("mem", 0)) as Arc<dyn StorageBackend>],
            RouterConfig::default(),
        ));
        let engine = Arc::new(ConsolidationEngine::new(
            store,
            router,
            Arc::new(ChamberLocks::new()),
            ConsolidationPolicy::default(),
            ChamberKey::from_bytes([6u8; 32]),
        ));

        let handle = ConsolidationScheduler::spawn(engine, Duration::from_secs(3600));
        handle.task.abort();
        while handle.is_running() {
            tokio::task::yield_now().await;
        }
        handle.shutdown().await;
    }
}
