//! Per-chamber write locks.
//!
//! Mutations of a chamber's records, metadata and graph nodes are serialised
//! by that chamber's async mutex. Different chambers never contend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::OwnedMutexGuard;
use uuid::Uuid;

#[derive(Default)]
pub struct ChamberLocks {
    locks: Mutex<HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>>,
}

impl ChamberLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the write lock of `chamber_id`, waiting if another task holds it.
    pub async fn lock(&self, chamber_id: Uuid) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|p| p.into_inner());
            Arc::clone(locks.entry(chamber_id).or_default())
        };
        lock.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn same_chamber_is_serialised() {
        let locks = Arc::new(ChamberLocks::new());
        let chamber = Uuid::new_v4();
        let guard = locks.lock(chamber).await;

        let contender = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let _g = locks.lock(chamber).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());
        drop(guard);
        contender.await.unwrap();
    }

    #[tokio::test]
    async fn different_chambers_do_not_contend() {
        let locks = ChamberLocks::new();
        let _a = locks.lock(Uuid::new_v4()).await;
        let b = tokio::time::timeout(Duration::from_millis(50), locks.lock(Uuid::new_v4())).await;
        assert!(b.is_ok());
    }
}
