//! Redundancy Router – failover-aware dispatch over storage backends.
//!
//! The router owns the priority-ordered backend list. Writes encrypt once and
//! land on the highest-priority backend that accepts them; the remaining
//! backends receive best-effort mirror copies from background tasks whose
//! outcomes are published on [`MirrorEvents`]. Reads walk the list in order
//! and only fail once every backend has been tried.
//!
//! Every backend call is wrapped in the configured timeout; a timed-out call is
//! an ordinary backend failure. Uploads (primary and mirror alike) share one
//! semaphore so the number of in-flight writes stays bounded.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use engram_crypto::{ChamberKey, CryptoError, decrypt, encrypt};
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::backend::{BackendError, StorageBackend, validate_object_name};
use crate::events::{MirrorEvent, MirrorEvents, MirrorSubscriber};

// ─── Configuration ───────────────────────────────────────────────────────────

/// Tunables for [`RedundancyRouter`].
#[derive(Debug, Clone, PartialEq)]
pub struct RouterConfig {
    /// Copy every write to the lower-priority backends in the background.
    pub mirror_writes: bool,
    /// Deadline applied to each individual backend call.
    pub backend_timeout: Duration,
    /// Maximum number of concurrent uploads across all backends.
    pub max_concurrent_uploads: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            mirror_writes: true,
            backend_timeout: Duration::from_secs(30),
            max_concurrent_uploads: 4,
        }
    }
}

// ─── Results and errors ──────────────────────────────────────────────────────

/// Why one backend could not serve a request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FailureCause {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("stored ciphertext failed to decrypt")]
    Decryption,
}

/// A failure attributed to a named backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendFailure {
    pub backend: String,
    pub cause: FailureCause,
}

impl std::fmt::Display for BackendFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.backend, self.cause)
    }
}

fn join_failures(failures: &[BackendFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Error, Debug)]
pub enum RouterError {
    #[error("no storage backend is configured")]
    NoBackends,

    #[error("all storage backends failed: {}", join_failures(.0))]
    Exhausted(Vec<BackendFailure>),

    #[error("upload pool closed")]
    ShuttingDown,

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl RouterError {
    /// `true` when every reachable backend answered that the object does not
    /// exist. Unconfigured backends are ignored; any other failure means the
    /// object may still exist somewhere.
    pub fn is_miss(&self) -> bool {
        let RouterError::Exhausted(failures) = self else {
            return false;
        };
        let mut answered = false;
        for failure in failures {
            match &failure.cause {
                FailureCause::Backend(BackendError::NotFound { .. }) => answered = true,
                FailureCause::Backend(BackendError::NotConfigured { .. }) => {}
                _ => return false,
            }
        }
        answered
    }
}

/// Summary of a successful [`RedundancyRouter::store_with_redundancy`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreReceipt {
    pub name: String,
    /// Backend that durably accepted the write.
    pub primary: String,
    /// Ciphertext size in bytes.
    pub bytes: usize,
    pub mirrors_scheduled: usize,
}

/// Plaintext recovered by [`RedundancyRouter::retrieve_with_failover`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Retrieved {
    pub data: Vec<u8>,
    pub served_by: String,
    /// Backends tried (and skipped) before `served_by` answered.
    pub failures: Vec<BackendFailure>,
}

/// Static, I/O-free view of one backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendHealth {
    pub name: String,
    pub priority: u32,
    pub configured: bool,
}

// ─── Router ──────────────────────────────────────────────────────────────────

pub struct RedundancyRouter {
    backends: Vec<Arc<dyn StorageBackend>>,
    config: RouterConfig,
    uploads: Arc<Semaphore>,
    events: MirrorEvents,
    mirrors: Mutex<Vec<JoinHandle<()>>>,
}

impl RedundancyRouter {
    /// Build a router over `backends`, ordered by ascending priority.
    ///
    /// The sort is stable, so backends sharing a priority keep the order they
    /// were configured in.
    pub fn new(mut backends: Vec<Arc<dyn StorageBackend>>, config: RouterConfig) -> Self {
        backends.sort_by_key(|b| b.priority());
        let permits = config.max_concurrent_uploads.max(1);
        info!(
            backends = backends.len(),
            max_concurrent_uploads = permits,
            mirror_writes = config.mirror_writes,
            "RedundancyRouter ready"
        );
        Self {
            backends,
            config,
            uploads: Arc::new(Semaphore::new(permits)),
            events: MirrorEvents::default(),
            mirrors: Mutex::new(Vec::new()),
        }
    }

    pub fn backends(&self) -> &[Arc<dyn StorageBackend>] {
        &self.backends
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    pub fn events(&self) -> &MirrorEvents {
        &self.events
    }

    pub fn subscribe_mirrors(&self) -> MirrorSubscriber {
        self.events.subscribe()
    }

    pub fn health(&self) -> Vec<BackendHealth> {
        self.backends
            .iter()
            .map(|b| BackendHealth {
                name: b.name().to_string(),
                priority: b.priority(),
                configured: b.is_configured(),
            })
            .collect()
    }

    fn configured(&self) -> impl Iterator<Item = &Arc<dyn StorageBackend>> {
        self.backends.iter().filter(|b| b.is_configured())
    }

    fn mirrors(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.mirrors.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Encrypt `payload` under `key` and persist it as `name`.
    ///
    /// Backends are tried in priority order until one accepts the write; that
    /// backend is reported as the primary. When mirroring is enabled every
    /// configured backend after the primary gets a background copy.
    #[instrument(skip(self, payload, key), fields(bytes = payload.len()))]
    pub async fn store_with_redundancy(
        &self,
        payload: &[u8],
        name: &str,
        key: &ChamberKey,
    ) -> Result<StoreReceipt, RouterError> {
        validate_object_name(name)?;
        let ciphertext: Arc<[u8]> = encrypt(payload, key)?.into();

        let configured: Vec<&Arc<dyn StorageBackend>> = self.configured().collect();
        if configured.is_empty() {
            return Err(RouterError::NoBackends);
        }

        let mut failures = Vec::new();
        let mut primary = None;
        for (idx, backend) in configured.iter().enumerate() {
            let _permit = self
                .uploads
                .acquire()
                .await
                .map_err(|_| RouterError::ShuttingDown)?;
            let result = with_timeout(
                backend.name(),
                self.config.backend_timeout,
                backend.store(name, &ciphertext),
            )
            .await;
            match result {
                Ok(()) => {
                    primary = Some(idx);
                    break;
                }
                Err(e) => {
                    warn!(backend = backend.name(), error = %e, "primary write failed, trying next backend");
                    failures.push(BackendFailure {
                        backend: backend.name().to_string(),
                        cause: e.into(),
                    });
                }
            }
        }

        let Some(primary) = primary else {
            return Err(RouterError::Exhausted(failures));
        };

        let mut scheduled = 0;
        if self.config.mirror_writes {
            for backend in &configured[primary + 1..] {
                self.spawn_mirror(Arc::clone(*backend), name, Arc::clone(&ciphertext));
                scheduled += 1;
            }
        }

        let receipt = StoreReceipt {
            name: name.to_string(),
            primary: configured[primary].name().to_string(),
            bytes: ciphertext.len(),
            mirrors_scheduled: scheduled,
        };
        debug!(primary = %receipt.primary, mirrors = scheduled, "object stored");
        Ok(receipt)
    }

    fn spawn_mirror(&self, backend: Arc<dyn StorageBackend>, name: &str, ciphertext: Arc<[u8]>) {
        let uploads = Arc::clone(&self.uploads);
        let events = self.events.clone();
        let timeout = self.config.backend_timeout;
        let name = name.to_string();

        let handle = tokio::spawn(async move {
            let result = match uploads.acquire_owned().await {
                Ok(_permit) => {
                    with_timeout(backend.name(), timeout, backend.store(&name, &ciphertext)).await
                }
                Err(_) => Err(BackendError::Unavailable {
                    backend: backend.name().to_string(),
                    reason: "upload pool closed".to_string(),
                }),
            };
            let event = match result {
                Ok(()) => {
                    debug!(backend = backend.name(), name = %name, "mirror write completed");
                    MirrorEvent::Completed {
                        backend: backend.name().to_string(),
                        name,
                        bytes: ciphertext.len(),
                    }
                }
                Err(e) => {
                    warn!(backend = backend.name(), name = %name, error = %e, "mirror write failed");
                    MirrorEvent::Failed {
                        backend: backend.name().to_string(),
                        name,
                        reason: e.to_string(),
                    }
                }
            };
            events.publish(event);
        });

        let mut mirrors = self.mirrors();
        mirrors.retain(|h| !h.is_finished());
        mirrors.push(handle);
    }

    /// Wait for every mirror write scheduled so far. Returns how many tasks
    /// were awaited.
    pub async fn flush_mirrors(&self) -> usize {
        let mut awaited = 0;
        loop {
            let pending: Vec<JoinHandle<()>> = std::mem::take(&mut *self.mirrors());
            if pending.is_empty() {
                return awaited;
            }
            for handle in pending {
                if let Err(e) = handle.await {
                    warn!(error = %e, "mirror task aborted");
                }
                awaited += 1;
            }
        }
    }

    /// Fetch `name` and decrypt it under `key`, trying backends strictly in
    /// priority order.
    ///
    /// Transport errors, misses, timeouts and decryption failures all move on
    /// to the next backend. The call fails only when none is left.
    #[instrument(skip(self, key))]
    pub async fn retrieve_with_failover(
        &self,
        name: &str,
        key: &ChamberKey,
    ) -> Result<Retrieved, RouterError> {
        validate_object_name(name)?;
        if self.backends.is_empty() {
            return Err(RouterError::NoBackends);
        }

        let mut failures = Vec::new();
        for backend in &self.backends {
            if !backend.is_configured() {
                failures.push(BackendFailure {
                    backend: backend.name().to_string(),
                    cause: BackendError::NotConfigured {
                        backend: backend.name().to_string(),
                    }
                    .into(),
                });
                continue;
            }
            let fetched = with_timeout(
                backend.name(),
                self.config.backend_timeout,
                backend.retrieve(name),
            )
            .await;
            let cause = match fetched {
                Ok(ciphertext) => match decrypt(&ciphertext, key) {
                    Ok(data) => {
                        if !failures.is_empty() {
                            info!(
                                served_by = backend.name(),
                                skipped = failures.len(),
                                "read served after failover"
                            );
                        }
                        return Ok(Retrieved {
                            data,
                            served_by: backend.name().to_string(),
                            failures,
                        });
                    }
                    Err(_) => FailureCause::Decryption,
                },
                Err(e) => FailureCause::Backend(e),
            };
            debug!(backend = backend.name(), cause = %cause, "backend could not serve read");
            failures.push(BackendFailure {
                backend: backend.name().to_string(),
                cause,
            });
        }

        warn!(name, failures = failures.len(), "every backend failed to serve read");
        Err(RouterError::Exhausted(failures))
    }

    /// Remove `name` from every configured backend. Returns the number of
    /// backends that acknowledged the delete.
    pub async fn delete_everywhere(&self, name: &str) -> Result<usize, RouterError> {
        validate_object_name(name)?;
        let mut deleted = 0;
        let mut failures = Vec::new();
        for backend in self.configured() {
            match with_timeout(
                backend.name(),
                self.config.backend_timeout,
                backend.delete(name),
            )
            .await
            {
                Ok(()) => deleted += 1,
                Err(e) => {
                    warn!(backend = backend.name(), error = %e, "delete failed");
                    failures.push(BackendFailure {
                        backend: backend.name().to_string(),
                        cause: e.into(),
                    });
                }
            }
        }
        match (deleted, failures.is_empty()) {
            (0, true) => Err(RouterError::NoBackends),
            (0, false) => Err(RouterError::Exhausted(failures)),
            (n, _) => Ok(n),
        }
    }

    /// True as soon as any configured backend reports holding `name`.
    pub async fn exists_anywhere(&self, name: &str) -> Result<bool, RouterError> {
        validate_object_name(name)?;
        let mut answered = false;
        let mut failures = Vec::new();
        for backend in self.configured() {
            match with_timeout(
                backend.name(),
                self.config.backend_timeout,
                backend.exists(name),
            )
            .await
            {
                Ok(true) => return Ok(true),
                Ok(false) => answered = true,
                Err(e) => failures.push(BackendFailure {
                    backend: backend.name().to_string(),
                    cause: e.into(),
                }),
            }
        }
        if answered {
            Ok(false)
        } else if failures.is_empty() {
            Err(RouterError::NoBackends)
        } else {
            Err(RouterError::Exhausted(failures))
        }
    }
}

impl std::fmt::Debug for RedundancyRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedundancyRouter")
            .field("backends", &self.health())
            .field("config", &self.config)
            .finish()
    }
}

async fn with_timeout<T>(
    backend: &str,
    after: Duration,
    call: impl Future<Output = Result<T, BackendError>>,
) -> Result<T, BackendError> {
    match tokio::time::timeout(after, call).await {
        Ok(result) => result,
        Err(_) => Err(BackendError::Timeout {
            backend: backend.to_string(),
            after,
        }),
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryBackend;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn key() -> ChamberKey {
        ChamberKey::from_bytes([3u8; 32])
    }

    /// Fails every call.
    struct FailingBackend {
        name: String,
        priority: u32,
    }

    impl FailingBackend {
        fn new(name: &str, priority: u32) -> Self {
            Self { name: name.to_string(), priority }
        }

        fn err(&self) -> BackendError {
            BackendError::Unavailable {
                backend: self.name.clone(),
                reason: "connection refused".to_string(),
            }
        }
    }

    #[async_trait]
    impl StorageBackend for FailingBackend {
        fn name(&self) -> &str {
            &self.name
        }
        fn priority(&self) -> u32 {
            self.priority
        }
        fn is_configured(&self) -> bool {
            true
        }
        async fn store(&self, _: &str, _: &[u8]) -> Result<(), BackendError> {
            Err(self.err())
        }
        async fn retrieve(&self, _: &str) -> Result<Vec<u8>, BackendError> {
            Err(self.err())
        }
        async fn delete(&self, _: &str) -> Result<(), BackendError> {
            Err(self.err())
        }
        async fn exists(&self, _: &str) -> Result<bool, BackendError> {
            Err(self.err())
        }
        async fn list(&self) -> Result<Vec<String>, BackendError> {
            Err(self.err())
        }
    }

    /// Sleeps past any reasonable deadline before answering.
    struct SlowBackend;

    #[async_trait]
    impl StorageBackend for SlowBackend {
        fn name(&self) -> &str {
            "slow"
        }
        fn priority(&self) -> u32 {
            0
        }
        fn is_configured(&self) -> bool {
            true
        }
        async fn store(&self, _: &str, _: &[u8]) -> Result<(), BackendError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        }
        async fn retrieve(&self, _: &str) -> Result<Vec<u8>, BackendError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Vec::new())
        }
        async fn delete(&self, _: &str) -> Result<(), BackendError> {
            Ok(())
        }
        async fn exists(&self, _: &str) -> Result<bool, BackendError> {
            Ok(false)
        }
        async fn list(&self) -> Result<Vec<String>, BackendError> {
            Ok(Vec::new())
        }
    }

    /// Returns bytes that are not valid ciphertext.
    struct CorruptingBackend;

    #[async_trait]
    impl StorageBackend for CorruptingBackend {
        fn name(&self) -> &str {
            "corrupt"
        }
        fn priority(&self) -> u32 {
            0
        }
        fn is_configured(&self) -> bool {
            true
        }
        async fn store(&self, _: &str, _: &[u8]) -> Result<(), BackendError> {
            Ok(())
        }
        async fn retrieve(&self, _: &str) -> Result<Vec<u8>, BackendError> {
            Ok(vec![0xAB; 64])
        }
        async fn delete(&self, _: &str) -> Result<(), BackendError> {
            Ok(())
        }
        async fn exists(&self, _: &str) -> Result<bool, BackendError> {
            Ok(true)
        }
        async fn list(&self) -> Result<Vec<String>, BackendError> {
            Ok(Vec::new())
        }
    }

    /// Never configured; any call would be a bug.
    struct UnconfiguredBackend;

    #[async_trait]
    impl StorageBackend for UnconfiguredBackend {
        fn name(&self) -> &str {
            "unconfigured"
        }
        fn priority(&self) -> u32 {
            0
        }
        fn is_configured(&self) -> bool {
            false
        }
        async fn store(&self, _: &str, _: &[u8]) -> Result<(), BackendError> {
            panic!("store on unconfigured backend")
        }
        async fn retrieve(&self, _: &str) -> Result<Vec<u8>, BackendError> {
            panic!("retrieve on unconfigured backend")
        }
        async fn delete(&self, _: &str) -> Result<(), BackendError> {
            panic!("delete on unconfigured backend")
        }
        async fn exists(&self, _: &str) -> Result<bool, BackendError> {
            panic!("exists on unconfigured backend")
        }
        async fn list(&self) -> Result<Vec<String>, BackendError> {
            panic!("list on unconfigured backend")
        }
    }

    /// Records the peak number of concurrent stores.
    struct GaugeBackend {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl StorageBackend for GaugeBackend {
        fn name(&self) -> &str {
            "gauge"
        }
        fn priority(&self) -> u32 {
            1
        }
        fn is_configured(&self) -> bool {
            true
        }
        async fn store(&self, _: &str, _: &[u8]) -> Result<(), BackendError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }
        async fn retrieve(&self, _: &str) -> Result<Vec<u8>, BackendError> {
            Ok(Vec::new())
        }
        async fn delete(&self, _: &str) -> Result<(), BackendError> {
            Ok(())
        }
        async fn exists(&self, _: &str) -> Result<bool, BackendError> {
            Ok(false)
        }
        async fn list(&self) -> Result<Vec<String>, BackendError> {
            Ok(Vec::new())
        }
    }

    fn router(backends: Vec<Arc<dyn StorageBackend>>) -> RedundancyRouter {
        RedundancyRouter::new(backends, RouterConfig::default())
    }

    #[tokio::test]
    async fn read_fails_over_to_third_backend() {
        let third = Arc::new(InMemoryBackend::new("third", 2));
        third
            .store("memory_x.json", &encrypt(b"payload", &key()).unwrap())
            .await
            .unwrap();
        let router = router(vec![
            Arc::new(FailingBackend::new("first", 0)),
            Arc::new(FailingBackend::new("second", 1)),
            third,
        ]);

        let got = router.retrieve_with_failover("memory_x.json", &key()).await.unwrap();
        assert_eq!(got.data, b"payload");
        assert_eq!(got.served_by, "third");
        let tried: Vec<&str> = got.failures.iter().map(|f| f.backend.as_str()).collect();
        assert_eq!(tried, ["first", "second"]);
    }

    #[tokio::test]
    async fn backends_are_ordered_by_priority_stably() {
        let router = router(vec![
            Arc::new(InMemoryBackend::new("low", 5)),
            Arc::new(InMemoryBackend::new("tie-a", 1)),
            Arc::new(InMemoryBackend::new("top", 0)),
            Arc::new(InMemoryBackend::new("tie-b", 1)),
        ]);
        let names: Vec<String> = router.health().into_iter().map(|h| h.name).collect();
        assert_eq!(names, ["top", "tie-a", "tie-b", "low"]);
    }

    #[tokio::test]
    async fn exhausted_read_aggregates_every_failure() {
        let router = router(vec![
            Arc::new(FailingBackend::new("a", 0)),
            Arc::new(FailingBackend::new("b", 1)),
        ]);
        match router.retrieve_with_failover("memory_x.json", &key()).await {
            Err(RouterError::Exhausted(failures)) => {
                assert_eq!(failures.len(), 2);
                assert!(failures.iter().all(|f| matches!(
                    f.cause,
                    FailureCause::Backend(BackendError::Unavailable { .. })
                )));
            }
            other => panic!("expected Exhausted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn absent_everywhere_is_a_miss_not_an_outage() {
        let router = router(vec![
            Arc::new(InMemoryBackend::new("a", 0)),
            Arc::new(UnconfiguredBackend),
            Arc::new(InMemoryBackend::new("b", 2)),
        ]);
        let err = router.retrieve_with_failover("memory_x.json", &key()).await.unwrap_err();
        assert!(err.is_miss(), "{err}");

        let router = router_with_outage();
        let err = router.retrieve_with_failover("memory_x.json", &key()).await.unwrap_err();
        assert!(!err.is_miss());
        assert!(!RouterError::NoBackends.is_miss());
    }

    fn router_with_outage() -> RedundancyRouter {
        router(vec![
            Arc::new(InMemoryBackend::new("a", 0)),
            Arc::new(FailingBackend::new("down", 1)),
        ])
    }

    #[tokio::test]
    async fn decrypt_failure_is_treated_as_a_miss() {
        let good = Arc::new(InMemoryBackend::new("good", 1));
        good.store("obj", &encrypt(b"intact", &key()).unwrap()).await.unwrap();
        let router = router(vec![Arc::new(CorruptingBackend), good]);

        let got = router.retrieve_with_failover("obj", &key()).await.unwrap();
        assert_eq!(got.data, b"intact");
        assert_eq!(got.failures[0].cause, FailureCause::Decryption);
    }

    #[tokio::test]
    async fn timed_out_backend_triggers_failover() {
        let fallback = Arc::new(InMemoryBackend::new("fallback", 1));
        fallback.store("obj", &encrypt(b"late", &key()).unwrap()).await.unwrap();
        let config = RouterConfig {
            backend_timeout: Duration::from_millis(50),
            ..RouterConfig::default()
        };
        let router = RedundancyRouter::new(vec![Arc::new(SlowBackend), fallback], config);

        let got = router.retrieve_with_failover("obj", &key()).await.unwrap();
        assert_eq!(got.served_by, "fallback");
        assert!(matches!(
            got.failures[0].cause,
            FailureCause::Backend(BackendError::Timeout { .. })
        ));
    }

    #[tokio::test]
    async fn write_falls_back_when_primary_fails() {
        let standby = Arc::new(InMemoryBackend::new("standby", 1));
        let router = router(vec![
            Arc::new(FailingBackend::new("primary", 0)),
            standby.clone(),
        ]);

        let receipt = router.store_with_redundancy(b"data", "obj", &key()).await.unwrap();
        assert_eq!(receipt.primary, "standby");
        assert_eq!(receipt.mirrors_scheduled, 0);
        assert_eq!(standby.len().await, 1);
    }

    #[tokio::test]
    async fn stored_object_is_ciphertext() {
        let primary = Arc::new(InMemoryBackend::new("primary", 0));
        let router = router(vec![primary.clone()]);
        let receipt = router.store_with_redundancy(b"secret words", "obj", &key()).await.unwrap();

        let raw = primary.retrieve("obj").await.unwrap();
        assert_eq!(raw.len(), receipt.bytes);
        assert!(!raw.windows(6).any(|w| w == b"secret"));
        assert_eq!(decrypt(&raw, &key()).unwrap(), b"secret words");
    }

    #[tokio::test]
    async fn mirror_outcomes_are_published() {
        let primary = Arc::new(InMemoryBackend::new("primary", 0));
        let mirror = Arc::new(InMemoryBackend::new("mirror", 1));
        let router = router(vec![
            primary,
            mirror.clone(),
            Arc::new(FailingBackend::new("broken", 2)),
        ]);
        let mut events = router.subscribe_mirrors();

        let receipt = router.store_with_redundancy(b"data", "obj", &key()).await.unwrap();
        assert_eq!(receipt.mirrors_scheduled, 2);
        assert_eq!(router.flush_mirrors().await, 2);

        let mut seen = vec![events.recv().await.unwrap(), events.recv().await.unwrap()];
        seen.sort_by(|a, b| a.backend().cmp(b.backend()));
        assert!(matches!(&seen[0], MirrorEvent::Failed { backend, .. } if backend == "broken"));
        assert!(matches!(&seen[1], MirrorEvent::Completed { backend, .. } if backend == "mirror"));
        assert!(mirror.exists("obj").await.unwrap());
    }

    #[tokio::test]
    async fn mirroring_can_be_disabled() {
        let mirror = Arc::new(InMemoryBackend::new("mirror", 1));
        let config = RouterConfig {
            mirror_writes: false,
            ..RouterConfig::default()
        };
        let router = RedundancyRouter::new(
            vec![Arc::new(InMemoryBackend::new("primary", 0)), mirror.clone()],
            config,
        );
        let receipt = router.store_with_redundancy(b"data", "obj", &key()).await.unwrap();
        assert_eq!(receipt.mirrors_scheduled, 0);
        assert_eq!(router.flush_mirrors().await, 0);
        assert!(mirror.is_empty().await);
    }

    #[tokio::test]
    async fn unconfigured_backends_are_skipped() {
        let router = router(vec![
            Arc::new(UnconfiguredBackend),
            Arc::new(InMemoryBackend::new("ready", 1)),
        ]);
        let receipt = router.store_with_redundancy(b"data", "obj", &key()).await.unwrap();
        assert_eq!(receipt.primary, "ready");

        let got = router.retrieve_with_failover("obj", &key()).await.unwrap();
        assert!(matches!(
            got.failures[0].cause,
            FailureCause::Backend(BackendError::NotConfigured { .. })
        ));
    }

    #[tokio::test]
    async fn no_backends_is_reported() {
        let router = router(vec![Arc::new(UnconfiguredBackend)]);
        assert!(matches!(
            router.store_with_redundancy(b"x", "obj", &key()).await,
            Err(RouterError::NoBackends)
        ));
    }

    #[tokio::test]
    async fn invalid_names_are_rejected_before_io() {
        let router = router(vec![Arc::new(UnconfiguredBackend)]);
        assert!(matches!(
            router.retrieve_with_failover("../etc/passwd", &key()).await,
            Err(RouterError::Backend(BackendError::InvalidName(_)))
        ));
    }

    #[tokio::test]
    async fn uploads_respect_the_pool_bound() {
        let gauge = Arc::new(GaugeBackend {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let config = RouterConfig {
            max_concurrent_uploads: 1,
            ..RouterConfig::default()
        };
        let router = RedundancyRouter::new(
            vec![Arc::new(InMemoryBackend::new("primary", 0)), gauge.clone()],
            config,
        );
        for i in 0..5 {
            router
                .store_with_redundancy(b"data", &format!("obj{i}"), &key())
                .await
                .unwrap();
        }
        assert_eq!(router.flush_mirrors().await, 5);
        assert_eq!(gauge.peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn delete_and_exists_span_backends() {
        let a = Arc::new(InMemoryBackend::new("a", 0));
        let b = Arc::new(InMemoryBackend::new("b", 1));
        b.store("obj", b"bytes").await.unwrap();
        let router = router(vec![a, b]);

        assert!(router.exists_anywhere("obj").await.unwrap());
        assert_eq!(router.delete_everywhere("obj").await.unwrap(), 2);
        assert!(!router.exists_anywhere("obj").await.unwrap());
    }

    #[tokio::test]
    async fn exists_with_only_failing_backends_is_an_error() {
        let router = router(vec![Arc::new(FailingBackend::new("down", 0))]);
        assert!(matches!(
            router.exists_anywhere("obj").await,
            Err(RouterError::Exhausted(_))
        ));
    }
}
