//! `engram-storage` – Encrypted object storage with failover.
//!
//! Everything that leaves the local database passes through this crate as
//! ciphertext.
//!
//! # Modules
//!
//! - [`backend`] – The [`StorageBackend`] trait and its error type.
//! - [`memory`], [`directory`], [`http`] – Concrete backends.
//! - [`registry`] – Tagged backend configuration resolved once at startup.
//! - [`router`] – The [`RedundancyRouter`]: priority ordering, primary write
//!   with background mirrors, read failover, per-call timeouts.
//! - [`events`] – Broadcast bus carrying mirror-write outcomes.

pub mod backend;
pub mod directory;
pub mod events;
pub mod http;
pub mod memory;
pub mod registry;
pub mod router;

pub use backend::{BackendError, StorageBackend};
pub use directory::DirectoryBackend;
pub use events::{MirrorEvent, MirrorEvents, MirrorSubscriber};
pub use http::HttpObjectBackend;
pub use memory::InMemoryBackend;
pub use registry::{BackendConfig, build_backend, build_backends};
pub use router::{
    BackendFailure, BackendHealth, FailureCause, RedundancyRouter, Retrieved, RouterConfig,
    RouterError, StoreReceipt,
};
