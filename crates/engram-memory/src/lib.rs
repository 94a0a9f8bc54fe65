//! `engram-memory` – Tiered associative memory.
//!
//! # Modules
//!
//! - [`store`] – SQLite persistence for chambers, records, metadata and the
//!   graph.
//! - [`keyring`] – Chamber key resolution with regeneration of malformed keys.
//! - [`synaptic`] – The Synaptic Graph Store and its linking policy.
//! - [`importance`] – Importance scoring of a chamber's messages.
//! - [`consolidation`] – Consolidation policy and engine.
//! - [`scheduler`] – Recurring background consolidation.
//! - [`facade`] – [`MemoryFacade`], the API used by callers.

pub mod consolidation;
pub mod error;
pub mod facade;
pub mod importance;
pub mod keyring;
pub mod locks;
pub mod scheduler;
pub mod store;
pub mod synaptic;

pub use consolidation::{ConsolidationEngine, ConsolidationPolicy, ConsolidationReport};
pub use error::MemoryError;
pub use facade::{ASSOCIATION_RESULT_LIMIT, MemoryFacade};
pub use scheduler::{ConsolidationScheduler, SchedulerHandle};
pub use store::SqliteStore;
pub use synaptic::{Fingerprint, LinkPolicy, SynapticGraph};
