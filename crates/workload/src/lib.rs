//! logcurator workload crate.
//!
//! Fetches workload (pod) information from the orchestrator, decides which
//! sources to collect, and keeps per-source metadata and cancellation handles.
//!
//! # Module Structure
//!
//! - [`error`]: Domain error types (`WorkloadError`)
//! - [`event`]: Workload snapshots and events (`WorkloadInfo`, `WorkloadEvent`, `InformerState`)
//! - [`client`]: Orchestrator API abstraction (`WorkloadClient` trait, `KubeWorkloadClient`)
//! - [`policy`]: Namespace and label admission (`SourcePolicy`)
//! - [`cache`]: Per-source metadata and cancellation (`MetadataCache`, `SourceHandle`)
//!
//! # Architecture
//!
//! ```text
//! WorkloadClient.watch() --mpsc--> discovery controller
//!                                      |
//!                              MetadataCache.try_track()
//!                                      |
//!                              tailer --lookup_or_fetch()--> WorkloadClient.get_workload()
//! ```

pub mod cache;
pub mod client;
pub mod error;
pub mod event;
pub mod policy;

// --- Public API Re-exports ---

pub use cache::{CachedMetadata, MetadataCache, SourceHandle};
pub use client::{KubeWorkloadClient, WorkloadClient};
pub use error::WorkloadError;
pub use event::{ContainerMeta, InformerState, WorkloadEvent, WorkloadInfo};
pub use policy::SourcePolicy;
