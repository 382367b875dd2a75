//! Health Metrics Core - portable sync core for mobile health-metrics observers
//!
//! This crate unifies the logic a health-metrics mobile plugin previously
//! reimplemented per platform: consolidating multi-source quantity samples,
//! encoding retained samples into outbound backend records, and keeping the
//! scalar bookkeeping (last-saved dates, last counts sent) that drives the
//! next sync window.
//!
//! ## Modules
//!
//! - **Consolidation**: resolve cross-source temporal overlaps, keeping the
//!   highest-value reading per overlap group
//! - **Records**: map samples to outbound metric records and payloads
//! - **Status**: observer bookkeeping over an injected key-value store
//! - **Adapters**: parse platform query results (Google Fit, HealthKit) into
//!   neutral samples
//! - **Sync**: fetch → consolidate → send orchestration behind trait seams

pub mod adapters;
pub mod consolidate;
pub mod error;
pub mod records;
pub mod status;
pub mod sync;
pub mod types;

// FFI bindings for host-plugin interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use consolidate::{check_overlap, consolidate_if_needed};
pub use error::MetricsError;
pub use records::{MetricRecord, MetricsPayload, RecordEncoder};
pub use status::{KeyValueStore, MemoryStore, ObserverStatus};
pub use sync::{MetricsBackend, SampleQuery, SyncEngine, SyncOutcome};
pub use types::{MetricType, MobilePlatform, Sample};

/// Core version embedded in outbound payload provenance
pub const CORE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Source tag for records produced by a background observer sync
pub const OBSERVER_SOURCE: &str = "OBSERVER";
