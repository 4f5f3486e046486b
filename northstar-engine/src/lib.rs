//! Northstar Engine - Hierarchical Progress Aggregation
//!
//! Keeps a three-level tree of objectives (company -> department ->
//! individual) and their linked KPIs consistent: any leaf change is rolled
//! up to the root before the triggering call resolves.
//!
//! # Architecture
//!
//! ```text
//! UI / forms
//!     |
//!     v
//! OkrService ---- HierarchyValidator   (tree-shape rules, cycle rejection)
//!     |      \--- KpiLinker            (both edge sides in one batch)
//!     |      \--- ArchivalManager      (soft retire + parent re-rollup)
//!     v
//! ProgressAggregator                    (read-compute-CAS-write per node,
//!     |                                  explicit parent-pointer loop)
//!     v
//! ObjectiveStore          NotificationSink
//! (document store)        (threshold-crossing records, best effort)
//! ```
//!
//! Writes that derive state (progress, status, edges) are conditioned on the
//! document revision they were read at and retried as a whole cycle on
//! conflict; user-field merges go through the store's atomic single-document
//! update.

pub mod aggregator;
pub mod archival;
pub mod hierarchy;
pub mod linker;
pub mod notify;
pub mod service;

pub use aggregator::ProgressAggregator;
pub use archival::ArchivalManager;
pub use hierarchy::HierarchyValidator;
pub use linker::{edge_is_consistent, KpiLinker};
pub use notify::{InMemorySink, NotificationSink, NullSink};
pub use service::OkrService;

// Re-export the types callers need alongside the engine
pub use northstar_core::{
    ActorContext, EngineConfig, Kpi, NewKpi, NewObjective, NorthstarError, NorthstarResult,
    Objective, ObjectiveLevel, ProgressStatus,
};
pub use northstar_storage::{InMemoryStorage, ObjectiveStore, ObjectiveUpdate, WriteOp};
