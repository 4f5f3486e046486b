//! Northstar Core - Entity Types
//!
//! Pure data structures with no behavior. All other crates depend on this.
//! This crate contains ONLY data types and canonical derivation math - no
//! storage access and no orchestration logic.

use chrono::{DateTime, Utc};
use uuid::Uuid;

pub mod config;
pub mod entities;
pub mod enums;
pub mod error;
pub mod notification;
pub mod progress;

pub use config::EngineConfig;
pub use entities::{dedup_ids, ActorContext, Kpi, NewKpi, NewObjective, Objective};
pub use enums::{
    EntityType, EnumParseError, NotificationPriority, NotificationType, ObjectiveLevel,
    ProgressStatus, Quarter,
};
pub use error::{
    AggregationError, ConfigError, NorthstarError, NorthstarResult, NotifyError, StorageError,
    ValidationError,
};
pub use notification::NotificationRecord;
pub use progress::{measurement_progress, rollup_progress, status_for_progress};

// ============================================================================
// IDENTITY TYPES
// ============================================================================

/// Entity identifier using UUIDv7 for timestamp-sortable IDs.
/// UUIDv7 embeds a Unix timestamp, making IDs naturally sortable by creation time.
pub type EntityId = Uuid;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Generate a new UUIDv7 EntityId (timestamp-sortable).
pub fn new_entity_id() -> EntityId {
    Uuid::now_v7()
}
