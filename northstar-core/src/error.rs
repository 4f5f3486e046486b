//! Error types for Northstar operations

use crate::enums::{EntityType, ObjectiveLevel};
use thiserror::Error;
use uuid::Uuid;

/// Storage layer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Entity not found: {entity_type:?} with id {id}")]
    NotFound { entity_type: EntityType, id: Uuid },

    #[error("Insert failed for {entity_type:?}: {reason}")]
    InsertFailed {
        entity_type: EntityType,
        reason: String,
    },

    #[error("Update failed for {entity_type:?} with id {id}: {reason}")]
    UpdateFailed {
        entity_type: EntityType,
        id: Uuid,
        reason: String,
    },

    #[error(
        "Write conflict on {entity_type:?} with id {id}: expected revision {expected}, found {found}"
    )]
    WriteConflict {
        entity_type: EntityType,
        id: Uuid,
        expected: i64,
        found: i64,
    },

    #[error("Batch write failed: {reason}")]
    TransactionFailed { reason: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Hierarchy and input validation errors. Rejected before any write.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Parent level mismatch: {level:?} objectives require a {expected:?} parent, found {found:?}")]
    ParentLevelMismatch {
        level: ObjectiveLevel,
        expected: ObjectiveLevel,
        found: ObjectiveLevel,
    },

    #[error("Objectives below company level require at least one contributor")]
    MissingContributors,

    #[error("Circular parent reference involving objective {objective_id}")]
    CircularReference { objective_id: Uuid },
}

/// Progress aggregation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AggregationError {
    #[error("Parent chain from objective {objective_id} exceeded {max_hops} hops")]
    HopLimitExceeded { objective_id: Uuid, max_hops: u32 },

    #[error("Gave up recalculating objective {objective_id} after {attempts} conflicting writes")]
    RetriesExhausted { objective_id: Uuid, attempts: u32 },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Notification boundary errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NotifyError {
    #[error("Failed to enqueue notification for user {user_id}: {reason}")]
    EnqueueFailed { user_id: Uuid, reason: String },
}

/// Master error type for all Northstar errors.
#[derive(Debug, Clone, Error)]
pub enum NorthstarError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Aggregation error: {0}")]
    Aggregation(#[from] AggregationError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Notify error: {0}")]
    Notify(#[from] NotifyError),
}

/// Result type alias for Northstar operations.
pub type NorthstarResult<T> = Result<T, NorthstarError>;

// =============================================================================
// TESTS
// =============================================================================
