//! Core entity structures

use crate::enums::{ObjectiveLevel, ProgressStatus, Quarter};
use crate::{new_entity_id, EntityId, Timestamp};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity of the caller performing a mutation.
///
/// Threaded explicitly through every mutating call; there is no ambient
/// "current user" state anywhere in the engine. Audit fields
/// (`created_by`/`updated_by`) are stamped from this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorContext {
    pub user_id: EntityId,
}

impl ActorContext {
    /// Context for a named user.
    pub fn new(user_id: EntityId) -> Self {
        Self { user_id }
    }

    /// Context for engine-internal maintenance operations.
    pub fn system() -> Self {
        Self {
            user_id: Uuid::nil(),
        }
    }
}

/// Objective - a goal at company, department, or individual level.
///
/// `progress` and `status` are derived by the aggregator and never set
/// directly by a user action. `revision` is the optimistic-concurrency token
/// checked by batched writes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Objective {
    pub objective_id: EntityId,
    pub title: String,
    pub description: Option<String>,
    pub level: ObjectiveLevel,
    pub parent_id: Option<EntityId>,
    pub status: ProgressStatus,
    pub progress: i32,
    /// Directly linked KPI ids, deduplicated. Insertion order is irrelevant.
    pub kpi_ids: Vec<EntityId>,
    /// Users responsible for the objective, deduplicated.
    pub contributors: Vec<EntityId>,
    pub due_date: Option<Timestamp>,
    pub quarter: Option<Quarter>,
    pub year: Option<i32>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub created_by: EntityId,
    pub updated_by: EntityId,
    pub revision: i64,
}

impl Objective {
    /// Create a new objective from a creation payload.
    ///
    /// Progress starts at 0 with the status derived from it; both are
    /// recomputed by the aggregator on every relevant mutation afterwards.
    pub fn new(data: NewObjective, actor: &ActorContext) -> Self {
        let now = Utc::now();
        Self {
            objective_id: new_entity_id(),
            title: data.title,
            description: data.description,
            level: data.level,
            parent_id: data.parent_id,
            status: crate::progress::status_for_progress(0),
            progress: 0,
            kpi_ids: Vec::new(),
            contributors: dedup_ids(data.contributors),
            due_date: data.due_date,
            quarter: data.quarter,
            year: data.year,
            created_at: now,
            updated_at: now,
            created_by: actor.user_id,
            updated_by: actor.user_id,
            revision: 0,
        }
    }

    /// Whether this objective has been archived.
    pub fn is_archived(&self) -> bool {
        self.status.is_archived()
    }

    /// Whether a KPI is directly linked to this objective.
    pub fn has_kpi(&self, kpi_id: EntityId) -> bool {
        self.kpi_ids.contains(&kpi_id)
    }
}

/// Creation payload for an objective: the entity minus id and derived fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewObjective {
    pub title: String,
    pub description: Option<String>,
    pub level: ObjectiveLevel,
    pub parent_id: Option<EntityId>,
    pub contributors: Vec<EntityId>,
    pub due_date: Option<Timestamp>,
    pub quarter: Option<Quarter>,
    pub year: Option<i32>,
}

impl NewObjective {
    /// Minimal payload for the given title and level.
    pub fn new(title: &str, level: ObjectiveLevel) -> Self {
        Self {
            title: title.to_string(),
            description: None,
            level,
            parent_id: None,
            contributors: Vec::new(),
            due_date: None,
            quarter: None,
            year: None,
        }
    }

    /// Set the parent objective.
    pub fn with_parent(mut self, parent_id: EntityId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    /// Set the description.
    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    /// Set the responsible contributors.
    pub fn with_contributors(mut self, contributors: Vec<EntityId>) -> Self {
        self.contributors = contributors;
        self
    }

    /// Set scheduling metadata.
    pub fn with_schedule(mut self, quarter: Quarter, year: i32) -> Self {
        self.quarter = Some(quarter);
        self.year = Some(year);
        self
    }

    /// Set the due date.
    pub fn with_due_date(mut self, due_date: Timestamp) -> Self {
        self.due_date = Some(due_date);
        self
    }
}

/// KPI - a measured value tracked against a target.
///
/// `progress` is `clamp(round(value / target * 100), 0, 100)` and `status`
/// follows the same thresholds as objectives. `objective_ids` is the
/// back-reference side of the objective/KPI edge, owned jointly with
/// `Objective.kpi_ids`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Kpi {
    pub kpi_id: EntityId,
    pub name: String,
    pub value: f64,
    pub target: f64,
    pub progress: i32,
    pub status: ProgressStatus,
    /// Objectives this KPI is linked to, deduplicated.
    pub objective_ids: Vec<EntityId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub created_by: EntityId,
    pub updated_by: EntityId,
    pub revision: i64,
}

impl Kpi {
    /// Create a new KPI from a creation payload with its progress and status
    /// already derived from the initial measurement.
    ///
    /// Callers validate the non-zero target beforehand; `progress` here is
    /// the same canonical formula.
    pub fn new(data: NewKpi, progress: i32, actor: &ActorContext) -> Self {
        let now = Utc::now();
        Self {
            kpi_id: new_entity_id(),
            name: data.name,
            value: data.value,
            target: data.target,
            progress,
            status: crate::progress::status_for_progress(progress),
            objective_ids: Vec::new(),
            created_at: now,
            updated_at: now,
            created_by: actor.user_id,
            updated_by: actor.user_id,
            revision: 0,
        }
    }

    /// Whether this KPI is linked to an objective.
    pub fn is_linked_to(&self, objective_id: EntityId) -> bool {
        self.objective_ids.contains(&objective_id)
    }
}

/// Creation payload for a KPI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewKpi {
    pub name: String,
    pub value: f64,
    pub target: f64,
}

impl NewKpi {
    /// Payload with an initial measurement against a target.
    pub fn new(name: &str, value: f64, target: f64) -> Self {
        Self {
            name: name.to_string(),
            value,
            target,
        }
    }
}

/// Deduplicate an id list, keeping first occurrences in order.
pub fn dedup_ids(ids: Vec<EntityId>) -> Vec<EntityId> {
    let mut seen = std::collections::HashSet::new();
    ids.into_iter().filter(|id| seen.insert(*id)).collect()
}
