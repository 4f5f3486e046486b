//! Northstar Test Utilities
//!
//! Centralized test infrastructure for the Northstar workspace:
//! - Proptest generators for entity types
//! - Fixtures for common tree shapes
//! - Fault-injecting storage decorators for conflict/retry paths

// Re-export the in-memory storage from its source crate
pub use northstar_storage::InMemoryStorage;

// Re-export core types for convenience
pub use northstar_core::{
    measurement_progress, new_entity_id, rollup_progress, status_for_progress, ActorContext,
    EngineConfig, EntityId, EntityType, Kpi, NewKpi, NewObjective, NorthstarError,
    NorthstarResult, Objective, ObjectiveLevel, ProgressStatus, Quarter, StorageError, Timestamp,
};

use async_trait::async_trait;
use northstar_storage::{ObjectiveStore, ObjectiveUpdate, WriteOp};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use uuid::Uuid;

// ============================================================================
// FAULT-INJECTING STORAGE
// ============================================================================

/// Storage decorator that fails the first N batched writes with a
/// `WriteConflict`, then behaves like its inner store. Reads and
/// single-document merges pass straight through.
///
/// Exercises the engine's bounded retry paths without needing real
/// interleaved writers.
pub struct ConflictingStorage {
    inner: Arc<dyn ObjectiveStore>,
    remaining_conflicts: AtomicU32,
}

impl ConflictingStorage {
    /// Wrap a store; the next `conflicts` batch writes will fail.
    pub fn new(inner: Arc<dyn ObjectiveStore>, conflicts: u32) -> Self {
        Self {
            inner,
            remaining_conflicts: AtomicU32::new(conflicts),
        }
    }

    /// How many injected conflicts are still pending.
    pub fn remaining(&self) -> u32 {
        self.remaining_conflicts.load(Ordering::SeqCst)
    }

    fn conflict_for(op: &WriteOp) -> StorageError {
        match op {
            WriteOp::PutObjective(doc) => StorageError::WriteConflict {
                entity_type: EntityType::Objective,
                id: doc.objective_id,
                expected: doc.revision,
                found: doc.revision + 1,
            },
            WriteOp::PutKpi(doc) => StorageError::WriteConflict {
                entity_type: EntityType::Kpi,
                id: doc.kpi_id,
                expected: doc.revision,
                found: doc.revision + 1,
            },
        }
    }
}

#[async_trait]
impl ObjectiveStore for ConflictingStorage {
    async fn objective_insert(&self, o: &Objective) -> NorthstarResult<()> {
        self.inner.objective_insert(o).await
    }

    async fn objective_get(&self, id: Uuid) -> NorthstarResult<Option<Objective>> {
        self.inner.objective_get(id).await
    }

    async fn objective_list(&self) -> NorthstarResult<Vec<Objective>> {
        self.inner.objective_list().await
    }

    async fn objective_list_active(&self) -> NorthstarResult<Vec<Objective>> {
        self.inner.objective_list_active().await
    }

    async fn objective_list_children(&self, parent_id: Uuid) -> NorthstarResult<Vec<Objective>> {
        self.inner.objective_list_children(parent_id).await
    }

    async fn objective_update(&self, id: Uuid, update: ObjectiveUpdate) -> NorthstarResult<()> {
        self.inner.objective_update(id, update).await
    }

    async fn kpi_insert(&self, k: &Kpi) -> NorthstarResult<()> {
        self.inner.kpi_insert(k).await
    }

    async fn kpi_get(&self, id: Uuid) -> NorthstarResult<Option<Kpi>> {
        self.inner.kpi_get(id).await
    }

    async fn kpi_list(&self) -> NorthstarResult<Vec<Kpi>> {
        self.inner.kpi_list().await
    }

    async fn batch_write(&self, ops: Vec<WriteOp>) -> NorthstarResult<()> {
        let pending = self.remaining_conflicts.load(Ordering::SeqCst);
        if pending > 0 {
            self.remaining_conflicts.store(pending - 1, Ordering::SeqCst);
            if let Some(op) = ops.first() {
                return Err(Self::conflict_for(op).into());
            }
        }
        self.inner.batch_write(ops).await
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    use super::*;

    /// A company-level root objective with one contributor.
    pub fn company_objective(title: &str) -> Objective {
        Objective::new(
            NewObjective::new(title, ObjectiveLevel::Company)
                .with_contributors(vec![new_entity_id()]),
            &ActorContext::system(),
        )
    }

    /// A department objective under the given parent.
    pub fn department_objective(title: &str, parent_id: EntityId) -> Objective {
        Objective::new(
            NewObjective::new(title, ObjectiveLevel::Department)
                .with_parent(parent_id)
                .with_contributors(vec![new_entity_id()]),
            &ActorContext::system(),
        )
    }

    /// An individual objective under the given parent.
    pub fn individual_objective(title: &str, parent_id: EntityId) -> Objective {
        Objective::new(
            NewObjective::new(title, ObjectiveLevel::Individual)
                .with_parent(parent_id)
                .with_contributors(vec![new_entity_id()]),
            &ActorContext::system(),
        )
    }

    /// A KPI measured at `value` against a non-zero `target`.
    pub fn measured_kpi(name: &str, value: f64, target: f64) -> Kpi {
        let progress =
            measurement_progress(value, target).expect("fixture target must be non-zero");
        Kpi::new(NewKpi::new(name, value, target), progress, &ActorContext::system())
    }

    /// Seed a three-level chain (company -> department -> individual) and
    /// return the objectives top-down.
    pub async fn seed_chain(
        storage: &dyn ObjectiveStore,
    ) -> NorthstarResult<(Objective, Objective, Objective)> {
        let company = company_objective("Company goal");
        let department = department_objective("Department goal", company.objective_id);
        let individual = individual_objective("Individual goal", department.objective_id);
        storage.objective_insert(&company).await?;
        storage.objective_insert(&department).await?;
        storage.objective_insert(&individual).await?;
        Ok((company, department, individual))
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    use super::*;
    use proptest::prelude::*;

    /// Arbitrary objective level.
    pub fn arb_level() -> impl Strategy<Value = ObjectiveLevel> {
        prop_oneof![
            Just(ObjectiveLevel::Company),
            Just(ObjectiveLevel::Department),
            Just(ObjectiveLevel::Individual),
        ]
    }

    /// Arbitrary non-archived status.
    pub fn arb_active_status() -> impl Strategy<Value = ProgressStatus> {
        prop_oneof![
            Just(ProgressStatus::OnTrack),
            Just(ProgressStatus::AtRisk),
            Just(ProgressStatus::Behind),
        ]
    }

    /// Arbitrary in-range progress value.
    pub fn arb_progress() -> impl Strategy<Value = i32> {
        0i32..=100
    }

    /// Arbitrary (value, target) measurement with a usable target.
    pub fn arb_measurement() -> impl Strategy<Value = (f64, f64)> {
        (
            -1000.0f64..2000.0,
            prop_oneof![-1000.0f64..-0.5, 0.5f64..1000.0],
        )
    }

    /// Arbitrary quarter.
    pub fn arb_quarter() -> impl Strategy<Value = Quarter> {
        prop_oneof![
            Just(Quarter::Q1),
            Just(Quarter::Q2),
            Just(Quarter::Q3),
            Just(Quarter::Q4),
        ]
    }
}

// ============================================================================
// PROPERTY-BASED TESTS
// ============================================================================


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_chain_fixture_levels_line_up() {
        let company = company_objective("C");
        let department = department_objective("D", company.objective_id);
        assert_eq!(
            department.level.parent_level(),
            Some(company.level)
        );
        assert_eq!(department.parent_id, Some(company.objective_id));
    }

    #[test]
    fn test_measured_kpi_progress() {
        let kpi = measured_kpi("Signups", 75.0, 100.0);
        assert_eq!(kpi.progress, 75);
        assert_eq!(kpi.status, ProgressStatus::AtRisk);
    }
}
