//! Objective/KPI edge management
//!
//! `Objective.kpi_ids` and `Kpi.objective_ids` are two halves of one logical
//! edge. Both sides move in a single batched write, so the pair can never be
//! observed half-linked, and the operations are idempotent set updates: no
//! duplicate entries, no double counting in the rollup.

use crate::aggregator::ProgressAggregator;
use chrono::Utc;
use northstar_core::{
    ActorContext, EngineConfig, EntityId, EntityType, Kpi, NorthstarError, NorthstarResult,
    Objective, StorageError,
};
use northstar_storage::{ObjectiveStore, WriteOp};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EdgeChange {
    Link,
    Unlink,
}

/// Maintains the many-to-many association between objectives and KPIs.
#[derive(Clone)]
pub struct KpiLinker {
    store: Arc<dyn ObjectiveStore>,
    aggregator: ProgressAggregator,
    config: EngineConfig,
}

impl KpiLinker {
    pub fn new(
        store: Arc<dyn ObjectiveStore>,
        aggregator: ProgressAggregator,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            aggregator,
            config,
        }
    }

    /// Link a KPI to an objective and return the objective's new progress.
    ///
    /// Linking an already-linked pair changes nothing and still returns the
    /// freshly recomputed progress.
    pub async fn link(
        &self,
        objective_id: EntityId,
        kpi_id: EntityId,
        actor: &ActorContext,
    ) -> NorthstarResult<i32> {
        self.apply_edge(objective_id, kpi_id, EdgeChange::Link, actor)
            .await?;
        self.aggregator.recalculate(objective_id, actor).await
    }

    /// Remove the link between a KPI and an objective and return the
    /// objective's new progress. Symmetric to [`Self::link`].
    pub async fn unlink(
        &self,
        objective_id: EntityId,
        kpi_id: EntityId,
        actor: &ActorContext,
    ) -> NorthstarResult<i32> {
        self.apply_edge(objective_id, kpi_id, EdgeChange::Unlink, actor)
            .await?;
        self.aggregator.recalculate(objective_id, actor).await
    }

    /// Bring both sides of the edge to the requested state in one batch.
    ///
    /// A one-sided edge (one half present, the other missing) is repaired to
    /// the requested state rather than rejected. The batch is conditioned on
    /// the revisions read here; conflicts rerun the whole cycle against
    /// fresh documents, bounded by the configured retries, after which the
    /// conflict itself surfaces.
    async fn apply_edge(
        &self,
        objective_id: EntityId,
        kpi_id: EntityId,
        change: EdgeChange,
        actor: &ActorContext,
    ) -> NorthstarResult<()> {
        let mut attempt = 0u32;
        loop {
            let objective =
                self.store
                    .objective_get(objective_id)
                    .await?
                    .ok_or(StorageError::NotFound {
                        entity_type: EntityType::Objective,
                        id: objective_id,
                    })?;
            let kpi = self
                .store
                .kpi_get(kpi_id)
                .await?
                .ok_or(StorageError::NotFound {
                    entity_type: EntityType::Kpi,
                    id: kpi_id,
                })?;

            let want_linked = change == EdgeChange::Link;
            let objective_side = objective.has_kpi(kpi_id);
            let kpi_side = kpi.is_linked_to(objective_id);
            if objective_side == want_linked && kpi_side == want_linked {
                tracing::debug!(
                    objective_id = %objective_id,
                    kpi_id = %kpi_id,
                    linked = want_linked,
                    "edge already in requested state"
                );
                return Ok(());
            }

            let mut ops = Vec::with_capacity(2);
            if objective_side != want_linked {
                let mut doc = objective;
                if want_linked {
                    doc.kpi_ids.push(kpi_id);
                } else {
                    doc.kpi_ids.retain(|id| *id != kpi_id);
                }
                doc.updated_at = Utc::now();
                doc.updated_by = actor.user_id;
                ops.push(WriteOp::PutObjective(doc));
            }
            if kpi_side != want_linked {
                let mut doc = kpi;
                if want_linked {
                    doc.objective_ids.push(objective_id);
                } else {
                    doc.objective_ids.retain(|id| *id != objective_id);
                }
                doc.updated_at = Utc::now();
                doc.updated_by = actor.user_id;
                ops.push(WriteOp::PutKpi(doc));
            }

            match self.store.batch_write(ops).await {
                Ok(()) => return Ok(()),
                Err(NorthstarError::Storage(StorageError::WriteConflict { .. }))
                    if attempt < self.config.conflict_retries =>
                {
                    attempt += 1;
                    tracing::warn!(
                        objective_id = %objective_id,
                        kpi_id = %kpi_id,
                        attempt,
                        "write conflict while updating edge, retrying"
                    );
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Check that both halves of every edge of an objective agree.
/// Exposed for tests and consistency audits.
pub fn edge_is_consistent(objective: &Objective, kpi: &Kpi) -> bool {
    objective.has_kpi(kpi.kpi_id) == kpi.is_linked_to(objective.objective_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::InMemorySink;
    use northstar_core::new_entity_id;
    use northstar_storage::InMemoryStorage;
    use northstar_test_utils::{fixtures, ConflictingStorage};

    fn make_linker(store: Arc<dyn ObjectiveStore>) -> KpiLinker {
        let config = EngineConfig::standard();
        let aggregator =
            ProgressAggregator::new(store.clone(), Arc::new(InMemorySink::new()), config);
        KpiLinker::new(store, aggregator, config)
    }

    async fn seed_objective_and_kpi(
        store: &InMemoryStorage,
        value: f64,
        target: f64,
    ) -> (Objective, Kpi) {
        let objective = fixtures::company_objective("Goal");
        let kpi = fixtures::measured_kpi("Metric", value, target);
        store.objective_insert(&objective).await.unwrap();
        store.kpi_insert(&kpi).await.unwrap();
        (objective, kpi)
    }

    #[tokio::test]
    async fn test_link_updates_both_sides_and_returns_progress() {
        let store = Arc::new(InMemoryStorage::new());
        let (objective, kpi) = seed_objective_and_kpi(&store, 50.0, 100.0).await;
        let linker = make_linker(store.clone());

        let progress = linker
            .link(objective.objective_id, kpi.kpi_id, &ActorContext::system())
            .await
            .unwrap();
        assert_eq!(progress, 50);

        let stored_objective = store
            .objective_get(objective.objective_id)
            .await
            .unwrap()
            .unwrap();
        let stored_kpi = store.kpi_get(kpi.kpi_id).await.unwrap().unwrap();
        assert_eq!(stored_objective.kpi_ids, vec![kpi.kpi_id]);
        assert_eq!(stored_kpi.objective_ids, vec![objective.objective_id]);
        assert!(edge_is_consistent(&stored_objective, &stored_kpi));
    }

    #[tokio::test]
    async fn test_double_link_is_idempotent() {
        let store = Arc::new(InMemoryStorage::new());
        let (objective, kpi) = seed_objective_and_kpi(&store, 50.0, 100.0).await;
        let linker = make_linker(store.clone());
        let actor = ActorContext::system();

        let first = linker
            .link(objective.objective_id, kpi.kpi_id, &actor)
            .await
            .unwrap();
        let second = linker
            .link(objective.objective_id, kpi.kpi_id, &actor)
            .await
            .unwrap();
        assert_eq!(first, second);

        let stored_objective = store
            .objective_get(objective.objective_id)
            .await
            .unwrap()
            .unwrap();
        let stored_kpi = store.kpi_get(kpi.kpi_id).await.unwrap().unwrap();
        assert_eq!(stored_objective.kpi_ids.len(), 1);
        assert_eq!(stored_kpi.objective_ids.len(), 1);
    }

    #[tokio::test]
    async fn test_unlink_removes_both_sides() {
        let store = Arc::new(InMemoryStorage::new());
        let (objective, kpi) = seed_objective_and_kpi(&store, 50.0, 100.0).await;
        let linker = make_linker(store.clone());
        let actor = ActorContext::system();

        linker
            .link(objective.objective_id, kpi.kpi_id, &actor)
            .await
            .unwrap();
        let progress = linker
            .unlink(objective.objective_id, kpi.kpi_id, &actor)
            .await
            .unwrap();

        // No KPIs and no children left: rollup returns to zero.
        assert_eq!(progress, 0);
        let stored_objective = store
            .objective_get(objective.objective_id)
            .await
            .unwrap()
            .unwrap();
        let stored_kpi = store.kpi_get(kpi.kpi_id).await.unwrap().unwrap();
        assert!(stored_objective.kpi_ids.is_empty());
        assert!(stored_kpi.objective_ids.is_empty());
    }

    #[tokio::test]
    async fn test_unlink_of_absent_edge_is_noop() {
        let store = Arc::new(InMemoryStorage::new());
        let (objective, kpi) = seed_objective_and_kpi(&store, 50.0, 100.0).await;
        let linker = make_linker(store.clone());

        let progress = linker
            .unlink(objective.objective_id, kpi.kpi_id, &ActorContext::system())
            .await
            .unwrap();
        assert_eq!(progress, 0);
    }

    #[tokio::test]
    async fn test_link_missing_objective_not_found() {
        let store = Arc::new(InMemoryStorage::new());
        let kpi = fixtures::measured_kpi("Metric", 50.0, 100.0);
        store.kpi_insert(&kpi).await.unwrap();
        let linker = make_linker(store);

        let result = linker
            .link(new_entity_id(), kpi.kpi_id, &ActorContext::system())
            .await;
        assert!(matches!(
            result,
            Err(NorthstarError::Storage(StorageError::NotFound {
                entity_type: EntityType::Objective,
                ..
            }))
        ));
    }

    #[tokio::test]
    async fn test_link_missing_kpi_not_found() {
        let store = Arc::new(InMemoryStorage::new());
        let objective = fixtures::company_objective("Goal");
        store.objective_insert(&objective).await.unwrap();
        let linker = make_linker(store);

        let result = linker
            .link(objective.objective_id, new_entity_id(), &ActorContext::system())
            .await;
        assert!(matches!(
            result,
            Err(NorthstarError::Storage(StorageError::NotFound {
                entity_type: EntityType::Kpi,
                ..
            }))
        ));
    }

    #[tokio::test]
    async fn test_one_sided_edge_is_repaired() {
        let store = Arc::new(InMemoryStorage::new());
        let mut objective = fixtures::company_objective("Goal");
        let kpi = fixtures::measured_kpi("Metric", 80.0, 100.0);
        // Corrupt state: the objective side exists, the back-reference is gone.
        objective.kpi_ids.push(kpi.kpi_id);
        store.objective_insert(&objective).await.unwrap();
        store.kpi_insert(&kpi).await.unwrap();
        let linker = make_linker(store.clone());

        linker
            .link(objective.objective_id, kpi.kpi_id, &ActorContext::system())
            .await
            .unwrap();

        let stored_objective = store
            .objective_get(objective.objective_id)
            .await
            .unwrap()
            .unwrap();
        let stored_kpi = store.kpi_get(kpi.kpi_id).await.unwrap().unwrap();
        assert!(edge_is_consistent(&stored_objective, &stored_kpi));
        assert_eq!(stored_objective.kpi_ids.len(), 1);
    }

    #[tokio::test]
    async fn test_edge_conflict_is_retried() {
        let inner = Arc::new(InMemoryStorage::new());
        let (objective, kpi) = seed_objective_and_kpi(&inner, 60.0, 100.0).await;
        let store = Arc::new(ConflictingStorage::new(inner, 1));
        let linker = make_linker(store);

        let progress = linker
            .link(objective.objective_id, kpi.kpi_id, &ActorContext::system())
            .await
            .unwrap();
        assert_eq!(progress, 60);
    }
}
