//! Operation facade consumed by UI and form collaborators
//!
//! One entry point wiring the validator, linker, aggregator, and archival
//! manager together. Every mutating call takes an explicit [`ActorContext`];
//! there is no session-derived current user anywhere below this line.

use crate::aggregator::ProgressAggregator;
use crate::archival::ArchivalManager;
use crate::hierarchy::HierarchyValidator;
use crate::linker::KpiLinker;
use crate::notify::NotificationSink;
use chrono::Utc;
use northstar_core::{
    measurement_progress, status_for_progress, ActorContext, EngineConfig, EntityId, EntityType,
    Kpi, NewKpi, NewObjective, NorthstarError, NorthstarResult, Objective, StorageError,
};
use northstar_storage::{ObjectiveStore, ObjectiveUpdate, WriteOp};
use std::sync::Arc;

/// The OKR engine's public surface.
pub struct OkrService {
    store: Arc<dyn ObjectiveStore>,
    validator: HierarchyValidator,
    aggregator: ProgressAggregator,
    linker: KpiLinker,
    archival: ArchivalManager,
    config: EngineConfig,
}

impl OkrService {
    /// Wire up the engine against a store and a notification sink.
    /// The configuration is validated once here.
    pub fn new(
        store: Arc<dyn ObjectiveStore>,
        notifier: Arc<dyn NotificationSink>,
        config: EngineConfig,
    ) -> NorthstarResult<Self> {
        config.validate()?;
        let aggregator = ProgressAggregator::new(store.clone(), notifier, config);
        Ok(Self {
            validator: HierarchyValidator::new(store.clone(), config),
            linker: KpiLinker::new(store.clone(), aggregator.clone(), config),
            archival: ArchivalManager::new(store.clone(), aggregator.clone(), config),
            aggregator,
            store,
            config,
        })
    }

    // ========================================================================
    // LISTINGS
    // ========================================================================

    /// All objectives that have not been archived.
    pub async fn objectives(&self) -> NorthstarResult<Vec<Objective>> {
        self.store.objective_list_active().await
    }

    /// Every objective, archived included. Nothing is ever physically
    /// deleted, so this is the full history.
    pub async fn all_objectives(&self) -> NorthstarResult<Vec<Objective>> {
        self.store.objective_list().await
    }

    /// All KPIs.
    pub async fn kpis(&self) -> NorthstarResult<Vec<Kpi>> {
        self.store.kpi_list().await
    }

    // ========================================================================
    // OBJECTIVE OPERATIONS
    // ========================================================================

    /// Create an objective. The hierarchy is validated before any write;
    /// the new objective starts at progress 0 and its parent chain is
    /// re-aggregated to count the new child.
    pub async fn add_objective(
        &self,
        data: NewObjective,
        actor: &ActorContext,
    ) -> NorthstarResult<Objective> {
        self.validator.validate_create(&data).await?;
        let objective = Objective::new(data, actor);
        self.store.objective_insert(&objective).await?;
        tracing::info!(
            objective_id = %objective.objective_id,
            level = %objective.level,
            "objective created"
        );
        if let Some(parent_id) = objective.parent_id {
            self.aggregator.recalculate(parent_id, actor).await?;
        }
        Ok(objective)
    }

    /// Merge user-editable fields into an objective.
    ///
    /// A parent reassignment goes through cycle/level validation first and
    /// re-aggregates both the old and the new parent chain afterwards.
    pub async fn update_objective(
        &self,
        objective_id: EntityId,
        mut update: ObjectiveUpdate,
        actor: &ActorContext,
    ) -> NorthstarResult<Objective> {
        let current = self.require_objective(objective_id).await?;
        let old_parent = current.parent_id;
        let parent_changed = match update.parent_id {
            Some(new_parent) if Some(new_parent) != old_parent => {
                self.validator
                    .validate_parent_change(objective_id, new_parent)
                    .await?;
                true
            }
            _ => false,
        };

        update.updated_by = Some(actor.user_id);
        self.store.objective_update(objective_id, update).await?;

        if parent_changed {
            if let Some(old_parent_id) = old_parent {
                self.aggregator.recalculate(old_parent_id, actor).await?;
            }
            // Recomputing the moved node walks the new chain up to its root.
            self.aggregator.recalculate(objective_id, actor).await?;
        }

        self.require_objective(objective_id).await
    }

    /// Archive an objective. See [`ArchivalManager::archive`].
    pub async fn archive_objective(
        &self,
        objective_id: EntityId,
        actor: &ActorContext,
    ) -> NorthstarResult<()> {
        self.archival.archive(objective_id, actor).await
    }

    /// Recompute an objective's progress (and its ancestors') on demand.
    pub async fn calculate_progress(
        &self,
        objective_id: EntityId,
        actor: &ActorContext,
    ) -> NorthstarResult<i32> {
        self.aggregator.recalculate(objective_id, actor).await
    }

    /// Force re-aggregation of a whole subtree. The recovery path when a
    /// failed downstream recalculation left stale aggregates behind.
    pub async fn rebuild_tree(
        &self,
        root_id: EntityId,
        actor: &ActorContext,
    ) -> NorthstarResult<i32> {
        self.aggregator.recalculate_subtree(root_id, actor).await
    }

    // ========================================================================
    // KPI OPERATIONS
    // ========================================================================

    /// Create a KPI. The target must be non-zero; progress and status are
    /// derived from the initial measurement.
    pub async fn add_kpi(&self, data: NewKpi, actor: &ActorContext) -> NorthstarResult<Kpi> {
        let progress = measurement_progress(data.value, data.target)?;
        let kpi = Kpi::new(data, progress, actor);
        self.store.kpi_insert(&kpi).await?;
        tracing::info!(kpi_id = %kpi.kpi_id, progress, "kpi created");
        Ok(kpi)
    }

    /// Link a KPI to an objective; returns the objective's new progress.
    pub async fn link_kpi(
        &self,
        objective_id: EntityId,
        kpi_id: EntityId,
        actor: &ActorContext,
    ) -> NorthstarResult<i32> {
        self.linker.link(objective_id, kpi_id, actor).await
    }

    /// Remove a KPI/objective link; returns the objective's new progress.
    pub async fn unlink_kpi(
        &self,
        objective_id: EntityId,
        kpi_id: EntityId,
        actor: &ActorContext,
    ) -> NorthstarResult<i32> {
        self.linker.unlink(objective_id, kpi_id, actor).await
    }

    /// Record a new measurement for a KPI (a check-in) and push the change
    /// through every objective the KPI is linked to, each one re-aggregated
    /// up to its root.
    pub async fn record_measurement(
        &self,
        kpi_id: EntityId,
        value: f64,
        actor: &ActorContext,
    ) -> NorthstarResult<Kpi> {
        let mut attempt = 0u32;
        let linked = loop {
            let kpi = self
                .store
                .kpi_get(kpi_id)
                .await?
                .ok_or(StorageError::NotFound {
                    entity_type: EntityType::Kpi,
                    id: kpi_id,
                })?;

            let progress = measurement_progress(value, kpi.target)?;
            let mut doc = kpi;
            doc.value = value;
            doc.progress = progress;
            doc.status = status_for_progress(progress);
            doc.updated_at = Utc::now();
            doc.updated_by = actor.user_id;
            let linked = doc.objective_ids.clone();

            match self.store.batch_write(vec![WriteOp::PutKpi(doc)]).await {
                Ok(()) => break linked,
                Err(NorthstarError::Storage(StorageError::WriteConflict { .. }))
                    if attempt < self.config.conflict_retries =>
                {
                    attempt += 1;
                    tracing::warn!(kpi_id = %kpi_id, attempt, "write conflict on check-in, retrying");
                }
                Err(e) => return Err(e),
            }
        };

        for objective_id in linked {
            self.aggregator.recalculate(objective_id, actor).await?;
        }

        self.store
            .kpi_get(kpi_id)
            .await?
            .ok_or_else(|| {
                StorageError::NotFound {
                    entity_type: EntityType::Kpi,
                    id: kpi_id,
                }
                .into()
            })
    }

    async fn require_objective(&self, id: EntityId) -> NorthstarResult<Objective> {
        self.store
            .objective_get(id)
            .await?
            .ok_or_else(|| {
                StorageError::NotFound {
                    entity_type: EntityType::Objective,
                    id,
                }
                .into()
            })
    }
}
