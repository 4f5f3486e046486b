//! Progress rollup and upward propagation
//!
//! An objective's progress is a pure rollup: the mean of its linked KPIs and
//! its direct non-archived children, recomputed immediately after any
//! mutation that could invalidate it. Propagation walks `parent_id` pointers
//! with an explicit loop and a hop guard; the three-level convention is
//! never trusted. Each node runs a read-compute-write cycle conditioned on
//! the document revision it read, so two mutations racing to update a shared
//! ancestor produce a retried conflict instead of a lost update.

use crate::notify::NotificationSink;
use chrono::Utc;
use northstar_core::{
    rollup_progress, status_for_progress, ActorContext, AggregationError, EngineConfig, EntityId,
    EntityType, NorthstarError, NorthstarResult, NotificationPriority, NotificationRecord,
    NotificationType, Objective, ProgressStatus, StorageError,
};
use northstar_storage::{ObjectiveStore, WriteOp};
use std::sync::Arc;

/// Recomputes derived progress/status values bottom-up.
#[derive(Clone)]
pub struct ProgressAggregator {
    store: Arc<dyn ObjectiveStore>,
    notifier: Arc<dyn NotificationSink>,
    config: EngineConfig,
}

impl ProgressAggregator {
    pub fn new(
        store: Arc<dyn ObjectiveStore>,
        notifier: Arc<dyn NotificationSink>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            notifier,
            config,
        }
    }

    /// Recompute an objective and every ancestor up to its root.
    ///
    /// Returns the freshly computed progress of the named objective. Each
    /// level's write is committed before the parent's recalculation reads
    /// it, so a leaf change is reflected all the way up by the time this
    /// resolves.
    pub async fn recalculate(
        &self,
        objective_id: EntityId,
        actor: &ActorContext,
    ) -> NorthstarResult<i32> {
        let (progress, mut next) = self.recalculate_node(objective_id, actor).await?;
        let mut hops = 1u32;
        while let Some(id) = next {
            if hops >= self.config.max_hops {
                return Err(AggregationError::HopLimitExceeded {
                    objective_id: id,
                    max_hops: self.config.max_hops,
                }
                .into());
            }
            let (_, parent) = self.recalculate_node(id, actor).await?;
            next = parent;
            hops += 1;
        }
        tracing::debug!(objective_id = %objective_id, progress, hops, "rollup propagated");
        Ok(progress)
    }

    /// Force re-aggregation of a whole subtree, deepest nodes first, then
    /// continue up the root's own ancestor chain.
    ///
    /// This is the recovery path for stale aggregates left behind when a
    /// downstream recalculation failed after its triggering mutation had
    /// already committed.
    pub async fn recalculate_subtree(
        &self,
        root_id: EntityId,
        actor: &ActorContext,
    ) -> NorthstarResult<i32> {
        if self.store.objective_get(root_id).await?.is_none() {
            return Err(StorageError::NotFound {
                entity_type: EntityType::Objective,
                id: root_id,
            }
            .into());
        }

        // Collect the active subtree level by level. A corrupted parent
        // cycle would keep adding levels, so the hop guard applies here too.
        let mut levels: Vec<Vec<EntityId>> = vec![vec![root_id]];
        let mut depth = 0usize;
        while depth < levels.len() {
            if levels.len() as u32 > self.config.max_hops {
                return Err(AggregationError::HopLimitExceeded {
                    objective_id: root_id,
                    max_hops: self.config.max_hops,
                }
                .into());
            }
            let frontier = levels[depth].clone();
            let mut next = Vec::new();
            for id in frontier {
                for child in self.store.objective_list_children(id).await? {
                    if !child.is_archived() {
                        next.push(child.objective_id);
                    }
                }
            }
            if !next.is_empty() {
                levels.push(next);
            }
            depth += 1;
        }

        let mut root_progress = 0;
        let mut root_parent = None;
        for level in levels.iter().rev() {
            for id in level {
                let (progress, parent) = self.recalculate_node(*id, actor).await?;
                if *id == root_id {
                    root_progress = progress;
                    root_parent = parent;
                }
            }
        }

        if let Some(parent_id) = root_parent {
            self.recalculate(parent_id, actor).await?;
        }
        tracing::info!(root_id = %root_id, progress = root_progress, "subtree rebuilt");
        Ok(root_progress)
    }

    /// One read-compute-write cycle for a single objective.
    ///
    /// Returns the new progress and the parent to continue with. The write
    /// is conditioned on the revision read at the start; on conflict the
    /// whole cycle reruns against fresh reads, bounded by the configured
    /// retry budget.
    async fn recalculate_node(
        &self,
        objective_id: EntityId,
        actor: &ActorContext,
    ) -> NorthstarResult<(i32, Option<EntityId>)> {
        let mut attempt = 0u32;
        loop {
            let objective = self
                .store
                .objective_get(objective_id)
                .await?
                .ok_or(StorageError::NotFound {
                    entity_type: EntityType::Objective,
                    id: objective_id,
                })?;

            let mut inputs = Vec::with_capacity(objective.kpi_ids.len());
            for kpi_id in &objective.kpi_ids {
                let kpi = self
                    .store
                    .kpi_get(*kpi_id)
                    .await?
                    .ok_or(StorageError::NotFound {
                        entity_type: EntityType::Kpi,
                        id: *kpi_id,
                    })?;
                inputs.push(kpi.progress);
            }
            for child in self.store.objective_list_children(objective_id).await? {
                if !child.is_archived() {
                    inputs.push(child.progress);
                }
            }

            let progress = rollup_progress(&inputs);
            let status = if objective.is_archived() {
                ProgressStatus::Archived
            } else {
                status_for_progress(progress)
            };
            let previous_status = objective.status;
            let status_changed = !objective.is_archived() && status != previous_status;
            let parent_id = objective.parent_id;

            let mut doc = objective;
            doc.progress = progress;
            doc.status = status;
            doc.updated_at = Utc::now();
            doc.updated_by = actor.user_id;

            match self
                .store
                .batch_write(vec![WriteOp::PutObjective(doc.clone())])
                .await
            {
                Ok(()) => {
                    if status_changed {
                        self.notify_status_change(&doc, previous_status).await;
                    }
                    return Ok((progress, parent_id));
                }
                Err(NorthstarError::Storage(StorageError::WriteConflict { .. }))
                    if attempt < self.config.conflict_retries =>
                {
                    attempt += 1;
                    tracing::warn!(
                        objective_id = %objective_id,
                        attempt,
                        "write conflict during rollup, retrying"
                    );
                }
                Err(NorthstarError::Storage(StorageError::WriteConflict { .. })) => {
                    return Err(AggregationError::RetriesExhausted {
                        objective_id,
                        attempts: attempt + 1,
                    }
                    .into());
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Queue one record per contributor for a threshold crossing.
    /// Best-effort: a sink failure is logged and never fails the rollup.
    async fn notify_status_change(&self, objective: &Objective, previous: ProgressStatus) {
        let message = format!(
            "\"{}\" moved from {} to {} at {}% progress",
            objective.title, previous, objective.status, objective.progress
        );
        let priority = if objective.status == ProgressStatus::Behind {
            NotificationPriority::High
        } else {
            NotificationPriority::Normal
        };
        for contributor in &objective.contributors {
            let record = NotificationRecord::new(
                *contributor,
                NotificationType::StatusChanged,
                "Objective status changed",
                &message,
            )
            .with_priority(priority)
            .with_link(&format!("/objectives/{}", objective.objective_id));

            if let Err(e) = self.notifier.enqueue(record).await {
                tracing::warn!(
                    objective_id = %objective.objective_id,
                    user_id = %contributor,
                    error = %e,
                    "failed to enqueue status notification"
                );
            }
        }
    }
}
