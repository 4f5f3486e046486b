//! Soft retirement of objectives
//!
//! Archiving never deletes: the document, its KPI links, and its last
//! computed progress all stay queryable. The objective just stops appearing
//! in active listings and stops counting toward its parent's rollup, which
//! is why the former parent is re-aggregated right after the override lands.

use crate::aggregator::ProgressAggregator;
use chrono::Utc;
use northstar_core::{
    ActorContext, EngineConfig, EntityId, EntityType, NorthstarError, NorthstarResult,
    ProgressStatus, StorageError,
};
use northstar_storage::{ObjectiveStore, WriteOp};
use std::sync::Arc;

/// Applies the archived-status override and keeps the parent rollup honest.
#[derive(Clone)]
pub struct ArchivalManager {
    store: Arc<dyn ObjectiveStore>,
    aggregator: ProgressAggregator,
    config: EngineConfig,
}

impl ArchivalManager {
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

    /// Archive an objective.
    ///
    /// Children are not cascade-archived; they keep their own rollups and
    /// stay independently visible. Archiving an already-archived objective
    /// is a no-op. The status write is atomic and committed before the
    /// parent re-aggregation runs; if that follow-up fails the archival
    /// stands and the error surfaces to the caller.
    pub async fn archive(
        &self,
        objective_id: EntityId,
        actor: &ActorContext,
    ) -> NorthstarResult<()> {
        let mut attempt = 0u32;
        let parent_id = loop {
            let objective =
                self.store
                    .objective_get(objective_id)
                    .await?
                    .ok_or(StorageError::NotFound {
                        entity_type: EntityType::Objective,
                        id: objective_id,
                    })?;

            if objective.is_archived() {
                tracing::debug!(objective_id = %objective_id, "objective already archived");
                return Ok(());
            }

            let parent_id = objective.parent_id;
            let mut doc = objective;
            doc.status = ProgressStatus::Archived;
            doc.updated_at = Utc::now();
            doc.updated_by = actor.user_id;

            match self.store.batch_write(vec![WriteOp::PutObjective(doc)]).await {
                Ok(()) => break parent_id,
                Err(NorthstarError::Storage(StorageError::WriteConflict { .. }))
                    if attempt < self.config.conflict_retries =>
                {
                    attempt += 1;
                    tracing::warn!(
                        objective_id = %objective_id,
                        attempt,
                        "write conflict while archiving, retrying"
                    );
                }
                Err(e) => return Err(e),
            }
        };

        tracing::info!(objective_id = %objective_id, "objective archived");
        if let Some(parent_id) = parent_id {
            self.aggregator.recalculate(parent_id, actor).await?;
        }
        Ok(())
    }
}
