//! Tree-shape validation for objective creation and reparenting
//!
//! The three-level company/department/individual layout is a convention of
//! the data, not a structural guarantee of the store, so every rule is
//! enforced here at write time: level ordering, mandatory parents below the
//! root level, the contributor gate, and cycle rejection for parent changes.

use northstar_core::{
    EngineConfig, EntityId, EntityType, NewObjective, NorthstarResult, Objective, StorageError,
    ValidationError,
};
use northstar_storage::ObjectiveStore;
use std::sync::Arc;

/// Validates hierarchy invariants before any write happens.
#[derive(Clone)]
pub struct HierarchyValidator {
    store: Arc<dyn ObjectiveStore>,
    config: EngineConfig,
}

impl HierarchyValidator {
    pub fn new(store: Arc<dyn ObjectiveStore>, config: EngineConfig) -> Self {
        Self { store, config }
    }

    /// Validate a creation payload.
    ///
    /// Company objectives are roots and must not name a parent. Any other
    /// level requires a parent whose level is exactly one tier above, and at
    /// least one contributor (a business rule, enforced as a creation gate).
    pub async fn validate_create(&self, data: &NewObjective) -> NorthstarResult<()> {
        match data.level.parent_level() {
            None => {
                if data.parent_id.is_some() {
                    return Err(ValidationError::InvalidValue {
                        field: "parent_id".to_string(),
                        reason: "company objectives cannot have a parent".to_string(),
                    }
                    .into());
                }
            }
            Some(expected) => {
                let parent_id = data.parent_id.ok_or_else(|| {
                    ValidationError::RequiredFieldMissing {
                        field: "parent_id".to_string(),
                    }
                })?;
                let parent = self.require_objective(parent_id).await?;
                if parent.level != expected {
                    return Err(ValidationError::ParentLevelMismatch {
                        level: data.level,
                        expected,
                        found: parent.level,
                    }
                    .into());
                }
                if data.contributors.is_empty() {
                    return Err(ValidationError::MissingContributors.into());
                }
            }
        }

        Ok(())
    }

    /// Validate moving an objective under a new parent.
    ///
    /// On top of the creation rules, the new parent must not be the
    /// objective itself or any of its descendants: the walk up from the new
    /// parent must never encounter the objective being moved. The walk is
    /// hop-guarded so a corrupted chain that already contains a cycle is
    /// also rejected instead of looping.
    pub async fn validate_parent_change(
        &self,
        objective_id: EntityId,
        new_parent_id: EntityId,
    ) -> NorthstarResult<()> {
        let objective = self.require_objective(objective_id).await?;
        let expected = objective.level.parent_level().ok_or_else(|| {
            ValidationError::InvalidValue {
                field: "parent_id".to_string(),
                reason: "company objectives cannot have a parent".to_string(),
            }
        })?;

        if new_parent_id == objective_id {
            return Err(ValidationError::CircularReference { objective_id }.into());
        }

        let new_parent = self.require_objective(new_parent_id).await?;
        if new_parent.level != expected {
            return Err(ValidationError::ParentLevelMismatch {
                level: objective.level,
                expected,
                found: new_parent.level,
            }
            .into());
        }

        let mut cursor = new_parent.parent_id;
        let mut hops = 0u32;
        while let Some(ancestor_id) = cursor {
            if ancestor_id == objective_id {
                return Err(ValidationError::CircularReference { objective_id }.into());
            }
            hops += 1;
            if hops >= self.config.max_hops {
                return Err(ValidationError::CircularReference {
                    objective_id: new_parent_id,
                }
                .into());
            }
            cursor = self.require_objective(ancestor_id).await?.parent_id;
        }

        Ok(())
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
