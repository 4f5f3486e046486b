//! Northstar Storage - Storage Trait and In-Memory Implementation
//!
//! Defines the document-store abstraction the engine runs against. The
//! contract mirrors what the hosted document service provides: atomic
//! single-document merges and all-or-nothing batched writes. Batched writes
//! are conditioned on per-document revisions, so a concurrent writer that
//! slipped in between a read and a write surfaces as `WriteConflict` instead
//! of a silent lost update.

use async_trait::async_trait;
use northstar_core::{
    dedup_ids, EntityId, EntityType, Kpi, NorthstarResult, Objective, Quarter, StorageError,
    Timestamp,
};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

// ============================================================================
// UPDATE TYPES
// ============================================================================

/// Update payload for objectives.
///
/// Covers the user-editable fields only; `progress`, `status`, `kpi_ids`, and
/// `level` are owned by the engine components and move through batched
/// writes instead.
#[derive(Debug, Clone, Default)]
pub struct ObjectiveUpdate {
    /// New title
    pub title: Option<String>,
    /// New description
    pub description: Option<String>,
    /// Reassigned parent
    pub parent_id: Option<EntityId>,
    /// Replacement contributor set
    pub contributors: Option<Vec<EntityId>>,
    /// New due date
    pub due_date: Option<Timestamp>,
    /// New scheduling quarter
    pub quarter: Option<Quarter>,
    /// New scheduling year
    pub year: Option<i32>,
    /// Actor performing the update
    pub updated_by: Option<EntityId>,
}

/// A single mutation inside a batched write.
///
/// The carried document must hold the revision it was read at; the store
/// rejects the whole batch if any stored revision has moved on since.
#[derive(Debug, Clone)]
pub enum WriteOp {
    PutObjective(Objective),
    PutKpi(Kpi),
}

// ============================================================================
// STORAGE TRAIT
// ============================================================================

/// Async storage trait for Northstar entities.
///
/// Every method is an I/O suspension point. Implementations guarantee that
/// `batch_write` applies all of its operations or none of them.
#[async_trait]
pub trait ObjectiveStore: Send + Sync {
    // === Objective Operations ===

    /// Insert a new objective.
    async fn objective_insert(&self, o: &Objective) -> NorthstarResult<()>;

    /// Get an objective by ID.
    async fn objective_get(&self, id: Uuid) -> NorthstarResult<Option<Objective>>;

    /// List all objectives, archived included.
    async fn objective_list(&self) -> NorthstarResult<Vec<Objective>>;

    /// List objectives that have not been archived.
    async fn objective_list_active(&self) -> NorthstarResult<Vec<Objective>>;

    /// List direct children of an objective, archived included.
    /// Callers that aggregate filter archived children themselves.
    async fn objective_list_children(&self, parent_id: Uuid) -> NorthstarResult<Vec<Objective>>;

    /// Atomically merge an update into an objective.
    /// Bumps `updated_at` and the revision.
    async fn objective_update(&self, id: Uuid, update: ObjectiveUpdate) -> NorthstarResult<()>;

    // === KPI Operations ===

    /// Insert a new KPI.
    async fn kpi_insert(&self, k: &Kpi) -> NorthstarResult<()>;

    /// Get a KPI by ID.
    async fn kpi_get(&self, id: Uuid) -> NorthstarResult<Option<Kpi>>;

    /// List all KPIs.
    async fn kpi_list(&self) -> NorthstarResult<Vec<Kpi>>;

    // === Batched Writes ===

    /// Apply a list of document mutations atomically: all succeed or none
    /// are visible. Each operation is conditioned on the revision carried by
    /// its document; any mismatch fails the whole batch with
    /// `WriteConflict` and no document is touched.
    async fn batch_write(&self, ops: Vec<WriteOp>) -> NorthstarResult<()>;
}

// ============================================================================
// IN-MEMORY STORAGE
// ============================================================================

/// In-memory storage backed by per-collection hash maps.
///
/// Used directly in tests and as the reference implementation of the store
/// contract, revision checking included.
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    objectives: Arc<RwLock<HashMap<Uuid, Objective>>>,
    kpis: Arc<RwLock<HashMap<Uuid, Kpi>>>,
}

impl InMemoryStorage {
    /// Create a new empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all stored data.
    pub fn clear(&self) -> NorthstarResult<()> {
        self.objectives
            .write()
            .map_err(|_| StorageError::LockPoisoned)?
            .clear();
        self.kpis
            .write()
            .map_err(|_| StorageError::LockPoisoned)?
            .clear();
        Ok(())
    }

    /// Count of stored objectives.
    pub fn objective_count(&self) -> NorthstarResult<usize> {
        Ok(self
            .objectives
            .read()
            .map_err(|_| StorageError::LockPoisoned)?
            .len())
    }

    /// Count of stored KPIs.
    pub fn kpi_count(&self) -> NorthstarResult<usize> {
        Ok(self
            .kpis
            .read()
            .map_err(|_| StorageError::LockPoisoned)?
            .len())
    }
}

#[async_trait]
impl ObjectiveStore for InMemoryStorage {
    // === Objective Operations ===

    async fn objective_insert(&self, o: &Objective) -> NorthstarResult<()> {
        let mut objectives = self
            .objectives
            .write()
            .map_err(|_| StorageError::LockPoisoned)?;
        if objectives.contains_key(&o.objective_id) {
            return Err(StorageError::InsertFailed {
                entity_type: EntityType::Objective,
                reason: "already exists".to_string(),
            }
            .into());
        }
        objectives.insert(o.objective_id, o.clone());
        Ok(())
    }

    async fn objective_get(&self, id: Uuid) -> NorthstarResult<Option<Objective>> {
        let objectives = self
            .objectives
            .read()
            .map_err(|_| StorageError::LockPoisoned)?;
        Ok(objectives.get(&id).cloned())
    }

    async fn objective_list(&self) -> NorthstarResult<Vec<Objective>> {
        let objectives = self
            .objectives
            .read()
            .map_err(|_| StorageError::LockPoisoned)?;
        Ok(objectives.values().cloned().collect())
    }

    async fn objective_list_active(&self) -> NorthstarResult<Vec<Objective>> {
        let objectives = self
            .objectives
            .read()
            .map_err(|_| StorageError::LockPoisoned)?;
        Ok(objectives
            .values()
            .filter(|o| !o.is_archived())
            .cloned()
            .collect())
    }

    async fn objective_list_children(&self, parent_id: Uuid) -> NorthstarResult<Vec<Objective>> {
        let objectives = self
            .objectives
            .read()
            .map_err(|_| StorageError::LockPoisoned)?;
        Ok(objectives
            .values()
            .filter(|o| o.parent_id == Some(parent_id))
            .cloned()
            .collect())
    }

    async fn objective_update(&self, id: Uuid, update: ObjectiveUpdate) -> NorthstarResult<()> {
        let mut objectives = self
            .objectives
            .write()
            .map_err(|_| StorageError::LockPoisoned)?;
        let objective = objectives.get_mut(&id).ok_or(StorageError::NotFound {
            entity_type: EntityType::Objective,
            id,
        })?;

        if let Some(title) = update.title {
            objective.title = title;
        }
        if let Some(description) = update.description {
            objective.description = Some(description);
        }
        if let Some(parent_id) = update.parent_id {
            objective.parent_id = Some(parent_id);
        }
        if let Some(contributors) = update.contributors {
            objective.contributors = dedup_ids(contributors);
        }
        if let Some(due_date) = update.due_date {
            objective.due_date = Some(due_date);
        }
        if let Some(quarter) = update.quarter {
            objective.quarter = Some(quarter);
        }
        if let Some(year) = update.year {
            objective.year = Some(year);
        }
        if let Some(updated_by) = update.updated_by {
            objective.updated_by = updated_by;
        }
        objective.updated_at = chrono::Utc::now();
        objective.revision += 1;

        Ok(())
    }

    // === KPI Operations ===

    async fn kpi_insert(&self, k: &Kpi) -> NorthstarResult<()> {
        let mut kpis = self.kpis.write().map_err(|_| StorageError::LockPoisoned)?;
        if kpis.contains_key(&k.kpi_id) {
            return Err(StorageError::InsertFailed {
                entity_type: EntityType::Kpi,
                reason: "already exists".to_string(),
            }
            .into());
        }
        kpis.insert(k.kpi_id, k.clone());
        Ok(())
    }

    async fn kpi_get(&self, id: Uuid) -> NorthstarResult<Option<Kpi>> {
        let kpis = self.kpis.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(kpis.get(&id).cloned())
    }

    async fn kpi_list(&self) -> NorthstarResult<Vec<Kpi>> {
        let kpis = self.kpis.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(kpis.values().cloned().collect())
    }

    // === Batched Writes ===

    async fn batch_write(&self, ops: Vec<WriteOp>) -> NorthstarResult<()> {
        // Both collections stay locked for the whole batch, so validation
        // and application happen against one consistent snapshot.
        let mut objectives = self
            .objectives
            .write()
            .map_err(|_| StorageError::LockPoisoned)?;
        let mut kpis = self.kpis.write().map_err(|_| StorageError::LockPoisoned)?;

        // Validate every precondition before touching anything.
        for op in &ops {
            match op {
                WriteOp::PutObjective(doc) => {
                    let stored =
                        objectives
                            .get(&doc.objective_id)
                            .ok_or(StorageError::NotFound {
                                entity_type: EntityType::Objective,
                                id: doc.objective_id,
                            })?;
                    if stored.revision != doc.revision {
                        return Err(StorageError::WriteConflict {
                            entity_type: EntityType::Objective,
                            id: doc.objective_id,
                            expected: doc.revision,
                            found: stored.revision,
                        }
                        .into());
                    }
                }
                WriteOp::PutKpi(doc) => {
                    let stored = kpis.get(&doc.kpi_id).ok_or(StorageError::NotFound {
                        entity_type: EntityType::Kpi,
                        id: doc.kpi_id,
                    })?;
                    if stored.revision != doc.revision {
                        return Err(StorageError::WriteConflict {
                            entity_type: EntityType::Kpi,
                            id: doc.kpi_id,
                            expected: doc.revision,
                            found: stored.revision,
                        }
                        .into());
                    }
                }
            }
        }

        for op in ops {
            match op {
                WriteOp::PutObjective(mut doc) => {
                    doc.revision += 1;
                    objectives.insert(doc.objective_id, doc);
                }
                WriteOp::PutKpi(mut doc) => {
                    doc.revision += 1;
                    kpis.insert(doc.kpi_id, doc);
                }
            }
        }

        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use northstar_core::{ActorContext, NewKpi, NewObjective, ObjectiveLevel, ProgressStatus};

    fn make_test_objective(level: ObjectiveLevel, parent_id: Option<EntityId>) -> Objective {
        let actor = ActorContext::system();
        let mut data = NewObjective::new("Test objective", level)
            .with_contributors(vec![northstar_core::new_entity_id()]);
        data.parent_id = parent_id;
        Objective::new(data, &actor)
    }

    fn make_test_kpi(value: f64, target: f64) -> Kpi {
        let actor = ActorContext::system();
        let progress = northstar_core::measurement_progress(value, target).unwrap();
        Kpi::new(NewKpi::new("Test KPI", value, target), progress, &actor)
    }

    #[tokio::test]
    async fn test_objective_insert_get() {
        let storage = InMemoryStorage::new();
        let objective = make_test_objective(ObjectiveLevel::Company, None);

        storage.objective_insert(&objective).await.unwrap();
        let retrieved = storage.objective_get(objective.objective_id).await.unwrap();

        assert!(retrieved.is_some());
        assert_eq!(retrieved.unwrap().objective_id, objective.objective_id);
    }

    #[tokio::test]
    async fn test_objective_insert_duplicate() {
        let storage = InMemoryStorage::new();
        let objective = make_test_objective(ObjectiveLevel::Company, None);

        storage.objective_insert(&objective).await.unwrap();
        let result = storage.objective_insert(&objective).await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_objective_update_merges_and_bumps_revision() {
        let storage = InMemoryStorage::new();
        let objective = make_test_objective(ObjectiveLevel::Company, None);
        storage.objective_insert(&objective).await.unwrap();

        storage
            .objective_update(
                objective.objective_id,
                ObjectiveUpdate {
                    title: Some("Renamed".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let updated = storage
            .objective_get(objective.objective_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.title, "Renamed");
        assert_eq!(updated.revision, objective.revision + 1);
        assert!(updated.updated_at >= objective.updated_at);
    }

    #[tokio::test]
    async fn test_objective_update_not_found() {
        let storage = InMemoryStorage::new();
        let result = storage
            .objective_update(Uuid::now_v7(), ObjectiveUpdate::default())
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_objective_list_active_excludes_archived() {
        let storage = InMemoryStorage::new();
        let active = make_test_objective(ObjectiveLevel::Company, None);
        let mut archived = make_test_objective(ObjectiveLevel::Company, None);
        archived.status = ProgressStatus::Archived;

        storage.objective_insert(&active).await.unwrap();
        storage.objective_insert(&archived).await.unwrap();

        let listed = storage.objective_list_active().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].objective_id, active.objective_id);

        let all = storage.objective_list().await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn test_objective_list_children() {
        let storage = InMemoryStorage::new();
        let root = make_test_objective(ObjectiveLevel::Company, None);
        let child_a =
            make_test_objective(ObjectiveLevel::Department, Some(root.objective_id));
        let child_b =
            make_test_objective(ObjectiveLevel::Department, Some(root.objective_id));
        let unrelated = make_test_objective(ObjectiveLevel::Company, None);

        for o in [&root, &child_a, &child_b, &unrelated] {
            storage.objective_insert(o).await.unwrap();
        }

        let children = storage
            .objective_list_children(root.objective_id)
            .await
            .unwrap();
        assert_eq!(children.len(), 2);
    }

    #[tokio::test]
    async fn test_kpi_insert_get() {
        let storage = InMemoryStorage::new();
        let kpi = make_test_kpi(50.0, 100.0);

        storage.kpi_insert(&kpi).await.unwrap();
        let retrieved = storage.kpi_get(kpi.kpi_id).await.unwrap();

        assert!(retrieved.is_some());
        assert_eq!(retrieved.unwrap().progress, 50);
    }

    #[tokio::test]
    async fn test_batch_write_applies_all_ops() {
        let storage = InMemoryStorage::new();
        let objective = make_test_objective(ObjectiveLevel::Company, None);
        let kpi = make_test_kpi(50.0, 100.0);
        storage.objective_insert(&objective).await.unwrap();
        storage.kpi_insert(&kpi).await.unwrap();

        let mut obj_doc = objective.clone();
        obj_doc.kpi_ids.push(kpi.kpi_id);
        let mut kpi_doc = kpi.clone();
        kpi_doc.objective_ids.push(objective.objective_id);

        storage
            .batch_write(vec![WriteOp::PutObjective(obj_doc), WriteOp::PutKpi(kpi_doc)])
            .await
            .unwrap();

        let stored_obj = storage
            .objective_get(objective.objective_id)
            .await
            .unwrap()
            .unwrap();
        let stored_kpi = storage.kpi_get(kpi.kpi_id).await.unwrap().unwrap();
        assert_eq!(stored_obj.kpi_ids, vec![kpi.kpi_id]);
        assert_eq!(stored_kpi.objective_ids, vec![objective.objective_id]);
        assert_eq!(stored_obj.revision, objective.revision + 1);
        assert_eq!(stored_kpi.revision, kpi.revision + 1);
    }

    #[tokio::test]
    async fn test_batch_write_stale_revision_conflicts() {
        let storage = InMemoryStorage::new();
        let objective = make_test_objective(ObjectiveLevel::Company, None);
        storage.objective_insert(&objective).await.unwrap();

        // A concurrent writer moves the document on.
        storage
            .objective_update(
                objective.objective_id,
                ObjectiveUpdate {
                    title: Some("Moved on".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        // Writing back the originally-read document must now conflict.
        let result = storage
            .batch_write(vec![WriteOp::PutObjective(objective.clone())])
            .await;
        assert!(matches!(
            result,
            Err(northstar_core::NorthstarError::Storage(
                StorageError::WriteConflict { .. }
            ))
        ));
    }

    #[tokio::test]
    async fn test_batch_write_is_all_or_nothing() {
        let storage = InMemoryStorage::new();
        let objective = make_test_objective(ObjectiveLevel::Company, None);
        let kpi = make_test_kpi(50.0, 100.0);
        storage.objective_insert(&objective).await.unwrap();
        storage.kpi_insert(&kpi).await.unwrap();

        let mut fresh_obj = objective.clone();
        fresh_obj.title = "Should not land".to_string();
        let mut stale_kpi = kpi.clone();
        stale_kpi.revision = kpi.revision + 7; // never read at this revision

        let result = storage
            .batch_write(vec![
                WriteOp::PutObjective(fresh_obj),
                WriteOp::PutKpi(stale_kpi),
            ])
            .await;
        assert!(result.is_err());

        // The valid first op must not have been applied.
        let stored = storage
            .objective_get(objective.objective_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.title, objective.title);
        assert_eq!(stored.revision, objective.revision);
    }
}

// ============================================================================
// PROPERTY-BASED TESTS
// ============================================================================

#[cfg(test)]
mod prop_tests {
    use super::*;
    use northstar_core::{ActorContext, NewObjective, ObjectiveLevel};
    use proptest::prelude::*;

    fn make_objective() -> Objective {
        Objective::new(
            NewObjective::new("Prop objective", ObjectiveLevel::Company),
            &ActorContext::system(),
        )
    }

    fn block_on<F: std::future::Future>(future: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .build()
            .expect("runtime")
            .block_on(future)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        /// Getting a non-existent entity returns Ok(None), never an error.
        #[test]
        fn prop_storage_not_found_returns_none(_dummy in any::<u8>()) {
            let storage = InMemoryStorage::new();
            let missing = Uuid::now_v7();

            let objective = block_on(storage.objective_get(missing)).unwrap();
            prop_assert!(objective.is_none());

            let kpi = block_on(storage.kpi_get(missing)).unwrap();
            prop_assert!(kpi.is_none());
        }

        /// Insert then get returns the same document.
        #[test]
        fn prop_insert_get_roundtrip(_dummy in any::<u8>()) {
            let storage = InMemoryStorage::new();
            let objective = make_objective();

            block_on(storage.objective_insert(&objective)).unwrap();
            let retrieved = block_on(storage.objective_get(objective.objective_id)).unwrap();

            prop_assert_eq!(retrieved, Some(objective));
        }

        /// A batch put conditioned on any revision other than the stored one
        /// fails, and a conditioned-on-current one succeeds exactly once.
        #[test]
        fn prop_revision_conditioning(offset in 1i64..100) {
            let storage = InMemoryStorage::new();
            let objective = make_objective();
            block_on(storage.objective_insert(&objective)).unwrap();

            let mut stale = objective.clone();
            stale.revision += offset;
            let stale_result = block_on(storage.batch_write(vec![WriteOp::PutObjective(stale)]));
            prop_assert!(stale_result.is_err());

            let fresh_result =
                block_on(storage.batch_write(vec![WriteOp::PutObjective(objective.clone())]));
            prop_assert!(fresh_result.is_ok());

            // The same document is now stale: the revision moved on.
            let replay = block_on(storage.batch_write(vec![WriteOp::PutObjective(objective)]));
            prop_assert!(replay.is_err());
        }
    }
}
