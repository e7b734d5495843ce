//! Drag/move orchestration for one organization + vertical.
//!
//! Every mutation follows the same pipeline: authorize, snapshot, apply
//! optimistically, persist, then either reload from the store or restore the
//! snapshot. State guards are never held across an `.await`, so two gestures
//! can interleave; only eventual convergence through the reload is promised.

use chrono::{DateTime, Duration, Utc};
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;
use uuid::Uuid;
use crate::db::AssignmentStore;
use crate::engine::events::{ChangeBus, ChangeKind, SectionChangeEvent};
use crate::engine::fallback::FallbackDetector;
use crate::engine::merge::{merge, merge_all, section_members};
use crate::engine::undo::{UndoStack, DEFAULT_UNDO_CAPACITY, DEFAULT_UNDO_TTL_SECS};
use crate::errors::AppError;
use crate::models::assignment::{
    MoveRequest, ReorderItem, Scope, SectionAssignment, TrackedAssignment, UpsertAssignment,
};
use crate::models::department::{DepartmentDefinition, SectionId};
use crate::models::navigation::{MergedDepartment, MoveAction, MutationReceipt, SectionedDepartments};
use crate::models::user::Principal;

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub undo_capacity: usize,
    pub undo_ttl: Duration,
    pub event_capacity: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        EngineSettings {
            undo_capacity: DEFAULT_UNDO_CAPACITY,
            undo_ttl: Duration::seconds(DEFAULT_UNDO_TTL_SECS),
            event_capacity: 64,
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DragState {
    Idle,
    Dragging { active_id: String, over_id: Option<String> },
    Committing { active_id: String },
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "status", content = "receipt", rename_all = "snake_case")]
pub enum MoveOutcome {
    /// Target equals the current placement; nothing was written.
    Unchanged,
    Moved(MutationReceipt),
}

#[derive(Default)]
struct EngineState {
    assignments: Vec<TrackedAssignment>,
    fallback: bool,
    loaded: bool,
    drags: HashMap<String, DragState>,
}

pub struct NavigationEngine {
    scope: Scope,
    definitions: Arc<Vec<DepartmentDefinition>>,
    store: Arc<dyn AssignmentStore>,
    detector: FallbackDetector,
    state: Mutex<EngineState>,
    undo: Mutex<UndoStack>,
    events: ChangeBus,
}

/// Patches the department's tracked assignment, creating a provisional one
/// from its current merged placement when none exists.
fn patch_or_create(
    assignments: &mut Vec<TrackedAssignment>,
    scope: &Scope,
    current: &MergedDepartment,
    actor: &Principal,
    now: DateTime<Utc>,
    patch: impl FnOnce(&mut SectionAssignment),
) -> SectionAssignment {
    let index = match assignments
        .iter()
        .position(|t| t.assignment().department_id == current.id())
    {
        Some(index) => index,
        None => {
            assignments.push(TrackedAssignment::Provisional(SectionAssignment {
                id: Uuid::new_v4(),
                organization_id: scope.organization_id.clone(),
                vertical_id: scope.vertical_id.clone(),
                department_id: current.id().to_string(),
                department_key: current.id().to_string(),
                section_id: current.section_id,
                display_order: current.display_order,
                is_visible: current.is_visible,
                custom_name: None,
                custom_description: None,
                created_at: now,
                updated_at: now,
                created_by: Some(actor.user_id.clone()),
                updated_by: Some(actor.user_id.clone()),
            }));
            assignments.len() - 1
        }
    };
    let assignment = assignments[index].assignment_mut();
    patch(assignment);
    assignment.updated_at = now;
    assignment.updated_by = Some(actor.user_id.clone());
    assignment.clone()
}

/// New order of `section` with `department_id` inserted at `position`.
fn reordered_items(
    merged: &[MergedDepartment],
    section: SectionId,
    department_id: &str,
    position: i32,
) -> Vec<ReorderItem> {
    let mut ids: Vec<&str> = section_members(merged, section)
        .into_iter()
        .map(|d| d.id())
        .filter(|id| *id != department_id)
        .collect();
    let at = (position.max(0) as usize).min(ids.len());
    ids.insert(at, department_id);
    ids.into_iter()
        .enumerate()
        .map(|(index, id)| ReorderItem {
            department_id: id.to_string(),
            display_order: index as i32,
        })
        .collect()
}

fn clean_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl NavigationEngine {
    pub fn new(
        scope: Scope,
        definitions: Arc<Vec<DepartmentDefinition>>,
        store: Arc<dyn AssignmentStore>,
        detector: FallbackDetector,
        settings: &EngineSettings,
    ) -> Self {
        NavigationEngine {
            scope,
            definitions,
            store,
            detector,
            state: Mutex::new(EngineState::default()),
            undo: Mutex::new(UndoStack::new(settings.undo_capacity, settings.undo_ttl)),
            events: ChangeBus::new(settings.event_capacity),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_undo(&self) -> MutexGuard<'_, UndoStack> {
        self.undo.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SectionChangeEvent> {
        self.events.subscribe()
    }

    pub fn sections(&self) -> SectionedDepartments {
        merge(&self.definitions, &self.lock_state().assignments)
    }

    /// Sections the principal is allowed to see.
    pub fn sections_for(&self, principal: &Principal) -> SectionedDepartments {
        let features: HashSet<String> = principal.features.iter().cloned().collect();
        self.sections().accessible_to(principal.role, &features)
    }

    pub fn assignments(&self) -> Vec<TrackedAssignment> {
        self.lock_state().assignments.clone()
    }

    pub fn is_fallback(&self) -> bool {
        self.lock_state().fallback
    }

    pub fn is_loaded(&self) -> bool {
        self.lock_state().loaded
    }

    pub fn undo_depth(&self) -> usize {
        self.lock_undo().live_len(Utc::now())
    }

    pub fn drag_state(&self, actor: &Principal) -> DragState {
        self.lock_state()
            .drags
            .get(&actor.user_id)
            .cloned()
            .unwrap_or(DragState::Idle)
    }

    fn enter_fallback(&self) {
        let mut state = self.lock_state();
        state.assignments.clear();
        state.fallback = true;
        state.loaded = true;
    }

    fn replace_assignments(&self, rows: Vec<SectionAssignment>) {
        let mut state = self.lock_state();
        state.assignments = rows.into_iter().map(TrackedAssignment::from).collect();
        state.fallback = false;
        state.loaded = true;
    }

    /// Fetches assignments and rebuilds the view. A missing store switches to
    /// read-only defaults and is remembered until `retry`.
    pub async fn load(&self) -> Result<SectionedDepartments, AppError> {
        if self.detector.is_unavailable(&self.scope) {
            debug!(
                "Store marked unavailable for {}/{}, skipping fetch",
                self.scope.organization_id, self.scope.vertical_id
            );
            self.enter_fallback();
            return Ok(self.sections());
        }

        match self.store.list(&self.scope).await {
            Ok(rows) => {
                debug!("Loaded {} assignments", rows.len());
                self.replace_assignments(rows);
            }
            Err(err) => {
                if self.detector.record_failure(&self.scope, &err) {
                    self.enter_fallback();
                } else {
                    warn!("Failed to load section assignments: {}", err);
                    return Err(err);
                }
            }
        }
        Ok(self.sections())
    }

    pub async fn ensure_loaded(&self) -> Result<(), AppError> {
        if !self.is_loaded() {
            self.load().await?;
        }
        Ok(())
    }

    /// Forgets the cached unavailability and loads again.
    pub async fn retry(&self) -> Result<SectionedDepartments, AppError> {
        self.detector.clear(&self.scope);
        let view = self.load().await?;
        if !self.is_fallback() {
            info!(
                "Assignment store available again for {}/{}",
                self.scope.organization_id, self.scope.vertical_id
            );
        }
        Ok(view)
    }

    fn authorize(&self, actor: &Principal) -> Result<(), AppError> {
        if !actor.role.can_edit_sections() {
            return Err(AppError::PermissionDenied(format!(
                "User '{}' may not reorganize navigation",
                actor.user_id
            )));
        }
        if self.is_fallback() {
            return Err(AppError::ReadOnly(
                "Section assignments are unavailable; navigation uses defaults".to_string(),
            ));
        }
        Ok(())
    }

    fn locate(&self, department_id: &str) -> Result<(MergedDepartment, Vec<MergedDepartment>), AppError> {
        let merged = merge_all(&self.definitions, &self.lock_state().assignments);
        let current = merged
            .iter()
            .find(|d| d.id() == department_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Department '{}' not found", department_id)))?;
        Ok((current, merged))
    }

    /// Applies an optimistic change and returns the pre-change snapshot.
    fn begin<T>(&self, apply: impl FnOnce(&mut Vec<TrackedAssignment>) -> T) -> (Vec<TrackedAssignment>, T) {
        let mut state = self.lock_state();
        let snapshot = state.assignments.clone();
        let applied = apply(&mut state.assignments);
        (snapshot, applied)
    }

    fn rollback(&self, snapshot: Vec<TrackedAssignment>, err: &AppError) {
        warn!("Rolling back section change: {}", err);
        self.lock_state().assignments = snapshot;
    }

    /// Replaces the optimistic copy with the store's rows.
    async fn reconcile(&self) {
        match self.store.list(&self.scope).await {
            Ok(rows) => self.replace_assignments(rows),
            Err(err) => {
                if self.detector.record_failure(&self.scope, &err) {
                    self.enter_fallback();
                } else {
                    warn!("Reload after write failed, keeping local state: {}", err);
                }
            }
        }
    }

    /// Restores the snapshot when the write failed. A missing store also
    /// switches the engine to read-only defaults.
    fn settle(&self, snapshot: Vec<TrackedAssignment>, persisted: Result<u64, AppError>) -> Result<u64, AppError> {
        match persisted {
            Ok(affected) => Ok(affected),
            Err(err) => {
                self.rollback(snapshot, &err);
                if self.detector.record_failure(&self.scope, &err) {
                    self.enter_fallback();
                }
                Err(err)
            }
        }
    }

    /// Gives every member of `section` except `skip` a stored row at its
    /// current index, so positional shifts in the store see the whole section.
    /// Writes nothing when all members already have rows.
    async fn materialize_section(
        &self,
        actor: &Principal,
        merged: &[MergedDepartment],
        section: SectionId,
        skip: &str,
    ) -> Result<u64, AppError> {
        let members: Vec<&MergedDepartment> = section_members(merged, section)
            .into_iter()
            .filter(|d| d.id() != skip)
            .collect();
        if !members.iter().any(|d| d.is_virtual()) {
            return Ok(0);
        }
        let items: Vec<ReorderItem> = members
            .iter()
            .enumerate()
            .map(|(index, d)| ReorderItem {
                department_id: d.id().to_string(),
                display_order: index as i32,
            })
            .collect();
        debug!("Materializing {} members of {}", items.len(), section);
        self.store
            .bulk_reorder(&self.scope, section, &items, Some(actor.user_id.clone()))
            .await
            .and_then(|outcome| outcome.require_rows("materialize"))
    }

    /// Moves a department across sections in the store.
    async fn persist_move(
        &self,
        actor: &Principal,
        merged: &[MergedDepartment],
        request: MoveRequest,
        operation: &str,
    ) -> Result<u64, AppError> {
        let materialized = self
            .materialize_section(actor, merged, request.to_section, &request.department_id)
            .await?;
        let moved = self
            .store
            .move_department(&self.scope, request)
            .await
            .and_then(|outcome| outcome.require_rows(operation))?;
        Ok(materialized + moved)
    }

    fn publish(&self, kind: ChangeKind, department_id: Option<&str>, section_id: Option<SectionId>, affected_rows: u64) {
        self.events
            .publish(SectionChangeEvent::new(kind, department_id, section_id, affected_rows));
    }

    pub fn drag_start(&self, actor: &Principal, department_id: &str) -> Result<(), AppError> {
        if !self.definitions.iter().any(|d| d.id == department_id) {
            return Err(AppError::NotFound(format!("Department '{}' not found", department_id)));
        }
        self.lock_state().drags.insert(
            actor.user_id.clone(),
            DragState::Dragging {
                active_id: department_id.to_string(),
                over_id: None,
            },
        );
        Ok(())
    }

    pub fn drag_over(&self, actor: &Principal, target_id: Option<&str>) -> Result<(), AppError> {
        let mut state = self.lock_state();
        match state.drags.get_mut(&actor.user_id) {
            Some(DragState::Dragging { over_id, .. }) => {
                *over_id = target_id.map(str::to_string);
                Ok(())
            }
            _ => Err(AppError::BadRequest("No drag in progress".to_string())),
        }
    }

    /// Always side-effect free; cancelling while idle does nothing.
    pub fn drag_cancel(&self, actor: &Principal) {
        if self.lock_state().drags.remove(&actor.user_id).is_some() {
            debug!("Drag cancelled by {}", actor.user_id);
        }
    }

    pub async fn drag_end(
        &self,
        actor: &Principal,
        department_id: &str,
        target_section: SectionId,
        target_position: i32,
    ) -> Result<MoveOutcome, AppError> {
        {
            let mut state = self.lock_state();
            let active = match state.drags.get(&actor.user_id) {
                Some(DragState::Dragging { active_id, .. }) | Some(DragState::Committing { active_id }) => {
                    Some(active_id.clone())
                }
                _ => None,
            };
            if let Some(active_id) = active {
                if active_id != department_id {
                    return Err(AppError::BadRequest(format!(
                        "Dropped '{}' but '{}' is being dragged",
                        department_id, active_id
                    )));
                }
            }
            state.drags.insert(
                actor.user_id.clone(),
                DragState::Committing {
                    active_id: department_id.to_string(),
                },
            );
        }
        let result = self
            .commit_move(actor, department_id, target_section, target_position)
            .await;
        self.lock_state().drags.remove(&actor.user_id);
        result
    }

    /// Moves a department to the end of another section.
    pub async fn move_to_section(
        &self,
        actor: &Principal,
        department_id: &str,
        target_section: SectionId,
    ) -> Result<MoveOutcome, AppError> {
        let (current, merged) = self.locate(department_id)?;
        let members = section_members(&merged, target_section);
        let target_position = members
            .iter()
            .filter(|d| d.id() != current.id())
            .map(|d| d.display_order)
            .max()
            .map_or(0, |max| max + 1);
        self.commit_move(actor, department_id, target_section, target_position)
            .await
    }

    async fn commit_move(
        &self,
        actor: &Principal,
        department_id: &str,
        target_section: SectionId,
        target_position: i32,
    ) -> Result<MoveOutcome, AppError> {
        self.authorize(actor)?;
        if target_position < 0 {
            return Err(AppError::BadRequest("Target position must not be negative".to_string()));
        }
        let (current, merged) = self.locate(department_id)?;
        if current.section_id == target_section && current.display_order == target_position {
            debug!("{} already at {}@{}", department_id, target_section, target_position);
            return Ok(MoveOutcome::Unchanged);
        }

        let now = Utc::now();
        let (snapshot, _) = self.begin(|assignments| {
            patch_or_create(assignments, &self.scope, &current, actor, now, |a| {
                a.section_id = target_section;
                a.display_order = target_position;
            })
        });
        let action = MoveAction {
            id: Uuid::new_v4(),
            timestamp: now,
            department_id: department_id.to_string(),
            department_name: current.name.clone(),
            from_section_id: current.section_id,
            from_position: current.display_order,
            to_section_id: target_section,
            to_position: target_position,
            previous_state: snapshot.clone(),
        };

        let persisted = if current.section_id == target_section {
            let items = reordered_items(&merged, target_section, department_id, target_position);
            self.store
                .bulk_reorder(&self.scope, target_section, &items, Some(actor.user_id.clone()))
                .await
                .and_then(|outcome| outcome.require_rows("reorder"))
        } else {
            let request = MoveRequest {
                department_id: department_id.to_string(),
                department_key: current.definition.id.clone(),
                from_section: current.section_id,
                to_section: target_section,
                target_position,
                actor: Some(actor.user_id.clone()),
            };
            self.persist_move(actor, &merged, request, "move").await
        };
        let affected_rows = self.settle(snapshot, persisted)?;

        self.lock_undo().push(action, Utc::now());
        self.reconcile().await;
        self.publish(ChangeKind::Moved, Some(department_id), Some(target_section), affected_rows);
        info!(
            "{} moved {} from {}@{} to {}@{}",
            actor.user_id,
            department_id,
            current.section_id,
            current.display_order,
            target_section,
            target_position
        );

        Ok(MoveOutcome::Moved(MutationReceipt {
            department_id: Some(department_id.to_string()),
            section_id: Some(target_section),
            affected_rows,
            message: format!(
                "Moved {} to {} at position {}",
                current.name, target_section, target_position
            ),
        }))
    }

    /// Saves the full order of one section. Departments not listed keep their placement.
    pub async fn reorder_section(
        &self,
        actor: &Principal,
        section: SectionId,
        ordered_ids: &[String],
    ) -> Result<MutationReceipt, AppError> {
        self.authorize(actor)?;
        if ordered_ids.is_empty() {
            return Err(AppError::BadRequest("Nothing to reorder".to_string()));
        }
        let mut seen = HashSet::new();
        if !ordered_ids.iter().all(|id| seen.insert(id.as_str())) {
            return Err(AppError::BadRequest("Duplicate department in order".to_string()));
        }
        let merged = merge_all(&self.definitions, &self.lock_state().assignments);
        let mut targets = Vec::with_capacity(ordered_ids.len());
        for id in ordered_ids {
            let current = merged
                .iter()
                .find(|d| d.id() == id)
                .cloned()
                .ok_or_else(|| AppError::NotFound(format!("Department '{}' not found", id)))?;
            targets.push(current);
        }

        let now = Utc::now();
        let (snapshot, _) = self.begin(|assignments| {
            for (index, current) in targets.iter().enumerate() {
                patch_or_create(assignments, &self.scope, current, actor, now, |a| {
                    a.section_id = section;
                    a.display_order = index as i32;
                });
            }
        });
        let items: Vec<ReorderItem> = ordered_ids
            .iter()
            .enumerate()
            .map(|(index, id)| ReorderItem {
                department_id: id.clone(),
                display_order: index as i32,
            })
            .collect();

        let persisted = self
            .store
            .bulk_reorder(&self.scope, section, &items, Some(actor.user_id.clone()))
            .await
            .and_then(|outcome| outcome.require_rows("reorder"));
        let affected_rows = self.settle(snapshot, persisted)?;

        self.reconcile().await;
        self.publish(ChangeKind::Reordered, None, Some(section), affected_rows);
        Ok(MutationReceipt {
            department_id: None,
            section_id: Some(section),
            affected_rows,
            message: format!("Saved order of {} ({} departments)", section, items.len()),
        })
    }

    /// Upserts a patched copy of one department's assignment.
    async fn upsert_patch(
        &self,
        actor: &Principal,
        department_id: &str,
        kind: ChangeKind,
        patch: impl FnOnce(&MergedDepartment, &mut SectionAssignment),
    ) -> Result<(MergedDepartment, SectionAssignment), AppError> {
        self.authorize(actor)?;
        let (current, _) = self.locate(department_id)?;
        let now = Utc::now();
        let (snapshot, patched) = self.begin(|assignments| {
            patch_or_create(assignments, &self.scope, &current, actor, now, |a| patch(&current, a))
        });

        let persisted = self
            .store
            .upsert(UpsertAssignment::from_assignment(&patched, Some(actor.user_id.clone())))
            .await
            .map(|_| 1);
        let affected_rows = self.settle(snapshot, persisted)?;

        self.reconcile().await;
        self.publish(kind, Some(department_id), Some(patched.section_id), affected_rows);
        Ok((current, patched))
    }

    pub async fn toggle_visibility(&self, actor: &Principal, department_id: &str) -> Result<MutationReceipt, AppError> {
        let (current, patched) = self
            .upsert_patch(actor, department_id, ChangeKind::VisibilityChanged, |current, a| {
                a.is_visible = !current.is_visible;
            })
            .await?;
        Ok(MutationReceipt {
            department_id: Some(department_id.to_string()),
            section_id: Some(patched.section_id),
            affected_rows: 1,
            message: format!(
                "{} is now {}",
                current.name,
                if patched.is_visible { "visible" } else { "hidden" }
            ),
        })
    }

    /// Sets or clears (with `None` or blank text) the custom display text.
    pub async fn rename(
        &self,
        actor: &Principal,
        department_id: &str,
        custom_name: Option<String>,
        custom_description: Option<String>,
    ) -> Result<MutationReceipt, AppError> {
        let custom_name = clean_text(custom_name);
        let custom_description = clean_text(custom_description);
        let (current, patched) = self
            .upsert_patch(actor, department_id, ChangeKind::Renamed, |_, a| {
                a.custom_name = custom_name;
                a.custom_description = custom_description;
            })
            .await?;
        let shown = patched
            .custom_name
            .clone()
            .unwrap_or_else(|| current.definition.name.clone());
        Ok(MutationReceipt {
            department_id: Some(department_id.to_string()),
            section_id: Some(patched.section_id),
            affected_rows: 1,
            message: format!("{} is now shown as {}", current.definition.name, shown),
        })
    }

    /// Drops one department's override so it returns to its defaults.
    pub async fn reset_department(&self, actor: &Principal, department_id: &str) -> Result<MutationReceipt, AppError> {
        self.authorize(actor)?;
        let (current, _) = self.locate(department_id)?;
        if current.is_virtual() {
            return Ok(MutationReceipt {
                department_id: Some(department_id.to_string()),
                section_id: Some(current.section_id),
                affected_rows: 0,
                message: format!("{} already uses its defaults", current.name),
            });
        }

        let (snapshot, _) = self.begin(|assignments| {
            assignments.retain(|t| t.assignment().department_id != department_id)
        });
        let persisted = match self.store.delete_one(&self.scope, department_id).await {
            Ok(true) => Ok(1),
            Ok(false) => Err(AppError::ZeroRowsAffected(format!(
                "reset of '{}' affected no rows",
                department_id
            ))),
            Err(err) => Err(err),
        };
        let affected_rows = self.settle(snapshot, persisted)?;

        self.reconcile().await;
        let section = self.sections().find(department_id).map(|d| d.section_id);
        self.publish(ChangeKind::Reset, Some(department_id), section, affected_rows);
        Ok(MutationReceipt {
            department_id: Some(department_id.to_string()),
            section_id: section,
            affected_rows,
            message: format!("Reset {} to its defaults", current.definition.name),
        })
    }

    /// Drops every override in the scope. Pending undo entries go with them.
    pub async fn reset_all(&self, actor: &Principal) -> Result<MutationReceipt, AppError> {
        self.authorize(actor)?;
        let (snapshot, _) = self.begin(|assignments| assignments.clear());
        if snapshot.is_empty() {
            return Ok(MutationReceipt {
                department_id: None,
                section_id: None,
                affected_rows: 0,
                message: "Navigation already uses the defaults".to_string(),
            });
        }
        let expected = snapshot.len() as u64;

        let persisted = match self.store.delete_all(&self.scope).await {
            Ok(true) => Ok(expected),
            Ok(false) => Err(AppError::ZeroRowsAffected("reset affected no rows".to_string())),
            Err(err) => Err(err),
        };
        let affected_rows = self.settle(snapshot, persisted)?;

        self.lock_undo().clear();
        self.reconcile().await;
        self.publish(ChangeKind::Reset, None, None, affected_rows);
        info!(
            "{} reset navigation for {}/{}",
            actor.user_id, self.scope.organization_id, self.scope.vertical_id
        );
        Ok(MutationReceipt {
            department_id: None,
            section_id: None,
            affected_rows,
            message: "Reset navigation to the defaults".to_string(),
        })
    }

    /// Reverses the most recent live move.
    pub async fn undo_last_move(&self, actor: &Principal) -> Result<MutationReceipt, AppError> {
        self.authorize(actor)?;
        let entry = self
            .lock_undo()
            .latest(Utc::now())
            .cloned()
            .ok_or(AppError::NothingToUndo)?;
        let action = entry.action;
        let merged = merge_all(&self.definitions, &self.lock_state().assignments);

        let (snapshot, _) = self.begin(|assignments| *assignments = action.previous_state.clone());
        let persisted = if action.from_section_id == action.to_section_id {
            // Put the whole section back in its pre-move order.
            let before = merge_all(&self.definitions, &action.previous_state);
            let items: Vec<ReorderItem> = section_members(&before, action.from_section_id)
                .into_iter()
                .enumerate()
                .map(|(index, d)| ReorderItem {
                    department_id: d.id().to_string(),
                    display_order: index as i32,
                })
                .collect();
            self.store
                .bulk_reorder(&self.scope, action.from_section_id, &items, Some(actor.user_id.clone()))
                .await
                .and_then(|outcome| outcome.require_rows("undo"))
        } else {
            let request = MoveRequest {
                department_id: action.department_id.clone(),
                department_key: action.department_id.clone(),
                from_section: action.to_section_id,
                to_section: action.from_section_id,
                target_position: action.from_position,
                actor: Some(actor.user_id.clone()),
            };
            self.persist_move(actor, &merged, request, "undo").await
        };
        let affected_rows = self.settle(snapshot, persisted)?;

        self.lock_undo().remove(action.id);
        self.reconcile().await;
        self.publish(
            ChangeKind::Undone,
            Some(&action.department_id),
            Some(action.from_section_id),
            affected_rows,
        );
        Ok(MutationReceipt {
            department_id: Some(action.department_id.clone()),
            section_id: Some(action.from_section_id),
            affected_rows,
            message: format!(
                "Moved {} back to {} at position {}",
                action.department_name, action.from_section_id, action.from_position
            ),
        })
    }

    /// Prunes expired undo entries; run periodically.
    pub fn sweep_undo(&self) -> usize {
        self.lock_undo().prune_expired(Utc::now())
    }

    /// True when dropping this engine loses nothing but cached rows: no drag
    /// in progress, no live undo entry and no subscriber.
    pub fn is_idle(&self) -> bool {
        let dragging = !self.lock_state().drags.is_empty();
        !dragging && self.undo_depth() == 0 && self.events.receiver_count() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::navigation::Origin;

    fn merged(id: &str, section: SectionId, order: i32) -> MergedDepartment {
        MergedDepartment {
            definition: DepartmentDefinition::new(id, id),
            name: id.to_string(),
            description: None,
            section_id: section,
            display_order: order,
            is_visible: true,
            origin: Origin::Virtual,
        }
    }

    #[test]
    fn reorder_inserts_at_clamped_position() {
        let all = vec![
            merged("hr", SectionId::Departments, 0),
            merged("finance", SectionId::Departments, 1),
            merged("sales", SectionId::Departments, 2),
            merged("logistics", SectionId::Operations, 0),
        ];
        let items = reordered_items(&all, SectionId::Departments, "hr", 2);
        let ids: Vec<_> = items.iter().map(|i| i.department_id.as_str()).collect();
        assert_eq!(ids, vec!["finance", "sales", "hr"]);
        assert_eq!(items[2].display_order, 2);

        let items = reordered_items(&all, SectionId::Departments, "sales", 99);
        assert_eq!(items.last().unwrap().department_id, "sales");
    }

    #[test]
    fn provisional_assignment_is_created_for_virtual_department() {
        let scope = Scope::new("O1", "V1");
        let actor = Principal::new("admin-1", crate::models::user::Role::SuperAdmin);
        let mut assignments = Vec::new();
        let current = merged("finance", SectionId::Departments, 1);
        let patched = patch_or_create(&mut assignments, &scope, &current, &actor, Utc::now(), |a| {
            a.section_id = SectionId::Operations;
            a.display_order = 0;
        });
        assert_eq!(assignments.len(), 1);
        assert!(!assignments[0].is_persisted());
        assert_eq!(patched.section_id, SectionId::Operations);
        assert_eq!(patched.updated_by.as_deref(), Some("admin-1"));
    }

    #[test]
    fn blank_custom_text_clears_override() {
        assert_eq!(clean_text(Some("  ".into())), None);
        assert_eq!(clean_text(Some(" People ".into())), Some("People".into()));
    }
}
