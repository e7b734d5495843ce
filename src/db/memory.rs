use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use uuid::Uuid;
use crate::db::{AssignmentStore, ASSIGNMENTS_TABLE};
use crate::errors::AppError;
use crate::models::assignment::{
    MoveRequest, ReorderItem, Scope, SectionAssignment, UpsertAssignment, WriteOutcome,
};
use crate::models::department::SectionId;

/// Process-local store with the same semantics as the Postgres one.
///
/// Also used as a test double: it counts calls and can simulate a missing
/// table, writes that touch nothing, or a one-shot failure.
#[derive(Default)]
pub struct InMemoryAssignmentStore {
    rows: Mutex<HashMap<Scope, Vec<SectionAssignment>>>,
    unavailable: AtomicBool,
    zero_row_writes: AtomicBool,
    fail_next: Mutex<Option<AppError>>,
    list_calls: AtomicU64,
    write_calls: AtomicU64,
}

fn new_assignment(
    scope: &Scope,
    department_id: &str,
    department_key: &str,
    section_id: SectionId,
    display_order: i32,
    actor: &Option<String>,
    now: DateTime<Utc>,
) -> SectionAssignment {
    SectionAssignment {
        id: Uuid::new_v4(),
        organization_id: scope.organization_id.clone(),
        vertical_id: scope.vertical_id.clone(),
        department_id: department_id.to_string(),
        department_key: department_key.to_string(),
        section_id,
        display_order,
        is_visible: true,
        custom_name: None,
        custom_description: None,
        created_at: now,
        updated_at: now,
        created_by: actor.clone(),
        updated_by: actor.clone(),
    }
}

impl InMemoryAssignmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn set_zero_row_writes(&self, enabled: bool) {
        self.zero_row_writes.store(enabled, Ordering::SeqCst);
    }

    pub fn fail_next(&self, err: AppError) {
        if let Ok(mut slot) = self.fail_next.lock() {
            *slot = Some(err);
        }
    }

    pub fn list_calls(&self) -> u64 {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn write_calls(&self) -> u64 {
        self.write_calls.load(Ordering::SeqCst)
    }

    /// Direct view of the stored rows, bypassing fault injection and counters.
    pub fn snapshot(&self, scope: &Scope) -> Vec<SectionAssignment> {
        self.rows
            .lock()
            .map(|rows| rows.get(scope).cloned().unwrap_or_default())
            .unwrap_or_default()
    }

    fn check(&self) -> Result<(), AppError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AppError::StoreUnavailable(format!(
                "relation \"{}\" does not exist",
                ASSIGNMENTS_TABLE
            )));
        }
        let pending = self.fail_next.lock().ok().and_then(|mut slot| slot.take());
        match pending {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn begin_write(&self) -> Result<bool, AppError> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        Ok(self.zero_row_writes.load(Ordering::SeqCst))
    }

    fn with_rows<T>(&self, scope: &Scope, f: impl FnOnce(&mut Vec<SectionAssignment>) -> T) -> Result<T, AppError> {
        let mut rows = self
            .rows
            .lock()
            .map_err(|_| AppError::InternalServerError("assignment store lock poisoned".to_string()))?;
        Ok(f(rows.entry(scope.clone()).or_default()))
    }
}

#[async_trait]
impl AssignmentStore for InMemoryAssignmentStore {
    async fn list(&self, scope: &Scope) -> Result<Vec<SectionAssignment>, AppError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.with_rows(scope, |rows| rows.clone())
    }

    async fn upsert(&self, input: UpsertAssignment) -> Result<SectionAssignment, AppError> {
        if self.begin_write()? {
            return Err(AppError::ZeroRowsAffected(format!(
                "upsert of '{}' returned no row",
                input.department_id
            )));
        }
        let now = Utc::now();
        self.with_rows(&input.scope, |rows| {
            let index = match rows.iter().position(|a| a.department_id == input.department_id) {
                Some(index) => index,
                None => {
                    rows.push(new_assignment(
                        &input.scope,
                        &input.department_id,
                        &input.department_key,
                        input.section_id,
                        input.display_order,
                        &input.actor,
                        now,
                    ));
                    rows.len() - 1
                }
            };
            let row = &mut rows[index];
            row.section_id = input.section_id;
            row.display_order = input.display_order;
            row.is_visible = input.is_visible;
            row.custom_name = input.custom_name.clone();
            row.custom_description = input.custom_description.clone();
            row.updated_at = now;
            row.updated_by = input.actor.clone();
            row.clone()
        })
    }

    async fn bulk_reorder(
        &self,
        scope: &Scope,
        section: SectionId,
        items: &[ReorderItem],
        actor: Option<String>,
    ) -> Result<WriteOutcome, AppError> {
        if self.begin_write()? {
            return Ok(WriteOutcome::rows(0));
        }
        let now = Utc::now();
        self.with_rows(scope, |rows| {
            for item in items {
                match rows.iter_mut().find(|a| a.department_id == item.department_id) {
                    Some(row) => {
                        row.section_id = section;
                        row.display_order = item.display_order;
                        row.updated_at = now;
                        row.updated_by = actor.clone();
                    }
                    None => rows.push(new_assignment(
                        scope,
                        &item.department_id,
                        &item.department_id,
                        section,
                        item.display_order,
                        &actor,
                        now,
                    )),
                }
            }
            WriteOutcome::rows(items.len() as u64)
        })
    }

    async fn move_department(&self, scope: &Scope, request: MoveRequest) -> Result<WriteOutcome, AppError> {
        if self.begin_write()? {
            return Ok(WriteOutcome::rows(0));
        }
        let now = Utc::now();
        self.with_rows(scope, |rows| {
            let existing = rows
                .iter()
                .find(|a| a.department_id == request.department_id)
                .map(|a| (a.section_id, a.display_order));
            let mut affected = 0u64;

            for row in rows.iter_mut() {
                if row.section_id == request.to_section
                    && row.display_order >= request.target_position
                    && row.department_id != request.department_id
                {
                    row.display_order += 1;
                    row.updated_at = now;
                    affected += 1;
                }
            }

            match rows.iter_mut().find(|a| a.department_id == request.department_id) {
                Some(row) => {
                    row.section_id = request.to_section;
                    row.display_order = request.target_position;
                    row.updated_at = now;
                    row.updated_by = request.actor.clone();
                }
                None => rows.push(new_assignment(
                    scope,
                    &request.department_id,
                    &request.department_key,
                    request.to_section,
                    request.target_position,
                    &request.actor,
                    now,
                )),
            }
            affected += 1;

            if let Some((old_section, old_order)) = existing {
                if old_section != request.to_section {
                    for row in rows.iter_mut() {
                        if row.section_id == old_section
                            && row.display_order > old_order
                            && row.department_id != request.department_id
                        {
                            row.display_order -= 1;
                            row.updated_at = now;
                            affected += 1;
                        }
                    }
                }
            }

            WriteOutcome::rows(affected)
        })
    }

    async fn delete_all(&self, scope: &Scope) -> Result<bool, AppError> {
        if self.begin_write()? {
            return Ok(false);
        }
        self.with_rows(scope, |rows| {
            let had_rows = !rows.is_empty();
            rows.clear();
            had_rows
        })
    }

    async fn delete_one(&self, scope: &Scope, department_id: &str) -> Result<bool, AppError> {
        if self.begin_write()? {
            return Ok(false);
        }
        self.with_rows(scope, |rows| {
            let before = rows.len();
            rows.retain(|a| a.department_id != department_id);
            rows.len() < before
        })
    }
}
