use async_trait::async_trait;
use chrono::Utc;
use log::debug;
use sqlx::PgPool;
use uuid::Uuid;
use crate::db::{map_sqlx_error, AssignmentStore};
use crate::errors::AppError;
use crate::models::assignment::{
    AssignmentRow, MoveRequest, ReorderItem, Scope, SectionAssignment, UpsertAssignment, WriteOutcome,
};
use crate::models::department::SectionId;

const UPSERT_SQL: &str = "INSERT INTO department_section_assignments \
    (id, organization_id, vertical_id, department_id, department_key, section_id, display_order, \
     is_visible, custom_name, custom_description, created_at, updated_at, created_by, updated_by) \
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $11, $12, $12) \
    ON CONFLICT (organization_id, vertical_id, department_id) DO UPDATE SET \
    section_id = EXCLUDED.section_id, display_order = EXCLUDED.display_order, \
    is_visible = EXCLUDED.is_visible, custom_name = EXCLUDED.custom_name, \
    custom_description = EXCLUDED.custom_description, updated_at = EXCLUDED.updated_at, \
    updated_by = EXCLUDED.updated_by \
    RETURNING *";

const PLACE_SQL: &str = "INSERT INTO department_section_assignments \
    (id, organization_id, vertical_id, department_id, department_key, section_id, display_order, \
     is_visible, created_at, updated_at, created_by, updated_by) \
    VALUES ($1, $2, $3, $4, $5, $6, $7, TRUE, $8, $8, $9, $9) \
    ON CONFLICT (organization_id, vertical_id, department_id) DO UPDATE SET \
    section_id = EXCLUDED.section_id, display_order = EXCLUDED.display_order, \
    updated_at = EXCLUDED.updated_at, updated_by = EXCLUDED.updated_by";

/// Assignment store backed by the `department_section_assignments` table.
#[derive(Clone)]
pub struct PgAssignmentStore {
    pool: PgPool,
}

impl PgAssignmentStore {
    pub fn new(pool: PgPool) -> Self {
        PgAssignmentStore { pool }
    }
}

#[async_trait]
impl AssignmentStore for PgAssignmentStore {
    async fn list(&self, scope: &Scope) -> Result<Vec<SectionAssignment>, AppError> {
        let rows = sqlx::query_as::<_, AssignmentRow>(
            "SELECT * FROM department_section_assignments \
             WHERE organization_id = $1 AND vertical_id = $2 \
             ORDER BY section_id, display_order",
        )
        .bind(&scope.organization_id)
        .bind(&scope.vertical_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(SectionAssignment::try_from).collect()
    }

    async fn upsert(&self, input: UpsertAssignment) -> Result<SectionAssignment, AppError> {
        let now = Utc::now();
        let row = sqlx::query_as::<_, AssignmentRow>(UPSERT_SQL)
            .bind(Uuid::new_v4())
            .bind(&input.scope.organization_id)
            .bind(&input.scope.vertical_id)
            .bind(&input.department_id)
            .bind(&input.department_key)
            .bind(input.section_id.as_str())
            .bind(input.display_order)
            .bind(input.is_visible)
            .bind(&input.custom_name)
            .bind(&input.custom_description)
            .bind(now)
            .bind(&input.actor)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        match row {
            Some(row) => SectionAssignment::try_from(row),
            None => Err(AppError::ZeroRowsAffected(format!(
                "upsert of '{}' returned no row",
                input.department_id
            ))),
        }
    }

    async fn bulk_reorder(
        &self,
        scope: &Scope,
        section: SectionId,
        items: &[ReorderItem],
        actor: Option<String>,
    ) -> Result<WriteOutcome, AppError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        let mut affected = 0u64;

        for item in items {
            let result = sqlx::query(PLACE_SQL)
                .bind(Uuid::new_v4())
                .bind(&scope.organization_id)
                .bind(&scope.vertical_id)
                .bind(&item.department_id)
                .bind(&item.department_id)
                .bind(section.as_str())
                .bind(item.display_order)
                .bind(now)
                .bind(&actor)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
            affected += result.rows_affected();
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        debug!("Reordered {} rows in section {}", affected, section);
        Ok(WriteOutcome::rows(affected))
    }

    async fn move_department(&self, scope: &Scope, request: MoveRequest) -> Result<WriteOutcome, AppError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        let existing: Option<(String, i32)> = sqlx::query_as(
            "SELECT section_id, display_order FROM department_section_assignments \
             WHERE organization_id = $1 AND vertical_id = $2 AND department_id = $3 FOR UPDATE",
        )
        .bind(&scope.organization_id)
        .bind(&scope.vertical_id)
        .bind(&request.department_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        let shifted = sqlx::query(
            "UPDATE department_section_assignments \
             SET display_order = display_order + 1, updated_at = $5 \
             WHERE organization_id = $1 AND vertical_id = $2 AND section_id = $3 \
             AND display_order >= $4 AND department_id <> $6",
        )
        .bind(&scope.organization_id)
        .bind(&scope.vertical_id)
        .bind(request.to_section.as_str())
        .bind(request.target_position)
        .bind(now)
        .bind(&request.department_id)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?
        .rows_affected();

        let placed = sqlx::query(PLACE_SQL)
            .bind(Uuid::new_v4())
            .bind(&scope.organization_id)
            .bind(&scope.vertical_id)
            .bind(&request.department_id)
            .bind(&request.department_key)
            .bind(request.to_section.as_str())
            .bind(request.target_position)
            .bind(now)
            .bind(&request.actor)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?
            .rows_affected();

        let mut compacted = 0;
        if let Some((old_section, old_order)) = existing {
            if old_section != request.to_section.as_str() {
                compacted = sqlx::query(
                    "UPDATE department_section_assignments \
                     SET display_order = display_order - 1, updated_at = $5 \
                     WHERE organization_id = $1 AND vertical_id = $2 AND section_id = $3 \
                     AND display_order > $4 AND department_id <> $6",
                )
                .bind(&scope.organization_id)
                .bind(&scope.vertical_id)
                .bind(&old_section)
                .bind(old_order)
                .bind(now)
                .bind(&request.department_id)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?
                .rows_affected();
            }
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        debug!(
            "Moved {} from {} to {}@{} (shifted {}, placed {}, compacted {})",
            request.department_id,
            request.from_section,
            request.to_section,
            request.target_position,
            shifted,
            placed,
            compacted
        );
        Ok(WriteOutcome::rows(shifted + placed + compacted))
    }

    async fn delete_all(&self, scope: &Scope) -> Result<bool, AppError> {
        let result = sqlx::query(
            "DELETE FROM department_section_assignments WHERE organization_id = $1 AND vertical_id = $2",
        )
        .bind(&scope.organization_id)
        .bind(&scope.vertical_id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_one(&self, scope: &Scope, department_id: &str) -> Result<bool, AppError> {
        let result = sqlx::query(
            "DELETE FROM department_section_assignments \
             WHERE organization_id = $1 AND vertical_id = $2 AND department_id = $3",
        )
        .bind(&scope.organization_id)
        .bind(&scope.vertical_id)
        .bind(department_id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }
}
