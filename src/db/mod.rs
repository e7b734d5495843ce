pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use sqlx::PgPool;
use log::error;
use crate::errors::AppError;
use crate::models::assignment::{
    MoveRequest, ReorderItem, Scope, SectionAssignment, UpsertAssignment, WriteOutcome,
};
use crate::models::department::SectionId;

pub use memory::InMemoryAssignmentStore;
pub use postgres::PgAssignmentStore;

pub const ASSIGNMENTS_TABLE: &str = "department_section_assignments";

pub async fn create_pool(database_url: &str) -> Result<PgPool, AppError> {
    PgPool::connect(database_url).await.map_err(|err| {
        error!("Failed to connect to the database: {}", err);
        map_sqlx_error(err)
    })
}

/// Classifies driver errors. A missing table or schema becomes `StoreUnavailable`
/// so callers can degrade instead of retrying.
pub fn map_sqlx_error(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::RowNotFound => AppError::NotFound("Assignment not found".to_string()),
        sqlx::Error::Database(db_err) => {
            let code = db_err.code();
            // 42P01 undefined_table, 3F000 invalid_schema_name
            if matches!(code.as_deref(), Some("42P01") | Some("3F000")) {
                AppError::StoreUnavailable(db_err.message().to_string())
            } else {
                AppError::TransientFailure(db_err.message().to_string())
            }
        }
        _ => AppError::TransientFailure(err.to_string()),
    }
}

/// Persistence contract for section assignments. All calls are organization-scoped.
#[async_trait]
pub trait AssignmentStore: Send + Sync {
    async fn list(&self, scope: &Scope) -> Result<Vec<SectionAssignment>, AppError>;

    async fn upsert(&self, input: UpsertAssignment) -> Result<SectionAssignment, AppError>;

    async fn bulk_reorder(
        &self,
        scope: &Scope,
        section: SectionId,
        items: &[ReorderItem],
        actor: Option<String>,
    ) -> Result<WriteOutcome, AppError>;

    async fn move_department(&self, scope: &Scope, request: MoveRequest) -> Result<WriteOutcome, AppError>;

    async fn delete_all(&self, scope: &Scope) -> Result<bool, AppError>;

    async fn delete_one(&self, scope: &Scope, department_id: &str) -> Result<bool, AppError>;
}
