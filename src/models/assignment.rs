use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};
use crate::errors::AppError;
use crate::models::department::SectionId;

/// Organization + vertical pair that scopes every read and write.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct Scope {
    pub organization_id: String,
    pub vertical_id: String,
}

impl Scope {
    pub fn new(organization_id: &str, vertical_id: &str) -> Self {
        Scope {
            organization_id: organization_id.to_string(),
            vertical_id: vertical_id.to_string(),
        }
    }
}

/// Per-organization override of a department's placement and display text.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SectionAssignment {
    pub id: Uuid,
    pub organization_id: String,
    pub vertical_id: String,
    pub department_id: String,
    pub department_key: String,
    pub section_id: SectionId,
    pub display_order: i32,
    pub is_visible: bool,
    pub custom_name: Option<String>,
    pub custom_description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: Option<String>,
    pub updated_by: Option<String>,
}

/// Raw row of `department_section_assignments`.
#[derive(sqlx::FromRow, Debug)]
pub struct AssignmentRow {
    pub id: Uuid,
    pub organization_id: String,
    pub vertical_id: String,
    pub department_id: String,
    pub department_key: String,
    pub section_id: String,
    pub display_order: i32,
    pub is_visible: bool,
    pub custom_name: Option<String>,
    pub custom_description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: Option<String>,
    pub updated_by: Option<String>,
}

impl TryFrom<AssignmentRow> for SectionAssignment {
    type Error = AppError;

    fn try_from(row: AssignmentRow) -> Result<Self, Self::Error> {
        let section_id = row.section_id.parse::<SectionId>().map_err(|_| {
            AppError::InternalServerError(format!(
                "Stored assignment for '{}' has unknown section '{}'",
                row.department_id, row.section_id
            ))
        })?;

        Ok(SectionAssignment {
            id: row.id,
            organization_id: row.organization_id,
            vertical_id: row.vertical_id,
            department_id: row.department_id,
            department_key: row.department_key,
            section_id,
            display_order: row.display_order,
            is_visible: row.is_visible,
            custom_name: row.custom_name,
            custom_description: row.custom_description,
            created_at: row.created_at,
            updated_at: row.updated_at,
            created_by: row.created_by,
            updated_by: row.updated_by,
        })
    }
}

/// Input of an upsert keyed by (organization, vertical, department).
#[derive(Debug, Clone)]
pub struct UpsertAssignment {
    pub scope: Scope,
    pub department_id: String,
    pub department_key: String,
    pub section_id: SectionId,
    pub display_order: i32,
    pub is_visible: bool,
    pub custom_name: Option<String>,
    pub custom_description: Option<String>,
    pub actor: Option<String>,
}

impl UpsertAssignment {
    pub fn from_assignment(assignment: &SectionAssignment, actor: Option<String>) -> Self {
        UpsertAssignment {
            scope: Scope::new(&assignment.organization_id, &assignment.vertical_id),
            department_id: assignment.department_id.clone(),
            department_key: assignment.department_key.clone(),
            section_id: assignment.section_id,
            display_order: assignment.display_order,
            is_visible: assignment.is_visible,
            custom_name: assignment.custom_name.clone(),
            custom_description: assignment.custom_description.clone(),
            actor,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ReorderItem {
    pub department_id: String,
    pub display_order: i32,
}

/// Arguments of a cross-section move.
#[derive(Debug, Clone)]
pub struct MoveRequest {
    pub department_id: String,
    pub department_key: String,
    pub from_section: SectionId,
    pub to_section: SectionId,
    pub target_position: i32,
    pub actor: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOutcome {
    pub success: bool,
    pub affected_rows: u64,
}

impl WriteOutcome {
    pub fn rows(affected_rows: u64) -> Self {
        WriteOutcome {
            success: true,
            affected_rows,
        }
    }

    /// Zero rows on a write that should have touched something is a silent failure.
    pub fn require_rows(self, operation: &str) -> Result<u64, AppError> {
        if !self.success {
            return Err(AppError::TransientFailure(format!("{} was rejected by the store", operation)));
        }
        if self.affected_rows == 0 {
            return Err(AppError::ZeroRowsAffected(format!("{} affected no rows", operation)));
        }
        Ok(self.affected_rows)
    }
}

/// Local copy of an assignment, tagged by whether the store has confirmed it.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "state", content = "assignment", rename_all = "lowercase")]
pub enum TrackedAssignment {
    /// Created by an optimistic update; its id is local and not durable.
    Provisional(SectionAssignment),
    Persisted(SectionAssignment),
}

impl TrackedAssignment {
    pub fn assignment(&self) -> &SectionAssignment {
        match self {
            TrackedAssignment::Provisional(a) | TrackedAssignment::Persisted(a) => a,
        }
    }

    pub fn assignment_mut(&mut self) -> &mut SectionAssignment {
        match self {
            TrackedAssignment::Provisional(a) | TrackedAssignment::Persisted(a) => a,
        }
    }

    pub fn is_persisted(&self) -> bool {
        matches!(self, TrackedAssignment::Persisted(_))
    }
}

impl From<SectionAssignment> for TrackedAssignment {
    fn from(assignment: SectionAssignment) -> Self {
        TrackedAssignment::Persisted(assignment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_rows_is_a_failure() {
        let err = WriteOutcome::rows(0).require_rows("move").unwrap_err();
        assert!(matches!(err, AppError::ZeroRowsAffected(_)));
        assert_eq!(WriteOutcome::rows(3).require_rows("move").unwrap(), 3);
    }

    #[test]
    fn unsuccessful_outcome_is_transient() {
        let outcome = WriteOutcome { success: false, affected_rows: 1 };
        assert!(matches!(
            outcome.require_rows("reorder"),
            Err(AppError::TransientFailure(_))
        ));
    }

    #[test]
    fn rows_with_unknown_sections_are_rejected() {
        let now = Utc::now();
        let row = AssignmentRow {
            id: Uuid::new_v4(),
            organization_id: "O1".into(),
            vertical_id: "V1".into(),
            department_id: "hr".into(),
            department_key: "hr".into(),
            section_id: "sidebar".into(),
            display_order: 0,
            is_visible: true,
            custom_name: None,
            custom_description: None,
            created_at: now,
            updated_at: now,
            created_by: None,
            updated_by: None,
        };
        assert!(SectionAssignment::try_from(row).is_err());
    }
}
