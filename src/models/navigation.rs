use serde::Serialize;
use std::collections::BTreeMap;
use std::collections::HashSet;
use uuid::Uuid;
use chrono::{DateTime, Utc};
use crate::models::assignment::{SectionAssignment, TrackedAssignment};
use crate::models::department::{DepartmentDefinition, SectionId};
use crate::models::user::Role;

/// Where a merged department's placement came from.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "kind", content = "assignment", rename_all = "lowercase")]
pub enum Origin {
    /// No override yet; placement comes from defaults.
    Virtual,
    Provisional(SectionAssignment),
    Persisted(SectionAssignment),
}

impl From<&TrackedAssignment> for Origin {
    fn from(tracked: &TrackedAssignment) -> Self {
        match tracked {
            TrackedAssignment::Provisional(a) => Origin::Provisional(a.clone()),
            TrackedAssignment::Persisted(a) => Origin::Persisted(a.clone()),
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct MergedDepartment {
    pub definition: DepartmentDefinition,
    pub name: String,
    pub description: Option<String>,
    pub section_id: SectionId,
    pub display_order: i32,
    pub is_visible: bool,
    pub origin: Origin,
}

impl MergedDepartment {
    pub fn id(&self) -> &str {
        &self.definition.id
    }

    pub fn is_virtual(&self) -> bool {
        matches!(self.origin, Origin::Virtual)
    }
}

/// Ordered, visibility-filtered departments per section. Every section is present.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(transparent)]
pub struct SectionedDepartments {
    sections: BTreeMap<SectionId, Vec<MergedDepartment>>,
}

impl SectionedDepartments {
    pub fn new(sections: BTreeMap<SectionId, Vec<MergedDepartment>>) -> Self {
        let mut sections = sections;
        for section in SectionId::ALL {
            sections.entry(section).or_default();
        }
        SectionedDepartments { sections }
    }

    pub fn section(&self, section: SectionId) -> &[MergedDepartment] {
        self.sections.get(&section).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn ids(&self, section: SectionId) -> Vec<&str> {
        self.section(section).iter().map(|d| d.id()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SectionId, &Vec<MergedDepartment>)> {
        self.sections.iter()
    }

    pub fn find(&self, department_id: &str) -> Option<&MergedDepartment> {
        self.sections
            .values()
            .flat_map(|list| list.iter())
            .find(|d| d.id() == department_id)
    }

    /// Drops departments the viewer's role or feature set does not unlock.
    pub fn accessible_to(&self, role: Role, features: &HashSet<String>) -> SectionedDepartments {
        let sections = self
            .sections
            .iter()
            .map(|(section, list)| {
                let kept = list
                    .iter()
                    .filter(|d| role.satisfies(d.definition.required_role))
                    .filter(|d| match &d.definition.required_feature {
                        Some(feature) => features.contains(feature),
                        None => true,
                    })
                    .cloned()
                    .collect();
                (*section, kept)
            })
            .collect();
        SectionedDepartments { sections }
    }
}

/// Undo-stack record of one structural move.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct MoveAction {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub department_id: String,
    pub department_name: String,
    pub from_section_id: SectionId,
    pub from_position: i32,
    pub to_section_id: SectionId,
    pub to_position: i32,
    pub previous_state: Vec<TrackedAssignment>,
}

/// Human-readable result of a successful mutation.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct MutationReceipt {
    pub department_id: Option<String>,
    pub section_id: Option<SectionId>,
    pub affected_rows: u64,
    pub message: String,
}
