//! Combines static department definitions with per-organization overrides.
//!
//! Everything here is pure: the same inputs always produce the same view.

use std::collections::{BTreeMap, HashMap};
use crate::models::assignment::TrackedAssignment;
use crate::models::department::{DepartmentDefinition, SectionId};
use crate::models::navigation::{MergedDepartment, Origin, SectionedDepartments};

/// Ids that live in the secondary navigation by default.
pub const SECONDARY_NAVIGATION: &[&str] = &[
    "operations",
    "logistics",
    "inventory",
    "procurement",
    "facilities",
    "maintenance",
    "quality",
    "calendar",
    "tasks",
];

/// Ids that belong to the administrative area by default.
pub const ADMINISTRATIVE: &[&str] = &[
    "admin",
    "settings",
    "users",
    "billing",
    "audit",
    "integrations",
    "security",
];

pub fn heuristic_default_section(department_id: &str) -> SectionId {
    if department_id == "documents" {
        SectionId::Documents
    } else if SECONDARY_NAVIGATION.contains(&department_id) {
        SectionId::Operations
    } else if ADMINISTRATIVE.contains(&department_id) {
        SectionId::Admin
    } else {
        SectionId::Departments
    }
}

pub fn default_section(definition: &DepartmentDefinition) -> SectionId {
    definition
        .default_section
        .unwrap_or_else(|| heuristic_default_section(&definition.id))
}

/// Position of each definition among the definitions sharing its default section.
fn default_orders(definitions: &[DepartmentDefinition]) -> Vec<i32> {
    let mut next: HashMap<SectionId, i32> = HashMap::new();
    definitions
        .iter()
        .map(|definition| {
            let slot = next.entry(default_section(definition)).or_insert(0);
            let order = *slot;
            *slot += 1;
            order
        })
        .collect()
}

/// One merged entry per definition, hidden ones included, in definition order.
pub fn merge_all(
    definitions: &[DepartmentDefinition],
    assignments: &[TrackedAssignment],
) -> Vec<MergedDepartment> {
    let by_department: HashMap<&str, &TrackedAssignment> = assignments
        .iter()
        .map(|tracked| (tracked.assignment().department_id.as_str(), tracked))
        .collect();
    let orders = default_orders(definitions);

    definitions
        .iter()
        .zip(orders)
        .map(|(definition, default_order)| match by_department.get(definition.id.as_str()) {
            Some(tracked) => {
                let assignment = tracked.assignment();
                MergedDepartment {
                    definition: definition.clone(),
                    name: assignment
                        .custom_name
                        .clone()
                        .unwrap_or_else(|| definition.name.clone()),
                    description: assignment
                        .custom_description
                        .clone()
                        .or_else(|| definition.description.clone()),
                    section_id: assignment.section_id,
                    display_order: assignment.display_order,
                    is_visible: assignment.is_visible,
                    origin: Origin::from(*tracked),
                }
            }
            None => MergedDepartment {
                definition: definition.clone(),
                name: definition.name.clone(),
                description: definition.description.clone(),
                section_id: default_section(definition),
                display_order: default_order,
                is_visible: true,
                origin: Origin::Virtual,
            },
        })
        .collect()
}

/// Groups visible departments by section, ordered by `display_order`.
/// Ties keep definition order.
pub fn merge(
    definitions: &[DepartmentDefinition],
    assignments: &[TrackedAssignment],
) -> SectionedDepartments {
    let mut sections: BTreeMap<SectionId, Vec<MergedDepartment>> = BTreeMap::new();
    for merged in merge_all(definitions, assignments) {
        if merged.is_visible {
            sections.entry(merged.section_id).or_default().push(merged);
        }
    }
    for list in sections.values_mut() {
        list.sort_by_key(|d| d.display_order);
    }
    SectionedDepartments::new(sections)
}

/// Departments of one section, hidden ones included, in display order.
pub fn section_members(merged: &[MergedDepartment], section: SectionId) -> Vec<&MergedDepartment> {
    let mut members: Vec<&MergedDepartment> = merged.iter().filter(|d| d.section_id == section).collect();
    members.sort_by_key(|d| d.display_order);
    members
}
