#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Arc;
use deptnav_backend::db::{AssignmentStore, InMemoryAssignmentStore};
use deptnav_backend::engine::{EngineSettings, FallbackDetector, InMemoryFallbackCache, NavigationEngine};
use deptnav_backend::models::assignment::Scope;
use deptnav_backend::models::department::{DepartmentDefinition, SectionId};
use deptnav_backend::models::user::{Principal, Role};

pub fn scope() -> Scope {
    Scope::new("O1", "V1")
}

pub fn definitions(ids: &[&str]) -> Vec<DepartmentDefinition> {
    ids.iter()
        .map(|id| {
            let mut name = id.to_string();
            name[..1].make_ascii_uppercase();
            DepartmentDefinition::new(id, &name)
        })
        .collect()
}

pub fn super_admin() -> Principal {
    Principal::new("admin-1", Role::SuperAdmin)
}

pub fn member() -> Principal {
    Principal::new("member-1", Role::Member)
}

pub struct Harness {
    pub store: Arc<InMemoryAssignmentStore>,
    pub engine: NavigationEngine,
}

pub fn harness_with(ids: &[&str], settings: EngineSettings) -> Harness {
    let store = Arc::new(InMemoryAssignmentStore::new());
    let shared: Arc<dyn AssignmentStore> = store.clone();
    let engine = NavigationEngine::new(
        scope(),
        Arc::new(definitions(ids)),
        shared,
        FallbackDetector::new(Arc::new(InMemoryFallbackCache::new())),
        &settings,
    );
    Harness { store, engine }
}

pub fn harness(ids: &[&str]) -> Harness {
    harness_with(ids, EngineSettings::default())
}

pub fn ids(engine: &NavigationEngine, section: SectionId) -> Vec<String> {
    engine
        .sections()
        .ids(section)
        .into_iter()
        .map(str::to_string)
        .collect()
}

/// (department, section, order) of every stored row, order-insensitive.
pub fn placements(rows: impl IntoIterator<Item = (String, SectionId, i32)>) -> HashSet<(String, SectionId, i32)> {
    rows.into_iter().collect()
}
