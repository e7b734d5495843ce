use log::{debug, info};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use crate::db::AssignmentStore;
use crate::engine::fallback::{FallbackCache, FallbackDetector};
use crate::engine::orchestrator::{EngineSettings, NavigationEngine};
use crate::models::assignment::Scope;
use crate::models::department::DepartmentDefinition;

/// Lazily creates one engine per organization + vertical, all sharing the
/// definitions, the store and the fallback cache.
pub struct EngineRegistry {
    definitions: Arc<Vec<DepartmentDefinition>>,
    store: Arc<dyn AssignmentStore>,
    detector: FallbackDetector,
    settings: EngineSettings,
    engines: Mutex<HashMap<Scope, Arc<NavigationEngine>>>,
}

impl EngineRegistry {
    pub fn new(
        definitions: Vec<DepartmentDefinition>,
        store: Arc<dyn AssignmentStore>,
        cache: Arc<dyn FallbackCache>,
        settings: EngineSettings,
    ) -> Self {
        EngineRegistry {
            definitions: Arc::new(definitions),
            store,
            detector: FallbackDetector::new(cache),
            settings,
            engines: Mutex::new(HashMap::new()),
        }
    }

    pub fn definitions(&self) -> &[DepartmentDefinition] {
        &self.definitions
    }

    pub fn engine(&self, scope: &Scope) -> Arc<NavigationEngine> {
        let mut engines = self.engines.lock().unwrap_or_else(PoisonError::into_inner);
        engines
            .entry(scope.clone())
            .or_insert_with(|| {
                debug!(
                    "Creating navigation engine for {}/{}",
                    scope.organization_id, scope.vertical_id
                );
                Arc::new(NavigationEngine::new(
                    scope.clone(),
                    Arc::clone(&self.definitions),
                    Arc::clone(&self.store),
                    self.detector.clone(),
                    &self.settings,
                ))
            })
            .clone()
    }

    /// Prunes expired undo entries in every engine.
    pub fn sweep_undo(&self) -> usize {
        let engines: Vec<Arc<NavigationEngine>> = self
            .engines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        engines.iter().map(|engine| engine.sweep_undo()).sum()
    }

    /// Drops engines nobody else holds and that have no pending state. The
    /// next request for their scope creates a fresh engine and reloads.
    pub fn evict_idle(&self) -> usize {
        let mut engines = self.engines.lock().unwrap_or_else(PoisonError::into_inner);
        let before = engines.len();
        engines.retain(|_, engine| Arc::strong_count(engine) > 1 || !engine.is_idle());
        before - engines.len()
    }

    pub fn engine_count(&self) -> usize {
        self.engines.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Runs `sweep_undo` and `evict_idle` on a fixed interval for the lifetime of the runtime.
    pub fn spawn_undo_sweeper(self: &Arc<Self>, every: Duration) -> tokio::task::JoinHandle<()> {
        let registry = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                let pruned = registry.sweep_undo();
                if pruned > 0 {
                    info!("Pruned {} expired undo entries", pruned);
                }
                let evicted = registry.evict_idle();
                if evicted > 0 {
                    debug!("Evicted {} idle navigation engines", evicted);
                }
            }
        })
    }
}
