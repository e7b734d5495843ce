//! Detection and caching of a missing assignment store.

use chrono::{DateTime, Utc};
use log::{info, warn};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use crate::errors::AppError;
use crate::models::assignment::Scope;

/// Key-value cache remembering which scopes have no store.
pub trait FallbackCache: Send + Sync {
    fn get(&self, key: &str) -> Option<DateTime<Utc>>;
    fn set(&self, key: &str, marked_at: DateTime<Utc>);
    fn clear(&self, key: &str);
}

#[derive(Default)]
pub struct InMemoryFallbackCache {
    entries: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl InMemoryFallbackCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FallbackCache for InMemoryFallbackCache {
    fn get(&self, key: &str) -> Option<DateTime<Utc>> {
        self.entries.lock().ok().and_then(|entries| entries.get(key).copied())
    }

    fn set(&self, key: &str, marked_at: DateTime<Utc>) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.to_string(), marked_at);
        }
    }

    fn clear(&self, key: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.remove(key);
        }
    }
}

pub fn cache_key(scope: &Scope) -> String {
    format!(
        "department-sections-unavailable:{}:{}",
        scope.organization_id, scope.vertical_id
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadFailure {
    /// The store does not exist; serve defaults read-only.
    Unavailable,
    /// Anything else; surface to the caller.
    Other,
}

pub fn classify(err: &AppError) -> LoadFailure {
    match err {
        AppError::StoreUnavailable(_) => LoadFailure::Unavailable,
        _ => LoadFailure::Other,
    }
}

#[derive(Clone)]
pub struct FallbackDetector {
    cache: Arc<dyn FallbackCache>,
}

impl FallbackDetector {
    pub fn new(cache: Arc<dyn FallbackCache>) -> Self {
        FallbackDetector { cache }
    }

    pub fn is_unavailable(&self, scope: &Scope) -> bool {
        self.cache.get(&cache_key(scope)).is_some()
    }

    /// Records a load failure. Returns true when the scope entered fallback mode.
    pub fn record_failure(&self, scope: &Scope, err: &AppError) -> bool {
        match classify(err) {
            LoadFailure::Unavailable => {
                warn!(
                    "Assignment store unavailable for {}/{}, serving defaults read-only: {}",
                    scope.organization_id, scope.vertical_id, err
                );
                self.cache.set(&cache_key(scope), Utc::now());
                true
            }
            LoadFailure::Other => false,
        }
    }

    pub fn clear(&self, scope: &Scope) {
        info!(
            "Clearing store-unavailable marker for {}/{}",
            scope.organization_id, scope.vertical_id
        );
        self.cache.clear(&cache_key(scope));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_missing_store_enters_fallback() {
        let detector = FallbackDetector::new(Arc::new(InMemoryFallbackCache::new()));
        let scope = Scope::new("O1", "V1");

        assert!(!detector.record_failure(&scope, &AppError::TransientFailure("timeout".into())));
        assert!(!detector.is_unavailable(&scope));

        assert!(detector.record_failure(&scope, &AppError::StoreUnavailable("no table".into())));
        assert!(detector.is_unavailable(&scope));
        assert!(!detector.is_unavailable(&Scope::new("O1", "V2")));

        detector.clear(&scope);
        assert!(!detector.is_unavailable(&scope));
    }

    #[test]
    fn key_includes_organization_and_vertical() {
        assert_eq!(
            cache_key(&Scope::new("O1", "V1")),
            "department-sections-unavailable:O1:V1"
        );
    }
}
