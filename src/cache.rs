// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Skill Tree Engine - Evaluation Cache

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use serde::Serialize;

use crate::evaluator::EvaluationResult;
use crate::layout::Layout;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub lookups: u64,
    pub hits: u64,
    pub inserts: u64,
    pub entries: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        if self.lookups == 0 {
            0.0
        } else {
            self.hits as f64 / self.lookups as f64
        }
    }
}

/// Evaluation results keyed by canonical layout.
///
/// Shared across worker threads. Each key holds at most one result; when
/// two workers race on the same key, both may compute it but the first
/// insert wins and the second result is dropped.
#[derive(Debug, Default)]
pub struct EvaluationCache {
    map: RwLock<HashMap<Layout, Arc<EvaluationResult>>>,
    lookups: AtomicU64,
    hits: AtomicU64,
    inserts: AtomicU64,
}

impl EvaluationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, layout: &Layout) -> Option<Arc<EvaluationResult>> {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        let key = layout.canonical();
        let found = self.map.read().unwrap_or_else(PoisonError::into_inner).get(&key).cloned();
        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        }
        found
    }

    /// Store `result` unless the key is already present. Returns the entry
    /// that ends up in the cache.
    pub fn insert(&self, layout: &Layout, result: EvaluationResult) -> Arc<EvaluationResult> {
        let key = layout.canonical();
        let mut map = self.map.write().unwrap_or_else(PoisonError::into_inner);
        map.entry(key)
            .or_insert_with(|| {
                self.inserts.fetch_add(1, Ordering::Relaxed);
                Arc::new(result)
            })
            .clone()
    }

    /// Look up `layout`, computing and storing it on a miss. Errors are
    /// returned as-is and never cached.
    pub fn get_or_try_insert_with<E>(
        &self,
        layout: &Layout,
        compute: impl FnOnce() -> Result<EvaluationResult, E>,
    ) -> Result<Arc<EvaluationResult>, E> {
        if let Some(hit) = self.get(layout) {
            return Ok(hit);
        }
        let result = compute()?;
        Ok(self.insert(layout, result))
    }

    pub fn len(&self) -> usize {
        self.map.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.map.write().unwrap_or_else(PoisonError::into_inner).clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            lookups: self.lookups.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            inserts: self.inserts.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::UpgradeConfig;

    fn result_for(layout: &Layout, min: i64) -> EvaluationResult {
        EvaluationResult {
            layout: layout.clone(),
            outcomes: Vec::new(),
            min,
            max: min,
            mean: min as f64,
            positive: 0,
            total_outcomes: 0,
            adjacency_score: 0.0,
            efficiency: 1.0,
            max_triggers_per_flip: 0,
        }
    }

    #[test]
    fn equivalent_layouts_share_an_entry() {
        let cache = EvaluationCache::new();
        let plain = Layout::default();
        let padded = Layout::new(Default::default(), UpgradeConfig::from([("EMT".to_string(), vec![0, 0])]));

        cache.insert(&plain, result_for(&plain, 5));
        let hit = cache.get(&padded).expect("test: canonical hit");
        assert_eq!(hit.min, 5);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn first_insert_wins() {
        let cache = EvaluationCache::new();
        let layout = Layout::default();
        cache.insert(&layout, result_for(&layout, 1));
        let kept = cache.insert(&layout, result_for(&layout, 2));
        assert_eq!(kept.min, 1);
        assert_eq!(cache.stats().inserts, 1);
    }

    #[test]
    fn compute_runs_only_on_miss_and_errors_are_not_cached() {
        let cache = EvaluationCache::new();
        let layout = Layout::default();

        let err: Result<_, &str> = cache.get_or_try_insert_with(&layout, || Err("boom"));
        assert!(err.is_err());
        assert!(cache.is_empty());

        let mut calls = 0;
        for _ in 0..3 {
            let r: Result<_, &str> = cache.get_or_try_insert_with(&layout, || {
                calls += 1;
                Ok(result_for(&layout, 7))
            });
            assert_eq!(r.expect("test: ok").min, 7);
        }
        assert_eq!(calls, 1);

        let stats = cache.stats();
        assert_eq!(stats.lookups, 4);
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.entries, 1);
        assert!((stats.hit_rate() - 0.5).abs() < 1e-9);
    }
}
