//! Pluggable pipeline lookup store.
//!
//! The resolver's second cache tier. [`IndexedStore`] keys pipelines by the
//! full state vector; [`NoStore`] turns every resolve into a miss, a valid
//! (slow) degraded mode rather than an error.

use rustc_hash::FxHashMap;

/// Storage strategy for resolved pipelines, injected at cache construction.
///
/// `lowest_dirty_index` is the first state slot that changed since the last
/// resolve; prefix-keyed stores can use it to skip re-hashing the unchanged
/// prefix. Flat hash stores ignore it.
pub trait PipelineStore<P: Clone> {
    fn lookup(&mut self, key: &[u64], lowest_dirty_index: usize) -> Option<P>;

    fn insert(&mut self, key: &[u64], pipeline: P);

    fn clear(&mut self);

    /// Number of pipelines currently stored.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Hash-indexed store: one map over the whole state vector.
#[derive(Debug)]
pub struct IndexedStore<P> {
    pipelines: FxHashMap<Box<[u64]>, P>,
}

impl<P> Default for IndexedStore<P> {
    fn default() -> Self {
        Self {
            pipelines: FxHashMap::default(),
        }
    }
}

impl<P> IndexedStore<P> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<P: Clone> PipelineStore<P> for IndexedStore<P> {
    fn lookup(&mut self, key: &[u64], _lowest_dirty_index: usize) -> Option<P> {
        self.pipelines.get(key).cloned()
    }

    fn insert(&mut self, key: &[u64], pipeline: P) {
        self.pipelines.insert(Box::from(key), pipeline);
    }

    fn clear(&mut self) {
        self.pipelines.clear();
    }

    fn len(&self) -> usize {
        self.pipelines.len()
    }
}

/// Store that never retains anything: every resolve is a miss.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoStore;

impl<P: Clone> PipelineStore<P> for NoStore {
    fn lookup(&mut self, _key: &[u64], _lowest_dirty_index: usize) -> Option<P> {
        None
    }

    fn insert(&mut self, _key: &[u64], _pipeline: P) {}

    fn clear(&mut self) {}

    fn len(&self) -> usize {
        0
    }
}
