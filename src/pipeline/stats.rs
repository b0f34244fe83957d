//! Cache statistics.
//!
//! Frame-scoped diagnostic counters. Nothing in the cache depends on these
//! for correctness; they exist for performance monitoring only.

/// Counters reported by [`RenderPipelineCache`](super::cache::RenderPipelineCache).
#[derive(Debug, Default, Clone, Copy)]
pub struct CacheStats {
    /// Resolves served from the single-slot memo (no hashing at all)
    pub hits_without_hash: u64,
    /// Resolves served from the lookup store (state vector hashed)
    pub hits_with_hash: u64,
    /// Resolves that required building a descriptor
    pub misses: u64,
    /// Pipelines created since the last `end_frame`
    pub creations_this_frame: u64,
    /// Pipelines created during the previous frame
    pub creations_last_frame: u64,
}

impl CacheStats {
    /// Roll the frame counter over. Called once per frame boundary, never
    /// mid-frame.
    pub fn end_frame(&mut self) {
        self.creations_last_frame = self.creations_this_frame;
        self.creations_this_frame = 0;
    }

    /// Total resolves served without creating a pipeline.
    #[must_use]
    pub fn total_hits(&self) -> u64 {
        self.hits_without_hash + self.hits_with_hash
    }
}
