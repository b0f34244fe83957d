//! Render pipeline state cache.
//!
//! - `state`: slot layout and the numeric encodings packed into slots
//! - `cache`: the mutable state accumulator + two-tier pipeline resolver
//! - `descriptor`: field values -> owned pipeline descriptor translation
//! - `vertex`: vertex input layout generation (buffer merging)
//! - `lookup`: pluggable pipeline store (hash indexed / disabled)
//! - `stats`: frame-scoped cache counters

pub mod cache;
pub mod descriptor;
pub mod lookup;
pub mod state;
pub mod stats;
pub mod vertex;

pub use cache::RenderPipelineCache;
pub use lookup::{IndexedStore, NoStore, PipelineStore};
pub use state::{DrawMode, MrtMask};
pub use stats::CacheStats;
