//! The tile lifecycle: per-tile state, the three-tier cache and the
//! asynchronous fetch engine.

pub mod cache;
pub mod disk;
pub mod fetch;
pub mod source;
pub mod state;

pub use cache::{CacheStats, TileCache};
pub use disk::{now_ms, tile_path, DiskCacheIndex, DiskEntry};
pub use fetch::{FetchEngine, FetchResult};
pub use source::{CartoDarkSource, TemplateSource, TileSource};
pub use state::{RetryState, TileState};
