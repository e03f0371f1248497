//! Tick acquisition and caching

pub mod batch;
pub mod cache;
pub mod loader;
pub mod memory;
pub mod source;
pub mod store;

pub use batch::{date_batches, DEFAULT_BATCH_DAYS, DEFAULT_PAGE_SIZE};
pub use cache::{CacheEntryMeta, CacheKey, TickCache, CACHE_PREFIX};
pub use loader::{LoadOptions, LoadedTicks, TickLoader, TickOrigin};
pub use memory::{MemoryTickSource, QueryLogEntry};
pub use source::{QueryRange, SourceError, TickCursor, TickRow, TickSource};
pub use store::{BlobStore, FsBlobStore, MemoryBlobStore, StoreError, WriteOutcome};
