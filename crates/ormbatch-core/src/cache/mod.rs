//! Materializer and result caches.

pub mod fingerprint;
pub mod materializer;
pub mod provider;
pub mod result;

pub use fingerprint::{fingerprint, FINGERPRINT_PREFIX};
pub use materializer::{Materializer, MaterializerCache};
pub use provider::{CacheEntry, CachePayload, CacheProvider, MemoryCacheProvider};
pub use result::{CacheStats, ResultCache};
