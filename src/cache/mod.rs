// # Response Caching
//
// Read-through result cache keyed by normalized query text plus every call
// option that affects the response. TTL is the only freshness mechanism;
// there is no explicit invalidation API.

pub mod result_cache;

pub use result_cache::{CacheKey, ResultCache};
