pub mod cache;

pub use cache::{CacheStore, FsCacheStore, MockCacheStore};
