//! Reflection cache
//!
//! - `key`: cache keys for single members, aliases and aggregate lists
//! - `heap`: the soft-reference arena holding every cached referent
//! - `reflect_cache`: per-type caches and the directory that owns them

mod heap;
mod key;
mod reflect_cache;

pub use heap::{Cacheable, Cached, RefHandle, SoftHeap};
pub use key::{AggregateKind, CacheKey};
pub use reflect_cache::{CacheDirectory, CacheGuard, ReflectCache};
