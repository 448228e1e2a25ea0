//! Shared TTL-capable key-value store.
//!
//! Backs every cache in the system (search results, off-schedule items,
//! synonym records). Pattern-based bulk delete is required for synonym-driven
//! cache invalidation.

mod memory;
mod sqlite;

pub use memory::MemoryKvStore;
pub use sqlite::SqliteKvStore;

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during key-value store operations.
#[derive(Debug, Error)]
pub enum KvError {
    #[error("store error: {0}")]
    Store(String),

    #[error("invalid pattern: {0}")]
    InvalidPattern(String),
}

/// A shared, TTL-capable string store.
///
/// Keys are flat strings with `:`-separated segments by convention
/// (`search:doctor who:1:…`). Patterns use `*` as the only wildcard.
pub trait KvStore: Send + Sync {
    /// Get a value. Expired entries read as absent.
    fn get(&self, key: &str) -> Result<Option<String>, KvError>;

    /// Set a value, optionally expiring after `ttl`.
    fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), KvError>;

    /// Delete a single key. Deleting a missing key is not an error.
    fn del(&self, key: &str) -> Result<(), KvError>;

    /// List all live keys matching a `*` wildcard pattern.
    fn scan_keys(&self, pattern: &str) -> Result<Vec<String>, KvError>;

    /// Delete all keys matching a `*` wildcard pattern, returning the count.
    fn del_matching(&self, pattern: &str) -> Result<u64, KvError>;
}

/// Translate a `*` wildcard pattern into a SQL LIKE pattern, escaping the
/// LIKE metacharacters in the literal parts.
pub(crate) fn pattern_to_like(pattern: &str) -> String {
    let mut like = String::with_capacity(pattern.len());
    for c in pattern.chars() {
        match c {
            '*' => like.push('%'),
            '%' => like.push_str("\\%"),
            '_' => like.push_str("\\_"),
            '\\' => like.push_str("\\\\"),
            other => like.push(other),
        }
    }
    like
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_to_like() {
        assert_eq!(pattern_to_like("search:doctor who:*"), "search:doctor who:%");
        assert_eq!(pattern_to_like("a_b%c"), "a\\_b\\%c");
        assert_eq!(pattern_to_like("plain"), "plain");
    }
}
