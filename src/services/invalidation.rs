//! Cache-invalidation interface.
//!
//! Dashboard caches live outside the engine; the only contract here is that
//! opaque keys for every touched student are published once the triggering
//! transaction has committed, and never for a rolled-back one. Backends hold
//! an `Arc<dyn InvalidationSink>` and call it post-commit.

use std::sync::Mutex;

use crate::models::StudentId;

/// Opaque invalidation key for external cache layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum InvalidationKey {
    /// Per-student cache entries.
    User(StudentId),
    /// Per-student dashboard payloads.
    Dashboard(StudentId),
}

impl InvalidationKey {
    /// Render the key in the wire format cache consumers expect.
    pub fn as_cache_key(&self) -> String {
        match self {
            InvalidationKey::User(student) => format!("user:{}", student),
            InvalidationKey::Dashboard(student) => format!("dashboard:user:{}", student),
        }
    }
}

/// Pluggable sink invalidation keys are published to.
pub trait InvalidationSink: Send + Sync {
    fn publish(&self, keys: &[InvalidationKey]);
}

/// Sink that drops every key. The default for backends without a cache tier.
#[derive(Debug, Default)]
pub struct NullSink;

impl InvalidationSink for NullSink {
    fn publish(&self, _keys: &[InvalidationKey]) {}
}

/// Sink that records published keys in memory, for tests and local tooling.
#[derive(Debug, Default)]
pub struct MemorySink {
    keys: Mutex<Vec<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys published so far, in publication order.
    pub fn published(&self) -> Vec<String> {
        self.keys.lock().unwrap().clone()
    }

    /// Drop all recorded keys.
    pub fn clear(&self) {
        self.keys.lock().unwrap().clear();
    }
}

impl InvalidationSink for MemorySink {
    fn publish(&self, keys: &[InvalidationKey]) {
        let mut recorded = self.keys.lock().unwrap();
        recorded.extend(keys.iter().map(|k| k.as_cache_key()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_formats() {
        assert_eq!(InvalidationKey::User(StudentId(7)).as_cache_key(), "user:7");
        assert_eq!(
            InvalidationKey::Dashboard(StudentId(7)).as_cache_key(),
            "dashboard:user:7"
        );
    }

    #[test]
    fn memory_sink_records_in_order() {
        let sink = MemorySink::new();
        sink.publish(&[
            InvalidationKey::User(StudentId(1)),
            InvalidationKey::Dashboard(StudentId(1)),
        ]);
        assert_eq!(sink.published(), vec!["user:1", "dashboard:user:1"]);
        sink.clear();
        assert!(sink.published().is_empty());
    }
}
