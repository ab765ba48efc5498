//! Key-value store interface + in-memory implementation.
//!
//! The store is the single source of truth for cross-call coordination:
//! execution snapshots, per-execution index counters, and per-tool results.
//! Keys are namespaced by execution id, so unrelated executions never need
//! cross-execution locking.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use uuid::Uuid;

use wf_domain::Result;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Key layout
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub fn state_key(execution_id: &Uuid) -> String {
    format!("exec:{execution_id}")
}

pub fn counter_key(execution_id: &Uuid) -> String {
    format!("exec:{execution_id}:counter")
}

pub fn result_key(execution_id: &Uuid, index: u32) -> String {
    format!("exec:{execution_id}:result:{index}")
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trait
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Narrow interface over a TTL-capable cache.
///
/// Required semantics: read-your-writes consistency per key, and `incr`
/// must be a single atomic increment-and-read — a read-then-write
/// allocation pattern on top of `get`/`set` is a race.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    async fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<()>;

    /// Atomically add `by` to the integer at `key`, seeding a missing key
    /// with `initial` first. Returns the post-increment value.
    async fn incr(&self, key: &str, by: i64, initial: i64, ttl: Duration) -> Result<i64>;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// MemoryKv
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

struct Entry {
    value: Value,
    expires_at: Instant,
}

/// In-memory TTL store for tests and embedded (single-process) use.
#[derive(Default)]
pub struct MemoryKv {
    entries: RwLock<HashMap<String, Entry>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unexpired) keys. Test/diagnostic helper.
    pub fn live_len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .values()
            .filter(|e| e.expires_at > now)
            .count()
    }
}

#[async_trait]
impl KeyValueStore for MemoryKv {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        // Lazy expiry: drop the entry on read when its TTL has passed.
        let expired = {
            let entries = self.entries.read();
            match entries.get(key) {
                Some(e) if e.expires_at > Instant::now() => return Ok(Some(e.value.clone())),
                Some(_) => true,
                None => false,
            }
        };
        if expired {
            self.entries.write().remove(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<()> {
        self.entries.write().insert(
            key.to_owned(),
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn incr(&self, key: &str, by: i64, initial: i64, ttl: Duration) -> Result<i64> {
        // Single write lock across read + write makes the increment atomic.
        let mut entries = self.entries.write();
        let now = Instant::now();
        let current = match entries.get(key) {
            Some(e) if e.expires_at > now => e.value.as_i64().unwrap_or(initial),
            _ => initial,
        };
        let next = current + by;
        entries.insert(
            key.to_owned(),
            Entry {
                value: Value::from(next),
                expires_at: now + ttl,
            },
        );
        Ok(next)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
