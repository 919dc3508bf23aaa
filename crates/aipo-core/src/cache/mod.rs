//! Content-addressed, read-through response cache (spec.md §4.3).

pub mod key;

pub use key::cache_key;

use crate::model::CacheEntry;
use aipo_adapter_api::ModelResponse;
use chrono::{Duration as ChronoDuration, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Which engine-version entries a `Get` may return (spec.md §4.3 cache
/// invalidation on engine-version bump).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VersionPolicy {
    #[default]
    Current,
    All,
}

#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub insertions: u64,
}

/// Per-method time-to-live (spec.md §4.3: "long-running optimization results
/// persist longest").
pub fn ttl_for_method(method_tag: &str) -> ChronoDuration {
    match method_tag {
        "invoke" => ChronoDuration::hours(24),
        "precompute" | "optimization" => ChronoDuration::days(30),
        _ => ChronoDuration::hours(6),
    }
}

struct Inner {
    conn: Mutex<Connection>,
    version_policy: VersionPolicy,
    stats: Mutex<CacheStats>,
    /// Single-flight map: one inflight materialization per key at a time
    /// (spec.md §4.3 concurrency).
    inflight: Mutex<HashMap<String, Arc<Notify>>>,
}

/// Content-addressed read-through cache, process-wide singleton per run
/// (spec.md §3 ownership). Cheap to clone: all clones share the same
/// storage file and single-flight map.
#[derive(Clone)]
pub struct ResponseCache {
    inner: Arc<Inner>,
}

impl ResponseCache {
    pub fn open(path: &std::path::Path) -> anyhow::Result<Self> {
        Self::from_connection(Connection::open(path)?, VersionPolicy::Current)
    }

    pub fn in_memory() -> anyhow::Result<Self> {
        Self::from_connection(Connection::open_in_memory()?, VersionPolicy::Current)
    }

    pub fn open_with_policy(path: &std::path::Path, policy: VersionPolicy) -> anyhow::Result<Self> {
        Self::from_connection(Connection::open(path)?, policy)
    }

    fn from_connection(conn: Connection, version_policy: VersionPolicy) -> anyhow::Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS cache_entries (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                engine_version TEXT NOT NULL,
                created_at TEXT NOT NULL,
                expires_at TEXT NOT NULL
            );",
        )?;
        Ok(Self {
            inner: Arc::new(Inner {
                conn: Mutex::new(conn),
                version_policy,
                stats: Mutex::new(CacheStats::default()),
                inflight: Mutex::new(HashMap::new()),
            }),
        })
    }

    pub fn get(&self, key: &str) -> anyhow::Result<Option<CacheEntry>> {
        let conn = self.inner.conn.lock().expect("cache mutex poisoned");
        let row: Option<(String, String, String, String)> = conn
            .query_row(
                "SELECT value, engine_version, created_at, expires_at FROM cache_entries WHERE key = ?1",
                params![key],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)),
            )
            .optional()?;
        drop(conn);

        let mut stats = self.inner.stats.lock().expect("cache mutex poisoned");
        let Some((value_json, engine_version, created_at, expires_at)) = row else {
            stats.misses += 1;
            return Ok(None);
        };

        if self.inner.version_policy == VersionPolicy::Current && engine_version != ENGINE_VERSION
        {
            stats.misses += 1;
            return Ok(None);
        }

        let expires_at: chrono::DateTime<Utc> = expires_at.parse()?;
        if expires_at < Utc::now() {
            stats.misses += 1;
            return Ok(None);
        }

        let value: ModelResponse = serde_json::from_str(&value_json)?;
        let created_at: chrono::DateTime<Utc> = created_at.parse()?;
        stats.hits += 1;
        Ok(Some(CacheEntry {
            key: key.to_string(),
            value,
            created_at,
            expires_at,
            engine_version,
        }))
    }

    pub fn put(&self, key: &str, value: &ModelResponse, ttl: ChronoDuration) -> anyhow::Result<()> {
        let now = Utc::now();
        let expires_at = now + ttl;
        let value_json = serde_json::to_string(value)?;
        let conn = self.inner.conn.lock().expect("cache mutex poisoned");
        conn.execute(
            "INSERT INTO cache_entries (key, value, engine_version, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(key) DO UPDATE SET
                value=excluded.value, engine_version=excluded.engine_version,
                created_at=excluded.created_at, expires_at=excluded.expires_at",
            params![
                key,
                value_json,
                ENGINE_VERSION,
                now.to_rfc3339(),
                expires_at.to_rfc3339()
            ],
        )?;
        drop(conn);
        self.inner.stats.lock().expect("cache mutex poisoned").insertions += 1;
        Ok(())
    }

    pub fn evict_expired(&self) -> anyhow::Result<u64> {
        let conn = self.inner.conn.lock().expect("cache mutex poisoned");
        let now = Utc::now().to_rfc3339();
        let n = conn.execute("DELETE FROM cache_entries WHERE expires_at < ?1", params![now])?;
        Ok(n as u64)
    }

    pub fn stats(&self) -> CacheStats {
        self.inner.stats.lock().expect("cache mutex poisoned").clone()
    }

    /// Ensure at most one concurrent materialization happens per key (spec.md
    /// §4.3 single-flight). Returns `Leader` if this call should perform the
    /// miss-fill and notify followers; `Follower` if another call is already
    /// filling this key and the caller should wait then re-check the cache.
    pub async fn single_flight_gate(&self, key: &str) -> SingleFlightRole {
        let notify = {
            let mut inflight = self.inner.inflight.lock().expect("inflight mutex poisoned");
            if let Some(existing) = inflight.get(key) {
                SingleFlightSlot::Follower(existing.clone())
            } else {
                let notify = Arc::new(Notify::new());
                inflight.insert(key.to_string(), notify.clone());
                SingleFlightSlot::Leader(notify)
            }
        };
        match notify {
            SingleFlightSlot::Leader(n) => SingleFlightRole::Leader(LeaderGuard {
                cache: self.clone(),
                key: key.to_string(),
                notify: n,
            }),
            SingleFlightSlot::Follower(n) => {
                n.notified().await;
                SingleFlightRole::Follower
            }
        }
    }

    fn release_inflight(&self, key: &str) {
        self.inner.inflight.lock().expect("inflight mutex poisoned").remove(key);
    }
}

enum SingleFlightSlot {
    Leader(Arc<Notify>),
    Follower(Arc<Notify>),
}

pub enum SingleFlightRole {
    /// This caller must perform the miss-fill (call the adapter, then
    /// `Put`). Dropping the returned guard notifies waiting followers
    /// regardless of success, so a failed insertion never poisons the key
    /// (spec.md §4.3).
    Leader(LeaderGuard),
    /// Another caller is already filling this key; re-check `Get` after this
    /// variant is returned.
    Follower,
}

pub struct LeaderGuard {
    cache: ResponseCache,
    key: String,
    notify: Arc<Notify>,
}

impl Drop for LeaderGuard {
    fn drop(&mut self) {
        self.cache.release_inflight(&self.key);
        self.notify.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_response(text: &str) -> ModelResponse {
        ModelResponse {
            text: text.to_string(),
            finish_reason: aipo_adapter_api::response::FinishReason::Stop,
            input_tokens: 1,
            output_tokens: 1,
            latency_ms: 1,
            raw_meta: serde_json::json!({}),
            tool_calls: vec![],
        }
    }

    #[test]
    fn idempotence_put_then_get_returns_same_bytes() -> anyhow::Result<()> {
        let cache = ResponseCache::in_memory()?;
        let key = cache_key("invoke", "m", "p", &serde_json::json!({}));
        cache.put(&key, &sample_response("hello"), ttl_for_method("invoke"))?;
        let entry = cache.get(&key)?.expect("present");
        assert_eq!(entry.value.text, "hello");
        assert_eq!(cache.stats().hits, 1);
        Ok(())
    }

    #[test]
    fn miss_then_expired_both_report_none() -> anyhow::Result<()> {
        let cache = ResponseCache::in_memory()?;
        assert!(cache.get("nope")?.is_none());
        let key = "expired-key";
        cache.put(key, &sample_response("x"), ChronoDuration::seconds(-1))?;
        assert!(cache.get(key)?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn single_flight_only_one_leader_per_key() {
        let cache = ResponseCache::in_memory().unwrap();
        let role_a = cache.single_flight_gate("k").await;
        assert!(matches!(role_a, SingleFlightRole::Leader(_)));

        let cache2 = cache.clone();
        let follower = tokio::spawn(async move { cache2.single_flight_gate("k").await });

        // Give the follower task a chance to register before the leader
        // finishes; then drop the leader guard to release waiters.
        tokio::task::yield_now().await;
        drop(role_a);

        let role_b = follower.await.unwrap();
        assert!(matches!(role_b, SingleFlightRole::Follower));
    }
}
