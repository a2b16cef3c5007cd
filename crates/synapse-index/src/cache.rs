//! Discovery cache
//!
//! Caches discovery results for the cache TTL so repeated (concept, intent,
//! context) queries return identical candidates. The in-process tier is always
//! on; a Redis tier shared across router instances is optional.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use redis::{aio::MultiplexedConnection, AsyncCommands, Client};
use serde::{Deserialize, Serialize};
use synapse_common::{normalize_concept, QueryContext, RelevanceScore, Result, SynapseError};
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

/// Key derived from the normalized query
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    concept: String,
    digest: String,
}

impl CacheKey {
    pub fn for_query(query: &QueryContext) -> Self {
        let digest = blake3::hash(query.cache_fingerprint().as_bytes());
        Self {
            concept: normalize_concept(&query.concept),
            digest: digest.to_hex().to_string(),
        }
    }

    pub fn concept(&self) -> &str {
        &self.concept
    }

    fn to_redis_key(&self, prefix: &str) -> String {
        format!("{}:discovery:{}:{}", prefix, self.concept, self.digest)
    }
}

/// Cached discovery result with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CachedDiscovery {
    concept: String,
    results: Vec<RelevanceScore>,
    cached_at: DateTime<Utc>,
}

impl CachedDiscovery {
    fn is_fresh(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        match chrono::Duration::from_std(ttl) {
            Ok(ttl) => now < self.cached_at + ttl,
            Err(_) => true,
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Number of cached entries
    pub entry_count: u64,
    pub hits: u64,
    pub misses: u64,
}

/// In-process discovery cache using DashMap
pub struct DiscoveryCache {
    entries: DashMap<CacheKey, CachedDiscovery>,
    ttl: Duration,
    max_entries: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl DiscoveryCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            max_entries: max_entries.max(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn get(&self, key: &CacheKey) -> Option<Vec<RelevanceScore>> {
        let now = Utc::now();
        let hit = self
            .entries
            .get(key)
            .filter(|entry| entry.is_fresh(self.ttl, now))
            .map(|entry| entry.results.clone());

        match hit {
            Some(results) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(results)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub fn insert(&self, key: CacheKey, results: Vec<RelevanceScore>) {
        // Evict expired entries if at capacity
        if self.entries.len() >= self.max_entries {
            self.sweep();

            // If still at capacity, remove oldest
            if self.entries.len() >= self.max_entries {
                let oldest = self
                    .entries
                    .iter()
                    .min_by_key(|e| e.value().cached_at)
                    .map(|e| e.key().clone());
                if let Some(oldest) = oldest {
                    self.entries.remove(&oldest);
                }
            }
        }

        let concept = key.concept.clone();
        self.entries.insert(
            key,
            CachedDiscovery {
                concept,
                results,
                cached_at: Utc::now(),
            },
        );
    }

    /// Drop expired entries; returns how many were removed
    pub fn sweep(&self) -> usize {
        let now = Utc::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_fresh(self.ttl, now));
        before.saturating_sub(self.entries.len())
    }

    /// Drop every entry for a concept
    pub fn invalidate_concept(&self, concept: &str) -> usize {
        let concept = normalize_concept(concept);
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.concept != concept);
        before.saturating_sub(self.entries.len())
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entry_count: self.entries.len() as u64,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

/// Redis-backed discovery cache shared across router instances
///
/// Every round trip, connecting included, is bounded by the operation timeout.
pub struct RedisDiscoveryCache {
    client: Client,
    connection: Arc<RwLock<Option<MultiplexedConnection>>>,
    prefix: String,
    ttl: Duration,
    op_timeout: Duration,
}

impl RedisDiscoveryCache {
    /// Connect to Redis
    pub async fn connect(redis_url: &str, ttl: Duration, op_timeout: Duration) -> Result<Self> {
        let client = Client::open(redis_url)
            .map_err(|e| SynapseError::Config(format!("Failed to create Redis client: {}", e)))?;

        let connection = bounded(op_timeout, "connect", client.get_multiplexed_async_connection()).await?;

        Ok(Self {
            client,
            connection: Arc::new(RwLock::new(Some(connection))),
            prefix: "synapse".to_string(),
            ttl,
            op_timeout,
        })
    }

    /// Use a custom key prefix
    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.prefix = prefix.to_string();
        self
    }

    #[instrument(skip(self))]
    pub async fn get(&self, key: &CacheKey) -> Result<Option<Vec<RelevanceScore>>> {
        let redis_key = key.to_redis_key(&self.prefix);
        let mut conn = self.get_connection().await?;

        let cached: Option<String> = bounded(self.op_timeout, "get", conn.get(&redis_key)).await?;

        match cached {
            Some(json) => {
                let cached: CachedDiscovery = serde_json::from_str(&json)?;
                if cached.is_fresh(self.ttl, Utc::now()) {
                    debug!(key = %redis_key, "Shared cache hit");
                    Ok(Some(cached.results))
                } else {
                    Ok(None)
                }
            }
            None => Ok(None),
        }
    }

    #[instrument(skip(self, results))]
    pub async fn set(&self, key: &CacheKey, results: &[RelevanceScore]) -> Result<()> {
        let redis_key = key.to_redis_key(&self.prefix);
        let cached = CachedDiscovery {
            concept: key.concept.clone(),
            results: results.to_vec(),
            cached_at: Utc::now(),
        };
        let json = serde_json::to_string(&cached)?;

        let mut conn = self.get_connection().await?;
        let ttl_secs = self.ttl.as_secs().max(1);

        bounded(
            self.op_timeout,
            "set",
            conn.set_ex::<_, _, ()>(&redis_key, json, ttl_secs),
        )
        .await
    }

    /// Drop every shared entry for a concept
    #[instrument(skip(self))]
    pub async fn invalidate_concept(&self, concept: &str) -> Result<u64> {
        let pattern = format!("{}:discovery:{}:*", self.prefix, normalize_concept(concept));
        let mut conn = self.get_connection().await?;

        let keys: Vec<String> = bounded(
            self.op_timeout,
            "KEYS",
            redis::cmd("KEYS").arg(&pattern).query_async(&mut conn),
        )
        .await?;

        if keys.is_empty() {
            return Ok(0);
        }

        bounded(self.op_timeout, "DEL", conn.del(&keys)).await
    }

    async fn get_connection(&self) -> Result<MultiplexedConnection> {
        let guard = self.connection.read().await;
        if let Some(conn) = guard.as_ref() {
            return Ok(conn.clone());
        }
        drop(guard);

        let mut guard = self.connection.write().await;
        if let Some(conn) = guard.as_ref() {
            return Ok(conn.clone());
        }

        let connection = bounded(
            self.op_timeout,
            "reconnect",
            self.client.get_multiplexed_async_connection(),
        )
        .await
        .map_err(|e| {
            warn!(error = %e, "Redis reconnect failed");
            e
        })?;

        *guard = Some(connection.clone());
        Ok(connection)
    }
}

async fn bounded<T, F>(limit: Duration, op: &str, fut: F) -> Result<T>
where
    F: Future<Output = redis::RedisResult<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(SynapseError::Storage(format!("Redis {} failed: {}", op, e))),
        Err(_) => Err(SynapseError::Timeout(format!(
            "Redis {} timed out after {}ms",
            op,
            limit.as_millis()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scored(agent: &str) -> RelevanceScore {
        RelevanceScore {
            agent_id: agent.to_string(),
            endpoint: format!("http://{}:1", agent),
            expertise_match: 0.0,
            capability_match: 1.0,
            domain_overlap: 0.5,
            performance_factor: 0.5,
            availability_factor: 1.0,
            hebbian_weight: 0.5,
            relevance_score: 0.51,
            confidence: 0.5,
            reasoning: vec![],
        }
    }

    #[test]
    fn test_cache_key_generation() {
        let a = CacheKey::for_query(&QueryContext::new("Light Bulb", "define"));
        let b = CacheKey::for_query(&QueryContext::new("light bulb", "define"));
        let c = CacheKey::for_query(&QueryContext::new("light bulb", "explain"));

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.concept(), "light_bulb");
        assert!(a.to_redis_key("test").starts_with("test:discovery:light_bulb:"));
    }

    #[test]
    fn test_hit_and_miss_counting() {
        let cache = DiscoveryCache::new(Duration::from_secs(300), 100);
        let key = CacheKey::for_query(&QueryContext::new("lightbulb", "define"));

        assert!(cache.get(&key).is_none());
        cache.insert(key.clone(), vec![scored("definer")]);
        assert_eq!(cache.get(&key).unwrap()[0].agent_id, "definer");

        let stats = cache.stats();
        assert_eq!(stats.entry_count, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn test_expired_entries_are_swept() {
        let cache = DiscoveryCache::new(Duration::ZERO, 100);
        let key = CacheKey::for_query(&QueryContext::new("lightbulb", "define"));
        cache.insert(key.clone(), vec![scored("definer")]);

        assert!(cache.get(&key).is_none());
        assert_eq!(cache.sweep(), 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_invalidate_concept() {
        let cache = DiscoveryCache::new(Duration::from_secs(300), 100);
        cache.insert(CacheKey::for_query(&QueryContext::new("graphene", "define")), vec![]);
        cache.insert(CacheKey::for_query(&QueryContext::new("graphene", "explain")), vec![]);
        cache.insert(CacheKey::for_query(&QueryContext::new("lightbulb", "define")), vec![]);

        assert_eq!(cache.invalidate_concept("Graphene"), 2);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_silent_redis_times_out() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let holder = tokio::spawn(async move {
            let mut open = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                open.push(socket);
            }
        });

        let url = format!("redis://{}", addr);
        let op_timeout = Duration::from_millis(200);
        let attempt = async {
            match RedisDiscoveryCache::connect(&url, Duration::from_secs(300), op_timeout).await {
                Err(err) => err,
                Ok(cache) => cache
                    .get(&CacheKey::for_query(&QueryContext::new("lightbulb", "define")))
                    .await
                    .unwrap_err(),
            }
        };
        let err = tokio::time::timeout(Duration::from_secs(5), attempt)
            .await
            .expect("redis call was not bounded");
        assert!(matches!(err, SynapseError::Timeout(_)), "unexpected error: {}", err);
        holder.abort();
    }

    #[test]
    fn test_capacity_eviction() {
        let cache = DiscoveryCache::new(Duration::from_secs(300), 2);
        for concept in ["a", "b", "c", "d", "e"] {
            cache.insert(CacheKey::for_query(&QueryContext::new(concept, "define")), vec![]);
        }
        assert!(cache.len() <= 2);
    }
}
