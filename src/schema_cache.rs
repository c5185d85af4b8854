//! Schema cache and resolver.
//!
//! Table schemas are expensive to fetch from system catalogs, so resolvers are
//! wrapped in a TTL cache keyed by table. The clock is injected so expiry can
//! be driven deterministically.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::error::SqlPipeResult;
use crate::schema::{SchemaDocument, TableSchema};

/// Default freshness window for cached schemas.
pub const DEFAULT_SCHEMA_TTL: Duration = Duration::from_secs(10 * 60);

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Instant>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Instant::now()),
        }
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut now) = self.now.lock() {
            *now += by;
        }
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.now.lock().map(|n| *n).unwrap_or_else(|e| *e.into_inner())
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    schema: Arc<TableSchema>,
    expires_at: Instant,
}

/// Thread-safe schema cache with TTL.
pub struct SchemaCache<C: Clock = SystemClock> {
    entries: DashMap<String, CacheEntry>,
    ttl: Duration,
    clock: C,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl SchemaCache<SystemClock> {
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, SystemClock)
    }
}

impl<C: Clock> SchemaCache<C> {
    pub fn with_clock(ttl: Duration, clock: C) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            clock,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Normalize the cache key: `SCHEMA.TABLE`, upper-cased.
    pub fn key(schema: &str, table: &str) -> String {
        format!("{}.{}", schema.trim(), table.trim()).to_uppercase()
    }

    pub fn get(&self, key: &str) -> Option<Arc<TableSchema>> {
        if let Some(entry) = self.entries.get(key) {
            if self.clock.now() < entry.expires_at {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(Arc::clone(&entry.schema));
            }
            drop(entry);
            self.entries.remove(key);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    pub fn put(&self, key: &str, schema: TableSchema) -> Arc<TableSchema> {
        let schema = Arc::new(schema);
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                schema: Arc::clone(&schema),
                expires_at: self.clock.now() + self.ttl,
            },
        );
        schema
    }

    pub fn invalidate(&self, key: &str) {
        if self.entries.remove(key).is_some() {
            tracing::debug!("Invalidated cached schema for '{}'", key);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns `(hits, misses)`.
    pub fn stats(&self) -> (u64, u64) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
        )
    }
}

/// Produces the column schema of a table.
#[async_trait]
pub trait SchemaResolver: Send + Sync {
    async fn resolve_schema(&self, table: &str) -> SqlPipeResult<TableSchema>;
}

/// Resolver backed by an in-memory schema document.
#[derive(Debug, Clone, Default)]
pub struct DocumentSchemaResolver {
    document: SchemaDocument,
}

impl DocumentSchemaResolver {
    pub fn new(document: SchemaDocument) -> Self {
        Self { document }
    }
}

#[async_trait]
impl SchemaResolver for DocumentSchemaResolver {
    async fn resolve_schema(&self, table: &str) -> SqlPipeResult<TableSchema> {
        self.document.table(table)
    }
}

/// Wraps a resolver with a [`SchemaCache`].
pub struct CachedSchemaResolver<R, C: Clock = SystemClock> {
    inner: R,
    namespace: String,
    cache: SchemaCache<C>,
}

impl<R: SchemaResolver> CachedSchemaResolver<R, SystemClock> {
    pub fn new(inner: R, namespace: impl Into<String>, ttl: Duration) -> Self {
        Self::with_cache(inner, namespace, SchemaCache::new(ttl))
    }
}

impl<R: SchemaResolver, C: Clock> CachedSchemaResolver<R, C> {
    pub fn with_cache(inner: R, namespace: impl Into<String>, cache: SchemaCache<C>) -> Self {
        Self {
            inner,
            namespace: namespace.into(),
            cache,
        }
    }

    pub fn cache(&self) -> &SchemaCache<C> {
        &self.cache
    }

    /// Resolve through the cache. `refresh` drops any cached entry first.
    pub async fn resolve(&self, table: &str, refresh: bool) -> SqlPipeResult<Arc<TableSchema>> {
        let key = SchemaCache::<C>::key(&self.namespace, table);
        if refresh {
            self.cache.invalidate(&key);
        } else if let Some(schema) = self.cache.get(&key) {
            return Ok(schema);
        }

        tracing::debug!("Resolving schema for '{}'", key);
        let schema = self.inner.resolve_schema(table).await?;
        Ok(self.cache.put(&key, schema))
    }

    pub fn invalidate(&self, table: &str) {
        self.cache
            .invalidate(&SchemaCache::<C>::key(&self.namespace, table));
    }
}

#[async_trait]
impl<R: SchemaResolver, C: Clock> SchemaResolver for CachedSchemaResolver<R, C> {
    async fn resolve_schema(&self, table: &str) -> SqlPipeResult<TableSchema> {
        self.resolve(table, false).await.map(|s| (*s).clone())
    }
}
