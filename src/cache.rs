use crate::store::KvStore;
use chrono::{DateTime, Utc};
use moka::future::Cache;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);

pub const GEOCODE_PREFIX: &str = "pvf:geocode:";
pub const SUGGEST_PREFIX: &str = "pvf:suggest:";
pub const WEATHER_PREFIX: &str = "pvf:weather:";

/// Every key family the cache writes. `clear` never touches anything else.
pub const OWNED_PREFIXES: [&str; 3] = [GEOCODE_PREFIX, SUGGEST_PREFIX, WEATHER_PREFIX];

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Settable clock for driving expiry deterministically.
#[derive(Debug)]
pub struct ManualClock {
    millis: AtomicI64,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            millis: AtomicI64::new(start.timestamp_millis()),
        }
    }

    pub fn advance(&self, by: Duration) {
        let step = i64::try_from(by.as_millis()).unwrap_or(i64::MAX);
        self.millis.fetch_add(step, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.millis.load(Ordering::SeqCst)).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    pub value: T,
    pub expires_at: DateTime<Utc>,
}

/// Outcome of a cache read. Callers that only need the value use [`TtlCache::get`].
#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup<T> {
    Hit(T),
    Miss,
    /// The entry existed but had expired; it has been evicted.
    Expired,
    /// The medium failed or the stored entry could not be decoded.
    Unreadable,
}

impl<T> CacheLookup<T> {
    pub fn into_value(self) -> Option<T> {
        match self {
            CacheLookup::Hit(value) => Some(value),
            CacheLookup::Miss | CacheLookup::Expired | CacheLookup::Unreadable => None,
        }
    }
}

/// Expiring key-value cache over the persistent medium.
///
/// Expiry is lazy: an expired entry is removed when a read finds it. Entries
/// are mirrored into an in-process moka tier to avoid a medium round-trip on
/// hot keys; the medium stays authoritative and the expiry stamp is checked
/// on every read regardless of which tier served it. `clear` bumps a
/// generation so reads and writes that straddle it cannot repopulate the hot
/// tier with entries the medium no longer has.
#[derive(Clone)]
pub struct TtlCache {
    store: KvStore,
    hot: Cache<String, String>,
    clock: Arc<dyn Clock>,
    default_ttl: Duration,
    generation: Arc<AtomicU64>,
}

impl TtlCache {
    pub fn new(store: KvStore, default_ttl: Duration) -> Self {
        Self::with_clock(store, default_ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(store: KvStore, default_ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        let hot = Cache::builder()
            .max_capacity(1000)
            .time_to_live(default_ttl.max(DEFAULT_TTL))
            .build();

        Self {
            store,
            hot,
            clock,
            default_ttl,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn store(&self) -> &KvStore {
        &self.store
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.lookup(key).await.into_value()
    }

    pub async fn lookup<T: DeserializeOwned>(&self, key: &str) -> CacheLookup<T> {
        let raw = match self.hot.get(key).await {
            Some(raw) => raw,
            None => {
                let seen = self.generation.load(Ordering::SeqCst);
                match self.store.get(key).await {
                    Ok(Some(raw)) => {
                        self.promote(key, raw.clone(), seen).await;
                        raw
                    }
                    Ok(None) => {
                        tracing::debug!("Cache miss for {}", key);
                        return CacheLookup::Miss;
                    }
                    Err(e) => {
                        tracing::warn!("Cache read failed for {}: {}", key, e);
                        return CacheLookup::Unreadable;
                    }
                }
            }
        };

        let entry: CacheEntry<T> = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("Discarding undecodable cache entry {}: {}", key, e);
                self.evict(key).await;
                return CacheLookup::Unreadable;
            }
        };

        if entry.expires_at <= self.clock.now() {
            tracing::debug!("Cache entry {} expired at {}", key, entry.expires_at);
            self.evict(key).await;
            return CacheLookup::Expired;
        }

        tracing::debug!("Cache hit for {}", key);
        CacheLookup::Hit(entry.value)
    }

    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::weeks(5200));
        let expires_at = self
            .clock
            .now()
            .checked_add_signed(ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        let raw = match serde_json::to_string(&CacheEntry { value, expires_at }) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!("Skipping cache write for {}: {}", key, e);
                return;
            }
        };

        let seen = self.generation.load(Ordering::SeqCst);
        match self.store.put(key, &raw).await {
            Ok(()) => self.promote(key, raw, seen).await,
            Err(e) => {
                // Keep the tiers consistent: a value the medium refused is not cached at all.
                self.hot.invalidate(key).await;
                tracing::warn!("Cache write failed for {}: {}", key, e);
            }
        }
    }

    pub async fn set_default<T: Serialize>(&self, key: &str, value: &T) {
        self.set(key, value, self.default_ttl).await;
    }

    /// Removes every entry under the cache's owned prefixes.
    pub async fn clear(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.hot.invalidate_all();

        let mut removed = 0;
        for prefix in OWNED_PREFIXES {
            match self.store.remove_prefix(prefix).await {
                Ok(count) => removed += count,
                Err(e) => tracing::warn!("Failed to clear cache prefix {}: {}", prefix, e),
            }
        }
        tracing::debug!("Cleared {} cache entries", removed);
        removed
    }

    /// Mirrors `raw` into the hot tier unless a `clear` ran since `seen`.
    async fn promote(&self, key: &str, raw: String, seen: u64) {
        if self.generation.load(Ordering::SeqCst) != seen {
            return;
        }
        self.hot.insert(key.to_string(), raw).await;
        if self.generation.load(Ordering::SeqCst) != seen {
            self.hot.invalidate(key).await;
        }
    }

    async fn evict(&self, key: &str) {
        self.hot.invalidate(key).await;
        if let Err(e) = self.store.remove(key).await {
            tracing::warn!("Failed to evict cache entry {}: {}", key, e);
        }
    }
}
