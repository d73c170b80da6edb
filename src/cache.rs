use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::store::JsonStore;

#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    created_at: DateTime<Utc>,
}

/// A timestamped map with age-based eviction. One abstraction serves both
/// the translation cache and the pending-trigger registry: `put` overwrites,
/// `insert_if_absent` is the atomic check-and-set the trigger idempotency
/// invariant relies on, and `sweep` removes everything older than a fixed
/// maximum age.
///
/// All operations take the interior lock for their full duration, so a sweep
/// racing a read can only produce a clean miss, never a torn value.
#[derive(Debug, Default)]
pub struct TtlMap<K, V> {
    entries: Mutex<HashMap<K, Entry<V>>>,
}

impl<K, V> TtlMap<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.lock().get(key).map(|e| e.value.clone())
    }

    pub fn put(&self, key: K, value: V) {
        self.put_with_timestamp(key, value, Utc::now());
    }

    pub(crate) fn put_with_timestamp(&self, key: K, value: V, created_at: DateTime<Utc>) {
        self.lock().insert(key, Entry { value, created_at });
    }

    /// Insert only when no live entry exists. Returns whether the value was
    /// newly inserted.
    pub fn insert_if_absent(&self, key: K, value: V) -> bool {
        let mut entries = self.lock();
        if entries.contains_key(&key) {
            return false;
        }
        entries.insert(
            key,
            Entry {
                value,
                created_at: Utc::now(),
            },
        );
        true
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        self.lock().remove(key).map(|e| e.value)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Remove every entry older than `max_age`, returning the removed pairs.
    pub fn sweep(&self, max_age: Duration) -> Vec<(K, V)> {
        let cutoff = Utc::now() - max_age;
        let mut entries = self.lock();
        let expired: Vec<K> = entries
            .iter()
            .filter(|(_, e)| e.created_at < cutoff)
            .map(|(k, _)| k.clone())
            .collect();
        expired
            .into_iter()
            .filter_map(|k| entries.remove(&k).map(|e| (k, e.value)))
            .collect()
    }

    /// Snapshot of all live entries with their insertion timestamps.
    pub fn entries(&self) -> Vec<(K, V, DateTime<Utc>)> {
        self.lock()
            .iter()
            .map(|(k, e)| (k.clone(), e.value.clone(), e.created_at))
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<K, Entry<V>>> {
        self.entries.lock().expect("ttl map lock poisoned")
    }
}

/// Persisted cache entry, `{text, timestamp}` with epoch-millisecond
/// timestamps.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PersistedEntry {
    text: String,
    timestamp: i64,
}

/// A listing row for the cache admin commands.
#[derive(Debug, Clone)]
pub struct CachedTranslation {
    pub key: String,
    pub text: String,
    pub cached_at: DateTime<Utc>,
}

/// The translation result cache: `(source text, target language)` → text,
/// bounded by a fixed maximum age. In-memory entries are authoritative; the
/// JSON file is a warm-start copy rewritten after each insert and sweep
/// (last-write-wins across concurrent rewrites).
#[derive(Debug)]
pub struct TranslationCache {
    map: TtlMap<String, String>,
    store: JsonStore,
    max_age: Duration,
}

impl TranslationCache {
    pub fn new(store: JsonStore, max_age: Duration) -> Self {
        Self {
            map: TtlMap::new(),
            store,
            max_age,
        }
    }

    fn key(source_text: &str, target_lang: &str) -> String {
        format!("{}::{}", source_text, target_lang)
    }

    /// Load the persisted warm-start copy, skipping entries already past the
    /// maximum age.
    pub async fn load(&self) {
        let persisted: HashMap<String, PersistedEntry> = self.store.load_or_default().await;
        let cutoff = Utc::now() - self.max_age;
        let mut loaded = 0usize;
        for (key, entry) in persisted {
            let Some(cached_at) = DateTime::from_timestamp_millis(entry.timestamp) else {
                continue;
            };
            if cached_at < cutoff {
                continue;
            }
            self.map.put_with_timestamp(key, entry.text, cached_at);
            loaded += 1;
        }
        if loaded > 0 {
            info!("Loaded {} cached translations", loaded);
        }
    }

    pub fn get(&self, source_text: &str, target_lang: &str) -> Option<String> {
        self.map.get(&Self::key(source_text, target_lang))
    }

    pub async fn put(&self, source_text: &str, target_lang: &str, translated: &str) {
        self.map
            .put(Self::key(source_text, target_lang), translated.to_string());
        if let Err(e) = self.persist().await {
            warn!("Failed to persist translation cache: {}", e);
        }
    }

    /// Evict entries older than the maximum age. Returns how many were
    /// removed.
    pub async fn sweep(&self) -> usize {
        let removed = self.map.sweep(self.max_age);
        if !removed.is_empty() {
            debug!("Swept {} expired cache entries", removed.len());
            if let Err(e) = self.persist().await {
                warn!("Failed to persist translation cache: {}", e);
            }
        }
        removed.len()
    }

    pub async fn clear(&self) -> usize {
        let count = self.map.len();
        self.map.sweep(Duration::seconds(-1));
        if let Err(e) = self.persist().await {
            warn!("Failed to persist translation cache: {}", e);
        }
        count
    }

    pub fn list(&self) -> Vec<CachedTranslation> {
        let mut items: Vec<CachedTranslation> = self
            .map
            .entries()
            .into_iter()
            .map(|(key, text, cached_at)| CachedTranslation {
                key,
                text,
                cached_at,
            })
            .collect();
        items.sort_by(|a, b| b.cached_at.cmp(&a.cached_at));
        items
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    async fn persist(&self) -> Result<()> {
        let snapshot: HashMap<String, PersistedEntry> = self
            .map
            .entries()
            .into_iter()
            .map(|(key, text, cached_at)| {
                (
                    key,
                    PersistedEntry {
                        text,
                        timestamp: cached_at.timestamp_millis(),
                    },
                )
            })
            .collect();
        self.store.save(&snapshot).await
    }

    #[cfg(test)]
    pub(crate) fn backdate(&self, source_text: &str, target_lang: &str, age: Duration) {
        let key = Self::key(source_text, target_lang);
        if let Some(value) = self.map.get(&key) {
            self.map.put_with_timestamp(key, value, Utc::now() - age);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_then_get() {
        let map: TtlMap<String, String> = TtlMap::new();
        map.put("k".to_string(), "v".to_string());
        assert_eq!(map.get(&"k".to_string()), Some("v".to_string()));
        assert_eq!(map.get(&"other".to_string()), None);
    }

    #[test]
    fn test_put_overwrites() {
        let map: TtlMap<String, String> = TtlMap::new();
        map.put("k".to_string(), "v1".to_string());
        map.put("k".to_string(), "v2".to_string());
        assert_eq!(map.get(&"k".to_string()), Some("v2".to_string()));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_insert_if_absent() {
        let map: TtlMap<String, String> = TtlMap::new();
        assert!(map.insert_if_absent("k".to_string(), "first".to_string()));
        assert!(!map.insert_if_absent("k".to_string(), "second".to_string()));
        assert_eq!(map.get(&"k".to_string()), Some("first".to_string()));
    }

    #[test]
    fn test_sweep_removes_only_expired() {
        let map: TtlMap<String, String> = TtlMap::new();
        map.put_with_timestamp(
            "old".to_string(),
            "v".to_string(),
            Utc::now() - Duration::hours(7),
        );
        map.put("fresh".to_string(), "v".to_string());

        let removed = map.sweep(Duration::hours(6));
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].0, "old");
        assert!(map.get(&"old".to_string()).is_none());
        assert!(map.get(&"fresh".to_string()).is_some());
    }

    #[test]
    fn test_entry_survives_until_max_age() {
        let map: TtlMap<String, String> = TtlMap::new();
        map.put_with_timestamp(
            "k".to_string(),
            "v".to_string(),
            Utc::now() - Duration::hours(5),
        );
        assert!(map.sweep(Duration::hours(6)).is_empty());
        assert_eq!(map.get(&"k".to_string()), Some("v".to_string()));
    }

    #[tokio::test]
    async fn test_translation_cache_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TranslationCache::new(
            JsonStore::new(dir.path().join("cache.json")),
            Duration::hours(6),
        );

        cache.put("bonjour", "EN-US", "hello").await;
        assert_eq!(cache.get("bonjour", "EN-US"), Some("hello".to_string()));
        assert_eq!(cache.get("bonjour", "DE"), None);
    }

    #[tokio::test]
    async fn test_translation_cache_persists_across_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path().join("cache.json"));

        let cache = TranslationCache::new(store.clone(), Duration::hours(6));
        cache.put("bonjour", "EN-US", "hello").await;

        let reloaded = TranslationCache::new(store, Duration::hours(6));
        reloaded.load().await;
        assert_eq!(reloaded.get("bonjour", "EN-US"), Some("hello".to_string()));
    }

    #[tokio::test]
    async fn test_translation_cache_sweep_evicts_old() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TranslationCache::new(
            JsonStore::new(dir.path().join("cache.json")),
            Duration::hours(6),
        );

        cache.put("bonjour", "EN-US", "hello").await;
        cache.backdate("bonjour", "EN-US", Duration::hours(7));

        assert_eq!(cache.sweep().await, 1);
        assert_eq!(cache.get("bonjour", "EN-US"), None);
    }

    #[tokio::test]
    async fn test_load_skips_expired_entries() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path().join("cache.json"));

        let stale = (Utc::now() - Duration::hours(8)).timestamp_millis();
        tokio::fs::write(
            dir.path().join("cache.json"),
            format!(r#"{{"bonjour::EN-US": {{"text": "hello", "timestamp": {stale}}}}}"#),
        )
        .await
        .unwrap();

        let cache = TranslationCache::new(store, Duration::hours(6));
        cache.load().await;
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_clear_empties_cache() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TranslationCache::new(
            JsonStore::new(dir.path().join("cache.json")),
            Duration::hours(6),
        );

        cache.put("a", "DE", "x").await;
        cache.put("b", "DE", "y").await;
        assert_eq!(cache.clear().await, 2);
        assert!(cache.is_empty());
    }
}
