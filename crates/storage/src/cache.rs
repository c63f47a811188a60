//! Weight-bounded on-disk cache of fetched coverage files.
//!
//! Entries are keyed by (layer, requested geometry, interpolation). A miss
//! streams the source into a fresh file under the cache directory and pads
//! it to the requested extent before it becomes visible to readers.
//!
//! ## Concurrency
//!
//! Loads are single-flight per key: concurrent requests for an equal key
//! wait on the same slot and then read the entry the first request stored.
//! Requests for different keys never share a slot. A failed load stores
//! nothing, so the next request retries.
//!
//! ## Eviction
//!
//! Total weight is the sum of file sizes. When an insert pushes it past the
//! configured maximum, least recently used entries are evicted and their
//! files deleted. Remaining files are deleted when the cache is dropped.

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use lru::LruCache;
use metrics::counter;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use coverage_processor::{GridTransform, Interpolation};
use geo_common::Geometry;

use crate::config::CoverageCacheConfig;
use crate::error::{Result, StorageError};
use crate::fetcher::CoverageFetcher;

/// Identity of a cached coverage.
///
/// Geometries compare by their canonical descriptor, so two separately
/// parsed but equal geometries share an entry.
#[derive(Debug, Clone)]
pub struct CacheKey {
    layer: String,
    geometry: Arc<Geometry>,
    descriptor: String,
    interpolation: Interpolation,
}

impl CacheKey {
    pub fn new(layer: impl Into<String>, geometry: Arc<Geometry>, interpolation: Interpolation) -> Self {
        let descriptor = geometry.to_string();
        Self {
            layer: layer.into(),
            geometry,
            descriptor,
            interpolation,
        }
    }

    pub fn layer(&self) -> &str {
        &self.layer
    }

    pub fn geometry(&self) -> &Arc<Geometry> {
        &self.geometry
    }

    pub fn interpolation(&self) -> Interpolation {
        self.interpolation
    }
}

impl PartialEq for CacheKey {
    fn eq(&self, other: &Self) -> bool {
        self.layer == other.layer
            && self.interpolation == other.interpolation
            && self.descriptor == other.descriptor
    }
}

impl Eq for CacheKey {}

impl Hash for CacheKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.layer.hash(state);
        self.descriptor.hash(state);
        self.interpolation.hash(state);
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}|{}", self.layer, self.interpolation, self.descriptor)
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    path: PathBuf,
    bytes: u64,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    fetches: AtomicU64,
}

/// Snapshot of cache statistics.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub fetches: u64,
    pub entries: usize,
    pub size_bytes: u64,
}

impl CacheStats {
    /// Hit rate as a percentage (0-100).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

struct Entries {
    lru: LruCache<CacheKey, CacheEntry>,
    size_bytes: u64,
}

pub struct CoverageCache {
    config: CoverageCacheConfig,
    fetcher: Arc<dyn CoverageFetcher>,
    grid_transform: GridTransform,
    entries: Mutex<Entries>,
    /// One load slot per key currently being fetched.
    loading: Mutex<HashMap<CacheKey, Arc<Mutex<()>>>>,
    counters: Counters,
}

impl CoverageCache {
    pub fn new(
        config: CoverageCacheConfig,
        fetcher: Arc<dyn CoverageFetcher>,
        grid_transform: GridTransform,
    ) -> Result<Self> {
        config.validate().map_err(StorageError::config)?;
        Ok(Self {
            config,
            fetcher,
            grid_transform,
            entries: Mutex::new(Entries {
                lru: LruCache::unbounded(),
                size_bytes: 0,
            }),
            loading: Mutex::new(HashMap::new()),
            counters: Counters::default(),
        })
    }

    /// Path of a local file holding the coverage for `key`, fetching it
    /// from `url` on a miss.
    #[instrument(skip(self, key), fields(layer = %key.layer, url = %url))]
    pub async fn get(&self, key: &CacheKey, url: &str) -> Result<PathBuf> {
        if let Some(path) = self.lookup(key).await {
            return Ok(self.hit(path));
        }

        let slot = self.slot(key).await;
        let _guard = slot.lock().await;

        // A load for this key may have finished while we waited
        if let Some(path) = self.lookup(key).await {
            self.release(key, &slot).await;
            return Ok(self.hit(path));
        }

        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        counter!("coverage_cache_misses_total").increment(1);

        let loaded = self.load(key, url).await;
        if let Ok(entry) = &loaded {
            self.insert(key.clone(), entry.clone()).await;
        }
        self.release(key, &slot).await;

        let entry = loaded?;
        info!(bytes = entry.bytes, path = %entry.path.display(), "Cached coverage");
        Ok(entry.path)
    }

    /// Drop the entry for `key` and delete its file.
    pub async fn invalidate(&self, key: &CacheKey) {
        let removed = {
            let mut entries = self.entries.lock().await;
            let removed = entries.lru.pop(key);
            if let Some(entry) = &removed {
                entries.size_bytes -= entry.bytes;
            }
            removed
        };
        if let Some(entry) = removed {
            remove_file(&entry.path).await;
        }
    }

    /// Drop every entry and delete all files.
    pub async fn clear(&self) {
        let drained: Vec<CacheEntry> = {
            let mut entries = self.entries.lock().await;
            entries.size_bytes = 0;
            let mut drained = Vec::with_capacity(entries.lru.len());
            while let Some((_, entry)) = entries.lru.pop_lru() {
                drained.push(entry);
            }
            drained
        };
        for entry in drained {
            remove_file(&entry.path).await;
        }
    }

    pub async fn stats(&self) -> CacheStats {
        let entries = self.entries.lock().await;
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
            fetches: self.counters.fetches.load(Ordering::Relaxed),
            entries: entries.lru.len(),
            size_bytes: entries.size_bytes,
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.lru.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.lru.is_empty()
    }

    pub fn config(&self) -> &CoverageCacheConfig {
        &self.config
    }

    async fn lookup(&self, key: &CacheKey) -> Option<PathBuf> {
        let mut entries = self.entries.lock().await;
        entries.lru.get(key).map(|entry| entry.path.clone())
    }

    fn hit(&self, path: PathBuf) -> PathBuf {
        self.counters.hits.fetch_add(1, Ordering::Relaxed);
        counter!("coverage_cache_hits_total").increment(1);
        debug!(path = %path.display(), "Coverage cache hit");
        path
    }

    async fn slot(&self, key: &CacheKey) -> Arc<Mutex<()>> {
        let mut loading = self.loading.lock().await;
        loading
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn release(&self, key: &CacheKey, slot: &Arc<Mutex<()>>) {
        let mut loading = self.loading.lock().await;
        if loading.get(key).is_some_and(|current| Arc::ptr_eq(current, slot)) {
            loading.remove(key);
        }
    }

    async fn load(&self, key: &CacheKey, url: &str) -> Result<CacheEntry> {
        tokio::fs::create_dir_all(&self.config.directory).await?;
        let path = self.config.directory.join(format!("{}.tiff", Uuid::new_v4()));

        self.counters.fetches.fetch_add(1, Ordering::Relaxed);
        counter!("coverage_fetches_total").increment(1);

        let result = match self.fetcher.fetch_to(url, &path).await {
            Ok(_) => self.pad(&path, key).await,
            Err(err) => Err(err),
        };

        match result {
            Ok(()) => {
                let bytes = tokio::fs::metadata(&path).await?.len();
                Ok(CacheEntry { path, bytes })
            }
            Err(err) => {
                warn!(error = %err, "Coverage load failed");
                remove_file(&path).await;
                Err(err)
            }
        }
    }

    /// Pad or crop the fetched file to the requested extent.
    async fn pad(&self, path: &Path, key: &CacheKey) -> Result<()> {
        let transform = self.grid_transform.clone();
        let geometry = key.geometry.clone();
        let path = path.to_path_buf();

        let adjustment = tokio::task::spawn_blocking(move || transform.adjust_file(&path, &geometry))
            .await
            .map_err(|e| StorageError::Task(e.to_string()))??;

        if adjustment.changed {
            debug!("Padded fetched coverage to requested extent");
        }
        Ok(())
    }

    async fn insert(&self, key: CacheKey, entry: CacheEntry) {
        let max_bytes = self.config.max_bytes();
        let mut evicted = Vec::new();
        {
            let mut entries = self.entries.lock().await;
            entries.size_bytes += entry.bytes;
            if let Some(replaced) = entries.lru.put(key, entry) {
                entries.size_bytes -= replaced.bytes;
                evicted.push(replaced);
            }

            // The newest entry always stays, even when it alone is over the limit
            while entries.size_bytes > max_bytes && entries.lru.len() > 1 {
                match entries.lru.pop_lru() {
                    Some((_, old)) => {
                        entries.size_bytes -= old.bytes;
                        evicted.push(old);
                    }
                    None => break,
                }
            }
        }

        if evicted.is_empty() {
            return;
        }

        self.counters
            .evictions
            .fetch_add(evicted.len() as u64, Ordering::Relaxed);
        counter!("coverage_cache_evictions_total").increment(evicted.len() as u64);

        for entry in evicted {
            debug!(path = %entry.path.display(), bytes = entry.bytes, "Evicted coverage");
            remove_file(&entry.path).await;
        }
    }
}

impl Drop for CoverageCache {
    fn drop(&mut self) {
        let entries = self.entries.get_mut();
        while let Some((_, entry)) = entries.lru.pop_lru() {
            if let Err(e) = std::fs::remove_file(&entry.path) {
                debug!(path = %entry.path.display(), error = %e, "Could not delete cached coverage");
            }
        }
    }
}

async fn remove_file(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "Could not delete cached coverage");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use coverage_processor::read_geotiff;
    use geo_common::{BoundingBox, CrsCode};
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use test_utils::geotiff_bytes;

    /// Writes a constant GeoTIFF over a fixed extent and counts calls.
    struct CountingFetcher {
        calls: AtomicUsize,
        size: u32,
        extent: (f64, f64, f64, f64),
        delay: Duration,
        failures_left: AtomicUsize,
    }

    impl CountingFetcher {
        fn new(size: u32) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                size,
                extent: (-75.0, 3.0, -73.0, 5.0),
                delay: Duration::ZERO,
                failures_left: AtomicUsize::new(0),
            }
        }

        fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        fn with_extent(mut self, extent: (f64, f64, f64, f64)) -> Self {
            self.extent = extent;
            self
        }

        fn failing_first(self, count: usize) -> Self {
            self.failures_left.store(count, Ordering::SeqCst);
            self
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CoverageFetcher for CountingFetcher {
        async fn fetch_to(&self, url: &str, destination: &Path) -> Result<u64> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() && url.contains("slow") {
                tokio::time::sleep(self.delay).await;
            }
            let failing = self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if failing {
                return Err(StorageError::fetch(url, "connection reset"));
            }

            let cells = (self.size * self.size) as usize;
            let bytes = geotiff_bytes(
                self.size,
                self.size,
                self.extent,
                4326,
                &vec![1.0; cells],
                Some(-9999.0),
            );
            std::fs::write(destination, &bytes)?;
            Ok(bytes.len() as u64)
        }
    }

    fn geometry() -> Arc<Geometry> {
        Arc::new(Geometry::grid(
            BoundingBox::new(-75.0, 3.0, -73.0, 5.0),
            CrsCode::Epsg4326,
            20,
            20,
        ))
    }

    fn cache(dir: &Path, fetcher: Arc<CountingFetcher>, max_mb: u64) -> CoverageCache {
        let config = CoverageCacheConfig::default()
            .with_directory(dir)
            .with_max_weight_mb(max_mb);
        CoverageCache::new(config, fetcher, GridTransform::default()).unwrap()
    }

    // ========================================================================
    // Keys
    // ========================================================================

    #[test]
    fn test_keys_compare_by_value() {
        let a = CacheKey::new("dem", geometry(), Interpolation::Bilinear);
        let b = CacheKey::new("dem", geometry(), Interpolation::Bilinear);
        assert_eq!(a, b);

        let c = CacheKey::new("dem", geometry(), Interpolation::Nearest);
        assert_ne!(a, c);
        let d = CacheKey::new("slope", geometry(), Interpolation::Bilinear);
        assert_ne!(a, d);
    }

    // ========================================================================
    // Loading
    // ========================================================================

    #[tokio::test]
    async fn test_second_get_is_a_hit() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Arc::new(CountingFetcher::new(20));
        let cache = cache(dir.path(), fetcher.clone(), 100);
        let key = CacheKey::new("dem", geometry(), Interpolation::Bilinear);

        let first = cache.get(&key, "http://wcs/dem").await.unwrap();
        let second = cache.get(&key, "http://wcs/dem").await.unwrap();

        assert_eq!(first, second);
        assert!(first.exists());
        assert_eq!(fetcher.calls(), 1);

        let stats = cache.stats().await;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);
        assert!((stats.hit_rate() - 50.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_concurrent_equal_keys_fetch_once() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Arc::new(CountingFetcher::new(20).with_delay(Duration::from_millis(100)));
        let cache = cache(dir.path(), fetcher.clone(), 100);

        // Separately built keys for the same layer, geometry and kernel
        let a = CacheKey::new("dem", geometry(), Interpolation::Bilinear);
        let b = CacheKey::new("dem", geometry(), Interpolation::Bilinear);

        let (first, second) = tokio::join!(
            cache.get(&a, "http://wcs/slow"),
            cache.get(&b, "http://wcs/slow")
        );

        assert_eq!(first.unwrap(), second.unwrap());
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_block_each_other() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Arc::new(CountingFetcher::new(20).with_delay(Duration::from_millis(500)));
        let cache = Arc::new(cache(dir.path(), fetcher.clone(), 100));

        let slow_key = CacheKey::new("slow", geometry(), Interpolation::Bilinear);
        let fast_key = CacheKey::new("fast", geometry(), Interpolation::Bilinear);

        let background = cache.clone();
        let slow = tokio::spawn(async move { background.get(&slow_key, "http://wcs/slow").await });
        tokio::time::sleep(Duration::from_millis(20)).await;

        let fast = tokio::time::timeout(
            Duration::from_millis(300),
            cache.get(&fast_key, "http://wcs/fast"),
        )
        .await;
        assert!(fast.is_ok(), "fast key waited on the slow load");
        assert!(fast.unwrap().is_ok());

        assert!(slow.await.unwrap().is_ok());
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn test_failure_is_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Arc::new(CountingFetcher::new(20).failing_first(1));
        let cache = cache(dir.path(), fetcher.clone(), 100);
        let key = CacheKey::new("dem", geometry(), Interpolation::Bilinear);

        let err = cache.get(&key, "http://wcs/dem").await.unwrap_err();
        assert_eq!(err.category(), geo_common::ErrorCategory::Access);
        assert!(cache.is_empty().await);

        assert!(cache.get(&key, "http://wcs/dem").await.is_ok());
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn test_fetched_file_is_padded() {
        let dir = tempfile::tempdir().unwrap();
        // Only the western half comes back
        let fetcher = Arc::new(CountingFetcher::new(10).with_extent((-75.0, 3.0, -74.0, 5.0)));
        let cache = cache(dir.path(), fetcher, 100);
        let key = CacheKey::new("dem", geometry(), Interpolation::Nearest);

        let path = cache.get(&key, "http://wcs/dem").await.unwrap();
        let coverage = read_geotiff(&path).unwrap();
        assert_eq!((coverage.width, coverage.height), (20, 20));
        assert_eq!(coverage.bands[0].data[0], 1.0);
        assert_eq!(coverage.bands[0].data[19], -9999.0);
    }

    // ========================================================================
    // Eviction
    // ========================================================================

    #[tokio::test]
    async fn test_eviction_deletes_file() {
        let dir = tempfile::tempdir().unwrap();
        // 400x400 f32 is a little over 600 KB, two of them exceed 1 MB
        let fetcher = Arc::new(CountingFetcher::new(400));
        let cache = cache(dir.path(), fetcher.clone(), 1);

        let first_key = CacheKey::new("first", geometry(), Interpolation::Nearest);
        let second_key = CacheKey::new("second", geometry(), Interpolation::Nearest);

        let first = cache.get(&first_key, "http://wcs/first").await.unwrap();
        let second = cache.get(&second_key, "http://wcs/second").await.unwrap();

        assert!(!first.exists());
        assert!(second.exists());
        let stats = cache.stats().await;
        assert_eq!(stats.evictions, 1);
        assert_eq!(stats.entries, 1);

        // Evicted keys are fetched again
        cache.get(&first_key, "http://wcs/first").await.unwrap();
        assert_eq!(fetcher.calls(), 3);
    }

    #[tokio::test]
    async fn test_drop_deletes_files() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Arc::new(CountingFetcher::new(20));
        let path = {
            let cache = cache(dir.path(), fetcher, 100);
            let key = CacheKey::new("dem", geometry(), Interpolation::Bilinear);
            cache.get(&key, "http://wcs/dem").await.unwrap()
        };
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_invalidate_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Arc::new(CountingFetcher::new(20));
        let cache = cache(dir.path(), fetcher, 100);

        let a = CacheKey::new("a", geometry(), Interpolation::Bilinear);
        let b = CacheKey::new("b", geometry(), Interpolation::Bilinear);
        let path_a = cache.get(&a, "http://wcs/a").await.unwrap();
        let path_b = cache.get(&b, "http://wcs/b").await.unwrap();

        cache.invalidate(&a).await;
        assert!(!path_a.exists());
        assert_eq!(cache.len().await, 1);

        cache.clear().await;
        assert!(!path_b.exists());
        assert_eq!(cache.stats().await.size_bytes, 0);
    }
}
