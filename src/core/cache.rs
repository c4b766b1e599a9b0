//! Decoded array-sample cache.
//!
//! Shared by every property handle of one read archive. Entries are keyed
//! by the layer and file position of the stored block, so repeated samples
//! (which reuse one block) hit the same entry.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use super::Sample;

/// Where a sample block lives.
#[derive(Clone, Copy, Hash, Eq, PartialEq, Debug)]
pub struct SampleBlockKey {
    pub layer: u32,
    pub pos: u64,
}

impl SampleBlockKey {
    pub fn new(layer: u32, pos: u64) -> Self {
        Self { layer, pos }
    }
}

struct CachedSample {
    sample: Arc<Sample>,
    size: usize,
}

/// Byte-bounded cache of decoded samples.
///
/// Uses `parking_lot::RwLock` for the map and an atomic for the running
/// size. When full, roughly half of the entries are evicted.
pub struct SampleCache {
    cache: RwLock<HashMap<SampleBlockKey, CachedSample>>,
    max_size: usize,
    current_size: AtomicUsize,
}

impl SampleCache {
    /// Cache holding at most `max_size` bytes; 0 disables it.
    pub fn new(max_size: usize) -> Self {
        Self {
            cache: RwLock::new(HashMap::new()),
            max_size,
            current_size: AtomicUsize::new(0),
        }
    }

    /// 64 MB.
    pub fn default_size() -> Self {
        Self::new(64 * 1024 * 1024)
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.max_size > 0
    }

    /// Cached sample for `key`.
    #[inline]
    pub fn get(&self, key: &SampleBlockKey) -> Option<Arc<Sample>> {
        self.cache.read().get(key).map(|s| Arc::clone(&s.sample))
    }

    /// Insert a decoded sample whose payload was `size` bytes.
    pub fn insert(&self, key: SampleBlockKey, sample: Arc<Sample>, size: usize) {
        if size > self.max_size {
            return;
        }
        if self.current_size.load(Ordering::Relaxed) + size > self.max_size {
            self.evict_some();
        }

        let mut cache = self.cache.write();
        if cache.contains_key(&key) {
            return;
        }
        cache.insert(key, CachedSample { sample, size });
        self.current_size.fetch_add(size, Ordering::Relaxed);
    }

    fn evict_some(&self) {
        let mut cache = self.cache.write();
        let victims: Vec<_> = cache.keys().take(cache.len().div_ceil(2)).copied().collect();
        let mut evicted = 0;
        for key in victims {
            if let Some(s) = cache.remove(&key) {
                evicted += s.size;
            }
        }
        let _ = self
            .current_size
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |x| Some(x.saturating_sub(evicted)));
    }

    /// Remove everything.
    pub fn clear(&self) {
        self.cache.write().clear();
        self.current_size.store(0, Ordering::Relaxed);
    }

    /// Number of cached samples.
    #[inline]
    pub fn len(&self) -> usize {
        self.cache.read().len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current payload bytes held.
    #[inline]
    pub fn size(&self) -> usize {
        self.current_size.load(Ordering::Relaxed)
    }

    /// Byte budget.
    #[inline]
    pub fn max_size(&self) -> usize {
        self.max_size
    }
}

impl Default for SampleCache {
    fn default() -> Self {
        Self::default_size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(n: usize) -> Arc<Sample> {
        Arc::new(Sample::from_elements(&vec![0u8; n]).unwrap())
    }

    #[test]
    fn test_cache_insert_get() {
        let cache = SampleCache::new(1024);
        let key = SampleBlockKey::new(0, 100);
        cache.insert(key, sample(5), 5);
        assert_eq!(cache.get(&key).unwrap().num_elements(), 5);
        assert!(cache.get(&SampleBlockKey::new(1, 100)).is_none());
        assert_eq!(cache.size(), 5);
    }

    #[test]
    fn test_cache_clear() {
        let cache = SampleCache::new(1024);
        cache.insert(SampleBlockKey::new(0, 1), sample(3), 3);
        assert!(!cache.is_empty());
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.size(), 0);
    }

    #[test]
    fn test_cache_eviction() {
        let cache = SampleCache::new(50);
        for i in 0..10u64 {
            cache.insert(SampleBlockKey::new(0, i * 100), sample(10), 10);
        }
        assert!(cache.size() <= 50);
        assert!(cache.len() <= 5);
    }

    #[test]
    fn test_disabled_and_oversized() {
        let off = SampleCache::new(0);
        assert!(!off.is_enabled());
        off.insert(SampleBlockKey::new(0, 0), sample(1), 1);
        assert!(off.is_empty());

        let small = SampleCache::new(100);
        small.insert(SampleBlockKey::new(0, 0), sample(200), 200);
        assert!(small.is_empty());
    }
}
