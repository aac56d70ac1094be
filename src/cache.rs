//! Advisory render cache
//!
//! Rendering is a pure function of its inputs, so a render can be reused
//! whenever every input is unchanged. Storage is a bounded moka cache; an
//! evicted or rejected entry only costs a re-render.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use image::DynamicImage;
use log::debug;
use moka::notification::RemovalCause;

use crate::error::Result;

/// Fingerprint of every input of one render
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderKey(u64);

impl RenderKey {
    pub fn builder() -> RenderKeyBuilder {
        RenderKeyBuilder {
            hasher: DefaultHasher::new(),
        }
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

/// Feeds inputs, in a fixed order, into a [`RenderKey`]
pub struct RenderKeyBuilder {
    hasher: DefaultHasher,
}

impl RenderKeyBuilder {
    pub fn field<T: Hash + ?Sized>(mut self, value: &T) -> Self {
        value.hash(&mut self.hasher);
        self
    }

    pub fn float(mut self, value: f32) -> Self {
        value.to_bits().hash(&mut self.hasher);
        self
    }

    /// Raw bytes, length-prefixed so adjacent fields cannot run together
    pub fn bytes(mut self, bytes: &[u8]) -> Self {
        bytes.len().hash(&mut self.hasher);
        self.hasher.write(bytes);
        self
    }

    /// Decoded pixels plus their layout
    pub fn image(mut self, image: &DynamicImage) -> Self {
        (image.width(), image.height()).hash(&mut self.hasher);
        format!("{:?}", image.color()).hash(&mut self.hasher);
        self.bytes(image.as_bytes())
    }

    pub fn finish(self) -> RenderKey {
        RenderKey(self.hasher.finish())
    }
}

/// Bounded map from render inputs to output bytes
pub struct RenderCache {
    /// `None` when caching is disabled
    cache: Option<moka::sync::Cache<RenderKey, Arc<Vec<u8>>>>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: Arc<AtomicU64>,
}

impl Default for RenderCache {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

impl RenderCache {
    pub const DEFAULT_CAPACITY: u64 = 16;

    /// A capacity of zero disables caching
    pub fn new(capacity: u64) -> Self {
        let evictions = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&evictions);

        let cache = (capacity > 0).then(|| {
            moka::sync::Cache::<RenderKey, Arc<Vec<u8>>>::builder()
                .max_capacity(capacity)
                .eviction_listener(move |key: Arc<RenderKey>, _bytes, cause| {
                    if matches!(cause, RemovalCause::Size) {
                        counter.fetch_add(1, Ordering::Relaxed);
                        debug!("Render cache evicted {:016x}", key.0);
                    }
                })
                .build()
        });

        Self {
            cache,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions,
        }
    }

    /// Cached bytes for `key`, rendering and storing them on a miss
    ///
    /// A failed render is returned as-is and nothing is stored.
    pub fn get_or_render<F>(&self, key: RenderKey, render: F) -> Result<Arc<Vec<u8>>>
    where
        F: FnOnce() -> Result<Vec<u8>>,
    {
        if let Some(bytes) = self.cache.as_ref().and_then(|cache| cache.get(&key)) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!("Render cache hit {:016x}", key.0);
            return Ok(bytes);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let bytes = Arc::new(render()?);
        if let Some(cache) = &self.cache {
            cache.insert(key, Arc::clone(&bytes));
        }
        Ok(bytes)
    }

    pub fn contains(&self, key: RenderKey) -> bool {
        self.cache
            .as_ref()
            .map(|cache| cache.contains_key(&key))
            .unwrap_or(false)
    }

    /// Entry count after pending evictions have been applied
    pub fn len(&self) -> usize {
        match &self.cache {
            Some(cache) => {
                cache.run_pending_tasks();
                cache.entry_count() as usize
            }
            None => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Some(cache) = &self.cache {
            cache.invalidate_all();
            cache.run_pending_tasks();
        }
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Entries dropped to stay within capacity
    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }
}
