//! Frame-indexed resource pools.
//!
//! Pools cache retired GPU resources so a request for an equivalent
//! resource a few frames later reuses the cached object instead of
//! allocating. Entries are keyed by normalized shape (size, format,
//! usage), reused LIFO within a key, and evicted once they sit unused
//! for longer than the pool's live threshold — by default
//! [`DEFAULT_RESOURCE_LIVE_FRAMES`] (three seconds at 60 fps).
//!
//! Checked-out entries travel in consuming wrapper types
//! ([`PooledSurface`](crate::pool::PooledSurface) and friends); handing
//! one back takes the wrapper by value, so a second return of the same
//! checkout is not expressible. Transient requests skip the wrapper and
//! are returned automatically at the end-of-frame sweep.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

use crate::frame::FrameIndex;
use crate::resource::RenderResource;

mod buffer;
mod shadow;
mod surface;

pub use buffer::{BufferKey, BufferPool, PooledBuffer};
pub use shadow::{PooledShadowMap, ShadowMapPool};
pub use surface::{PooledSurface, SurfaceKey, SurfacePool};

/// Default idle-frame threshold before a pooled resource is destroyed.
pub const DEFAULT_RESOURCE_LIVE_FRAMES: u64 = 60 * 3;

struct PoolEntry {
    last_used_frame: FrameIndex,
    resource: RenderResource,
}

/// Keyed free lists with LIFO reuse and idle eviction. The typed pools
/// below wrap this with their key normalization and descriptors.
pub(crate) struct FramePool<K> {
    free: HashMap<K, Vec<PoolEntry>>,
    transient: Vec<(K, RenderResource)>,
    live_frames: u64,
}

impl<K: Eq + Hash + Copy + fmt::Debug> FramePool<K> {
    pub(crate) fn new(live_frames: u64) -> Self {
        Self {
            free: HashMap::new(),
            transient: Vec::new(),
            live_frames,
        }
    }

    /// Pop the most recently returned entry for `key`, if any.
    pub(crate) fn checkout(&mut self, key: K) -> Option<RenderResource> {
        let list = self.free.get_mut(&key)?;
        let entry = list.pop();
        if list.is_empty() {
            self.free.remove(&key);
        }
        entry.map(|e| {
            log::trace!("pool reuse for {key:?}");
            e.resource
        })
    }

    /// Return an entry to its free list, stamped with `now`.
    pub(crate) fn give_back(&mut self, key: K, resource: RenderResource, now: FrameIndex) {
        self.free.entry(key).or_default().push(PoolEntry {
            last_used_frame: now,
            resource,
        });
    }

    /// Record a checked-out resource for automatic return at the frame
    /// boundary.
    pub(crate) fn note_transient(&mut self, key: K, resource: RenderResource) {
        self.transient.push((key, resource));
    }

    /// Move transient checkouts back to the free lists.
    pub(crate) fn flush_transient(&mut self, now: FrameIndex) {
        let transient = std::mem::take(&mut self.transient);
        for (key, resource) in transient {
            self.give_back(key, resource, now);
        }
    }

    /// Remove entries idle for at least `live_frames`, returning them
    /// for destruction.
    pub(crate) fn sweep(&mut self, now: FrameIndex) -> Vec<RenderResource> {
        let live_frames = self.live_frames;
        let mut evicted = Vec::new();
        self.free.retain(|key, list| {
            list.retain(|entry| {
                if now.saturating_sub(entry.last_used_frame) >= live_frames {
                    log::debug!("evicting pooled resource {:?} for {key:?}", entry.resource.id());
                    evicted.push(entry.resource.clone());
                    false
                } else {
                    true
                }
            });
            !list.is_empty()
        });
        evicted
    }

    /// Empty every free list, returning everything for destruction.
    /// Transient checkouts are flushed in too.
    pub(crate) fn release_all(&mut self) -> Vec<RenderResource> {
        let mut released: Vec<RenderResource> = self
            .transient
            .drain(..)
            .map(|(_, resource)| resource)
            .collect();
        for (_, mut list) in self.free.drain() {
            released.extend(list.drain(..).map(|entry| entry.resource));
        }
        released
    }

    /// Number of entries currently sitting free.
    pub(crate) fn free_count(&self) -> usize {
        self.free.values().map(Vec::len).sum()
    }
}
