//! Buffer pool.

use crate::frame::FrameIndex;
use crate::resource::{RenderResource, ResourceDesc};
use crate::types::{BufferDescriptor, BufferUsage};

use super::FramePool;

/// Smallest pooled buffer size; requests below it round up.
const MIN_POOLED_BUFFER_SIZE: u64 = 16;

/// Normalized shape of a pooled buffer.
///
/// Sizes round up to the next power of two so near-miss requests share
/// free lists, and every pooled buffer is forced to be a copy
/// destination so callers can upload into it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferKey {
    /// Rounded size in bytes.
    pub size: u64,
    /// Usage flags, including the pool-forced defaults.
    pub usage: BufferUsage,
}

impl BufferKey {
    pub(crate) fn new(size: u64, usage: BufferUsage) -> Self {
        Self {
            size: size.max(MIN_POOLED_BUFFER_SIZE).next_power_of_two(),
            usage: usage | BufferUsage::COPY_DST,
        }
    }

    fn descriptor(&self) -> BufferDescriptor {
        BufferDescriptor::new(self.size, self.usage).with_label("pooled buffer")
    }
}

/// A buffer checked out of the pool. Returned by value, once.
#[derive(Debug)]
pub struct PooledBuffer {
    pub(crate) key: BufferKey,
    pub(crate) resource: RenderResource,
}

impl PooledBuffer {
    /// The underlying resource.
    pub fn resource(&self) -> &RenderResource {
        &self.resource
    }

    /// The key this buffer is pooled under. `key().size` is the rounded
    /// capacity, which may exceed the requested size.
    pub fn key(&self) -> BufferKey {
        self.key
    }
}

/// Pool of reusable buffers, keyed by rounded size and usage.
pub struct BufferPool {
    pool: FramePool<BufferKey>,
}

impl BufferPool {
    pub(crate) fn new(live_frames: u64) -> Self {
        Self {
            pool: FramePool::new(live_frames),
        }
    }

    /// Reuse or create a buffer. `None` for zero-sized requests.
    pub(crate) fn request(
        &mut self,
        size: u64,
        usage: BufferUsage,
    ) -> Option<(BufferKey, RenderResource)> {
        if size == 0 {
            return None;
        }
        let key = BufferKey::new(size, usage);
        let resource = self.pool.checkout(key).unwrap_or_else(|| {
            RenderResource::new(ResourceDesc::Buffer {
                descriptor: key.descriptor(),
                initial_data: None,
            })
        });
        Some((key, resource))
    }

    /// Like [`request`](Self::request), but the buffer returns itself at
    /// the frame-boundary sweep.
    pub(crate) fn request_transient(
        &mut self,
        size: u64,
        usage: BufferUsage,
    ) -> Option<RenderResource> {
        let (key, resource) = self.request(size, usage)?;
        self.pool.note_transient(key, resource.clone());
        Some(resource)
    }

    pub(crate) fn give_back(&mut self, key: BufferKey, resource: RenderResource, now: FrameIndex) {
        self.pool.give_back(key, resource, now);
    }

    pub(crate) fn flush_transient(&mut self, now: FrameIndex) {
        self.pool.flush_transient(now);
    }

    pub(crate) fn sweep(&mut self, now: FrameIndex) -> Vec<RenderResource> {
        self.pool.sweep(now)
    }

    pub(crate) fn release_all(&mut self) -> Vec<RenderResource> {
        self.pool.release_all()
    }

    /// Buffers currently sitting free in the pool.
    pub fn free_count(&self) -> usize {
        self.pool.free_count()
    }
}
