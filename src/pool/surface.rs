//! Render surface pool.

use crate::frame::FrameIndex;
use crate::resource::{RenderResource, ResourceDesc};
use crate::types::{Extent2d, TextureDescriptor, TextureFormat, TextureUsage};

use super::FramePool;

/// Normalized shape of a pooled render surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceKey {
    /// Pixel format.
    pub format: TextureFormat,
    /// Surface size.
    pub extent: Extent2d,
    /// Usage flags, including the pool-forced defaults.
    pub usage: TextureUsage,
}

impl SurfaceKey {
    /// Build a key from a request, forcing the usage every pooled
    /// surface needs: sampleable, and attachable as color or depth.
    pub(crate) fn new(format: TextureFormat, extent: Extent2d) -> Self {
        Self {
            format,
            extent,
            usage: TextureUsage::TEXTURE_BINDING | TextureUsage::RENDER_ATTACHMENT,
        }
    }

    fn descriptor(&self) -> TextureDescriptor {
        TextureDescriptor::new(self.extent, self.format, self.usage).with_label("pooled surface")
    }
}

/// A surface checked out of the pool.
///
/// Handing it back consumes the value, so an entry cannot be returned
/// twice or used after return.
#[derive(Debug)]
pub struct PooledSurface {
    pub(crate) key: SurfaceKey,
    pub(crate) resource: RenderResource,
}

impl PooledSurface {
    /// The underlying resource.
    pub fn resource(&self) -> &RenderResource {
        &self.resource
    }

    /// The key this surface is pooled under.
    pub fn key(&self) -> SurfaceKey {
        self.key
    }
}

/// Pool of reusable render surfaces, keyed by format and extent.
pub struct SurfacePool {
    pool: FramePool<SurfaceKey>,
}

impl SurfacePool {
    pub(crate) fn new(live_frames: u64) -> Self {
        Self {
            pool: FramePool::new(live_frames),
        }
    }

    /// Reuse or create a surface. `None` for zero-sized extents.
    pub(crate) fn request(
        &mut self,
        format: TextureFormat,
        extent: Extent2d,
    ) -> Option<(SurfaceKey, RenderResource)> {
        if extent.is_empty() {
            return None;
        }
        let key = SurfaceKey::new(format, extent);
        let resource = self
            .pool
            .checkout(key)
            .unwrap_or_else(|| RenderResource::new(ResourceDesc::Texture(key.descriptor())));
        Some((key, resource))
    }

    /// Like [`request`](Self::request), but the surface returns itself
    /// at the frame-boundary sweep.
    pub(crate) fn request_transient(
        &mut self,
        format: TextureFormat,
        extent: Extent2d,
    ) -> Option<RenderResource> {
        let (key, resource) = self.request(format, extent)?;
        self.pool.note_transient(key, resource.clone());
        Some(resource)
    }

    pub(crate) fn give_back(&mut self, key: SurfaceKey, resource: RenderResource, now: FrameIndex) {
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

    /// Surfaces currently sitting free in the pool.
    pub fn free_count(&self) -> usize {
        self.pool.free_count()
    }
}
