//! Shadow map pool.
//!
//! Shadow maps are square depth surfaces requested every time a light
//! renders; pooling them by size avoids reallocating the same depth
//! targets frame after frame.

use crate::frame::FrameIndex;
use crate::resource::{RenderResource, ResourceDesc};
use crate::types::{Extent2d, TextureDescriptor, TextureFormat, TextureUsage};

use super::FramePool;

fn descriptor(size: u32) -> TextureDescriptor {
    TextureDescriptor::new(
        Extent2d::new(size, size),
        TextureFormat::Depth32Float,
        TextureUsage::TEXTURE_BINDING | TextureUsage::RENDER_ATTACHMENT,
    )
    .with_label("pooled shadow map")
}

/// A shadow map checked out of the pool. Returned by value, once.
#[derive(Debug)]
pub struct PooledShadowMap {
    pub(crate) size: u32,
    pub(crate) resource: RenderResource,
}

impl PooledShadowMap {
    /// The underlying depth resource.
    pub fn resource(&self) -> &RenderResource {
        &self.resource
    }

    /// Edge length in pixels.
    pub fn size(&self) -> u32 {
        self.size
    }
}

/// Pool of square `Depth32Float` shadow maps, keyed by edge length.
pub struct ShadowMapPool {
    pool: FramePool<u32>,
}

impl ShadowMapPool {
    pub(crate) fn new(live_frames: u64) -> Self {
        Self {
            pool: FramePool::new(live_frames),
        }
    }

    /// Reuse or create a shadow map. `None` for zero sizes.
    pub(crate) fn request(&mut self, size: u32) -> Option<(u32, RenderResource)> {
        if size == 0 {
            return None;
        }
        let resource = self
            .pool
            .checkout(size)
            .unwrap_or_else(|| RenderResource::new(ResourceDesc::Texture(descriptor(size))));
        Some((size, resource))
    }

    pub(crate) fn give_back(&mut self, size: u32, resource: RenderResource, now: FrameIndex) {
        self.pool.give_back(size, resource, now);
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

    /// Shadow maps currently sitting free in the pool.
    pub fn free_count(&self) -> usize {
        self.pool.free_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_format_and_square_extent() {
        let mut pool = ShadowMapPool::new(10);
        let (_, resource) = pool.request(2048).unwrap();
        match resource.desc() {
            ResourceDesc::Texture(desc) => {
                assert_eq!(desc.format, TextureFormat::Depth32Float);
                assert_eq!(desc.size, Extent2d::new(2048, 2048));
            }
            other => panic!("unexpected descriptor {other:?}"),
        }
    }

    #[test]
    fn test_sizes_pool_independently() {
        let mut pool = ShadowMapPool::new(10);
        let (key, small) = pool.request(512).unwrap();
        pool.give_back(key, small.clone(), 0);
        let (_, large) = pool.request(1024).unwrap();
        assert_ne!(small.id(), large.id());
        let (_, reused) = pool.request(512).unwrap();
        assert_eq!(small.id(), reused.id());
    }

    #[test]
    fn test_zero_size_rejected() {
        let mut pool = ShadowMapPool::new(10);
        assert!(pool.request(0).is_none());
    }
}
