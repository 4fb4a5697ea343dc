//! The render context.
//!
//! [`RenderContext`] ties the pieces together: the backend, the frame
//! clock, the task queue, the pools and the deferred destroyer. There is
//! no global instance; everything that needs the context receives an
//! `Arc<RenderContext>` explicitly.
//!
//! The render thread runs [`run_frame`](RenderContext::run_frame) in a
//! loop; each call executes one frame in a fixed order:
//!
//! ```text
//! drain task queue -> render -> advance frame clock
//!                  -> sweep pools -> rotate destruction epochs
//! ```

use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::backend::RhiBackend;
use crate::destroy::{DeferredDestroy, FenceEpochDestroy, FrameCountdownDestroy};
use crate::frame::{FrameClock, FrameIndex};
use crate::pool::{
    BufferPool, PooledBuffer, PooledShadowMap, PooledSurface, ShadowMapPool, SurfacePool,
    DEFAULT_RESOURCE_LIVE_FRAMES,
};
use crate::resource::RenderResource;
use crate::tasks::{Priority, RenderTaskQueue, TaskHandle};
use crate::types::{BufferUsage, Extent2d, TextureFormat};

/// How retired GPU objects are scheduled for physical destruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DestroyPolicy {
    /// Fence-epoch when the backend supports fence polling, otherwise
    /// frame-countdown with the default wait.
    #[default]
    Auto,
    /// Always fence-epoch.
    FenceEpoch,
    /// Always frame-countdown, freeing after `wait_frames` frames.
    FrameCountdown {
        /// Frames to wait before freeing.
        wait_frames: u64,
    },
}

/// Construction-time configuration for a [`RenderContext`].
#[derive(Debug, Clone)]
pub struct ContextConfig {
    /// Idle frames before a pooled surface is destroyed.
    pub surface_live_frames: u64,
    /// Idle frames before a pooled buffer is destroyed.
    pub buffer_live_frames: u64,
    /// Idle frames before a pooled shadow map is destroyed.
    pub shadow_map_live_frames: u64,
    /// Deferred destruction strategy.
    pub destroy_policy: DestroyPolicy,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            surface_live_frames: DEFAULT_RESOURCE_LIVE_FRAMES,
            buffer_live_frames: DEFAULT_RESOURCE_LIVE_FRAMES,
            shadow_map_live_frames: DEFAULT_RESOURCE_LIVE_FRAMES,
            destroy_policy: DestroyPolicy::default(),
        }
    }
}

fn make_destroyer(
    backend: &Arc<dyn RhiBackend>,
    policy: DestroyPolicy,
) -> Box<dyn DeferredDestroy> {
    match policy {
        DestroyPolicy::FenceEpoch => Box::new(FenceEpochDestroy::new(Arc::clone(backend))),
        DestroyPolicy::FrameCountdown { wait_frames } => Box::new(
            FrameCountdownDestroy::with_wait(Arc::clone(backend), wait_frames),
        ),
        DestroyPolicy::Auto => {
            if backend.supports_fence_polling() {
                Box::new(FenceEpochDestroy::new(Arc::clone(backend)))
            } else {
                Box::new(FrameCountdownDestroy::new(Arc::clone(backend)))
            }
        }
    }
}

/// Owner of the GPU resource lifecycle.
pub struct RenderContext {
    /// Back-reference for task closures that need the context later.
    weak: Weak<RenderContext>,
    backend: Arc<dyn RhiBackend>,
    clock: FrameClock,
    tasks: RenderTaskQueue,
    destroyer: Mutex<Box<dyn DeferredDestroy>>,
    surfaces: Mutex<SurfacePool>,
    buffers: Mutex<BufferPool>,
    shadow_maps: Mutex<ShadowMapPool>,
}

impl RenderContext {
    /// Create a context with the default configuration.
    pub fn new(backend: Arc<dyn RhiBackend>) -> Arc<Self> {
        Self::with_config(backend, ContextConfig::default())
    }

    /// Create a context with an explicit configuration.
    pub fn with_config(backend: Arc<dyn RhiBackend>, config: ContextConfig) -> Arc<Self> {
        log::info!(
            "render context on backend '{}' (destroy policy {:?})",
            backend.name(),
            config.destroy_policy
        );
        let destroyer = make_destroyer(&backend, config.destroy_policy);
        Arc::new_cyclic(|weak| Self {
            weak: weak.clone(),
            backend,
            clock: FrameClock::new(),
            tasks: RenderTaskQueue::new(),
            destroyer: Mutex::new(destroyer),
            surfaces: Mutex::new(SurfacePool::new(config.surface_live_frames)),
            buffers: Mutex::new(BufferPool::new(config.buffer_live_frames)),
            shadow_maps: Mutex::new(ShadowMapPool::new(config.shadow_map_live_frames)),
        })
    }

    /// The backend this context drives.
    pub fn backend(&self) -> &Arc<dyn RhiBackend> {
        &self.backend
    }

    /// The current frame index.
    pub fn frame(&self) -> FrameIndex {
        self.clock.current()
    }

    /// Register the calling thread as the render thread.
    ///
    /// [`RenderThread`](crate::RenderThread) does this automatically;
    /// headless setups and tests that drive [`run_frame`](Self::run_frame)
    /// manually call it once before the first frame.
    pub fn attach_render_thread(&self) {
        self.tasks.attach();
    }

    /// Unregister the render thread. Pending `wait_all` calls panic
    /// rather than block forever.
    pub fn detach_render_thread(&self) {
        self.tasks.detach();
    }

    /// Whether the calling thread is the registered render thread.
    pub fn is_render_thread(&self) -> bool {
        self.tasks.is_render_thread()
    }

    pub(crate) fn tasks(&self) -> &RenderTaskQueue {
        &self.tasks
    }

    // ------------------------------------------------------------------
    // Task submission
    // ------------------------------------------------------------------

    /// Submit a closure for execution on the render thread at
    /// [`Priority::Middle`].
    pub fn submit(&self, f: impl FnOnce() + Send + 'static) -> TaskHandle {
        self.tasks.submit(Priority::Middle, &[], f)
    }

    /// Submit with an explicit priority and dependencies.
    pub fn submit_with(
        &self,
        priority: Priority,
        after: &[TaskHandle],
        f: impl FnOnce() + Send + 'static,
    ) -> TaskHandle {
        self.tasks.submit(priority, after, f)
    }

    /// Block until every task submitted before this call has executed.
    pub fn wait_all(&self) {
        self.tasks.wait_all();
    }

    /// Tasks submitted but not yet executed.
    pub fn pending_tasks(&self) -> u64 {
        self.tasks.pending()
    }

    // ------------------------------------------------------------------
    // Resource lifecycle
    // ------------------------------------------------------------------

    /// Ensure `resource` has a backend object.
    ///
    /// Idempotent: only the first caller schedules creation. With
    /// `wait`, blocks until the creation task has run; without it the
    /// resource may still be `Creating` on return.
    pub fn init_resource(&self, resource: &RenderResource, wait: bool) {
        if resource.try_begin_create() {
            let res = resource.clone();
            let backend = Arc::clone(&self.backend);
            self.submit(move || res.create_now(backend.as_ref()));
        }
        if wait {
            self.wait_all();
        }
    }

    /// Request destruction of `resource`'s backend object.
    ///
    /// Routed through the task queue; the object's reference is released
    /// on the render thread and the physical free happens later, once
    /// the GPU is done with it.
    pub fn rhi_destroy(&self, resource: &RenderResource) {
        let Some(ctx) = self.weak.upgrade() else {
            return;
        };
        let res = resource.clone();
        self.submit(move || {
            if let Some(object) = res.destroy_now() {
                let frame = ctx.clock.current();
                ctx.destroyer.lock().enqueue(object, frame);
            }
        });
    }

    /// Add a reference to `resource`'s backend object, keeping it alive
    /// past [`rhi_destroy`](Self::rhi_destroy).
    pub fn add_reference(&self, resource: &RenderResource) {
        let res = resource.clone();
        self.submit(move || res.add_reference_now());
    }

    /// Release a reference taken with [`add_reference`](Self::add_reference).
    pub fn release_reference(&self, resource: &RenderResource) {
        let Some(ctx) = self.weak.upgrade() else {
            return;
        };
        let res = resource.clone();
        self.submit(move || {
            if let Some(object) = res.release_now() {
                let frame = ctx.clock.current();
                ctx.destroyer.lock().enqueue(object, frame);
            }
        });
    }

    /// Objects waiting in the deferred destruction queue.
    pub fn pending_destroys(&self) -> usize {
        self.destroyer.lock().pending()
    }

    // ------------------------------------------------------------------
    // Pools
    // ------------------------------------------------------------------

    /// Check a surface out of the pool, creating one on a miss.
    /// `None` for zero-sized extents.
    pub fn request_surface(
        &self,
        format: TextureFormat,
        extent: Extent2d,
    ) -> Option<PooledSurface> {
        let (key, resource) = self.surfaces.lock().request(format, extent)?;
        self.init_resource(&resource, false);
        Some(PooledSurface { key, resource })
    }

    /// Check a surface out for this frame only; it returns to the pool
    /// automatically at the frame boundary.
    pub fn request_transient_surface(
        &self,
        format: TextureFormat,
        extent: Extent2d,
    ) -> Option<RenderResource> {
        let resource = self.surfaces.lock().request_transient(format, extent)?;
        self.init_resource(&resource, false);
        Some(resource)
    }

    /// Hand a surface back to the pool. Consumes the checkout.
    pub fn return_surface(&self, surface: PooledSurface) {
        self.surfaces
            .lock()
            .give_back(surface.key, surface.resource, self.clock.current());
    }

    /// Check a buffer out of the pool, creating one on a miss.
    /// `None` for zero-sized requests.
    pub fn request_buffer(
        &self,
        size: u64,
        usage: BufferUsage,
    ) -> Option<PooledBuffer> {
        let (key, resource) = self.buffers.lock().request(size, usage)?;
        self.init_resource(&resource, false);
        Some(PooledBuffer { key, resource })
    }

    /// Check a buffer out for this frame only.
    pub fn request_transient_buffer(
        &self,
        size: u64,
        usage: BufferUsage,
    ) -> Option<RenderResource> {
        let resource = self.buffers.lock().request_transient(size, usage)?;
        self.init_resource(&resource, false);
        Some(resource)
    }

    /// Hand a buffer back to the pool. Consumes the checkout.
    pub fn return_buffer(&self, buffer: PooledBuffer) {
        self.buffers
            .lock()
            .give_back(buffer.key, buffer.resource, self.clock.current());
    }

    /// Check a shadow map out of the pool, creating one on a miss.
    /// `None` for zero sizes.
    pub fn request_shadow_map(&self, size: u32) -> Option<PooledShadowMap> {
        let (size, resource) = self.shadow_maps.lock().request(size)?;
        self.init_resource(&resource, false);
        Some(PooledShadowMap { size, resource })
    }

    /// Hand a shadow map back to the pool. Consumes the checkout.
    pub fn return_shadow_map(&self, shadow_map: PooledShadowMap) {
        self.shadow_maps.lock().give_back(
            shadow_map.size,
            shadow_map.resource,
            self.clock.current(),
        );
    }

    /// Surfaces sitting free in the pool.
    pub fn free_surfaces(&self) -> usize {
        self.surfaces.lock().free_count()
    }

    /// Buffers sitting free in the pool.
    pub fn free_buffers(&self) -> usize {
        self.buffers.lock().free_count()
    }

    /// Shadow maps sitting free in the pool.
    pub fn free_shadow_maps(&self) -> usize {
        self.shadow_maps.lock().free_count()
    }

    // ------------------------------------------------------------------
    // Frame loop
    // ------------------------------------------------------------------

    /// Execute one frame. Render thread only.
    pub fn run_frame(&self, render: impl FnOnce()) {
        debug_assert!(
            self.is_render_thread(),
            "run_frame called off the render thread"
        );
        self.tasks.drain();
        render();
        let frame = self.clock.advance();
        self.sweep_pools(frame);
        self.destroyer.lock().update(frame);
    }

    /// Flush transient checkouts back to their pools and destroy entries
    /// past their live threshold.
    fn sweep_pools(&self, now: FrameIndex) {
        let mut evicted = Vec::new();
        {
            let mut surfaces = self.surfaces.lock();
            surfaces.flush_transient(now);
            evicted.append(&mut surfaces.sweep(now));
        }
        {
            let mut buffers = self.buffers.lock();
            buffers.flush_transient(now);
            evicted.append(&mut buffers.sweep(now));
        }
        {
            let mut shadow_maps = self.shadow_maps.lock();
            shadow_maps.flush_transient(now);
            evicted.append(&mut shadow_maps.sweep(now));
        }
        // Pool locks are released before destruction; on the render
        // thread rhi_destroy executes inline.
        for resource in evicted {
            self.rhi_destroy(&resource);
        }
    }

    /// Empty every pool and free everything the destroyer holds.
    /// Render thread only; part of orderly shutdown, when the GPU is
    /// known to be idle.
    pub fn shutdown_render_resources(&self) {
        debug_assert!(
            self.is_render_thread(),
            "shutdown_render_resources called off the render thread"
        );
        self.tasks.drain();
        let mut released = self.surfaces.lock().release_all();
        released.append(&mut self.buffers.lock().release_all());
        released.append(&mut self.shadow_maps.lock().release_all());
        for resource in released {
            self.rhi_destroy(&resource);
        }
        self.tasks.drain();
        self.destroyer.lock().flush_all();
    }
}

impl std::fmt::Debug for RenderContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderContext")
            .field("backend", &self.backend.name())
            .field("frame", &self.frame())
            .field("pending_tasks", &self.pending_tasks())
            .field("pending_destroys", &self.pending_destroys())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::NullBackend;

    fn context() -> (Arc<NullBackend>, Arc<RenderContext>) {
        let backend = Arc::new(NullBackend::new());
        let ctx = RenderContext::new(backend.clone());
        ctx.attach_render_thread();
        (backend, ctx)
    }

    #[test]
    fn test_run_frame_advances_clock() {
        let (_, ctx) = context();
        assert_eq!(ctx.frame(), 0);
        ctx.run_frame(|| {});
        ctx.run_frame(|| {});
        assert_eq!(ctx.frame(), 2);
        ctx.detach_render_thread();
    }

    #[test]
    fn test_request_creates_then_reuses() {
        let (backend, ctx) = context();
        let surface = ctx
            .request_surface(TextureFormat::Rgba8Unorm, Extent2d::new(64, 64))
            .unwrap();
        assert_eq!(backend.textures_created(), 1);
        let id = surface.resource().id();
        ctx.return_surface(surface);

        let again = ctx
            .request_surface(TextureFormat::Rgba8Unorm, Extent2d::new(64, 64))
            .unwrap();
        assert_eq!(again.resource().id(), id);
        assert_eq!(backend.textures_created(), 1);
        ctx.detach_render_thread();
    }

    #[test]
    fn test_eviction_destroys_idle_surfaces() {
        let backend = Arc::new(NullBackend::new());
        let ctx = RenderContext::with_config(
            backend.clone(),
            ContextConfig {
                surface_live_frames: 4,
                ..ContextConfig::default()
            },
        );
        ctx.attach_render_thread();

        let surface = ctx
            .request_surface(TextureFormat::Rgba8Unorm, Extent2d::new(32, 32))
            .unwrap();
        ctx.return_surface(surface);
        assert_eq!(ctx.free_surfaces(), 1);

        for _ in 0..3 {
            ctx.run_frame(|| {});
        }
        assert_eq!(ctx.free_surfaces(), 1);
        ctx.run_frame(|| {});
        assert_eq!(ctx.free_surfaces(), 0);

        // The null backend's fence completes immediately, so the same
        // frame's epoch rotation already freed the object.
        assert_eq!(backend.live_objects(), 0);
        ctx.detach_render_thread();
    }

    #[test]
    fn test_transient_buffer_returns_at_frame_boundary() {
        let (backend, ctx) = context();
        let transient = ctx
            .request_transient_buffer(256, BufferUsage::STORAGE)
            .unwrap();
        assert_eq!(ctx.free_buffers(), 0);
        ctx.run_frame(|| {});
        assert_eq!(ctx.free_buffers(), 1);

        // Next frame's request reuses it.
        let again = ctx.request_buffer(256, BufferUsage::STORAGE).unwrap();
        assert_eq!(again.resource().id(), transient.id());
        assert_eq!(backend.buffers_created(), 1);
        ctx.detach_render_thread();
    }

    #[test]
    fn test_shutdown_releases_everything() {
        let (backend, ctx) = context();
        let surface = ctx
            .request_surface(TextureFormat::Rgba8Unorm, Extent2d::new(64, 64))
            .unwrap();
        ctx.return_surface(surface);
        let _transient = ctx.request_transient_buffer(64, BufferUsage::UNIFORM);
        if let Some(map) = ctx.request_shadow_map(512) {
            ctx.return_shadow_map(map);
        }

        ctx.shutdown_render_resources();
        assert_eq!(ctx.free_surfaces(), 0);
        assert_eq!(ctx.free_buffers(), 0);
        assert_eq!(ctx.free_shadow_maps(), 0);
        assert_eq!(ctx.pending_destroys(), 0);
        assert_eq!(backend.live_objects(), 0);
        ctx.detach_render_thread();
    }
}
