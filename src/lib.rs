//! # render-lifecycle
//!
//! GPU resource lifecycle management: a single render thread owns all
//! GPU object creation and destruction, retired objects are freed only
//! once the GPU is provably done with them, and transient resources
//! (surfaces, buffers, shadow maps) are pooled and reused across frames.
//!
//! ## Overview
//!
//! - [`RenderContext`] - The explicit root object: backend, frame clock,
//!   task queue, pools and the deferred destroyer
//! - [`RenderThread`] - Owned frame loop driving the context
//! - [`RhiBackend`] - Trait a graphics backend implements;
//!   [`NullBackend`] ships for headless use and tests
//! - [`RenderResource`] - Lifecycle-managed GPU resource with an
//!   explicit state machine
//! - [`DeferredDestroy`] - Fence-epoch and frame-countdown destruction
//!   strategies
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use render_lifecycle::{
//!     Extent2d, NullBackend, RenderContext, RenderThread, TextureFormat,
//! };
//!
//! let backend = Arc::new(NullBackend::new());
//! let ctx = RenderContext::new(backend);
//! let render = RenderThread::spawn(Arc::clone(&ctx), || {}).unwrap();
//!
//! let surface = ctx
//!     .request_surface(TextureFormat::Rgba8Unorm, Extent2d::new(1280, 720))
//!     .unwrap();
//! ctx.wait_all();
//! ctx.return_surface(surface);
//!
//! render.stop();
//! ```

pub mod backend;
pub mod context;
pub mod destroy;
pub mod error;
pub mod frame;
pub mod pool;
pub mod render_thread;
pub mod resource;
pub mod tasks;
pub mod types;

pub use backend::{RawRhiHandle, RhiBackend};
pub use context::{ContextConfig, DestroyPolicy, RenderContext};
pub use destroy::{
    DeferredDestroy, FenceEpochDestroy, FrameCountdownDestroy, DEFAULT_DESTROY_WAIT_FRAMES,
};
pub use error::RhiError;
pub use frame::{FrameClock, FrameIndex};
pub use pool::{
    BufferKey, BufferPool, PooledBuffer, PooledShadowMap, PooledSurface, ShadowMapPool,
    SurfaceKey, SurfacePool, DEFAULT_RESOURCE_LIVE_FRAMES,
};
pub use render_thread::RenderThread;
pub use resource::{
    RenderResource, ResourceDesc, ResourceId, ResourceState, RhiObject, RhiObjectKind,
};
pub use tasks::{Priority, TaskHandle, TaskStatus};
pub use types::{
    AddressMode, BufferDescriptor, BufferUsage, Extent2d, FilterMode, SamplerDescriptor,
    TextureDescriptor, TextureFormat, TextureUsage,
};

#[cfg(feature = "null-backend")]
pub use backend::NullBackend;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_default_thresholds() {
        assert_eq!(DEFAULT_RESOURCE_LIVE_FRAMES, 180);
        assert_eq!(DEFAULT_DESTROY_WAIT_FRAMES, 5);
    }
}
