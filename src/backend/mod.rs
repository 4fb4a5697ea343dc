//! Backend abstraction.
//!
//! The lifecycle core never talks to a graphics API directly. Everything
//! it needs from one is captured by [`RhiBackend`]: creating buffers,
//! textures and samplers, physically destroying them, and a monotone
//! timeline fence for GPU-completion tracking. Backends are shared as
//! `Arc<dyn RhiBackend>` and must be callable from any thread; the core
//! guarantees that create and destroy calls only ever happen on the
//! render thread.
//!
//! The in-tree [`NullBackend`] implements the contract without a GPU and
//! is what the test suite runs against.

use std::fmt;

use crate::error::RhiError;
use crate::types::{BufferDescriptor, SamplerDescriptor, TextureDescriptor};

#[cfg(feature = "null-backend")]
mod null;

#[cfg(feature = "null-backend")]
pub use null::NullBackend;

/// Opaque backend handle to a GPU object.
///
/// Only the backend that issued a handle can interpret it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawRhiHandle(pub(crate) u64);

impl RawRhiHandle {
    /// The raw handle value, for backend-internal bookkeeping.
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RawRhiHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rhi#{}", self.0)
    }
}

static_assertions::assert_impl_all!(RawRhiHandle: Send, Sync, Copy);

/// Trait implemented by graphics backends.
///
/// All methods take `&self`; implementations handle their own interior
/// synchronization. Creation returns [`RawRhiHandle`]s that stay valid
/// until [`destroy`](Self::destroy) is called with them.
///
/// The fence pair models a timeline: [`signal_fence`](Self::signal_fence)
/// enqueues a signal of `value` after all GPU work submitted so far, and
/// [`fence_completed_value`](Self::fence_completed_value) reports the
/// highest value the GPU has reached. Backends without an efficient
/// completion poll return `false` from
/// [`supports_fence_polling`](Self::supports_fence_polling) and the core
/// falls back to frame-countdown destruction.
pub trait RhiBackend: Send + Sync + 'static {
    /// Backend name for logging and diagnostics.
    fn name(&self) -> &'static str;

    /// Create a buffer, optionally filled with initial data.
    fn create_buffer(
        &self,
        descriptor: &BufferDescriptor,
        initial_data: Option<&[u8]>,
    ) -> Result<RawRhiHandle, RhiError>;

    /// Create a texture.
    fn create_texture(&self, descriptor: &TextureDescriptor) -> Result<RawRhiHandle, RhiError>;

    /// Create a sampler.
    fn create_sampler(&self, descriptor: &SamplerDescriptor) -> Result<RawRhiHandle, RhiError>;

    /// Physically free a GPU object.
    ///
    /// Called only by the deferred destruction queue, after the GPU is
    /// known to be done with the object.
    fn destroy(&self, handle: RawRhiHandle);

    /// Enqueue a timeline fence signal of `value` behind all submitted work.
    fn signal_fence(&self, value: u64);

    /// The highest timeline value the GPU has completed.
    fn fence_completed_value(&self) -> u64;

    /// Whether [`fence_completed_value`](Self::fence_completed_value) is a
    /// cheap, accurate poll on this backend.
    fn supports_fence_polling(&self) -> bool {
        true
    }
}

static_assertions::assert_obj_safe!(RhiBackend);
