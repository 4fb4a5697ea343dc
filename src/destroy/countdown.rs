//! Frame-countdown destruction strategy.

use std::sync::Arc;

use crate::backend::RhiBackend;
use crate::frame::FrameIndex;
use crate::resource::RhiObject;

use super::{DeferredDestroy, EpochQueue, DEFAULT_DESTROY_WAIT_FRAMES};

/// Frees retired objects after a fixed number of frames have passed.
///
/// Conservative fallback for backends without a cheap fence poll: if the
/// wait covers the maximum number of frames in flight, the GPU cannot
/// still be using an object by the time it frees.
pub struct FrameCountdownDestroy {
    backend: Arc<dyn RhiBackend>,
    epochs: EpochQueue,
    wait_frames: u64,
}

impl FrameCountdownDestroy {
    /// Create a destroyer with the default wait
    /// ([`DEFAULT_DESTROY_WAIT_FRAMES`]).
    pub fn new(backend: Arc<dyn RhiBackend>) -> Self {
        Self::with_wait(backend, DEFAULT_DESTROY_WAIT_FRAMES)
    }

    /// Create a destroyer waiting `wait_frames` frames before freeing.
    pub fn with_wait(backend: Arc<dyn RhiBackend>, wait_frames: u64) -> Self {
        Self {
            backend,
            epochs: EpochQueue::new(),
            wait_frames,
        }
    }
}

impl DeferredDestroy for FrameCountdownDestroy {
    fn enqueue(&mut self, object: RhiObject, frame: FrameIndex) {
        log::trace!(
            "deferring destruction of {} (frame {frame}, wait {})",
            object.raw(),
            self.wait_frames
        );
        self.epochs.push(object);
    }

    fn update(&mut self, frame: FrameIndex) {
        self.epochs.seal(frame);
        let completed = frame.saturating_sub(self.wait_frames);
        let backend = &self.backend;
        self.epochs.collect(completed, |obj| backend.destroy(obj.raw()));
    }

    fn flush_all(&mut self) {
        let backend = &self.backend;
        self.epochs.drain_all(|obj| backend.destroy(obj.raw()));
    }

    fn pending(&self) -> usize {
        self.epochs.pending()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::NullBackend;
    use crate::resource::{RenderResource, ResourceDesc};
    use crate::types::{BufferDescriptor, BufferUsage};

    fn retired_object(backend: &Arc<NullBackend>) -> RhiObject {
        let res = RenderResource::new(ResourceDesc::Buffer {
            descriptor: BufferDescriptor::new(16, BufferUsage::UNIFORM),
            initial_data: None,
        });
        assert!(res.try_begin_create());
        res.create_now(backend.as_ref());
        res.destroy_now().unwrap()
    }

    #[test]
    fn test_free_after_wait_elapses() {
        let backend = Arc::new(NullBackend::new());
        let shared: Arc<dyn RhiBackend> = backend.clone();
        let mut destroyer = FrameCountdownDestroy::with_wait(shared, 3);

        destroyer.enqueue(retired_object(&backend), 1);
        for frame in 1..4 {
            destroyer.update(frame);
            assert_eq!(backend.live_objects(), 1, "freed too early at {frame}");
        }
        destroyer.update(4);
        assert_eq!(backend.live_objects(), 0);
    }

    #[test]
    fn test_later_retirements_wait_their_own_turn() {
        let backend = Arc::new(NullBackend::new());
        let shared: Arc<dyn RhiBackend> = backend.clone();
        let mut destroyer = FrameCountdownDestroy::with_wait(shared, 2);

        destroyer.enqueue(retired_object(&backend), 1);
        destroyer.update(1);
        destroyer.enqueue(retired_object(&backend), 2);
        destroyer.update(2);
        assert_eq!(backend.live_objects(), 2);

        destroyer.update(3);
        assert_eq!(backend.live_objects(), 1);
        destroyer.update(4);
        assert_eq!(backend.live_objects(), 0);
    }

    #[test]
    fn test_flush_all() {
        let backend = Arc::new(NullBackend::new());
        let shared: Arc<dyn RhiBackend> = backend.clone();
        let mut destroyer = FrameCountdownDestroy::new(shared);

        destroyer.enqueue(retired_object(&backend), 1);
        destroyer.flush_all();
        assert_eq!(backend.live_objects(), 0);
        assert_eq!(destroyer.pending(), 0);
    }
}
