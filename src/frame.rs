//! Frame clock.
//!
//! A single monotone counter advanced once per completed render-thread
//! frame. Every age decision in the crate (pool eviction, countdown
//! destruction) derives from it, so there is exactly one place where it
//! ticks: the end of [`RenderContext::run_frame`](crate::RenderContext::run_frame).

use std::sync::atomic::{AtomicU64, Ordering};

/// Logical frame number. Strictly increasing, never wraps in practice.
pub type FrameIndex = u64;

/// Monotone frame counter shared between threads.
#[derive(Debug, Default)]
pub struct FrameClock {
    frame: AtomicU64,
}

impl FrameClock {
    /// Create a clock starting at frame 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// The current frame index. Callable from any thread.
    pub fn current(&self) -> FrameIndex {
        self.frame.load(Ordering::Acquire)
    }

    /// Advance to the next frame and return it.
    ///
    /// Called only by the render thread at the frame boundary.
    pub(crate) fn advance(&self) -> FrameIndex {
        self.frame.fetch_add(1, Ordering::AcqRel) + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_advances_monotonically() {
        let clock = FrameClock::new();
        assert_eq!(clock.current(), 0);
        assert_eq!(clock.advance(), 1);
        assert_eq!(clock.advance(), 2);
        assert_eq!(clock.current(), 2);
    }
}
