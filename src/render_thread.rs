//! Owned render thread.
//!
//! Wraps a [`RenderContext`] frame loop in a dedicated OS thread. The
//! loop idles on the task queue when nothing is submitted, runs
//! [`run_frame`](RenderContext::run_frame) otherwise, and performs the
//! orderly teardown on stop: final queue drain, pool release and
//! destroyer flush.
//!
//! Tests and headless tools that want deterministic frame counts skip
//! this type and drive `run_frame` themselves after
//! [`attach_render_thread`](RenderContext::attach_render_thread).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::context::RenderContext;

/// Idle poll interval when the queue is empty and no frame pacing is
/// supplied by the frame callback itself.
const IDLE_WAIT: Duration = Duration::from_millis(1);

/// A running render thread.
pub struct RenderThread {
    ctx: Arc<RenderContext>,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

/// Detaches the render thread even when the loop unwinds, so blocked
/// `wait_all` callers fail fast instead of hanging on a dead thread.
struct DetachGuard<'a>(&'a RenderContext);

impl Drop for DetachGuard<'_> {
    fn drop(&mut self) {
        self.0.detach_render_thread();
    }
}

impl RenderThread {
    /// Spawn the render thread. `frame` runs once per frame, between the
    /// queue drain and the frame-clock advance.
    pub fn spawn(
        ctx: Arc<RenderContext>,
        mut frame: impl FnMut() + Send + 'static,
    ) -> std::io::Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = std::sync::mpsc::channel();
        let handle = {
            let ctx = Arc::clone(&ctx);
            let stop = Arc::clone(&stop);
            std::thread::Builder::new()
                .name("render".to_string())
                .spawn(move || {
                    ctx.attach_render_thread();
                    let _guard = DetachGuard(&ctx);
                    let _ = ready_tx.send(());
                    while !stop.load(Ordering::Acquire) {
                        ctx.tasks().wait_for_work(IDLE_WAIT);
                        ctx.run_frame(&mut frame);
                    }
                    ctx.shutdown_render_resources();
                    log::info!("render thread stopped after {} frames", ctx.frame());
                })?
        };
        // Don't hand the thread back until it is attached; a caller
        // issuing wait_all right after spawn must find it running.
        let _ = ready_rx.recv();
        Ok(Self {
            ctx,
            stop,
            handle: Some(handle),
        })
    }

    /// The context this thread drives.
    pub fn context(&self) -> &Arc<RenderContext> {
        &self.ctx
    }

    /// Stop the loop, run the shutdown sweep and join.
    ///
    /// A panic on the render thread (a failed resource creation, or a
    /// panicking task) resurfaces here.
    pub fn stop(mut self) {
        self.stop.store(true, Ordering::Release);
        self.ctx.tasks().notify();
        if let Some(handle) = self.handle.take() {
            if let Err(payload) = handle.join() {
                std::panic::resume_unwind(payload);
            }
        }
    }
}

impl Drop for RenderThread {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.stop.store(true, Ordering::Release);
            self.ctx.tasks().notify();
            let _ = handle.join();
        }
    }
}
