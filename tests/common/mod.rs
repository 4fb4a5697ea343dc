//! Shared helpers for integration tests.

use std::sync::Arc;

use render_lifecycle::{ContextConfig, NullBackend, RenderContext};

/// Initialize logging once for the test binary.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A context driven manually from the test thread, which registers
/// itself as the render thread for deterministic frame counts.
pub fn headless_context(config: ContextConfig) -> (Arc<NullBackend>, Arc<RenderContext>) {
    init_logging();
    let backend = Arc::new(NullBackend::new());
    let ctx = RenderContext::with_config(backend.clone(), config);
    ctx.attach_render_thread();
    (backend, ctx)
}

/// Run `count` empty frames.
pub fn run_frames(ctx: &Arc<RenderContext>, count: u64) {
    for _ in 0..count {
        ctx.run_frame(|| {});
    }
}
