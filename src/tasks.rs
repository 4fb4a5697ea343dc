//! Cross-thread render task queue.
//!
//! Any thread may submit closures for execution on the render thread.
//! Three priority classes exist; within a class, tasks from one producer
//! run in submission order. Tasks may declare dependencies on previously
//! returned [`TaskHandle`]s and only become runnable once every
//! dependency has executed.
//!
//! The render thread drains the queue once per frame via
//! [`RenderTaskQueue::drain`]. A submission made from the render thread
//! itself, with no unresolved dependencies, executes inline instead of
//! round-tripping through the queue.
//!
//! ```text
//!  logic thread                       render thread
//!  ------------                       -------------
//!  submit(f) ── push ──> [High   ]
//!  submit(g) ── push ──> [Middle ] ──> drain() ─> f(); g(); ...
//!  wait_all() <── condvar signal ──── (queue drained)
//! ```

use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::ThreadId;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

/// Task priority class. Higher drains first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    /// Background work (asset streaming, cold uploads).
    Low,
    /// Default for resource creation and destruction.
    Middle,
    /// Must run before any rendering this frame.
    High,
}

impl Priority {
    const COUNT: usize = 3;

    fn index(self) -> usize {
        self as usize
    }
}

/// Observable lifecycle of a submitted task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    /// Submitted, not yet started.
    Pending,
    /// Currently running on the render thread.
    Executing,
    /// Finished.
    Executed,
}

const STATUS_PENDING: u8 = 0;
const STATUS_EXECUTING: u8 = 1;
const STATUS_EXECUTED: u8 = 2;

type TaskFn = Box<dyn FnOnce() + Send + 'static>;

/// Closure parked until its dependencies resolve.
struct ParkedTask {
    run: TaskFn,
    priority: Priority,
}

/// State shared between a task, its handle and its dependents.
struct TaskShared {
    status: AtomicU8,
    /// Unresolved holds: one per incomplete dependency, plus one held by
    /// the submitting call until registration finishes.
    remaining: AtomicU32,
    parked: Mutex<Option<ParkedTask>>,
    dependents: Mutex<Vec<Arc<TaskShared>>>,
}

impl TaskShared {
    fn new(run: TaskFn, priority: Priority) -> Arc<Self> {
        Arc::new(Self {
            status: AtomicU8::new(STATUS_PENDING),
            remaining: AtomicU32::new(1),
            parked: Mutex::new(Some(ParkedTask { run, priority })),
            dependents: Mutex::new(Vec::new()),
        })
    }

    fn status(&self) -> TaskStatus {
        match self.status.load(Ordering::Acquire) {
            STATUS_PENDING => TaskStatus::Pending,
            STATUS_EXECUTING => TaskStatus::Executing,
            _ => TaskStatus::Executed,
        }
    }
}

/// Handle to a submitted task. Cheap to clone; usable as a dependency
/// for later submissions and for status polling.
#[derive(Clone)]
pub struct TaskHandle {
    shared: Arc<TaskShared>,
}

impl TaskHandle {
    /// Current status of the task.
    pub fn status(&self) -> TaskStatus {
        self.shared.status()
    }

    /// Whether the task has executed.
    pub fn is_finished(&self) -> bool {
        self.status() == TaskStatus::Executed
    }
}

impl std::fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskHandle")
            .field("status", &self.status())
            .finish()
    }
}

/// A task whose dependencies have all resolved.
struct ReadyTask {
    run: TaskFn,
    priority: Priority,
    shared: Arc<TaskShared>,
}

struct QueueState {
    ready: [std::collections::VecDeque<ReadyTask>; Priority::COUNT],
    submitted: u64,
    completed: u64,
    attached: bool,
}

/// The queue itself. One per [`RenderContext`](crate::RenderContext).
pub(crate) struct RenderTaskQueue {
    state: Mutex<QueueState>,
    /// Signaled when ready tasks are pushed or the owner wants the render
    /// thread to wake up.
    work: Condvar,
    /// Signaled whenever a task completes or the render thread detaches.
    drained: Condvar,
    render_thread: Mutex<Option<ThreadId>>,
}

impl RenderTaskQueue {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                ready: Default::default(),
                submitted: 0,
                completed: 0,
                attached: false,
            }),
            work: Condvar::new(),
            drained: Condvar::new(),
            render_thread: Mutex::new(None),
        }
    }

    /// Record the calling thread as the render thread.
    pub(crate) fn attach(&self) {
        *self.render_thread.lock() = Some(std::thread::current().id());
        self.state.lock().attached = true;
        log::debug!("render thread attached: {:?}", std::thread::current().id());
    }

    /// Clear the render thread registration and wake all waiters so they
    /// can observe the detach.
    pub(crate) fn detach(&self) {
        *self.render_thread.lock() = None;
        self.state.lock().attached = false;
        self.drained.notify_all();
        log::debug!("render thread detached");
    }

    pub(crate) fn is_render_thread(&self) -> bool {
        *self.render_thread.lock() == Some(std::thread::current().id())
    }

    /// Submit a task with a priority and dependencies.
    pub(crate) fn submit(
        &self,
        priority: Priority,
        after: &[TaskHandle],
        f: impl FnOnce() + Send + 'static,
    ) -> TaskHandle {
        let shared = TaskShared::new(Box::new(f), priority);
        self.state.lock().submitted += 1;

        for dep in after {
            // The completer flips status to Executed while holding the
            // dependents lock, so this check-and-register is race-free.
            let mut dependents = dep.shared.dependents.lock();
            if dep.shared.status.load(Ordering::Acquire) != STATUS_EXECUTED {
                shared.remaining.fetch_add(1, Ordering::AcqRel);
                dependents.push(Arc::clone(&shared));
            }
        }

        // Drop the registration hold. If it was the last one the task is
        // runnable now; on the render thread that means inline execution.
        if let Some(ready) = Self::resolve_hold(&shared) {
            if self.is_render_thread() {
                self.execute(ready);
            } else {
                self.enqueue_ready(ready);
            }
        }

        TaskHandle { shared }
    }

    /// Release one hold on `shared`; returns the task if it became runnable.
    fn resolve_hold(shared: &Arc<TaskShared>) -> Option<ReadyTask> {
        if shared.remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
            let parked = shared.parked.lock().take();
            parked.map(|p| ReadyTask {
                run: p.run,
                priority: p.priority,
                shared: Arc::clone(shared),
            })
        } else {
            None
        }
    }

    fn enqueue_ready(&self, ready: ReadyTask) {
        let mut state = self.state.lock();
        state.ready[ready.priority.index()].push_back(ready);
        drop(state);
        self.work.notify_one();
    }

    fn execute(&self, ready: ReadyTask) {
        ready
            .shared
            .status
            .store(STATUS_EXECUTING, Ordering::Release);
        (ready.run)();
        self.complete(&ready.shared);
    }

    /// Mark a task executed, release its dependents and bump the
    /// completion counter.
    fn complete(&self, shared: &Arc<TaskShared>) {
        let freed: Vec<ReadyTask> = {
            let mut dependents = shared.dependents.lock();
            shared.status.store(STATUS_EXECUTED, Ordering::Release);
            dependents
                .drain(..)
                .filter_map(|dep| Self::resolve_hold(&dep))
                .collect()
        };
        for ready in freed {
            self.enqueue_ready(ready);
        }

        let mut state = self.state.lock();
        state.completed += 1;
        self.drained.notify_all();
    }

    /// Run every queued task. Render thread only.
    pub(crate) fn drain(&self) {
        debug_assert!(self.is_render_thread(), "drain called off the render thread");
        loop {
            let next = {
                let mut state = self.state.lock();
                Self::pop_highest(&mut state)
            };
            match next {
                Some(ready) => self.execute(ready),
                None => break,
            }
        }
    }

    fn pop_highest(state: &mut QueueState) -> Option<ReadyTask> {
        for queue in state.ready.iter_mut().rev() {
            if let Some(task) = queue.pop_front() {
                return Some(task);
            }
        }
        None
    }

    /// Block until the render thread wants to run a frame: ready work
    /// exists, `timeout` elapses, or a wake-up is requested.
    pub(crate) fn wait_for_work(&self, timeout: Duration) {
        let mut state = self.state.lock();
        if state.ready.iter().all(|q| q.is_empty()) {
            let _ = self.work.wait_for(&mut state, timeout);
        }
    }

    /// Wake the render thread out of [`wait_for_work`](Self::wait_for_work).
    pub(crate) fn notify(&self) {
        self.work.notify_all();
    }

    /// Block until every task submitted before this call has executed.
    ///
    /// Panics if the render thread is not attached, or exits while
    /// waiting; blocking here would otherwise deadlock forever. Called
    /// from the render thread it drains the queue instead of blocking.
    pub(crate) fn wait_all(&self) {
        if self.is_render_thread() {
            self.drain();
            return;
        }
        let mut state = self.state.lock();
        assert!(
            state.attached,
            "wait_all called without a running render thread"
        );
        let target = state.submitted;
        while state.completed < target {
            self.drained.wait(&mut state);
            assert!(
                state.attached,
                "render thread exited while wait_all was blocking"
            );
        }
    }

    /// Number of tasks submitted but not yet executed.
    pub(crate) fn pending(&self) -> u64 {
        let state = self.state.lock();
        state.submitted - state.completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;

    fn recorder() -> (Arc<Mutex<Vec<&'static str>>>, impl Fn(&'static str) + Clone) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let push = {
            let log = Arc::clone(&log);
            move |name: &'static str| log.lock().push(name)
        };
        (log, push)
    }

    #[test]
    fn test_priority_enum_ordering() {
        assert!(Priority::High > Priority::Middle);
        assert!(Priority::Middle > Priority::Low);
    }

    #[test]
    fn test_drain_runs_high_before_low() {
        let queue = RenderTaskQueue::new();
        let (log, push) = recorder();
        // Submitted before attach, so nothing executes inline.
        let p = push.clone();
        queue.submit(Priority::Low, &[], move || p("low"));
        let p = push.clone();
        queue.submit(Priority::High, &[], move || p("high"));
        queue.submit(Priority::Middle, &[], move || push("middle"));

        queue.attach();
        queue.drain();
        assert_eq!(*log.lock(), vec!["high", "middle", "low"]);
        queue.detach();
    }

    #[test]
    fn test_fifo_within_priority() {
        let queue = RenderTaskQueue::new();
        let (log, push) = recorder();
        for name in ["a", "b", "c"] {
            let p = push.clone();
            queue.submit(Priority::Middle, &[], move || p(name));
        }
        queue.attach();
        queue.drain();
        assert_eq!(*log.lock(), vec!["a", "b", "c"]);
        queue.detach();
    }

    #[test]
    fn test_inline_execution_on_render_thread() {
        let queue = RenderTaskQueue::new();
        queue.attach();
        let (log, push) = recorder();
        let handle = queue.submit(Priority::Middle, &[], move || push("inline"));
        // Already executed, without any drain.
        assert_eq!(handle.status(), TaskStatus::Executed);
        assert_eq!(*log.lock(), vec!["inline"]);
        assert_eq!(queue.pending(), 0);
        queue.detach();
    }

    #[test]
    fn test_dependency_defers_execution() {
        let queue = RenderTaskQueue::new();
        let (log, push) = recorder();
        let p = push.clone();
        let first = queue.submit(Priority::Middle, &[], move || p("first"));
        // Higher priority, but gated on `first`.
        let second = queue.submit(Priority::High, &[first.clone()], move || push("second"));
        assert_eq!(second.status(), TaskStatus::Pending);

        queue.attach();
        queue.drain();
        assert_eq!(*log.lock(), vec!["first", "second"]);
        assert!(first.is_finished());
        assert!(second.is_finished());
        queue.detach();
    }

    #[test]
    fn test_dependency_on_finished_task_is_immediate() {
        let queue = RenderTaskQueue::new();
        queue.attach();
        let (log, push) = recorder();
        let p = push.clone();
        let first = queue.submit(Priority::Middle, &[], move || p("first"));
        assert!(first.is_finished());
        let second = queue.submit(Priority::Middle, &[first], move || push("second"));
        assert!(second.is_finished());
        assert_eq!(*log.lock(), vec!["first", "second"]);
        queue.detach();
    }

    #[test]
    fn test_diamond_dependencies() {
        let queue = RenderTaskQueue::new();
        let (log, push) = recorder();
        let p = push.clone();
        let root = queue.submit(Priority::Middle, &[], move || p("root"));
        let p = push.clone();
        let left = queue.submit(Priority::Middle, &[root.clone()], move || p("left"));
        let p = push.clone();
        let right = queue.submit(Priority::Middle, &[root], move || p("right"));
        let join = queue.submit(Priority::Middle, &[left, right], move || push("join"));

        queue.attach();
        queue.drain();
        let order = log.lock().clone();
        assert_eq!(order[0], "root");
        assert_eq!(order[3], "join");
        assert!(join.is_finished());
        queue.detach();
    }

    #[test]
    #[should_panic(expected = "without a running render thread")]
    fn test_wait_all_panics_without_render_thread() {
        let queue = RenderTaskQueue::new();
        queue.submit(Priority::Middle, &[], || {});
        queue.wait_all();
    }

    #[test]
    fn test_wait_all_blocks_until_drained() {
        let queue = Arc::new(RenderTaskQueue::new());
        let attached = Arc::new(Barrier::new(2));
        let stop = Arc::new(std::sync::atomic::AtomicBool::new(false));

        let worker = {
            let queue = Arc::clone(&queue);
            let attached = Arc::clone(&attached);
            let stop = Arc::clone(&stop);
            std::thread::spawn(move || {
                queue.attach();
                attached.wait();
                while !stop.load(Ordering::Acquire) {
                    queue.wait_for_work(Duration::from_millis(1));
                    queue.drain();
                }
                queue.drain();
                queue.detach();
            })
        };

        attached.wait();
        let counter = Arc::new(AtomicU32::new(0));
        for _ in 0..16 {
            let counter = Arc::clone(&counter);
            queue.submit(Priority::Middle, &[], move || {
                counter.fetch_add(1, Ordering::AcqRel);
            });
        }
        queue.wait_all();
        assert_eq!(counter.load(Ordering::Acquire), 16);
        assert_eq!(queue.pending(), 0);

        stop.store(true, Ordering::Release);
        queue.notify();
        worker.join().unwrap();
    }
}
