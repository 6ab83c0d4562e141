//! Task offloading for background tier transitions.
//!
//! [`AsyncBuffer`](crate::policy::async_buffer::AsyncBuffer) moves its
//! slow-tier writes off the caller's thread through the [`Executor`]
//! abstraction: anything that can run a boxed task. The crate ships
//! [`OffloadExecutor`], a single worker thread fed by a channel, which
//! keeps slow-tier I/O strictly ordered; plug in a pool-backed
//! implementation when ordering does not matter.
//!
//! Tasks queued on an `OffloadExecutor` when it shuts down are dropped
//! without running; anything waiting on their results observes a
//! cancellation.

use std::sync::mpsc::{self, Sender};
use std::thread::JoinHandle;

use parking_lot::Mutex;

/// A unit of background work.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Something that can run boxed tasks, typically on another thread.
///
/// `shutdown` is called by the owning component's `close()`; executors
/// shared across components should leave it as the default no-op.
pub trait Executor: Send + Sync {
    /// Submits a task for execution.
    fn execute(&self, task: Task);

    /// Stops accepting tasks and releases worker resources.
    fn shutdown(&self) {}
}

/// Single worker thread executor with FIFO task ordering.
///
/// The worker is spawned lazily on the first submitted task and joined on
/// [`shutdown`](Executor::shutdown) (or drop). If the OS refuses to spawn
/// a thread, the task runs inline on the submitting thread.
pub struct OffloadExecutor {
    inner: Mutex<Inner>,
}

struct Inner {
    worker: Option<Worker>,
    closed: bool,
}

struct Worker {
    sender: Sender<Task>,
    handle: JoinHandle<()>,
}

impl OffloadExecutor {
    /// Creates an executor; no thread is spawned until the first task.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                worker: None,
                closed: false,
            }),
        }
    }

    fn spawn_worker() -> Option<Worker> {
        let (sender, receiver) = mpsc::channel::<Task>();
        let spawned = std::thread::Builder::new()
            .name("mapstack-offload".into())
            .spawn(move || {
                while let Ok(task) = receiver.recv() {
                    task();
                }
            });
        match spawned {
            Ok(handle) => Some(Worker { sender, handle }),
            Err(_) => None,
        }
    }
}

impl Default for OffloadExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl Executor for OffloadExecutor {
    fn execute(&self, task: Task) {
        let mut inner = self.inner.lock();
        if inner.closed {
            // Dropped without running; waiters observe a cancellation.
            return;
        }
        if inner.worker.is_none() {
            inner.worker = Self::spawn_worker();
        }
        match inner.worker.as_ref() {
            Some(worker) => {
                let _ = worker.sender.send(task);
            }
            None => {
                // Thread spawn failed; degrade to inline execution.
                drop(inner);
                task();
            }
        }
    }

    fn shutdown(&self) {
        let worker = {
            let mut inner = self.inner.lock();
            inner.closed = true;
            inner.worker.take()
        };
        if let Some(worker) = worker {
            // Dropping the sender ends the worker loop; queued tasks that
            // never started are dropped with it.
            drop(worker.sender);
            let _ = worker.handle.join();
        }
    }
}

impl Drop for OffloadExecutor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::sync::Arc;

    use super::*;

    #[test]
    fn tasks_run_in_submission_order() {
        let executor = OffloadExecutor::new();
        let (tx, rx) = mpsc::channel();
        for i in 0..8 {
            let tx = tx.clone();
            executor.execute(Box::new(move || {
                tx.send(i).unwrap();
            }));
        }
        let seen: Vec<i32> = (0..8).map(|_| rx.recv().unwrap()).collect();
        assert_eq!(seen, (0..8).collect::<Vec<i32>>());
    }

    #[test]
    fn shutdown_joins_the_worker_and_is_idempotent() {
        let executor = OffloadExecutor::new();
        let ran = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ran);
        executor.execute(Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        executor.shutdown();
        executor.shutdown();
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn execute_after_shutdown_is_a_quiet_no_op() {
        let executor = OffloadExecutor::new();
        executor.execute(Box::new(|| {}));
        executor.shutdown();
        executor.execute(Box::new(|| {
            panic!("must not run after shutdown");
        }));
    }
}
