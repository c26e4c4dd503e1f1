//! Sequential task queues.
//!
//! A [`TaskQueue`] runs submitted closures one at a time in submission order
//! on its own OS thread, so a slow task never holds up a runtime worker or
//! another queue. Panics are contained per task. Shutdown stops
//! intake, waits a grace period for queued work and then cancels whatever is
//! left.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;
use tracing::{debug, error, warn};

/// Grace period used when none is configured.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

type Task = Box<dyn FnOnce() + Send + 'static>;

enum Command {
    Run(Task),
    Barrier(oneshot::Sender<()>),
    Stop,
}

/// How a shutdown ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// Every queued task ran before the grace period ran out.
    Drained,
    /// The grace period ran out and remaining tasks were dropped.
    Forced,
}

struct Inner {
    name: String,
    runtime: Handle,
    command_tx: mpsc::UnboundedSender<Command>,
    accepting: AtomicBool,
    cancelled: Arc<AtomicBool>,
    shutdown_tx: watch::Sender<bool>,
    /// Resolves when the worker thread has left its loop.
    worker_done: Mutex<Option<oneshot::Receiver<()>>>,
}

/// A cloneable handle to a single sequential executor.
#[derive(Clone)]
pub struct TaskQueue {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskQueue")
            .field("name", &self.inner.name)
            .field("accepting", &self.is_accepting())
            .finish()
    }
}

impl TaskQueue {
    /// Start a queue. Its delayed and periodic timers live on the current
    /// tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn spawn(name: impl Into<String>) -> Self {
        let name = name.into();
        let runtime = Handle::current();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, _) = watch::channel(false);
        let (done_tx, done_rx) = oneshot::channel();
        let cancelled = Arc::new(AtomicBool::new(false));

        let worker_name = name.clone();
        let worker_cancelled = cancelled.clone();
        let spawned = thread::Builder::new()
            .name(format!("queue-{name}"))
            .spawn(move || {
                run_worker(&worker_name, command_rx, &worker_cancelled);
                let _ = done_tx.send(());
            });
        let accepting = match spawned {
            Ok(_) => {
                debug!("Started task queue {name}");
                true
            }
            Err(e) => {
                error!("Failed to start worker thread for queue {name}: {e}");
                false
            }
        };

        Self {
            inner: Arc::new(Inner {
                name,
                runtime,
                command_tx,
                accepting: AtomicBool::new(accepting),
                cancelled,
                shutdown_tx,
                worker_done: Mutex::new(Some(done_rx)),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn is_accepting(&self) -> bool {
        self.inner.accepting.load(Ordering::Acquire)
    }

    /// Queue a task. Returns `false` once the queue is shutting down.
    pub fn submit(&self, task: impl FnOnce() + Send + 'static) -> bool {
        if !self.is_accepting() {
            debug!("Rejected task on stopped queue {}", self.inner.name);
            return false;
        }
        self.inner.command_tx.send(Command::Run(Box::new(task))).is_ok()
    }

    /// Queue a task after `delay`. The timer is dropped on shutdown.
    pub fn submit_delayed(&self, task: impl FnOnce() + Send + 'static, delay: Duration) -> bool {
        if !self.is_accepting() {
            return false;
        }
        let queue = Arc::downgrade(&self.inner);
        let mut shutdown = self.inner.shutdown_tx.subscribe();
        self.inner.runtime.spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {
                    if let Some(queue) = upgrade(&queue) {
                        queue.submit(task);
                    }
                }
                _ = shutdown.changed() => {}
            }
        });
        true
    }

    /// Queue `task` every `interval`, first run one interval from now.
    pub fn submit_periodic(
        &self,
        task: impl Fn() + Send + Sync + 'static,
        interval: Duration,
    ) -> bool {
        if !self.is_accepting() {
            return false;
        }
        let task = Arc::new(task);
        let queue = Arc::downgrade(&self.inner);
        let mut shutdown = self.inner.shutdown_tx.subscribe();
        self.inner.runtime.spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let Some(queue) = upgrade(&queue) else { break };
                        let task = task.clone();
                        if !queue.submit(move || task()) {
                            break;
                        }
                    }
                    _ = shutdown.changed() => break,
                }
            }
        });
        true
    }

    /// Resolve once every task submitted before this call has run.
    ///
    /// Resolves immediately when the worker has already stopped.
    pub async fn drained(&self) {
        let (tx, rx) = oneshot::channel();
        if self.inner.command_tx.send(Command::Barrier(tx)).is_ok() {
            let _ = rx.await;
        }
    }

    /// Stop accepting work and wait up to `grace` for queued tasks.
    ///
    /// On timeout the remaining tasks are dropped and a warning naming the
    /// queue is logged. A task already running is left to finish on its
    /// thread. Calling this again after the first shutdown returns
    /// [`ShutdownOutcome::Drained`] immediately.
    pub async fn shutdown(&self, grace: Duration) -> ShutdownOutcome {
        let name = &self.inner.name;
        self.inner.accepting.store(false, Ordering::Release);
        let _ = self.inner.shutdown_tx.send(true);
        let _ = self.inner.command_tx.send(Command::Stop);

        let Some(worker_done) = self.inner.worker_done.lock().take() else {
            return ShutdownOutcome::Drained;
        };
        match tokio::time::timeout(grace, worker_done).await {
            Ok(_) => {
                debug!("Task queue {name} stopped");
                ShutdownOutcome::Drained
            }
            Err(_) => {
                warn!(
                    "Soft shutdown of queue {name} exceeded time limit of {}ms, forcing shutdown",
                    grace.as_millis()
                );
                self.inner.cancelled.store(true, Ordering::Release);
                ShutdownOutcome::Forced
            }
        }
    }
}

fn upgrade(queue: &Weak<Inner>) -> Option<TaskQueue> {
    queue.upgrade().map(|inner| TaskQueue { inner })
}

fn run_worker(name: &str, mut command_rx: mpsc::UnboundedReceiver<Command>, cancelled: &AtomicBool) {
    while let Some(command) = command_rx.blocking_recv() {
        match command {
            Command::Run(task) => {
                if cancelled.load(Ordering::Acquire) {
                    break;
                }
                if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(task)) {
                    error!("Task on queue {name} panicked: {}", panic_message(&*payload));
                }
            }
            Command::Barrier(done) => {
                let _ = done.send(());
            }
            Command::Stop => break,
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "unknown panic"
    }
}
