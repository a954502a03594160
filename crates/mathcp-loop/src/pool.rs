//! Offload bridge: runs CPU-bound jobs outside the loop.
//!
//! [`Pool`] owns a tokio runtime whose blocking-thread pool executes
//! submitted jobs. Each submission produces a [`Task`], a unit that
//! polls the job's oneshot result without ever waiting on it and, once
//! the result is in, fires exactly one callback and detaches.
//!
//! ```text
//! Task:  Pending ──► Succeeded ──► Detached
//!              └───► Failed    ──┘
//! ```

use std::any::Any;
use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use std::thread;

use tokio::runtime::{Builder, Handle, Runtime};
use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;
use tracing::{debug, info};

use crate::error::{JobError, LoopResult};
use crate::unit::{Schedulable, UnitSlot};

/// Configuration for the worker pool.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum number of jobs executing at once.
    pub workers: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: thread::available_parallelism().map_or(1, |n| n.get()),
        }
    }
}

/// Submits jobs to the worker runtime and registers a [`Task`] per job
/// with the scheduler the pool is attached to.
///
/// Shared by every connection of a server; submissions all come from
/// the scheduling thread so the bridge itself needs no locking.
pub struct Pool {
    slot: UnitSlot,
    runtime: Option<Runtime>,
    handle: Handle,
    config: PoolConfig,
}

impl Pool {
    /// Start the worker runtime.
    pub fn new(config: PoolConfig) -> LoopResult<Self> {
        let workers = config.workers.max(1);
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(workers)
            .thread_name("mathcp-worker")
            .enable_all()
            .build()?;
        let handle = runtime.handle().clone();

        info!(workers, "worker pool started");
        Ok(Self {
            slot: UnitSlot::new(),
            runtime: Some(runtime),
            handle,
            config,
        })
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Handle to the worker runtime, for auxiliary async work such as
    /// signal watchers.
    pub fn runtime_handle(&self) -> &Handle {
        &self.handle
    }

    /// Dispatch `job` to a worker and return immediately.
    ///
    /// The returned task is already registered; it invokes `on_success`
    /// or `on_error` on the scheduling thread once the job completes.
    /// Errors returned by either callback propagate to the scheduler.
    pub fn submit<T, E, F, S, R>(
        &self,
        job: F,
        on_success: S,
        on_error: R,
    ) -> LoopResult<Rc<Task<T, E>>>
    where
        T: Send + 'static,
        E: Send + 'static,
        F: FnOnce() -> Result<T, E> + Send + 'static,
        S: FnOnce(T) -> anyhow::Result<()> + 'static,
        R: FnOnce(JobError<E>) -> anyhow::Result<()> + 'static,
    {
        let owner = self.slot.owner()?;
        let (tx, rx) = oneshot::channel();

        self.handle.spawn_blocking(move || {
            let outcome = match panic::catch_unwind(AssertUnwindSafe(job)) {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(e)) => Err(JobError::Failed(e)),
                Err(payload) => Err(JobError::Panicked(panic_message(payload.as_ref()))),
            };
            // The task may already be gone; nothing to report then.
            let _ = tx.send(outcome);
        });

        let task = Rc::new(Task::new(rx, on_success, on_error));
        let id = owner.register(task.clone())?;
        debug!(task = %id, "job submitted");
        Ok(task)
    }
}

impl Schedulable for Pool {
    fn slot(&self) -> &UnitSlot {
        &self.slot
    }

    /// The pool only needs to be reachable; tasks do the polling.
    fn step(&self) -> anyhow::Result<()> {
        Ok(())
    }

    fn label(&self) -> &'static str {
        "pool"
    }
}

impl Drop for Pool {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
            debug!("worker pool shut down");
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Observable state of a [`Task`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    Succeeded,
    Failed,
    Detached,
}

type Outcome<T, E> = Result<T, JobError<E>>;

struct Callbacks<T, E> {
    on_success: Box<dyn FnOnce(T) -> anyhow::Result<()>>,
    on_error: Box<dyn FnOnce(JobError<E>) -> anyhow::Result<()>>,
}

enum TaskState<T, E> {
    Pending {
        result: oneshot::Receiver<Outcome<T, E>>,
        callbacks: Callbacks<T, E>,
    },
    Succeeded,
    Failed,
    Detached,
}

/// A pending offloaded job, polled once per pass.
///
/// The callbacks are consumed when the result is taken, so neither can
/// run twice even if `step` is called again before detachment.
pub struct Task<T, E> {
    slot: UnitSlot,
    state: RefCell<TaskState<T, E>>,
}

impl<T, E> Task<T, E> {
    fn new<S, R>(result: oneshot::Receiver<Outcome<T, E>>, on_success: S, on_error: R) -> Self
    where
        S: FnOnce(T) -> anyhow::Result<()> + 'static,
        R: FnOnce(JobError<E>) -> anyhow::Result<()> + 'static,
    {
        Self {
            slot: UnitSlot::new(),
            state: RefCell::new(TaskState::Pending {
                result,
                callbacks: Callbacks {
                    on_success: Box::new(on_success),
                    on_error: Box::new(on_error),
                },
            }),
        }
    }

    pub fn status(&self) -> TaskStatus {
        match &*self.state.borrow() {
            TaskState::Pending { .. } => TaskStatus::Pending,
            TaskState::Succeeded => TaskStatus::Succeeded,
            TaskState::Failed => TaskStatus::Failed,
            TaskState::Detached => TaskStatus::Detached,
        }
    }

    /// Take the outcome if the job has finished, moving out of `Pending`.
    fn take_outcome(&self) -> Option<(Outcome<T, E>, Callbacks<T, E>)> {
        let mut state = self.state.borrow_mut();
        let TaskState::Pending { result, .. } = &mut *state else {
            return None;
        };

        let outcome = match result.try_recv() {
            Ok(outcome) => outcome,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Closed) => Err(JobError::Lost),
        };

        let next = if outcome.is_ok() {
            TaskState::Succeeded
        } else {
            TaskState::Failed
        };
        match std::mem::replace(&mut *state, next) {
            TaskState::Pending { callbacks, .. } => Some((outcome, callbacks)),
            _ => None,
        }
    }
}

impl<T: 'static, E: 'static> Schedulable for Task<T, E> {
    fn slot(&self) -> &UnitSlot {
        &self.slot
    }

    fn step(&self) -> anyhow::Result<()> {
        let Some((outcome, callbacks)) = self.take_outcome() else {
            return Ok(());
        };

        // The state borrow is released; callbacks may submit new jobs.
        let delivered = match outcome {
            Ok(value) => (callbacks.on_success)(value),
            Err(e) => (callbacks.on_error)(e),
        };

        *self.state.borrow_mut() = TaskState::Detached;
        self.slot.detach();
        delivered
    }

    fn label(&self) -> &'static str {
        "task"
    }
}
