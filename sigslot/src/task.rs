mod join;

pub use join::*;

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};
use std::task::{Context, Poll, Waker};

use futures::FutureExt;
use futures::future::BoxFuture;
use futures::task::ArcWake;

use crate::error::{BoxError, Failure, TaskError};
use crate::signal::Signal;

/// Lifecycle of a [`Task`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    /// Constructed, computation not begun
    Created,
    /// Waiting for a wake, typically an awaited signal
    Suspended,
    /// Being polled
    Running,
    Completed,
    Failed,
}

impl TaskState {
    pub fn is_terminal(self) -> bool { matches!(self, Self::Completed | Self::Failed) }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Created => "created",
            Self::Suspended => "suspended",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// A suspendable computation with a single eventual result, driven by signal emissions.
///
/// A task is its own executor. Polling happens in [`start`](Task::start) and then synchronously inside
/// whatever call wakes it, usually the `emit` of a signal the body is awaiting. There is no scheduler
/// thread.
///
/// Errors returned by the body and panics inside it are captured at the task boundary and re-raised
/// when the result is read; they never escape `start` or the emitting call.
///
/// Dropping a task that has not finished drops its computation: pending awaits are disconnected and the
/// rest of the body never runs. Keeping the task alive until it finishes is the caller's responsibility.
pub struct Task<T>(Arc<TaskInner<T>>);

type Outcome<T> = std::thread::Result<Result<T, BoxError>>;

pub(crate) struct TaskInner<T> {
    name: RwLock<Option<String>>,
    stage: Mutex<Stage<T>>,
    future: Mutex<Option<BoxFuture<'static, Outcome<T>>>>,
    waker: Waker,
    completed: Signal<()>,
    failed: Signal<Failure>,
}

enum Stage<T> {
    Created,
    // `notified` records a wake that arrived mid-poll, `abandoned` a drop of the task handle mid-poll
    Running { notified: bool, abandoned: bool },
    Suspended,
    Completed(Option<T>),
    Failed(Failure),
}

impl<T> Stage<T> {
    fn state(&self) -> TaskState {
        match self {
            Stage::Created => TaskState::Created,
            Stage::Running { .. } => TaskState::Running,
            Stage::Suspended => TaskState::Suspended,
            Stage::Completed(_) => TaskState::Completed,
            Stage::Failed(_) => TaskState::Failed,
        }
    }
}

/// Resumes the task it belongs to. Holds the task weakly, so a wake after the task is dropped does nothing.
struct Resume<T>(Weak<TaskInner<T>>);

impl<T: Send + 'static> ArcWake for Resume<T> {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        if let Some(task) = arc_self.0.upgrade() {
            task.resume();
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> { mutex.lock().unwrap_or_else(PoisonError::into_inner) }

impl<T: Send + 'static> Task<T> {
    /// Wraps a computation without running it. Call [`start`](Task::start) to begin.
    pub fn new<F, E>(future: F) -> Self
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
        E: Into<BoxError>,
    {
        let future: BoxFuture<'static, Outcome<T>> =
            AssertUnwindSafe(async move { future.await.map_err(Into::into) }).catch_unwind().boxed();
        Self(Arc::new_cyclic(|me| TaskInner {
            name: RwLock::new(None),
            stage: Mutex::new(Stage::Created),
            future: Mutex::new(Some(future)),
            waker: futures::task::waker(Arc::new(Resume(me.clone()))),
            completed: Signal::new(),
            failed: Signal::new(),
        }))
    }

    /// Wraps a computation and runs it until it first suspends or finishes.
    pub fn spawn<F, E>(future: F) -> Self
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
        E: Into<BoxError>,
    {
        let task = Self::new(future);
        let _ = task.0.begin(); // freshly created, cannot be in another state
        task
    }

    /// Begins the computation and runs it until it first suspends or finishes.
    ///
    /// Fails with [`TaskError::InvalidState`] unless the task is still [`Created`](TaskState::Created).
    /// A failure of the computation itself is not reported here but by [`get`](Task::get).
    pub fn start(&self) -> Result<(), TaskError> {
        self.0.begin().map_err(|found| TaskError::InvalidState { expected: TaskState::Created, found })
    }

    pub fn state(&self) -> TaskState { lock(&self.0.stage).state() }

    /// True while the computation has begun but not finished
    pub fn running(&self) -> bool { matches!(self.state(), TaskState::Running | TaskState::Suspended) }

    pub fn set_name(&self, name: impl Into<String>) {
        *self.0.name.write().unwrap_or_else(PoisonError::into_inner) = Some(name.into());
    }

    pub fn name(&self) -> Option<String> { self.0.name() }

    /// Fired exactly once when the task finishes, successfully or not
    pub fn completed(&self) -> &Signal<()> { &self.0.completed }

    /// Fired with the captured failure right before `completed` when the computation fails
    pub fn failed(&self) -> &Signal<Failure> { &self.0.failed }

    /// The captured failure, if the task failed
    pub fn failure(&self) -> Option<Failure> {
        match &*lock(&self.0.stage) {
            Stage::Failed(failure) => Some(failure.clone()),
            _ => None,
        }
    }

    /// Returns a clone of the result.
    ///
    /// Re-raises the captured failure as [`TaskError::Unhandled`] if the computation failed, and reports
    /// [`TaskError::InvalidState`] if it has not finished yet.
    pub fn get(&self) -> Result<T, TaskError>
    where T: Clone {
        match &*lock(&self.0.stage) {
            Stage::Completed(Some(value)) => Ok(value.clone()),
            Stage::Completed(None) => Err(TaskError::Taken),
            Stage::Failed(failure) => Err(TaskError::Unhandled(failure.clone())),
            stage => Err(TaskError::InvalidState { expected: TaskState::Completed, found: stage.state() }),
        }
    }

    /// Moves the result out. Later reads report [`TaskError::Taken`].
    pub fn take(&self) -> Result<T, TaskError> {
        match &mut *lock(&self.0.stage) {
            Stage::Completed(value) => value.take().ok_or(TaskError::Taken),
            Stage::Failed(failure) => Err(TaskError::Unhandled(failure.clone())),
            stage => Err(TaskError::InvalidState { expected: TaskState::Completed, found: stage.state() }),
        }
    }
}

impl<T: Send + 'static> TaskInner<T> {
    fn name(&self) -> Option<String> { self.name.read().unwrap_or_else(PoisonError::into_inner).clone() }

    /// Moves a created task to running and drives it. Reports the state found otherwise.
    fn begin(&self) -> Result<(), TaskState> {
        {
            let mut stage = lock(&self.stage);
            if !matches!(*stage, Stage::Created) {
                return Err(stage.state());
            }
            *stage = Stage::Running { notified: false, abandoned: false };
        }
        tracing::debug!(task = ?self.name(), "task started");
        self.drive();
        Ok(())
    }

    fn resume(&self) {
        {
            let mut stage = lock(&self.stage);
            match &mut *stage {
                Stage::Suspended => *stage = Stage::Running { notified: false, abandoned: false },
                Stage::Running { notified, .. } => {
                    *notified = true;
                    return;
                }
                _ => return,
            }
        }
        tracing::trace!(task = ?self.name(), "task resumed");
        self.drive();
    }

    /// Polls until the computation finishes or suspends with no wake pending. Only the caller that moved
    /// the stage to `Running` may call this.
    fn drive(&self) {
        let outcome = loop {
            let poll = {
                let mut future = lock(&self.future);
                let Some(future) = future.as_mut() else { return };
                future.as_mut().poll(&mut Context::from_waker(&self.waker))
            };
            if let Poll::Ready(outcome) = poll {
                break outcome;
            }

            let mut stage = lock(&self.stage);
            match &mut *stage {
                Stage::Running { abandoned: true, .. } => {
                    *stage = Stage::Suspended;
                    drop(stage);
                    lock(&self.future).take();
                    return;
                }
                Stage::Running { notified, .. } if *notified => *notified = false,
                _ => {
                    *stage = Stage::Suspended;
                    tracing::trace!(task = ?self.name(), "task suspended");
                    return;
                }
            }
        };

        lock(&self.future).take();
        self.finish(outcome);
    }

    fn finish(&self, outcome: Outcome<T>) {
        let failure = match outcome {
            Ok(Ok(value)) => {
                *lock(&self.stage) = Stage::Completed(Some(value));
                None
            }
            Ok(Err(error)) => Some(Failure::from_error(error)),
            Err(panic) => Some(Failure::from_panic(panic)),
        };

        match failure {
            None => tracing::debug!(task = ?self.name(), "task completed"),
            Some(failure) => {
                *lock(&self.stage) = Stage::Failed(failure.clone());
                tracing::warn!(task = ?self.name(), %failure, "task failed");
                self.failed.emit(failure);
            }
        }
        self.completed.emit(());
    }
}

impl<T> Drop for Task<T> {
    fn drop(&mut self) {
        if let Stage::Running { abandoned, .. } = &mut *lock(&self.0.stage) {
            // Being polled right now, possibly further up this very stack; the poller drops the computation.
            *abandoned = true;
            return;
        }
        if let Ok(mut future) = self.0.future.try_lock() {
            future.take();
        }
    }
}

impl<T> std::fmt::Debug for Task<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = self.0.name.read().unwrap_or_else(PoisonError::into_inner).clone();
        f.debug_struct("Task").field("name", &name).field("state", &lock(&self.0.stage).state()).finish()
    }
}
