use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::task::{Context, Poll};

use super::Task;
use crate::error::TaskError;
use crate::policy::Local;
use crate::porcelain::wait::Waiter;

/// Future returned by [`Task::join`]: resolves with the task's result once it has finished.
#[must_use = "futures do nothing unless awaited"]
pub struct Join<'a, T> {
    task: &'a Task<T>,
    waiter: Option<Waiter<(), Local>>,
}

impl<T> Future for Join<'_, T>
where T: Clone + Send + 'static
{
    type Output = Result<T, TaskError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        if this.task.state().is_terminal() {
            this.waiter = None;
            return Poll::Ready(this.task.get());
        }

        match &this.waiter {
            None => {
                this.waiter = Some(Waiter::connect(this.task.completed(), true, cx.waker(), Some));
                // The task may have finished between the check above and the connect.
                if this.task.state().is_terminal() {
                    this.waiter = None;
                    return Poll::Ready(this.task.get());
                }
                Poll::Pending
            }
            Some(waiter) => match waiter.poll_resolved(cx.waker()) {
                Poll::Ready(()) => {
                    this.waiter = None;
                    Poll::Ready(this.task.get())
                }
                Poll::Pending => Poll::Pending,
            },
        }
    }
}

impl<T> Task<T>
where T: Clone + Send + 'static
{
    /// Waits for this task to finish.
    ///
    /// Resolves immediately if it already has. A failure of this task resolves as
    /// [`TaskError::Unhandled`], so `?` in an awaiting task propagates it.
    pub fn join(&self) -> Join<'_, T> { Join { task: self, waiter: None } }
}

impl<'a, T> IntoFuture for &'a Task<T>
where T: Clone + Send + 'static
{
    type Output = Result<T, TaskError>;
    type IntoFuture = Join<'a, T>;

    fn into_future(self) -> Join<'a, T> { self.join() }
}
