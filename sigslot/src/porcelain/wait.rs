use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll, Waker};

use crate::policy::Policy;
use crate::signal::Signal;
use crate::slots::Slots;

/// Helper trait for `wait_for` to allow flexible predicate return types.
///
/// ## Semantics
/// - `result()` returns `Some(output)` to stop waiting and return `output`
/// - `result()` returns `None` to continue waiting for the next emission
pub trait WaitResult {
    type Output;
    /// Returns Some(output) if we should stop waiting, None if we should continue
    fn result(self) -> Option<Self::Output>;
}

// true = stop with (), false = continue waiting
impl WaitResult for bool {
    type Output = ();
    fn result(self) -> Option<Self::Output> { if self { Some(()) } else { None } }
}

// Some(value) = stop with value, None = continue waiting
impl<T> WaitResult for Option<T> {
    type Output = T;
    fn result(self) -> Option<Self::Output> { self }
}

struct Resolution<T> {
    value: Option<T>,
    waker: Option<Waker>,
}

/// A transient receiver that exists for the duration of one suspension.
///
/// Dropping it disconnects it, so an abandoned wait never resumes anything.
pub(crate) struct Waiter<T, P: Policy> {
    _slots: Slots<P>,
    resolution: Arc<Mutex<Resolution<T>>>,
}

impl<T, P> Waiter<T, P>
where
    T: Send + 'static,
    P: Policy,
{
    /// Connects to `signal`. The wait is over at the first emission `resolve` maps to `Some`.
    pub fn connect<A, F>(signal: &Signal<A, P>, once: bool, waker: &Waker, resolve: F) -> Self
    where
        A: Clone + Send + 'static,
        F: Fn(A) -> Option<T> + Send + Sync + 'static,
    {
        let slots = Slots::new();
        let resolution = Arc::new(Mutex::new(Resolution { value: None, waker: Some(waker.clone()) }));
        let slot = {
            let resolution = resolution.clone();
            move |args: A| {
                let waker = {
                    let mut resolution = resolution.lock().unwrap_or_else(PoisonError::into_inner);
                    if resolution.value.is_some() {
                        return;
                    }
                    let Some(value) = resolve(args) else { return };
                    resolution.value = Some(value);
                    resolution.waker.take()
                };
                // Woken outside the lock: a task waker resumes its computation right here.
                if let Some(waker) = waker {
                    waker.wake();
                }
            }
        };
        if once { signal.connect_once(&slots, slot) } else { signal.connect(&slots, slot) }
        Self { _slots: slots, resolution }
    }

    pub fn poll_resolved(&self, waker: &Waker) -> Poll<T> {
        let mut resolution = self.resolution.lock().unwrap_or_else(PoisonError::into_inner);
        match resolution.value.take() {
            Some(value) => Poll::Ready(value),
            None => {
                resolution.waker = Some(waker.clone());
                Poll::Pending
            }
        }
    }
}

/// Future returned by [`Signal::next`]: resolves with the arguments of the next emission.
#[must_use = "futures do nothing unless awaited"]
pub struct Next<'a, A, P: Policy> {
    signal: &'a Signal<A, P>,
    waiter: Option<Waiter<A, P>>,
}

impl<A, P> Future for Next<'_, A, P>
where
    A: Clone + Send + 'static,
    P: Policy,
{
    type Output = A;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<A> {
        let this = self.get_mut();
        match &this.waiter {
            None => {
                if let Some(value) = this.signal.latest() {
                    return Poll::Ready(value);
                }
                this.waiter = Some(Waiter::connect(this.signal, true, cx.waker(), Some));
                Poll::Pending
            }
            Some(waiter) => {
                let poll = waiter.poll_resolved(cx.waker());
                if poll.is_ready() {
                    this.waiter = None;
                }
                poll
            }
        }
    }
}

/// Future returned by [`Signal::wait_for`]
#[must_use = "futures do nothing unless awaited"]
pub struct WaitFor<'a, A, P: Policy, F, R: WaitResult> {
    signal: &'a Signal<A, P>,
    predicate: Option<F>,
    waiter: Option<Waiter<R::Output, P>>,
}

// The predicate is never pinned; it is moved into the slot on first poll.
impl<A, P: Policy, F, R: WaitResult> Unpin for WaitFor<'_, A, P, F, R> {}

impl<A, P, F, R> Future for WaitFor<'_, A, P, F, R>
where
    A: Clone + Send + 'static,
    P: Policy,
    F: Fn(&A) -> R + Send + Sync + 'static,
    R: WaitResult,
    R::Output: Send + 'static,
{
    type Output = R::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<R::Output> {
        let this = self.get_mut();
        if let Some(predicate) = this.predicate.take() {
            if let Some(output) = this.signal.latest().and_then(|value| predicate(&value).result()) {
                return Poll::Ready(output);
            }
            // Stays connected across emissions so none is missed between polls.
            let waiter = Waiter::connect(this.signal, false, cx.waker(), move |value: A| predicate(&value).result());
            this.waiter = Some(waiter);
            return Poll::Pending;
        }
        match &this.waiter {
            Some(waiter) => {
                let poll = waiter.poll_resolved(cx.waker());
                if poll.is_ready() {
                    this.waiter = None;
                }
                poll
            }
            None => Poll::Pending,
        }
    }
}

impl<A, P> Signal<A, P>
where
    A: Clone + Send + 'static,
    P: Policy,
{
    /// Waits for the next emission and resolves with its arguments.
    ///
    /// Only emissions after the first poll count, unless the signal is [latching](Signal::latching) and
    /// has already emitted.
    pub fn next(&self) -> Next<'_, A, P> { Next { signal: self, waiter: None } }

    /// Waits for the first emission matching the given predicate
    pub fn wait_for<F, R>(&self, predicate: F) -> WaitFor<'_, A, P, F, R>
    where
        F: Fn(&A) -> R + Send + Sync + 'static,
        R: WaitResult,
    {
        WaitFor { signal: self, predicate: Some(predicate), waiter: None }
    }

    /// Waits for an emission equal to `target`
    pub fn wait_value(&self, target: A) -> impl Future<Output = ()> + Send + '_
    where A: PartialEq + Sync {
        self.wait_for(move |value: &A| *value == target)
    }
}

impl<'a, A, P> IntoFuture for &'a Signal<A, P>
where
    A: Clone + Send + 'static,
    P: Policy,
{
    type Output = A;
    type IntoFuture = Next<'a, A, P>;

    fn into_future(self) -> Next<'a, A, P> { self.next() }
}
