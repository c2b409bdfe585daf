use std::sync::{Arc, Mutex, PoisonError, Weak};

use crate::connection::{Connection, IntoSlot, Slot};
use crate::policy::{Local, Locked, Policy};
use crate::slots::{HasSlots, Slots, SlotsId};

/// A unique identifier for a signal, usable for comparison but not for reaching the signal.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct SignalId(usize);

impl std::fmt::Display for SignalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { write!(f, "signal:{:x}", self.0) }
}

/// The untyped face of a signal that a receiver can notify on teardown
pub(crate) trait Sender: Send + Sync {
    /// Drops every connection targeting the given receiver
    fn slot_disconnect(&self, slots: SlotsId);
}

/// A typed broadcast point.
///
/// `A` is the argument list: `()` for a bare notification, a single type, or a tuple for several
/// arguments. Every connection is owned by the signal and cross-registered with its receiver; dropping
/// either side severs the link.
///
/// Emission is synchronous. Slots run on the emitting thread, in connection order, with no internal
/// lock held, so a slot may connect, disconnect, emit or drop receivers while it runs.
pub struct Signal<A, P: Policy = Local>(Arc<SignalInner<A, P>>);

pub(crate) struct SignalInner<A, P: Policy> {
    me: Weak<SignalInner<A, P>>,
    connections: Locked<P, Vec<Arc<Connection<A, P>>>>,
    latch: Option<Mutex<Option<A>>>,
}

impl<A, P> Default for Signal<A, P>
where
    A: Clone + Send + 'static,
    P: Policy,
{
    fn default() -> Self { Self::new() }
}

impl<A, P> Signal<A, P>
where
    A: Clone + Send + 'static,
    P: Policy,
{
    /// Creates a signal that does not remember past emissions
    pub fn new() -> Self { Self::build(None) }

    /// Creates a signal that keeps its most recent emission.
    ///
    /// Awaiting a latching signal that has already emitted resolves immediately with that value,
    /// instead of waiting for the next emission.
    pub fn latching() -> Self { Self::build(Some(Mutex::new(None))) }

    fn build(latch: Option<Mutex<Option<A>>>) -> Self {
        Self(Arc::new_cyclic(|me| SignalInner { me: me.clone(), connections: Locked::new(Vec::new()), latch }))
    }

    pub fn id(&self) -> SignalId { self.0.id() }

    pub fn is_latching(&self) -> bool { self.0.latch.is_some() }

    /// The most recent emission of a latching signal
    pub fn latest(&self) -> Option<A> {
        let latch = self.0.latch.as_ref()?;
        latch.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Connects a closure on behalf of `receiver`. It stays connected until either side disconnects or is dropped.
    ///
    /// An invocation already started by another thread may still run after the receiver is dropped, so the
    /// closure should not capture state that dies with the receiver. Use [`connect_method`](Signal::connect_method)
    /// to have such calls skipped.
    pub fn connect<R, F>(&self, receiver: &R, slot: F)
    where
        R: HasSlots<P> + ?Sized,
        F: Fn(A) + Send + Sync + 'static,
    {
        self.0.connect(receiver.slots(), Arc::new(slot), false);
    }

    /// Connects a closure that fires on the next emission only, then disconnects itself.
    pub fn connect_once<R, F>(&self, receiver: &R, slot: F)
    where
        R: HasSlots<P> + ?Sized,
        F: Fn(A) + Send + Sync + 'static,
    {
        self.0.connect(receiver.slots(), Arc::new(slot), true);
    }

    /// Connects anything convertible into a slot, such as a channel sender.
    pub fn connect_slot<R, S>(&self, receiver: &R, slot: S)
    where
        R: HasSlots<P> + ?Sized,
        S: IntoSlot<A>,
    {
        self.0.connect(receiver.slots(), slot.into_slot(), false);
    }

    /// Connects a method of `receiver`.
    ///
    /// Only a weak reference to the receiver is kept; an emission racing with the receiver's
    /// destruction skips the call rather than reviving it.
    pub fn connect_method<R, M>(&self, receiver: &Arc<R>, method: M)
    where
        R: HasSlots<P> + Send + Sync + 'static,
        M: Fn(&R, A) + Send + Sync + 'static,
    {
        self.0.connect(receiver.slots(), bind(receiver, method), false);
    }

    /// One-shot variant of [`connect_method`](Signal::connect_method)
    pub fn connect_method_once<R, M>(&self, receiver: &Arc<R>, method: M)
    where
        R: HasSlots<P> + Send + Sync + 'static,
        M: Fn(&R, A) + Send + Sync + 'static,
    {
        self.0.connect(receiver.slots(), bind(receiver, method), true);
    }

    /// Removes every connection to `receiver`. Not an error if there is none.
    pub fn disconnect<R>(&self, receiver: &R)
    where R: HasSlots<P> + ?Sized {
        self.0.disconnect(receiver.slots());
    }

    /// Removes every connection, notifying each receiver
    pub fn disconnect_all(&self) { self.0.disconnect_all(); }

    /// Invokes every live connection with a clone of `args`, in connection order.
    ///
    /// A slot that panics unwinds through `emit`; connections that expired before the panic are still reaped.
    pub fn emit(&self, args: A) { self.0.emit(args); }

    /// A callable that emits this signal
    pub fn as_fn(&self) -> impl Fn(A) + '_ { move |args| self.emit(args) }

    /// Number of live connections
    pub fn connection_count(&self) -> usize { self.0.connections.lock().iter().filter(|c| !c.is_expired()).count() }

    pub fn is_connected<R>(&self, receiver: &R) -> bool
    where R: HasSlots<P> + ?Sized {
        let id = receiver.slots().id();
        self.0.connections.lock().iter().any(|c| c.target_id == id && !c.is_expired())
    }
}

fn bind<R, A, M>(receiver: &Arc<R>, method: M) -> Slot<A>
where
    R: Send + Sync + 'static,
    M: Fn(&R, A) + Send + Sync + 'static,
{
    let receiver = Arc::downgrade(receiver);
    Arc::new(move |args| {
        if let Some(receiver) = receiver.upgrade() {
            method(&receiver, args);
        }
    })
}

impl<A, P> SignalInner<A, P>
where
    A: Clone + Send + 'static,
    P: Policy,
{
    fn id(&self) -> SignalId { SignalId(self.me.as_ptr() as usize) }

    fn sender(&self) -> Weak<dyn Sender> { self.me.clone() }

    fn connect(&self, target: &Slots<P>, slot: Slot<A>, once: bool) {
        let mut connections = self.connections.lock();
        connections.push(Arc::new(Connection::new(target, slot, once)));
        target.inner().notify_connect(self.id(), self.sender());
        tracing::debug!(signal = %self.id(), slots = %target.id(), once, "connected");
    }

    fn disconnect(&self, target: &Slots<P>) {
        let id = target.id();
        let mut removed = Vec::new();
        let mut connections = self.connections.lock();
        connections.retain(|connection| {
            if connection.target_id != id {
                return true;
            }
            connection.expire();
            removed.push(connection.clone());
            false
        });
        if !removed.is_empty() {
            target.inner().notify_disconnect(self.id());
            tracing::debug!(signal = %self.id(), slots = %id, removed = removed.len(), "disconnected");
        }
    }

    fn disconnect_all(&self) {
        let removed = release(self.id(), &self.connections);
        if !removed.is_empty() {
            tracing::debug!(signal = %self.id(), connections = removed.len(), "disconnected all receivers");
        }
    }

    fn emit(&self, args: A) {
        if let Some(latch) = &self.latch {
            *latch.lock().unwrap_or_else(PoisonError::into_inner) = Some(args.clone());
        }

        // Slots run against a snapshot with the lock released. Each connection re-checks its expiry right
        // before it is invoked, so one disconnected earlier in the same pass is skipped, and one connected
        // during the pass first fires on the next emission.
        let snapshot = self.connections.lock().clone();
        tracing::trace!(signal = %self.id(), connections = snapshot.len(), "emit");

        let mut reap = Reap { signal: self, pending: false };
        for connection in &snapshot {
            if connection.invoke(args.clone()) && connection.is_once() {
                reap.pending = true;
            }
        }
    }

    /// Removes expired connections and releases receivers left without any connection from this signal
    fn reap(&self) {
        let mut expired = Vec::new();
        let mut connections = self.connections.lock();
        connections.retain(|connection| {
            if !connection.is_expired() {
                return true;
            }
            expired.push(connection.clone());
            false
        });
        tracing::trace!(signal = %self.id(), reaped = expired.len(), "reaped expired connections");
        for connection in &expired {
            if connections.iter().any(|c| c.target_id == connection.target_id) {
                continue;
            }
            if let Some(target) = connection.target.upgrade() {
                target.notify_disconnect(self.id());
            }
        }
    }
}

/// Takes every connection out of a signal and tells their receivers, under the signal's lock.
///
/// The connections are handed back so they are dropped after the lock is released: a slot may own a
/// receiver of this very signal.
fn release<A, P: Policy>(signal: SignalId, connections: &Locked<P, Vec<Arc<Connection<A, P>>>>) -> Vec<Arc<Connection<A, P>>> {
    let mut connections = connections.lock();
    let removed = std::mem::take(&mut *connections);
    for connection in &removed {
        connection.expire();
        if let Some(target) = connection.target.upgrade() {
            target.notify_disconnect(signal);
        }
    }
    removed
}

struct Reap<'a, A, P>
where
    A: Clone + Send + 'static,
    P: Policy,
{
    signal: &'a SignalInner<A, P>,
    pending: bool,
}

// Runs on unwind too, so a panicking slot cannot leave fired one-shot connections registered.
impl<A, P> Drop for Reap<'_, A, P>
where
    A: Clone + Send + 'static,
    P: Policy,
{
    fn drop(&mut self) {
        if self.pending {
            self.signal.reap();
        }
    }
}

impl<A, P> Sender for SignalInner<A, P>
where
    A: Clone + Send + 'static,
    P: Policy,
{
    fn slot_disconnect(&self, slots: SlotsId) {
        let mut removed: Vec<Arc<Connection<A, P>>> = Vec::new();
        let mut connections = self.connections.lock();
        connections.retain(|connection| {
            if connection.target_id != slots {
                return true;
            }
            connection.expire();
            removed.push(connection.clone());
            false
        });
        // The receiver has usually dropped us already, but a connect racing its teardown may have re-registered.
        if let Some(target) = removed.first().and_then(|connection| connection.target.upgrade()) {
            target.notify_disconnect(self.id());
        }
    }
}

impl<A, P: Policy> Drop for Signal<A, P> {
    fn drop(&mut self) { release(SignalId(Arc::as_ptr(&self.0) as usize), &self.0.connections); }
}

/// Cloning a signal duplicates its live connections: same receivers and slots, independent links.
impl<A, P> Clone for Signal<A, P>
where
    A: Clone + Send + 'static,
    P: Policy,
{
    fn clone(&self) -> Self {
        let copy = if self.is_latching() { Self::build(Some(Mutex::new(self.latest()))) } else { Self::new() };
        {
            let source = self.0.connections.lock();
            let mut connections = copy.0.connections.lock();
            for connection in source.iter().filter(|c| !c.is_expired()) {
                // A receiver that no longer tracks this signal is being torn down; the copy must not adopt it.
                let Some(target) = connection.target.upgrade() else { continue };
                if target.notify_duplicate(self.id(), copy.id(), copy.0.sender()) {
                    connections.push(Arc::new(connection.duplicate()));
                }
            }
            tracing::debug!(signal = %self.id(), copy = %copy.id(), connections = connections.len(), "duplicated signal");
        }
        copy
    }
}

impl<A, P: Policy> std::fmt::Debug for Signal<A, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("id", &SignalId(Arc::as_ptr(&self.0) as usize))
            .field("connections", &self.0.connections.lock().len())
            .field("latching", &self.0.latch.is_some())
            .finish()
    }
}
