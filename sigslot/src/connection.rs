use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use crate::policy::Policy;
use crate::slots::{Slots, SlotsId, SlotsInner};

/// The stored callable of a connection. Free closures, bound methods and channel senders all end up in this shape.
pub type Slot<A> = Arc<dyn Fn(A) + Send + Sync + 'static>;

/// Trait for types that can be connected to a signal as its slot.
pub trait IntoSlot<A> {
    fn into_slot(self) -> Slot<A>;
}

impl<F, A> IntoSlot<A> for F
where F: Fn(A) + Send + Sync + 'static
{
    fn into_slot(self) -> Slot<A> { Arc::new(self) }
}

// Already-shared slots keep their identity, which is how a cloned signal reuses a callable.
impl<A> IntoSlot<A> for Arc<dyn Fn(A) + Send + Sync + 'static> {
    fn into_slot(self) -> Slot<A> { self }
}

impl<A> IntoSlot<A> for std::sync::mpsc::Sender<A>
where A: Send + 'static
{
    fn into_slot(self) -> Slot<A> {
        Arc::new(move |value| {
            let _ = self.send(value); // receiver gone, nothing to deliver to
        })
    }
}

#[cfg(feature = "tokio")]
impl<A> IntoSlot<A> for tokio::sync::mpsc::UnboundedSender<A>
where A: Send + 'static
{
    fn into_slot(self) -> Slot<A> {
        Arc::new(move |value| {
            let _ = self.send(value); // receiver gone, nothing to deliver to
        })
    }
}

/// One (signal, receiver, slot) link. Owned exclusively by its signal.
pub(crate) struct Connection<A, P: Policy> {
    pub(crate) target_id: SlotsId,
    pub(crate) target: Weak<SlotsInner<P>>,
    slot: Slot<A>,
    once: bool,
    expired: AtomicBool,
}

impl<A, P: Policy> Connection<A, P> {
    pub fn new(target: &Slots<P>, slot: Slot<A>, once: bool) -> Self {
        Self { target_id: target.id(), target: target.downgrade(), slot, once, expired: AtomicBool::new(false) }
    }

    /// A fresh connection to the same receiver with the same slot, for a cloned signal
    pub fn duplicate(&self) -> Self {
        Self {
            target_id: self.target_id,
            target: self.target.clone(),
            slot: self.slot.clone(),
            once: self.once,
            expired: AtomicBool::new(false),
        }
    }

    pub fn is_once(&self) -> bool { self.once }

    pub fn is_expired(&self) -> bool { self.expired.load(Ordering::Acquire) }

    pub fn expire(&self) { self.expired.store(true, Ordering::Release); }

    /// Claims the right to invoke this connection in the current emission.
    ///
    /// A one-shot connection can be claimed exactly once, even by concurrent or nested emissions.
    fn claim(&self) -> bool {
        if self.once { !self.expired.swap(true, Ordering::AcqRel) } else { !self.is_expired() }
    }

    /// Invokes the slot unless the connection has expired. Returns whether it was invoked.
    pub fn invoke(&self, args: A) -> bool {
        if !self.claim() {
            return false;
        }
        (self.slot)(args);
        true
    }
}
