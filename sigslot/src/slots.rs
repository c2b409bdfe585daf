use std::collections::HashMap;
use std::sync::{Arc, Weak};

use crate::policy::{Local, Locked, Policy};
use crate::signal::{Sender, SignalId};

/// A unique identifier for a receiver's slot registry.
/// The allocation it is derived from stays reserved while any signal still holds a weak handle to it.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct SlotsId(usize);

impl std::fmt::Display for SlotsId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { write!(f, "slots:{:x}", self.0) }
}

/// The receiving half of the signal/slot contract.
///
/// `Slots` tracks every signal currently holding a connection to it. Dropping it (or calling
/// [`disconnect_all`](Slots::disconnect_all)) tells each of those signals to drop its connections, so
/// no signal ever invokes a slot on behalf of a receiver that no longer exists.
///
/// Teardown does not wait for emissions in flight on other threads. A slot another thread has already
/// started may still be running when `drop` returns. Methods connected with
/// [`Signal::connect_method`](crate::Signal::connect_method) hold the receiver weakly and are skipped once
/// it is gone; plain closures are not.
///
/// Embed it in a struct and implement [`HasSlots`] to make that struct connectable.
pub struct Slots<P: Policy = Local>(Arc<SlotsInner<P>>);

pub(crate) struct SlotsInner<P: Policy> {
    senders: Locked<P, HashMap<SignalId, Weak<dyn Sender>>>,
}

/// Opt-in capability for anything that can be the target of a connection.
pub trait HasSlots<P: Policy = Local> {
    fn slots(&self) -> &Slots<P>;
}

impl<P: Policy> HasSlots<P> for Slots<P> {
    fn slots(&self) -> &Slots<P> { self }
}

impl<P: Policy> Default for Slots<P> {
    fn default() -> Self { Self::new() }
}

impl<P: Policy> Slots<P> {
    pub fn new() -> Self { Self(Arc::new(SlotsInner { senders: Locked::new(HashMap::new()) })) }

    pub fn id(&self) -> SlotsId { SlotsId(Arc::as_ptr(&self.0) as usize) }

    /// Number of distinct signals holding at least one connection to this receiver
    pub fn sender_count(&self) -> usize { self.0.senders.lock().len() }

    /// Whether the signal with the given id is tracked as a sender
    pub fn is_tracking(&self, signal: SignalId) -> bool { self.0.senders.lock().contains_key(&signal) }

    /// Tells every tracked signal to drop its connections to this receiver.
    pub fn disconnect_all(&self) {
        // The receiver lock is never held while calling into a signal; signals lock themselves first.
        let senders: Vec<_> = self.0.senders.lock().drain().collect();
        if senders.is_empty() {
            return;
        }
        tracing::debug!(slots = %self.id(), senders = senders.len(), "disconnecting receiver from all signals");
        for (_, sender) in senders {
            if let Some(sender) = sender.upgrade() {
                sender.slot_disconnect(self.id());
            }
        }
    }

    pub(crate) fn inner(&self) -> &SlotsInner<P> { &self.0 }

    pub(crate) fn downgrade(&self) -> Weak<SlotsInner<P>> { Arc::downgrade(&self.0) }
}

impl<P: Policy> Drop for Slots<P> {
    fn drop(&mut self) { self.disconnect_all(); }
}

impl<P: Policy> std::fmt::Debug for Slots<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Slots").field("id", &self.id()).field("senders", &self.sender_count()).finish()
    }
}

// Only signals call these, always while holding their own lock.
impl<P: Policy> SlotsInner<P> {
    pub(crate) fn notify_connect(&self, signal: SignalId, sender: Weak<dyn Sender>) { self.senders.lock().insert(signal, sender); }

    pub(crate) fn notify_disconnect(&self, signal: SignalId) { self.senders.lock().remove(&signal); }

    /// A tracked signal was cloned; track the clone as well. Returns false if `old` is no longer tracked.
    pub(crate) fn notify_duplicate(&self, old: SignalId, new: SignalId, sender: Weak<dyn Sender>) -> bool {
        let mut senders = self.senders.lock();
        if !senders.contains_key(&old) {
            return false;
        }
        senders.insert(new, sender);
        true
    }
}
