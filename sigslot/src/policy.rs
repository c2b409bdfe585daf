use std::cell::Cell;
use std::ops::{Deref, DerefMut};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// The mutual-exclusion capability that signals and slot registries are generic over.
///
/// Every registry critical section takes `lock()` first and holds the returned guard until it ends.
/// The state of each signal and each [`Slots`](crate::Slots) is always kept behind its own mutex, so
/// the policy decides how much is serialised *in addition* to the object itself: nothing more for
/// [`Local`], every registry in the process for [`Global`].
///
/// A policy is default-constructed for every object; a cloned signal gets a fresh one rather than
/// sharing the original's.
pub trait Policy: Default + Send + Sync + 'static {
    type Guard<'a>
    where Self: 'a;

    fn lock(&self) -> Self::Guard<'_>;
}

/// Per-object locking. Signals and receivers only contend with operations on the same object.
#[derive(Debug, Default, Clone, Copy)]
pub struct Local;

impl Policy for Local {
    type Guard<'a> = ();

    fn lock(&self) -> Self::Guard<'_> {}
}

/// One process-wide lock shared by every signal and receiver using this policy.
///
/// Re-entrant on the owning thread, since a signal's critical section nests the receiver's.
#[derive(Debug, Default, Clone, Copy)]
pub struct Global;

static GLOBAL: Mutex<()> = Mutex::new(());

thread_local! {
    static GLOBAL_DEPTH: Cell<usize> = const { Cell::new(0) };
}

pub struct GlobalGuard {
    _outermost: Option<MutexGuard<'static, ()>>,
}

impl Policy for Global {
    type Guard<'a> = GlobalGuard;

    fn lock(&self) -> GlobalGuard {
        let depth = GLOBAL_DEPTH.with(|depth| depth.replace(depth.get() + 1));
        let outermost = if depth == 0 { Some(GLOBAL.lock().unwrap_or_else(PoisonError::into_inner)) } else { None };
        GlobalGuard { _outermost: outermost }
    }
}

impl Drop for GlobalGuard {
    fn drop(&mut self) { GLOBAL_DEPTH.with(|depth| depth.set(depth.get() - 1)); }
}

/// State guarded by a policy plus its own mutex
pub(crate) struct Locked<P: Policy, T> {
    policy: P,
    state: Mutex<T>,
}

// Fields drop in declaration order: the object's mutex is released before the policy guard.
pub(crate) struct LockedGuard<'a, P: Policy, T> {
    state: MutexGuard<'a, T>,
    _policy: P::Guard<'a>,
}

impl<P: Policy, T> Locked<P, T> {
    pub fn new(state: T) -> Self { Self { policy: P::default(), state: Mutex::new(state) } }

    pub fn lock(&self) -> LockedGuard<'_, P, T> {
        let _policy = self.policy.lock();
        // No callback ever runs while this mutex is held, so a poisoned state is still consistent.
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        LockedGuard { state, _policy }
    }
}

impl<P: Policy, T> Deref for LockedGuard<'_, P, T> {
    type Target = T;
    fn deref(&self) -> &T { &self.state }
}

impl<P: Policy, T> DerefMut for LockedGuard<'_, P, T> {
    fn deref_mut(&mut self) -> &mut T { &mut self.state }
}
