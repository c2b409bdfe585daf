use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use sigslot::{HasSlots, Policy, Slots};
use tracing::Level;

// Initialize tracing for tests
#[ctor::ctor]
fn init_tracing() { let _ = tracing_subscriber::fmt().with_max_level(Level::INFO).with_test_writer().try_init(); }

#[allow(unused)]
pub fn change_watcher<T: Send + 'static>() -> (Arc<dyn Fn(T) + Send + Sync>, Box<dyn Fn() -> Vec<T> + Send + Sync>) {
    let changes = Arc::new(Mutex::new(Vec::new()));
    let watcher: Arc<dyn Fn(T) + Send + Sync> = {
        let changes = changes.clone();
        Arc::new(move |value: T| {
            changes.lock().unwrap().push(value);
        })
    };

    let check = Box::new(move || {
        let changes: Vec<T> = changes.lock().unwrap().drain(..).collect();
        changes
    });

    (watcher, check)
}

/// A receiver that records what its methods were called with
#[allow(unused)]
#[derive(Default)]
pub struct Sink {
    slots: Slots,
    seen: Mutex<Vec<String>>,
}

impl HasSlots for Sink {
    fn slots(&self) -> &Slots { &self.slots }
}

#[allow(unused)]
impl Sink {
    pub fn record(&self, entry: impl Into<String>) { self.seen.lock().unwrap().push(entry.into()); }

    pub fn on_value(&self, value: u32) { self.record(value.to_string()); }

    pub fn seen(&self) -> Vec<String> { self.seen.lock().unwrap().clone() }
}

/// A receiver that knows whether it is still alive, generic over the locking policy
#[allow(unused)]
pub struct Counter<P: Policy> {
    slots: Slots<P>,
    alive: AtomicBool,
    pub hits: AtomicU64,
}

impl<P: Policy> Default for Counter<P> {
    fn default() -> Self { Self { slots: Slots::new(), alive: AtomicBool::new(true), hits: AtomicU64::new(0) } }
}

impl<P: Policy> HasSlots<P> for Counter<P> {
    fn slots(&self) -> &Slots<P> { &self.slots }
}

#[allow(unused)]
impl<P: Policy> Counter<P> {
    pub fn hit(&self, n: u64) {
        assert!(self.alive.load(Ordering::SeqCst), "slot invoked on a dropped receiver");
        self.hits.fetch_add(n, Ordering::SeqCst);
    }
}

impl<P: Policy> Drop for Counter<P> {
    fn drop(&mut self) { self.alive.store(false, Ordering::SeqCst); }
}
