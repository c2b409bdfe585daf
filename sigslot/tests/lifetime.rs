use sigslot::*;
use std::sync::{Arc, Mutex};
mod common;
use common::Sink;

#[test]
fn test_receiver_dropped_first() {
    let signal = Signal::<u32>::new();
    let sink = Arc::new(Sink::default());
    signal.connect_method(&sink, Sink::on_value);
    assert!(signal.is_connected(&*sink));

    let weak = Arc::downgrade(&sink);
    drop(sink);
    assert!(weak.upgrade().is_none());
    assert_eq!(signal.connection_count(), 0);

    // Nothing left to call
    signal.emit(1);
}

#[test]
fn test_signal_dropped_first() {
    let sink = Sink::default();
    let a = Signal::<u32>::new();
    let b = Signal::<u32>::new();
    a.connect(&sink, |_| {});
    b.connect(&sink, |_| {});
    assert_eq!(sink.slots().sender_count(), 2);

    drop(a);
    assert_eq!(sink.slots().sender_count(), 1);
    assert!(sink.slots().is_tracking(b.id()));

    drop(b);
    assert_eq!(sink.slots().sender_count(), 0);
}

#[test]
fn test_receiver_disconnect_all() {
    let slots = Slots::new();
    let a = Signal::<()>::new();
    let b = Signal::<String>::new();
    a.connect(&slots, |_| {});
    a.connect_once(&slots, |_| {});
    b.connect(&slots, |_| {});

    slots.disconnect_all();
    assert_eq!(slots.sender_count(), 0);
    assert_eq!(a.connection_count(), 0);
    assert_eq!(b.connection_count(), 0);

    // The receiver stays usable
    a.connect(&slots, |_| {});
    assert!(a.is_connected(&slots));
}

#[test]
fn test_clone_duplicates_connections() {
    let original = Signal::<u32>::new();
    let r1 = Arc::new(Sink::default());
    let r2 = Arc::new(Sink::default());
    original.connect_method(&r1, Sink::on_value);
    original.connect_method(&r2, Sink::on_value);

    let copy = original.clone();
    assert_ne!(copy.id(), original.id());
    assert_eq!(copy.connection_count(), 2);
    assert_eq!(r1.slots().sender_count(), 2);
    assert!(r1.slots().is_tracking(copy.id()));

    // The copy's links are independent of the original's
    original.disconnect(&*r1);
    assert!(!original.is_connected(&*r1));
    assert!(copy.is_connected(&*r1));
    assert!(r1.slots().is_tracking(copy.id()));
    assert!(!r1.slots().is_tracking(original.id()));

    copy.emit(5);
    assert_eq!(r1.seen(), ["5"]);
    assert_eq!(r2.seen(), ["5"]);

    drop(copy);
    assert_eq!(r1.slots().sender_count(), 0);
    assert_eq!(r2.slots().sender_count(), 1);
    assert!(r2.slots().is_tracking(original.id()));
}

#[test]
fn test_clone_skips_fired_one_shots() {
    let original = Signal::<()>::new();
    let slots = Slots::new();
    original.connect_once(&slots, |_| {});
    original.emit(());

    let copy = original.clone();
    assert_eq!(copy.connection_count(), 0);
    assert!(!slots.is_tracking(copy.id()));
}

#[test]
fn test_receiver_dropped_during_emission() {
    let signal = Signal::<u32>::new();
    let first = Slots::new();
    let sink = Arc::new(Sink::default());
    let holder = Arc::new(Mutex::new(Some(sink.clone())));

    // The first slot releases the last strong reference to the second receiver
    signal.connect(&first, {
        let holder = holder.clone();
        move |_| {
            holder.lock().unwrap().take();
        }
    });
    signal.connect_method(&sink, Sink::on_value);
    let weak = Arc::downgrade(&sink);
    drop(sink);

    signal.emit(1);
    assert!(weak.upgrade().is_none());
    assert_eq!(signal.connection_count(), 1);
    assert!(first.is_tracking(signal.id()));
}

#[test]
fn test_signal_dropped_during_emission() {
    let holder: Arc<Mutex<Option<Signal<u32>>>> = Default::default();
    let slots = Slots::new();
    let (tx, rx) = std::sync::mpsc::channel();

    let signal = Signal::<u32>::new();
    signal.connect(&slots, {
        let holder = holder.clone();
        move |_| {
            // Drops a clone of the emitting signal, which must leave the emitting one intact
            holder.lock().unwrap().take();
        }
    });
    signal.connect_slot(&slots, tx);
    *holder.lock().unwrap() = Some(signal.clone());
    assert_eq!(slots.sender_count(), 2);

    signal.emit(8);
    assert_eq!(rx.try_iter().collect::<Vec<_>>(), [8]);
    assert_eq!(slots.sender_count(), 1);
    assert_eq!(signal.connection_count(), 2);
}
