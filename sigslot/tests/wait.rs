use sigslot::*;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio_test::{assert_pending, assert_ready, assert_ready_eq, task};
mod common;

#[test]
fn test_next_registers_on_first_poll() {
    let signal = Signal::<u32>::new();
    let mut next = task::spawn(signal.next());

    // Not listening until polled
    signal.emit(1);
    assert_eq!(signal.connection_count(), 0);

    assert_pending!(next.poll());
    assert_eq!(signal.connection_count(), 1);

    signal.emit(2);
    assert!(next.is_woken());
    assert_ready_eq!(next.poll(), 2);
    assert_eq!(signal.connection_count(), 0);
}

#[test]
fn test_dropped_next_disconnects() {
    let signal = Signal::<()>::new();
    let mut next = task::spawn(signal.next());
    assert_pending!(next.poll());
    assert_eq!(signal.connection_count(), 1);

    drop(next);
    assert_eq!(signal.connection_count(), 0);
    signal.emit(());
}

#[test]
fn test_next_on_latching_signal() {
    let signal = Signal::<&'static str>::latching();
    signal.emit("first");
    signal.emit("second");

    let mut next = task::spawn(signal.next());
    assert_ready_eq!(next.poll(), "second");
    assert_eq!(signal.connection_count(), 0);
}

#[test]
fn test_wait_value() {
    let signal = Signal::<u32>::new();
    let mut wait = task::spawn(signal.wait_value(3));
    assert_pending!(wait.poll());

    signal.emit(1);
    assert!(!wait.is_woken());
    assert_pending!(wait.poll());

    signal.emit(3);
    assert!(wait.is_woken());
    assert_ready!(wait.poll());
    assert_eq!(signal.connection_count(), 0);
}

#[test]
fn test_wait_for_keeps_first_match() {
    let signal = Signal::<(String, u32)>::new();
    let mut wait = task::spawn(signal.wait_for(|(name, _): &(String, u32)| name == "done"));
    assert_pending!(wait.poll());

    // Both match before the next poll; the first wins
    signal.emit(("working".to_string(), 1));
    signal.emit(("done".to_string(), 2));
    signal.emit(("done".to_string(), 3));
    assert_ready!(wait.poll());
}

#[test]
fn test_wait_for_option_output() {
    let signal = Signal::<u32>::new();
    let mut wait = task::spawn(signal.wait_for(|n: &u32| n.checked_sub(10)));
    assert_pending!(wait.poll());

    signal.emit(4);
    signal.emit(15);
    signal.emit(25);
    assert_ready_eq!(wait.poll(), 5);
}

#[test]
fn test_join_from_foreign_executor() {
    let gate = Arc::new(Signal::<u8>::new());
    let job = Task::spawn({
        let gate = gate.clone();
        async move { Ok::<_, Infallible>(gate.next().await + 1) }
    });

    let mut join = task::spawn(job.join());
    assert_pending!(join.poll());

    gate.emit(6);
    assert!(join.is_woken());
    let result = assert_ready!(join.poll());
    assert_eq!(result.unwrap(), 7);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_emit_from_another_thread_wakes_tokio_task() {
    let signal = Arc::new(Signal::<String>::new());
    let waiter = tokio::spawn({
        let signal = signal.clone();
        async move { signal.next().await }
    });

    while signal.connection_count() == 0 {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    let emitter = signal.clone();
    std::thread::spawn(move || emitter.emit("hello".to_string())).join().unwrap();
    assert_eq!(waiter.await.unwrap(), "hello");
    assert_eq!(signal.connection_count(), 0);
}

#[tokio::test]
async fn test_signal_driven_task_awaited_by_tokio() {
    let gate = Arc::new(Signal::<u32, Global>::new());
    let job = Arc::new(Task::spawn({
        let gate = gate.clone();
        async move {
            let a = gate.next().await;
            let b = gate.next().await;
            Ok::<_, Infallible>(a + b)
        }
    }));

    let joined = tokio::spawn({
        let job = job.clone();
        async move { job.join().await }
    });

    tokio::task::yield_now().await;
    gate.emit(2);
    gate.emit(3);
    assert_eq!(joined.await.unwrap().unwrap(), 5);
}
