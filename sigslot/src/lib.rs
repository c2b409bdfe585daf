/*!
Thread-safe signals and slots with mutual lifetime tracking, plus tasks that suspend until a signal fires.

# Design requirements:
- A signal and a receiver may be dropped in any order, on any thread, even mid-emission; a signal never
  keeps a connection to a receiver that is gone.
- Signals own their connections. Receivers only observe which signals point at them.
- Emission is synchronous, in connection order, and tolerates slots that connect, disconnect or emit.
- The locking scope is a type parameter ([`Local`] per object by default, or [`Global`]).

# Nomenclature:
- `Signal<A>` - the emitter; `A` is the argument list (`()`, a type, or a tuple)
- `Slots` - the receiver-side registry; embed it and implement [`HasSlots`] to make a type connectable
- connection - one (signal, receiver, slot) link, optionally one-shot
- `Task` - a computation that suspends on `signal.next().await` and resumes inside the satisfying `emit`

# Basic usage

```rust
use sigslot::*;
use std::sync::Arc;

struct Sink {
    slots: Slots,
}

impl HasSlots for Sink {
    fn slots(&self) -> &Slots { &self.slots }
}

impl Sink {
    fn on_toggle(&self, on: bool) { println!("toggled: {on}"); }
}

let toggled = Signal::<bool>::new();
{
    let sink = Arc::new(Sink { slots: Slots::new() });
    toggled.connect_method(&sink, Sink::on_toggle);
    toggled.connect(&*sink, |on| println!("closure saw {on}"));
    toggled.emit(true);
    assert_eq!(toggled.connection_count(), 2);
}
// The sink is gone, and so are its connections
assert_eq!(toggled.connection_count(), 0);
toggled.emit(false);
```

# Task usage

```rust
use sigslot::*;
use std::{convert::Infallible, sync::Arc};

let tick = Arc::new(Signal::<()>::new());
let tock = Arc::new(Signal::<i32>::new());

let task = Task::spawn({
    let (tick, tock) = (tick.clone(), tock.clone());
    async move {
        tick.next().await; // suspends, control returns to the caller of spawn
        let x = tock.next().await;
        Ok::<_, Infallible>(x)
    }
});

assert!(task.running());
tick.emit(()); // resumes the task right here, until it awaits tock
tock.emit(42);
assert!(!task.running());
assert_eq!(task.get().unwrap(), 42);
```
*/

mod connection;
pub mod error;
mod policy;
mod porcelain;
mod signal;
mod slots;
mod task;

pub use connection::{IntoSlot, Slot};
pub use error::*;
pub use policy::*;
pub use porcelain::*;
pub use signal::{Signal, SignalId};
pub use slots::{HasSlots, Slots, SlotsId};
pub use task::*;
