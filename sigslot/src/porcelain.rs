pub mod wait;

pub use wait::{Next, WaitFor, WaitResult};
