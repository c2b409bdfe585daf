//! Error types for tasks.
//!
//! The signal registry itself never fails; only task lifecycle misuse and failures raised by a task's
//! computation are reported.

use std::sync::Arc;

use thiserror::Error;

use crate::task::TaskState;

/// Anything a task body may fail with: `anyhow::Error`, `thiserror` enums, boxed errors.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Clone, Error)]
pub enum TaskError {
    /// The operation needs the task in a different state
    #[error("task is {found}, expected {expected}")]
    InvalidState { expected: TaskState, found: TaskState },

    /// The result of a completed task was already moved out by `take`
    #[error("task result was already taken")]
    Taken,

    /// The computation failed; re-raised every time the result is read
    #[error("unhandled failure in task: {0}")]
    Unhandled(Failure),
}

impl TaskError {
    /// The captured failure, if this error re-raises one
    pub fn failure(&self) -> Option<&Failure> {
        match self {
            Self::Unhandled(failure) => Some(failure),
            _ => None,
        }
    }
}

/// A failure captured at the task boundary
#[derive(Debug, Clone, Error)]
pub enum Failure {
    /// The body returned an error
    #[error("{0}")]
    Error(Arc<dyn std::error::Error + Send + Sync + 'static>),

    /// The body panicked
    #[error("panicked: {0}")]
    Panic(String),
}

impl Failure {
    pub(crate) fn from_error(error: BoxError) -> Self { Self::Error(Arc::from(error)) }

    pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = match payload.downcast::<String>() {
            Ok(message) => *message,
            Err(payload) => match payload.downcast::<&'static str>() {
                Ok(message) => (*message).to_string(),
                Err(_) => "<non-string panic payload>".to_string(),
            },
        };
        Self::Panic(message)
    }

    pub fn is_panic(&self) -> bool { matches!(self, Self::Panic(_)) }

    /// Downcasts the error the body returned
    pub fn downcast_ref<E: std::error::Error + 'static>(&self) -> Option<&E> {
        match self {
            Self::Error(error) => error.downcast_ref::<E>(),
            Self::Panic(_) => None,
        }
    }
}
