//! Background threads that keep decoder work off the interactive thread.
//!
//! - [`task::ComputationWorker`] runs one replaceable task at a time.
//! - [`provider::IndexedProvider`] drains a FIFO of indices into a shared map.

pub mod provider;
pub mod task;

pub use provider::{IndexedProvider, ProviderContext};
pub use task::{ComputationWorker, TaskCompletion, WorkerJob, WorkerState};

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use crate::error::{Result, ScrublineError};

/// Run `f`, turning a panic into [`ScrublineError::WorkerPanicked`].
pub(crate) fn run_guarded<T>(f: impl FnOnce() -> Result<T>) -> Result<T> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => Err(ScrublineError::WorkerPanicked {
            message: panic_message(payload.as_ref()),
        }),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}
