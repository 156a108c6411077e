//! Shared building blocks for layertx.
//!
//! [`Context`] carries request-scoped values and a cancellation signal through
//! a call tree without threading them as separate parameters. [`Error`] is the
//! structured, multi-cause error every layer reports, and [`recover`] turns
//! panics into that error.

mod context;
mod error;
mod recovery;

pub use context::{CancelHandle, Context, ContextKey, Interruption};
pub use error::{BoxError, Error, ErrorKind, Report, Result};
pub use recovery::{panic_message, panicked, recover};
