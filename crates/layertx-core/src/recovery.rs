use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use tracing::warn;

use crate::error::Error;

/// Describe a panic payload.
///
/// `panic!` with a literal produces a `&str` payload and a formatted panic
/// produces a `String`; anything else is reported by type only.
#[must_use]
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Convert a caught panic payload into [`Error::Panicked`].
#[must_use]
pub fn panicked(payload: &(dyn Any + Send)) -> Error {
    let message = panic_message(payload);
    warn!(panic = %message, "recovered from panic");
    Error::Panicked { message }
}

/// Run `f`, turning a panic into [`Error::Panicked`] instead of unwinding
/// further.
///
/// # Errors
///
/// Returns whatever `f` returns, or [`Error::Panicked`] if it panicked.
pub fn recover<T, F>(f: F) -> Result<T, Error>
where
    F: FnOnce() -> Result<T, Error>,
{
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => Err(panicked(payload.as_ref())),
    }
}
