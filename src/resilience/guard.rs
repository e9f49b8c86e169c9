use crate::error::EncodeError;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Runs one encode step, turning a panic inside the model into an `EncodeError`
/// so a single bad batch cannot take the worker down.
pub fn catch_encode_panic<T, F>(f: F) -> Result<T, EncodeError>
where
    F: FnOnce() -> Result<T, EncodeError>,
{
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => Err(EncodeError::Panicked(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
