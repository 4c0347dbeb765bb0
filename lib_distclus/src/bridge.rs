//! # Failure Bridge
//!
//! The single place where a panic is stopped before it unwinds into a foreign
//! frame. Every exported function runs its body through [`guard`] or
//! [`guard_with`]:
//!
//! - `Ok` becomes [`OC_SUCCESS`];
//! - `Err(e)` becomes `e.code()`, a positive application code;
//! - a panic becomes [`OC_ERR_INTERNAL`] and is logged, never re-raised.

#![forbid(unsafe_code)]

use std::any::Any;
use std::ffi::c_int;
use std::panic::{self, AssertUnwindSafe};

use crate::error::{OcError, OC_ERR_INTERNAL, OC_SUCCESS};

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}

/// Runs `f`, returning its value with a status code. On any failure the value
/// is `default`, so out-parameters are never left ambiguous.
pub fn guard_with<T, F>(operation: &str, default: T, f: F) -> (c_int, T)
where
    F: FnOnce() -> Result<T, OcError>,
{
    // Instances are only reached through `Arc` and guard their own state, so a
    // panic mid-call cannot leave anything the next call would misread.
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => (OC_SUCCESS, value),
        Ok(Err(e)) => {
            tracing::warn!(operation, code = e.code(), "{}", e);
            (e.code(), default)
        }
        Err(payload) => {
            tracing::error!(operation, "internal fault: {}", panic_message(payload.as_ref()));
            (OC_ERR_INTERNAL, default)
        }
    }
}

/// [`guard_with`] for calls that only report a status code.
pub fn guard<F>(operation: &str, f: F) -> c_int
where
    F: FnOnce() -> Result<(), OcError>,
{
    guard_with(operation, (), f).0
}
