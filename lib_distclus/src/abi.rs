//! # Exported C surface
//!
//! The functions declared in `include/bind.h`. Each one decodes its raw
//! arguments, calls the process-wide [`Facade`] inside the failure bridge and
//! writes its out-parameters. Out-parameters are written on every return path
//! when non-null: the result on success, null and zero on failure.
//!
//! Buffers returned through out-parameters belong to the caller and must be
//! given back with [`oc_free_labels`] or [`oc_free_matrix`] with the same
//! dimensions.

#![warn(unsafe_op_in_unsafe_fn)]

use std::ffi::{c_char, c_int, CStr};
use std::ptr;

use static_init::dynamic;

use crate::bridge::{guard, guard_with};
use crate::config::load_config;
use crate::error::OcError;
use crate::facade::Facade;
use crate::logger::setup_logging;
use crate::marshal::{decode_matrix, encode_labels, encode_matrix, free_labels, free_matrix, FlatLabels, FlatMatrix};
use crate::registry::Descriptor;

#[dynamic(lazy)]
/// Every instance created through the C surface lives here.
static FACADE: Facade = Facade::default();

/// Borrows an optional configuration string; null means defaults.
///
/// # Safety
/// `conf` must be null or point to a NUL-terminated string valid for `'a`.
unsafe fn conf_arg<'a>(conf: *const c_char) -> Result<Option<&'a str>, OcError> {
    if conf.is_null() {
        return Ok(None);
    }
    // SAFETY: non-null; the caller vouches for termination and lifetime.
    let conf = unsafe { CStr::from_ptr(conf) };
    conf.to_str()
        .map(Some)
        .map_err(|e| OcError::InvalidArgument(format!("configuration is not UTF-8: {}", e)))
}

fn null_out(name: &str) -> OcError {
    OcError::InvalidArgument(format!("{} is a null pointer", name))
}

/// # Safety
/// `out` must be null or valid for a write of `T`.
unsafe fn write_out<T>(out: *mut T, value: T) {
    if !out.is_null() {
        // SAFETY: non-null; the caller vouches for validity.
        unsafe { out.write(value) }
    }
}

/// Installs logging from the boundary configuration. Optional; calling it
/// again leaves the first installation in place.
#[no_mangle]
pub extern "C" fn oc_init() -> c_int {
    guard("oc_init", || {
        let config = load_config();
        setup_logging(&config).map_err(|e| OcError::Logging(format!("{:#}", e)))?;
        Ok(())
    })
}

/// Creates an instance, seeds it with `l1` elements of dimension `l2` and
/// writes its descriptor to `descr` (0 on failure).
///
/// # Safety
/// `conf` must be null or a NUL-terminated string. When `l1 * l2 > 0`, `data`
/// must point to `l1 * l2` readable doubles. `descr` must be valid for writes.
#[no_mangle]
pub unsafe extern "C" fn oc_create(
    kind: c_int,
    space: c_int,
    conf: *const c_char,
    data: *const f64,
    l1: usize,
    l2: usize,
    initializer: c_int,
    descr: *mut c_int,
) -> c_int {
    let (code, value) = guard_with("oc_create", 0, || {
        if descr.is_null() {
            return Err(null_out("descr"));
        }
        // SAFETY: forwarded caller contract.
        let conf = unsafe { conf_arg(conf)? };
        // SAFETY: forwarded caller contract.
        let elemts = unsafe { decode_matrix(data, l1, l2)? };
        FACADE.create(kind, space, conf, elemts, initializer)
    });
    // SAFETY: forwarded caller contract.
    unsafe { write_out(descr, value) };
    code
}

/// Pushes `l1` elements of dimension `l2`. Failures are logged only.
///
/// # Safety
/// When `l1 * l2 > 0`, `data` must point to `l1 * l2` readable doubles.
#[no_mangle]
pub unsafe extern "C" fn oc_push(descr: Descriptor, data: *const f64, l1: usize, l2: usize) {
    guard("oc_push", || {
        // SAFETY: forwarded caller contract.
        let elemts = unsafe { decode_matrix(data, l1, l2)? };
        FACADE.push(descr, elemts)
    });
}

/// Runs the algorithm; with a non-zero `background` it returns once the
/// background run has started.
#[no_mangle]
pub extern "C" fn oc_run(descr: Descriptor, background: c_int) -> c_int {
    guard("oc_run", || FACADE.run(descr, background != 0))
}

/// Labels each of `l1` elements; on success `*labels` holds one label per
/// element owned by the caller. A zero dimension labels nothing.
///
/// # Safety
/// When `l1 * l2 > 0`, `data` must point to `l1 * l2` readable doubles.
/// `labels` and `n` must be valid for writes.
#[no_mangle]
pub unsafe extern "C" fn oc_predict(
    descr: Descriptor,
    data: *const f64,
    l1: usize,
    l2: usize,
    labels: *mut *mut i64,
    n: *mut usize,
) -> c_int {
    let empty = FlatLabels { data: ptr::null_mut(), len: 0 };
    let (code, flat) = guard_with("oc_predict", empty, || {
        if labels.is_null() {
            return Err(null_out("labels"));
        }
        if n.is_null() {
            return Err(null_out("n"));
        }
        // SAFETY: forwarded caller contract.
        let elemts = unsafe { decode_matrix(data, l1, l2)? };
        Ok(encode_labels(FACADE.predict(descr, &elemts)?))
    });
    // SAFETY: forwarded caller contract.
    unsafe {
        write_out(labels, flat.data);
        write_out(n, flat.len);
    }
    code
}

/// Writes the current centroids as a caller-owned `l1 x l2` matrix.
///
/// # Safety
/// `data`, `l1` and `l2` must be valid for writes.
#[no_mangle]
pub unsafe extern "C" fn oc_centroids(descr: Descriptor, data: *mut *mut f64, l1: *mut usize, l2: *mut usize) -> c_int {
    let empty = FlatMatrix { data: ptr::null_mut(), l1: 0, l2: 0 };
    let (code, flat) = guard_with("oc_centroids", empty, || {
        if data.is_null() || l1.is_null() || l2.is_null() {
            return Err(null_out("centroid out-parameter"));
        }
        Ok(encode_matrix(FACADE.centroids(descr)?)?)
    });
    // SAFETY: forwarded caller contract.
    unsafe {
        write_out(data, flat.data);
        write_out(l1, flat.l1);
        write_out(l2, flat.l2);
    }
    code
}

/// Writes one runtime figure to `value` (0 on failure).
///
/// # Safety
/// `value` must be valid for writes.
#[no_mangle]
pub unsafe extern "C" fn oc_runtime_figure(descr: Descriptor, figure: c_int, value: *mut f64) -> c_int {
    let (code, figure_value) = guard_with("oc_runtime_figure", 0.0, || {
        if value.is_null() {
            return Err(null_out("value"));
        }
        FACADE.runtime_figure(descr, figure)
    });
    // SAFETY: forwarded caller contract.
    unsafe { write_out(value, figure_value) };
    code
}

/// Replaces the configuration; a null `conf` restores the defaults.
///
/// # Safety
/// `conf` must be null or a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn oc_set_conf(descr: Descriptor, conf: *const c_char) -> c_int {
    guard("oc_set_conf", || {
        // SAFETY: forwarded caller contract.
        let conf = unsafe { conf_arg(conf)? };
        FACADE.set_conf(descr, conf)
    })
}

/// Switches the space; a null `conf` builds it from the current configuration.
///
/// # Safety
/// `conf` must be null or a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn oc_set_space(descr: Descriptor, space: c_int, conf: *const c_char) -> c_int {
    guard("oc_set_space", || {
        // SAFETY: forwarded caller contract.
        let conf = unsafe { conf_arg(conf)? };
        FACADE.set_space(descr, space, conf)
    })
}

/// Stops background work; the instance stays readable until [`oc_free`].
#[no_mangle]
pub extern "C" fn oc_close(descr: Descriptor) {
    guard("oc_close", || FACADE.close(descr));
}

/// Closes and releases the instance; its descriptor becomes unknown.
#[no_mangle]
pub extern "C" fn oc_free(descr: Descriptor) {
    guard("oc_free", || FACADE.release(descr));
}

/// Releases labels returned by [`oc_predict`].
///
/// # Safety
/// `labels` must be null or a pointer returned by [`oc_predict`] with the
/// same `n`, not released before.
#[no_mangle]
pub unsafe extern "C" fn oc_free_labels(labels: *mut i64, n: usize) {
    guard("oc_free_labels", || {
        // SAFETY: forwarded caller contract.
        unsafe { free_labels(labels, n) };
        Ok(())
    });
}

/// Releases a matrix returned by [`oc_centroids`].
///
/// # Safety
/// `data` must be null or a pointer returned by [`oc_centroids`] with the
/// same `l1` and `l2`, not released before.
#[no_mangle]
pub unsafe extern "C" fn oc_free_matrix(data: *mut f64, l1: usize, l2: usize) {
    guard("oc_free_matrix", || {
        // SAFETY: forwarded caller contract.
        unsafe { free_matrix(data, l1, l2) };
        Ok(())
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{OC_ERR_INTERNAL, OC_ERR_INVALID_ARGUMENT, OC_ERR_SHAPE, OC_ERR_UNKNOWN_DESCRIPTOR, OC_SUCCESS};
    use crate::facade::tests::PanickingOc;
    use std::ffi::CString;
    use std::sync::Arc;

    #[test]
    fn test_create_predict_free_through_the_surface() {
        let data = [1.0, 1.0, 1.1, 1.0, 9.0, 9.0, 9.1, 9.0];
        let conf = CString::new(r#"{"k": 2, "seed": 3}"#).unwrap();
        let mut descr = -7;
        let code = unsafe { oc_create(0, 0, conf.as_ptr(), data.as_ptr(), 4, 2, 2, &mut descr) };
        assert_eq!(code, OC_SUCCESS);
        assert!(descr >= 1);
        assert_eq!(oc_run(descr, 0), OC_SUCCESS);

        let mut labels: *mut i64 = ptr::null_mut();
        let mut n = 0usize;
        let code = unsafe { oc_predict(descr, data.as_ptr(), 4, 2, &mut labels, &mut n) };
        assert_eq!(code, OC_SUCCESS);
        assert_eq!(n, 4);
        let got = unsafe { std::slice::from_raw_parts(labels, n) }.to_vec();
        assert_eq!(got[0], got[1]);
        assert_eq!(got[2], got[3]);
        assert_ne!(got[0], got[2]);
        unsafe { oc_free_labels(labels, n) };

        oc_free(descr);
        let mut value = 1.0;
        assert_eq!(unsafe { oc_runtime_figure(descr, 0, &mut value) }, OC_ERR_UNKNOWN_DESCRIPTOR);
        assert_eq!(value, 0.0);
    }

    #[test]
    fn test_failed_calls_write_empty_out_parameters() {
        let mut data: *mut f64 = 0x10 as *mut f64;
        let (mut l1, mut l2) = (9usize, 9usize);
        let code = unsafe { oc_centroids(i32::MAX, &mut data, &mut l1, &mut l2) };
        assert_eq!(code, OC_ERR_UNKNOWN_DESCRIPTOR);
        assert!(data.is_null());
        assert_eq!((l1, l2), (0, 0));

        let mut descr = 5;
        let code = unsafe { oc_create(0, 0, ptr::null(), ptr::null(), 2, 2, 0, &mut descr) };
        assert_eq!(code, OC_ERR_SHAPE);
        assert_eq!(descr, 0);
    }

    #[test]
    fn test_null_out_parameters_are_rejected() {
        let code = unsafe { oc_create(0, 0, ptr::null(), ptr::null(), 0, 0, 0, ptr::null_mut()) };
        assert_eq!(code, OC_ERR_INVALID_ARGUMENT);
        let mut n = 3usize;
        let code = unsafe { oc_predict(1, ptr::null(), 0, 0, ptr::null_mut(), &mut n) };
        assert_eq!(code, OC_ERR_INVALID_ARGUMENT);
        assert_eq!(n, 0);
    }

    #[test]
    fn test_conf_must_be_utf8() {
        let bad = [0xffu8 as c_char, 0];
        let mut descr = 0;
        let code = unsafe { oc_create(0, 0, bad.as_ptr(), ptr::null(), 0, 0, 0, &mut descr) };
        assert_eq!(code, OC_ERR_INVALID_ARGUMENT);
    }

    #[test]
    fn test_zero_dimension_predict_labels_nothing() {
        let data = [1.0, 1.0, 9.0, 9.0];
        let conf = CString::new(r#"{"k": 2, "seed": 3}"#).unwrap();
        let mut descr = 0;
        let code = unsafe { oc_create(0, 0, conf.as_ptr(), data.as_ptr(), 2, 2, 2, &mut descr) };
        assert_eq!(code, OC_SUCCESS);
        assert_eq!(oc_run(descr, 0), OC_SUCCESS);

        let mut labels: *mut i64 = 0x10 as *mut i64;
        let mut n = 7usize;
        let code = unsafe { oc_predict(descr, ptr::null(), 1 << 40, 0, &mut labels, &mut n) };
        assert_eq!(code, OC_SUCCESS);
        assert!(labels.is_null());
        assert_eq!(n, 0);
        oc_free(descr);
    }

    #[test]
    fn test_panic_during_predict_writes_empty_labels() {
        let descr = FACADE.registry().register(Arc::new(PanickingOc)).unwrap();
        let data = [1.0];
        let mut labels: *mut i64 = 0x10 as *mut i64;
        let mut n = 7usize;
        let code = unsafe { oc_predict(descr, data.as_ptr(), 1, 1, &mut labels, &mut n) };
        assert_eq!(code, OC_ERR_INTERNAL);
        assert!(labels.is_null());
        assert_eq!(n, 0);

        // the descriptor survives the caught panic and can still be released
        oc_free(descr);
        let mut value = 1.0;
        assert_eq!(unsafe { oc_runtime_figure(descr, 0, &mut value) }, OC_ERR_UNKNOWN_DESCRIPTOR);
    }

    #[test]
    fn test_free_functions_accept_null() {
        unsafe {
            oc_free_labels(ptr::null_mut(), 0);
            oc_free_matrix(ptr::null_mut(), 0, 0);
        }
        oc_close(-1);
        oc_free(-1);
    }
}
