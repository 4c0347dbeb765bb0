//! Shared fixtures for the integration tests and test binaries.
//!
//! The helpers drive the exported `extern "C"` functions exactly as a foreign
//! caller would: flat row-major buffers in, out-parameters and status codes
//! back, and every returned buffer handed back to its release function.

use std::ffi::{c_int, CString};
use std::ptr;

use lib_distclus::abi;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub use lib_distclus::error::*;

pub const SEED: u64 = 6305689164243;

pub const O_KMEANS: c_int = 0;
pub const O_MCMC: c_int = 1;
pub const O_KNN: c_int = 2;
pub const O_STREAMING: c_int = 3;

pub const S_REAL: c_int = 0;
pub const S_COMPLEX: c_int = 1;
pub const S_SERIES: c_int = 2;

pub const I_RANDOM: c_int = 0;
pub const I_GIVEN: c_int = 1;
pub const I_KMEANSPP: c_int = 2;

pub const F_ITERATIONS: c_int = 0;
pub const F_PUSHED_DATA: c_int = 1;
pub const F_MAX_DISTANCE: c_int = 2;

/// Twenty 2-d points: ten in the unit square at (2, 4), ten at (30, -15).
pub fn make_elements() -> Vec<Vec<f64>> {
    let mut rng = StdRng::seed_from_u64(SEED);
    (0..20)
        .map(|i| {
            let shift = if i < 10 { [2.0, 4.0] } else { [30.0, -15.0] };
            shift.iter().map(|s| rng.random::<f64>() + s).collect()
        })
        .collect()
}

/// Row-major buffer plus `(l1, l2)`.
pub fn flatten(elemts: &[Vec<f64>]) -> (Vec<f64>, usize, usize) {
    let l1 = elemts.len();
    let l2 = elemts.first().map_or(0, Vec::len);
    (elemts.concat(), l1, l2)
}

/// The first ten labels agree, the last ten agree, and the two groups differ.
pub fn assert_labels(labels: &[i64]) {
    assert_eq!(labels.len(), 20, "expected 20 labels got {}", labels.len());
    let (label0, label10) = (labels[0], labels[10]);
    for (i, label) in labels.iter().enumerate() {
        let expected = if i < 10 { label0 } else { label10 };
        assert_eq!(*label, expected, "label {} expected {} got {}", i, expected, label);
    }
    assert_ne!(label0, label10, "both groups got label {}", label0);
}

/// Two 2-d centroids, one near each group.
pub fn assert_centroids(centroids: &[Vec<f64>]) {
    assert_eq!(centroids.len(), 2, "expected 2 centroids got {}", centroids.len());
    assert!(centroids.iter().all(|c| c.len() == 2));
    let near = |x: f64, y: f64| centroids.iter().any(|c| (c[0] - x).abs() < 1.0 && (c[1] - y).abs() < 1.0);
    assert!(near(2.5, 4.5), "no centroid near (2.5, 4.5): {:?}", centroids);
    assert!(near(30.5, -14.5), "no centroid near (30.5, -14.5): {:?}", centroids);
}

pub fn conf(json: serde_json::Value) -> CString {
    CString::new(json.to_string()).expect("json has no interior NUL")
}

/// Calls `oc_create`; returns the status code and the written descriptor.
pub fn create(kind: c_int, space: c_int, conf: Option<&CString>, elemts: &[Vec<f64>], init: c_int) -> (c_int, c_int) {
    let (flat, l1, l2) = flatten(elemts);
    let conf = conf.map_or(ptr::null(), |c| c.as_ptr());
    let mut descr = -1;
    let code = unsafe { abi::oc_create(kind, space, conf, flat.as_ptr(), l1, l2, init, &mut descr) };
    (code, descr)
}

pub fn push(descr: c_int, elemts: &[Vec<f64>]) {
    let (flat, l1, l2) = flatten(elemts);
    unsafe { abi::oc_push(descr, flat.as_ptr(), l1, l2) };
}

/// Calls `oc_predict`, copies the labels out and releases the buffer.
pub fn predict(descr: c_int, elemts: &[Vec<f64>]) -> (c_int, Vec<i64>) {
    let (flat, l1, l2) = flatten(elemts);
    let mut labels: *mut i64 = ptr::null_mut();
    let mut n = usize::MAX;
    let code = unsafe { abi::oc_predict(descr, flat.as_ptr(), l1, l2, &mut labels, &mut n) };
    if labels.is_null() {
        assert_eq!(n, 0, "null labels with length {}", n);
        return (code, Vec::new());
    }
    let copied = unsafe { std::slice::from_raw_parts(labels, n) }.to_vec();
    unsafe { abi::oc_free_labels(labels, n) };
    (code, copied)
}

/// Calls `oc_centroids`, copies the matrix out and releases the buffer.
pub fn centroids(descr: c_int) -> (c_int, Vec<Vec<f64>>) {
    let mut data: *mut f64 = ptr::null_mut();
    let (mut l1, mut l2) = (usize::MAX, usize::MAX);
    let code = unsafe { abi::oc_centroids(descr, &mut data, &mut l1, &mut l2) };
    if data.is_null() {
        assert_eq!(l1 * l2, 0, "null matrix declared {} x {}", l1, l2);
        return (code, vec![Vec::new(); l1]);
    }
    let flat = unsafe { std::slice::from_raw_parts(data, l1 * l2) };
    let rows = flat.chunks_exact(l2).map(<[f64]>::to_vec).collect();
    unsafe { abi::oc_free_matrix(data, l1, l2) };
    (code, rows)
}

pub fn figure(descr: c_int, figure: c_int) -> (c_int, f64) {
    let mut value = f64::NAN;
    let code = unsafe { abi::oc_runtime_figure(descr, figure, &mut value) };
    (code, value)
}

pub fn set_conf(descr: c_int, conf: Option<&CString>) -> c_int {
    unsafe { abi::oc_set_conf(descr, conf.map_or(ptr::null(), |c| c.as_ptr())) }
}

pub fn set_space(descr: c_int, space: c_int, conf: Option<&CString>) -> c_int {
    unsafe { abi::oc_set_space(descr, space, conf.map_or(ptr::null(), |c| c.as_ptr())) }
}
