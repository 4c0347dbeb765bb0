//! # Marshaler
//!
//! Converts between the flat row-major buffers foreign callers hand over
//! (pointer + `l1` rows + `l2` columns) and `Vec<Elemt>`, and between flat
//! `i64` label buffers and `Vec<i64>`.
//!
//! ## Ownership
//!
//! Decoding copies out of a caller-owned buffer and never frees it. Encoding
//! allocates a boxed slice whose ownership passes to the caller; the only way
//! back is the matching `free_*` function with the same dimensions. Empty
//! results are returned as a null pointer, which every `free_*` accepts.
//!
//! Declared dimensions are trusted for the size of the allocation, but the
//! product is overflow-checked and the pointer is checked for null and
//! alignment before any read.

#![warn(unsafe_op_in_unsafe_fn)]

use std::mem::{align_of, size_of};
use std::ptr;

use thiserror::Error;

use crate::engine::Elemt;

/// A buffer shape that cannot be decoded or encoded.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ShapeError {
    /// `l1 * l2` does not fit in an addressable buffer.
    #[error("{l1} x {l2} overflows the addressable size")]
    Overflow { l1: usize, l2: usize },

    /// A non-empty shape was declared with a null pointer.
    #[error("null buffer declared as {l1} x {l2}")]
    NullPointer { l1: usize, l2: usize },

    /// The pointer is not aligned for its scalar type.
    #[error("buffer at {addr:#x} is not aligned to {align} bytes")]
    Misaligned { addr: usize, align: usize },

    /// Rows of one matrix do not share a dimension.
    #[error("row {row} has dimension {found}, expected {expected}")]
    DimensionMismatch { row: usize, expected: usize, found: usize },

    /// A flat slice does not hold exactly `l1 * l2` scalars.
    #[error("flat buffer holds {len} scalars, declared {l1} x {l2}")]
    Length { len: usize, l1: usize, l2: usize },
}

/// A caller-owned row-major matrix produced by [`encode_matrix`].
#[derive(Debug)]
pub struct FlatMatrix {
    pub data: *mut f64,
    pub l1: usize,
    pub l2: usize,
}

/// A caller-owned label array produced by [`encode_labels`].
#[derive(Debug)]
pub struct FlatLabels {
    pub data: *mut i64,
    pub len: usize,
}

fn checked_len<T>(l1: usize, l2: usize) -> Result<usize, ShapeError> {
    l1.checked_mul(l2)
        .filter(|n| n.checked_mul(size_of::<T>()).is_some_and(|bytes| bytes <= isize::MAX as usize))
        .ok_or(ShapeError::Overflow { l1, l2 })
}

/// Borrows `l1 * l2` scalars starting at `data`.
///
/// # Safety
/// When the product is non-zero, `data` must point to at least `l1 * l2`
/// initialized scalars that stay valid and unmodified for `'a`.
unsafe fn read_flat<'a, T>(data: *const T, l1: usize, l2: usize) -> Result<&'a [T], ShapeError> {
    let len = checked_len::<T>(l1, l2)?;
    if len == 0 {
        return Ok(&[]);
    }
    if data.is_null() {
        return Err(ShapeError::NullPointer { l1, l2 });
    }
    if (data as usize) % align_of::<T>() != 0 {
        return Err(ShapeError::Misaligned { addr: data as usize, align: align_of::<T>() });
    }
    // SAFETY: non-null, aligned, size checked; the caller vouches for the extent.
    Ok(unsafe { std::slice::from_raw_parts(data, len) })
}

fn into_raw<T>(values: Vec<T>) -> *mut T {
    if values.is_empty() {
        return ptr::null_mut();
    }
    Box::into_raw(values.into_boxed_slice()) as *mut T
}

/// # Safety
/// `data` must be null or come from [`into_raw`] with exactly `len` elements.
unsafe fn release<T>(data: *mut T, len: usize) {
    if data.is_null() || len == 0 {
        return;
    }
    // SAFETY: reconstructs the boxed slice handed out by `into_raw`.
    drop(unsafe { Box::from_raw(ptr::slice_from_raw_parts_mut(data, len)) });
}

/// Splits a row-major slice into `l1` elements of dimension `l2`.
///
/// A zero in either dimension yields no elements, whatever the other one says.
pub fn matrix_from_flat(flat: &[f64], l1: usize, l2: usize) -> Result<Vec<Elemt>, ShapeError> {
    let len = checked_len::<f64>(l1, l2)?;
    if flat.len() != len {
        return Err(ShapeError::Length { len: flat.len(), l1, l2 });
    }
    if len == 0 {
        return Ok(Vec::new());
    }
    Ok(flat.chunks_exact(l2).map(<[f64]>::to_vec).collect())
}

/// Flattens uniform-dimension elements into a row-major vector plus `(l1, l2)`.
pub fn matrix_to_flat(elemts: &[Elemt]) -> Result<(Vec<f64>, usize, usize), ShapeError> {
    let l1 = elemts.len();
    let l2 = elemts.first().map_or(0, Vec::len);
    let mut flat = Vec::with_capacity(checked_len::<f64>(l1, l2)?);
    for (row, elemt) in elemts.iter().enumerate() {
        if elemt.len() != l2 {
            return Err(ShapeError::DimensionMismatch { row, expected: l2, found: elemt.len() });
        }
        flat.extend_from_slice(elemt);
    }
    // zero-dimension rows carry no scalars and encode as the empty matrix
    if l2 == 0 {
        return Ok((flat, 0, 0));
    }
    Ok((flat, l1, l2))
}

/// Copies an `l1 x l2` row-major matrix out of a caller-owned buffer.
///
/// # Safety
/// When `l1 * l2 > 0`, `data` must point to at least `l1 * l2` readable `f64`
/// that are not mutated during the call.
pub unsafe fn decode_matrix(data: *const f64, l1: usize, l2: usize) -> Result<Vec<Elemt>, ShapeError> {
    // SAFETY: forwarded caller contract.
    let flat = unsafe { read_flat(data, l1, l2)? };
    matrix_from_flat(flat, l1, l2)
}

/// Allocates a caller-owned matrix; release it with [`free_matrix`].
pub fn encode_matrix(elemts: Vec<Elemt>) -> Result<FlatMatrix, ShapeError> {
    let (flat, l1, l2) = matrix_to_flat(&elemts)?;
    Ok(FlatMatrix { data: into_raw(flat), l1, l2 })
}

/// Releases a matrix produced by [`encode_matrix`].
///
/// # Safety
/// `data` must be null or the pointer of a [`FlatMatrix`] with the same `l1`
/// and `l2`, not released before.
pub unsafe fn free_matrix(data: *mut f64, l1: usize, l2: usize) {
    // a shape that cannot have been allocated cannot be released either
    if let Ok(len) = checked_len::<f64>(l1, l2) {
        // SAFETY: forwarded caller contract.
        unsafe { release(data, len) }
    }
}

/// Copies `len` labels out of a caller-owned buffer.
///
/// # Safety
/// When `len > 0`, `data` must point to at least `len` readable `i64`.
pub unsafe fn decode_labels(data: *const i64, len: usize) -> Result<Vec<i64>, ShapeError> {
    // SAFETY: forwarded caller contract.
    Ok(unsafe { read_flat(data, len, 1)? }.to_vec())
}

/// Allocates a caller-owned label array; release it with [`free_labels`].
pub fn encode_labels(labels: Vec<i64>) -> FlatLabels {
    let len = labels.len();
    FlatLabels { data: into_raw(labels), len }
}

/// Releases a label array produced by [`encode_labels`].
///
/// # Safety
/// `data` must be null or the pointer of a [`FlatLabels`] with the same `len`,
/// not released before.
pub unsafe fn free_labels(data: *mut i64, len: usize) {
    // SAFETY: forwarded caller contract.
    unsafe { release(data, len) }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<Elemt> {
        vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]
    }

    #[test]
    fn test_decode_encoded_matrix() {
        let flat = encode_matrix(sample()).unwrap();
        assert_eq!((flat.l1, flat.l2), (2, 3));

        let decoded = unsafe { decode_matrix(flat.data, flat.l1, flat.l2) }.unwrap();
        assert_eq!(decoded, sample());
        unsafe { free_matrix(flat.data, flat.l1, flat.l2) };
    }

    #[test]
    fn test_decode_keeps_row_major_order() {
        let raw = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let decoded = unsafe { decode_matrix(raw.as_ptr(), 3, 2) }.unwrap();
        assert_eq!(decoded, vec![vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]]);

        let (flat, l1, l2) = matrix_to_flat(&decoded).unwrap();
        assert_eq!((l1, l2), (3, 2));
        assert_eq!(flat, raw);
    }

    #[test]
    fn test_single_row_matrix() {
        let raw = [7.0, 8.0];
        let decoded = unsafe { decode_matrix(raw.as_ptr(), 1, 2) }.unwrap();
        assert_eq!(decoded, vec![vec![7.0, 8.0]]);
    }

    #[test]
    fn test_empty_shapes_do_not_read_the_pointer() {
        assert!(unsafe { decode_matrix(ptr::null(), 0, 5) }.unwrap().is_empty());
        assert!(unsafe { decode_matrix(ptr::null(), 3, 0) }.unwrap().is_empty());

        let empty = encode_matrix(Vec::new()).unwrap();
        assert!(empty.data.is_null());
        assert_eq!((empty.l1, empty.l2), (0, 0));
        unsafe { free_matrix(empty.data, empty.l1, empty.l2) };
    }

    #[test]
    fn test_zero_dimension_rows_encode_as_empty() {
        let flat = encode_matrix(vec![Vec::new(), Vec::new()]).unwrap();
        assert!(flat.data.is_null());
        assert_eq!((flat.l1, flat.l2), (0, 0));
        let decoded = unsafe { decode_matrix(flat.data, flat.l1, flat.l2) }.unwrap();
        assert!(decoded.is_empty());
    }

    #[test]
    fn test_huge_row_count_with_zero_dimension_allocates_nothing() {
        let decoded = unsafe { decode_matrix(ptr::null(), 1 << 40, 0) }.unwrap();
        assert!(decoded.is_empty());
        assert!(unsafe { decode_matrix(ptr::null(), usize::MAX, 0) }.unwrap().is_empty());
        assert!(matrix_from_flat(&[], usize::MAX, 0).unwrap().is_empty());
    }

    #[test]
    fn test_null_pointer_with_shape_is_rejected() {
        let err = unsafe { decode_matrix(ptr::null(), 2, 2) }.unwrap_err();
        assert_eq!(err, ShapeError::NullPointer { l1: 2, l2: 2 });
    }

    #[test]
    fn test_overflowing_shape_is_rejected() {
        let raw = [1.0];
        let err = unsafe { decode_matrix(raw.as_ptr(), usize::MAX, 2) }.unwrap_err();
        assert_eq!(err, ShapeError::Overflow { l1: usize::MAX, l2: 2 });
    }

    #[test]
    fn test_misaligned_pointer_is_rejected() {
        let raw = [0.0f64; 3];
        let misaligned = (raw.as_ptr() as *const u8).wrapping_add(1) as *const f64;
        assert!(matches!(
            unsafe { decode_matrix(misaligned, 1, 1) },
            Err(ShapeError::Misaligned { .. })
        ));
    }

    #[test]
    fn test_ragged_rows_are_rejected() {
        let err = encode_matrix(vec![vec![1.0, 2.0], vec![3.0]]).unwrap_err();
        assert_eq!(err, ShapeError::DimensionMismatch { row: 1, expected: 2, found: 1 });
    }

    #[test]
    fn test_flat_length_must_match_shape() {
        let err = matrix_from_flat(&[1.0, 2.0, 3.0], 2, 2).unwrap_err();
        assert_eq!(err, ShapeError::Length { len: 3, l1: 2, l2: 2 });
    }

    #[test]
    fn test_labels_round_trip() {
        let flat = encode_labels(vec![0, 1, 1, 0]);
        assert_eq!(flat.len, 4);
        let decoded = unsafe { decode_labels(flat.data, flat.len) }.unwrap();
        assert_eq!(decoded, vec![0, 1, 1, 0]);
        unsafe { free_labels(flat.data, flat.len) };

        let empty = encode_labels(Vec::new());
        assert!(empty.data.is_null());
        unsafe { free_labels(empty.data, empty.len) };
    }
}
