//! # Boundary Error Taxonomy
//!
//! Every failure that can reach a foreign caller is an [`OcError`], and every
//! `OcError` maps to exactly one status code. Zero is success, positive codes
//! are reportable application errors, and the single negative code is reserved
//! for a panic caught by the bridge.

#![forbid(unsafe_code)]

use std::ffi::c_int;

use thiserror::Error;

use crate::engine::{EngineError, FactoryError};
use crate::marshal::ShapeError;
use crate::registry::Descriptor;

/// The call succeeded.
pub const OC_SUCCESS: c_int = 0;
/// The engine reported a well-formed error for the request.
pub const OC_ERR_OPERATION: c_int = 1;
/// The descriptor is not registered.
pub const OC_ERR_UNKNOWN_DESCRIPTOR: c_int = 2;
/// Buffer dimensions or pointer were rejected before any read.
pub const OC_ERR_SHAPE: c_int = 3;
/// Malformed configuration, unknown selector tag or null out-parameter.
pub const OC_ERR_INVALID_ARGUMENT: c_int = 4;
/// The selector is known but the factory cannot build it.
pub const OC_ERR_UNSUPPORTED: c_int = 5;
/// A panic was caught at the boundary.
pub const OC_ERR_INTERNAL: c_int = -1;

#[derive(Debug, Error)]
/// # Boundary Error
///
/// Shape and descriptor errors are detected by the facade before any engine is
/// touched; engine and factory errors are forwarded unchanged in kind.
pub enum OcError {
    /// Buffer shape rejected by the marshaler.
    #[error("shape error: {0}")]
    Shape(#[from] ShapeError),

    /// No instance is registered under this descriptor.
    #[error("unknown descriptor {0}")]
    UnknownDescriptor(Descriptor),

    /// The engine refused the request.
    #[error("operation failed: {0}")]
    Engine(#[from] EngineError),

    /// Selector resolution or construction failed.
    #[error("factory error: {0}")]
    Factory(#[from] FactoryError),

    /// An argument that is not a buffer was unusable.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Every descriptor value has been issued.
    #[error("descriptor space exhausted")]
    RegistryExhausted,

    /// The log subscriber could not be installed.
    #[error("logging setup failed: {0}")]
    Logging(String),
}

impl OcError {
    /// The status code a foreign caller receives for this error.
    pub fn code(&self) -> c_int {
        match self {
            OcError::Shape(_) => OC_ERR_SHAPE,
            OcError::UnknownDescriptor(_) => OC_ERR_UNKNOWN_DESCRIPTOR,
            OcError::Engine(EngineError::InvalidConf(_)) => OC_ERR_INVALID_ARGUMENT,
            OcError::Engine(_) | OcError::RegistryExhausted | OcError::Logging(_) => OC_ERR_OPERATION,
            OcError::Factory(FactoryError::Unsupported(_)) => OC_ERR_UNSUPPORTED,
            OcError::Factory(_) | OcError::InvalidArgument(_) => OC_ERR_INVALID_ARGUMENT,
        }
    }
}
