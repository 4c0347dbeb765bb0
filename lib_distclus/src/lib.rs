//! # lib_distclus
//!
//! A C ABI boundary around stateful online clustering engines. Foreign callers
//! only ever see small integer descriptors, flat row-major `f64` buffers and
//! `c_int` status codes; everything behind that line is ordinary safe Rust.
//!
//! ## Layout
//!
//! - **`marshal`**: flat buffers (pointer + dimensions) to and from `Vec<Elemt>`,
//!   plus the paired release functions for every buffer handed to a caller.
//! - **`registry`**: the descriptor table. Descriptors are issued in strictly
//!   increasing order and never reused.
//! - **`bridge`**: the last-resort `catch_unwind` wrapper that turns results and
//!   panics into status codes.
//! - **`facade`**: safe composition of the three above with the engine factory.
//! - **`abi`**: the exported `extern "C"` surface, mirrored by `include/bind.h`.
//! - **`engine`**: the clustering engines the factory can build.
//! - **`config`** / **`logger`**: boundary settings and `tracing` setup.

pub mod abi;
pub mod bridge;
pub mod config;
pub mod engine;
pub mod error;
pub mod facade;
pub mod logger;
pub mod marshal;
pub mod registry;

pub use engine::{Conf, Elemt, EngineError, Figure, OnlineClust, Status};
pub use error::*;
pub use facade::Facade;
pub use registry::{Descriptor, Registry};
