//! # Clustering Engines
//!
//! The boundary layer only talks to engines through the [`OnlineClust`] trait.
//! Every capability returns a `Result`; an engine never signals a failed
//! request by panicking.
//!
//! ## Contained Modules:
//!
//! - **`space`**: distance and combination rules for elements.
//! - **`initializer`**: seeding strategies for the first centroids.
//! - **`kmeans`**: Lloyd iterations, run synchronously or on a background task.
//! - **`streaming`**: online assignment that grows clusters as data arrives.
//! - **`runtime`**: the shared tokio runtime that hosts background runs.
//! - **`factory`**: builds engines and spaces from the enumerated selectors.

#![forbid(unsafe_code)]

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod factory;
pub mod initializer;
pub mod kmeans;
pub mod runtime;
pub mod space;
pub mod streaming;

pub use factory::{Factory, FactoryError, InitializerKind, OcKind, SpaceKind};
pub use space::{Real, Space};

/// One data point: a fixed-dimension vector of `f64`.
pub type Elemt = Vec<f64>;

/// Failures an engine reports for a well-formed request.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    /// No centroid exists yet; the engine has not been run.
    #[error("clustering not started")]
    NotStarted,

    /// The initializer needs more elements than have been pushed.
    #[error("not enough data: {needed} elements required, {available} available")]
    NotEnoughData { needed: usize, available: usize },

    /// A background run is already in progress.
    #[error("clustering already running")]
    AlreadyRunning,

    /// The engine has been closed and no longer accepts data or runs.
    #[error("clustering closed")]
    Closed,

    /// An element does not match the dimension of the data seen so far.
    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    /// The engine does not track the requested runtime figure.
    #[error("runtime figure {0:?} not available")]
    MissingFigure(Figure),

    /// The configuration is structurally valid JSON but semantically unusable.
    #[error("invalid configuration: {0}")]
    InvalidConf(String),

    /// The background runtime could not be started.
    #[error("background runtime unavailable: {0}")]
    Runtime(String),
}

/// Lifecycle state of an engine instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Built, never run.
    Created,
    /// A background run is active.
    Running,
    /// At least one run completed and nothing is running now.
    Idle,
    /// Closed; state is frozen but still readable.
    Closed,
}

/// Named runtime statistics an engine may expose. Mirrors `figure` in `bind.h`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Figure {
    /// Number of iterations (k-means) or processed elements (streaming).
    Iterations = 0,
    /// Number of elements pushed so far.
    PushedData = 1,
    /// Largest distance between an element and its nearest centroid.
    MaxDistance = 2,
}

impl TryFrom<i32> for Figure {
    type Error = FactoryError;

    fn try_from(tag: i32) -> Result<Self, Self::Error> {
        match tag {
            0 => Ok(Figure::Iterations),
            1 => Ok(Figure::PushedData),
            2 => Ok(Figure::MaxDistance),
            _ => Err(FactoryError::UnknownTag { selector: "figure", tag }),
        }
    }
}

fn default_k() -> usize {
    2
}

fn default_iter() -> usize {
    20
}

fn default_radius() -> f64 {
    1.0
}

/// # Engine Configuration
///
/// Deserialized from the JSON blob a caller passes across the boundary. Every
/// field has a default, so `{}` and a null pointer both yield `Conf::default()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Conf {
    /// Number of clusters k-means maintains.
    #[serde(default = "default_k")]
    pub k: usize,
    /// Lloyd iterations per synchronous run, and the iteration budget of a
    /// background run between two pushes.
    #[serde(default = "default_iter")]
    pub iter: usize,
    /// Seed for every random choice the engine makes.
    #[serde(default)]
    pub seed: u64,
    /// Pause between two background iterations, in milliseconds.
    #[serde(default)]
    pub iter_freq_ms: u64,
    /// Elements considered per iteration; `0` means all of them.
    #[serde(default)]
    pub data_per_iter: usize,
    /// Expected element dimension. When set, pushes of another size are refused.
    #[serde(default)]
    pub dim: Option<usize>,
    /// Streaming: an element farther than this from every centroid founds a new cluster.
    #[serde(default = "default_radius")]
    pub radius: f64,
    /// Streaming: number of elements absorbed before new clusters may be founded.
    #[serde(default)]
    pub out_after: usize,
}

impl Default for Conf {
    fn default() -> Self {
        Self {
            k: default_k(),
            iter: default_iter(),
            seed: 0,
            iter_freq_ms: 0,
            data_per_iter: 0,
            dim: None,
            radius: default_radius(),
            out_after: 0,
        }
    }
}

impl Conf {
    /// Parses a JSON configuration; an empty string yields the defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        if json.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(json)
    }

    /// Rejects values no engine can work with.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.k == 0 {
            return Err(EngineError::InvalidConf("k must be at least 1".into()));
        }
        if self.iter == 0 {
            return Err(EngineError::InvalidConf("iter must be at least 1".into()));
        }
        if !(self.radius > 0.0) {
            return Err(EngineError::InvalidConf("radius must be positive".into()));
        }
        if self.dim == Some(0) {
            return Err(EngineError::InvalidConf("dim must be positive when set".into()));
        }
        Ok(())
    }
}

/// # Online Clustering Capability Set
///
/// What the boundary layer needs from an engine. All methods take `&self`:
/// engines guard their own state so that `push`, `predict` and `centroids` can
/// run while a background run is in progress on another thread.
pub trait OnlineClust: Send + Sync {
    /// Adds one element to the engine's data.
    fn push(&self, elemt: Elemt) -> Result<(), EngineError>;

    /// Runs the algorithm. With `background`, returns as soon as the run is started.
    fn run(&self, background: bool) -> Result<(), EngineError>;

    /// Returns the nearest centroid and its label.
    fn predict(&self, elemt: &Elemt) -> Result<(Elemt, usize), EngineError>;

    /// Current centroids.
    fn centroids(&self) -> Result<Vec<Elemt>, EngineError>;

    /// Snapshot of every figure the engine tracks.
    fn runtime_figures(&self) -> Result<HashMap<Figure, f64>, EngineError>;

    /// Replaces the configuration.
    fn set_conf(&self, conf: Conf) -> Result<(), EngineError>;

    /// Replaces the space used for distances and combinations.
    fn set_space(&self, space: Arc<dyn Space>) -> Result<(), EngineError>;

    /// Current configuration.
    fn conf(&self) -> Conf;

    /// Stops background work. State stays readable afterwards.
    fn close(&self);

    /// Current lifecycle state.
    fn status(&self) -> Status;
}

/// Index and distance of the centroid nearest to `elemt`.
pub(crate) fn nearest(space: &dyn Space, centroids: &[Elemt], elemt: &[f64]) -> Option<(usize, f64)> {
    centroids
        .iter()
        .enumerate()
        .map(|(i, c)| (i, space.dist(c, elemt)))
        .min_by(|a, b| a.1.total_cmp(&b.1))
}
