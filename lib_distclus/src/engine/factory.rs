//! # Engine Factory
//!
//! Resolves the enumerated selectors of `bind.h` and builds spaces and engines.
//! The boundary layer only forwards raw tags and the configuration blob; all
//! interpretation happens here.

use std::sync::Arc;

use thiserror::Error;

use super::kmeans::KMeans;
use super::streaming::Streaming;
use super::{Conf, EngineError, OnlineClust, Real, Space};

/// Failures while resolving selectors or building an engine.
#[derive(Debug, Error)]
pub enum FactoryError {
    /// The raw tag does not name any variant of the selector.
    #[error("unknown {selector} tag {tag}")]
    UnknownTag { selector: &'static str, tag: i32 },

    /// The variant exists but this factory cannot build it.
    #[error("{0} is not supported")]
    Unsupported(String),

    /// The configuration blob is not valid JSON for [`Conf`].
    #[error("invalid configuration JSON: {0}")]
    Conf(#[from] serde_json::Error),

    /// The configuration parsed but was rejected.
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Declares a `#[repr(i32)]` selector mirroring a C enum, with `TryFrom<i32>`.
macro_rules! selector {
    ($(#[$meta:meta])* $name:ident, $label:literal { $($(#[$vmeta:meta])* $variant:ident = $tag:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(i32)]
        pub enum $name {
            $($(#[$vmeta])* $variant = $tag),+
        }

        impl TryFrom<i32> for $name {
            type Error = FactoryError;

            fn try_from(tag: i32) -> Result<Self, Self::Error> {
                match tag {
                    $($tag => Ok($name::$variant),)+
                    _ => Err(FactoryError::UnknownTag { selector: $label, tag }),
                }
            }
        }
    };
}

selector!(
    /// Algorithm selector, `oc` in `bind.h`.
    OcKind, "oc" {
        /// Lloyd k-means.
        KMeans = 0,
        /// Markov chain Monte Carlo clustering.
        Mcmc = 1,
        /// Nearest-neighbour clustering.
        Knn = 2,
        /// Online streaming clustering.
        Streaming = 3,
    }
);

selector!(
    /// Space selector, `space` in `bind.h`.
    SpaceKind, "space" {
        /// Euclidean vectors.
        Real = 0,
        /// Complex vectors.
        Complex = 1,
        /// Time series.
        Series = 2,
    }
);

selector!(
    /// Initializer selector, `initializer` in `bind.h`.
    InitializerKind, "initializer" {
        /// `k` distinct elements chosen uniformly.
        Random = 0,
        /// The first `k` elements pushed.
        Given = 1,
        /// k-means++ seeding.
        KMeansPP = 2,
    }
);

/// Builds spaces and engines from resolved selectors.
pub trait OcFactory: Send + Sync {
    /// Parses and validates a configuration blob; `None` yields the defaults.
    fn conf(&self, json: Option<&str>) -> Result<Conf, FactoryError> {
        let conf = match json {
            Some(json) => Conf::from_json(json)?,
            None => Conf::default(),
        };
        conf.validate()?;
        Ok(conf)
    }

    /// Builds the space an engine measures distances in.
    fn create_space(&self, kind: SpaceKind, conf: &Conf) -> Result<Arc<dyn Space>, FactoryError>;

    /// Builds an engine with no data.
    fn create_oc(
        &self,
        kind: OcKind,
        conf: Conf,
        space: Arc<dyn Space>,
        initializer: InitializerKind,
    ) -> Result<Arc<dyn OnlineClust>, FactoryError>;
}

/// The engines shipped with this crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct Factory;

impl OcFactory for Factory {
    fn create_space(&self, kind: SpaceKind, _conf: &Conf) -> Result<Arc<dyn Space>, FactoryError> {
        match kind {
            SpaceKind::Real => Ok(Arc::new(Real)),
            SpaceKind::Complex | SpaceKind::Series => Err(FactoryError::Unsupported(format!("{:?} space", kind))),
        }
    }

    fn create_oc(
        &self,
        kind: OcKind,
        conf: Conf,
        space: Arc<dyn Space>,
        initializer: InitializerKind,
    ) -> Result<Arc<dyn OnlineClust>, FactoryError> {
        match kind {
            OcKind::KMeans => Ok(Arc::new(KMeans::new(conf, space, initializer))),
            OcKind::Streaming => Ok(Arc::new(Streaming::new(conf, space))),
            OcKind::Mcmc | OcKind::Knn => Err(FactoryError::Unsupported(format!("{:?} algorithm", kind))),
        }
    }
}
