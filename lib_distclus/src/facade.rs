//! # Facade
//!
//! Safe composition of the registry, the marshaled element vectors and an
//! engine factory. One method per exported entry point; each resolves the
//! descriptor first, so an unknown descriptor is reported before any engine
//! is touched.
//!
//! The facade holds an engine only for the length of one call: lookups clone
//! the `Arc` out of the registry and drop it on return.

#![forbid(unsafe_code)]

use std::sync::Arc;

use crate::engine::factory::{InitializerKind, OcFactory, OcKind, SpaceKind};
use crate::engine::{Elemt, EngineError, Factory, Figure, OnlineClust};
use crate::error::OcError;
use crate::registry::{Descriptor, Registry};

pub struct Facade<F: OcFactory = Factory> {
    registry: Registry<dyn OnlineClust>,
    factory: F,
}

impl Default for Facade<Factory> {
    fn default() -> Self {
        Self::new(Factory)
    }
}

impl<F: OcFactory> Facade<F> {
    pub fn new(factory: F) -> Self {
        Self {
            registry: Registry::new(),
            factory,
        }
    }

    pub fn registry(&self) -> &Registry<dyn OnlineClust> {
        &self.registry
    }

    fn instance(&self, descr: Descriptor) -> Result<Arc<dyn OnlineClust>, OcError> {
        self.registry.get(descr).ok_or(OcError::UnknownDescriptor(descr))
    }

    /// Builds an engine from raw selector tags, seeds it with `data` and
    /// registers it.
    pub fn create(
        &self,
        kind: i32,
        space: i32,
        conf: Option<&str>,
        data: Vec<Elemt>,
        initializer: i32,
    ) -> Result<Descriptor, OcError> {
        let kind = OcKind::try_from(kind)?;
        let space_kind = SpaceKind::try_from(space)?;
        let initializer = InitializerKind::try_from(initializer)?;
        let conf = self.factory.conf(conf)?;

        let space = self.factory.create_space(space_kind, &conf)?;
        let oc = self.factory.create_oc(kind, conf, space, initializer)?;
        let seeded = data.len();
        for elemt in data {
            oc.push(elemt)?;
        }

        let descr = self.registry.register(oc)?;
        tracing::info!(descr, ?kind, ?space_kind, ?initializer, seeded, "created instance");
        Ok(descr)
    }

    /// Pushes elements in order. Stops at the first element the engine refuses.
    pub fn push(&self, descr: Descriptor, elemts: Vec<Elemt>) -> Result<(), OcError> {
        let oc = self.instance(descr)?;
        tracing::debug!(descr, count = elemts.len(), "push");
        for elemt in elemts {
            oc.push(elemt)?;
        }
        Ok(())
    }

    pub fn run(&self, descr: Descriptor, background: bool) -> Result<(), OcError> {
        let oc = self.instance(descr)?;
        tracing::debug!(descr, background, "run");
        oc.run(background)?;
        Ok(())
    }

    /// Labels for every element, or an error and no labels at all.
    pub fn predict(&self, descr: Descriptor, elemts: &[Elemt]) -> Result<Vec<i64>, OcError> {
        let oc = self.instance(descr)?;
        tracing::debug!(descr, count = elemts.len(), "predict");
        elemts
            .iter()
            .map(|elemt| {
                let (_, label) = oc.predict(elemt)?;
                i64::try_from(label).map_err(|_| OcError::InvalidArgument(format!("label {} exceeds i64", label)))
            })
            .collect()
    }

    pub fn centroids(&self, descr: Descriptor) -> Result<Vec<Elemt>, OcError> {
        Ok(self.instance(descr)?.centroids()?)
    }

    /// One value from the engine's figures. The tag is resolved, not checked
    /// against the engine; a figure the engine does not track is its error.
    pub fn runtime_figure(&self, descr: Descriptor, figure: i32) -> Result<f64, OcError> {
        let oc = self.instance(descr)?;
        let figure = Figure::try_from(figure)?;
        let figures = oc.runtime_figures()?;
        figures
            .get(&figure)
            .copied()
            .ok_or(OcError::Engine(EngineError::MissingFigure(figure)))
    }

    /// Replaces the configuration; `None` restores the defaults.
    pub fn set_conf(&self, descr: Descriptor, conf: Option<&str>) -> Result<(), OcError> {
        let oc = self.instance(descr)?;
        let conf = self.factory.conf(conf)?;
        oc.set_conf(conf)?;
        Ok(())
    }

    /// Switches the space; without `conf` the instance's current one is used to build it.
    pub fn set_space(&self, descr: Descriptor, space: i32, conf: Option<&str>) -> Result<(), OcError> {
        let oc = self.instance(descr)?;
        let space_kind = SpaceKind::try_from(space)?;
        let conf = match conf {
            Some(json) => self.factory.conf(Some(json))?,
            None => oc.conf(),
        };
        let space = self.factory.create_space(space_kind, &conf)?;
        oc.set_space(space)?;
        Ok(())
    }

    /// Stops the instance; it stays registered and readable.
    pub fn close(&self, descr: Descriptor) -> Result<(), OcError> {
        self.instance(descr)?.close();
        tracing::debug!(descr, "closed instance");
        Ok(())
    }

    /// Closes and unregisters. The entry is gone afterwards even if closing
    /// had already happened.
    pub fn release(&self, descr: Descriptor) -> Result<(), OcError> {
        let oc = self.registry.unregister(descr).ok_or(OcError::UnknownDescriptor(descr))?;
        oc.close();
        tracing::info!(descr, "released instance");
        Ok(())
    }
}
