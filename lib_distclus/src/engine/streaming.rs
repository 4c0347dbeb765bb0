//! # Streaming Engine
//!
//! Elements pushed before the first run are buffered. A run drains the buffer;
//! a background run additionally switches the engine to live mode, where every
//! push is assigned immediately on the caller's thread.
//!
//! An element joins its nearest cluster (running mean) when it lies within
//! `conf.radius`; otherwise, once `conf.out_after` elements have been absorbed,
//! it founds a new cluster.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{nearest, Conf, Elemt, EngineError, Figure, OnlineClust, Space, Status};

struct State {
    buffer: Vec<Elemt>,
    centroids: Vec<Elemt>,
    counts: Vec<usize>,
    pushed: usize,
    processed: usize,
    max_distance: f64,
    live: bool,
    dim: Option<usize>,
    status: Status,
    conf: Conf,
    space: Arc<dyn Space>,
}

impl State {
    fn process(&mut self, elemt: Elemt) {
        let Some((label, dist)) = nearest(self.space.as_ref(), &self.centroids, &elemt) else {
            self.centroids.push(elemt);
            self.counts.push(1);
            self.processed += 1;
            return;
        };

        self.max_distance = self.max_distance.max(dist);
        if dist > self.conf.radius && self.processed >= self.conf.out_after {
            self.centroids.push(elemt);
            self.counts.push(1);
        } else {
            let count = self.counts[label] as f64;
            let merged = self.space.combine(&[(self.centroids[label].as_slice(), count), (elemt.as_slice(), 1.0)]);
            if let Some(merged) = merged {
                self.centroids[label] = merged;
            }
            self.counts[label] += 1;
        }
        self.processed += 1;
    }

    fn check_dim(&self, elemt: &[f64]) -> Result<(), EngineError> {
        let found = self.space.dim(elemt);
        match self.conf.dim.or(self.dim) {
            Some(expected) if expected != found => Err(EngineError::DimensionMismatch { expected, found }),
            _ => Ok(()),
        }
    }
}

fn lock(state: &Mutex<State>) -> MutexGuard<'_, State> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Streaming engine. See the module documentation.
pub struct Streaming {
    state: Mutex<State>,
}

impl Streaming {
    /// Builds an engine; `conf` must already be validated.
    pub fn new(conf: Conf, space: Arc<dyn Space>) -> Self {
        Self {
            state: Mutex::new(State {
                buffer: Vec::new(),
                centroids: Vec::new(),
                counts: Vec::new(),
                pushed: 0,
                processed: 0,
                max_distance: 0.0,
                live: false,
                dim: None,
                status: Status::Created,
                conf,
                space,
            }),
        }
    }
}

impl OnlineClust for Streaming {
    fn push(&self, elemt: Elemt) -> Result<(), EngineError> {
        let mut s = lock(&self.state);
        if s.status == Status::Closed {
            return Err(EngineError::Closed);
        }
        s.check_dim(&elemt)?;
        if s.dim.is_none() {
            s.dim = Some(s.space.dim(&elemt));
        }
        s.pushed += 1;
        if s.live {
            s.process(elemt);
        } else {
            s.buffer.push(elemt);
        }
        Ok(())
    }

    fn run(&self, background: bool) -> Result<(), EngineError> {
        let mut s = lock(&self.state);
        match s.status {
            Status::Closed => return Err(EngineError::Closed),
            Status::Running => return Err(EngineError::AlreadyRunning),
            Status::Created | Status::Idle => {}
        }
        let pending = std::mem::take(&mut s.buffer);
        for elemt in pending {
            s.process(elemt);
        }
        s.live = background;
        s.status = if background { Status::Running } else { Status::Idle };
        Ok(())
    }

    fn predict(&self, elemt: &Elemt) -> Result<(Elemt, usize), EngineError> {
        let s = lock(&self.state);
        s.check_dim(elemt)?;
        let (label, _) = nearest(s.space.as_ref(), &s.centroids, elemt).ok_or(EngineError::NotStarted)?;
        Ok((s.centroids[label].clone(), label))
    }

    fn centroids(&self) -> Result<Vec<Elemt>, EngineError> {
        let s = lock(&self.state);
        if s.centroids.is_empty() {
            return Err(EngineError::NotStarted);
        }
        Ok(s.centroids.clone())
    }

    fn runtime_figures(&self) -> Result<HashMap<Figure, f64>, EngineError> {
        let s = lock(&self.state);
        Ok(HashMap::from([
            (Figure::Iterations, s.processed as f64),
            (Figure::PushedData, s.pushed as f64),
            (Figure::MaxDistance, s.max_distance),
        ]))
    }

    fn set_conf(&self, conf: Conf) -> Result<(), EngineError> {
        conf.validate()?;
        lock(&self.state).conf = conf;
        Ok(())
    }

    fn set_space(&self, space: Arc<dyn Space>) -> Result<(), EngineError> {
        lock(&self.state).space = space;
        Ok(())
    }

    fn conf(&self) -> Conf {
        lock(&self.state).conf.clone()
    }

    fn close(&self) {
        let mut s = lock(&self.state);
        s.live = false;
        s.status = Status::Closed;
    }

    fn status(&self) -> Status {
        lock(&self.state).status
    }
}
