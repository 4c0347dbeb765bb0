//! # K-Means Engine
//!
//! Batch Lloyd iterations over every pushed element. A synchronous run performs
//! `conf.iter` iterations and returns. A background run lives on the shared
//! runtime: it spends an iteration budget of `conf.iter` steps, refilled on
//! every push, and parks on a `Notify` when the budget is spent.
//!
//! The worker only touches state while holding the state lock and checks both
//! the cancellation token and the `Closed` status under that lock, so once
//! `close` returns no further iteration can land.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use super::factory::InitializerKind;
use super::initializer::initialize;
use super::{nearest, runtime, Conf, Elemt, EngineError, Figure, OnlineClust, Space, Status};

struct State {
    data: Vec<Elemt>,
    centroids: Option<Vec<Elemt>>,
    iterations: usize,
    /// Background iterations left before the worker parks.
    budget: usize,
    status: Status,
    conf: Conf,
    space: Arc<dyn Space>,
}

impl State {
    fn expected_dim(&self) -> Option<usize> {
        self.conf
            .dim
            .or_else(|| self.data.first().map(|e| self.space.dim(e)))
            .or_else(|| self.centroids.as_ref().and_then(|c| c.first()).map(|e| self.space.dim(e)))
    }

    fn check_dim(&self, elemt: &[f64]) -> Result<(), EngineError> {
        match self.expected_dim() {
            Some(expected) if expected != self.space.dim(elemt) => Err(EngineError::DimensionMismatch {
                expected,
                found: self.space.dim(elemt),
            }),
            _ => Ok(()),
        }
    }

    /// Elements considered by one iteration: the most recent `data_per_iter`, or all.
    fn window(&self) -> &[Elemt] {
        let n = self.conf.data_per_iter;
        if n == 0 || n >= self.data.len() {
            &self.data
        } else {
            &self.data[self.data.len() - n..]
        }
    }

    fn ensure_centroids(&mut self, initializer: InitializerKind) -> Result<(), EngineError> {
        if self.centroids.is_none() {
            let centroids = initialize(initializer, self.conf.k, &self.data, self.space.as_ref(), self.conf.seed)?;
            self.centroids = Some(centroids);
        }
        Ok(())
    }

    fn lloyd_step(&mut self) {
        let n_centroids = self.centroids.as_ref().map_or(0, Vec::len);
        if n_centroids == 0 {
            return;
        }
        let space = Arc::clone(&self.space);
        let updated: Vec<Option<Elemt>> = {
            let mut clusters: Vec<Vec<(&[f64], f64)>> = vec![Vec::new(); n_centroids];
            let centroids = self.centroids.as_deref().unwrap_or_default();
            for elemt in self.window() {
                if let Some((label, _)) = nearest(space.as_ref(), centroids, elemt) {
                    clusters[label].push((elemt.as_slice(), 1.0));
                }
            }
            clusters.iter().map(|members| space.combine(members)).collect()
        };
        if let Some(centroids) = self.centroids.as_mut() {
            // an empty cluster keeps its previous position
            for (centroid, mean) in centroids.iter_mut().zip(updated) {
                if let Some(mean) = mean {
                    *centroid = mean;
                }
            }
        }
        self.iterations += 1;
    }

    /// One unit of background work. Returns `true` when there is nothing to do.
    fn background_step(&mut self, initializer: InitializerKind) -> bool {
        if self.centroids.is_none() && self.ensure_centroids(initializer).is_err() {
            return true;
        }
        if self.budget == 0 {
            return true;
        }
        self.lloyd_step();
        self.budget -= 1;
        false
    }
}

fn lock(state: &Mutex<State>) -> MutexGuard<'_, State> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// K-means engine. See the module documentation for the run modes.
pub struct KMeans {
    initializer: InitializerKind,
    state: Arc<Mutex<State>>,
    token: Mutex<Option<CancellationToken>>,
    wakeup: Arc<Notify>,
}

impl KMeans {
    /// Builds an engine; `conf` must already be validated.
    pub fn new(conf: Conf, space: Arc<dyn Space>, initializer: InitializerKind) -> Self {
        Self {
            initializer,
            state: Arc::new(Mutex::new(State {
                data: Vec::new(),
                centroids: None,
                iterations: 0,
                budget: 0,
                status: Status::Created,
                conf,
                space,
            })),
            token: Mutex::new(None),
            wakeup: Arc::new(Notify::new()),
        }
    }

    fn spawn_worker(&self, iter_freq: Duration) -> Result<(), EngineError> {
        let handle = runtime::handle()?;
        let token = CancellationToken::new();
        let worker_token = token.clone();
        let state = Arc::clone(&self.state);
        let wakeup = Arc::clone(&self.wakeup);
        let initializer = self.initializer;

        handle.spawn(async move {
            loop {
                let idle = {
                    let mut s = lock(&state);
                    if worker_token.is_cancelled() || s.status == Status::Closed {
                        break;
                    }
                    s.background_step(initializer)
                };

                if idle {
                    tokio::select! {
                        _ = worker_token.cancelled() => break,
                        _ = wakeup.notified() => {},
                    }
                } else if !iter_freq.is_zero() {
                    tokio::select! {
                        _ = worker_token.cancelled() => break,
                        _ = sleep(iter_freq) => {},
                    }
                } else {
                    tokio::task::yield_now().await;
                }
            }
            tracing::debug!("k-means background run stopped");
        });

        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = Some(token);
        Ok(())
    }
}

impl OnlineClust for KMeans {
    fn push(&self, elemt: Elemt) -> Result<(), EngineError> {
        {
            let mut s = lock(&self.state);
            if s.status == Status::Closed {
                return Err(EngineError::Closed);
            }
            s.check_dim(&elemt)?;
            s.data.push(elemt);
            s.budget = s.conf.iter;
        }
        self.wakeup.notify_one();
        Ok(())
    }

    fn run(&self, background: bool) -> Result<(), EngineError> {
        let mut s = lock(&self.state);
        match s.status {
            Status::Closed => return Err(EngineError::Closed),
            Status::Running => return Err(EngineError::AlreadyRunning),
            Status::Created | Status::Idle => {}
        }

        if !background {
            s.ensure_centroids(self.initializer)?;
            for _ in 0..s.conf.iter {
                s.lloyd_step();
            }
            s.status = Status::Idle;
            return Ok(());
        }

        let iter_freq = Duration::from_millis(s.conf.iter_freq_ms);
        s.budget = s.conf.iter;
        self.spawn_worker(iter_freq)?;
        s.status = Status::Running;
        Ok(())
    }

    fn predict(&self, elemt: &Elemt) -> Result<(Elemt, usize), EngineError> {
        let s = lock(&self.state);
        let centroids = s.centroids.as_ref().ok_or(EngineError::NotStarted)?;
        s.check_dim(elemt)?;
        let (label, _) = nearest(s.space.as_ref(), centroids, elemt).ok_or(EngineError::NotStarted)?;
        Ok((centroids[label].clone(), label))
    }

    fn centroids(&self) -> Result<Vec<Elemt>, EngineError> {
        lock(&self.state).centroids.clone().ok_or(EngineError::NotStarted)
    }

    fn runtime_figures(&self) -> Result<HashMap<Figure, f64>, EngineError> {
        let s = lock(&self.state);
        Ok(HashMap::from([
            (Figure::Iterations, s.iterations as f64),
            (Figure::PushedData, s.data.len() as f64),
        ]))
    }

    fn set_conf(&self, conf: Conf) -> Result<(), EngineError> {
        conf.validate()?;
        let mut s = lock(&self.state);
        if s.centroids.as_ref().is_some_and(|c| c.len() != conf.k) {
            // re-seeded on the next run
            s.centroids = None;
        }
        s.conf = conf;
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
        // state before token, the order `run` takes them in
        let mut s = lock(&self.state);
        s.status = Status::Closed;
        if let Some(token) = self.token.lock().unwrap_or_else(PoisonError::into_inner).take() {
            token.cancel();
        }
    }

    fn status(&self) -> Status {
        lock(&self.state).status
    }
}

impl Drop for KMeans {
    fn drop(&mut self) {
        if let Some(token) = self.token.get_mut().unwrap_or_else(PoisonError::into_inner).take() {
            token.cancel();
        }
    }
}
