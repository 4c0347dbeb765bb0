//! Shared tokio runtime for background runs.
//!
//! Built on first use so that loading the library never spawns threads.

use static_init::dynamic;
use tokio::runtime::{Builder, Handle, Runtime};

use super::EngineError;

#[dynamic(lazy)]
/// Multi-threaded runtime hosting every background run in the process.
static RUNTIME: Result<Runtime, String> = Builder::new_multi_thread()
    .worker_threads(2)
    .thread_name("distclus-run")
    .enable_time()
    .build()
    .map_err(|e| e.to_string());

/// Handle used to spawn background runs.
pub fn handle() -> Result<Handle, EngineError> {
    match &*RUNTIME {
        Ok(rt) => Ok(rt.handle().clone()),
        Err(e) => Err(EngineError::Runtime(e.clone())),
    }
}
