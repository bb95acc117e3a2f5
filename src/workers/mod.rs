//! # Workers
//! src/workers/mod.rs
//!
//! Pool fijo de threads que consumen la cola de conexiones:
//! - `pool`: creación, loop de cada worker y join
//! - `signal_mask`: bloqueo de SIGINT mientras se crean los threads

pub mod pool;
pub mod signal_mask;

pub use pool::{CancelToken, SpawnError, WorkerError, WorkerPool, WorkerReport};
