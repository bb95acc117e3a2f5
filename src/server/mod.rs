//! # Módulo del Servidor
//! src/server/mod.rs
//!
//! Acceptor, socket de escucha y coordinación del apagado:
//! 1. `listener`: bind + listen con `SO_REUSEADDR` y backlog fijo
//! 2. `tcp`: loop de accept, encolado y secuencia de apagado
//! 3. `shutdown`: flag de apagado, fases y handle para apagar por código
//! 4. `signal`: SIGINT → apagado ordenado

pub mod listener;
pub mod shutdown;
pub mod signal;
pub mod tcp;

pub use shutdown::{ServerPhase, ShutdownCoordinator, ShutdownHandle};
pub use signal::SignalWatcher;
pub use tcp::{ServeSummary, Server, SharedHandler};
