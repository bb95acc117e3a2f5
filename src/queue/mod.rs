//! # Cola de Conexiones
//! src/queue/mod.rs
//!
//! Buffer acotado entre el acceptor y el pool de workers. Cuando la cola se
//! llena, el acceptor se bloquea: ese bloqueo es el mecanismo de backpressure
//! que limita la admisión de conexiones al ritmo de los workers.

pub mod connection_queue;

pub use connection_queue::{ConnectionQueue, DequeueError, EnqueueError, QueuePoisoned};
