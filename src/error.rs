//! # Errores del Servidor
//! src/error.rs
//!
//! Errores de arranque (configuración, resolución, bind) y fallas fatales en
//! tiempo de ejecución (accept, sincronización, workers). Los errores de una
//! conexión individual no llegan hasta aquí: los reporta el handler y el
//! worker sigue atendiendo.

use crate::queue::QueuePoisoned;
use crate::workers::SpawnError;
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("cannot resolve {address}: {source}")]
    Resolve {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("cannot bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("accept failed: {0}")]
    Accept(#[source] io::Error),

    #[error(transparent)]
    Spawn(#[from] SpawnError),

    #[error("cannot install interrupt handler: {0}")]
    Signal(#[source] io::Error),

    #[error(transparent)]
    QueuePoisoned(#[from] QueuePoisoned),

    #[error("{failed} worker(s) terminated abnormally")]
    Workers { failed: usize },

    #[error("connection queue still referenced after workers exited")]
    QueueInUse,
}

impl ServerError {
    /// Indica si el error ocurrió antes de empezar a atender conexiones
    pub fn is_setup(&self) -> bool {
        matches!(
            self,
            ServerError::Config(_)
                | ServerError::Resolve { .. }
                | ServerError::Bind { .. }
                | ServerError::Spawn(_)
                | ServerError::Signal(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = ServerError::Config("workers must be >= 1".into());
        assert_eq!(err.to_string(), "invalid configuration: workers must be >= 1");

        let err = ServerError::Workers { failed: 2 };
        assert_eq!(err.to_string(), "2 worker(s) terminated abnormally");

        let err = ServerError::from(QueuePoisoned);
        assert_eq!(err.to_string(), "connection queue lock poisoned");
    }

    #[test]
    fn test_setup_classification() {
        let bind = ServerError::Bind {
            address: "0.0.0.0:80".into(),
            source: io::Error::from(io::ErrorKind::PermissionDenied),
        };
        assert!(bind.is_setup());
        assert!(!ServerError::Accept(io::Error::from(io::ErrorKind::Other)).is_setup());
        assert!(!ServerError::QueueInUse.is_setup());
    }
}
