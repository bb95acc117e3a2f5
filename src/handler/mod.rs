//! # Manejo de Conexiones
//! src/handler/mod.rs
//!
//! Este módulo define el contrato entre el pool de workers y la lógica que
//! atiende una conexión.
//!
//! ## Arquitectura
//!
//! ```text
//! Worker → dequeue → ConnectionHandler::handle(&mut conn) → close
//! ```
//!
//! El handler recibe la conexión prestada (`&mut C`): puede leer y escribir,
//! pero nunca cerrarla. El worker que la desencoló es el único dueño y la
//! cierra al terminar, sin importar el resultado.

pub mod static_files;

pub use static_files::StaticFiles;

use crate::http::{RequestError, StatusCode};
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Resultado de una conexión atendida con éxito
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Served {
    /// Path pedido por el cliente
    pub path: String,

    /// Status enviado
    pub status: StatusCode,

    /// Bytes de body enviados
    pub body_bytes: u64,
}

/// Errores recuperables al atender una conexión.
///
/// Ninguno es fatal para el worker: se registran y la conexión se cierra.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("bad request: {0}")]
    Request(#[from] RequestError),

    #[error("cannot open {}: {source}", path.display())]
    File {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("write failed: {0}")]
    Write(#[source] io::Error),

    #[error("short body: sent {sent} of {expected} bytes")]
    ShortBody { expected: u64, sent: u64 },
}

/// Lógica que atiende una conexión desencolada
pub trait ConnectionHandler<C>: Send + Sync {
    /// Atiende una conexión. No debe cerrarla.
    fn handle(&self, conn: &mut C) -> Result<Served, HandlerError>;
}
