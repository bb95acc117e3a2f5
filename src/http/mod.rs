//! # Módulo HTTP
//!
//! Este módulo implementa el subconjunto de HTTP/1.0 que necesita un
//! servidor de archivos estáticos:
//!
//! - Lectura y parsing de `GET <path> HTTP/1.0`
//! - Construcción de responses
//! - Status codes
//! - Tipos MIME por extensión
//!
//! ## Protocolo HTTP/1.0
//!
//! El protocolo HTTP/1.0 (RFC 1945) es más simple que HTTP/1.1:
//! - No requiere el header `Host`
//! - No tiene chunked transfer encoding
//! - No mantiene conexiones persistentes: una request por conexión

pub mod mime;
pub mod request;
pub mod response;
pub mod status;

// Re-exportamos los tipos principales para facilitar su uso
pub use request::{ParseError, Request, RequestError};
pub use response::Response;
pub use status::StatusCode;
