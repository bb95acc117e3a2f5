//! # Servidor de Archivos Estáticos
//! src/handler/static_files.rs
//!
//! Implementación de `ConnectionHandler` que resuelve el path pedido dentro
//! del directorio servido y envía el archivo.
//!
//! - Archivo regular existente → `200 OK`, `Content-Type` (si la extensión se
//!   conoce), `Content-Length` exacto y los bytes del archivo
//! - Cualquier otra cosa → `404 Not Found` con `Content-Length: 0`
//! - Request malformada → `400 Bad Request` (best effort) y error

use super::{ConnectionHandler, HandlerError, Served};
use crate::http::mime::content_type_for;
use crate::http::{Request, Response, StatusCode};
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Sirve archivos desde un directorio raíz inmutable
#[derive(Debug, Clone)]
pub struct StaticFiles {
    root: PathBuf,
}

impl StaticFiles {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Traduce el path de la request a un path dentro de `root`.
    ///
    /// Retorna `None` si el path intenta salir del directorio (`..`).
    pub fn resolve(&self, request_path: &str) -> Option<PathBuf> {
        let relative = Path::new(request_path.trim_start_matches('/'));
        let mut resolved = self.root.clone();

        for component in relative.components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return None
                }
            }
        }

        Some(resolved)
    }

    fn send_not_found<C: Write>(conn: &mut C, path: String) -> Result<Served, HandlerError> {
        let response = Response::new(StatusCode::NotFound).with_body_bytes(Vec::new());
        response.write_to(conn).map_err(HandlerError::Write)?;

        Ok(Served {
            path,
            status: response.status(),
            body_bytes: response.body().len() as u64,
        })
    }

    fn send_file<C: Write>(
        conn: &mut C,
        path: String,
        file_path: &Path,
    ) -> Result<Served, HandlerError> {
        let file_error = |source| HandlerError::File {
            path: file_path.to_path_buf(),
            source,
        };

        let mut file = File::open(file_path).map_err(file_error)?;
        let length = file.metadata().map_err(file_error)?.len();

        let response = Response::new(StatusCode::Ok)
            .with_content_type(content_type_for(file_path))
            .with_content_length(length);
        debug!(
            content_type = response.header("Content-Type").unwrap_or("-"),
            length,
            "sending file"
        );
        conn.write_all(&response.head_bytes()).map_err(HandlerError::Write)?;

        // Nunca enviar más de lo anunciado aunque el archivo crezca
        let sent = io::copy(&mut (&mut file).take(length), conn).map_err(HandlerError::Write)?;
        conn.flush().map_err(HandlerError::Write)?;

        if sent != length {
            return Err(HandlerError::ShortBody {
                expected: length,
                sent,
            });
        }

        Ok(Served {
            path,
            status: response.status(),
            body_bytes: sent,
        })
    }
}

impl<C: Read + Write> ConnectionHandler<C> for StaticFiles {
    fn handle(&self, conn: &mut C) -> Result<Served, HandlerError> {
        let request = match Request::read_from(conn) {
            Ok(request) => request,
            Err(e) => {
                if e.is_malformed() {
                    // El cliente puede ya no estar escuchando: se ignora el fallo
                    let _ = Response::new(StatusCode::BadRequest)
                        .with_body_bytes(Vec::new())
                        .write_to(conn);
                }
                return Err(e.into());
            }
        };

        let path = request.path().to_string();
        debug!(
            path = %path,
            query = request.query().unwrap_or(""),
            host = request.header("Host").unwrap_or("-"),
            "request parsed"
        );

        let Some(file_path) = self.resolve(&path) else {
            debug!(path = %path, "path escapes serve directory");
            return Self::send_not_found(conn, path);
        };

        match fs::metadata(&file_path) {
            Ok(metadata) if metadata.is_file() => Self::send_file(conn, path, &file_path),
            _ => Self::send_not_found(conn, path),
        }
    }
}
