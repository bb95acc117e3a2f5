//! # Configuración del Servidor
//! src/config.rs
//!
//! Argumentos de línea de comandos. No se leen variables de entorno.
//!
//! ## Ejemplo de uso
//!
//! ```bash
//! ./file_server ./public 8080
//! ./file_server ./public 8080 --workers 8 --queue-capacity 16 --backlog 32
//! ```

use clap::Parser;
use std::path::PathBuf;
use tracing::info;

pub const DEFAULT_WORKERS: usize = 5;
pub const DEFAULT_QUEUE_CAPACITY: usize = 5;
pub const DEFAULT_BACKLOG: i32 = 5;

/// Configuración del servidor de archivos HTTP/1.0
#[derive(Debug, Clone, Parser)]
#[command(name = "file_server")]
#[command(about = "Servidor HTTP/1.0 de archivos estáticos con pool fijo de workers")]
#[command(version)]
pub struct Config {
    /// Directorio desde el que se sirven los archivos
    pub serve_dir: PathBuf,

    /// Puerto en el que escucha el servidor
    pub port: u16,

    /// Host/IP en el que escucha
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    /// Número de workers del pool
    #[arg(short, long, default_value_t = DEFAULT_WORKERS)]
    pub workers: usize,

    /// Capacidad de la cola de conexiones aceptadas
    #[arg(long = "queue-capacity", default_value_t = DEFAULT_QUEUE_CAPACITY)]
    pub queue_capacity: usize,

    /// Conexiones pendientes que el kernel mantiene antes del accept
    #[arg(long, default_value_t = DEFAULT_BACKLOG, allow_negative_numbers = true)]
    pub backlog: i32,
}

impl Config {
    /// Obtiene la dirección completa para bind (host:port)
    ///
    /// # Ejemplo
    /// ```rust
    /// use clap::Parser;
    /// use file_server::config::Config;
    ///
    /// let config = Config::parse_from(["file_server", ".", "8080"]);
    /// assert_eq!(config.address(), "0.0.0.0:8080");
    /// ```
    pub fn address(&self) -> String {
        // Literal IPv6 sin corchetes
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Valida la configuración
    ///
    /// Retorna errores si hay valores inválidos
    pub fn validate(&self) -> Result<(), String> {
        if self.workers == 0 {
            return Err("workers must be >= 1".to_string());
        }
        if self.queue_capacity == 0 {
            return Err("queue capacity must be >= 1".to_string());
        }
        if self.backlog <= 0 {
            return Err("backlog must be > 0".to_string());
        }
        if !self.serve_dir.is_dir() {
            return Err(format!(
                "serve directory {} does not exist or is not a directory",
                self.serve_dir.display()
            ));
        }
        Ok(())
    }

    /// Registra un resumen de la configuración
    pub fn print_summary(&self) {
        info!(
            address = %self.address(),
            serve_dir = %self.serve_dir.display(),
            workers = self.workers,
            queue_capacity = self.queue_capacity,
            backlog = self.backlog,
            "configuration"
        );
    }
}

impl Default for Config {
    /// Configuración por defecto
    fn default() -> Self {
        Self {
            serve_dir: PathBuf::from("."),
            port: 8080,
            host: "0.0.0.0".to_string(),
            workers: DEFAULT_WORKERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            backlog: DEFAULT_BACKLOG,
        }
    }
}
