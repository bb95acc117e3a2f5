//! # File Server
//! src/lib.rs
//!
//! Servidor HTTP/1.0 de archivos estáticos con un pool fijo de workers y una
//! cola acotada de conexiones entre el acceptor y los workers.
//!
//! ## Arquitectura
//!
//! ```text
//! accept → ConnectionQueue → worker (dequeue → handle → close)
//! ```
//!
//! - `queue`: cola FIFO acotada y thread-safe
//! - `workers`: pool fijo de threads y máscara de SIGINT
//! - `server`: acceptor, socket de escucha y apagado ordenado
//! - `handler`: contrato del handler de conexiones y archivos estáticos
//! - `http`: parsing de requests y formato de responses HTTP/1.0
//! - `metrics`: contadores y latencias
//! - `config`: argumentos de línea de comandos
//!
//! ## Ejemplo de uso
//!
//! ```no_run
//! use clap::Parser;
//! use file_server::config::Config;
//! use file_server::server::Server;
//!
//! let config = Config::parse_from(["file_server", "./public", "8080"]);
//! let server = Server::bind(config)?;
//! let summary = server.run()?;
//! println!("served {} connections", summary.served());
//! # Ok::<(), file_server::error::ServerError>(())
//! ```

pub mod config;
pub mod error;
pub mod handler;
pub mod http;
pub mod metrics;
pub mod queue;
pub mod server;
pub mod workers;
