//! # File Server - Entry Point
//! src/main.rs
//!
//! Uso: `file_server <serve-directory> <port> [opciones]`
//!
//! Códigos de salida: 0 tras un apagado ordenado (SIGINT); 1 ante un error de
//! uso, de arranque o una falla de sincronización.

use clap::Parser;
use file_server::config::Config;
use file_server::error::ServerError;
use file_server::server::{ServeSummary, Server, SignalWatcher};
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_thread_names(true)
        .init();

    let config = match Config::try_parse() {
        Ok(config) => config,
        Err(e) => {
            let _ = e.print();
            // --help y --version no son errores
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    config.print_summary();

    match serve(config) {
        Ok(summary) => {
            info!(
                served = summary.served(),
                failed = summary.failed(),
                "graceful shutdown complete"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            if e.is_setup() {
                error!(error = %e, "cannot start server");
            } else {
                error!(error = %e, "server stopped with a fatal error");
            }
            ExitCode::FAILURE
        }
    }
}

fn serve(config: Config) -> Result<ServeSummary, ServerError> {
    let server = Server::bind(config)?;
    // El watcher vive hasta que termina `run`
    let _signals = SignalWatcher::install(server.shutdown_handle())?;
    server.run()
}
