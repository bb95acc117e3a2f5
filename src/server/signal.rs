//! # Watcher de SIGINT
//! src/server/signal.rs
//!
//! El handler que instala `signal-hook` solo escribe en un self-pipe (es
//! async-signal-safe). Un thread dedicado lee ese pipe y pide el apagado al
//! coordinador, fuera del contexto de la señal.

use super::shutdown::ShutdownHandle;
use crate::error::ServerError;
use signal_hook::consts::SIGINT;
use signal_hook::iterator::{Handle, Signals};
use std::thread::{self, JoinHandle};
use tracing::{debug, info};

/// Mantiene instalado el handler de SIGINT mientras vive
pub struct SignalWatcher {
    handle: Handle,
    thread: Option<JoinHandle<()>>,
}

impl SignalWatcher {
    pub fn install(shutdown: ShutdownHandle) -> Result<Self, ServerError> {
        let mut signals = Signals::new([SIGINT]).map_err(ServerError::Signal)?;
        let handle = signals.handle();

        let thread = thread::Builder::new()
            .name("signal".into())
            .spawn(move || {
                for signal in signals.forever() {
                    info!(signal, "interrupt received");
                    shutdown.shutdown();
                }
                debug!("signal watcher finished");
            })
            .map_err(|e| {
                handle.close();
                ServerError::Signal(e)
            })?;

        Ok(Self {
            handle,
            thread: Some(thread),
        })
    }
}

impl Drop for SignalWatcher {
    fn drop(&mut self) {
        self.handle.close();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}
