//! # Pool Fijo de Workers
//! src/workers/pool.rs
//!
//! N threads creados una sola vez al arrancar y unidos (join) una sola vez al
//! apagar. Cada worker repite:
//!
//! ```text
//! dequeue → handle → close
//! ```
//!
//! hasta que la cola está cerrada y vacía. Un fallo del handler nunca termina
//! al worker; un lock envenenado en la cola sí (es irrecuperable).

use super::signal_mask::InterruptMask;
use crate::handler::ConnectionHandler;
use crate::metrics::MetricsCollector;
use crate::queue::{ConnectionQueue, DequeueError};
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Flag de cancelación cooperativa.
///
/// Solo se activa en el camino de falla fatal: los workers siguen vaciando
/// la cola pero cierran cada conexión sin atenderla.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Resumen de lo que hizo un worker antes de terminar
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerReport {
    pub worker: usize,

    /// Conexiones atendidas por el handler con éxito
    pub served: u64,

    /// Conexiones en las que el handler retornó error (o hizo panic)
    pub failed: u64,

    /// Conexiones cerradas sin atender por cancelación
    pub discarded: u64,
}

/// Terminación anormal de un worker
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkerError {
    #[error("worker {worker}: connection queue lock poisoned")]
    QueuePoisoned { worker: usize },

    #[error("worker {worker} panicked")]
    Panicked { worker: usize },
}

/// Error al crear el pool
#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("cannot change signal mask: {0}")]
    SignalMask(#[source] io::Error),

    #[error("cannot spawn worker {worker}: {source}")]
    Thread {
        worker: usize,
        #[source]
        source: io::Error,
    },
}

struct Worker {
    id: usize,
    handle: JoinHandle<Result<WorkerReport, WorkerError>>,
}

/// Pool de tamaño fijo que vacía una `ConnectionQueue` compartida
pub struct WorkerPool {
    workers: Vec<Worker>,
}

impl WorkerPool {
    /// Crea `size` workers con SIGINT bloqueado.
    ///
    /// Si algún thread no se puede crear, los ya creados se detienen de forma
    /// cooperativa (cancelación + cierre de la cola + join) antes de retornar
    /// el error.
    pub fn spawn<C>(
        size: usize,
        queue: Arc<ConnectionQueue<C>>,
        handler: Arc<dyn ConnectionHandler<C>>,
        cancel: CancelToken,
        metrics: MetricsCollector,
    ) -> Result<Self, SpawnError>
    where
        C: Send + 'static,
    {
        let mask = InterruptMask::block().map_err(SpawnError::SignalMask)?;
        let mut workers = Vec::with_capacity(size);

        for id in 0..size {
            let queue_ref = Arc::clone(&queue);
            let handler = Arc::clone(&handler);
            let cancel_ref = cancel.clone();
            let metrics = metrics.clone();

            let spawned = thread::Builder::new()
                .name(format!("worker-{}", id))
                .spawn(move || worker_loop(id, &queue_ref, handler.as_ref(), &cancel_ref, &metrics));

            match spawned {
                Ok(handle) => workers.push(Worker { id, handle }),
                Err(source) => {
                    drop(mask);
                    error!(worker = id, error = %source, "cannot spawn worker, stopping pool");
                    Self::abort(workers, &queue, &cancel);
                    return Err(SpawnError::Thread { worker: id, source });
                }
            }
        }

        if let Err(e) = mask.restore() {
            Self::abort(workers, &queue, &cancel);
            return Err(SpawnError::SignalMask(e));
        }

        info!(workers = size, "worker pool started");
        Ok(Self { workers })
    }

    // Detiene workers ya creados sin forzar su terminación
    fn abort<C>(workers: Vec<Worker>, queue: &ConnectionQueue<C>, cancel: &CancelToken) {
        cancel.cancel();
        if queue.shutdown().is_err() {
            error!("connection queue lock poisoned while aborting pool");
        }
        for worker in workers {
            let _ = worker.handle.join();
        }
    }

    /// Número de workers
    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Espera a que todos los workers terminen.
    ///
    /// Solo retorna cuando la cola fue cerrada y vaciada. El resultado de
    /// cada worker se reporta en orden de id.
    pub fn join(self) -> Vec<Result<WorkerReport, WorkerError>> {
        self.workers
            .into_iter()
            .map(|worker| match worker.handle.join() {
                Ok(result) => result,
                Err(_) => Err(WorkerError::Panicked { worker: worker.id }),
            })
            .collect()
    }
}

/// Loop principal del worker
fn worker_loop<C>(
    id: usize,
    queue: &ConnectionQueue<C>,
    handler: &dyn ConnectionHandler<C>,
    cancel: &CancelToken,
    metrics: &MetricsCollector,
) -> Result<WorkerReport, WorkerError> {
    debug!(worker = id, "worker started");

    let mut report = WorkerReport {
        worker: id,
        ..WorkerReport::default()
    };

    loop {
        // Desde aquí la conexión pertenece solo a este worker
        let mut conn = match queue.dequeue() {
            Ok(conn) => conn,
            Err(DequeueError::Closed) => {
                debug!(
                    worker = id,
                    served = report.served,
                    failed = report.failed,
                    "queue closed and drained, worker exiting"
                );
                return Ok(report);
            }
            Err(DequeueError::Poisoned) => {
                error!(worker = id, "connection queue lock poisoned, worker exiting");
                return Err(WorkerError::QueuePoisoned { worker: id });
            }
        };

        if cancel.is_cancelled() {
            report.discarded += 1;
            drop(conn);
            continue;
        }

        let start = Instant::now();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler.handle(&mut conn)));

        match outcome {
            Ok(Ok(served)) => {
                report.served += 1;
                metrics.record_request(&served.path, served.status.as_u16(), start.elapsed());
                if served.status.is_success() {
                    info!(worker = id, path = %served.path, status = %served.status, "served");
                } else {
                    info!(worker = id, path = %served.path, status = %served.status, "served error response");
                }
            }
            Ok(Err(e)) => {
                report.failed += 1;
                metrics.record_failure();
                warn!(worker = id, error = %e, "connection failed");
            }
            Err(_) => {
                report.failed += 1;
                metrics.record_failure();
                error!(worker = id, "handler panicked, connection dropped");
            }
        }

        drop(conn);
    }
}
