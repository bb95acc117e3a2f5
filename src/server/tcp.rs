//! # Servidor TCP con Pool Fijo
//! src/server/tcp.rs
//!
//! El thread que llama a `run` es el acceptor: acepta conexiones y las encola.
//! Si la cola está llena, `enqueue` bloquea y el acceptor deja de aceptar;
//! las conexiones nuevas esperan en el backlog del kernel (backpressure).
//!
//! ## Apagado
//!
//! Orden estricto al salir del loop de accept:
//! 1. se deja de aceptar (fase Draining)
//! 2. `queue.shutdown()` despierta a todos los workers
//! 3. join de los N workers, que vacían lo ya encolado
//! 4. se libera la cola
//! 5. se cierra el socket de escucha (fase Stopped)
//!
//! Ante una falla fatal (accept o lock envenenado) se cancelan los workers
//! antes del paso 2: cierran lo que quede sin atenderlo.

use super::listener;
use super::shutdown::{ServerPhase, ShutdownCoordinator, ShutdownHandle};
use crate::config::Config;
use crate::error::ServerError;
use crate::handler::{ConnectionHandler, StaticFiles};
use crate::metrics::{MetricsCollector, MetricsSnapshot};
use crate::queue::{ConnectionQueue, EnqueueError, QueuePoisoned};
use crate::workers::{WorkerPool, WorkerReport};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Handler compartido por todos los workers
pub type SharedHandler = Arc<dyn ConnectionHandler<TcpStream>>;

/// Resultado de una ejecución completa del servidor
#[derive(Debug, Clone)]
pub struct ServeSummary {
    /// Reporte de cada worker, en orden de id
    pub workers: Vec<WorkerReport>,

    /// Conexiones que seguían en la cola al liberarla (0 en un apagado normal)
    pub leftover: usize,

    pub metrics: MetricsSnapshot,
}

impl ServeSummary {
    pub fn served(&self) -> u64 {
        self.workers.iter().map(|w| w.served).sum()
    }

    pub fn failed(&self) -> u64 {
        self.workers.iter().map(|w| w.failed).sum()
    }
}

pub struct Server {
    config: Config,
    listener: TcpListener,
    local_addr: SocketAddr,
    queue: Arc<ConnectionQueue<TcpStream>>,
    handler: SharedHandler,
    coordinator: Arc<ShutdownCoordinator>,
    metrics: MetricsCollector,
}

impl Server {
    /// Valida la configuración y deja el socket escuchando, sirviendo
    /// archivos de `config.serve_dir`
    pub fn bind(config: Config) -> Result<Self, ServerError> {
        let handler = Arc::new(StaticFiles::new(config.serve_dir.clone()));
        Self::with_handler(config, handler)
    }

    /// Igual que `bind` pero con un handler arbitrario
    pub fn with_handler(config: Config, handler: SharedHandler) -> Result<Self, ServerError> {
        config.validate().map_err(ServerError::Config)?;

        let address = config.address();
        let listener = listener::bind(&address, config.backlog)?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| ServerError::Bind { address, source })?;

        Ok(Self {
            queue: Arc::new(ConnectionQueue::new(config.queue_capacity)),
            coordinator: Arc::new(ShutdownCoordinator::new(local_addr)),
            metrics: MetricsCollector::new(),
            config,
            listener,
            local_addr,
            handler,
        })
    }

    /// Dirección real de escucha (útil con puerto 0)
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle::new(Arc::clone(&self.coordinator))
    }

    pub fn metrics(&self) -> MetricsCollector {
        self.metrics.clone()
    }

    /// Atiende conexiones hasta que se pida el apagado y luego ejecuta la
    /// secuencia de apagado completa.
    pub fn run(self) -> Result<ServeSummary, ServerError> {
        let Server {
            config,
            listener,
            local_addr,
            queue,
            handler,
            coordinator,
            metrics,
        } = self;

        let pool = WorkerPool::spawn(
            config.workers,
            Arc::clone(&queue),
            handler,
            coordinator.cancel_token(),
            metrics.clone(),
        )?;

        info!(
            address = %local_addr,
            workers = pool.size(),
            queue_capacity = queue.capacity(),
            "accepting connections"
        );

        let accepted = accept_loop(&listener, &queue, &coordinator, &metrics);
        if let Err(e) = &accepted {
            error!(error = %e, "fatal error in acceptor, emergency shutdown");
            coordinator.cancel_workers();
        }

        // 1. ya no se acepta nada
        coordinator.advance(ServerPhase::Draining);

        // 2. despertar a todos los workers
        let closed = queue.shutdown();
        if closed.is_err() {
            error!("connection queue lock poisoned during shutdown");
            coordinator.cancel_workers();
        }

        // 3. esperar a que vacíen la cola
        let mut reports = Vec::with_capacity(pool.size());
        let mut failed_workers = 0;
        for result in pool.join() {
            match result {
                Ok(report) => {
                    debug!(
                        worker = report.worker,
                        served = report.served,
                        failed = report.failed,
                        discarded = report.discarded,
                        "worker joined"
                    );
                    reports.push(report);
                }
                Err(e) => {
                    error!(error = %e, "worker terminated abnormally");
                    failed_workers += 1;
                }
            }
        }

        // 4. liberar la cola; los workers ya no la referencian
        let leftover = match Arc::try_unwrap(queue) {
            Ok(queue) => queue.release().len(),
            Err(_) => return Err(ServerError::QueueInUse),
        };
        if leftover > 0 {
            warn!(leftover, "connections closed without being served");
        }

        // 5. cerrar el socket de escucha
        drop(listener);
        coordinator.advance(ServerPhase::Stopped);

        let snapshot = metrics.snapshot();
        info!(metrics = %snapshot.to_json(), "server stopped");

        accepted?;
        closed?;
        if failed_workers > 0 {
            return Err(ServerError::Workers {
                failed: failed_workers,
            });
        }

        Ok(ServeSummary {
            workers: reports,
            leftover,
            metrics: snapshot,
        })
    }
}

/// Loop del acceptor. Retorna `Ok` cuando se pidió el apagado y `Err` ante
/// una falla que obliga al apagado de emergencia.
fn accept_loop(
    listener: &TcpListener,
    queue: &ConnectionQueue<TcpStream>,
    coordinator: &ShutdownCoordinator,
    metrics: &MetricsCollector,
) -> Result<(), ServerError> {
    loop {
        let (stream, peer) = match listener.accept() {
            Ok(accepted) => accepted,
            Err(e) if coordinator.is_shutdown_requested() => {
                debug!(error = %e, "accept interrupted by shutdown");
                return Ok(());
            }
            // `accept` ya reintenta ante EINTR: cualquier otro error es fatal
            Err(e) => return Err(ServerError::Accept(e)),
        };

        // Incluye la conexión de aviso del coordinador
        if coordinator.is_shutdown_requested() {
            debug!(%peer, "shutdown requested, closing connection unserved");
            drop(stream);
            return Ok(());
        }

        match queue.enqueue(stream) {
            Ok(()) => {
                metrics.record_accepted();
                debug!(%peer, queued = queue.len(), "connection queued");
            }
            Err(EnqueueError::ShutDown(stream)) => {
                metrics.record_rejected();
                debug!(%peer, "queue shut down, connection rejected");
                drop(stream);
                return Ok(());
            }
            Err(EnqueueError::Poisoned(stream)) => {
                drop(stream);
                return Err(QueuePoisoned.into());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{HandlerError, Served};
    use clap::Parser;
    use std::fs;
    use std::io::{Read, Write};
    use std::sync::{mpsc, Mutex};
    use std::thread;
    use std::time::{Duration, Instant};
    use tempfile::TempDir;

    const PATIENCE: Duration = Duration::from_secs(10);

    fn serve_dir() -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("index.txt"), "hello").unwrap();
        dir
    }

    fn test_config(dir: &TempDir, extra: &[&str]) -> Config {
        let root = dir.path().to_str().unwrap();
        let mut args = vec!["file_server", root, "0", "--host", "127.0.0.1"];
        args.extend_from_slice(extra);
        Config::try_parse_from(args).unwrap()
    }

    fn get(addr: SocketAddr, path: &str) -> String {
        let mut stream = TcpStream::connect(addr).unwrap();
        write!(stream, "GET {} HTTP/1.0\r\n\r\n", path).unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).unwrap();
        response
    }

    fn wait_until(what: &str, mut condition: impl FnMut() -> bool) {
        let deadline = Instant::now() + PATIENCE;
        while !condition() {
            assert!(Instant::now() < deadline, "timed out waiting for {}", what);
            thread::sleep(Duration::from_millis(10));
        }
    }

    /// Delega en `StaticFiles` pero solo avanza cuando recibe permiso
    struct Gated {
        inner: StaticFiles,
        permits: Mutex<mpsc::Receiver<()>>,
    }

    impl ConnectionHandler<TcpStream> for Gated {
        fn handle(&self, conn: &mut TcpStream) -> Result<Served, HandlerError> {
            self.permits.lock().unwrap().recv().unwrap();
            self.inner.handle(conn)
        }
    }

    #[test]
    fn test_serves_file_and_shuts_down() {
        let dir = serve_dir();
        let server = Server::bind(test_config(&dir, &[])).unwrap();
        let addr = server.local_addr();
        let shutdown = server.shutdown_handle();

        let running = thread::spawn(move || server.run());

        let response = get(addr, "/index.txt");
        assert!(response.starts_with("HTTP/1.0 200 OK\r\n"));
        assert!(response.ends_with("\r\n\r\nhello"));

        shutdown.shutdown();
        let summary = running.join().unwrap().unwrap();
        assert_eq!(summary.served(), 1);
        assert_eq!(summary.workers.len(), 5);
        assert_eq!(summary.leftover, 0);
        assert_eq!(summary.metrics.count_for(200), 1);
        assert_eq!(shutdown.phase(), ServerPhase::Stopped);
    }

    #[test]
    fn test_graceful_shutdown_drains_queued_connections() {
        let dir = serve_dir();
        let (permit_tx, permit_rx) = mpsc::channel();
        let handler = Arc::new(Gated {
            inner: StaticFiles::new(dir.path()),
            permits: Mutex::new(permit_rx),
        });

        let config = test_config(&dir, &["--workers", "1", "--queue-capacity", "5"]);
        let server = Server::with_handler(config, handler).unwrap();
        let addr = server.local_addr();
        let shutdown = server.shutdown_handle();
        let metrics = server.metrics();

        let running = thread::spawn(move || server.run());

        let clients: Vec<TcpStream> = (0..4)
            .map(|_| {
                let mut stream = TcpStream::connect(addr).unwrap();
                stream.write_all(b"GET /index.txt HTTP/1.0\r\n\r\n").unwrap();
                stream
            })
            .collect();

        // El único worker está bloqueado en la primera; el resto quedó encolado
        wait_until("4 accepted connections", || metrics.snapshot().accepted == 4);

        shutdown.shutdown();
        wait_until("draining phase", || shutdown.phase() == ServerPhase::Draining);

        for _ in 0..4 {
            permit_tx.send(()).unwrap();
        }

        for mut client in clients {
            let mut response = String::new();
            client.read_to_string(&mut response).unwrap();
            assert!(response.starts_with("HTTP/1.0 200 OK\r\n"), "{}", response);
        }

        let summary = running.join().unwrap().unwrap();
        assert_eq!(summary.served(), 4);
        assert_eq!(summary.metrics.accepted, 4);
        assert_eq!(summary.leftover, 0);
    }

    #[test]
    fn test_shutdown_before_run_exits_immediately() {
        let dir = serve_dir();
        let server = Server::bind(test_config(&dir, &[])).unwrap();
        server.shutdown_handle().shutdown();

        let summary = server.run().unwrap();
        assert_eq!(summary.served(), 0);
        assert_eq!(summary.metrics.accepted, 0);
    }

    #[test]
    fn test_invalid_config_is_rejected_before_bind() {
        let dir = serve_dir();
        let config = test_config(&dir, &["--workers", "0"]);

        match Server::bind(config) {
            Err(ServerError::Config(message)) => assert!(message.contains("workers")),
            other => panic!("expected config error, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_handler_failures_are_counted_not_fatal() {
        let dir = serve_dir();
        let server = Server::bind(test_config(&dir, &["--workers", "2"])).unwrap();
        let addr = server.local_addr();
        let shutdown = server.shutdown_handle();

        let running = thread::spawn(move || server.run());

        // Conexión cerrada sin enviar nada y request malformada
        drop(TcpStream::connect(addr).unwrap());
        let bad = get(addr, "not-a-path");
        assert!(bad.starts_with("HTTP/1.0 400 Bad Request\r\n"));

        // El servidor sigue atendiendo
        let missing = get(addr, "/missing.txt");
        assert_eq!(missing, "HTTP/1.0 404 Not Found\r\nContent-Length: 0\r\n\r\n");

        shutdown.shutdown();
        let summary = running.join().unwrap().unwrap();
        assert_eq!(summary.failed(), 2);
        assert_eq!(summary.served(), 1);
    }

    #[test]
    fn test_poisoned_queue_triggers_emergency_shutdown() {
        let dir = serve_dir();
        let server = Server::bind(test_config(&dir, &["--workers", "2"])).unwrap();
        let addr = server.local_addr();
        let shutdown = server.shutdown_handle();
        let metrics = server.metrics();
        server.queue.poison();

        // Queda en el backlog hasta que el acceptor la tome
        let mut client = TcpStream::connect(addr).unwrap();
        client.set_read_timeout(Some(PATIENCE)).unwrap();

        match server.run() {
            Err(ServerError::QueuePoisoned(_)) => {}
            other => panic!("expected poisoned queue, got {:?}", other),
        }

        // Cerrada sin atender: EOF sin ningún byte de respuesta
        let mut response = Vec::new();
        client.read_to_end(&mut response).unwrap();
        assert!(response.is_empty());

        assert_eq!(shutdown.phase(), ServerPhase::Stopped);
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.accepted, 0);
        assert_eq!(snapshot.served, 0);
    }
}
