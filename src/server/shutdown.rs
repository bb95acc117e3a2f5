//! # Coordinador de Apagado
//! src/server/shutdown.rs
//!
//! Estado compartido entre el acceptor, el watcher de señales y quien quiera
//! apagar el servidor por código:
//! - flag de apagado solicitado (lo revisa el acceptor tras cada `accept`)
//! - token de cancelación de workers (solo en el camino fatal)
//! - fase del servidor: Running → Draining → Stopped (monótona)
//!
//! `accept` de la biblioteca estándar reintenta ante `EINTR`, así que la señal
//! sola no lo desbloquea. Al pedir el apagado se abre una conexión local al
//! socket de escucha: el acceptor despierta, ve el flag y sale del loop.

use crate::workers::CancelToken;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Tiempo máximo para la conexión que despierta al acceptor
const WAKE_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum ServerPhase {
    /// Aceptando y atendiendo conexiones
    Running = 0,
    /// Ya no se acepta nada; los workers vacían la cola
    Draining = 1,
    /// Workers unidos y recursos liberados
    Stopped = 2,
}

impl ServerPhase {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ServerPhase::Running,
            1 => ServerPhase::Draining,
            _ => ServerPhase::Stopped,
        }
    }
}

impl fmt::Display for ServerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ServerPhase::Running => "running",
            ServerPhase::Draining => "draining",
            ServerPhase::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

pub struct ShutdownCoordinator {
    requested: AtomicBool,
    cancel: CancelToken,
    phase: AtomicU8,
    wake_addr: SocketAddr,
}

impl ShutdownCoordinator {
    /// `listen_addr` es la dirección local del socket de escucha
    pub fn new(listen_addr: SocketAddr) -> Self {
        Self {
            requested: AtomicBool::new(false),
            cancel: CancelToken::new(),
            phase: AtomicU8::new(ServerPhase::Running as u8),
            wake_addr: wake_address(listen_addr),
        }
    }

    /// Marca el apagado y despierta al acceptor. Solo la primera llamada
    /// tiene efecto.
    pub fn request_shutdown(&self) {
        if self.requested.swap(true, Ordering::SeqCst) {
            debug!("shutdown already requested");
            return;
        }

        info!("shutdown requested");
        match TcpStream::connect_timeout(&self.wake_addr, WAKE_TIMEOUT) {
            Ok(_) => debug!(addr = %self.wake_addr, "acceptor woken"),
            // El acceptor igual verá el flag en su próximo accept
            Err(e) => warn!(addr = %self.wake_addr, error = %e, "cannot wake acceptor"),
        }
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Pide a los workers cerrar lo que quede sin atenderlo
    pub fn cancel_workers(&self) {
        warn!("cancelling workers");
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn phase(&self) -> ServerPhase {
        ServerPhase::from_u8(self.phase.load(Ordering::SeqCst))
    }

    /// Avanza a `next` si es posterior a la fase actual. Retorna si hubo
    /// transición.
    pub fn advance(&self, next: ServerPhase) -> bool {
        let previous = self.phase.fetch_max(next as u8, Ordering::SeqCst);
        let changed = previous < next as u8;
        if changed {
            info!(from = %ServerPhase::from_u8(previous), to = %next, "server phase changed");
        }
        changed
    }
}

/// Dirección a la que conectarse para despertar al acceptor. Un bind a la
/// dirección no especificada se alcanza por loopback.
fn wake_address(listen_addr: SocketAddr) -> SocketAddr {
    let ip = match listen_addr.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => IpAddr::V4(Ipv4Addr::LOCALHOST),
        IpAddr::V6(ip) if ip.is_unspecified() => IpAddr::V6(Ipv6Addr::LOCALHOST),
        ip => ip,
    };
    SocketAddr::new(ip, listen_addr.port())
}

/// Handle clonable para pedir el apagado desde otro thread. Sigue el mismo
/// camino que una interrupción (SIGINT).
#[derive(Clone)]
pub struct ShutdownHandle {
    coordinator: Arc<ShutdownCoordinator>,
}

impl ShutdownHandle {
    pub fn new(coordinator: Arc<ShutdownCoordinator>) -> Self {
        Self { coordinator }
    }

    pub fn shutdown(&self) {
        self.coordinator.request_shutdown();
    }

    pub fn phase(&self) -> ServerPhase {
        self.coordinator.phase()
    }
}
