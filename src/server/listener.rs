//! # Socket de Escucha
//! src/server/listener.rs
//!
//! Crea el socket con `socket2` para poder fijar `SO_REUSEADDR` y el backlog
//! del kernel (independiente de la capacidad de la cola de la aplicación).
//! Se prueba cada dirección resuelta hasta que una acepte el bind.

use crate::error::ServerError;
use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{SocketAddr, TcpListener, ToSocketAddrs};
use tracing::{debug, info};

/// Resuelve `address` y deja escuchando el primer candidato que funcione
pub fn bind(address: &str, backlog: i32) -> Result<TcpListener, ServerError> {
    let candidates = address
        .to_socket_addrs()
        .map_err(|source| ServerError::Resolve {
            address: address.to_string(),
            source,
        })?;

    let mut last_error = None;
    for addr in candidates {
        match bind_one(addr, backlog) {
            Ok(listener) => {
                info!(%addr, backlog, "listening");
                return Ok(listener);
            }
            Err(e) => {
                debug!(%addr, error = %e, "bind candidate failed");
                last_error = Some(e);
            }
        }
    }

    Err(ServerError::Bind {
        address: address.to_string(),
        source: last_error.unwrap_or_else(|| {
            io::Error::new(io::ErrorKind::AddrNotAvailable, "no addresses resolved")
        }),
    })
}

fn bind_one(addr: SocketAddr, backlog: i32) -> io::Result<TcpListener> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.bind(&addr.into())?;
    socket.listen(backlog)?;
    Ok(socket.into())
}
