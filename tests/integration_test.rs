//! Tests de integración para el servidor de archivos
//! tests/integration_test.rs
//!
//! Cada test levanta su propio `Server` en 127.0.0.1 con puerto efímero,
//! sirviendo un directorio temporal, y lo apaga con un `ShutdownHandle`.

use clap::Parser;
use file_server::config::Config;
use file_server::server::{ServeSummary, Server, ServerPhase, ShutdownHandle};
use std::fs;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tempfile::TempDir;

/// Servidor corriendo en un thread aparte
struct Running {
    addr: SocketAddr,
    shutdown: ShutdownHandle,
    thread: JoinHandle<Result<ServeSummary, file_server::error::ServerError>>,
    _dir: TempDir,
}

impl Running {
    fn stop(self) -> ServeSummary {
        self.shutdown.shutdown();
        self.thread
            .join()
            .expect("server thread panicked")
            .expect("server failed")
    }
}

fn start_server(extra: &[&str]) -> Running {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("index.txt"), "hello").unwrap();
    fs::write(dir.path().join("page.html"), "<h1>hi</h1>").unwrap();
    fs::write(dir.path().join("logo.png"), [0x89, b'P', b'N', b'G']).unwrap();
    fs::create_dir(dir.path().join("docs")).unwrap();
    fs::write(dir.path().join("docs").join("manual.pdf"), "%PDF-1.4").unwrap();

    let root = dir.path().to_str().unwrap().to_string();
    let mut args = vec!["file_server", root.as_str(), "0", "--host", "127.0.0.1"];
    args.extend_from_slice(extra);
    let config = Config::try_parse_from(args).unwrap();

    let server = Server::bind(config).expect("Failed to bind server");
    let addr = server.local_addr();
    let shutdown = server.shutdown_handle();
    let thread = thread::spawn(move || server.run());

    Running {
        addr,
        shutdown,
        thread,
        _dir: dir,
    }
}

/// Helper: envía un request crudo y retorna la response completa
fn send_raw(addr: SocketAddr, raw: &[u8]) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let mut stream = TcpStream::connect(addr)?;

    stream.set_read_timeout(Some(Duration::from_secs(5)))?;
    stream.set_write_timeout(Some(Duration::from_secs(5)))?;

    stream.write_all(raw)?;
    stream.flush()?;

    let mut response = Vec::new();
    stream.read_to_end(&mut response)?;

    Ok(response)
}

/// Helper: GET HTTP/1.0 de `path`
fn send_request(addr: SocketAddr, path: &str) -> Result<String, Box<dyn std::error::Error>> {
    let request = format!("GET {} HTTP/1.0\r\n\r\n", path);
    let response = send_raw(addr, request.as_bytes())?;
    Ok(String::from_utf8_lossy(&response).into_owned())
}

/// Helper: extrae el body de una response HTTP
fn extract_body(response: &str) -> &str {
    if let Some(pos) = response.find("\r\n\r\n") {
        &response[pos + 4..]
    } else {
        ""
    }
}

#[test]
fn test_serve_text_file() {
    let server = start_server(&[]);

    let response = send_request(server.addr, "/index.txt").expect("Failed to send request");

    assert_eq!(
        response,
        "HTTP/1.0 200 OK\r\nContent-Type: text/plain\r\nContent-Length: 5\r\n\r\nhello"
    );

    let summary = server.stop();
    assert_eq!(summary.served(), 1);
}

#[test]
fn test_content_types() {
    let server = start_server(&[]);

    let html = send_request(server.addr, "/page.html").unwrap();
    assert!(html.contains("Content-Type: text/html\r\n"));
    assert_eq!(extract_body(&html), "<h1>hi</h1>");

    let png = send_raw(server.addr, b"GET /logo.png HTTP/1.0\r\n\r\n").unwrap();
    let png_text = String::from_utf8_lossy(&png);
    assert!(png_text.contains("Content-Type: image/png\r\n"));
    assert!(png.ends_with(&[0x89, b'P', b'N', b'G']));

    let pdf = send_request(server.addr, "/docs/manual.pdf").unwrap();
    assert!(pdf.contains("Content-Type: application/pdf\r\n"));

    server.stop();
}

#[test]
fn test_missing_file_is_404() {
    let server = start_server(&[]);

    let response = send_request(server.addr, "/missing.txt").unwrap();
    assert_eq!(response, "HTTP/1.0 404 Not Found\r\nContent-Length: 0\r\n\r\n");

    let summary = server.stop();
    assert_eq!(summary.metrics.count_for(404), 1);
}

#[test]
fn test_traversal_and_directories_are_404() {
    let server = start_server(&[]);

    for path in ["/../etc/passwd", "/docs/../../secret", "/docs", "/"] {
        let response = send_request(server.addr, path).unwrap();
        assert!(
            response.starts_with("HTTP/1.0 404 Not Found\r\n"),
            "{} -> {}",
            path,
            response
        );
    }

    server.stop();
}

#[test]
fn test_malformed_request_is_400() {
    let server = start_server(&[]);

    let response = send_raw(server.addr, b"POST /index.txt HTTP/1.0\r\n\r\n").unwrap();
    assert!(String::from_utf8_lossy(&response).starts_with("HTTP/1.0 400 Bad Request\r\n"));

    // El worker sobrevive y sigue atendiendo
    let response = send_request(server.addr, "/index.txt").unwrap();
    assert!(response.starts_with("HTTP/1.0 200 OK\r\n"));

    let summary = server.stop();
    assert_eq!(summary.failed(), 1);
    assert_eq!(summary.served(), 1);
}

#[test]
fn test_sequential_connections() {
    let server = start_server(&[]);

    for _ in 0..100 {
        let response = send_request(server.addr, "/index.txt").unwrap();
        assert_eq!(extract_body(&response), "hello");
    }

    let summary = server.stop();
    assert_eq!(summary.served(), 100);
    assert_eq!(summary.metrics.accepted, 100);
}

#[test]
fn test_concurrent_clients_with_small_queue() {
    let server = start_server(&["--workers", "2", "--queue-capacity", "1"]);
    let addr = server.addr;

    let clients: Vec<_> = (0..20)
        .map(|_| thread::spawn(move || send_request(addr, "/index.txt").unwrap()))
        .collect();

    for client in clients {
        let response = client.join().unwrap();
        assert!(response.starts_with("HTTP/1.0 200 OK\r\n"));
    }

    let summary = server.stop();
    assert_eq!(summary.served(), 20);
    assert_eq!(summary.workers.len(), 2);
}

#[test]
fn test_shutdown_is_idempotent_and_stops_server() {
    let server = start_server(&[]);
    let extra = server.shutdown.clone();

    send_request(server.addr, "/index.txt").unwrap();

    extra.shutdown();
    let addr = server.addr;
    let summary = server.stop();

    assert_eq!(extra.phase(), ServerPhase::Stopped);
    assert_eq!(summary.leftover, 0);
    // El socket de escucha ya está cerrado
    assert!(TcpStream::connect(addr).is_err());
}
