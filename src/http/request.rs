//! # Parsing de Requests HTTP/1.0
//! src/http/request.rs
//!
//! Este módulo lee y parsea la request de un cliente.
//!
//! ## Formato aceptado
//!
//! ```text
//! GET /path HTTP/1.0\r\n
//! Host: localhost:8080\r\n
//! \r\n
//! ```
//!
//! Solo se reconoce `GET` con versión exacta `HTTP/1.0`. Cualquier otra
//! entrada es un error. La lectura termina al encontrar la línea vacía
//! (`\r\n\r\n`) que cierra los headers.

use std::collections::HashMap;
use std::io::{self, Read};
use thiserror::Error;

/// Tamaño máximo de la cabecera de una request
pub const MAX_REQUEST_SIZE: usize = 8192;

/// Terminador de la cabecera HTTP
const TERMINATOR: &[u8] = b"\r\n\r\n";

/// Errores que pueden ocurrir durante el parsing
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Request vacío
    #[error("Empty request")]
    EmptyRequest,

    /// Formato inválido de la request line
    #[error("Invalid request line format")]
    InvalidRequestLine,

    /// Método distinto de GET
    #[error("Unsupported HTTP method: {0}")]
    UnsupportedMethod(String),

    /// Versión distinta de HTTP/1.0
    #[error("Invalid HTTP version: {0}")]
    InvalidHttpVersion(String),

    /// Header malformado
    #[error("Invalid header: {0}")]
    InvalidHeader(String),
}

/// Errores al leer una request desde la conexión
#[derive(Debug, Error)]
pub enum RequestError {
    /// El cliente cerró sin enviar nada
    #[error("connection closed before any request byte")]
    ConnectionClosed,

    /// El cliente cerró antes del terminador `\r\n\r\n`
    #[error("connection closed before end of request headers")]
    Incomplete,

    /// La cabecera supera `MAX_REQUEST_SIZE`
    #[error("request headers exceed {} bytes", MAX_REQUEST_SIZE)]
    TooLarge,

    #[error("read failed: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl RequestError {
    /// Indica si tiene sentido responder `400 Bad Request` al cliente
    pub fn is_malformed(&self) -> bool {
        matches!(self, RequestError::Parse(_) | RequestError::TooLarge)
    }
}

/// Representa un request HTTP/1.0 parseado
#[derive(Debug, Clone)]
pub struct Request {
    /// Path decodificado, sin query string (ej: "/index.txt")
    path: String,

    /// Query string cruda, si existe (no se usa para resolver archivos)
    query: Option<String>,

    /// Headers HTTP (ej: {"Host": "localhost:8080"})
    headers: HashMap<String, String>,
}

impl Request {
    /// Lee desde `reader` hasta encontrar el terminador y parsea la cabecera.
    ///
    /// Los bytes que lleguen después del terminador se ignoran: una request
    /// GET no tiene body.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self, RequestError> {
        let mut buffer = Vec::with_capacity(512);
        let mut chunk = [0u8; 512];

        loop {
            let n = match reader.read(&mut chunk) {
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(RequestError::Io(e)),
            };

            if n == 0 {
                return Err(if buffer.is_empty() {
                    RequestError::ConnectionClosed
                } else {
                    RequestError::Incomplete
                });
            }

            // Buscar el terminador solo en la zona nueva (más 3 bytes de solape)
            let search_from = buffer.len().saturating_sub(TERMINATOR.len() - 1);
            buffer.extend_from_slice(&chunk[..n]);

            if let Some(pos) = find(&buffer[search_from..], TERMINATOR) {
                let end = search_from + pos + TERMINATOR.len();
                if end > MAX_REQUEST_SIZE {
                    return Err(RequestError::TooLarge);
                }
                return Ok(Self::parse(&buffer[..end])?);
            }

            if buffer.len() >= MAX_REQUEST_SIZE {
                return Err(RequestError::TooLarge);
            }
        }
    }

    /// Parsea una cabecera HTTP/1.0 completa
    ///
    /// # Ejemplo
    ///
    /// ```
    /// use file_server::http::Request;
    ///
    /// let raw = b"GET /index.txt HTTP/1.0\r\n\r\n";
    /// let request = Request::parse(raw).unwrap();
    ///
    /// assert_eq!(request.path(), "/index.txt");
    /// ```
    pub fn parse(buffer: &[u8]) -> Result<Self, ParseError> {
        let request_str =
            std::str::from_utf8(buffer).map_err(|_| ParseError::InvalidRequestLine)?;

        if request_str.trim().is_empty() {
            return Err(ParseError::EmptyRequest);
        }

        let mut lines = request_str.split("\r\n");
        let request_line = lines.next().ok_or(ParseError::InvalidRequestLine)?;

        let (path, query) = Self::parse_request_line(request_line)?;
        let headers = Self::parse_headers(lines)?;

        Ok(Request {
            path,
            query,
            headers,
        })
    }

    /// Formato: `GET /path HTTP/1.0`
    fn parse_request_line(line: &str) -> Result<(String, Option<String>), ParseError> {
        let parts: Vec<&str> = line.split(' ').collect();

        if parts.len() != 3 || parts.iter().any(|p| p.is_empty()) {
            return Err(ParseError::InvalidRequestLine);
        }

        if parts[0] != "GET" {
            return Err(ParseError::UnsupportedMethod(parts[0].to_string()));
        }

        if parts[2] != "HTTP/1.0" {
            return Err(ParseError::InvalidHttpVersion(parts[2].to_string()));
        }

        let target = parts[1];
        if !target.starts_with('/') {
            return Err(ParseError::InvalidRequestLine);
        }

        let (raw_path, query) = match target.split_once('?') {
            Some((path, query)) => (path, Some(query.to_string())),
            None => (target, None),
        };

        Ok((percent_decode(raw_path), query))
    }

    /// Cada header tiene formato: "Name: Value"
    fn parse_headers<'a>(
        lines: impl Iterator<Item = &'a str>,
    ) -> Result<HashMap<String, String>, ParseError> {
        let mut headers = HashMap::new();

        for line in lines {
            // La línea vacía marca el fin de los headers
            if line.is_empty() {
                break;
            }

            match line.split_once(':') {
                Some((name, value)) => {
                    headers.insert(name.trim().to_string(), value.trim().to_string());
                }
                None => return Err(ParseError::InvalidHeader(line.to_string())),
            }
        }

        Ok(headers)
    }

    /// Obtiene el path decodificado
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// Obtiene un header específico
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(|s| s.as_str())
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Decodifica escapes `%XX`. Las secuencias inválidas se dejan tal cual.
fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'%'
            && i + 2 < bytes.len()
            && bytes[i + 1].is_ascii_hexdigit()
            && bytes[i + 2].is_ascii_hexdigit()
        {
            out.push(hex_value(bytes[i + 1]) << 4 | hex_value(bytes[i + 2]));
            i += 3;
            continue;
        }
        out.push(bytes[i]);
        i += 1;
    }

    String::from_utf8_lossy(&out).into_owned()
}

// `digit` ya fue validado como hexadecimal
fn hex_value(digit: u8) -> u8 {
    match digit {
        b'0'..=b'9' => digit - b'0',
        b'a'..=b'f' => digit - b'a' + 10,
        _ => digit - b'A' + 10,
    }
}
