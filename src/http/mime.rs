//! # Tipos MIME
//!
//! Mapeo fijo de extensión de archivo a `Content-Type`. Una extensión
//! desconocida no produce header.

use std::path::Path;

/// Tabla de extensiones soportadas
const MIME_TYPES: &[(&str, &str)] = &[
    ("txt", "text/plain"),
    ("html", "text/html"),
    ("jpg", "image/jpeg"),
    ("png", "image/png"),
    ("pdf", "application/pdf"),
];

/// Retorna el `Content-Type` para la extensión de `path`, si se conoce.
///
/// La comparación distingue mayúsculas: `.TXT` no es `.txt`.
///
/// # Ejemplo
/// ```
/// use file_server::http::mime::content_type_for;
/// use std::path::Path;
///
/// assert_eq!(content_type_for(Path::new("index.txt")), Some("text/plain"));
/// assert_eq!(content_type_for(Path::new("archive.tar")), None);
/// ```
pub fn content_type_for(path: &Path) -> Option<&'static str> {
    let extension = path.extension()?.to_str()?;
    MIME_TYPES
        .iter()
        .find(|(ext, _)| *ext == extension)
        .map(|(_, mime)| *mime)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_extensions() {
        assert_eq!(content_type_for(Path::new("a.txt")), Some("text/plain"));
        assert_eq!(content_type_for(Path::new("a.html")), Some("text/html"));
        assert_eq!(content_type_for(Path::new("a.jpg")), Some("image/jpeg"));
        assert_eq!(content_type_for(Path::new("a.png")), Some("image/png"));
        assert_eq!(content_type_for(Path::new("dir/a.pdf")), Some("application/pdf"));
    }

    #[test]
    fn test_unknown_or_missing_extension() {
        assert_eq!(content_type_for(Path::new("a.jpeg")), None);
        assert_eq!(content_type_for(Path::new("Makefile")), None);
        assert_eq!(content_type_for(Path::new("a.TXT")), None);
    }
}
