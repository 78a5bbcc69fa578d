//! # Content-Type
//! src/http/mime.rs

use std::path::Path;

/// Content-Type para servir `path`, según su extensión
///
/// Los tipos de texto se anuncian en UTF-8.
pub fn content_type(path: &Path) -> String {
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    if mime.type_() == mime_guess::mime::TEXT {
        format!("{}; charset=utf-8", mime.essence_str())
    } else {
        mime.essence_str().to_string()
    }
}
