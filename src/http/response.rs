//! # Construcción de Respuestas HTTP
//! src/http/response.rs
//!
//! Una respuesta se divide en dos partes que se envían por separado:
//!
//! - **head**: status line + headers + línea vacía, serializado a bytes
//! - **body**: bytes en memoria o un archivo abierto que se lee por chunks
//!
//! ```text
//! HTTP/1.1 404 Not Found\r\n
//! Content-Length: 97\r\n
//! Content-Type: text/html; charset=utf-8\r\n
//! Connection: close\r\n
//! Server: reactor_httpd\r\n
//! \r\n
//! <html>...
//! ```

use super::StatusCode;
use std::fs::File;

/// Valor del header `Server`
pub const SERVER_NAME: &str = concat!("reactor_httpd/", env!("CARGO_PKG_VERSION"));

/// Origen del body
#[derive(Debug, Default)]
pub enum Body {
    #[default]
    Empty,
    Bytes(Vec<u8>),
    File { file: File, len: u64 },
}

impl Body {
    pub fn len(&self) -> u64 {
        match self {
            Body::Empty => 0,
            Body::Bytes(bytes) => bytes.len() as u64,
            Body::File { len, .. } => *len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Representa una respuesta HTTP/1.1 completa
#[derive(Debug)]
pub struct Response {
    status: StatusCode,

    /// Headers en orden de inserción
    headers: Vec<(String, String)>,

    body: Body,
}

impl Response {
    /// Crea una nueva respuesta con el código de estado especificado
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Body::Empty,
        }
    }

    /// Agrega un header; si ya existe (sin distinguir mayúsculas) se sobrescribe
    ///
    /// # Ejemplo
    /// ```
    /// use reactor_httpd::http::{Response, StatusCode};
    ///
    /// let response = Response::new(StatusCode::Ok)
    ///     .with_header("Connection", "keep-alive");
    /// assert_eq!(response.header("connection"), Some("keep-alive"));
    /// ```
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.add_header(name, value);
        self
    }

    /// Versión mutable de [`with_header`](Self::with_header)
    pub fn add_header(&mut self, name: &str, value: &str) {
        match self
            .headers
            .iter_mut()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
        {
            Some(entry) => entry.1 = value.to_string(),
            None => self.headers.push((name.to_string(), value.to_string())),
        }
    }

    /// Body en memoria; agrega `Content-Length`
    pub fn with_body_bytes(mut self, body: Vec<u8>) -> Self {
        self.add_header("Content-Length", &body.len().to_string());
        self.body = Body::Bytes(body);
        self
    }

    /// Body leído desde un archivo abierto; agrega `Content-Length`
    pub fn with_file(mut self, file: File, len: u64) -> Self {
        self.add_header("Content-Length", &len.to_string());
        self.body = Body::File { file, len };
        self
    }

    /// Descarta el body conservando `Content-Length` (respuesta a HEAD)
    pub fn without_body(mut self) -> Self {
        self.body = Body::Empty;
        self
    }

    /// Respuesta de error con body HTML corto
    ///
    /// # Ejemplo
    /// ```
    /// use reactor_httpd::http::{Response, StatusCode};
    ///
    /// let response = Response::error(StatusCode::NotFound);
    /// assert_eq!(response.status(), StatusCode::NotFound);
    /// ```
    pub fn error(status: StatusCode) -> Self {
        let body = format!(
            "<html><head><title>{status}</title></head><body><h1>{status}</h1><p>{}</p></body></html>\n",
            status.error_message()
        );
        Self::new(status)
            .with_header("Content-Type", "text/html; charset=utf-8")
            .with_body_bytes(body.into_bytes())
    }

    /// Serializa status line y headers, terminando en la línea vacía
    pub fn head_bytes(&self) -> Vec<u8> {
        let mut head = Vec::with_capacity(128);
        head.extend_from_slice(format!("HTTP/1.1 {}\r\n", self.status).as_bytes());
        for (name, value) in &self.headers {
            head.extend_from_slice(format!("{}: {}\r\n", name, value).as_bytes());
        }
        head.extend_from_slice(b"\r\n");
        head
    }

    /// Separa la respuesta en head serializado y body
    pub fn into_parts(self) -> (Vec<u8>, Body) {
        let head = self.head_bytes();
        (head, self.body)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Busca un header sin distinguir mayúsculas de minúsculas
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn body(&self) -> &Body {
        &self.body
    }
}
