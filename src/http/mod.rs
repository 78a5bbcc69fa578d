//! # Módulo HTTP
//! src/http/mod.rs
//!
//! Máquina de estados HTTP/1.1 por conexión:
//!
//! - Parsing incremental de requests (request line → headers → body)
//! - Resolución del target dentro del document root
//! - Construcción de responses (head en memoria, body en memoria o archivo)
//! - Envío con escrituras parciales y keep-alive
//!
//! ### Formato de Request
//!
//! ```text
//! GET /path?query=value HTTP/1.1\r\n
//! Header-Name: Header-Value\r\n
//! \r\n
//! [body de Content-Length bytes, solo POST]
//! ```

pub mod conn;      // Estado por conexión y pases de lectura/escritura
pub mod mime;      // Content-Type por extensión
pub mod request;   // Parser incremental
pub mod resource;  // Document root y guard de traversal
pub mod response;  // Construcción de responses
pub mod status;    // Códigos de estado HTTP

pub use conn::{Completed, HttpConn, Outcome};
pub use request::{HttpCode, LineStatus, Method, ParseError, ParseState, RequestParser, Version};
pub use resource::{DocumentRoot, Resource};
pub use response::{Body, Response};
pub use status::StatusCode;
