//! # Conexión HTTP
//! src/http/conn.rs
//!
//! Estado por conexión: buffer de lectura, parser, respuesta pendiente y
//! la decisión de rearmar o cerrar después de cada pase.
//!
//! ## Ciclo de vida
//!
//! ```text
//! attach ─► [reactor] read_from_socket ─► [worker] process ─► Rearm(Write)
//!                ▲                                                  │
//!                │                                                  ▼
//!                └──── Rearm(Read) ◄── keep-alive ◄── [worker] write_pass
//!                                                          │
//!                                                          └─► Close
//! ```
//!
//! Un `HttpConn` vive en su slot de la tabla y se reutiliza entre conexiones:
//! `attach` y `detach` no liberan los buffers.

use super::request::{HttpCode, Method, RequestParser};
use super::resource::DocumentRoot;
use super::response::{Body, Response, SERVER_NAME};
use super::{mime, StatusCode};
use crate::sys::Interest;
use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::os::unix::fs::FileExt;
use tracing::{debug, trace, warn};

/// Tamaño de los chunks leídos del archivo durante el envío
const FILE_CHUNK: usize = 16 * 1024;

/// Qué hacer con la conexión después de un pase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Volver a registrar el fd con este interés (one-shot)
    Rearm(Interest),
    /// Cerrar la conexión y liberar el slot
    Close,
}

/// Resumen de una respuesta enviada completa
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completed {
    pub status: StatusCode,
    pub bytes: u64,
}

#[derive(Debug)]
pub struct HttpConn {
    stream: Option<TcpStream>,
    peer: Option<SocketAddr>,

    read_buf: Vec<u8>,
    read_len: usize,
    parser: RequestParser,

    /// Límite del bloque de headers de la respuesta
    write_limit: usize,
    staged: Option<Response>,
    head: Vec<u8>,
    head_sent: usize,
    body: Body,
    body_sent: u64,
    chunk: Vec<u8>,

    status: Option<StatusCode>,
    keep_alive: bool,
    /// El peer hizo shutdown de su lado de escritura
    peer_closed: bool,
    completed: Option<Completed>,
}

impl HttpConn {
    pub fn new(read_buffer_size: usize, write_buffer_size: usize) -> Self {
        Self {
            stream: None,
            peer: None,
            read_buf: vec![0; read_buffer_size],
            read_len: 0,
            parser: RequestParser::new(read_buffer_size),
            write_limit: write_buffer_size,
            staged: None,
            head: Vec::with_capacity(write_buffer_size),
            head_sent: 0,
            body: Body::Empty,
            body_sent: 0,
            chunk: Vec::new(),
            status: None,
            keep_alive: false,
            peer_closed: false,
            completed: None,
        }
    }

    /// Asocia un socket recién aceptado (ya en modo no bloqueante)
    pub fn attach(&mut self, stream: TcpStream, peer: SocketAddr) {
        self.reset();
        self.peer_closed = false;
        self.completed = None;
        self.stream = Some(stream);
        self.peer = Some(peer);
    }

    /// Suelta el socket; al hacer drop del `TcpStream` el fd se cierra
    pub fn detach(&mut self) -> Option<TcpStream> {
        self.reset();
        self.peer = None;
        self.stream.take()
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// Bytes acumulados en el buffer de lectura
    pub fn buffered(&self) -> &[u8] {
        &self.read_buf[..self.read_len]
    }

    pub fn parser(&self) -> &RequestParser {
        &self.parser
    }

    /// Deja la conexión lista para el siguiente request
    fn reset(&mut self) {
        self.read_len = 0;
        self.parser.reset();
        self.staged = None;
        self.head.clear();
        self.head_sent = 0;
        self.body = Body::Empty;
        self.body_sent = 0;
        self.status = None;
        self.keep_alive = false;
    }

    /// Copia bytes al buffer de lectura como si vinieran del socket
    ///
    /// Retorna cuántos cupieron.
    pub fn feed(&mut self, data: &[u8]) -> usize {
        let n = data.len().min(self.read_buf.len() - self.read_len);
        self.read_buf[self.read_len..self.read_len + n].copy_from_slice(&data[..n]);
        self.read_len += n;
        n
    }

    /// Lee del socket hasta `WouldBlock`, EOF o buffer lleno
    ///
    /// Lo llama el reactor antes de encolar el pase de lectura. Un error
    /// distinto de `WouldBlock` es un error de transporte: cerrar.
    pub fn read_from_socket(&mut self) -> io::Result<usize> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotConnected))?;

        let mut total = 0;
        while self.read_len < self.read_buf.len() {
            match stream.read(&mut self.read_buf[self.read_len..]) {
                Ok(0) => {
                    self.peer_closed = true;
                    break;
                }
                Ok(n) => {
                    self.read_len += n;
                    total += n;
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(total)
    }

    /// Pase de lectura: parsea lo acumulado y prepara la respuesta
    pub fn process(&mut self, root: &DocumentRoot) -> Outcome {
        let code = self.process_read(root);
        match code {
            HttpCode::Incomplete => Outcome::Rearm(Interest::Read),
            HttpCode::ClosedConnection => Outcome::Close,
            code => {
                if !self.prepare_response(code) {
                    return Outcome::Close;
                }
                Outcome::Rearm(Interest::Write)
            }
        }
    }

    /// Clasifica el contenido del buffer
    pub fn process_read(&mut self, root: &DocumentRoot) -> HttpCode {
        let code = self.parser.parse(&self.read_buf[..self.read_len]);
        match code {
            HttpCode::Incomplete if self.peer_closed => HttpCode::ClosedConnection,
            HttpCode::Incomplete if self.read_len == self.read_buf.len() => {
                debug!(peer = ?self.peer, "request exceeds read buffer");
                HttpCode::BadRequest
            }
            HttpCode::BadRequest => {
                if let Some(err) = self.parser.error() {
                    debug!(peer = ?self.peer, error = %err, "bad request");
                }
                HttpCode::BadRequest
            }
            HttpCode::GetRequest | HttpCode::PostRequest => {
                trace!(
                    peer = ?self.peer,
                    method = self.parser.method().as_str(),
                    version = self.parser.version().as_str(),
                    target = self.parser.target(),
                    "request parsed"
                );
                match root.resolve(self.parser.target()) {
                    Ok(resource) => {
                        let content_type = mime::content_type(&resource.path);
                        let response = Response::new(StatusCode::Ok)
                            .with_file(resource.file, resource.len)
                            .with_header("Content-Type", &content_type);
                        self.stage(response);
                        HttpCode::FileRequest
                    }
                    Err(code) => code,
                }
            }
            other => other,
        }
    }

    /// Arma la respuesta para `code` y la deja lista para `write_pass`
    ///
    /// Retorna `false` si el bloque de headers no cabe en el límite.
    fn prepare_response(&mut self, code: HttpCode) -> bool {
        let status = match code {
            HttpCode::FileRequest => StatusCode::Ok,
            HttpCode::BadRequest => StatusCode::BadRequest,
            HttpCode::Forbidden => StatusCode::Forbidden,
            HttpCode::NoResource => StatusCode::NotFound,
            _ => StatusCode::InternalServerError,
        };

        if status != StatusCode::Ok {
            self.stage(Response::error(status));
        }

        // Solo un 200 mantiene la conexión
        self.keep_alive = status.is_success() && !self.peer_closed && self.parser.keep_alive();

        let mut response = match self.staged.take() {
            Some(response) => response,
            None => return false,
        };
        response.add_header("Connection", if self.keep_alive { "keep-alive" } else { "close" });
        response.add_header("Server", SERVER_NAME);
        if self.parser.method() == Method::HEAD {
            response = response.without_body();
        }

        let (head, body) = response.into_parts();
        if head.len() > self.write_limit {
            warn!(peer = ?self.peer, size = head.len(), limit = self.write_limit, "response head exceeds write buffer");
            return false;
        }

        self.head = head;
        self.head_sent = 0;
        self.body = body;
        self.body_sent = 0;
        self.status = Some(status);
        true
    }

    /// Pase de escritura: envía desde el último offset pendiente
    pub fn write_pass(&mut self) -> Outcome {
        let Some(stream) = self.stream.as_mut() else {
            return Outcome::Close;
        };

        loop {
            let result = if self.head_sent < self.head.len() {
                stream.write(&self.head[self.head_sent..])
            } else if self.body_sent < self.body.len() {
                match &self.body {
                    Body::Bytes(bytes) => stream.write(&bytes[self.body_sent as usize..]),
                    Body::File { file, len } => {
                        let want = (len - self.body_sent).min(FILE_CHUNK as u64) as usize;
                        self.chunk.resize(want, 0);
                        match file.read_at(&mut self.chunk, self.body_sent) {
                            Ok(0) => {
                                warn!(peer = ?self.peer, "file shrank while sending");
                                return Outcome::Close;
                            }
                            Ok(n) => stream.write(&self.chunk[..n]),
                            Err(e) => {
                                warn!(peer = ?self.peer, error = %e, "file read failed");
                                return Outcome::Close;
                            }
                        }
                    }
                    Body::Empty => Ok(0),
                }
            } else {
                break;
            };

            match result {
                Ok(0) => return Outcome::Close,
                Ok(n) => {
                    if self.head_sent < self.head.len() {
                        self.head_sent += n;
                    } else {
                        self.body_sent += n as u64;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    return Outcome::Rearm(Interest::Write);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    debug!(peer = ?self.peer, error = %e, "write failed");
                    return Outcome::Close;
                }
            }
        }

        if let Some(status) = self.status {
            self.completed = Some(Completed {
                status,
                bytes: self.head.len() as u64 + self.body_sent,
            });
        }

        if self.keep_alive {
            self.reset();
            Outcome::Rearm(Interest::Read)
        } else {
            Outcome::Close
        }
    }

    /// Toma el resumen de la última respuesta completa, si hay una
    pub fn take_completed(&mut self) -> Option<Completed> {
        self.completed.take()
    }

    fn stage(&mut self, response: Response) {
        self.staged = Some(response);
    }
}
