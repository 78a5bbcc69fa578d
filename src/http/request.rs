//! # Parser Incremental de Requests
//! src/http/request.rs
//!
//! El parser no es dueño de los bytes: la conexión acumula lo que llega del
//! socket en su buffer de lectura y llama a [`RequestParser::parse`] con todo
//! lo acumulado. El parser recuerda hasta dónde revisó, así que cada llamada
//! solo mira los bytes nuevos y se detiene en la primera línea incompleta.
//!
//! ## Estados
//!
//! ```text
//! RequestLine ──► Headers ──► Body ──► Done
//!      │             │
//!      └─────────────┴──► Error
//! ```
//!
//! Recibir el request de una vez o partido en varias lecturas produce
//! exactamente el mismo resultado.

use std::collections::HashMap;
use std::ops::Range;
use thiserror::Error;

/// Métodos HTTP soportados
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// GET - Obtener un recurso
    GET,

    /// HEAD - Como GET pero solo retorna headers
    HEAD,

    /// POST - El body se consume y el recurso se sirve como en GET
    POST,
}

impl Method {
    fn parse(s: &str) -> Result<Self, ParseError> {
        if s.eq_ignore_ascii_case("GET") {
            Ok(Method::GET)
        } else if s.eq_ignore_ascii_case("HEAD") {
            Ok(Method::HEAD)
        } else if s.eq_ignore_ascii_case("POST") {
            Ok(Method::POST)
        } else {
            Err(ParseError::UnsupportedMethod(s.to_string()))
        }
    }

    /// Convierte el método a string
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::GET => "GET",
            Method::HEAD => "HEAD",
            Method::POST => "POST",
        }
    }
}

/// Versión del protocolo en la request line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    Http10,
    Http11,
}

impl Version {
    fn parse(s: &str) -> Result<Self, ParseError> {
        match s {
            "HTTP/1.0" => Ok(Version::Http10),
            "HTTP/1.1" => Ok(Version::Http11),
            _ => Err(ParseError::InvalidHttpVersion(s.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Version::Http10 => "HTTP/1.0",
            Version::Http11 => "HTTP/1.1",
        }
    }
}

/// Estado del parser
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseState {
    RequestLine,
    Headers,
    Body,
    Done,
    Error,
}

/// Resultado de buscar la siguiente línea en el buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineStatus {
    /// Línea completa terminada en CRLF
    Ok,
    /// Terminador inválido (LF sin CR, o CR seguido de otra cosa)
    Bad,
    /// Faltan bytes para cerrar la línea
    Open,
}

/// Clasificación de un pase de procesamiento
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpCode {
    /// Faltan bytes, la conexión vuelve a esperar lectura
    Incomplete,
    /// Request malformado o más grande que el buffer
    BadRequest,
    /// GET o HEAD parseado completo
    GetRequest,
    /// POST parseado completo (body incluido)
    PostRequest,
    /// El target no corresponde a ningún archivo
    NoResource,
    /// El target existe pero no se puede servir
    Forbidden,
    /// Fallo al abrir o leer el recurso
    InternalError,
    /// El peer cerró antes de completar un request
    ClosedConnection,
    /// Recurso resuelto y listo para enviarse
    FileRequest,
}

/// Detalle de un error de protocolo (solo para logs)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("line is not terminated by CRLF")]
    MalformedLine,

    #[error("invalid request line: {0:?}")]
    InvalidRequestLine(String),

    #[error("unsupported HTTP method: {0}")]
    UnsupportedMethod(String),

    #[error("invalid HTTP version: {0}")]
    InvalidHttpVersion(String),

    #[error("invalid request target: {0:?}")]
    InvalidTarget(String),

    #[error("invalid header: {0:?}")]
    InvalidHeader(String),

    #[error("invalid Content-Length: {0:?}")]
    InvalidContentLength(String),

    #[error("request of {needed} bytes exceeds buffer of {capacity}")]
    TooLarge { needed: usize, capacity: usize },
}

/// Parser incremental de un request HTTP/1.x
#[derive(Debug)]
pub struct RequestParser {
    state: ParseState,

    /// Tamaño máximo del request completo (capacidad del buffer de lectura)
    capacity: usize,

    /// Inicio de la línea actual
    line_start: usize,

    /// Siguiente byte a revisar en busca de CRLF
    checked: usize,

    /// Línea completa más reciente (sin CRLF)
    line: Range<usize>,

    method: Method,
    version: Version,

    /// Path decodificado, sin query string
    target: String,

    /// Headers con el nombre en minúsculas
    headers: HashMap<String, String>,

    content_length: usize,
    body_start: usize,

    error: Option<ParseError>,
}

impl RequestParser {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: ParseState::RequestLine,
            capacity,
            line_start: 0,
            checked: 0,
            line: 0..0,
            method: Method::GET,
            version: Version::Http11,
            target: String::new(),
            headers: HashMap::new(),
            content_length: 0,
            body_start: 0,
            error: None,
        }
    }

    /// Vuelve al estado inicial conservando la capacidad de los mapas
    pub fn reset(&mut self) {
        self.state = ParseState::RequestLine;
        self.line_start = 0;
        self.checked = 0;
        self.line = 0..0;
        self.method = Method::GET;
        self.version = Version::Http11;
        self.target.clear();
        self.headers.clear();
        self.content_length = 0;
        self.body_start = 0;
        self.error = None;
    }

    /// Avanza el parser sobre `buf`, que contiene todos los bytes recibidos
    /// desde el último [`reset`](Self::reset)
    ///
    /// Retorna `Incomplete`, `BadRequest`, `GetRequest` o `PostRequest`.
    ///
    /// # Ejemplo
    /// ```
    /// use reactor_httpd::http::{HttpCode, RequestParser};
    ///
    /// let mut parser = RequestParser::new(1024);
    /// let mut buf = b"GET /index.html HTTP/1.1\r\n".to_vec();
    /// assert_eq!(parser.parse(&buf), HttpCode::Incomplete);
    ///
    /// buf.extend_from_slice(b"\r\n");
    /// assert_eq!(parser.parse(&buf), HttpCode::GetRequest);
    /// assert_eq!(parser.target(), "/index.html");
    /// ```
    pub fn parse(&mut self, buf: &[u8]) -> HttpCode {
        loop {
            match self.state {
                ParseState::Done => return self.completed(),
                ParseState::Error => return HttpCode::BadRequest,
                ParseState::Body => match self.body_end() {
                    Some(end) if buf.len() >= end => {
                        self.state = ParseState::Done;
                        continue;
                    }
                    Some(_) => return HttpCode::Incomplete,
                    None => {
                        self.fail(ParseError::TooLarge {
                            needed: usize::MAX,
                            capacity: self.capacity,
                        });
                        continue;
                    }
                },
                ParseState::RequestLine | ParseState::Headers => {}
            }

            match self.parse_line(buf) {
                LineStatus::Open => return HttpCode::Incomplete,
                LineStatus::Bad => {
                    self.fail(ParseError::MalformedLine);
                    continue;
                }
                LineStatus::Ok => {}
            }

            let line = &buf[self.line.clone()];
            let result = match self.state {
                ParseState::RequestLine => self.parse_request_line(line),
                _ => self.parse_header(line),
            };
            if let Err(e) = result {
                self.fail(e);
            }
        }
    }

    /// Busca el siguiente CRLF a partir de `checked`
    ///
    /// Un CR al final del buffer deja la línea abierta sin consumirlo, para
    /// volver a evaluarlo cuando llegue el byte siguiente.
    pub fn parse_line(&mut self, buf: &[u8]) -> LineStatus {
        while self.checked < buf.len() {
            match buf[self.checked] {
                b'\r' => {
                    if self.checked + 1 == buf.len() {
                        return LineStatus::Open;
                    }
                    if buf[self.checked + 1] == b'\n' {
                        self.line = self.line_start..self.checked;
                        self.checked += 2;
                        self.line_start = self.checked;
                        return LineStatus::Ok;
                    }
                    return LineStatus::Bad;
                }
                b'\n' => return LineStatus::Bad,
                _ => self.checked += 1,
            }
        }
        LineStatus::Open
    }

    fn parse_request_line(&mut self, line: &[u8]) -> Result<(), ParseError> {
        let text = std::str::from_utf8(line)
            .map_err(|_| ParseError::InvalidRequestLine(String::from_utf8_lossy(line).into_owned()))?;

        // METHOD SP TARGET SP VERSION
        let (method, rest) = split_token(text)
            .ok_or_else(|| ParseError::InvalidRequestLine(text.to_string()))?;
        let (target, version) = split_token(rest)
            .ok_or_else(|| ParseError::InvalidRequestLine(text.to_string()))?;

        self.method = Method::parse(method)?;
        self.version = Version::parse(version.trim_matches(|c| c == ' ' || c == '\t'))?;
        self.target = normalize_target(target)?;
        self.state = ParseState::Headers;
        Ok(())
    }

    fn parse_header(&mut self, line: &[u8]) -> Result<(), ParseError> {
        if line.is_empty() {
            return self.end_of_headers();
        }

        let text = String::from_utf8_lossy(line);
        let colon = text
            .find(':')
            .ok_or_else(|| ParseError::InvalidHeader(text.to_string()))?;
        let name = text[..colon].trim();
        if name.is_empty() {
            return Err(ParseError::InvalidHeader(text.to_string()));
        }
        let value = text[colon + 1..].trim();

        if name.eq_ignore_ascii_case("content-length") {
            self.content_length = value
                .parse()
                .map_err(|_| ParseError::InvalidContentLength(value.to_string()))?;
        }

        self.headers.insert(name.to_ascii_lowercase(), value.to_string());
        Ok(())
    }

    fn end_of_headers(&mut self) -> Result<(), ParseError> {
        self.body_start = self.checked;

        if self.method != Method::POST || self.content_length == 0 {
            self.content_length = 0;
            self.state = ParseState::Done;
            return Ok(());
        }

        // Content-Length viene del cliente: la suma puede desbordar
        match self.body_end() {
            Some(needed) if needed <= self.capacity => {
                self.state = ParseState::Body;
                Ok(())
            }
            needed => Err(ParseError::TooLarge {
                needed: needed.unwrap_or(usize::MAX),
                capacity: self.capacity,
            }),
        }
    }

    /// Offset donde termina el body, si no desborda
    fn body_end(&self) -> Option<usize> {
        self.body_start.checked_add(self.content_length)
    }

    fn fail(&mut self, error: ParseError) {
        self.state = ParseState::Error;
        self.error = Some(error);
    }

    fn completed(&self) -> HttpCode {
        match self.method {
            Method::POST => HttpCode::PostRequest,
            Method::GET | Method::HEAD => HttpCode::GetRequest,
        }
    }

    // === Accesores ===

    pub fn state(&self) -> ParseState {
        self.state
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn version(&self) -> Version {
        self.version
    }

    /// Path decodificado, sin query string
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Busca un header sin distinguir mayúsculas de minúsculas
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    pub fn content_length(&self) -> usize {
        self.content_length
    }

    /// Body del request dentro de `buf` (vacío hasta llegar a `Done`)
    pub fn body<'a>(&self, buf: &'a [u8]) -> &'a [u8] {
        if self.state != ParseState::Done {
            return &[];
        }
        self.body_end()
            .and_then(|end| buf.get(self.body_start..end))
            .unwrap_or(&[])
    }

    /// Error de protocolo que llevó al estado `Error`
    pub fn error(&self) -> Option<&ParseError> {
        self.error.as_ref()
    }

    /// HTTP/1.1 mantiene la conexión salvo `Connection: close`;
    /// HTTP/1.0 solo con `Connection: keep-alive` explícito.
    pub fn keep_alive(&self) -> bool {
        let has_token = |token: &str| {
            self.header("connection")
                .map(|v| v.split(',').any(|t| t.trim().eq_ignore_ascii_case(token)))
                .unwrap_or(false)
        };
        match self.version {
            Version::Http11 => !has_token("close"),
            Version::Http10 => has_token("keep-alive"),
        }
    }
}

/// Separa el primer token delimitado por espacio o tab
fn split_token(s: &str) -> Option<(&str, &str)> {
    let s = s.trim_start_matches(|c| c == ' ' || c == '\t');
    let end = s.find(|c| c == ' ' || c == '\t')?;
    let rest = s[end..].trim_start_matches(|c| c == ' ' || c == '\t');
    if end == 0 || rest.is_empty() {
        return None;
    }
    Some((&s[..end], rest))
}

/// Quita `http://host` en forma absoluta y el query string, y decodifica %XX
fn normalize_target(raw: &str) -> Result<String, ParseError> {
    let mut target = raw;
    for scheme in ["http://", "https://"] {
        if target.len() >= scheme.len() && target[..scheme.len()].eq_ignore_ascii_case(scheme) {
            let after = &target[scheme.len()..];
            target = after.find('/').map(|i| &after[i..]).unwrap_or("/");
            break;
        }
    }

    if !target.starts_with('/') {
        return Err(ParseError::InvalidTarget(raw.to_string()));
    }

    let path = match target.find(|c| c == '?' || c == '#') {
        Some(i) => &target[..i],
        None => target,
    };

    urlencoding::decode(path)
        .map(|decoded| decoded.into_owned())
        .map_err(|_| ParseError::InvalidTarget(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_all(raw: &[u8]) -> (RequestParser, HttpCode) {
        let mut parser = RequestParser::new(2048);
        let code = parser.parse(raw);
        (parser, code)
    }

    #[test]
    fn test_simple_get() {
        let (parser, code) = parse_all(b"GET /path HTTP/1.1\r\nHeader: v\r\n\r\n");

        assert_eq!(code, HttpCode::GetRequest);
        assert_eq!(parser.state(), ParseState::Done);
        assert_eq!(parser.method(), Method::GET);
        assert_eq!(parser.target(), "/path");
        assert_eq!(parser.version(), Version::Http11);
        assert_eq!(parser.header("Header"), Some("v"));
    }

    #[test]
    fn test_headers_case_insensitive_and_trimmed() {
        let (parser, code) =
            parse_all(b"GET / HTTP/1.1\r\nHost:   example.com  \r\nX-TOKEN:\tabc\r\n\r\n");

        assert_eq!(code, HttpCode::GetRequest);
        assert_eq!(parser.header("host"), Some("example.com"));
        assert_eq!(parser.header("HOST"), Some("example.com"));
        assert_eq!(parser.header("x-token"), Some("abc"));
        assert_eq!(parser.header("missing"), None);
    }

    #[test]
    fn test_request_line_without_spaces() {
        let (parser, code) = parse_all(b"GETHTTP/1.1\r\n\r\n");
        assert_eq!(code, HttpCode::BadRequest);
        assert_eq!(parser.state(), ParseState::Error);
        assert!(matches!(parser.error(), Some(ParseError::InvalidRequestLine(_))));
    }

    #[test]
    fn test_request_line_with_one_space() {
        let (_, code) = parse_all(b"GET /\r\n\r\n");
        assert_eq!(code, HttpCode::BadRequest);
    }

    #[test]
    fn test_unsupported_method() {
        let (parser, code) = parse_all(b"DELETE / HTTP/1.1\r\n\r\n");
        assert_eq!(code, HttpCode::BadRequest);
        assert_eq!(
            parser.error(),
            Some(&ParseError::UnsupportedMethod("DELETE".to_string()))
        );
    }

    #[test]
    fn test_invalid_version() {
        let (_, code) = parse_all(b"GET / HTTP/2.0\r\n\r\n");
        assert_eq!(code, HttpCode::BadRequest);

        let (_, code) = parse_all(b"GET / FOO\r\n\r\n");
        assert_eq!(code, HttpCode::BadRequest);
    }

    #[test]
    fn test_http10_accepted() {
        let (parser, code) = parse_all(b"HEAD /a HTTP/1.0\r\n\r\n");
        assert_eq!(code, HttpCode::GetRequest);
        assert_eq!(parser.method(), Method::HEAD);
        assert_eq!(parser.version(), Version::Http10);
    }

    #[test]
    fn test_split_across_two_reads() {
        let mut split = RequestParser::new(2048);
        let mut buf = b"GET / HTTP/1.1\r\n".to_vec();
        assert_eq!(split.parse(&buf), HttpCode::Incomplete);
        assert_eq!(split.state(), ParseState::Headers);
        buf.extend_from_slice(b"\r\n");
        let split_code = split.parse(&buf);

        let (whole, whole_code) = parse_all(b"GET / HTTP/1.1\r\n\r\n");

        assert_eq!(split_code, whole_code);
        assert_eq!(split.target(), whole.target());
        assert_eq!(split.state(), whole.state());
    }

    #[test]
    fn test_byte_by_byte_delivery() {
        let raw = b"GET /dir/file.txt?x=1 HTTP/1.1\r\nHost: h\r\nConnection: close\r\n\r\n";
        let mut parser = RequestParser::new(2048);
        let mut code = HttpCode::Incomplete;
        for end in 1..=raw.len() {
            code = parser.parse(&raw[..end]);
            if end < raw.len() {
                assert_eq!(code, HttpCode::Incomplete, "prefix of {} bytes", end);
            }
        }
        assert_eq!(code, HttpCode::GetRequest);
        assert_eq!(parser.target(), "/dir/file.txt");
        assert_eq!(parser.header("host"), Some("h"));
        assert!(!parser.keep_alive());
    }

    #[test]
    fn test_cr_at_end_of_buffer_stays_open() {
        let mut parser = RequestParser::new(2048);
        let mut buf = b"GET / HTTP/1.1\r".to_vec();
        assert_eq!(parser.parse(&buf), HttpCode::Incomplete);
        assert_eq!(parser.state(), ParseState::RequestLine);

        buf.extend_from_slice(b"\n\r\n");
        assert_eq!(parser.parse(&buf), HttpCode::GetRequest);
    }

    #[test]
    fn test_bare_lf_is_bad() {
        let (parser, code) = parse_all(b"GET / HTTP/1.1\n\n");
        assert_eq!(code, HttpCode::BadRequest);
        assert_eq!(parser.error(), Some(&ParseError::MalformedLine));
    }

    #[test]
    fn test_header_without_colon() {
        let (_, code) = parse_all(b"GET / HTTP/1.1\r\nNoColonHere\r\n\r\n");
        assert_eq!(code, HttpCode::BadRequest);
    }

    #[test]
    fn test_post_body_waits_for_content_length() {
        let head = b"POST /form HTTP/1.1\r\nContent-Length: 5\r\n\r\n";
        let mut parser = RequestParser::new(2048);

        let mut buf = head.to_vec();
        buf.extend_from_slice(b"abcd");
        assert_eq!(parser.parse(&buf), HttpCode::Incomplete);
        assert_eq!(parser.state(), ParseState::Body);
        assert!(parser.body(&buf).is_empty());

        buf.push(b'e');
        assert_eq!(parser.parse(&buf), HttpCode::PostRequest);
        assert_eq!(parser.state(), ParseState::Done);
        assert_eq!(parser.body(&buf), b"abcde");
    }

    #[test]
    fn test_post_without_content_length_is_done() {
        let (parser, code) = parse_all(b"POST / HTTP/1.1\r\n\r\n");
        assert_eq!(code, HttpCode::PostRequest);
        assert_eq!(parser.content_length(), 0);
    }

    #[test]
    fn test_get_ignores_content_length() {
        let (parser, code) = parse_all(b"GET / HTTP/1.1\r\nContent-Length: 10\r\n\r\n");
        assert_eq!(code, HttpCode::GetRequest);
        assert_eq!(parser.content_length(), 0);
    }

    #[test]
    fn test_invalid_content_length() {
        let (_, code) = parse_all(b"POST / HTTP/1.1\r\nContent-Length: abc\r\n\r\n");
        assert_eq!(code, HttpCode::BadRequest);
    }

    #[test]
    fn test_body_larger_than_buffer() {
        let mut parser = RequestParser::new(64);
        let code = parser.parse(b"POST / HTTP/1.1\r\nContent-Length: 100\r\n\r\n");
        assert_eq!(code, HttpCode::BadRequest);
        assert!(matches!(parser.error(), Some(ParseError::TooLarge { .. })));
    }

    #[test]
    fn test_content_length_overflow_is_bad_request() {
        let mut parser = RequestParser::new(2048);
        let raw = format!("POST / HTTP/1.1\r\nContent-Length: {}\r\n\r\n", usize::MAX);
        let code = parser.parse(raw.as_bytes());
        assert_eq!(code, HttpCode::BadRequest);
        assert_eq!(parser.state(), ParseState::Error);
        assert!(matches!(
            parser.error(),
            Some(ParseError::TooLarge { capacity: 2048, .. })
        ));
        assert!(parser.body(b"").is_empty());
    }

    #[test]
    fn test_absolute_form_and_query() {
        let (parser, code) = parse_all(b"GET http://example.com/a/b.html?q=1 HTTP/1.1\r\n\r\n");
        assert_eq!(code, HttpCode::GetRequest);
        assert_eq!(parser.target(), "/a/b.html");

        let (parser, _) = parse_all(b"GET http://example.com HTTP/1.1\r\n\r\n");
        assert_eq!(parser.target(), "/");
    }

    #[test]
    fn test_percent_decoding() {
        let (parser, code) = parse_all(b"GET /hello%20world.txt HTTP/1.1\r\n\r\n");
        assert_eq!(code, HttpCode::GetRequest);
        assert_eq!(parser.target(), "/hello world.txt");

        let (_, code) = parse_all(b"GET /%ff%fe HTTP/1.1\r\n\r\n");
        assert_eq!(code, HttpCode::BadRequest);
    }

    #[test]
    fn test_relative_target_rejected() {
        let (_, code) = parse_all(b"GET index.html HTTP/1.1\r\n\r\n");
        assert_eq!(code, HttpCode::BadRequest);
    }

    #[test]
    fn test_keep_alive_rules() {
        let (p, _) = parse_all(b"GET / HTTP/1.1\r\n\r\n");
        assert!(p.keep_alive());

        let (p, _) = parse_all(b"GET / HTTP/1.1\r\nConnection: Close\r\n\r\n");
        assert!(!p.keep_alive());

        let (p, _) = parse_all(b"GET / HTTP/1.0\r\n\r\n");
        assert!(!p.keep_alive());

        let (p, _) = parse_all(b"GET / HTTP/1.0\r\nConnection: keep-alive\r\n\r\n");
        assert!(p.keep_alive());
    }

    #[test]
    fn test_reset_clears_previous_request() {
        let mut parser = RequestParser::new(2048);
        assert_eq!(
            parser.parse(b"GET /first HTTP/1.1\r\nX-Only-First: 1\r\n\r\n"),
            HttpCode::GetRequest
        );

        parser.reset();
        assert_eq!(parser.state(), ParseState::RequestLine);
        assert_eq!(
            parser.parse(b"GET /second HTTP/1.1\r\n\r\n"),
            HttpCode::GetRequest
        );
        assert_eq!(parser.target(), "/second");
        assert_eq!(parser.header("x-only-first"), None);
    }
}
