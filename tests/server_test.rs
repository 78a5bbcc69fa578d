//! Tests end-to-end del servidor
//! tests/server_test.rs
//!
//! Cada test levanta su propio servidor en un puerto efímero de 127.0.0.1,
//! con un document root temporal, y habla con él por `TcpStream`.

use reactor_httpd::config::Config;
use reactor_httpd::metrics::{ServerStats, StatsSnapshot};
use reactor_httpd::server::{Server, ShutdownHandle};
use reactor_httpd::{ServerError, ServerResult};
use std::fs;
use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::{Arc, Barrier};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tempfile::TempDir;

const HELLO: &[u8] = b"hello world\n";
const INDEX: &[u8] = b"<html><body>index</body></html>\n";

struct TestServer {
    addr: SocketAddr,
    handle: ShutdownHandle,
    stats: Arc<ServerStats>,
    thread: Option<JoinHandle<ServerResult<StatsSnapshot>>>,
    _root: TempDir,
}

impl TestServer {
    fn start() -> Self {
        Self::start_with(|_| {})
    }

    fn start_with(tweak: impl FnOnce(&mut Config)) -> Self {
        let root = TempDir::new().unwrap();
        write_file(root.path(), "hello.txt", HELLO);
        write_file(root.path(), "index.html", INDEX);
        write_file(root.path(), "docs/index.html", b"<p>docs</p>");

        let mut config = Config {
            host: "127.0.0.1".to_string(),
            port: 0,
            root: root.path().to_path_buf(),
            workers: 4,
            queue_capacity: 64,
            ..Config::default()
        };
        tweak(&mut config);

        let server = Server::bind(config).unwrap();
        let addr = server.local_addr().unwrap();
        let handle = server.shutdown_handle();
        let stats = server.stats();
        let thread = thread::spawn(move || server.run());

        Self {
            addr,
            handle,
            stats,
            thread: Some(thread),
            _root: root,
        }
    }

    fn connect(&self) -> TcpStream {
        let stream = TcpStream::connect(self.addr).unwrap();
        stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        stream.set_write_timeout(Some(Duration::from_secs(5))).unwrap();
        stream
    }

    /// Envía `raw` y lee hasta que el servidor cierre
    fn roundtrip(&self, raw: &[u8]) -> String {
        let mut stream = self.connect();
        stream.write_all(raw).unwrap();
        read_until_close(&mut stream)
    }

    fn stop(mut self) -> StatsSnapshot {
        self.handle.shutdown();
        self.thread.take().unwrap().join().unwrap().unwrap()
    }

    fn wait_until(&self, what: impl Fn(&StatsSnapshot) -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !what(&self.stats.snapshot()) {
            assert!(Instant::now() < deadline, "timed out waiting for server state");
            thread::sleep(Duration::from_millis(5));
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(thread) = self.thread.take() {
            self.handle.shutdown();
            let _ = thread.join();
        }
    }
}

fn write_file(root: &Path, rel: &str, contents: &[u8]) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, contents).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();
}

/// Lee hasta EOF. Si el servidor cerró con datos sin leer el kernel manda
/// RST; lo recibido hasta ahí sigue valiendo.
fn read_until_close(stream: &mut TcpStream) -> String {
    let mut data = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        match stream.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => data.extend_from_slice(&buf[..n]),
            Err(e) if e.kind() == io::ErrorKind::ConnectionReset && !data.is_empty() => break,
            Err(e) => panic!("read failed: {}", e),
        }
    }
    String::from_utf8_lossy(&data).into_owned()
}

/// Lee exactamente un response (head + Content-Length) de una conexión viva
fn read_response(stream: &mut TcpStream) -> (String, Vec<u8>) {
    let mut data = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        if let Some(end) = data.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8(data[..end + 4].to_vec()).unwrap();
            let len = content_length(&head);
            if data.len() >= end + 4 + len {
                return (head, data[end + 4..end + 4 + len].to_vec());
            }
        }
        let n = stream.read(&mut buf).unwrap();
        assert!(n > 0, "connection closed mid-response");
        data.extend_from_slice(&buf[..n]);
    }
}

fn content_length(head: &str) -> usize {
    head.lines()
        .find_map(|line| line.strip_prefix("Content-Length: "))
        .map(|v| v.trim().parse().unwrap())
        .unwrap_or(0)
}

fn body_of(response: &str) -> &str {
    response
        .find("\r\n\r\n")
        .map(|pos| &response[pos + 4..])
        .unwrap_or("")
}

// ==================== Respuestas básicas ====================

#[test]
fn test_get_file() {
    let server = TestServer::start();
    let response = server.roundtrip(b"GET /hello.txt HTTP/1.0\r\n\r\n");

    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"), "got: {}", response);
    assert!(response.contains("Content-Type: text/plain; charset=utf-8\r\n"));
    assert!(response.contains(&format!("Content-Length: {}\r\n", HELLO.len())));
    assert!(response.contains("Connection: close\r\n"));
    assert!(response.contains("Server: reactor_httpd/"));
    assert_eq!(body_of(&response).as_bytes(), HELLO);
}

#[test]
fn test_directory_serves_index() {
    let server = TestServer::start();

    let response = server.roundtrip(b"GET / HTTP/1.1\r\nConnection: close\r\n\r\n");
    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
    assert_eq!(body_of(&response).as_bytes(), INDEX);

    let response = server.roundtrip(b"GET /docs/ HTTP/1.1\r\nConnection: close\r\n\r\n");
    assert_eq!(body_of(&response), "<p>docs</p>");
}

#[test]
fn test_missing_file_404() {
    let server = TestServer::start();
    let response = server.roundtrip(b"GET /nope.html HTTP/1.1\r\n\r\n");

    assert!(response.starts_with("HTTP/1.1 404 Not Found\r\n"), "got: {}", response);
    assert!(response.contains("Connection: close\r\n"));
    assert!(body_of(&response).contains("was not found"));
}

#[test]
fn test_traversal_403() {
    let server = TestServer::start();

    let response = server.roundtrip(b"GET /../../etc/passwd HTTP/1.1\r\n\r\n");
    assert!(response.starts_with("HTTP/1.1 403 Forbidden\r\n"), "got: {}", response);
    assert!(!response.contains("root:"));

    let response = server.roundtrip(b"GET /%2e%2e/%2e%2e/etc/passwd HTTP/1.1\r\n\r\n");
    assert!(response.starts_with("HTTP/1.1 403 Forbidden\r\n"), "got: {}", response);
}

#[test]
fn test_malformed_request_400_then_close() {
    let server = TestServer::start();
    let response = server.roundtrip(b"GETHTTP/1.1\r\n\r\n");

    assert!(response.starts_with("HTTP/1.1 400 Bad Request\r\n"), "got: {}", response);
    assert!(response.contains("Connection: close\r\n"));
}

#[test]
fn test_oversized_request_400() {
    let server = TestServer::start_with(|c| c.read_buffer_size = 128);
    let raw = format!("GET /{} HTTP/1.1\r\n\r\n", "a".repeat(300));
    let response = server.roundtrip(raw.as_bytes());

    assert!(response.starts_with("HTTP/1.1 400 Bad Request\r\n"), "got: {}", response);
}

#[test]
fn test_huge_content_length_400() {
    let server = TestServer::start();
    let raw = format!("POST /hello.txt HTTP/1.1\r\nContent-Length: {}\r\n\r\n", usize::MAX);
    let response = server.roundtrip(raw.as_bytes());

    assert!(response.starts_with("HTTP/1.1 400 Bad Request\r\n"), "got: {}", response);
    assert!(response.contains("Connection: close\r\n"));

    let stats = server.stop();
    assert_eq!(stats.responses.bad_request, 1);
}

#[test]
fn test_head_has_headers_only() {
    let server = TestServer::start();
    let response = server.roundtrip(b"HEAD /hello.txt HTTP/1.0\r\n\r\n");

    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(response.contains(&format!("Content-Length: {}\r\n", HELLO.len())));
    assert_eq!(body_of(&response), "");
}

#[test]
fn test_post_body_consumed() {
    let server = TestServer::start();
    let response = server.roundtrip(
        b"POST /hello.txt HTTP/1.1\r\nContent-Length: 5\r\nConnection: close\r\n\r\nabcde",
    );

    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"), "got: {}", response);
    assert_eq!(body_of(&response).as_bytes(), HELLO);
}

// ==================== Entrega incremental y keep-alive ====================

#[test]
fn test_request_split_across_writes() {
    let server = TestServer::start();
    let mut stream = server.connect();

    stream.write_all(b"GET /hello.txt HTTP/1.1\r\n").unwrap();
    thread::sleep(Duration::from_millis(50));
    stream.write_all(b"Connection: close\r\n").unwrap();
    thread::sleep(Duration::from_millis(50));
    stream.write_all(b"\r\n").unwrap();

    let response = read_until_close(&mut stream);
    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"), "got: {}", response);
    assert_eq!(body_of(&response).as_bytes(), HELLO);
}

#[test]
fn test_keep_alive_two_requests() {
    let server = TestServer::start();
    let mut stream = server.connect();

    stream
        .write_all(b"GET /hello.txt HTTP/1.1\r\nX-First: yes\r\nContent-Length: 0\r\n\r\n")
        .unwrap();
    let (head, body) = read_response(&mut stream);
    assert!(head.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(head.contains("Connection: keep-alive\r\n"));
    assert_eq!(body, HELLO);

    stream.write_all(b"GET / HTTP/1.1\r\n\r\n").unwrap();
    let (head, body) = read_response(&mut stream);
    assert!(head.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(head.contains("Content-Type: text/html; charset=utf-8\r\n"));
    assert_eq!(body, INDEX);

    // Tercer request pidiendo cierre
    stream
        .write_all(b"GET /nope HTTP/1.1\r\nConnection: close\r\n\r\n")
        .unwrap();
    let rest = read_until_close(&mut stream);
    assert!(rest.starts_with("HTTP/1.1 404 Not Found\r\n"));

    let stats = server.stop();
    assert_eq!(stats.accepted, 1);
    assert_eq!(stats.requests, 3);
    assert_eq!(stats.responses.ok, 2);
    assert_eq!(stats.responses.not_found, 1);
}

#[test]
fn test_peer_closes_before_complete_request() {
    let server = TestServer::start();
    {
        let mut stream = server.connect();
        stream.write_all(b"GET /hello").unwrap();
    }
    server.wait_until(|s| s.closed == 1);

    let stats = server.stop();
    assert_eq!(stats.requests, 0);
}

// ==================== Concurrencia y capacidad ====================

#[test]
fn test_concurrent_clients_single_dispatch() {
    let server = TestServer::start_with(|c| {
        c.workers = 4;
        c.queue_capacity = 8;
    });
    let addr = server.addr;

    let clients: Vec<_> = (0..16)
        .map(|_| {
            thread::spawn(move || {
                let mut stream = TcpStream::connect(addr).unwrap();
                stream.set_read_timeout(Some(Duration::from_secs(10))).unwrap();
                for _ in 0..25 {
                    stream.write_all(b"GET /hello.txt HTTP/1.1\r\n\r\n").unwrap();
                    let (head, body) = read_response(&mut stream);
                    assert!(head.starts_with("HTTP/1.1 200 OK\r\n"));
                    assert_eq!(body, HELLO);
                }
            })
        })
        .collect();

    for client in clients {
        client.join().unwrap();
    }

    let stats = server.stop();
    assert_eq!(stats.accepted, 16);
    assert_eq!(stats.responses.ok, 16 * 25);
    assert_eq!(stats.dispatch_violations, 0);
}

#[test]
fn test_queue_full_defers_without_losing_requests() {
    let server = TestServer::start_with(|c| {
        c.workers = 1;
        c.queue_capacity = 1;
    });
    let addr = server.addr;
    let start = Arc::new(Barrier::new(32));

    let clients: Vec<_> = (0..32)
        .map(|_| {
            let start = Arc::clone(&start);
            thread::spawn(move || {
                let mut stream = TcpStream::connect(addr).unwrap();
                stream.set_read_timeout(Some(Duration::from_secs(10))).unwrap();
                start.wait();
                for _ in 0..4 {
                    stream.write_all(b"GET /hello.txt HTTP/1.1\r\n\r\n").unwrap();
                    let (head, body) = read_response(&mut stream);
                    assert!(head.starts_with("HTTP/1.1 200 OK\r\n"));
                    assert_eq!(body, HELLO);
                }
            })
        })
        .collect();

    for client in clients {
        client.join().unwrap();
    }

    let stats = server.stop();
    assert_eq!(stats.responses.ok, 32 * 4);
    assert!(stats.queue_full > 0, "queue never filled: {:?}", stats);
    assert_eq!(stats.dispatch_violations, 0);
}

#[test]
fn test_table_full_closes_silently() {
    let server = TestServer::start_with(|c| c.max_connections = 1);

    let mut first = server.connect();
    server.wait_until(|s| s.accepted == 1);

    let mut second = server.connect();
    let mut buf = [0u8; 64];
    match second.read(&mut buf) {
        Ok(n) => assert_eq!(n, 0, "rejected connection must not receive a response"),
        Err(e) => assert_eq!(e.kind(), io::ErrorKind::ConnectionReset),
    }
    server.wait_until(|s| s.rejected == 1);

    // La primera conexión sigue atendida
    first.write_all(b"GET /hello.txt HTTP/1.0\r\n\r\n").unwrap();
    let response = read_until_close(&mut first);
    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
}

// ==================== Arranque y apagado ====================

#[test]
fn test_shutdown_closes_open_connections() {
    let server = TestServer::start();
    let mut idle = server.connect();
    server.wait_until(|s| s.accepted == 1);

    let stats = server.stop();
    assert_eq!(stats.accepted, 1);
    assert_eq!(stats.closed, 1);

    let mut buf = [0u8; 16];
    let n = idle.read(&mut buf).unwrap_or(0);
    assert_eq!(n, 0);
}

#[test]
fn test_bind_conflict_is_fatal() {
    let server = TestServer::start();
    let root = TempDir::new().unwrap();
    let config = Config {
        host: "127.0.0.1".to_string(),
        port: server.addr.port(),
        root: root.path().to_path_buf(),
        ..Config::default()
    };

    assert!(matches!(Server::bind(config), Err(ServerError::Bind { .. })));
}

#[test]
fn test_invalid_config_is_fatal() {
    let root = TempDir::new().unwrap();
    let config = Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        root: root.path().to_path_buf(),
        workers: 0,
        ..Config::default()
    };

    assert!(matches!(Server::bind(config), Err(ServerError::Config(_))));
}
