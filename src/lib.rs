//! # reactor_httpd
//! src/lib.rs
//!
//! Servidor HTTP/1.1 con arquitectura half-sync/half-reactor: un thread
//! reactor multiplexa la readiness de todos los sockets con epoll y entrega
//! el trabajo a un pool fijo de workers a través de una cola acotada.
//!
//! ## Arquitectura
//!
//! - `sync`: Locker, Cond y Semaphore
//! - `pool`: cola de tareas acotada y thread pool
//! - `sys`: epoll, socket de escucha, eventfd, SIGPIPE
//! - `server`: tabla de conexiones, reactor y armado del servidor
//! - `http`: parser incremental, respuestas y máquina de estados por conexión
//! - `config`: configuración tipada (CLI, entorno, archivo JSON)
//! - `logging`: inicialización de `tracing`
//! - `metrics`: contadores del servidor
//! - `error`: errores fatales y de configuración
//!
//! ## Flujo de una conexión
//!
//! ```text
//! listener ─► accept ─► slot en la tabla ─► epoll (one-shot, lectura)
//!    ─► reactor lee ─► cola ─► worker parsea y responde ─► rearm ─► ...
//! ```

pub mod config;
pub mod error;
pub mod http;
pub mod logging;
pub mod metrics;
pub mod pool;
pub mod server;
pub mod sync;
pub mod sys;

pub use config::Config;
pub use error::{ServerError, ServerResult};
pub use server::{Server, ShutdownHandle};
