//! # Errores del Servidor
//! src/error.rs
//!
//! Taxonomía de errores que pueden escapar de un componente. Los errores de
//! una conexión individual (transporte, protocolo, recurso) nunca llegan
//! aquí: se resuelven dentro de la pasada de procesamiento y terminan en un
//! `Outcome` (rearmar o cerrar).

use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

/// Errores fatales de arranque y del loop del reactor
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("configuración inválida: {0}")]
    Config(#[from] ConfigError),

    #[error("no se pudo crear el socket de escucha: {0}")]
    Socket(#[source] io::Error),

    #[error("no se pudo hacer bind en {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("listen falló: {0}")]
    Listen(#[source] io::Error),

    #[error("no se pudo crear el multiplexor (epoll): {0}")]
    Multiplexer(#[source] io::Error),

    #[error("no se pudo instalar el handler de señales: {0}")]
    Signal(#[from] ctrlc::Error),

    #[error("error en el pool de workers: {0}")]
    Pool(#[from] PoolError),

    #[error("no se pudo inicializar el logging: {0}")]
    Logging(String),

    #[error("error de I/O: {0}")]
    Io(#[from] io::Error),
}

/// Errores de validación de la configuración
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{field} must be >= {min} (got {value})")]
    TooSmall {
        field: &'static str,
        min: usize,
        value: usize,
    },

    #[error("max_connections ({max_connections}) cannot exceed max_fds ({max_fds})")]
    ConnectionsExceedTable { max_connections: usize, max_fds: usize },

    #[error("document root {0} is not an existing directory")]
    DocumentRoot(PathBuf),

    #[error("invalid log filter {filter:?}: {reason}")]
    LogFilter { filter: String, reason: String },

    #[error("cannot read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot parse config file {path}: {source}")]
    FileParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid host address {0:?}")]
    Host(String),

    #[error("invalid arguments: {0}")]
    Args(String),
}

/// Errores de construcción del pool
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("el pool necesita al menos un worker")]
    NoWorkers,

    #[error("la cola de tareas necesita capacidad >= 1")]
    ZeroCapacity,

    #[error("no se pudo crear el thread del worker: {0}")]
    Spawn(#[source] io::Error),
}

pub type ServerResult<T> = Result<T, ServerError>;
