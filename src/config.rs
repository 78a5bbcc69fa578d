//! # Configuración del Servidor
//! src/config.rs
//!
//! Configuración tipada, poblada una sola vez al arrancar y validada antes de
//! crear el reactor. Un valor inválido aborta el arranque, no el primer uso.
//!
//! ## Precedencia
//!
//! línea de comandos > variables de entorno > archivo JSON > default
//!
//! ## Ejemplos de uso
//!
//! ### CLI
//! ```bash
//! ./reactor_httpd --port 8080 --root ./resources \
//!   --workers 8 --queue-capacity 10000 --max-connections 10000
//! ```
//!
//! ### Variables de entorno
//! ```bash
//! HTTP_PORT=8080 HTTP_DOC_ROOT=/srv/www HTTP_WORKERS=4 ./reactor_httpd
//! ```
//!
//! ### Archivo
//! ```bash
//! ./reactor_httpd --config server.json
//! ```
//! ```json
//! { "port": 9000, "workers": 16, "log_format": "compact" }
//! ```

use crate::error::ConfigError;
use crate::logging::LogFormat;
use clap::parser::ValueSource;
use clap::{ArgMatches, CommandFactory, FromArgMatches, Parser};
use serde::Deserialize;
use std::ffi::OsString;
use std::fs;
use std::net::{IpAddr, SocketAddr, ToSocketAddrs};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Tamaño mínimo del buffer de lectura (una request line razonable)
pub const MIN_READ_BUFFER: usize = 64;

/// Tamaño mínimo del bloque de headers de una respuesta
pub const MIN_WRITE_BUFFER: usize = 256;

/// Configuración del servidor HTTP
#[derive(Debug, Clone, Parser)]
#[command(name = "reactor_httpd")]
#[command(about = "Servidor HTTP/1.1 half-sync/half-reactor: epoll + pool de workers")]
#[command(version)]
pub struct Config {
    /// Puerto en el que escucha el servidor
    #[arg(short, long, default_value = "8080", env = "HTTP_PORT")]
    pub port: u16,

    /// Host/IP en el que escucha
    #[arg(long, default_value = "0.0.0.0", env = "HTTP_HOST")]
    pub host: String,

    /// Directorio raíz de los archivos servidos
    #[arg(short, long, default_value = "./resources", env = "HTTP_DOC_ROOT")]
    pub root: PathBuf,

    // === Pool ===

    /// Número de workers
    #[arg(short, long, default_value = "8", env = "HTTP_WORKERS")]
    pub workers: usize,

    /// Capacidad máxima de la cola de tareas
    #[arg(long = "queue-capacity", default_value = "10000", env = "HTTP_QUEUE_CAPACITY")]
    pub queue_capacity: usize,

    // === Conexiones ===

    /// Máximo de conexiones simultáneas
    #[arg(long = "max-connections", default_value = "10000", env = "HTTP_MAX_CONNECTIONS")]
    pub max_connections: usize,

    /// Tamaño de la tabla de conexiones (mayor fd + 1 aceptado)
    #[arg(long = "max-fds", default_value = "65536", env = "HTTP_MAX_FDS")]
    pub max_fds: usize,

    /// Tamaño del buffer de lectura por conexión (bytes)
    #[arg(long = "read-buffer", default_value = "2048", env = "HTTP_READ_BUFFER")]
    pub read_buffer_size: usize,

    /// Tamaño máximo del bloque de headers de respuesta (bytes)
    #[arg(long = "write-buffer", default_value = "1024", env = "HTTP_WRITE_BUFFER")]
    pub write_buffer_size: usize,

    /// Eventos máximos por llamada a epoll_wait
    #[arg(long = "max-events", default_value = "10000", env = "HTTP_MAX_EVENTS")]
    pub max_events: usize,

    // === Logging ===

    /// Filtro de logs (ej: "info", "reactor_httpd=debug"); RUST_LOG tiene prioridad
    #[arg(long = "log-level", default_value = "info", env = "HTTP_LOG_LEVEL")]
    pub log_level: String,

    /// Escribir logs en este archivo en lugar de stdout
    #[arg(long = "log-file", env = "HTTP_LOG_FILE")]
    pub log_file: Option<PathBuf>,

    /// Formato de las líneas de log
    #[arg(long = "log-format", value_enum, default_value = "full", env = "HTTP_LOG_FORMAT")]
    pub log_format: LogFormat,

    /// Archivo JSON con cualquier subconjunto de estas opciones
    #[arg(short, long, env = "HTTP_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Claves aceptadas en el archivo de configuración
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    port: Option<u16>,
    host: Option<String>,
    root: Option<PathBuf>,
    workers: Option<usize>,
    queue_capacity: Option<usize>,
    max_connections: Option<usize>,
    max_fds: Option<usize>,
    read_buffer_size: Option<usize>,
    write_buffer_size: Option<usize>,
    max_events: Option<usize>,
    log_level: Option<String>,
    log_file: Option<PathBuf>,
    log_format: Option<LogFormat>,
}

impl FileConfig {
    fn read(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::FileParse {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl Config {
    /// Parsea argumentos y entorno del proceso, y aplica el archivo si hay uno
    ///
    /// `--help`, `--version` y argumentos inválidos terminan el proceso aquí.
    pub fn load() -> Result<Self, ConfigError> {
        let matches = Self::command().get_matches();
        Self::from_matches(&matches)
    }

    /// Igual que [`load`](Self::load) pero con argumentos explícitos
    pub fn load_from<I, T>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let matches = Self::command()
            .try_get_matches_from(args)
            .map_err(|e| ConfigError::Args(e.to_string()))?;
        Self::from_matches(&matches)
    }

    fn from_matches(matches: &ArgMatches) -> Result<Self, ConfigError> {
        let mut config =
            Self::from_arg_matches(matches).map_err(|e| ConfigError::Args(e.to_string()))?;
        if let Some(path) = config.config.clone() {
            let file = FileConfig::read(&path)?;
            config.merge_file(file, matches);
        }
        Ok(config)
    }

    /// El archivo solo pisa valores que vinieron del default
    fn merge_file(&mut self, file: FileConfig, matches: &ArgMatches) {
        merge(&mut self.port, file.port, matches, "port");
        merge(&mut self.host, file.host, matches, "host");
        merge(&mut self.root, file.root, matches, "root");
        merge(&mut self.workers, file.workers, matches, "workers");
        merge(&mut self.queue_capacity, file.queue_capacity, matches, "queue_capacity");
        merge(&mut self.max_connections, file.max_connections, matches, "max_connections");
        merge(&mut self.max_fds, file.max_fds, matches, "max_fds");
        merge(&mut self.read_buffer_size, file.read_buffer_size, matches, "read_buffer_size");
        merge(&mut self.write_buffer_size, file.write_buffer_size, matches, "write_buffer_size");
        merge(&mut self.max_events, file.max_events, matches, "max_events");
        merge(&mut self.log_level, file.log_level, matches, "log_level");
        merge(&mut self.log_file, file.log_file.map(Some), matches, "log_file");
        merge(&mut self.log_format, file.log_format, matches, "log_format");
    }

    /// Dirección de bind
    ///
    /// # Ejemplo
    /// ```rust
    /// use reactor_httpd::config::Config;
    ///
    /// let config = Config::default();
    /// assert_eq!(config.socket_addr().unwrap().to_string(), "0.0.0.0:8080");
    /// ```
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if let Ok(ip) = self.host.parse::<IpAddr>() {
            return Ok(SocketAddr::new(ip, self.port));
        }
        (self.host.as_str(), self.port)
            .to_socket_addrs()
            .ok()
            .and_then(|mut addrs| addrs.next())
            .ok_or_else(|| ConfigError::Host(self.host.clone()))
    }

    /// Valida la configuración
    pub fn validate(&self) -> Result<(), ConfigError> {
        at_least("workers", self.workers, 1)?;
        at_least("queue_capacity", self.queue_capacity, 1)?;
        at_least("max_connections", self.max_connections, 1)?;
        at_least("max_events", self.max_events, 1)?;
        at_least("read_buffer_size", self.read_buffer_size, MIN_READ_BUFFER)?;
        at_least("write_buffer_size", self.write_buffer_size, MIN_WRITE_BUFFER)?;

        if self.max_connections > self.max_fds {
            return Err(ConfigError::ConnectionsExceedTable {
                max_connections: self.max_connections,
                max_fds: self.max_fds,
            });
        }

        if !self.root.is_dir() {
            return Err(ConfigError::DocumentRoot(self.root.clone()));
        }

        EnvFilter::try_new(&self.log_level).map_err(|e| ConfigError::LogFilter {
            filter: self.log_level.clone(),
            reason: e.to_string(),
        })?;

        self.socket_addr()?;
        Ok(())
    }

    /// Loguea un resumen de la configuración
    pub fn log_summary(&self) {
        info!("🌐 Network: {}:{}", self.host, self.port);
        info!("📁 Document root: {}", self.root.display());
        info!(
            "👷 Workers: {} | Queue: {} | Max connections: {} (table {})",
            self.workers, self.queue_capacity, self.max_connections, self.max_fds
        );
        info!(
            "📦 Buffers: read {} B | write {} B | epoll events {}",
            self.read_buffer_size, self.write_buffer_size, self.max_events
        );
    }
}

impl Default for Config {
    /// Configuración por defecto
    fn default() -> Self {
        Self {
            port: 8080,
            host: "0.0.0.0".to_string(),
            root: PathBuf::from("./resources"),
            workers: 8,
            queue_capacity: 10_000,
            max_connections: 10_000,
            max_fds: 65_536,
            read_buffer_size: 2048,
            write_buffer_size: 1024,
            max_events: 10_000,
            log_level: "info".to_string(),
            log_file: None,
            log_format: LogFormat::Full,
            config: None,
        }
    }
}

fn merge<T>(slot: &mut T, value: Option<T>, matches: &ArgMatches, id: &str) {
    let from_default = matches!(matches.value_source(id), None | Some(ValueSource::DefaultValue));
    if let (Some(value), true) = (value, from_default) {
        *slot = value;
    }
}

fn at_least(field: &'static str, value: usize, min: usize) -> Result<(), ConfigError> {
    if value < min {
        return Err(ConfigError::TooSmall { field, min, value });
    }
    Ok(())
}
