//! # Logging
//! src/logging.rs
//!
//! Inicializa el subscriber de `tracing` una sola vez, desde `main`. El resto
//! del crate solo usa los macros (`info!`, `warn!`, ...) y no sabe a dónde
//! van las líneas ni con qué formato.
//!
//! ```bash
//! # Filtro por CLI / entorno
//! ./reactor_httpd --log-level reactor_httpd=debug
//!
//! # RUST_LOG tiene prioridad
//! RUST_LOG=trace ./reactor_httpd
//! ```

use crate::config::Config;
use crate::error::ServerError;
use clap::ValueEnum;
use serde::Deserialize;
use std::fs::OpenOptions;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

/// Campos de cada línea
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// timestamp, nivel, thread, target, mensaje y campos
    #[default]
    Full,
    /// timestamp, nivel, mensaje y campos
    Compact,
}

/// Destino de las líneas
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogSink {
    Console,
    /// Append, sin colores ANSI
    File(PathBuf),
}

impl LogSink {
    pub fn from_config(config: &Config) -> Self {
        match &config.log_file {
            Some(path) => LogSink::File(path.clone()),
            None => LogSink::Console,
        }
    }

    fn writer(&self) -> io::Result<(BoxMakeWriter, bool)> {
        match self {
            LogSink::Console => Ok((BoxMakeWriter::new(io::stdout), true)),
            LogSink::File(path) => {
                let file = OpenOptions::new().create(true).append(true).open(path)?;
                Ok((BoxMakeWriter::new(Mutex::new(file)), false))
            }
        }
    }
}

/// Filtro efectivo: `RUST_LOG` si está definido, si no `config.log_level`
pub fn filter(config: &Config) -> Result<EnvFilter, ServerError> {
    let directives = match std::env::var("RUST_LOG") {
        Ok(value) if !value.trim().is_empty() => value,
        _ => config.log_level.clone(),
    };
    EnvFilter::try_new(&directives)
        .map_err(|e| ServerError::Logging(format!("invalid filter {:?}: {}", directives, e)))
}

/// Instala el subscriber global
///
/// Falla si ya había uno instalado o si no se pudo abrir el archivo de log.
pub fn init(config: &Config) -> Result<(), ServerError> {
    let filter = filter(config)?;
    let sink = LogSink::from_config(config);
    let (writer, ansi) = sink
        .writer()
        .map_err(|e| ServerError::Logging(format!("cannot open log sink {:?}: {}", sink, e)))?;

    let layer: Box<dyn Layer<Registry> + Send + Sync> = match config.log_format {
        LogFormat::Full => fmt::layer()
            .with_writer(writer)
            .with_ansi(ansi)
            .with_thread_names(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_writer(writer)
            .with_ansi(ansi)
            .with_target(false)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .try_init()
        .map_err(|e| ServerError::Logging(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sink_from_config() {
        let mut config = Config::default();
        assert_eq!(LogSink::from_config(&config), LogSink::Console);

        config.log_file = Some(PathBuf::from("/tmp/server.log"));
        assert_eq!(
            LogSink::from_config(&config),
            LogSink::File(PathBuf::from("/tmp/server.log"))
        );
    }

    #[test]
    fn test_file_sink_opens_in_append_mode() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("server.log");
        std::fs::write(&path, b"previous\n").unwrap();

        let sink = LogSink::File(path.clone());
        let (_writer, ansi) = sink.writer().unwrap();
        assert!(!ansi);
        assert_eq!(std::fs::read(&path).unwrap(), b"previous\n");
    }

    #[test]
    fn test_log_format_from_json() {
        let format: LogFormat = serde_json::from_str(r#""compact""#).unwrap();
        assert_eq!(format, LogFormat::Compact);
    }
}
