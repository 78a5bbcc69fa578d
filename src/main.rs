//! # reactor_httpd - Entry Point
//! src/main.rs
//!
//! Orden de arranque: SIGPIPE, configuración, logging, bind, señales, loop.
//! Sale con 0 tras un apagado ordenado y con 1 ante cualquier error fatal.

use reactor_httpd::config::Config;
use reactor_httpd::server::Server;
use reactor_httpd::{logging, sys, ServerResult};
use tracing::{error, info};

fn main() {
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("💥 Error de configuración: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = logging::init(&config) {
        eprintln!("💥 {}", e);
        std::process::exit(1);
    }

    if let Err(e) = run(config) {
        error!("💥 Error fatal: {}", e);
        std::process::exit(1);
    }
}

fn run(config: Config) -> ServerResult<()> {
    sys::ignore_sigpipe()?;

    info!("=================================");
    info!("  reactor_httpd {}", env!("CARGO_PKG_VERSION"));
    info!("  half-sync/half-reactor HTTP/1.1");
    info!("=================================");

    let server = Server::bind(config)?;
    server.install_signal_handler()?;
    server.run()?;

    info!("👋 Servidor detenido");
    Ok(())
}
