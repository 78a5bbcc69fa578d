//! # Módulo del Servidor HTTP
//! src/server/mod.rs
//!
//! Arma las piezas y arranca el reactor:
//!
//! 1. Valida la configuración y abre el document root
//! 2. Crea el socket de escucha, epoll y el waker
//! 3. Registra listener y waker (no one-shot: solo los atiende el reactor)
//! 4. `run`: arranca el pool y entra al loop hasta el apagado
//!
//! ```no_run
//! use reactor_httpd::config::Config;
//! use reactor_httpd::server::Server;
//!
//! let server = Server::bind(Config::default()).unwrap();
//! println!("escuchando en {}", server.local_addr().unwrap());
//! server.run().unwrap();
//! ```

pub mod context;
pub mod reactor;
pub mod table;

pub use context::{ServerContext, Task, TaskKind};
pub use reactor::Reactor;
pub use table::{ConnectionTable, Slot};

use crate::config::Config;
use crate::error::{ConfigError, ServerError, ServerResult};
use crate::http::DocumentRoot;
use crate::metrics::{ServerStats, StatsSnapshot};
use crate::sys::{bind_listener, Interest, Poller, Waker};
use reactor::{LISTENER_TOKEN, WAKER_TOKEN};
use std::io;
use std::net::{SocketAddr, TcpListener};
use std::os::fd::AsRawFd;
use std::sync::Arc;
use tracing::info;

/// Servidor listo para correr
pub struct Server {
    ctx: Arc<ServerContext>,
    listener: TcpListener,
}

/// Permite pedir el apagado desde otro thread (o desde el handler de señales)
#[derive(Clone)]
pub struct ShutdownHandle {
    ctx: Arc<ServerContext>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.ctx.request_shutdown();
    }
}

impl Server {
    /// Valida `config`, hace bind y registra el listener
    ///
    /// Cualquier error aquí es fatal: el proceso no llega al loop.
    pub fn bind(config: Config) -> ServerResult<Self> {
        config.validate()?;
        let root = DocumentRoot::new(&config.root)
            .map_err(|_| ConfigError::DocumentRoot(config.root.clone()))?;
        let addr = config.socket_addr()?;

        let listener = bind_listener(addr)?;
        let poller = Poller::new().map_err(ServerError::Multiplexer)?;
        let waker = Waker::new().map_err(ServerError::Multiplexer)?;

        poller
            .register(listener.as_raw_fd(), LISTENER_TOKEN, Interest::Read, false)
            .map_err(ServerError::Multiplexer)?;
        poller
            .register(waker.as_raw_fd(), WAKER_TOKEN, Interest::Read, false)
            .map_err(ServerError::Multiplexer)?;

        info!("[+] Servidor escuchando en {}", listener.local_addr()?);

        let ctx = Arc::new(ServerContext::new(config, root, poller, waker));
        Ok(Self { ctx, listener })
    }

    /// Dirección real (útil con puerto 0)
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            ctx: Arc::clone(&self.ctx),
        }
    }

    pub fn stats(&self) -> Arc<ServerStats> {
        Arc::clone(&self.ctx.stats)
    }

    /// SIGINT/SIGTERM piden el apagado ordenado
    ///
    /// `ctrlc` admite un solo handler por proceso.
    pub fn install_signal_handler(&self) -> ServerResult<()> {
        let handle = self.shutdown_handle();
        ctrlc::set_handler(move || handle.shutdown())?;
        Ok(())
    }

    /// Corre el reactor hasta el apagado y retorna las estadísticas finales
    pub fn run(self) -> ServerResult<StatsSnapshot> {
        self.ctx.config.log_summary();
        let reactor = Reactor::new(self.ctx, self.listener)?;
        reactor.run()
    }
}
