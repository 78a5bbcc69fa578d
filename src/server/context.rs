//! # Contexto del Servidor
//! src/server/context.rs
//!
//! Todo lo que comparten el reactor y los workers, construido una vez en
//! [`Server::bind`](super::Server::bind) y pasado por `Arc`. No hay estado
//! global.

use super::table::ConnectionTable;
use crate::config::Config;
use crate::http::{DocumentRoot, HttpConn, Outcome};
use crate::metrics::ServerStats;
use crate::sync::Locker;
use crate::sys::{Interest, Poller, Waker};
use std::os::fd::RawFd;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Tipo de pase que debe hacer el worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    Read,
    Write,
}

/// Entrada de la cola: referencia a un slot asignado
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Task {
    pub fd: RawFd,
    pub kind: TaskKind,
}

#[derive(Debug)]
pub struct ServerContext {
    pub config: Config,
    pub root: DocumentRoot,
    pub table: ConnectionTable,
    pub poller: Poller,
    pub waker: Waker,
    pub stats: Arc<ServerStats>,
    /// fds que un worker pidió cerrar; los consume el reactor
    close_requests: Locker<Vec<RawFd>>,
    shutdown: AtomicBool,
}

impl ServerContext {
    pub fn new(config: Config, root: DocumentRoot, poller: Poller, waker: Waker) -> Self {
        let table = ConnectionTable::new(
            config.max_fds,
            config.max_connections,
            config.read_buffer_size,
            config.write_buffer_size,
        );
        Self {
            config,
            root,
            table,
            poller,
            waker,
            stats: Arc::new(ServerStats::new()),
            close_requests: Locker::new(Vec::new()),
            shutdown: AtomicBool::new(false),
        }
    }

    /// Pide al reactor que cierre `fd`. El slot solo se libera en el reactor.
    pub fn request_close(&self, fd: RawFd) {
        self.close_requests.lock().push(fd);
        if let Err(e) = self.waker.wake() {
            warn!(fd, error = %e, "could not wake reactor");
        }
    }

    /// Vacía las solicitudes de cierre pendientes
    pub fn take_close_requests(&self) -> Vec<RawFd> {
        std::mem::take(&mut *self.close_requests.lock())
    }

    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
        if let Err(e) = self.waker.wake() {
            warn!(error = %e, "could not wake reactor for shutdown");
        }
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Pase de un worker sobre una conexión
    pub fn handle_task(&self, task: Task) {
        let root = &self.root;
        self.run_pass(task.fd, |conn| match task.kind {
            TaskKind::Read => conn.process(root),
            TaskKind::Write => conn.write_pass(),
        });
    }

    /// Corre `pass` sobre la conexión de `fd`, suelta el lock y la marca de
    /// despacho, y recién entonces rearma el fd (o pide el cierre). Después
    /// de rearmar el worker ya no toca la conexión.
    ///
    /// Un panic dentro del pase cuenta como `Outcome::Close`: el slot
    /// siempre vuelve al reactor.
    pub fn run_pass<F>(&self, fd: RawFd, pass: F)
    where
        F: FnOnce(&mut HttpConn) -> Outcome,
    {
        let Some(slot) = self.table.get(fd) else {
            debug!(fd, "task for a released slot");
            return;
        };

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            let mut guard = slot.lock();
            let Some(conn) = guard.as_mut() else {
                return Outcome::Close;
            };
            let outcome = pass(&mut **conn);
            if let Some(done) = conn.take_completed() {
                self.stats.record_response(done.status, done.bytes);
                debug!(
                    fd,
                    peer = ?conn.peer(),
                    status = done.status.as_u16(),
                    bytes = done.bytes,
                    "response sent"
                );
            }
            outcome
        }));
        let outcome = result.unwrap_or_else(|_| {
            error!(fd, "❌ El pase hizo panic; cerrando la conexión");
            Outcome::Close
        });
        slot.end_dispatch();

        match outcome {
            Outcome::Rearm(interest) => self.rearm(fd, interest),
            Outcome::Close => self.request_close(fd),
        }
    }

    fn rearm(&self, fd: RawFd, interest: Interest) {
        if let Err(e) = self.poller.rearm(fd, fd as u64, interest) {
            warn!(fd, error = %e, "rearm failed, closing");
            self.request_close(fd);
        }
    }
}
