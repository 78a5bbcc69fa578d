//! # Reactor
//! src/server/reactor.rs
//!
//! Un solo thread dueño del socket de escucha y del registro en epoll:
//!
//! 1. Espera eventos (sin timeout, salvo que haya tareas diferidas)
//! 2. Listener: acepta todo lo pendiente y registra cada fd en one-shot
//! 3. Conexión lista para leer: lee hasta `WouldBlock` y encola el pase
//! 4. Conexión lista para escribir: encola el pase de escritura
//! 5. Hangup/error: cierra y libera el slot
//! 6. Waker: aplica los cierres pedidos por los workers y el apagado
//!
//! Si la cola está llena la tarea queda en `backlog` y se reintenta en la
//! siguiente vuelta; el reactor nunca se bloquea esperando lugar.

use super::context::{ServerContext, Task, TaskKind};
use crate::error::{ServerError, ServerResult};
use crate::metrics::StatsSnapshot;
use crate::pool::ThreadPool;
use crate::sys::{Event, Events, Interest};
use std::collections::VecDeque;
use std::io;
use std::net::TcpListener;
use std::os::fd::{AsRawFd, RawFd};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Token del socket de escucha
pub const LISTENER_TOKEN: u64 = u64::MAX;

/// Token del waker
pub const WAKER_TOKEN: u64 = u64::MAX - 1;

/// Espera máxima mientras hay tareas diferidas por cola llena
const BACKLOG_RETRY: Duration = Duration::from_millis(1);

pub struct Reactor {
    ctx: Arc<ServerContext>,
    listener: TcpListener,
    pool: ThreadPool<Task>,
    events: Events,
    backlog: VecDeque<Task>,
}

impl Reactor {
    /// Arranca el pool de workers; el listener y el waker ya están registrados
    pub fn new(ctx: Arc<ServerContext>, listener: TcpListener) -> ServerResult<Self> {
        let worker_ctx = Arc::clone(&ctx);
        let pool = ThreadPool::new(
            ctx.config.workers,
            ctx.config.queue_capacity,
            move |task: Task| worker_ctx.handle_task(task),
        )?;
        let events = Events::with_capacity(ctx.config.max_events);

        Ok(Self {
            ctx,
            listener,
            pool,
            events,
            backlog: VecDeque::new(),
        })
    }

    /// Loop principal; retorna al pedirse el apagado
    pub fn run(mut self) -> ServerResult<StatsSnapshot> {
        info!("🚀 Reactor corriendo");

        while !self.ctx.is_shutting_down() {
            self.flush_backlog();

            let timeout = if self.backlog.is_empty() {
                None
            } else {
                Some(BACKLOG_RETRY)
            };
            self.ctx
                .poller
                .wait(&mut self.events, timeout)
                .map_err(ServerError::Multiplexer)?;

            for i in 0..self.events.len() {
                let Some(event) = self.events.get(i) else {
                    break;
                };
                match event.token {
                    LISTENER_TOKEN => self.accept_all(),
                    WAKER_TOKEN => {
                        self.ctx.waker.drain();
                        self.apply_close_requests();
                    }
                    token => self.on_connection(token as RawFd, event),
                }
            }
        }

        Ok(self.shutdown())
    }

    /// Acepta hasta `WouldBlock`
    fn accept_all(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    if let Err(e) = stream.set_nonblocking(true) {
                        warn!(%peer, error = %e, "could not set socket non-blocking");
                        continue;
                    }
                    match self.ctx.table.claim(stream, peer) {
                        Ok(fd) => {
                            if let Err(e) =
                                self.ctx.poller.register(fd, fd as u64, Interest::Read, true)
                            {
                                warn!(fd, %peer, error = %e, "register failed");
                                self.ctx.table.release(fd);
                                continue;
                            }
                            self.ctx.stats.record_accept();
                            debug!(fd, %peer, active = self.ctx.table.active(), "✅ Nueva conexión");
                        }
                        Err(stream) => {
                            // Sin slot no hay estado para armar una respuesta
                            self.ctx.stats.record_reject();
                            debug!(%peer, active = self.ctx.table.active(), "table full, closing");
                            drop(stream);
                        }
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!(error = %e, "❌ Error al aceptar conexión");
                    break;
                }
            }
        }
    }

    fn on_connection(&mut self, fd: RawFd, event: Event) {
        let ctx = Arc::clone(&self.ctx);
        let Some(slot) = ctx.table.get(fd) else {
            trace!(fd, "event for a free slot");
            return;
        };

        if !slot.begin_dispatch() {
            // One-shot impide esto; si pasa, el evento se descarta
            self.ctx.stats.record_dispatch_violation();
            warn!(fd, "event for a connection already in flight");
            return;
        }

        let readiness = event.readiness;
        if readiness.is_hangup() || readiness.is_error() {
            debug!(fd, "hangup/error");
            self.close(fd);
            return;
        }

        // Con medio cierre (RDHUP) igual se lee: puede haber un request completo
        let kind = if readiness.is_readable() || readiness.is_read_closed() {
            let read = slot
                .lock()
                .as_mut()
                .map(|conn| conn.read_from_socket())
                .unwrap_or_else(|| Err(io::ErrorKind::NotConnected.into()));
            match read {
                Ok(n) => {
                    trace!(fd, bytes = n, "read");
                    TaskKind::Read
                }
                Err(e) => {
                    debug!(fd, error = %e, "read failed");
                    self.close(fd);
                    return;
                }
            }
        } else if readiness.is_writable() {
            TaskKind::Write
        } else {
            slot.end_dispatch();
            if let Err(e) = self.ctx.poller.rearm(fd, fd as u64, Interest::Read) {
                warn!(fd, error = %e, "rearm failed");
                self.close(fd);
            }
            return;
        };

        self.dispatch(Task { fd, kind });
    }

    /// Encola o difiere. Mientras espera en el backlog la tarea conserva la
    /// marca de despacho y el fd sigue desarmado.
    fn dispatch(&mut self, task: Task) {
        if !self.backlog.is_empty() || !self.pool.submit(task) {
            self.ctx.stats.record_queue_full();
            trace!(fd = task.fd, "queue full, deferring");
            self.backlog.push_back(task);
        }
    }

    fn flush_backlog(&mut self) {
        while let Some(task) = self.backlog.front().copied() {
            if !self.pool.submit(task) {
                break;
            }
            self.backlog.pop_front();
        }
    }

    fn apply_close_requests(&mut self) {
        for fd in self.ctx.take_close_requests() {
            self.close(fd);
        }
    }

    /// Desregistra, libera el slot y cierra el socket
    fn close(&mut self, fd: RawFd) {
        if let Err(e) = self.ctx.poller.deregister(fd) {
            debug!(fd, error = %e, "deregister failed");
        }
        if let Some(stream) = self.ctx.table.release(fd) {
            drop(stream);
            self.ctx.stats.record_close();
            debug!(fd, active = self.ctx.table.active(), "connection closed");
        }
    }

    /// Drena el pool, cierra todas las conexiones y retorna las estadísticas
    fn shutdown(mut self) -> StatsSnapshot {
        info!("🛑 Apagando: dejando de aceptar conexiones");
        if let Err(e) = self.ctx.poller.deregister(self.listener.as_raw_fd()) {
            debug!(error = %e, "listener deregister failed");
        }

        // Las tareas diferidas se descartan; sus conexiones se cierran abajo
        let queue = self.pool.queue().stats();
        info!(
            pending = queue.pending,
            capacity = queue.capacity,
            deferred = self.backlog.len(),
            "🧹 Drenando cola de tareas"
        );
        self.backlog.clear();
        self.pool.shutdown();

        self.apply_close_requests();
        for fd in self.ctx.table.assigned() {
            self.close(fd);
        }

        let snapshot = self.ctx.stats.snapshot();
        info!(stats = %snapshot.to_json(), "📊 Estadísticas finales");
        snapshot
    }
}
