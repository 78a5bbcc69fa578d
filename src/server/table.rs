//! # Tabla de Conexiones
//! src/server/table.rs
//!
//! Arreglo fijo de slots indexado por el valor del fd: un evento de epoll
//! trae el fd como token y se llega al estado de la conexión en O(1).
//!
//! ## Propiedad
//!
//! - `claim` y `release` los llama solo el thread del reactor.
//! - El `HttpConn` de un slot lo toca solo quien tiene el despacho del fd:
//!   el reactor (lectura previa al encolado) o el worker que lo procesa.
//!   La marca `in_flight` lo hace verificable: un segundo despacho mientras
//!   la marca está puesta es una violación.
//!
//! El buffer de cada slot se crea la primera vez que se usa y se reutiliza
//! cuando el fd vuelve a aparecer.

use crate::http::HttpConn;
use crate::sync::{Locker, LockerGuard};
use std::net::{SocketAddr, TcpStream};
use std::os::fd::{AsRawFd, RawFd};
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};

const FREE: u8 = 0;
const ASSIGNED: u8 = 1;

/// Entrada de la tabla
#[derive(Debug)]
pub struct Slot {
    state: AtomicU8,
    in_flight: AtomicBool,
    conn: Locker<Option<Box<HttpConn>>>,
}

impl Slot {
    fn new() -> Self {
        Self {
            state: AtomicU8::new(FREE),
            in_flight: AtomicBool::new(false),
            conn: Locker::new(None),
        }
    }

    pub fn is_assigned(&self) -> bool {
        self.state.load(Ordering::Acquire) == ASSIGNED
    }

    /// Toma el despacho del slot. `false` si ya estaba en vuelo.
    pub fn begin_dispatch(&self) -> bool {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Suelta el despacho. Debe llamarse antes de rearmar el fd.
    pub fn end_dispatch(&self) {
        self.in_flight.store(false, Ordering::Release);
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Acceso a la conexión. Nunca hay contención: solo el dueño del
    /// despacho llega aquí.
    pub fn lock(&self) -> LockerGuard<'_, Option<Box<HttpConn>>> {
        self.conn.lock()
    }
}

/// Tabla de conexiones con tope de admisión
#[derive(Debug)]
pub struct ConnectionTable {
    slots: Box<[Slot]>,
    max_connections: usize,
    active: AtomicUsize,
    read_buffer_size: usize,
    write_buffer_size: usize,
}

impl ConnectionTable {
    /// `max_fds` slots; como máximo `max_connections` asignados a la vez
    pub fn new(
        max_fds: usize,
        max_connections: usize,
        read_buffer_size: usize,
        write_buffer_size: usize,
    ) -> Self {
        let slots = (0..max_fds).map(|_| Slot::new()).collect::<Vec<_>>();
        Self {
            slots: slots.into_boxed_slice(),
            max_connections,
            active: AtomicUsize::new(0),
            read_buffer_size,
            write_buffer_size,
        }
    }

    /// Conexiones asignadas ahora mismo
    pub fn active(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    pub fn is_full(&self) -> bool {
        self.active() >= self.max_connections
    }

    /// Asigna el slot del fd de `stream`
    ///
    /// Si la tabla está llena o el fd no cabe, devuelve el stream para que
    /// el llamador lo cierre.
    pub fn claim(&self, stream: TcpStream, peer: SocketAddr) -> Result<RawFd, TcpStream> {
        let fd = stream.as_raw_fd();
        if self.is_full() {
            return Err(stream);
        }
        let Some(slot) = usize::try_from(fd).ok().and_then(|i| self.slots.get(i)) else {
            return Err(stream);
        };
        if slot
            .state
            .compare_exchange(FREE, ASSIGNED, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(stream);
        }

        {
            let mut guard = slot.conn.lock();
            let conn = guard.get_or_insert_with(|| {
                Box::new(HttpConn::new(self.read_buffer_size, self.write_buffer_size))
            });
            conn.attach(stream, peer);
        }
        slot.in_flight.store(false, Ordering::Release);
        self.active.fetch_add(1, Ordering::AcqRel);
        Ok(fd)
    }

    /// Libera el slot y devuelve el socket (que se cierra al hacer drop)
    pub fn release(&self, fd: RawFd) -> Option<TcpStream> {
        let slot = self.slot(fd)?;
        if slot
            .state
            .compare_exchange(ASSIGNED, FREE, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return None;
        }

        let stream = slot.conn.lock().as_mut().and_then(|conn| conn.detach());
        slot.in_flight.store(false, Ordering::Release);
        self.active.fetch_sub(1, Ordering::AcqRel);
        stream
    }

    /// Slot asignado para `fd`
    pub fn get(&self, fd: RawFd) -> Option<&Slot> {
        self.slot(fd).filter(|slot| slot.is_assigned())
    }

    fn slot(&self, fd: RawFd) -> Option<&Slot> {
        usize::try_from(fd).ok().and_then(|i| self.slots.get(i))
    }

    /// fds de todos los slots asignados
    pub fn assigned(&self) -> Vec<RawFd> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_assigned())
            .map(|(fd, _)| fd as RawFd)
            .collect()
    }

    /// Slots con despacho en vuelo
    pub fn in_flight(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_in_flight()).count()
    }
}
