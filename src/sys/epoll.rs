//! # Multiplexor epoll
//! src/sys/epoll.rs
//!
//! Todas las conexiones se registran en modo one-shot y level-triggered:
//! después de entregar un evento el descriptor queda deshabilitado hasta que
//! alguien lo rearme con [`Poller::rearm`]. Eso garantiza que un descriptor
//! nunca está en manos de dos threads a la vez.

use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::ptr;
use std::time::Duration;

/// Interés de registro
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interest {
    Read,
    Write,
}

impl Interest {
    fn bits(self) -> u32 {
        match self {
            Interest::Read => (libc::EPOLLIN | libc::EPOLLRDHUP) as u32,
            Interest::Write => libc::EPOLLOUT as u32,
        }
    }
}

/// Banderas observadas en un evento
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Readiness(u32);

impl Readiness {
    pub fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub fn is_readable(&self) -> bool {
        self.0 & (libc::EPOLLIN as u32) != 0
    }

    pub fn is_writable(&self) -> bool {
        self.0 & (libc::EPOLLOUT as u32) != 0
    }

    /// El peer cerró su lado de escritura (puede quedar data por leer)
    pub fn is_read_closed(&self) -> bool {
        self.0 & (libc::EPOLLRDHUP as u32) != 0
    }

    pub fn is_hangup(&self) -> bool {
        self.0 & (libc::EPOLLHUP as u32) != 0
    }

    pub fn is_error(&self) -> bool {
        self.0 & (libc::EPOLLERR as u32) != 0
    }
}

/// Evento entregado por [`Poller::wait`]
#[derive(Debug, Clone, Copy)]
pub struct Event {
    pub token: u64,
    pub readiness: Readiness,
}

/// Buffer reutilizable de eventos
pub struct Events {
    buf: Vec<libc::epoll_event>,
    len: usize,
}

impl Events {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: vec![libc::epoll_event { events: 0, u64: 0 }; capacity.max(1)],
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Evento `i` de la última espera
    pub fn get(&self, i: usize) -> Option<Event> {
        self.buf[..self.len].get(i).map(|ev| {
            // epoll_event es packed en x86_64: copiar los campos, nunca referenciarlos
            let bits = ev.events;
            let token = ev.u64;
            Event {
                token,
                readiness: Readiness(bits),
            }
        })
    }

}

/// Instancia de epoll
#[derive(Debug)]
pub struct Poller {
    fd: OwnedFd,
}

impl Poller {
    pub fn new() -> io::Result<Self> {
        let fd = unsafe { libc::epoll_create1(libc::EPOLL_CLOEXEC) };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(Self {
            fd: unsafe { OwnedFd::from_raw_fd(fd) },
        })
    }

    /// Registra `fd` con el interés dado
    ///
    /// `one_shot = false` solo se usa para descriptores internos (socket de
    /// escucha, waker) que atiende exclusivamente el reactor.
    pub fn register(&self, fd: RawFd, token: u64, interest: Interest, one_shot: bool) -> io::Result<()> {
        let mut bits = interest.bits();
        if one_shot {
            bits |= libc::EPOLLONESHOT as u32;
        }
        self.ctl(libc::EPOLL_CTL_ADD, fd, bits, token)
    }

    /// Rearma un registro one-shot con el próximo interés
    pub fn rearm(&self, fd: RawFd, token: u64, interest: Interest) -> io::Result<()> {
        let bits = interest.bits() | libc::EPOLLONESHOT as u32;
        self.ctl(libc::EPOLL_CTL_MOD, fd, bits, token)
    }

    /// Elimina el registro de `fd`. Un descriptor ya ausente no es error.
    pub fn deregister(&self, fd: RawFd) -> io::Result<()> {
        let res = unsafe { libc::epoll_ctl(self.fd.as_raw_fd(), libc::EPOLL_CTL_DEL, fd, ptr::null_mut()) };
        if res < 0 {
            let err = io::Error::last_os_error();
            if err.raw_os_error() != Some(libc::ENOENT) {
                return Err(err);
            }
        }
        Ok(())
    }

    /// Espera eventos. `None` bloquea indefinidamente.
    ///
    /// Una interrupción por señal (`EINTR`) se reporta como cero eventos.
    pub fn wait(&self, events: &mut Events, timeout: Option<Duration>) -> io::Result<usize> {
        let timeout_ms = match timeout {
            None => -1,
            Some(d) => d.as_millis().min(i32::MAX as u128) as i32,
        };

        let res = unsafe {
            libc::epoll_wait(
                self.fd.as_raw_fd(),
                events.buf.as_mut_ptr(),
                events.buf.len() as libc::c_int,
                timeout_ms,
            )
        };

        if res < 0 {
            events.len = 0;
            let err = io::Error::last_os_error();
            if err.raw_os_error() == Some(libc::EINTR) {
                return Ok(0);
            }
            return Err(err);
        }

        events.len = res as usize;
        Ok(events.len)
    }

    fn ctl(&self, op: libc::c_int, fd: RawFd, bits: u32, token: u64) -> io::Result<()> {
        let mut event = libc::epoll_event { events: bits, u64: token };
        let res = unsafe { libc::epoll_ctl(self.fd.as_raw_fd(), op, fd, &mut event) };
        if res < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

impl AsRawFd for Poller {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}
