//! # Waker
//! src/sys/waker.rs
//!
//! `eventfd` registrado en el epoll del reactor. Los workers lo usan para
//! avisar que dejaron solicitudes de cierre, y el handler de señales para
//! pedir el apagado.

use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};

#[derive(Debug)]
pub struct Waker {
    fd: OwnedFd,
}

impl Waker {
    pub fn new() -> io::Result<Self> {
        let fd = unsafe { libc::eventfd(0, libc::EFD_NONBLOCK | libc::EFD_CLOEXEC) };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(Self {
            fd: unsafe { OwnedFd::from_raw_fd(fd) },
        })
    }

    /// Despierta al reactor. Varias llamadas seguidas se acumulan en una.
    pub fn wake(&self) -> io::Result<()> {
        let one: u64 = 1;
        let res = unsafe {
            libc::write(
                self.fd.as_raw_fd(),
                &one as *const u64 as *const libc::c_void,
                std::mem::size_of::<u64>(),
            )
        };
        if res < 0 {
            let err = io::Error::last_os_error();
            // Contador saturado: el reactor ya tiene un despertar pendiente
            if err.kind() != io::ErrorKind::WouldBlock {
                return Err(err);
            }
        }
        Ok(())
    }

    /// Consume los despertares pendientes
    pub fn drain(&self) {
        let mut value: u64 = 0;
        unsafe {
            libc::read(
                self.fd.as_raw_fd(),
                &mut value as *mut u64 as *mut libc::c_void,
                std::mem::size_of::<u64>(),
            );
        }
    }
}

impl AsRawFd for Waker {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}
