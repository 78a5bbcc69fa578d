//! # Socket de Escucha
//! src/sys/socket.rs
//!
//! Crea el socket de escucha no bloqueante con `SO_REUSEADDR` habilitado.
//! Las conexiones aceptadas se manejan como `TcpStream` de std en modo
//! no bloqueante.

use crate::error::ServerError;
use std::io;
use std::mem;
use std::net::{SocketAddr, TcpListener};
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};

/// Backlog fijo de `listen(2)`
pub const LISTEN_BACKLOG: libc::c_int = 128;

/// Crea, configura, enlaza y pone a escuchar el socket
///
/// Cada paso tiene su propia variante de error para que `main` pueda
/// reportar exactamente qué falló antes de entrar al loop.
pub fn bind_listener(addr: SocketAddr) -> Result<TcpListener, ServerError> {
    let domain = match addr {
        SocketAddr::V4(_) => libc::AF_INET,
        SocketAddr::V6(_) => libc::AF_INET6,
    };

    // 1. Crear socket
    let raw = unsafe {
        libc::socket(
            domain,
            libc::SOCK_STREAM | libc::SOCK_NONBLOCK | libc::SOCK_CLOEXEC,
            0,
        )
    };
    if raw < 0 {
        return Err(ServerError::Socket(io::Error::last_os_error()));
    }
    // A partir de aquí el fd se cierra solo en cualquier camino de error
    let fd = unsafe { OwnedFd::from_raw_fd(raw) };

    // 2. SO_REUSEADDR
    let optval: libc::c_int = 1;
    let res = unsafe {
        libc::setsockopt(
            fd.as_raw_fd(),
            libc::SOL_SOCKET,
            libc::SO_REUSEADDR,
            &optval as *const _ as *const libc::c_void,
            mem::size_of_val(&optval) as libc::socklen_t,
        )
    };
    if res < 0 {
        return Err(ServerError::Socket(io::Error::last_os_error()));
    }

    // 3. Bind
    let res = match addr {
        SocketAddr::V4(a) => {
            let sin = libc::sockaddr_in {
                sin_family: libc::AF_INET as libc::sa_family_t,
                sin_port: a.port().to_be(),
                sin_addr: libc::in_addr {
                    s_addr: u32::from_ne_bytes(a.ip().octets()),
                },
                sin_zero: [0; 8],
            };
            unsafe {
                libc::bind(
                    fd.as_raw_fd(),
                    &sin as *const _ as *const libc::sockaddr,
                    mem::size_of_val(&sin) as libc::socklen_t,
                )
            }
        }
        SocketAddr::V6(a) => {
            let sin6 = libc::sockaddr_in6 {
                sin6_family: libc::AF_INET6 as libc::sa_family_t,
                sin6_port: a.port().to_be(),
                sin6_flowinfo: a.flowinfo(),
                sin6_addr: libc::in6_addr {
                    s6_addr: a.ip().octets(),
                },
                sin6_scope_id: a.scope_id(),
            };
            unsafe {
                libc::bind(
                    fd.as_raw_fd(),
                    &sin6 as *const _ as *const libc::sockaddr,
                    mem::size_of_val(&sin6) as libc::socklen_t,
                )
            }
        }
    };
    if res < 0 {
        return Err(ServerError::Bind {
            addr,
            source: io::Error::last_os_error(),
        });
    }

    // 4. Listen
    if unsafe { libc::listen(fd.as_raw_fd(), LISTEN_BACKLOG) } < 0 {
        return Err(ServerError::Listen(io::Error::last_os_error()));
    }

    Ok(TcpListener::from(fd))
}
