//! # Señales
//! src/sys/signal.rs

use std::io;

/// Ignora `SIGPIPE`: un peer que cierra a mitad de una escritura aparece
/// como un `write` fallido (`EPIPE`) y no como la muerte del proceso.
pub fn ignore_sigpipe() -> io::Result<()> {
    let previous = unsafe { libc::signal(libc::SIGPIPE, libc::SIG_IGN) };
    if previous == libc::SIG_ERR {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ignore_sigpipe_is_idempotent() {
        assert!(ignore_sigpipe().is_ok());
        assert!(ignore_sigpipe().is_ok());
    }
}
