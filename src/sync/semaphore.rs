//! # Semáforo Contador
//! src/sync/semaphore.rs
//!
//! `wait` decrementa bloqueando mientras el contador sea cero; `post`
//! incrementa y despierta a un thread en espera. Nunca bloquea en `post`.

use super::{Cond, Locker};

/// Semáforo contador
#[derive(Debug, Default)]
pub struct Semaphore {
    permits: Locker<usize>,
    cond: Cond,
}

impl Semaphore {
    /// Crea un semáforo con `initial` permisos disponibles
    pub const fn new(initial: usize) -> Self {
        Self {
            permits: Locker::new(initial),
            cond: Cond::new(),
        }
    }

    /// Decremento bloqueante
    pub fn wait(&self) {
        let mut permits = self.cond.wait_while(self.permits.lock(), |p| *p == 0);
        *permits -= 1;
    }

    /// Decremento no bloqueante. Retorna `false` si no había permisos.
    pub fn try_wait(&self) -> bool {
        let mut permits = self.permits.lock();
        if *permits == 0 {
            return false;
        }
        *permits -= 1;
        true
    }

    /// Incremento no bloqueante
    pub fn post(&self) {
        let mut permits = self.permits.lock();
        *permits += 1;
        self.cond.notify_one();
    }

    /// Permisos disponibles en este instante
    pub fn available(&self) -> usize {
        *self.permits.lock()
    }
}
