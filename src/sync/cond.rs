//! # Variable de Condición
//! src/sync/cond.rs
//!
//! `wait` libera el lock mientras el thread está bloqueado y lo vuelve a
//! tomar antes de retornar.

use super::LockerGuard;
use std::sync::{Condvar, PoisonError};
use std::time::Duration;

/// Variable de condición asociada a un [`Locker`](super::Locker)
#[derive(Debug, Default)]
pub struct Cond {
    inner: Condvar,
}

impl Cond {
    pub const fn new() -> Self {
        Self {
            inner: Condvar::new(),
        }
    }

    /// Bloquea hasta recibir una notificación
    ///
    /// Puede despertar espuriamente: el llamador debe re-verificar su
    /// condición (o usar [`Cond::wait_while`]).
    pub fn wait<'a, T>(&self, guard: LockerGuard<'a, T>) -> LockerGuard<'a, T> {
        self.inner.wait(guard).unwrap_or_else(PoisonError::into_inner)
    }

    /// Bloquea mientras `condition` sea verdadera
    pub fn wait_while<'a, T, F>(&self, guard: LockerGuard<'a, T>, condition: F) -> LockerGuard<'a, T>
    where
        F: FnMut(&mut T) -> bool,
    {
        self.inner
            .wait_while(guard, condition)
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Como `wait` pero con límite de tiempo. Retorna `true` si expiró.
    pub fn wait_timeout<'a, T>(
        &self,
        guard: LockerGuard<'a, T>,
        timeout: Duration,
    ) -> (LockerGuard<'a, T>, bool) {
        let (guard, result) = self
            .inner
            .wait_timeout(guard, timeout)
            .unwrap_or_else(PoisonError::into_inner);
        (guard, result.timed_out())
    }

    /// Despierta a un thread en espera
    pub fn notify_one(&self) {
        self.inner.notify_one();
    }

    /// Despierta a todos los threads en espera
    pub fn notify_all(&self) {
        self.inner.notify_all();
    }
}
