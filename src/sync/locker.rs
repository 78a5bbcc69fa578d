//! # Locker
//! src/sync/locker.rs
//!
//! Mutex con adquisición por scope.

use std::sync::{Mutex, MutexGuard, PoisonError, TryLockError};

/// Guard retornado por [`Locker::lock`]. Libera el lock al salir de scope.
pub type LockerGuard<'a, T> = MutexGuard<'a, T>;

/// Exclusión mutua sobre un valor `T`
#[derive(Debug, Default)]
pub struct Locker<T> {
    inner: Mutex<T>,
}

impl<T> Locker<T> {
    /// Crea un locker protegiendo `value`
    pub const fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(value),
        }
    }

    /// Adquiere el lock, bloqueando hasta obtenerlo
    ///
    /// # Ejemplo
    /// ```
    /// use reactor_httpd::sync::Locker;
    ///
    /// let counter = Locker::new(0);
    /// {
    ///     let mut guard = counter.lock();
    ///     *guard += 1;
    /// } // el lock se libera aquí
    /// assert_eq!(*counter.lock(), 1);
    /// ```
    pub fn lock(&self) -> LockerGuard<'_, T> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Intenta adquirir el lock sin bloquear
    pub fn try_lock(&self) -> Option<LockerGuard<'_, T>> {
        match self.inner.try_lock() {
            Ok(guard) => Some(guard),
            Err(TryLockError::Poisoned(poisoned)) => Some(poisoned.into_inner()),
            Err(TryLockError::WouldBlock) => None,
        }
    }
}
