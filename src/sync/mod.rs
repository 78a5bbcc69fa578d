//! # Primitivas de Sincronización
//! src/sync/mod.rs
//!
//! Bloques básicos sobre los que se construye la cola de tareas:
//!
//! - [`Locker`]: exclusión mutua con adquisición por scope (el guard libera
//!   el lock en cualquier salida, incluso con `?` o panic)
//! - [`Cond`]: variable de condición ligada a un `Locker`
//! - [`Semaphore`]: semáforo contador (wait bloqueante, post no bloqueante)
//!
//! El envenenamiento de un mutex (un thread que hizo panic con el lock tomado)
//! no se propaga: se recupera el guard y se continúa. Un worker que falla no
//! debe dejar la cola inutilizable para el resto.

pub mod cond;
pub mod locker;
pub mod semaphore;

pub use cond::Cond;
pub use locker::{Locker, LockerGuard};
pub use semaphore::Semaphore;
