//! # Pool de Workers
//! src/pool/mod.rs
//!
//! Mitad "síncrona" de la arquitectura half-sync/half-reactor:
//!
//! - `queue`: cola FIFO acotada de tareas listas para procesar
//! - `thread_pool`: N threads fijos que drenan la cola
//!
//! El reactor es el único productor. Cuando la cola está llena `submit`
//! falla inmediatamente (backpressure) en vez de bloquear al reactor.

pub mod queue;
pub mod thread_pool;

pub use queue::{QueueStats, TaskQueue};
pub use thread_pool::ThreadPool;
