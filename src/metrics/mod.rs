//! # Estadísticas
//! src/metrics/mod.rs
//!
//! Contadores del servidor:
//! - Conexiones aceptadas, rechazadas y cerradas
//! - Respuestas por código de estado y bytes enviados
//! - Tareas diferidas por cola llena
//! - Violaciones del despacho one-shot (debe quedar en 0)

pub mod stats;

pub use stats::{ResponseCounts, ServerStats, StatsSnapshot};
