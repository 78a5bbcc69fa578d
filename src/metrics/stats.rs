//! # Estadísticas del Servidor
//! src/metrics/stats.rs
//!
//! Contadores atómicos compartidos entre el reactor y los workers.
//! [`ServerStats::snapshot`] los copia a una estructura serializable que el
//! reactor loguea como JSON al apagarse.

use crate::http::StatusCode;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Contadores del servidor
#[derive(Debug)]
pub struct ServerStats {
    accepted: AtomicU64,
    rejected: AtomicU64,
    closed: AtomicU64,
    requests: AtomicU64,
    status_200: AtomicU64,
    status_400: AtomicU64,
    status_403: AtomicU64,
    status_404: AtomicU64,
    status_500: AtomicU64,
    bytes_sent: AtomicU64,
    queue_full: AtomicU64,
    dispatch_violations: AtomicU64,
    start_time: Instant,
}

/// Copia puntual de los contadores
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub uptime_secs: u64,
    pub accepted: u64,
    pub rejected: u64,
    pub closed: u64,
    pub requests: u64,
    pub responses: ResponseCounts,
    pub bytes_sent: u64,
    pub queue_full: u64,
    pub dispatch_violations: u64,
}

/// Respuestas enviadas por código
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResponseCounts {
    #[serde(rename = "200")]
    pub ok: u64,
    #[serde(rename = "400")]
    pub bad_request: u64,
    #[serde(rename = "403")]
    pub forbidden: u64,
    #[serde(rename = "404")]
    pub not_found: u64,
    #[serde(rename = "500")]
    pub internal_error: u64,
}

impl ServerStats {
    pub fn new() -> Self {
        Self {
            accepted: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            closed: AtomicU64::new(0),
            requests: AtomicU64::new(0),
            status_200: AtomicU64::new(0),
            status_400: AtomicU64::new(0),
            status_403: AtomicU64::new(0),
            status_404: AtomicU64::new(0),
            status_500: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            queue_full: AtomicU64::new(0),
            dispatch_violations: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_accept(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
    }

    /// Conexión rechazada por tabla llena o fd fuera de rango
    pub fn record_reject(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_close(&self) {
        self.closed.fetch_add(1, Ordering::Relaxed);
    }

    /// Registra una respuesta enviada completa
    pub fn record_response(&self, status: StatusCode, bytes: u64) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes, Ordering::Relaxed);
        let counter = match status {
            StatusCode::Ok => &self.status_200,
            StatusCode::BadRequest => &self.status_400,
            StatusCode::Forbidden => &self.status_403,
            StatusCode::NotFound => &self.status_404,
            StatusCode::InternalServerError => &self.status_500,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// La cola estaba llena y la tarea quedó diferida
    pub fn record_queue_full(&self) {
        self.queue_full.fetch_add(1, Ordering::Relaxed);
    }

    /// Un evento llegó para un slot que ya estaba en manos de un worker
    pub fn record_dispatch_violation(&self) {
        self.dispatch_violations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dispatch_violations(&self) -> u64 {
        self.dispatch_violations.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            uptime_secs: self.start_time.elapsed().as_secs(),
            accepted: self.accepted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            closed: self.closed.load(Ordering::Relaxed),
            requests: self.requests.load(Ordering::Relaxed),
            responses: ResponseCounts {
                ok: self.status_200.load(Ordering::Relaxed),
                bad_request: self.status_400.load(Ordering::Relaxed),
                forbidden: self.status_403.load(Ordering::Relaxed),
                not_found: self.status_404.load(Ordering::Relaxed),
                internal_error: self.status_500.load(Ordering::Relaxed),
            },
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            queue_full: self.queue_full.load(Ordering::Relaxed),
            dispatch_violations: self.dispatch_violations.load(Ordering::Relaxed),
        }
    }
}

impl Default for ServerStats {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsSnapshot {
    /// Serializa a JSON
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}
