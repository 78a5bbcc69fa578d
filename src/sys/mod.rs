//! # Capa de Sistema
//! src/sys/mod.rs
//!
//! Envoltorios mínimos sobre las llamadas de Linux que usa el reactor:
//!
//! - `epoll`: multiplexor de readiness con registro one-shot
//! - `socket`: socket de escucha con `SO_REUSEADDR` y backlog fijo
//! - `waker`: `eventfd` para despertar al reactor desde otros threads
//! - `signal`: política de `SIGPIPE`

pub mod epoll;
pub mod signal;
pub mod socket;
pub mod waker;

pub use epoll::{Event, Events, Interest, Poller, Readiness};
pub use waker::Waker;
pub use signal::ignore_sigpipe;
pub use socket::bind_listener;
