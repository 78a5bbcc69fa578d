//! # Cola de Tareas Acotada
//! src/pool/queue.rs
//!
//! Cola FIFO thread-safe con capacidad máxima fija. Push y pop se
//! linealizan con un único lock.

use crate::sync::{Cond, Locker};
use std::collections::VecDeque;

/// Estado protegido por el lock
#[derive(Debug)]
struct QueueState<T> {
    tasks: VecDeque<T>,
    shutdown: bool,
}

/// Cola de tareas acotada (productor/consumidor)
#[derive(Debug)]
pub struct TaskQueue<T> {
    state: Locker<QueueState<T>>,

    /// Notifica a los workers cuando hay trabajo o cuando se apaga la cola
    not_empty: Cond,

    /// Capacidad máxima de la cola
    capacity: usize,
}

impl<T> TaskQueue<T> {
    /// Crea una cola con capacidad máxima `capacity`
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Locker::new(QueueState {
                tasks: VecDeque::with_capacity(capacity.min(4096)),
                shutdown: false,
            }),
            not_empty: Cond::new(),
            capacity,
        }
    }

    /// Encola una tarea
    ///
    /// Retorna `false` si la cola está llena o apagada; en ese caso la cola
    /// no cambia y la tarea sigue siendo responsabilidad del llamador.
    ///
    /// # Ejemplo
    /// ```
    /// use reactor_httpd::pool::TaskQueue;
    ///
    /// let queue = TaskQueue::new(1);
    /// assert!(queue.submit(7));
    /// assert!(!queue.submit(8)); // llena
    /// ```
    pub fn submit(&self, task: T) -> bool {
        let mut state = self.state.lock();

        if state.shutdown || state.tasks.len() >= self.capacity {
            return false;
        }

        state.tasks.push_back(task);
        self.not_empty.notify_one();
        true
    }

    /// Desencola la tarea más antigua
    ///
    /// Bloquea hasta que haya una tarea. Retorna `None` solo cuando la cola
    /// fue apagada y ya no quedan tareas pendientes.
    pub fn pop(&self) -> Option<T> {
        let mut state = self
            .not_empty
            .wait_while(self.state.lock(), |s| s.tasks.is_empty() && !s.shutdown);
        state.tasks.pop_front()
    }

    /// Intenta desencolar sin bloquear
    pub fn try_pop(&self) -> Option<T> {
        self.state.lock().tasks.pop_front()
    }

    /// Apaga la cola y despierta a todos los workers
    ///
    /// Las tareas ya encoladas se siguen entregando hasta vaciar la cola.
    pub fn shutdown(&self) {
        let mut state = self.state.lock();
        state.shutdown = true;
        self.not_empty.notify_all();
    }

    /// Retorna el tamaño actual de la cola
    pub fn len(&self) -> usize {
        self.state.lock().tasks.len()
    }

    /// Verifica si la cola está vacía
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Verifica si la cola está llena
    pub fn is_full(&self) -> bool {
        self.len() >= self.capacity
    }

    /// Obtiene estadísticas de la cola
    pub fn stats(&self) -> QueueStats {
        let state = self.state.lock();
        QueueStats {
            pending: state.tasks.len(),
            capacity: self.capacity,
            shutdown: state.shutdown,
        }
    }
}

/// Estadísticas de la cola
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueStats {
    pub pending: usize,
    pub capacity: usize,
    pub shutdown: bool,
}
