//! # Thread Pool
//! src/pool/thread_pool.rs
//!
//! N workers fijos drenando una [`TaskQueue`] compartida. Como máximo N
//! tareas se procesan concurrentemente; el handler corre fuera del lock.

use super::TaskQueue;
use crate::error::PoolError;
use crate::sync::Semaphore;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info};

/// Pool de workers con cola acotada
pub struct ThreadPool<T: Send + 'static> {
    queue: Arc<TaskQueue<T>>,
    workers: Vec<JoinHandle<()>>,
    size: usize,
}

impl<T: Send + 'static> ThreadPool<T> {
    /// Crea el pool e inicia `size` workers
    ///
    /// Retorna cuando todos los workers están corriendo. `handler` se invoca
    /// una vez por tarea desencolada.
    ///
    /// # Ejemplo
    /// ```
    /// use reactor_httpd::pool::ThreadPool;
    /// use std::sync::atomic::{AtomicUsize, Ordering};
    /// use std::sync::Arc;
    ///
    /// let done = Arc::new(AtomicUsize::new(0));
    /// let counter = Arc::clone(&done);
    /// let mut pool = ThreadPool::new(2, 16, move |n: usize| {
    ///     counter.fetch_add(n, Ordering::SeqCst);
    /// }).unwrap();
    ///
    /// assert!(pool.submit(3));
    /// pool.shutdown();
    /// assert_eq!(done.load(Ordering::SeqCst), 3);
    /// ```
    pub fn new<F>(size: usize, capacity: usize, handler: F) -> Result<Self, PoolError>
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        if size == 0 {
            return Err(PoolError::NoWorkers);
        }
        if capacity == 0 {
            return Err(PoolError::ZeroCapacity);
        }

        let queue = Arc::new(TaskQueue::new(capacity));
        let handler = Arc::new(handler);
        let ready = Arc::new(Semaphore::new(0));
        let mut workers = Vec::with_capacity(size);

        for id in 0..size {
            let queue_worker = Arc::clone(&queue);
            let handler = Arc::clone(&handler);
            let ready = Arc::clone(&ready);

            let spawned = thread::Builder::new()
                .name(format!("worker-{}", id))
                .spawn(move || {
                    ready.post();
                    Self::worker_loop(id, &queue_worker, handler.as_ref());
                });

            match spawned {
                Ok(handle) => workers.push(handle),
                Err(e) => {
                    // Desarmar lo que ya arrancó antes de reportar el error
                    queue.shutdown();
                    for handle in workers {
                        let _ = handle.join();
                    }
                    return Err(PoolError::Spawn(e));
                }
            }
        }

        for _ in 0..size {
            ready.wait();
        }

        info!(workers = size, queue_capacity = capacity, "🔧 Pool de workers listo");

        Ok(Self {
            queue,
            workers,
            size,
        })
    }

    /// Loop principal del worker
    fn worker_loop<F>(id: usize, queue: &TaskQueue<T>, handler: &F)
    where
        F: Fn(T),
    {
        debug!(worker = id, "worker started");

        while let Some(task) = queue.pop() {
            // Un panic en el handler no debe matar al worker
            if panic::catch_unwind(AssertUnwindSafe(|| handler(task))).is_err() {
                error!(worker = id, "❌ Handler hizo panic; el worker continúa");
            }
        }

        debug!(worker = id, "worker exiting");
    }

    /// Encola una tarea sin bloquear. `false` si la cola está llena.
    pub fn submit(&self, task: T) -> bool {
        self.queue.submit(task)
    }

    /// Cola compartida del pool
    pub fn queue(&self) -> &TaskQueue<T> {
        &self.queue
    }

    /// Número de workers
    pub fn size(&self) -> usize {
        self.size
    }

    /// Apaga la cola, deja que los workers la drenen y espera a que terminen
    pub fn shutdown(&mut self) {
        if self.workers.is_empty() {
            return;
        }

        self.queue.shutdown();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                error!("❌ Un worker terminó con panic");
            }
        }

        info!("Pool de workers detenido");
    }
}

impl<T: Send + 'static> Drop for ThreadPool<T> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
