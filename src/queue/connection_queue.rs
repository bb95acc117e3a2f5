//! # Cola Acotada de Conexiones
//! src/queue/connection_queue.rs
//!
//! Cola FIFO thread-safe de capacidad fija. El acceptor encola conexiones
//! aceptadas y los workers las desencolan.
//!
//! ## Sincronización
//!
//! Un único `Mutex` protege los elementos y el flag de shutdown. Hay dos
//! `Condvar`:
//! - `not_full`: la despiertan `dequeue` (una vez) y `shutdown` (a todos)
//! - `not_empty`: la despiertan `enqueue` (una vez) y `shutdown` (a todos)
//!
//! Un `Mutex` envenenado (un thread hizo panic con el lock tomado) se trata
//! como falla de sincronización irrecuperable y se reporta al llamador.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use thiserror::Error;

/// Error al encolar. El elemento siempre se devuelve al llamador para que
/// decida qué hacer con él (normalmente cerrarlo).
#[derive(Debug, Error)]
pub enum EnqueueError<T> {
    /// La cola fue cerrada: no se admite nada nuevo
    #[error("connection queue is shut down")]
    ShutDown(T),

    /// El lock interno quedó envenenado
    #[error("connection queue lock poisoned")]
    Poisoned(T),
}

impl<T> EnqueueError<T> {
    /// Recupera el elemento rechazado
    pub fn into_inner(self) -> T {
        match self {
            EnqueueError::ShutDown(item) | EnqueueError::Poisoned(item) => item,
        }
    }

    pub fn is_shut_down(&self) -> bool {
        matches!(self, EnqueueError::ShutDown(_))
    }
}

/// Error al desencolar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DequeueError {
    /// La cola está cerrada y ya no quedan elementos
    #[error("connection queue is shut down and drained")]
    Closed,

    /// El lock interno quedó envenenado
    #[error("connection queue lock poisoned")]
    Poisoned,
}

/// Falla de sincronización al cerrar la cola
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("connection queue lock poisoned")]
pub struct QueuePoisoned;

/// Estado protegido por el lock
struct QueueState<T> {
    items: VecDeque<T>,
    shutdown: bool,
}

/// Cola FIFO acotada con encolado/desencolado bloqueantes
pub struct ConnectionQueue<T> {
    state: Mutex<QueueState<T>>,
    not_full: Condvar,
    not_empty: Condvar,
    capacity: usize,
}

impl<T> ConnectionQueue<T> {
    /// Crea una cola vacía, abierta, con capacidad `capacity`.
    ///
    /// Una capacidad de 0 se eleva a 1: una cola que nunca admite nada
    /// bloquearía al acceptor para siempre.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::with_capacity(capacity),
                shutdown: false,
            }),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
            capacity,
        }
    }

    /// Encola un elemento al final.
    ///
    /// Bloquea mientras la cola está llena. Si la cola se cierra antes de
    /// poder insertar, retorna `EnqueueError::ShutDown` con el elemento y sin
    /// insertarlo; una vez cerrada nunca bloquea.
    pub fn enqueue(&self, item: T) -> Result<(), EnqueueError<T>> {
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(_) => return Err(EnqueueError::Poisoned(item)),
        };

        loop {
            if state.shutdown {
                return Err(EnqueueError::ShutDown(item));
            }
            if state.items.len() < self.capacity {
                break;
            }
            state = match self.not_full.wait(state) {
                Ok(state) => state,
                Err(_) => return Err(EnqueueError::Poisoned(item)),
            };
        }

        state.items.push_back(item);
        drop(state);

        // Despertar a un worker esperando
        self.not_empty.notify_one();

        Ok(())
    }

    /// Desencola el elemento más antiguo.
    ///
    /// Bloquea mientras la cola está vacía y abierta. Después del shutdown
    /// sigue entregando lo que quedó encolado, en orden; cuando ya no queda
    /// nada retorna `DequeueError::Closed` sin bloquear.
    pub fn dequeue(&self) -> Result<T, DequeueError> {
        let mut state = self.state.lock().map_err(|_| DequeueError::Poisoned)?;

        loop {
            if let Some(item) = state.items.pop_front() {
                drop(state);
                // Hay espacio: despertar a un productor
                self.not_full.notify_one();
                return Ok(item);
            }

            if state.shutdown {
                return Err(DequeueError::Closed);
            }

            state = self
                .not_empty
                .wait(state)
                .map_err(|_| DequeueError::Poisoned)?;
        }
    }

    /// Cierra la cola y despierta a TODOS los threads bloqueados en
    /// `enqueue` y `dequeue` para que vuelvan a evaluar su condición.
    ///
    /// Es idempotente. Con el lock envenenado igual marca el cierre y
    /// despierta a todos (así nadie queda esperando), pero reporta la falla.
    pub fn shutdown(&self) -> Result<(), QueuePoisoned> {
        let (mut state, poisoned) = match self.state.lock() {
            Ok(state) => (state, false),
            Err(poisoned) => (poisoned.into_inner(), true),
        };
        state.shutdown = true;
        drop(state);

        self.not_full.notify_all();
        self.not_empty.notify_all();

        if poisoned {
            return Err(QueuePoisoned);
        }
        Ok(())
    }

    /// Libera la cola. Consumir `self` garantiza que ningún otro thread la
    /// referencia. Retorna los elementos que no se llegaron a desencolar.
    pub fn release(self) -> Vec<T> {
        let state = self
            .state
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        state.items.into_iter().collect()
    }

    /// Número de elementos encolados actualmente
    pub fn len(&self) -> usize {
        self.observe().items.len()
    }

    /// Verifica si la cola está vacía
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Retorna la capacidad máxima
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Verifica si ya se llamó a `shutdown`
    pub fn is_shut_down(&self) -> bool {
        self.observe().shutdown
    }

    /// Envenena el lock desde otro thread (solo para tests)
    #[cfg(test)]
    pub(crate) fn poison(&self)
    where
        T: Send,
    {
        std::thread::scope(|scope| {
            let result = scope
                .spawn(|| {
                    let _guard = self.state.lock();
                    panic!("poisoning connection queue");
                })
                .join();
            assert!(result.is_err());
        });
    }

    // Los observadores son de solo lectura: toleran un lock envenenado
    fn observe(&self) -> MutexGuard<'_, QueueState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
