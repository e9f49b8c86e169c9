use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::time::Duration;

/// Creates an unbounded multi-producer multi-consumer FIFO.
///
/// Every item is delivered to exactly one consumer. Once all producers are
/// dropped, consumers drain what is left and then observe the queue as closed.
pub fn unbounded<T>() -> (QueueProducer<T>, QueueConsumer<T>) {
    let (tx, rx) = crossbeam_channel::unbounded();
    (QueueProducer { tx }, QueueConsumer { rx })
}

/// Outcome of a timed pop
#[derive(Debug, PartialEq, Eq)]
pub enum PopTimeout<T> {
    Item(T),
    /// Nothing arrived in time, producers are still alive
    Idle,
    /// All producers are gone and the queue is empty
    Closed,
}

pub struct QueueProducer<T> {
    tx: Sender<T>,
}

impl<T> QueueProducer<T> {
    /// Enqueues an item. Returns the item back if every consumer is gone.
    pub fn push(&self, item: T) -> Result<(), T> {
        self.tx.send(item).map_err(|e| e.into_inner())
    }

    /// Advisory length, may be stale by the time it is read
    pub fn size(&self) -> usize {
        self.tx.len()
    }

    /// Drops this producer, closing the queue once no clones remain
    pub fn close(self) {}
}

impl<T> Clone for QueueProducer<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

pub struct QueueConsumer<T> {
    rx: Receiver<T>,
}

impl<T> QueueConsumer<T> {
    /// Blocks until an item is available. Returns `None` once the queue is
    /// closed and fully drained.
    pub fn pop(&self) -> Option<T> {
        self.rx.recv().ok()
    }

    /// Non-blocking pop
    pub fn try_pop(&self) -> Option<T> {
        match self.rx.try_recv() {
            Ok(item) => Some(item),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    pub fn pop_timeout(&self, timeout: Duration) -> PopTimeout<T> {
        match self.rx.recv_timeout(timeout) {
            Ok(item) => PopTimeout::Item(item),
            Err(RecvTimeoutError::Timeout) => PopTimeout::Idle,
            Err(RecvTimeoutError::Disconnected) => PopTimeout::Closed,
        }
    }

    /// Advisory length, may be stale by the time it is read
    pub fn size(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

impl<T> Clone for QueueConsumer<T> {
    fn clone(&self) -> Self {
        Self {
            rx: self.rx.clone(),
        }
    }
}
