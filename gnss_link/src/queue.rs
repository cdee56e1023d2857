//! Channels between the I/O loop and its consumers.
//!
//! The two read queues are bounded and a push into a full one is fatal: a
//! stalled consumer must not be hidden by silently dropping data. The write
//! queue is unbounded.

use crossbeam_channel::{bounded, unbounded, Receiver, Sender, TrySendError};

use crate::error::{LinkError, QueueKind};

/// Producer side of a bounded read queue
#[derive(Debug)]
pub struct ReadQueueSender<T> {
    tx: Sender<T>,
    kind: QueueKind,
    capacity: usize,
}

impl<T> ReadQueueSender<T> {
    /// Enqueue without blocking.
    ///
    /// Fails with [`LinkError::QueueOverflow`] when the queue is full and with
    /// [`LinkError::Disconnected`] when its consumer is gone.
    pub fn push(&self, item: T) -> Result<(), LinkError> {
        match self.tx.try_send(item) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(LinkError::QueueOverflow {
                queue: self.kind,
                capacity: self.capacity,
            }),
            Err(TrySendError::Disconnected(_)) => Err(LinkError::Disconnected),
        }
    }

    pub fn len(&self) -> usize {
        self.tx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn kind(&self) -> QueueKind {
        self.kind
    }
}

pub fn read_queue<T>(kind: QueueKind, capacity: usize) -> (ReadQueueSender<T>, Receiver<T>) {
    let (tx, rx) = bounded(capacity);
    (ReadQueueSender { tx, kind, capacity }, rx)
}

/// Outgoing byte chunks, written by the I/O loop in FIFO order
pub fn write_queue() -> (Sender<Vec<u8>>, Receiver<Vec<u8>>) {
    unbounded()
}
