//! Cross-thread action queue.
//!
//! Any thread can enqueue a closure through an [`ActionSender`]; the owning
//! thread runs them in FIFO order by calling [`ActionQueue::drain`] once per
//! frame. This keeps every mutation of the target on a single thread.

use kanal::{Receiver, Sender};

/// A deferred mutation of `T`.
pub type Action<T> = Box<dyn FnOnce(&mut T) + Send + 'static>;

/// Receiving side, owned by the update thread.
pub struct ActionQueue<T> {
    tx: Sender<Action<T>>,
    rx: Receiver<Action<T>>,
}

impl<T> Clone for ActionQueue<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            rx: self.rx.clone(),
        }
    }
}

impl<T> Default for ActionQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ActionQueue<T> {
    pub fn new() -> Self {
        let (tx, rx) = kanal::unbounded();
        Self { tx, rx }
    }

    pub fn sender(&self) -> ActionSender<T> {
        ActionSender {
            tx: self.tx.clone(),
        }
    }

    /// Number of pending actions.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Run the actions that were pending when the drain started.
    ///
    /// Actions enqueued while draining (including by the actions themselves)
    /// run on the next drain. Returns the number of actions executed.
    pub fn drain(&self, target: &mut T) -> usize {
        let pending = self.rx.len();
        let mut ran = 0;
        while ran < pending {
            match self.rx.try_recv() {
                Ok(Some(action)) => {
                    action(target);
                    ran += 1;
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!("action queue closed: {}", e);
                    break;
                }
            }
        }
        ran
    }
}

/// Sending side; cheap to clone and `Send`.
pub struct ActionSender<T> {
    tx: Sender<Action<T>>,
}

impl<T> Clone for ActionSender<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T> ActionSender<T> {
    /// Enqueue `action`. Returns false if the queue no longer exists.
    pub fn send(&self, action: impl FnOnce(&mut T) + Send + 'static) -> bool {
        self.tx.send(Box::new(action)).is_ok()
    }
}
