//! Bounded hand-off of discovered download targets.
//!
//! The search workload offers identifiers it finds, the download workload
//! takes them. Both sides are non-blocking: an offer into a full ring is
//! dropped and a take from an empty or contended ring returns `None`.
//! Items may be duplicated or reordered.

use std::sync::{Mutex, TryLockError};

use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};

/// Default number of identifiers the ring holds.
pub const DEFAULT_CAPACITY: usize = 1000;

pub struct DiscoveryRing {
    tx: mpsc::Sender<String>,
    // Only ever try-locked for a single `try_recv`, never across an await.
    rx: Mutex<mpsc::Receiver<String>>,
}

impl DiscoveryRing {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self {
            tx,
            rx: Mutex::new(rx),
        }
    }

    /// Insert an identifier. Returns `false` if the ring was full and the
    /// identifier was dropped.
    pub fn offer(&self, id: String) -> bool {
        match self.tx.try_send(id) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) | Err(TrySendError::Closed(_)) => false,
        }
    }

    /// Remove one identifier, if any is available. Returns `None` without
    /// waiting when another reader holds the receiver.
    pub fn take(&self) -> Option<String> {
        let mut rx = match self.rx.try_lock() {
            Ok(rx) => rx,
            Err(TryLockError::WouldBlock) => return None,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
        };
        match rx.try_recv() {
            Ok(id) => Some(id),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Current occupancy.
    pub fn len(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }
}

impl Default for DiscoveryRing {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
