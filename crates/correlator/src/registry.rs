//! Registry of outstanding connect attempts.
//!
//! Maps each in-flight [`OwnerUri`] to the one-shot slot its
//! [`crate::ConnectionCorrelator`] is waiting on. Shared by every correlator
//! of a [`crate::CorrelatorContext`] and by the completion dispatchers.
//!
//! ## Invariants
//!
//! - At most one live waiter per owner URI.
//! - An entry never outlives the attempt that created it: the dispatcher
//!   removes it when settling, and the correlator removes it on every exit
//!   path of `connect`. A stale entry would let a late completion message
//!   settle an attempt that has already concluded.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;
use tracing::{debug, trace};

use crate::{CompletionOutcome, OwnerUri};

/// Receiving half of a waiter, awaited by the correlator.
pub type WaiterReceiver = oneshot::Receiver<CompletionOutcome>;

/// An outstanding connect attempt.
///
/// Settling consumes the waiter, so it can be resolved or rejected at most
/// once.
#[derive(Debug)]
pub struct PendingWaiter {
    settle: oneshot::Sender<CompletionOutcome>,
}

impl PendingWaiter {
    fn settle(self, outcome: CompletionOutcome) -> bool {
        self.settle.send(outcome).is_ok()
    }
}

/// Map of owner URI to outstanding waiter.
#[derive(Debug, Default)]
pub struct PendingRequestRegistry {
    waiters: Mutex<HashMap<OwnerUri, PendingWaiter>>,
}

impl PendingRequestRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a waiter for `owner_uri` and returns the slot to await.
    ///
    /// A waiter already registered under the same URI is replaced; its
    /// receiver observes a closed channel.
    pub fn register(&self, owner_uri: OwnerUri) -> WaiterReceiver {
        let (settle, receiver) = oneshot::channel();
        let replaced = self
            .lock()
            .insert(owner_uri.clone(), PendingWaiter { settle })
            .is_some();
        if replaced {
            debug!(owner_uri = %owner_uri, "Replaced live waiter for owner URI");
        } else {
            trace!(owner_uri = %owner_uri, "Registered waiter");
        }
        receiver
    }

    /// Settles and removes the waiter for `owner_uri`.
    ///
    /// Returns `false` if no waiter was registered, which is the normal case
    /// for duplicate or late completion messages.
    pub fn settle_and_remove(&self, owner_uri: &OwnerUri, outcome: CompletionOutcome) -> bool {
        // Release the lock before sending so the waiting task never contends
        // with us on wake-up.
        let waiter = self.lock().remove(owner_uri);
        match waiter {
            Some(waiter) => {
                if !waiter.settle(outcome) {
                    trace!(owner_uri = %owner_uri, "Waiter was already abandoned");
                }
                true
            }
            None => false,
        }
    }

    /// Removes the waiter for `owner_uri` without settling it.
    ///
    /// Returns `true` if an entry was removed.
    pub fn remove(&self, owner_uri: &OwnerUri) -> bool {
        self.lock().remove(owner_uri).is_some()
    }

    /// Returns `true` if a waiter is registered for `owner_uri`.
    pub fn contains(&self, owner_uri: &OwnerUri) -> bool {
        self.lock().contains_key(owner_uri)
    }

    /// Number of outstanding waiters.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // The map is always left consistent between statements, so a panic in
    // another holder cannot corrupt it.
    fn lock(&self) -> MutexGuard<'_, HashMap<OwnerUri, PendingWaiter>> {
        self.waiters.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
