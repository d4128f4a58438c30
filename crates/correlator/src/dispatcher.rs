//! Completion dispatch.
//!
//! A provider pushes every [`ConnectionCompleteSummary`] it emits into a
//! [`CompletionSink`]. One [`CompletionDispatcher`] task per provider id drains
//! the other end of that channel and settles the matching waiter in the
//! [`PendingRequestRegistry`].

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{debug, trace};

use crate::{CompletionOutcome, ConnectionCompleteSummary, PendingRequestRegistry, ProviderId};

/// Receiving half of a completion channel.
pub type CompletionReceiver = mpsc::UnboundedReceiver<ConnectionCompleteSummary>;

/// Sending half of a completion channel, handed to a provider.
///
/// Cloning is cheap; all clones feed the same dispatcher.
#[derive(Debug, Clone)]
pub struct CompletionSink {
    sender: mpsc::UnboundedSender<ConnectionCompleteSummary>,
}

impl CompletionSink {
    /// Creates a connected sink/receiver pair.
    pub fn channel() -> (Self, CompletionReceiver) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    /// Delivers a completion message.
    ///
    /// Never blocks. Returns `false` once the dispatcher has stopped.
    pub fn complete(&self, summary: ConnectionCompleteSummary) -> bool {
        self.sender.send(summary).is_ok()
    }

    /// Returns `true` once the dispatcher has stopped. Providers may discard
    /// closed sinks.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

/// Settles waiters from completion messages of one provider.
#[derive(Debug, Clone)]
pub struct CompletionDispatcher {
    provider_id: ProviderId,
    pending: Arc<PendingRequestRegistry>,
}

impl CompletionDispatcher {
    pub fn new(provider_id: ProviderId, pending: Arc<PendingRequestRegistry>) -> Self {
        Self {
            provider_id,
            pending,
        }
    }

    /// Handles one completion message.
    ///
    /// Messages for unknown owner URIs (already settled, timed out, or never
    /// registered) are dropped. Returns `true` if a waiter was settled.
    pub fn handle(&self, summary: ConnectionCompleteSummary) -> bool {
        let outcome = summary.outcome();
        let succeeded = matches!(outcome, CompletionOutcome::Connected(_));
        let settled = self.pending.settle_and_remove(&summary.owner_uri, outcome);
        if settled {
            debug!(
                provider_id = %self.provider_id,
                owner_uri = %summary.owner_uri,
                succeeded,
                "Settled connect attempt"
            );
        } else {
            trace!(
                provider_id = %self.provider_id,
                owner_uri = %summary.owner_uri,
                "Dropped completion with no waiter"
            );
        }
        settled
    }

    /// Drains `receiver` until every [`CompletionSink`] feeding it is dropped
    /// or the `shutdown` sender goes away, whichever comes first.
    pub async fn run(self, mut receiver: CompletionReceiver, mut shutdown: watch::Receiver<()>) {
        loop {
            tokio::select! {
                summary = receiver.recv() => match summary {
                    Some(summary) => {
                        self.handle(summary);
                    }
                    None => {
                        debug!(provider_id = %self.provider_id, "Completion channel closed");
                        break;
                    }
                },
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        debug!(provider_id = %self.provider_id, "Dispatcher shut down");
                        break;
                    }
                }
            }
        }
    }
}
