//! The connection-lifecycle correlator.
//!
//! A [`ConnectionCorrelator`] owns one logical connection. `connect` registers
//! a waiter, asks the provider to connect, then races the waiter against the
//! configured timeout. The provider's answer arrives out of band through the
//! completion dispatcher attached by the owning [`CorrelatorContext`].
//!
//! ```text
//! Disconnected --connect ok--> Connected --dispose--> Disposed
//!      |                                                 ^
//!      +-------------------- dispose (no-op) ------------+
//! ```

use std::sync::Arc;

use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use crate::{
    CompletionOutcome, ConnectFailure, ConnectionError, ConnectionId, ConnectionProfile,
    ConnectionProvider, ConnectionState, CorrelatorContext, OwnerUri, PendingRequestRegistry,
    ProviderId, SimpleExecuteResult, Timestamp, WaiterReceiver,
};

/// Removes the waiter for one owner URI when dropped.
///
/// Keeps the registry clean on every exit path of `connect`, including the
/// caller dropping the future mid-await.
struct WaiterGuard<'a> {
    pending: &'a PendingRequestRegistry,
    owner_uri: &'a OwnerUri,
}

impl Drop for WaiterGuard<'_> {
    fn drop(&mut self) {
        if self.pending.remove(self.owner_uri) {
            debug!(owner_uri = %self.owner_uri, "Removed unsettled waiter");
        }
    }
}

/// Tracks the lifecycle of one logical connection.
///
/// Created by [`CorrelatorContext::correlator`]. Methods that drive the
/// lifecycle take `&mut self`, so one instance can never run two connect
/// attempts at once.
///
/// The first attempt uses the owner URI assigned at construction; every retry
/// draws a fresh one from the context, because the completion of an earlier
/// attempt may still arrive after that attempt timed out. The URI of the
/// attempt that succeeded becomes [`owner_uri`](Self::owner_uri) and is used
/// for queries and disconnect.
pub struct ConnectionCorrelator {
    context: Arc<CorrelatorContext>,
    provider: Arc<dyn ConnectionProvider>,
    owner_uri: OwnerUri,
    attempts: u64,
    state: ConnectionState,
    connection_id: Option<ConnectionId>,
    connected_at: Option<Timestamp>,
}

impl ConnectionCorrelator {
    pub(crate) fn new(
        context: Arc<CorrelatorContext>,
        provider: Arc<dyn ConnectionProvider>,
        owner_uri: OwnerUri,
    ) -> Self {
        Self {
            context,
            provider,
            owner_uri,
            attempts: 0,
            state: ConnectionState::Disconnected,
            connection_id: None,
            connected_at: None,
        }
    }

    /// URI of the live connection, or the construction-time URI if no
    /// attempt has succeeded yet.
    pub fn owner_uri(&self) -> &OwnerUri {
        &self.owner_uri
    }

    pub fn provider_id(&self) -> &ProviderId {
        self.provider.provider_id()
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// Connection id reported by the provider for the live connection.
    pub fn connection_id(&self) -> Option<&ConnectionId> {
        self.connection_id.as_ref()
    }

    /// When the connection completed.
    pub fn connected_at(&self) -> Option<Timestamp> {
        self.connected_at
    }

    /// Connects using `profile`, returning `true` once the provider confirms
    /// the connection.
    ///
    /// Every failure (refused request, provider error, remote failure,
    /// timeout) yields `false`. Use [`connect_detailed`](Self::connect_detailed)
    /// to learn why.
    pub async fn connect(&mut self, profile: &ConnectionProfile) -> bool {
        self.connect_detailed(profile).await.is_ok()
    }

    /// Connects using `profile` and reports the failure reason, if any.
    ///
    /// A failed attempt on an already connected correlator leaves it
    /// connected. A successful one replaces the previous connection, which is
    /// disconnected best-effort.
    pub async fn connect_detailed(
        &mut self,
        profile: &ConnectionProfile,
    ) -> Result<ConnectionId, ConnectFailure> {
        if self.state == ConnectionState::Disposed {
            return Err(ConnectFailure::Disposed);
        }

        let owner_uri = if self.attempts == 0 {
            self.owner_uri.clone()
        } else {
            self.context.next_owner_uri()
        };
        self.attempts += 1;

        let result = {
            let pending = self.context.pending();
            let receiver = pending.register(owner_uri.clone());
            let _guard = WaiterGuard {
                pending,
                owner_uri: &owner_uri,
            };
            self.await_completion(&owner_uri, receiver, profile).await
        };

        let connection_id = match result {
            Ok(connection_id) => connection_id,
            Err(failure) => {
                match &failure {
                    ConnectFailure::TimedOut { .. } => warn!(
                        owner_uri = %owner_uri,
                        provider_id = %self.provider_id(),
                        error = %failure,
                        "Connect attempt timed out"
                    ),
                    _ => info!(
                        owner_uri = %owner_uri,
                        provider_id = %self.provider_id(),
                        error = %failure,
                        "Connect attempt failed"
                    ),
                }
                return Err(failure);
            }
        };
        info!(
            owner_uri = %owner_uri,
            provider_id = %self.provider_id(),
            connection_id = %connection_id,
            "Connected"
        );

        let previous = std::mem::replace(&mut self.owner_uri, owner_uri);
        if self.is_connected() && previous != self.owner_uri {
            self.disconnect_best_effort(&previous).await;
        }
        self.state = ConnectionState::Connected;
        self.connection_id = Some(connection_id.clone());
        self.connected_at = Some(Timestamp::now());
        Ok(connection_id)
    }

    async fn await_completion(
        &self,
        owner_uri: &OwnerUri,
        receiver: WaiterReceiver,
        profile: &ConnectionProfile,
    ) -> Result<ConnectionId, ConnectFailure> {
        debug!(owner_uri = %owner_uri, server = %profile.server_name, "Issuing connect request");
        if !self.provider.connect(owner_uri, profile).await? {
            return Err(ConnectFailure::NotAccepted);
        }

        // The timeout only stops us waiting; the provider may still complete
        // later, and the dispatcher then finds no waiter for this URI.
        let timeout = self.context.config().connect_timeout();
        match tokio::time::timeout(timeout, receiver).await {
            Ok(Ok(CompletionOutcome::Connected(connection_id))) => Ok(connection_id),
            Ok(Ok(CompletionOutcome::Failed { message })) => {
                Err(ConnectFailure::Remote { message })
            }
            Ok(Err(_)) => Err(ConnectFailure::Abandoned),
            Err(_) => Err(ConnectFailure::TimedOut {
                timeout_ms: self.context.config().connect_timeout_ms,
            }),
        }
    }

    /// Runs `query` on the connection and returns its single result set
    /// unmodified.
    ///
    /// Fails with [`ConnectionError::NotConnected`] unless a prior `connect`
    /// succeeded.
    pub async fn run_query(&self, query: &str) -> Result<SimpleExecuteResult, ConnectionError> {
        if !self.is_connected() {
            return Err(ConnectionError::NotConnected);
        }
        let provider_id = self.provider_id();
        let query_provider = self.context.query_provider(provider_id).ok_or_else(|| {
            ConnectionError::QueryProviderNotFound {
                provider_id: provider_id.clone(),
            }
        })?;

        debug!(owner_uri = %self.owner_uri, "Running query");
        Ok(query_provider
            .run_query_and_return(&self.owner_uri, query)
            .await?)
    }

    /// Releases the connection.
    ///
    /// Disconnects only if connected; a disconnect failure is logged and
    /// swallowed. Calling it again is a no-op.
    pub async fn dispose(&mut self) {
        let was_connected = self.is_connected();
        self.state = ConnectionState::Disposed;
        if !was_connected {
            return;
        }

        self.disconnect_best_effort(&self.owner_uri).await;
    }

    async fn disconnect_best_effort(&self, owner_uri: &OwnerUri) {
        match self.provider.disconnect(owner_uri).await {
            Ok(true) => debug!(owner_uri = %owner_uri, "Disconnected"),
            Ok(false) => warn!(owner_uri = %owner_uri, "Provider declined disconnect"),
            Err(error) => warn!(owner_uri = %owner_uri, %error, "Disconnect failed"),
        }
    }
}

impl Drop for ConnectionCorrelator {
    fn drop(&mut self) {
        if !self.is_connected() {
            return;
        }
        let Ok(runtime) = Handle::try_current() else {
            warn!(
                owner_uri = %self.owner_uri,
                "Dropped while connected outside a runtime; connection left open"
            );
            return;
        };

        let provider = Arc::clone(&self.provider);
        let owner_uri = self.owner_uri.clone();
        runtime.spawn(async move {
            if let Err(error) = provider.disconnect(&owner_uri).await {
                warn!(owner_uri = %owner_uri, %error, "Disconnect on drop failed");
            }
        });
    }
}

impl std::fmt::Debug for ConnectionCorrelator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionCorrelator")
            .field("provider_id", self.provider_id())
            .field("owner_uri", &self.owner_uri)
            .field("state", &self.state)
            .field("connection_id", &self.connection_id)
            .finish()
    }
}
