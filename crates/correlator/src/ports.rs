//! Port traits implemented by external providers.
//!
//! The correlator reaches the outside world only through these traits.
//! Adapters (see the `loopback` crate) supply the transport; this crate
//! never sees it.

use async_trait::async_trait;

use crate::{
    CompletionSink, ConnectionProfile, OwnerUri, ProviderError, ProviderId, SimpleExecuteResult,
};

/// An external system that opens connections asynchronously.
///
/// `connect` only reports whether the request was *accepted*. The outcome of
/// the connection arrives later as a [`crate::ConnectionCompleteSummary`]
/// pushed into the [`CompletionSink`] handed to
/// [`register_on_connection_complete`](Self::register_on_connection_complete).
#[async_trait]
pub trait ConnectionProvider: Send + Sync {
    /// The identifier this provider is registered under.
    fn provider_id(&self) -> &ProviderId;

    /// Issues a connect request for `owner_uri`.
    ///
    /// Returns `Ok(false)` when the provider refuses the request up front; no
    /// completion message will follow in that case.
    async fn connect(
        &self,
        owner_uri: &OwnerUri,
        profile: &ConnectionProfile,
    ) -> Result<bool, ProviderError>;

    /// Closes the connection opened for `owner_uri`.
    async fn disconnect(&self, owner_uri: &OwnerUri) -> Result<bool, ProviderError>;

    /// Attaches the sink that receives every completion message this provider
    /// emits. Called at most once per provider id per context. The sink
    /// closes when that context is dropped; providers shared across contexts
    /// should discard closed sinks (see [`CompletionSink::is_closed`]).
    fn register_on_connection_complete(&self, sink: CompletionSink);
}

/// Query capability of a provider, looked up dynamically by provider id.
#[async_trait]
pub trait QueryProvider: Send + Sync {
    /// Runs `query` on the connection owned by `owner_uri` and returns its
    /// single result set.
    async fn run_query_and_return(
        &self,
        owner_uri: &OwnerUri,
        query: &str,
    ) -> Result<SimpleExecuteResult, ProviderError>;
}
