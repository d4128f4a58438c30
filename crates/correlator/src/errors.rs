//! Error types for the correlator.
//!
//! Failures on the connect path are deliberately *not* caller-facing errors:
//! [`crate::ConnectionCorrelator::connect`] collapses every [`ConnectFailure`]
//! to `false`. Only contract violations and query failures surface as
//! [`ConnectionError`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ProviderId;

// ---------------------------------------------------------------------------
// Provider errors
// ---------------------------------------------------------------------------

/// An error reported by an external connection or query provider.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ProviderError {
    /// The provider cannot be reached or has shut down.
    #[error("Provider unavailable: {message}")]
    Unavailable {
        /// Human-readable description of the outage.
        message: String,
    },

    /// The provider received the request but failed to carry it out.
    #[error("Provider request failed: {message}")]
    Request {
        /// Error text returned by the provider.
        message: String,
    },
}

// ---------------------------------------------------------------------------
// Connect-attempt failures
// ---------------------------------------------------------------------------

/// Why a single connect attempt did not produce a connection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectFailure {
    /// The provider refused the connect request up front.
    #[error("Connect request was not accepted by the provider")]
    NotAccepted,

    /// The provider's connect call itself failed.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// The provider reported that the connection failed.
    #[error("Connection failed: {}", .message.as_deref().unwrap_or("no error message"))]
    Remote {
        /// The provider's error payload, if any.
        message: Option<String>,
    },

    /// No completion message arrived within the configured timeout.
    #[error("No connection completion within {timeout_ms} ms")]
    TimedOut {
        /// The timeout that elapsed.
        timeout_ms: u64,
    },

    /// The waiter was discarded without being settled (replaced by another
    /// attempt for the same owner URI, or its context was torn down).
    #[error("Connection attempt was abandoned before completion")]
    Abandoned,

    /// The correlator was disposed; it cannot connect again.
    #[error("Correlator has been disposed")]
    Disposed,
}

// ---------------------------------------------------------------------------
// Caller-facing errors
// ---------------------------------------------------------------------------

/// Hard errors surfaced to the owner of a correlator.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// A query was attempted before a successful connect.
    ///
    /// This is a caller programming error, not a transient condition.
    #[error("Connection must be created before running queries")]
    NotConnected,

    /// No query provider is registered under the correlator's provider id.
    #[error("No query provider registered for provider '{provider_id}'")]
    QueryProviderNotFound {
        /// The provider id that was looked up.
        provider_id: ProviderId,
    },

    /// The query provider failed to execute the query.
    #[error("Query failed: {0}")]
    Query(#[from] ProviderError),

    /// A completion dispatcher had to be started outside a Tokio runtime.
    #[error("A Tokio runtime is required to attach the completion dispatcher")]
    RuntimeUnavailable,

    /// The correlator configuration is invalid.
    ///
    /// Produced at context creation; a context never starts with an invalid
    /// config.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration problem.
        message: String,
    },
}
