//! Connection-lifecycle correlation over callback-driven providers.
//!
//! A provider's `connect` call only says whether a request was accepted; the
//! real outcome arrives later as a completion message on a shared channel.
//! This crate pairs each connect request with its completion, exactly once,
//! and falls back to a timeout when no completion ever arrives.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** This crate has no transport
//! dependencies. It defines *what* a provider must offer ([`ports`]);
//! adapter crates define *how* to reach one.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype identifiers (`ProviderId`, `OwnerUri`, `ConnectionId`, `ContextId`) |
//! | [`types`] | Profiles, completion messages, query results, connection state |
//! | [`errors`] | Provider, connect-attempt and caller-facing error types |
//! | [`config`] | [`CorrelatorConfig`] |
//! | [`ports`] | [`ConnectionProvider`] and [`QueryProvider`] traits |
//! | [`registry`] | [`PendingRequestRegistry`] of outstanding connect attempts |
//! | [`dispatcher`] | [`CompletionSink`] and [`CompletionDispatcher`] |
//! | [`context`] | [`CorrelatorContext`]: shared state and correlator factory |
//! | [`correlator`] | [`ConnectionCorrelator`]: one connection's lifecycle |

pub mod config;
pub mod context;
pub mod correlator;
pub mod dispatcher;
pub mod errors;
pub mod identifiers;
pub mod ports;
pub mod registry;
pub mod types;

#[cfg(test)]
mod test_support;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use config::{CorrelatorConfig, DEFAULT_CONNECT_TIMEOUT_MS, DEFAULT_OWNER_URI_PREFIX};
pub use context::{CorrelatorContext, ProviderRegistrationSet};
pub use correlator::ConnectionCorrelator;
pub use dispatcher::{CompletionDispatcher, CompletionReceiver, CompletionSink};
pub use errors::{ConnectFailure, ConnectionError, ProviderError};
pub use identifiers::{ConnectionId, ContextId, OwnerUri, ProviderId};
pub use ports::{ConnectionProvider, QueryProvider};
pub use registry::{PendingRequestRegistry, PendingWaiter, WaiterReceiver};
pub use types::{
    AuthenticationType, CompletionOutcome, ConnectionCompleteSummary, ConnectionProfile,
    ConnectionState, DbCellValue, DbColumn, SimpleExecuteResult, Timestamp,
};
