//! In-process provider adapter.
//!
//! Implements [`correlator::ConnectionProvider`] and
//! [`correlator::QueryProvider`] without any transport: connect requests are
//! answered by a spawned task that emits a completion message after a scripted
//! latency, and queries are answered from a table of canned results.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** Used by the `correlator-check` binary as its provider
//! and by the end-to-end scenario tests in `tests/`. Every call the
//! correlator makes is recorded so callers can assert on exactly what was
//! sent to the provider.

mod behavior;
mod provider;

pub use behavior::{CompletionBehavior, LoopbackBehavior};
pub use provider::{LoopbackProvider, ProviderCall};
