//! The loopback provider.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use correlator::{
    CompletionSink, ConnectionCompleteSummary, ConnectionProfile, ConnectionProvider, OwnerUri,
    ProviderError, ProviderId, QueryProvider, SimpleExecuteResult,
};
use tracing::{debug, trace};

use crate::{CompletionBehavior, LoopbackBehavior};

/// A call received by a [`LoopbackProvider`], in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderCall {
    RegisterOnComplete,
    Connect { owner_uri: OwnerUri, server_name: String },
    Disconnect { owner_uri: OwnerUri },
    Query { owner_uri: OwnerUri, query: String },
}

#[derive(Default)]
struct State {
    behavior: LoopbackBehavior,
    sinks: Vec<CompletionSink>,
    calls: Vec<ProviderCall>,
    live: HashSet<OwnerUri>,
    responses: HashMap<String, SimpleExecuteResult>,
}

/// Connection and query provider that lives entirely in-process.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct LoopbackProvider {
    id: ProviderId,
    state: Arc<Mutex<State>>,
    next_connection: Arc<AtomicU64>,
}

impl LoopbackProvider {
    /// Creates a provider with [`LoopbackBehavior::default`].
    pub fn new(id: ProviderId) -> Self {
        Self::with_behavior(id, LoopbackBehavior::default())
    }

    pub fn with_behavior(id: ProviderId, behavior: LoopbackBehavior) -> Self {
        Self {
            id,
            state: Arc::new(Mutex::new(State {
                behavior,
                ..State::default()
            })),
            next_connection: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Replaces the behaviour used for subsequent calls.
    pub fn set_behavior(&self, behavior: LoopbackBehavior) {
        self.lock().behavior = behavior;
    }

    /// Scripts the result returned for `query`.
    pub fn respond_to(&self, query: impl Into<String>, result: SimpleExecuteResult) {
        self.lock().responses.insert(query.into(), result);
    }

    /// Pushes `summary` to every registered sink, as the real provider would.
    ///
    /// Returns the number of sinks that accepted it.
    pub fn emit(&self, summary: ConnectionCompleteSummary) -> usize {
        let sinks = self.lock().sinks.clone();
        sinks
            .iter()
            .filter(|sink| sink.complete(summary.clone()))
            .count()
    }

    /// Number of sinks currently held. Sinks whose dispatcher has stopped are
    /// discarded on the next registration.
    pub fn sink_count(&self) -> usize {
        self.lock().sinks.len()
    }

    /// Every call received so far.
    pub fn calls(&self) -> Vec<ProviderCall> {
        self.lock().calls.clone()
    }

    pub fn registration_count(&self) -> usize {
        self.count(|call| matches!(call, ProviderCall::RegisterOnComplete))
    }

    pub fn connect_count(&self) -> usize {
        self.count(|call| matches!(call, ProviderCall::Connect { .. }))
    }

    pub fn disconnect_count(&self) -> usize {
        self.count(|call| matches!(call, ProviderCall::Disconnect { .. }))
    }

    /// Returns `true` if a successful completion was emitted for `owner_uri`
    /// and it has not been disconnected since.
    pub fn is_live(&self, owner_uri: &OwnerUri) -> bool {
        self.lock().live.contains(owner_uri)
    }

    fn count(&self, predicate: impl Fn(&ProviderCall) -> bool) -> usize {
        self.lock().calls.iter().filter(|call| predicate(call)).count()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn completion_for(
        &self,
        owner_uri: &OwnerUri,
        behavior: &CompletionBehavior,
    ) -> Option<ConnectionCompleteSummary> {
        match behavior {
            CompletionBehavior::Succeed => {
                let n = self.next_connection.fetch_add(1, Ordering::Relaxed);
                Some(ConnectionCompleteSummary::succeeded(
                    owner_uri.clone(),
                    format!("loopback-{n}"),
                ))
            }
            CompletionBehavior::Fail { message } => Some(ConnectionCompleteSummary::failed(
                owner_uri.clone(),
                message.clone(),
            )),
            CompletionBehavior::Silent => None,
        }
    }
}

impl std::fmt::Debug for LoopbackProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopbackProvider")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ConnectionProvider for LoopbackProvider {
    fn provider_id(&self) -> &ProviderId {
        &self.id
    }

    async fn connect(
        &self,
        owner_uri: &OwnerUri,
        profile: &ConnectionProfile,
    ) -> Result<bool, ProviderError> {
        let behavior = {
            let mut state = self.lock();
            state.calls.push(ProviderCall::Connect {
                owner_uri: owner_uri.clone(),
                server_name: profile.server_name.clone(),
            });
            state.behavior.clone()
        };
        if !behavior.accept {
            debug!(owner_uri = %owner_uri, "Refusing connect request");
            return Ok(false);
        }

        let Some(summary) = self.completion_for(owner_uri, &behavior.completion) else {
            trace!(owner_uri = %owner_uri, "Accepted connect request; no completion will follow");
            return Ok(true);
        };

        let provider = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(behavior.latency).await;
            if summary.connection_id.is_some() {
                provider.lock().live.insert(summary.owner_uri.clone());
            }
            let repeats = if behavior.duplicate_completions { 2 } else { 1 };
            for _ in 0..repeats {
                provider.emit(summary.clone());
            }
        });
        Ok(true)
    }

    async fn disconnect(&self, owner_uri: &OwnerUri) -> Result<bool, ProviderError> {
        let mut state = self.lock();
        state.calls.push(ProviderCall::Disconnect {
            owner_uri: owner_uri.clone(),
        });
        if state.behavior.fail_disconnect {
            return Err(ProviderError::Request {
                message: format!("cannot disconnect {owner_uri}"),
            });
        }
        Ok(state.live.remove(owner_uri))
    }

    fn register_on_connection_complete(&self, sink: CompletionSink) {
        let mut state = self.lock();
        state.calls.push(ProviderCall::RegisterOnComplete);
        state.sinks.retain(|held| !held.is_closed());
        state.sinks.push(sink);
    }
}

#[async_trait]
impl QueryProvider for LoopbackProvider {
    async fn run_query_and_return(
        &self,
        owner_uri: &OwnerUri,
        query: &str,
    ) -> Result<SimpleExecuteResult, ProviderError> {
        let mut state = self.lock();
        state.calls.push(ProviderCall::Query {
            owner_uri: owner_uri.clone(),
            query: query.to_string(),
        });
        if !state.live.contains(owner_uri) {
            return Err(ProviderError::Request {
                message: format!("{owner_uri} is not connected"),
            });
        }
        state
            .responses
            .get(query)
            .cloned()
            .ok_or_else(|| ProviderError::Request {
                message: format!("no scripted response for query: {query}"),
            })
    }
}
