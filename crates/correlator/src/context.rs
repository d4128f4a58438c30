//! Shared state for a family of correlators.
//!
//! A [`CorrelatorContext`] owns everything correlators must share: the
//! pending-request registry, the set of providers that already have a
//! completion dispatcher, the query-provider catalog and the counter that
//! makes owner URIs unique. Independent contexts share nothing, so tests and
//! embedders can run several side by side.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::{
    CompletionDispatcher, CompletionSink, ConnectionCorrelator, ConnectionError,
    ConnectionProvider, ContextId, CorrelatorConfig, OwnerUri, PendingRequestRegistry,
    ProviderId, QueryProvider,
};

/// Provider ids that already have a completion dispatcher attached.
pub type ProviderRegistrationSet = HashSet<ProviderId>;

/// Factory and shared state for [`ConnectionCorrelator`]s.
pub struct CorrelatorContext {
    id: ContextId,
    config: CorrelatorConfig,
    sequence: AtomicU64,
    pending: Arc<PendingRequestRegistry>,
    attached: Mutex<ProviderRegistrationSet>,
    query_providers: RwLock<HashMap<ProviderId, Arc<dyn QueryProvider>>>,
    // Dropped with the context; every dispatcher it spawned then exits and
    // closes its sink.
    shutdown: watch::Sender<()>,
}

impl CorrelatorContext {
    /// Creates a context after validating `config`.
    pub fn new(config: CorrelatorConfig) -> Result<Arc<Self>, ConnectionError> {
        config.validate()?;
        Ok(Arc::new(Self::build(config)))
    }

    /// Creates a context with [`CorrelatorConfig::default`].
    pub fn with_defaults() -> Arc<Self> {
        Arc::new(Self::build(CorrelatorConfig::default()))
    }

    fn build(config: CorrelatorConfig) -> Self {
        let id = ContextId::new_random();
        debug!(
            context_id = %id,
            timeout_ms = config.connect_timeout_ms,
            "Created correlator context"
        );
        Self {
            id,
            config,
            sequence: AtomicU64::new(0),
            pending: Arc::new(PendingRequestRegistry::new()),
            attached: Mutex::new(ProviderRegistrationSet::new()),
            query_providers: RwLock::new(HashMap::new()),
            shutdown: watch::channel(()).0,
        }
    }

    pub fn id(&self) -> ContextId {
        self.id
    }

    pub fn config(&self) -> &CorrelatorConfig {
        &self.config
    }

    /// The registry of outstanding connect attempts.
    pub fn pending(&self) -> &PendingRequestRegistry {
        &self.pending
    }

    /// Creates a correlator bound to `provider`.
    ///
    /// The first correlator created for a provider id attaches a completion
    /// dispatcher to that provider, which requires a Tokio runtime to spawn
    /// onto. Later correlators for the same id reuse it. The dispatcher stops
    /// when the context is dropped, closing the sink the provider holds.
    pub fn correlator(
        self: &Arc<Self>,
        provider: Arc<dyn ConnectionProvider>,
    ) -> Result<ConnectionCorrelator, ConnectionError> {
        self.attach_dispatcher(provider.as_ref())?;
        let owner_uri = self.next_owner_uri();
        Ok(ConnectionCorrelator::new(Arc::clone(self), provider, owner_uri))
    }

    /// Returns `true` if a completion dispatcher is attached for `provider_id`.
    pub fn is_attached(&self, provider_id: &ProviderId) -> bool {
        self.attached
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(provider_id)
    }

    /// Registers the query capability for `provider_id`, returning the
    /// provider it replaces, if any.
    pub fn register_query_provider(
        &self,
        provider_id: ProviderId,
        provider: Arc<dyn QueryProvider>,
    ) -> Option<Arc<dyn QueryProvider>> {
        self.query_providers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(provider_id, provider)
    }

    /// Looks up the query capability registered for `provider_id`.
    pub fn query_provider(&self, provider_id: &ProviderId) -> Option<Arc<dyn QueryProvider>> {
        self.query_providers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(provider_id)
            .cloned()
    }

    /// Draws the next owner URI from the context counter.
    pub(crate) fn next_owner_uri(&self) -> OwnerUri {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        OwnerUri::sequenced(&self.config.owner_uri_prefix, sequence)
    }

    fn attach_dispatcher(&self, provider: &dyn ConnectionProvider) -> Result<(), ConnectionError> {
        let provider_id = provider.provider_id();
        // Held across registration so two racing constructors cannot both
        // attach.
        let mut attached = self.attached.lock().unwrap_or_else(PoisonError::into_inner);
        if attached.contains(provider_id) {
            return Ok(());
        }

        let runtime = Handle::try_current().map_err(|_| ConnectionError::RuntimeUnavailable)?;
        let (sink, completions) = CompletionSink::channel();
        let dispatcher = CompletionDispatcher::new(provider_id.clone(), Arc::clone(&self.pending));
        runtime.spawn(dispatcher.run(completions, self.shutdown.subscribe()));
        provider.register_on_connection_complete(sink);
        attached.insert(provider_id.clone());

        info!(
            context_id = %self.id,
            provider_id = %provider_id,
            "Attached completion dispatcher"
        );
        Ok(())
    }
}

impl std::fmt::Debug for CorrelatorContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CorrelatorContext")
            .field("id", &self.id)
            .field("config", &self.config)
            .field("sequence", &self.sequence.load(Ordering::Relaxed))
            .field("pending", &self.pending.len())
            .finish_non_exhaustive()
    }
}
