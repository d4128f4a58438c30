//! Scripted provider used by unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::{
    CompletionSink, ConnectionCompleteSummary, ConnectionProfile, ConnectionProvider,
    DbCellValue, OwnerUri, ProviderError, ProviderId, QueryProvider, SimpleExecuteResult,
};

/// What the provider emits after accepting a connect request.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Reply {
    Succeed(&'static str),
    Fail(&'static str),
    Silent,
}

#[derive(Debug)]
struct Script {
    accept: bool,
    reply: Reply,
    connect_error: Option<ProviderError>,
    disconnect_error: Option<ProviderError>,
}

/// Completes connect requests synchronously, before `connect` returns.
pub(crate) struct ScriptedProvider {
    id: ProviderId,
    script: Mutex<Script>,
    sinks: Mutex<Vec<CompletionSink>>,
    connects: AtomicUsize,
    disconnected: Mutex<Vec<OwnerUri>>,
    queries: AtomicUsize,
}

impl ScriptedProvider {
    pub(crate) fn arc(id: &str) -> Arc<Self> {
        Arc::new(Self {
            id: ProviderId::new(id).unwrap(),
            script: Mutex::new(Script {
                accept: true,
                reply: Reply::Succeed("abc"),
                connect_error: None,
                disconnect_error: None,
            }),
            sinks: Mutex::new(Vec::new()),
            connects: AtomicUsize::new(0),
            disconnected: Mutex::new(Vec::new()),
            queries: AtomicUsize::new(0),
        })
    }

    pub(crate) fn set_accept(&self, accept: bool) {
        self.script.lock().unwrap().accept = accept;
    }

    pub(crate) fn set_reply(&self, reply: Reply) {
        self.script.lock().unwrap().reply = reply;
    }

    pub(crate) fn set_connect_error(&self, error: ProviderError) {
        self.script.lock().unwrap().connect_error = Some(error);
    }

    pub(crate) fn set_disconnect_error(&self, error: ProviderError) {
        self.script.lock().unwrap().disconnect_error = Some(error);
    }

    pub(crate) fn registrations(&self) -> usize {
        self.sinks.lock().unwrap().len()
    }

    pub(crate) fn open_sinks(&self) -> usize {
        self.sinks
            .lock()
            .unwrap()
            .iter()
            .filter(|sink| !sink.is_closed())
            .count()
    }

    pub(crate) fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub(crate) fn disconnects(&self) -> usize {
        self.disconnected.lock().unwrap().len()
    }

    pub(crate) fn disconnected_uris(&self) -> Vec<OwnerUri> {
        self.disconnected.lock().unwrap().clone()
    }

    /// Pushes a completion to every registered sink.
    pub(crate) fn emit(&self, summary: ConnectionCompleteSummary) {
        for sink in self.sinks.lock().unwrap().iter() {
            sink.complete(summary.clone());
        }
    }

    pub(crate) fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConnectionProvider for ScriptedProvider {
    fn provider_id(&self) -> &ProviderId {
        &self.id
    }

    async fn connect(
        &self,
        owner_uri: &OwnerUri,
        _profile: &ConnectionProfile,
    ) -> Result<bool, ProviderError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let (accept, reply, error) = {
            let script = self.script.lock().unwrap();
            (script.accept, script.reply, script.connect_error.clone())
        };
        if let Some(error) = error {
            return Err(error);
        }
        if !accept {
            return Ok(false);
        }

        let summary = match reply {
            Reply::Succeed(id) => ConnectionCompleteSummary::succeeded(owner_uri.clone(), id),
            Reply::Fail(message) => ConnectionCompleteSummary::failed(owner_uri.clone(), message),
            Reply::Silent => return Ok(true),
        };
        self.emit(summary);
        Ok(true)
    }

    async fn disconnect(&self, owner_uri: &OwnerUri) -> Result<bool, ProviderError> {
        self.disconnected.lock().unwrap().push(owner_uri.clone());
        match self.script.lock().unwrap().disconnect_error.clone() {
            Some(error) => Err(error),
            None => Ok(true),
        }
    }

    fn register_on_connection_complete(&self, sink: CompletionSink) {
        self.sinks.lock().unwrap().push(sink);
    }
}

#[async_trait]
impl QueryProvider for ScriptedProvider {
    async fn run_query_and_return(
        &self,
        _owner_uri: &OwnerUri,
        query: &str,
    ) -> Result<SimpleExecuteResult, ProviderError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        Ok(SimpleExecuteResult {
            row_count: 1,
            column_info: Vec::new(),
            rows: vec![vec![DbCellValue::new(query)]],
        })
    }
}
