//! End-to-end connect/query/dispose scenarios against the loopback provider.

use std::sync::Arc;
use std::time::Duration;

use correlator::{
    ConnectFailure, ConnectionCompleteSummary, ConnectionError, ConnectionProfile,
    ConnectionState, CorrelatorContext, DbCellValue, DbColumn, ProviderId, SimpleExecuteResult,
};
use loopback::{LoopbackBehavior, LoopbackProvider, ProviderCall};
use tokio::time::Instant;

// ============================================================================
// TEST FIXTURES
// ============================================================================

fn provider(behavior: LoopbackBehavior) -> Arc<LoopbackProvider> {
    Arc::new(LoopbackProvider::with_behavior(ProviderId::new("MSSQL").unwrap(), behavior))
}

fn profile() -> ConnectionProfile {
    ConnectionProfile::new("localhost")
}

fn version_result() -> SimpleExecuteResult {
    SimpleExecuteResult {
        row_count: 1,
        column_info: vec![DbColumn {
            column_name: "version".into(),
            data_type_name: "nvarchar".into(),
            allow_db_null: false,
        }],
        rows: vec![vec![DbCellValue::new("16.0.1000.6")]],
    }
}

// ============================================================================
// CONNECT OUTCOMES
// ============================================================================

#[tokio::test(start_paused = true)]
async fn completion_with_connection_id_connects() {
    let context = CorrelatorContext::with_defaults();
    let provider = provider(LoopbackBehavior::succeed_after(Duration::from_millis(500)));
    let mut correlator = context.correlator(provider.clone()).unwrap();

    let started = Instant::now();
    assert!(correlator.connect(&profile()).await);

    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(correlator.state(), ConnectionState::Connected);
    assert!(provider.is_live(correlator.owner_uri()));
    assert!(!context.pending().contains(correlator.owner_uri()));
}

#[tokio::test(start_paused = true)]
async fn completion_with_error_message_fails() {
    let context = CorrelatorContext::with_defaults();
    let provider = provider(LoopbackBehavior::fail_with("auth failed"));
    let mut correlator = context.correlator(provider).unwrap();

    let result = correlator.connect_detailed(&profile()).await;

    assert_eq!(
        result,
        Err(ConnectFailure::Remote {
            message: Some("auth failed".into())
        })
    );
    assert_eq!(correlator.state(), ConnectionState::Disconnected);
    assert!(context.pending().is_empty());
}

#[tokio::test(start_paused = true)]
async fn silent_provider_times_out_after_fifteen_seconds() {
    let context = CorrelatorContext::with_defaults();
    let provider = provider(LoopbackBehavior::silent());
    let mut correlator = context.correlator(provider).unwrap();

    let started = Instant::now();
    assert!(!correlator.connect(&profile()).await);

    assert!(started.elapsed() >= Duration::from_millis(15_000));
    assert!(!context.pending().contains(correlator.owner_uri()));
}

#[tokio::test]
async fn refused_request_fails_immediately() {
    let context = CorrelatorContext::with_defaults();
    let provider = provider(LoopbackBehavior::refuse());
    let mut correlator = context.correlator(provider.clone()).unwrap();

    let started = std::time::Instant::now();
    assert_eq!(
        correlator.connect_detailed(&profile()).await,
        Err(ConnectFailure::NotAccepted)
    );

    assert!(started.elapsed() < Duration::from_secs(1));
    assert!(context.pending().is_empty());
    assert_eq!(provider.connect_count(), 1);
}

// ============================================================================
// SETTLEMENT AND REGISTRY HYGIENE
// ============================================================================

#[tokio::test(start_paused = true)]
async fn duplicate_completion_is_ignored() {
    let context = CorrelatorContext::with_defaults();
    let provider = provider(LoopbackBehavior {
        duplicate_completions: true,
        ..LoopbackBehavior::default()
    });
    let mut correlator = context.correlator(provider).unwrap();

    assert!(correlator.connect(&profile()).await);
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(correlator.is_connected());
    assert!(context.pending().is_empty());
}

#[tokio::test(start_paused = true)]
async fn late_completion_after_timeout_has_no_effect() {
    let context = CorrelatorContext::with_defaults();
    let provider = provider(LoopbackBehavior::silent());
    let mut correlator = context.correlator(provider.clone()).unwrap();
    assert!(!correlator.connect(&profile()).await);

    let late = ConnectionCompleteSummary::succeeded(correlator.owner_uri().clone(), "late-id");
    assert_eq!(provider.emit(late), 1);
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(correlator.state(), ConnectionState::Disconnected);
    assert!(context.pending().is_empty());

    // The retry runs under a fresh owner URI and is settled by its own
    // completion only.
    provider.set_behavior(LoopbackBehavior::fail_with("still down"));
    assert!(!correlator.connect(&profile()).await);
    assert!(context.pending().is_empty());
}

#[tokio::test(start_paused = true)]
async fn completion_for_timed_out_attempt_does_not_settle_retry() {
    let context = CorrelatorContext::with_defaults();
    let provider = provider(LoopbackBehavior::silent());
    let mut correlator = context.correlator(provider.clone()).unwrap();
    let profile = profile();
    assert!(!correlator.connect(&profile).await);
    let timed_out_uri = correlator.owner_uri().clone();

    let stale = async {
        tokio::time::sleep(Duration::from_secs(1)).await;
        provider.emit(ConnectionCompleteSummary::succeeded(timed_out_uri.clone(), "stale"))
    };
    let (retry, delivered) = tokio::join!(correlator.connect_detailed(&profile), stale);

    assert_eq!(delivered, 1);
    assert_eq!(retry, Err(ConnectFailure::TimedOut { timeout_ms: 15_000 }));
    assert_eq!(correlator.state(), ConnectionState::Disconnected);
    assert_eq!(correlator.owner_uri(), &timed_out_uri);
    assert!(context.pending().is_empty());
}

#[tokio::test(start_paused = true)]
async fn successful_retry_adopts_its_own_owner_uri() {
    let context = CorrelatorContext::with_defaults();
    let provider = provider(LoopbackBehavior::silent());
    let mut correlator = context.correlator(provider.clone()).unwrap();
    assert!(!correlator.connect(&profile()).await);
    let timed_out_uri = correlator.owner_uri().clone();

    provider.set_behavior(LoopbackBehavior::default());
    assert!(correlator.connect(&profile()).await);

    assert_ne!(correlator.owner_uri(), &timed_out_uri);
    assert!(provider.is_live(correlator.owner_uri()));
    assert!(!provider.is_live(&timed_out_uri));
}

#[tokio::test(start_paused = true)]
async fn concurrent_correlators_receive_their_own_outcome() {
    let context = CorrelatorContext::with_defaults();
    let ok = provider(LoopbackBehavior::succeed_after(Duration::from_millis(300)));
    let mut first = context.correlator(ok.clone()).unwrap();
    let mut second = context.correlator(ok.clone()).unwrap();

    let profile = profile();
    let (a, b) = tokio::join!(first.connect(&profile), second.connect(&profile));

    assert!(a && b);
    assert_ne!(first.owner_uri(), second.owner_uri());
    assert!(context.pending().is_empty());
    assert_eq!(ok.registration_count(), 1);
}

#[tokio::test]
async fn one_dispatcher_per_provider_id() {
    let context = CorrelatorContext::with_defaults();
    let provider = provider(LoopbackBehavior::default());

    let _first = context.correlator(provider.clone()).unwrap();
    let _second = context.correlator(provider.clone()).unwrap();

    assert_eq!(provider.registration_count(), 1);
    assert_eq!(provider.calls(), vec![ProviderCall::RegisterOnComplete]);
}

#[tokio::test]
async fn shared_provider_drops_sinks_of_finished_contexts() {
    let provider = provider(LoopbackBehavior::default());
    let first = CorrelatorContext::with_defaults();
    drop(first.correlator(provider.clone()).unwrap());
    drop(first);
    tokio::time::sleep(Duration::from_millis(10)).await;

    let second = CorrelatorContext::with_defaults();
    let mut correlator = second.correlator(provider.clone()).unwrap();

    assert_eq!(provider.registration_count(), 2);
    assert_eq!(provider.sink_count(), 1);
    assert!(correlator.connect(&profile()).await);
}

// ============================================================================
// QUERIES
// ============================================================================

#[tokio::test]
async fn query_before_connect_is_rejected_regardless_of_provider() {
    let context = CorrelatorContext::with_defaults();
    let provider = provider(LoopbackBehavior::fail_with("auth failed"));
    provider.respond_to("SELECT @@VERSION", version_result());
    context.register_query_provider(ProviderId::new("MSSQL").unwrap(), provider.clone());

    let mut correlator = context.correlator(provider.clone()).unwrap();
    assert!(matches!(
        correlator.run_query("SELECT @@VERSION").await,
        Err(ConnectionError::NotConnected)
    ));

    assert!(!correlator.connect(&profile()).await);
    assert!(matches!(
        correlator.run_query("SELECT @@VERSION").await,
        Err(ConnectionError::NotConnected)
    ));
    assert!(!provider
        .calls()
        .iter()
        .any(|call| matches!(call, ProviderCall::Query { .. })));
}

#[tokio::test]
async fn query_result_is_returned_unmodified() {
    let context = CorrelatorContext::with_defaults();
    let provider = provider(LoopbackBehavior::default());
    provider.respond_to("SELECT @@VERSION", version_result());
    context.register_query_provider(ProviderId::new("MSSQL").unwrap(), provider.clone());

    let mut correlator = context.correlator(provider).unwrap();
    assert!(correlator.connect(&profile()).await);

    let result = correlator.run_query("SELECT @@VERSION").await.unwrap();
    assert_eq!(result, version_result());
}

#[tokio::test]
async fn query_provider_errors_propagate() {
    let context = CorrelatorContext::with_defaults();
    let provider = provider(LoopbackBehavior::default());
    context.register_query_provider(ProviderId::new("MSSQL").unwrap(), provider.clone());

    let mut correlator = context.correlator(provider).unwrap();
    assert!(correlator.connect(&profile()).await);

    assert!(matches!(
        correlator.run_query("DROP DATABASE nope").await,
        Err(ConnectionError::Query(_))
    ));
}

// ============================================================================
// DISPOSAL
// ============================================================================

#[tokio::test]
async fn dispose_without_connection_sends_nothing() {
    let context = CorrelatorContext::with_defaults();
    let provider = provider(LoopbackBehavior::refuse());
    let mut correlator = context.correlator(provider.clone()).unwrap();
    assert!(!correlator.connect(&profile()).await);

    correlator.dispose().await;

    assert_eq!(provider.disconnect_count(), 0);
}

#[tokio::test]
async fn dispose_disconnects_exactly_once_even_when_it_fails() {
    let context = CorrelatorContext::with_defaults();
    let provider = provider(LoopbackBehavior {
        fail_disconnect: true,
        ..LoopbackBehavior::default()
    });
    let mut correlator = context.correlator(provider.clone()).unwrap();
    assert!(correlator.connect(&profile()).await);

    correlator.dispose().await;
    correlator.dispose().await;
    drop(correlator);
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(provider.disconnect_count(), 1);
}

#[tokio::test]
async fn dispose_releases_the_live_connection() {
    let context = CorrelatorContext::with_defaults();
    let provider = provider(LoopbackBehavior::default());
    let mut correlator = context.correlator(provider.clone()).unwrap();
    assert!(correlator.connect(&profile()).await);
    let owner_uri = correlator.owner_uri().clone();

    correlator.dispose().await;

    assert!(!provider.is_live(&owner_uri));
    assert_eq!(correlator.state(), ConnectionState::Disposed);
}
