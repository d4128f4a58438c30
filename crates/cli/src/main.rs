//! correlator-check entry point.
//!
//! This binary is the composition root for the workspace. Responsibilities:
//!
//! 1. **Parse configuration** — read the optional JSON config file and apply
//!    command-line overrides.
//! 2. **Wire observability** — install `tracing-subscriber` with an `EnvFilter`
//!    (`RUST_LOG`, default `info`) and a text or JSON formatter. All `tracing`
//!    events emitted by the library crates flow through this layer.
//! 3. **Construct infrastructure** — create a [`loopback::LoopbackProvider`]
//!    scripted from the command line and register it as both the connection
//!    and the query provider of a fresh [`correlator::CorrelatorContext`].
//! 4. **Run the check** — connect, query when connected, dispose, and print a
//!    JSON report on stdout. The exit code is non-zero when the connect fails.

mod args;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use correlator::{
    ConnectionCorrelator, ConnectionError, ConnectionProfile, CorrelatorContext, DbCellValue,
    DbColumn, ProviderId, SimpleExecuteResult,
};
use loopback::LoopbackProvider;
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::args::{Args, LogFormat};

/// What one run observed.
#[derive(Debug, Serialize)]
struct RunReport {
    provider_id: String,
    owner_uri: String,
    connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    connection_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    failure: Option<String>,
    elapsed_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<SimpleExecuteResult>,
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

fn canned_result(query: &str) -> SimpleExecuteResult {
    SimpleExecuteResult {
        row_count: 1,
        column_info: vec![DbColumn {
            column_name: "result".to_string(),
            data_type_name: "nvarchar".to_string(),
            allow_db_null: false,
        }],
        rows: vec![vec![DbCellValue::new(format!("loopback answer to: {query}"))]],
    }
}

/// Runs `query` when connected, then disposes the correlator whatever the
/// query returned.
async fn query_then_dispose(
    correlator: &mut ConnectionCorrelator,
    query: &str,
) -> Result<Option<SimpleExecuteResult>, ConnectionError> {
    let result = if correlator.is_connected() {
        Some(correlator.run_query(query).await)
    } else {
        None
    };
    correlator.dispose().await;
    result.transpose()
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();
    init_tracing(args.log_format);

    let config = args.correlator_config()?;
    let context = CorrelatorContext::new(config).context("invalid correlator configuration")?;

    let provider_id = ProviderId::new(args.provider.clone())
        .context("--provider must not be empty")?;
    let provider = Arc::new(LoopbackProvider::with_behavior(
        provider_id.clone(),
        args.loopback_behavior(),
    ));
    provider.respond_to(args.query.clone(), canned_result(&args.query));
    context.register_query_provider(provider_id.clone(), provider.clone());

    let mut correlator = context.correlator(provider)?;
    info!(
        context_id = %context.id(),
        owner_uri = %correlator.owner_uri(),
        outcome = ?args.outcome,
        "Starting run"
    );

    let started = tokio::time::Instant::now();
    let attempt = correlator
        .connect_detailed(&ConnectionProfile::new(args.server.clone()))
        .await;
    let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

    let result = query_then_dispose(&mut correlator, &args.query).await?;

    let report = RunReport {
        provider_id: provider_id.to_string(),
        owner_uri: correlator.owner_uri().to_string(),
        connected: attempt.is_ok(),
        connection_id: attempt.as_ref().ok().map(ToString::to_string),
        failure: attempt.as_ref().err().map(ToString::to_string),
        elapsed_ms,
        result,
    };

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(if report.connected {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
