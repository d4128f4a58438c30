//! Command-line arguments and configuration loading.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use correlator::CorrelatorConfig;
use loopback::{CompletionBehavior, LoopbackBehavior};

/// Runs one connect → query → dispose cycle against the in-process provider.
#[derive(Debug, Parser)]
#[command(name = "correlator-check", version)]
pub struct Args {
    /// JSON file with correlator settings (`connect_timeout_ms`, `owner_uri_prefix`).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Overrides `connect_timeout_ms` from the config file.
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Provider id to register the loopback provider under.
    #[arg(long, default_value = "MSSQL")]
    pub provider: String,

    /// Server name placed in the connection profile.
    #[arg(long, default_value = "localhost")]
    pub server: String,

    /// How the provider answers the connect request.
    #[arg(long, value_enum, default_value_t = Outcome::Succeed)]
    pub outcome: Outcome,

    /// Error message reported when `--outcome fail`.
    #[arg(long, default_value = "Login failed")]
    pub error_message: String,

    /// Delay before the provider emits its completion.
    #[arg(long, default_value_t = 200)]
    pub latency_ms: u64,

    /// Query to run once connected.
    #[arg(long, default_value = "SELECT @@VERSION")]
    pub query: String,

    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Outcome {
    Succeed,
    Fail,
    Silent,
    Refuse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

impl Args {
    /// Loads the config file (if any) and applies command-line overrides.
    pub fn correlator_config(&self) -> anyhow::Result<CorrelatorConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("reading config file {}", path.display()))?;
                serde_json::from_str(&raw)
                    .with_context(|| format!("parsing config file {}", path.display()))?
            }
            None => CorrelatorConfig::default(),
        };
        if let Some(timeout_ms) = self.timeout_ms {
            config.connect_timeout_ms = timeout_ms;
        }
        Ok(config)
    }

    pub fn loopback_behavior(&self) -> LoopbackBehavior {
        let completion = match self.outcome {
            Outcome::Fail => CompletionBehavior::Fail {
                message: self.error_message.clone(),
            },
            Outcome::Silent => CompletionBehavior::Silent,
            Outcome::Succeed | Outcome::Refuse => CompletionBehavior::Succeed,
        };
        LoopbackBehavior {
            accept: self.outcome != Outcome::Refuse,
            completion,
            latency: Duration::from_millis(self.latency_ms),
            ..LoopbackBehavior::default()
        }
    }
}
