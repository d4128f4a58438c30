//! Shared value types exchanged with connection and query providers.
//!
//! Wire-facing types serialise in camelCase so they match the provider
//! protocol field names (`ownerUri`, `connectionId`, `rowCount`, ...).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ConnectionId, OwnerUri};

// ---------------------------------------------------------------------------
// Connection profile
// ---------------------------------------------------------------------------

/// How the provider should authenticate a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AuthenticationType {
    /// User name and password carried in the profile.
    #[default]
    SqlLogin,
    /// Operating-system integrated authentication.
    Integrated,
    /// Interactive Azure Active Directory authentication.
    AzureMfa,
}

/// Everything the provider needs to open a connection.
///
/// The correlator never inspects the profile; it is forwarded to
/// [`crate::ConnectionProvider::connect`] unchanged.
#[derive(Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionProfile {
    /// Host name or address of the server.
    pub server_name: String,

    /// Initial database. `None` lets the server pick its default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    #[serde(default)]
    pub authentication_type: AuthenticationType,

    /// Provider-specific options passed through untouched.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub options: BTreeMap<String, serde_json::Value>,
}

impl ConnectionProfile {
    /// Creates a profile for `server_name` with every other field defaulted.
    pub fn new(server_name: impl Into<String>) -> Self {
        Self {
            server_name: server_name.into(),
            ..Self::default()
        }
    }
}

impl std::fmt::Debug for ConnectionProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionProfile")
            .field("server_name", &self.server_name)
            .field("database_name", &self.database_name)
            .field("user_name", &self.user_name)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("authentication_type", &self.authentication_type)
            .field("options", &self.options)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Completion messages
// ---------------------------------------------------------------------------

/// Completion message emitted by a provider once a connect request finishes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionCompleteSummary {
    /// The owner URI passed to the originating connect call.
    pub owner_uri: OwnerUri,

    /// Present (and non-empty) only when the connection succeeded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_number: Option<i64>,

    /// Additional server messages, if the provider reports any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messages: Option<String>,
}

impl ConnectionCompleteSummary {
    /// Builds a summary reporting a successful connection.
    pub fn succeeded(owner_uri: OwnerUri, connection_id: impl Into<String>) -> Self {
        Self {
            owner_uri,
            connection_id: Some(connection_id.into()),
            error_message: None,
            error_number: None,
            messages: None,
        }
    }

    /// Builds a summary reporting a failed connection.
    pub fn failed(owner_uri: OwnerUri, error_message: impl Into<String>) -> Self {
        Self {
            owner_uri,
            connection_id: None,
            error_message: Some(error_message.into()),
            error_number: None,
            messages: None,
        }
    }

    /// Interprets the summary.
    ///
    /// The provider protocol has no status field: a connection id is the only
    /// success signal, and an empty id counts as absent.
    pub fn outcome(&self) -> CompletionOutcome {
        match self.connection_id.as_deref().and_then(ConnectionId::new) {
            Some(id) => CompletionOutcome::Connected(id),
            None => CompletionOutcome::Failed {
                message: self.error_message.clone(),
            },
        }
    }
}

/// Result carried by a settled waiter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionOutcome {
    Connected(ConnectionId),
    Failed {
        /// The provider's error payload, if it sent one.
        message: Option<String>,
    },
}

// ---------------------------------------------------------------------------
// Query results
// ---------------------------------------------------------------------------

/// Column metadata of a [`SimpleExecuteResult`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbColumn {
    pub column_name: String,
    pub data_type_name: String,
    #[serde(default)]
    pub allow_db_null: bool,
}

/// A single cell of a [`SimpleExecuteResult`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbCellValue {
    pub display_value: String,
    pub is_null: bool,
}

impl DbCellValue {
    /// Creates a non-null cell.
    pub fn new(display_value: impl Into<String>) -> Self {
        Self {
            display_value: display_value.into(),
            is_null: false,
        }
    }

    /// Creates a null cell.
    pub fn null() -> Self {
        Self {
            display_value: String::new(),
            is_null: true,
        }
    }
}

/// A single-resultset query response, returned to the caller unmodified.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimpleExecuteResult {
    pub row_count: u64,
    pub column_info: Vec<DbColumn>,
    pub rows: Vec<Vec<DbCellValue>>,
}

// ---------------------------------------------------------------------------
// Connection state
// ---------------------------------------------------------------------------

/// Lifecycle state of one [`crate::ConnectionCorrelator`].
///
/// Transitions only move forward: `Disconnected -> Connected -> Disposed` or
/// `Disconnected -> Disposed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connected,
    Disposed,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Disconnected => "disconnected",
            Self::Connected => "connected",
            Self::Disposed => "disposed",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// A UTC wall-clock timestamp.
///
/// Wraps [`chrono::DateTime<Utc>`] so callers never depend on `chrono` types
/// directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Returns the current UTC time as a [`Timestamp`].
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Returns the underlying [`DateTime<Utc>`].
    pub fn as_datetime(self) -> DateTime<Utc> {
        self.0
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}
