//! Newtype identifiers.
//!
//! Every identity that crosses the provider boundary is a distinct newtype so a
//! [`ProviderId`] can never be passed where an [`OwnerUri`] is expected, even
//! though both are strings on the wire.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Macro for String-wrapped newtypes.
// Generates: struct, new() returning Option<Self>, as_str(), Display.
// ---------------------------------------------------------------------------
macro_rules! string_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier, returning `None` if the value is empty.
            pub fn new(value: impl Into<String>) -> Option<Self> {
                let v = value.into();
                if v.is_empty() { None } else { Some(Self(v)) }
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Identifiers — String-backed (assigned by providers or by the correlator)
// ---------------------------------------------------------------------------

string_id! {
    /// Identifies an external connection provider (e.g. `"MSSQL"`).
    ///
    /// A completion dispatcher is attached at most once per provider id, and
    /// query providers are looked up under the same id.
    ProviderId
}

string_id! {
    /// The request identifier that correlates one connect attempt with the
    /// completion message the provider emits for it.
    OwnerUri
}

string_id! {
    /// Connection identifier assigned by the provider once a connection is live.
    ConnectionId
}

impl OwnerUri {
    /// Builds the URI for the `sequence`-th correlator of a context.
    pub(crate) fn sequenced(prefix: &str, sequence: u64) -> Self {
        Self(format!("{prefix}{sequence}"))
    }
}

// ---------------------------------------------------------------------------
// Identifiers — UUID-backed (internally generated)
// ---------------------------------------------------------------------------

/// Identifies one [`crate::CorrelatorContext`].
///
/// Attached to log events so activity from independent contexts living in the
/// same process can be told apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContextId(Uuid);

impl ContextId {
    /// Generates a new random context identifier.
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying [`Uuid`].
    pub fn as_uuid(self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for ContextId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
