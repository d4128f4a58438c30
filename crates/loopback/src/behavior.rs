//! Scripted behaviour of a [`crate::LoopbackProvider`].

use std::time::Duration;

/// What the provider reports after accepting a connect request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CompletionBehavior {
    /// Emit a completion carrying a fresh connection id.
    #[default]
    Succeed,
    /// Emit a completion with no connection id and this error message.
    Fail {
        message: String,
    },
    /// Never emit a completion.
    Silent,
}

/// Knobs controlling how a [`crate::LoopbackProvider`] answers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopbackBehavior {
    /// Whether `connect` accepts requests. A refused request emits nothing.
    pub accept: bool,

    pub completion: CompletionBehavior,

    /// Delay between accepting a request and emitting its completion.
    pub latency: Duration,

    /// Emit every completion twice, as a misbehaving provider might.
    pub duplicate_completions: bool,

    /// Make `disconnect` fail.
    pub fail_disconnect: bool,
}

impl Default for LoopbackBehavior {
    fn default() -> Self {
        Self {
            accept: true,
            completion: CompletionBehavior::Succeed,
            latency: Duration::from_millis(5),
            duplicate_completions: false,
            fail_disconnect: false,
        }
    }
}

impl LoopbackBehavior {
    /// Accepts requests and succeeds after `latency`.
    pub fn succeed_after(latency: Duration) -> Self {
        Self {
            latency,
            ..Self::default()
        }
    }

    /// Accepts requests and fails with `message` after the default latency.
    pub fn fail_with(message: impl Into<String>) -> Self {
        Self {
            completion: CompletionBehavior::Fail {
                message: message.into(),
            },
            ..Self::default()
        }
    }

    /// Accepts requests and never answers.
    pub fn silent() -> Self {
        Self {
            completion: CompletionBehavior::Silent,
            ..Self::default()
        }
    }

    /// Refuses every connect request.
    pub fn refuse() -> Self {
        Self {
            accept: false,
            ..Self::default()
        }
    }
}
