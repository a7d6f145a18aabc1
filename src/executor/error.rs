//! Error types for action invocation.

use thiserror::Error;

use super::coerce::CoercionFailure;

/// Raised by a catalog operation.
#[derive(Debug, Error)]
pub enum ActionError {
    /// The operation observed the run's cancellation signal.
    #[error("cancelled")]
    Cancelled,

    /// The handler received a value of the wrong kind at `index`.
    #[error("argument {index}: expected {expected}")]
    BadArgument { index: usize, expected: &'static str },

    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

/// Failure of one step invocation.
#[derive(Debug, Error)]
pub enum InvocationError {
    /// No descriptor for the name/argument count accepted the arguments.
    #[error("unresolved action '{name}' with {arg_count} argument(s){}", detail(.last_failure))]
    Unresolved {
        name: String,
        arg_count: usize,
        last_failure: Option<CoercionFailure>,
    },

    #[error("action '{name}' was cancelled")]
    Cancelled { name: String },

    /// The operation itself failed.
    #[error("action '{name}' failed: {source}")]
    Fault {
        name: String,
        #[source]
        source: ActionError,
    },
}

fn detail(failure: &Option<CoercionFailure>) -> String {
    match failure {
        Some(f) => format!(" ({f})"),
        None => String::new(),
    }
}

impl InvocationError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, InvocationError::Cancelled { .. })
    }

    pub fn is_unresolved(&self) -> bool {
        matches!(self, InvocationError::Unresolved { .. })
    }

    pub(crate) fn from_action(name: &str, err: ActionError) -> Self {
        match err {
            ActionError::Cancelled => InvocationError::Cancelled {
                name: name.to_string(),
            },
            other => InvocationError::Fault {
                name: name.to_string(),
                source: other,
            },
        }
    }
}
