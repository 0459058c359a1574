use thiserror::Error;

use crate::nfa::{StateId, Symbol};

/// Error raised by a user supplied `transition`, `accept` or `epsilon` callable.
pub type CallableError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum Error {
    /// Exploration or subset construction wanted to admit more states than allowed.
    #[error("state limit exceeded: more than {limit} states")]
    StateLimitExceeded { limit: usize },

    #[error("{callable} failed for state {state}{}: {source}", on_symbol(.symbol))]
    Callable {
        /// `"transition"`, `"accept"` or `"epsilon"`.
        callable: &'static str,
        /// Canonical encoding of the state the callable was invoked on.
        state: String,
        /// The input symbol, for `transition` calls.
        symbol: Option<Symbol>,
        #[source]
        source: CallableError,
    },

    #[error("invalid state value {value}: {reason}")]
    InvalidStateValue { value: String, reason: &'static str },

    #[error("precondition violated: {0}")]
    PreconditionViolation(String),

    #[error("pattern syntax error at position {position}: {message}")]
    PatternSyntax { position: usize, message: String },

    #[error("unknown state {id} (automaton has {len} states)")]
    UnknownState { id: StateId, len: usize },

    #[error("could not encode state value: {0}")]
    Serialize(#[from] serde_json::Error),
}

fn on_symbol(symbol: &Option<Symbol>) -> String {
    symbol.map(|s| format!(" on symbol {s:?}")).unwrap_or_default()
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    pub(crate) fn pattern(position: usize, message: impl Into<String>) -> Self {
        Error::PatternSyntax {
            position,
            message: message.into(),
        }
    }
}
