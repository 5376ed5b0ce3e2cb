//! Error types for the scheduling core

use thiserror::Error;

/// Registry lookup failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Receiver `{0}` not found")]
    NotFound(String),
    #[error("Receiver `{0}` zero value not found")]
    ZeroNotFound(String),
}

/// Configuration errors that prevent a worker from being created
///
/// These are never retried; transient `init` failures are retried inside
/// [`crate::Worker::new`] instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkerError {
    #[error("entry `{0}` has no `receiver` key")]
    MissingReceiver(String),
    #[error("entry `{name}`: {source}")]
    Registry {
        name: String,
        #[source]
        source: RegistryError,
    },
}

/// Template syntax errors, reported once at parse time
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("delimiters must not be empty")]
    EmptyDelims,
    #[error("unclosed action starting at byte {0}")]
    Unclosed(usize),
    #[error("empty action at byte {0}")]
    EmptyAction(usize),
    #[error("unterminated string literal in action `{0}`")]
    UnterminatedString(String),
    #[error("unknown function `{0}`")]
    UnknownFunction(String),
    #[error("`{func}` expects {expected} argument(s), got {got}")]
    Arity {
        func: String,
        expected: String,
        got: usize,
    },
    #[error("bad argument `{0}`")]
    BadArgument(String),
}

/// Failures while rendering a parsed template against a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("field `{0}` not found")]
    MissingField(String),
    #[error("printf: {0}")]
    Format(String),
}
