//! Error types shared by the reactive engine, the controller adapter and the
//! host driver.

use thiserror::Error;

/// Errors raised by controller reactivity.
#[derive(Debug, Error)]
pub enum ReactivityError {
    /// A scoped primitive or store accessor was used before `initialize`.
    #[error("controller `{identifier}` called `{operation}` before it was initialized")]
    NotInitialized {
        identifier: String,
        operation: &'static str,
    },

    /// The host could not resolve a single outlet.
    #[error("missing outlet `{outlet}` for controller `{identifier}`")]
    MissingOutlet { identifier: String, outlet: String },

    #[error("controller `{identifier}` declares no value named `{name}`")]
    UnknownValue { identifier: String, name: String },

    #[error("controller `{identifier}` declares no outlet named `{name}`")]
    UnknownOutlet { identifier: String, name: String },

    #[error("no controller registered for identifier `{0}`")]
    UnknownController(String),

    #[error("controller `{identifier}` declares `{name}` more than once")]
    DuplicateDeclaration { identifier: String, name: String },

    /// A declared name does not follow the camelCase property grammar.
    #[error("invalid {kind} name `{name}`")]
    InvalidName { kind: &'static str, name: String },

    #[error("cannot read `{raw}` as a {value_type} value for `{name}`")]
    InvalidValue {
        name: String,
        value_type: &'static str,
        raw: String,
    },

    #[error("value `{name}` does not have the requested shape: {source}")]
    ValueDecode {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    /// Registration into a tracking scope that has already been stopped.
    #[error("tracking scope has been disposed")]
    ScopeDisposed,

    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ReactivityError>;
