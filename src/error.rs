//! Error types for prefix resolution and binding.
//!
//! Everything surfaces synchronously from [`Host::bind`](crate::host::Host::bind)
//! or [`ConfigResolver::resolve`](crate::resolver::ConfigResolver::resolve).
//! There is no local recovery or retry.

/// Errors raised while resolving, binding, or using a prefixed connection.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A required key is missing or a value is semantically invalid.
    #[error("configuration error in {key}: {message}")]
    Configuration { key: String, message: String },

    /// A value could not be converted to the type the key requires.
    #[error("{key}: cannot convert {value:?} to {expected}")]
    TypeConversion {
        key: String,
        value: String,
        expected: &'static str,
    },

    /// The prefix is already bound on this host.
    #[error("prefix {prefix:?} is already bound on this host")]
    DuplicatePrefix { prefix: String },

    /// The MongoDB driver reported a failure.
    #[error("driver error: {0}")]
    Driver(#[from] mongodb::error::Error),

    /// The in-memory driver rejected an operation.
    #[error("store error: {0}")]
    Store(String),

    /// The configuration file could not be read or parsed.
    #[error("cannot load config file '{path}': {message}")]
    ConfigFile { path: String, message: String },
}

impl Error {
    pub(crate) fn configuration(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration {
            key: key.into(),
            message: message.into(),
        }
    }

    pub(crate) fn type_conversion(
        key: impl Into<String>,
        value: impl Into<String>,
        expected: &'static str,
    ) -> Self {
        Self::TypeConversion {
            key: key.into(),
            value: value.into(),
            expected,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
