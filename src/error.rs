//! Typed error taxonomy for the resolution engine.
//!
//! Callers receive either a harmonized entity or one of these variants --
//! never a raw provider-specific error shape. Providers map transport
//! failures onto [`Error::Http`] / [`Error::NotFound`]; the retry executor
//! consults [`Error::status`] to tell transient failures from permanent ones.

/// Error type for all fallible operations in the crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The identifier or query was malformed. Never reaches a provider.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A provider responded with a non-success HTTP status.
    #[error("HTTP error {status}: {message}")]
    Http { status: u16, message: String },

    /// The per-provider request budget was exhausted and the configured
    /// maximum wait elapsed.
    #[error("Rate limit exceeded for provider '{0}'")]
    RateLimitExceeded(String),

    /// Every queried provider answered "no such entity".
    #[error("Not found: {0}")]
    NotFound(String),

    /// Every queried provider errored rather than cleanly not-found.
    #[error("All providers failed: {0}")]
    AggregateFailure(String),

    /// A merger was handed an empty candidate list. Unreachable given the
    /// coordinator's fan-out guards, but checked anyway.
    #[error("Cannot merge an empty list of {0} candidates")]
    MergeEmpty(&'static str),

    /// The snapshot cache backend failed. The coordinator swallows these and
    /// degrades to a cache miss.
    #[error("Cache error: {0}")]
    Cache(String),

    /// Invalid or inconsistent configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The HTTP transport failed before a status line was available
    /// (connection refused, timeout, DNS). Always retryable.
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// A provider response could not be decoded into the expected shape.
    #[error("Decode error: {0}")]
    Decode(String),
}

impl Error {
    /// Create a new Validation error.
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a new NotFound error.
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a new Http error carrying the status for retry decisions.
    pub fn http<S: Into<String>>(status: u16, message: S) -> Self {
        Self::Http {
            status,
            message: message.into(),
        }
    }

    /// Create a new Cache error.
    pub fn cache<S: Into<String>>(msg: S) -> Self {
        Self::Cache(msg.into())
    }

    /// Create a new Config error.
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new Decode error.
    pub fn decode<S: Into<String>>(msg: S) -> Self {
        Self::Decode(msg.into())
    }

    /// HTTP status code relevant for retry-policy decisions, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Result type alias using the crate error type.
pub type Result<T> = std::result::Result<T, Error>;
