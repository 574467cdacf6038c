use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Dimension mismatch or a conflicting index definition. Never retried.
    #[error("Configuration fault on {descriptor}: {reason}")]
    ConfigurationFault { descriptor: String, reason: String },

    #[error("Index missing: {0}")]
    IndexMissing(String),

    /// An index stayed missing after one ensure-and-retry cycle.
    #[error("Index '{0}' still missing after re-creating indexes")]
    IndexUnrecoverable(String),

    #[error("{collaborator} unavailable: {reason}")]
    UpstreamUnavailable { collaborator: String, reason: String },

    #[error("Storage operation failed: {0}")]
    Storage(String),
}

impl Error {
    pub fn configuration(descriptor: impl ToString, reason: impl Into<String>) -> Self {
        Self::ConfigurationFault { descriptor: descriptor.to_string(), reason: reason.into() }
    }

    pub fn upstream(collaborator: impl Into<String>, reason: impl ToString) -> Self {
        Self::UpstreamUnavailable { collaborator: collaborator.into(), reason: reason.to_string() }
    }

    pub fn storage(reason: impl ToString) -> Self {
        Self::Storage(reason.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
