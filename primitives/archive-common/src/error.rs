use std::time::Duration;

/// How a caller should treat an [`ArchiveError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Retrying the same call later may succeed.
    Recoverable,
    /// Retrying will not help; the run should stop.
    Fatal,
}

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("{operation} request failed: {source}")]
    Transport {
        operation: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("{operation} was rate limited")]
    RateLimited {
        operation: String,
        retry_after: Option<Duration>,
    },
    #[error("{operation} returned HTTP {status}: {body}")]
    Status {
        operation: String,
        status: u16,
        body: String,
    },
    #[error("{operation} rejected the request: {error}")]
    Api { operation: String, error: String },
    #[error("Malformed timestamp {value:?}")]
    MalformedTimestamp { value: String },
    #[error("Invalid window: oldest {oldest} is after latest {latest}")]
    InvalidWindow { oldest: String, latest: String },
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Sink worker failed: {0}")]
    Worker(String),
}

impl ArchiveError {
    pub fn transport(
        operation: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Transport {
            operation: operation.into(),
            source: source.into(),
        }
    }

    pub fn api(operation: impl Into<String>, error: impl Into<String>) -> Self {
        Self::Api {
            operation: operation.into(),
            error: error.into(),
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Self::Transport { .. } | Self::RateLimited { .. } => Severity::Recoverable,
            Self::Status { status, .. } if *status >= 500 => Severity::Recoverable,
            _ => Severity::Fatal,
        }
    }

    pub fn is_recoverable(&self) -> bool {
        self.severity() == Severity::Recoverable
    }

    /// Server-requested delay before the next attempt, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ArchiveError>;
