use std::path::PathBuf;

/// Errors related to configuration loading and parsing.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse config at {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Config merge error: {0}")]
    MergeError(String),
}

/// Why a transient collaborator call failed. All kinds count the same for retry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransientKind {
    Timeout,
    Network,
    Server(u16),
}

impl std::fmt::Display for TransientKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout => write!(f, "timeout"),
            Self::Network => write!(f, "network"),
            Self::Server(status) => write!(f, "server error {status}"),
        }
    }
}

/// Errors returned by a call to the remote research executor.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BackendError {
    #[error("Request rejected: {0}")]
    Validation(String),

    #[error("Unknown task: {task_id}")]
    NotFound { task_id: String },

    #[error("Result for task {task_id} is not ready yet")]
    NotReady { task_id: String },

    #[error("Transient failure ({kind}): {message}")]
    Transient { kind: TransientKind, message: String },

    #[error("Malformed response: {0}")]
    Decode(String),
}

impl BackendError {
    /// Whether the poller should retry after this error.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. } | Self::Decode(_))
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Transient {
            kind: TransientKind::Timeout,
            message: message.into(),
        }
    }
}

/// Terminal failures surfaced by the poller, once per session.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PollerError {
    #[error("Invalid research request: {0}")]
    Validation(String),

    #[error("Could not start research task: {0}")]
    Start(BackendError),

    #[error("Lost connection to the research service after {attempts} attempts: {last}")]
    Connectivity { attempts: u32, last: BackendError },

    #[error("Research task {task_id} no longer exists")]
    NotFound { task_id: String },

    /// The server reported `failed`; the message is passed through verbatim.
    #[error("{0}")]
    ExecutionFailure(String),

    /// The task completed but its result could not be retrieved.
    #[error("Research completed but the result could not be retrieved: {0}")]
    ResultFetch(BackendError),
}

/// Errors from the client-local persistence medium. Never fatal to monitoring.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("Persistence medium unavailable: {0}")]
    Unavailable(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize history: {0}")]
    Serialize(#[from] serde_json::Error),
}
