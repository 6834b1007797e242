use std::path::PathBuf;

/// Everything that can stop a dump. None of these are retried.
#[derive(Debug, thiserror::Error)]
pub(crate) enum AppError {
    #[error("invalid endpoint URL {url:?}: {reason}")]
    Configuration { url: String, reason: String },

    #[error("cannot reach {endpoint}: {source}")]
    Connection {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("login failed: {0}")]
    Authentication(String),

    #[error("{method} failed: {fault}")]
    Fault { method: &'static str, fault: String },

    #[error("unexpected response to {method}: {reason}")]
    Protocol { method: &'static str, reason: String },

    #[error("cannot retrieve performance counters: {0}")]
    Retrieval(String),

    #[error("cannot create {}: {source}", path.display())]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("error writing csv: {0}")]
    Write(#[from] csv::Error),

    #[error("interrupted")]
    Cancelled,
}

pub(crate) type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Process exit status for this error.
    pub(crate) fn exit_code(&self) -> i32 {
        match self {
            Self::Cancelled => 130,
            _ => 1,
        }
    }
}
