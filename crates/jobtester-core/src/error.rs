//! Error types for the job tester.

/// Job tester errors.
#[derive(Debug, thiserror::Error)]
pub enum TesterError {
    /// Configuration missing, unreadable or invalid.
    #[error("configuration error: {message}")]
    Config { message: String },

    /// Fleet listing or capability catalogue could not be fetched.
    #[error("failed to fetch {what}: {message}")]
    Fetch { what: String, message: String },

    /// A discovery endpoint answered with a body we could not decode.
    #[error("invalid response: {message}")]
    InvalidResponse { message: String },

    /// The catalogue advertises a pipeline with no operator definition.
    #[error("pipeline not found in configuration: {pipeline}")]
    PipelineNotConfigured { pipeline: String },

    /// Fixture file for a multipart pipeline could not be read.
    #[error("failed to open fixture {path}: {message}")]
    Fixture { path: String, message: String },

    /// Request construction failed for another reason.
    #[error("failed to build job request: {message}")]
    Build { message: String },

    /// Network-level failure (connect, timeout, body read).
    #[error("{message}")]
    Transport { message: String },

    /// Stats collector unreachable or answered non-2xx.
    #[error("stats delivery failed: {message}")]
    Delivery {
        message: String,
        status: Option<u16>,
    },

    /// Callback server failed to bind or serve.
    #[error("callback server error: {message}")]
    Server { message: String },
}

impl TesterError {
    /// Process exit code when this error aborts the CLI: 2 configuration,
    /// 3 discovery, 4 callback server, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config { .. } => 2,
            Self::Fetch { .. } | Self::InvalidResponse { .. } => 3,
            Self::Server { .. } => 4,
            _ => 1,
        }
    }

    pub(crate) fn fetch(what: &str, message: impl Into<String>) -> Self {
        Self::Fetch {
            what: what.to_string(),
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for TesterError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport {
            message: err.to_string(),
        }
    }
}

/// Result type for job tester operations.
pub type TesterResult<T> = Result<T, TesterError>;
