use provision_core::ResourceKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OperationError {
    #[error(transparent)]
    Core(#[from] provision_core::CoreError),

    #[error("failed to initialise HTTP client")]
    ClientInit(#[source] reqwest::Error),

    #[error("request {method} {url} failed")]
    Http {
        method: String,
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("provider returned {status} {code}: {message}")]
    Provider {
        status: u16,
        code: String,
        message: String,
    },

    #[error("{operation} finished with status '{status}': {message}")]
    OperationFailed {
        operation: String,
        status: String,
        message: String,
    },

    #[error("unexpected response while {context}")]
    MalformedResponse { context: String },

    #[error("failed to serialize request body")]
    Json(#[from] serde_json::Error),

    #[error("no credential available: {reason}")]
    CredentialUnavailable { reason: String },

    #[error("token request to '{url}' failed")]
    TokenRequest {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{operation} was cancelled")]
    Cancelled { operation: String },

    #[error("{operation} did not finish within {timeout_secs}s")]
    DeadlineExceeded {
        operation: String,
        timeout_secs: u64,
    },

    #[error("cannot create {kind} before {requires} exists")]
    MissingDependency {
        kind: ResourceKind,
        requires: ResourceKind,
    },

    #[error("cannot create {kind}: an earlier step failed and the session is aborted")]
    SessionAborted { kind: ResourceKind },

    #[error("failed to create {kind}")]
    ProvisioningFailed {
        kind: ResourceKind,
        #[source]
        source: Box<OperationError>,
    },
}

impl OperationError {
    /// `true` when the error came from an interrupted wait rather than the provider.
    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        match self {
            Self::Cancelled { .. } | Self::DeadlineExceeded { .. } => true,
            Self::ProvisioningFailed { source, .. } => source.is_interrupted(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, OperationError>;
