use thiserror::Error;

pub type Error = lambda_runtime::Error;
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A request or response that violates the custom resource contract.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{0} must not be null or empty")]
    MissingField(&'static str),
    #[error("invalid ResponseURL {url:?}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("Unknown stack operation: {0}")]
    UnknownOperation(String),
    #[error("Unknown request status: {0}")]
    UnknownStatus(String),
}

/// Why a custom resource invocation did not succeed.
#[derive(Debug, Error)]
pub enum CustomResourceError {
    #[error("failed to serialize response: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to send response: {0}")]
    Transport(#[source] BoxError),
    #[error("Failed to submit response successfully: {status}\n{body}")]
    Rejected { status: u16, body: String },
    #[error("resource reported failure: {reason}")]
    ResourceFailed { reason: String },
}
