use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("malformed layout: {0}")]
    MalformedLayout(String),

    #[error("empty input: {0}")]
    EmptyInput(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("request to {backend} failed: {details}")]
    Request { backend: String, details: String },
}

impl CollaboratorError {
    pub fn backend(backend: &str, details: impl Into<String>) -> Self {
        Self::BackendResponse {
            backend: backend.to_string(),
            details: details.into(),
        }
    }

    pub fn request(backend: &str, details: impl Into<String>) -> Self {
        Self::Request {
            backend: backend.to_string(),
            details: details.into(),
        }
    }
}

/// Failure of one pipeline stage, before it is flattened for callers.
#[derive(Debug, Error)]
pub enum StageError {
    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),
}

/// Uniform failure surfaced by the coordinator entry points.
#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error("processing failed: {0}")]
    Failed(String),
}

impl From<IngestError> for ProcessingError {
    fn from(value: IngestError) -> Self {
        Self::Failed(value.to_string())
    }
}

impl From<CollaboratorError> for ProcessingError {
    fn from(value: CollaboratorError) -> Self {
        Self::Failed(value.to_string())
    }
}

impl From<StageError> for ProcessingError {
    fn from(value: StageError) -> Self {
        Self::Failed(value.to_string())
    }
}
