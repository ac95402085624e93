use shared::error::{ApiError, ErrorCode};
use thiserror::Error;

pub type Result<T, E = ComponentError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ComponentError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("action #{index} ({action}) failed while handling '{event}': {source}")]
    ActionFailure {
        event: String,
        index: usize,
        action: String,
        source: anyhow::Error,
    },
    #[error("collaborator failed: {0}")]
    Collaborator(#[source] anyhow::Error),
}

impl ComponentError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Self::ActionFailure { .. } => ErrorCode::ActionFailure,
            Self::Collaborator(_) => ErrorCode::Collaborator,
        }
    }
}

impl From<ComponentError> for ApiError {
    fn from(value: ComponentError) -> Self {
        ApiError::new(value.code(), value.to_string())
    }
}
