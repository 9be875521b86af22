use reqwest::StatusCode;
use thiserror::Error;

use engine::RemoteError;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid base url: {0}")]
    InvalidUrl(String),
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("server answered {status}: {message}")]
    Status { status: StatusCode, message: String },
}

impl ClientError {
    /// `true` when the request may succeed if sent again unchanged.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::InvalidUrl(_) => false,
            Self::Transport(_) => true,
            Self::Status { status, .. } => matches!(
                *status,
                StatusCode::REQUEST_TIMEOUT
                    | StatusCode::TOO_MANY_REQUESTS
                    | StatusCode::BAD_GATEWAY
                    | StatusCode::SERVICE_UNAVAILABLE
                    | StatusCode::GATEWAY_TIMEOUT
            ),
        }
    }
}

impl From<ClientError> for RemoteError {
    fn from(value: ClientError) -> Self {
        if value.is_retryable() {
            return RemoteError::Transport(value.to_string());
        }
        match value {
            ClientError::Status { message, .. } => RemoteError::Rejected(message),
            other => RemoteError::Transport(other.to_string()),
        }
    }
}
