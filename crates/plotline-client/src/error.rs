use reqwest::StatusCode;
use thiserror::Error;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never produced an HTTP response.
    #[error("request failed: {0}")]
    Fetch(#[from] reqwest::Error),

    #[error("{resource} not found")]
    NotFound { resource: String },

    #[error("server returned {status} for {resource}: {body}")]
    Server {
        resource: String,
        status: u16,
        body: String,
    },

    #[error("could not decode {resource}: {source}")]
    Decode {
        resource: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ApiError {
    pub(crate) fn from_status(resource: &str, status: StatusCode, body: String) -> Self {
        if status == StatusCode::NOT_FOUND {
            Self::NotFound {
                resource: resource.to_string(),
            }
        } else {
            Self::Server {
                resource: resource.to_string(),
                status: status.as_u16(),
                body,
            }
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Worth asking the user to try again.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Fetch(e) => e.is_timeout() || e.is_connect(),
            Self::Server { status, .. } => *status == 429 || (500..=599).contains(status),
            Self::NotFound { .. } | Self::Decode { .. } => false,
        }
    }
}
