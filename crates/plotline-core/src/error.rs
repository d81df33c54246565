use plotline_client::ApiError;
use plotline_schema::ValidationError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Api(#[from] ApiError),

    /// A mutation on the same entity has not come back yet.
    #[error("{id} already has a request in flight")]
    Busy { id: String },

    #[error("no project selected")]
    NoProject,

    #[error("no chapter selected")]
    NoChapter,
}

impl SessionError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Api(e) if e.is_not_found())
    }
}
