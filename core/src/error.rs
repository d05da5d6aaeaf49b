use crate::collaborators::CollaboratorError;
use crate::types::{BusinessId, RequestStatus};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClosureError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("A closure request is already in progress for business {business_id}")]
    AlreadyInProgress { business_id: BusinessId },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition {
        from: RequestStatus,
        to: RequestStatus,
    },

    #[error("Collaborator error: {0}")]
    Collaborator(#[from] CollaboratorError),

    #[error("Missing configuration: {key}")]
    MissingConfig { key: &'static str },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type ClosureResult<T> = Result<T, ClosureError>;
