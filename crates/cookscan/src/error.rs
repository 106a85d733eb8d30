use thiserror::Error;

#[derive(Error, Debug)]
pub enum CookscanError {
    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),

    #[error("Collaborator error: {0}")]
    Collaborator(#[from] CollaboratorError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),
}

/// Failures reported by an external collaborator (OCR, classification,
/// validation, storage, repositories).
#[derive(Error, Debug)]
pub enum CollaboratorError {
    #[error("{service} call failed: {message}")]
    Failed {
        service: &'static str,
        message: String,
    },

    #[error("validation rejected candidate: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),
}

impl CollaboratorError {
    pub fn failed(service: &'static str, message: impl Into<String>) -> Self {
        Self::Failed {
            service,
            message: message.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Queue closed: no receiver is listening")]
    QueueClosed,

    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),

    #[error(transparent)]
    Workflow(#[from] WorkflowError),
}

#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("no suspended state for instance '{0}'")]
    NotSuspended(String),

    #[error("unknown step '{0}'")]
    UnknownStep(String),

    #[error("resume payload mismatch: {0}")]
    PayloadMismatch(String),

    #[error("step '{step}' requires {what} in state")]
    MissingState {
        step: &'static str,
        what: &'static str,
    },

    #[error("state serialization failed: {0}")]
    State(#[from] serde_json::Error),

    #[error("checkpoint store failed: {0}")]
    Checkpoint(#[from] crate::db::DatabaseError),

    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),
}

pub type Result<T> = std::result::Result<T, CookscanError>;
