use serde_json::json;
use thiserror::Error;

/// Failures surfaced by the roster, ledger, marks and prediction services.
///
/// Every variant is recoverable: the sidecar maps it onto an error response and
/// keeps serving. Storage failures are propagated as-is and never retried here.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("{0}")]
    Validation(String),
    #[error("student {student_id} is not owned by the requesting teacher")]
    NotOwner { student_id: String },
    #[error("student {student_id} is already claimed")]
    AlreadyOwned { student_id: String, owner_id: String },
    #[error("{what} not found: {id}")]
    NotFound { what: &'static str, id: String },
    #[error("no historical exam scores to predict from")]
    InsufficientData,
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),
    #[error("malformed value at {path}: {source}")]
    Malformed {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    pub fn validation(message: impl Into<String>) -> Self {
        CoreError::Validation(message.into())
    }

    pub fn student_not_found(id: &str) -> Self {
        CoreError::NotFound {
            what: "student",
            id: id.to_string(),
        }
    }

    /// Stable error code used on the IPC wire.
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::Validation(_) => "bad_params",
            CoreError::NotOwner { .. } => "not_owner",
            CoreError::AlreadyOwned { .. } => "already_owned",
            CoreError::NotFound { .. } => "not_found",
            CoreError::InsufficientData => "insufficient_data",
            CoreError::Storage(_) | CoreError::Malformed { .. } => "storage_failed",
        }
    }

    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            CoreError::NotOwner { student_id } => Some(json!({ "studentId": student_id })),
            CoreError::AlreadyOwned {
                student_id,
                owner_id,
            } => Some(json!({ "studentId": student_id, "ownerId": owner_id })),
            CoreError::NotFound { what, id } => Some(json!({ "kind": what, "id": id })),
            CoreError::Malformed { path, .. } => Some(json!({ "path": path })),
            _ => None,
        }
    }
}
