use crate::consultation::ConsultationStatus;
use crate::types::ConsultationId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error(
        "cannot {operation} consultation {consultation_id} while it is {status}{hint}",
        hint = invalid_state_hint(.status)
    )]
    InvalidState {
        consultation_id: ConsultationId,
        status: ConsultationStatus,
        operation: &'static str,
    },
    #[error("consultation {0} has already been claimed; pick another request")]
    AlreadyClaimed(ConsultationId),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("not authorised: {0}")]
    Authorization(String),
    #[error("failed to write audit event: {0}")]
    AuditWrite(String),
    #[error("record already exists: {0}")]
    AlreadyExists(String),

    #[error("invalid identifier: {0}")]
    InvalidId(#[from] telecare_uuid::UuidError),
    #[error("invalid text: {0}")]
    Text(#[from] crate::types::TextError),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to create storage directory: {0}")]
    StorageDirCreation(std::io::Error),
    #[error("failed to read record file: {0}")]
    FileRead(std::io::Error),
    #[error("failed to write record file: {0}")]
    FileWrite(std::io::Error),
    #[error("failed to lock the record store: {0}")]
    StoreLock(std::io::Error),
    #[error("failed to serialize YAML: {0}")]
    YamlSerialization(serde_yaml::Error),
    #[error("failed to deserialize YAML: {0}")]
    YamlDeserialization(serde_yaml::Error),
}

impl CoreError {
    /// True for failures of the storage layer rather than of the caller's request.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            CoreError::StorageDirCreation(_)
                | CoreError::FileRead(_)
                | CoreError::FileWrite(_)
                | CoreError::StoreLock(_)
                | CoreError::YamlSerialization(_)
                | CoreError::YamlDeserialization(_)
                | CoreError::AuditWrite(_)
                | CoreError::InvalidConfig(_)
        )
    }
}

fn invalid_state_hint(status: &ConsultationStatus) -> &'static str {
    match status {
        ConsultationStatus::Completed => "; completed records are read-only, add an addendum instead",
        ConsultationStatus::Cancelled => "; cancelled records accept no further changes",
        _ => "",
    }
}

pub type CoreResult<T> = std::result::Result<T, CoreError>;
