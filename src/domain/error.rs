use thiserror::Error;

/// Rule violations detected before anything reaches storage.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("{entity} {id} does not exist or is no longer active")]
    NotFound { entity: &'static str, id: i64 },
    #[error("invalid {field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },
}

impl DomainError {
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        Self::NotFound { entity, id }
    }

    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    pub fn field(&self) -> Option<&'static str> {
        match self {
            DomainError::Validation { field, .. } => Some(*field),
            DomainError::NotFound { .. } => None,
        }
    }
}
