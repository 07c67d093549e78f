use thiserror::Error;

#[derive(Error, Debug)]
pub enum EntityError {
    #[error("Constraint violation on '{property}': {reason}")]
    ConstraintViolation { property: String, reason: String },

    #[error("Illegal state: {0}")]
    IllegalState(String),

    #[error("Instantiation failure: {0}")]
    InstantiationFailure(String),

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Unknown property '{0}'")]
    UnknownProperty(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl EntityError {
    pub fn constraint(property: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConstraintViolation {
            property: property.into(),
            reason: reason.into(),
        }
    }

    /// Check if the caller can recover by retrying with a different value
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::ConstraintViolation { .. })
    }
}

pub type Result<T> = std::result::Result<T, EntityError>;
