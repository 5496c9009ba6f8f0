use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Missing required internal field: {0}")]
    MissingField(String),

    #[error("{field} has invalid value '{value}'")]
    InvalidType { field: String, value: String },

    #[error("Publish failure: {0}")]
    PublishFailure(String),

    #[error("Mapping rule not found: {0}")]
    MappingRuleNotFound(String),

    #[error("Raw event not found: {0}")]
    RawEventNotFound(String),

    #[error("Mapped event not found: {0}")]
    MappedEventNotFound(String),

    #[error("Event already settled: {0}")]
    StatusAlreadySettled(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Repository error: {0}")]
    RepositoryError(#[from] anyhow::Error),
}

impl DomainError {
    /// True for the errors produced while turning a canonical map into an event
    pub fn is_event_validation(&self) -> bool {
        matches!(
            self,
            DomainError::MissingField(_) | DomainError::InvalidType { .. }
        )
    }
}
