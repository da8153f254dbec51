use crate::infrastructure::error::InfraError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Fetch failed: {0}")]
    Fetch(String),
    #[error("Create failed: {0}")]
    Create(String),
    #[error("Update failed: {0}")]
    Update(String),
    #[error("Delete failed: {0}")]
    Delete(String),
    #[error("{0}")]
    Validation(String),
    #[error("Authentication required")]
    Unauthenticated,
    #[error("Invalid state: {0}")]
    State(String),
    #[error(transparent)]
    Infra(#[from] InfraError),
}

impl AppError {
    pub fn user_message(&self) -> String {
        match self {
            Self::Fetch(message)
            | Self::Create(message)
            | Self::Update(message)
            | Self::Delete(message)
            | Self::Validation(message)
            | Self::State(message) => message.clone(),
            Self::Unauthenticated => "Please sign in to continue".to_string(),
            Self::Infra(error) => error.to_string(),
        }
    }
}
