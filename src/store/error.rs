use crate::model::Id;
use thiserror::Error;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// An update targeted an id with no row
    #[error("{entity} {id} does not exist")]
    NotFound { entity: &'static str, id: Id },

    /// A write broke a uniqueness, foreign key or check constraint
    #[error("integrity error: {detail}")]
    KeyViolation { detail: String },

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl StoreError {
    pub fn not_found(entity: &'static str, id: Id) -> Self {
        StoreError::NotFound { entity, id }
    }

    pub fn key_violation(detail: impl Into<String>) -> Self {
        StoreError::KeyViolation {
            detail: detail.into(),
        }
    }
}
