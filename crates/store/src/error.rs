use std::fmt;

use shared::{
    domain::IncidentStatus,
    error::{ApiError, ErrorCode},
};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    User,
    FamilyMember,
    Incident,
    Ambulance,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EntityKind::User => "user",
            EntityKind::FamilyMember => "family member",
            EntityKind::Incident => "incident",
            EntityKind::Ambulance => "ambulance",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    #[error("{entity} '{id}' not found")]
    NotFound { entity: EntityKind, id: String },
    #[error("no authenticated user")]
    NotAuthenticated,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("incident cannot move from {from} to {to}")]
    InvalidTransition {
        from: IncidentStatus,
        to: IncidentStatus,
    },
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("conflict: {0}")]
    Conflict(String),
}

impl StoreError {
    pub(crate) fn not_found(entity: EntityKind, id: impl fmt::Display) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            StoreError::NotFound { .. } => ErrorCode::NotFound,
            StoreError::NotAuthenticated | StoreError::InvalidCredentials => {
                ErrorCode::Unauthorized
            }
            StoreError::InvalidTransition { .. } => ErrorCode::InvalidTransition,
            StoreError::Validation(_) => ErrorCode::Validation,
            StoreError::Conflict(_) => ErrorCode::Conflict,
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(value: StoreError) -> Self {
        ApiError::new(value.code(), value.to_string())
    }
}
