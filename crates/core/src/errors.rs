use serde::Serialize;
use thiserror::Error;

use crate::domain::quote::QuoteStatus;

/// Caller-facing classification shared by every error in the quoting core.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidArgument,
    NotFound,
    PermissionDenied,
    InvalidState,
    Internal,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("{0}")]
    InvalidArgument(String),
    #[error("{entity} `{id}` no encontrado")]
    NotFound { entity: &'static str, id: String },
    #[error("{0}")]
    PermissionDenied(String),
    #[error("{0}")]
    InvalidState(String),
    #[error("invalid quote transition from {from:?} to {to:?}")]
    InvalidQuoteTransition { from: QuoteStatus, to: QuoteStatus },
}

impl DomainError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound { entity, id: id.into() }
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::PermissionDenied(_) => ErrorKind::PermissionDenied,
            Self::InvalidState(_) | Self::InvalidQuoteTransition { .. } => ErrorKind::InvalidState,
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("integration failure: {0}")]
    Integration(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

impl ApplicationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Domain(error) => error.kind(),
            Self::Persistence(_) | Self::Integration(_) | Self::Configuration(_) => {
                ErrorKind::Internal
            }
        }
    }

    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let mut mapped = InterfaceError::from(self);
        mapped.correlation_id = correlation_id.into();
        mapped
    }
}

/// Transport-facing error: a kind, a message safe to show to the end user and
/// the correlation id of the request that failed.
#[derive(Clone, Debug, Error, PartialEq, Eq, Serialize)]
#[error("{kind:?}: {message}")]
pub struct InterfaceError {
    pub kind: ErrorKind,
    pub message: String,
    pub correlation_id: String,
}

impl InterfaceError {
    pub fn user_message(&self) -> &str {
        match self.kind {
            // These carry the violated bound or field and are shown verbatim.
            ErrorKind::InvalidArgument | ErrorKind::InvalidState => &self.message,
            ErrorKind::NotFound => "El recurso solicitado no existe.",
            ErrorKind::PermissionDenied => "No tienes permiso para realizar esta acción.",
            ErrorKind::Internal => "Ocurrió un error inesperado. Intenta de nuevo más tarde.",
        }
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let kind = value.kind();
        let message = match value {
            ApplicationError::Domain(DomainError::InvalidQuoteTransition { from, .. }) => {
                format!("La cotización está en estado {} y no admite esta operación", from.as_str())
            }
            ApplicationError::Domain(error) => error.to_string(),
            ApplicationError::Persistence(message)
            | ApplicationError::Integration(message)
            | ApplicationError::Configuration(message) => message,
        };
        Self { kind, message, correlation_id: "unassigned".to_owned() }
    }
}
