use thiserror::Error;

use crate::devis::edit::EditError;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error(transparent)]
    InvalidEdit(#[from] EditError),
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
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

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => "Requete invalide. Verifiez les informations envoyees.",
            Self::ServiceUnavailable { .. } => {
                "Service momentanement indisponible. Reessayez dans un instant."
            }
            Self::Internal { .. } => "Erreur interne inattendue.",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::BadRequest { message, .. }
            | Self::ServiceUnavailable { message, .. }
            | Self::Internal { message, .. } => message,
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        match value {
            ApplicationError::Domain(error) => {
                Self::BadRequest { message: error.to_string(), correlation_id: "unassigned".into() }
            }
            ApplicationError::Persistence(message) | ApplicationError::Integration(message) => {
                Self::ServiceUnavailable { message, correlation_id: "unassigned".to_owned() }
            }
            ApplicationError::Configuration(message) => {
                Self::Internal { message, correlation_id: "unassigned".to_owned() }
            }
        }
    }
}

/// Quote generation failures. None of these degrade into an empty or guessed quote.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum QuoteError {
    #[error("dossier id is required")]
    MissingDossierId,
    #[error("no LLM api key configured")]
    MissingLlmKey,
    #[error("datastore credentials are not configured")]
    MissingDatastore,
    #[error("no transcript found for dossier `{0}`")]
    EmptyTranscript(String),
    #[error("price catalog is empty")]
    EmptyCatalog,
    #[error("datastore failure: {0}")]
    Datastore(String),
    #[error("llm failure: {0}")]
    Llm(String),
    #[error("llm reply is not a valid quote: {reason}")]
    UnparseableReply { reason: String, raw: String },
}

impl QuoteError {
    /// Raw model output, when the failure happened after a completion was received.
    pub fn raw_reply(&self) -> Option<&str> {
        match self {
            Self::UnparseableReply { raw, .. } => Some(raw),
            _ => None,
        }
    }
}

impl From<QuoteError> for ApplicationError {
    fn from(value: QuoteError) -> Self {
        match value {
            QuoteError::MissingDossierId
            | QuoteError::EmptyTranscript(_)
            | QuoteError::EmptyCatalog => {
                Self::Domain(DomainError::InvalidInput(value.to_string()))
            }
            QuoteError::MissingLlmKey | QuoteError::MissingDatastore => {
                Self::Configuration(value.to_string())
            }
            QuoteError::Datastore(message) => Self::Persistence(message),
            QuoteError::Llm(_) | QuoteError::UnparseableReply { .. } => {
                Self::Integration(value.to_string())
            }
        }
    }
}
