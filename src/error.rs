use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreErrorCode {
    NotFound,
    Transport,
    Validation,
    Encoding,
    Internal,
}

impl StoreErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreErrorCode::NotFound => "docstore/not-found",
            StoreErrorCode::Transport => "docstore/transport",
            StoreErrorCode::Validation => "docstore/validation",
            StoreErrorCode::Encoding => "docstore/encoding",
            StoreErrorCode::Internal => "docstore/internal",
        }
    }
}

/// Error raised by any layer of the crate.
///
/// Transport failures additionally carry the HTTP status and, when the server
/// response body could be parsed, its detail message. Nothing in this crate
/// retries or swallows errors; the only default suppression is a 404 on `get`,
/// which surfaces as an absent value instead.
#[derive(Clone, Debug)]
pub struct StoreError {
    pub code: StoreErrorCode,
    message: String,
    status: Option<u16>,
    details: Option<String>,
}

impl StoreError {
    pub fn new(code: StoreErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            status: None,
            details: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn code_str(&self) -> &'static str {
        self.code.as_str()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// HTTP status of the failed request, for transport and not-found errors.
    pub fn status(&self) -> Option<u16> {
        self.status
    }

    /// Server-provided detail message, if one could be parsed from the body.
    pub fn details(&self) -> Option<&str> {
        self.details.as_deref()
    }

    pub fn is_not_found(&self) -> bool {
        self.code == StoreErrorCode::NotFound
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} ({}, HTTP {})", self.message, self.code_str(), status),
            None => write!(f, "{} ({})", self.message, self.code_str()),
        }
    }
}

impl Error for StoreError {}

pub type StoreResult<T> = Result<T, StoreError>;

pub fn not_found(status: u16, message: impl Into<String>) -> StoreError {
    StoreError::new(StoreErrorCode::NotFound, message).with_status(status)
}

pub fn transport(status: u16, message: impl Into<String>) -> StoreError {
    StoreError::new(StoreErrorCode::Transport, message).with_status(status)
}

pub fn validation(message: impl Into<String>) -> StoreError {
    StoreError::new(StoreErrorCode::Validation, message)
}

pub fn encoding(message: impl Into<String>) -> StoreError {
    StoreError::new(StoreErrorCode::Encoding, message)
}

pub fn internal_error(message: impl Into<String>) -> StoreError {
    StoreError::new(StoreErrorCode::Internal, message)
}
