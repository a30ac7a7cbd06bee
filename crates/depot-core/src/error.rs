use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Classified failure returned by every coordinator operation.
///
/// The message is opaque text for humans; callers branch on [`Error::kind`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Discriminant of [`Error`], free of any message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    BadRequest,
    Conflict,
    NotFound,
    InternalError,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 4] = [
        ErrorKind::BadRequest,
        ErrorKind::Conflict,
        ErrorKind::NotFound,
        ErrorKind::InternalError,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::BadRequest => "bad_request",
            ErrorKind::Conflict => "conflict",
            ErrorKind::NotFound => "not_found",
            ErrorKind::InternalError => "internal_error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Error {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::BadRequest(_) => ErrorKind::BadRequest,
            Error::Conflict(_) => ErrorKind::Conflict,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::Internal(_) => ErrorKind::InternalError,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Error::BadRequest(m) | Error::Conflict(m) | Error::NotFound(m) | Error::Internal(m) => m,
        }
    }

    /// True when this error has the given kind, regardless of message.
    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind() == kind
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_ignores_message() {
        let a = Error::not_found("file abc");
        let b = Error::not_found("something else entirely");
        assert_ne!(a, b);
        assert_eq!(a.kind(), b.kind());
        assert!(a.is(ErrorKind::NotFound));
        assert!(!a.is(ErrorKind::Conflict));
    }

    #[test]
    fn test_display_includes_message() {
        let err = Error::conflict("name 'a.txt' already stored");
        assert_eq!(err.to_string(), "Conflict: name 'a.txt' already stored");
        assert_eq!(err.message(), "name 'a.txt' already stored");
    }

    #[test]
    fn test_every_kind_has_distinct_label() {
        let labels: std::collections::HashSet<_> =
            ErrorKind::ALL.iter().map(|k| k.as_str()).collect();
        assert_eq!(labels.len(), ErrorKind::ALL.len());
        assert_eq!(
            serde_json::to_value(ErrorKind::InternalError).unwrap(),
            serde_json::json!("internal_error")
        );
    }
}
