//! Error types for xmlbind
//!
//! This module defines all error types used throughout the library.
//! Lookup misses are not errors (they surface as `None`); the variants here
//! are the failures that abort a parse or encode pass.

use std::fmt;
use thiserror::Error;

/// Result type alias using xmlbind Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for xmlbind operations
#[derive(Error, Debug)]
pub enum Error {
    /// A binding failed while parsing or encoding a component
    #[error("binding error: {0}")]
    Binding(#[from] BindingError),

    /// Schema document could not be read or built
    #[error("schema error: {0}")]
    Schema(String),

    /// A binding could not be instantiated in its resolution context
    #[error("resolution error: {0}")]
    Resolution(String),

    /// Structural failure that is only fatal in strict mode
    #[error("strict mode: {0}")]
    Strict(String),

    /// Value error (invalid lexical value for a type)
    #[error("value error: {0}")]
    Value(String),

    /// Encoding error (object to XML conversion)
    #[error("encoding error: {0}")]
    Encode(String),

    /// Decoding error (XML to object conversion)
    #[error("decoding error: {0}")]
    Decode(String),

    /// Resource loading error
    #[error("resource error: {0}")]
    Resource(String),

    /// Namespace error
    #[error("namespace error: {0}")]
    Namespace(String),

    /// Name error (invalid XML name)
    #[error("name error: {0}")]
    Name(String),

    /// Limit exceeded error
    #[error("limit exceeded: {0}")]
    LimitExceeded(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// XML parsing error
    #[error("XML error: {0}")]
    Xml(String),

    /// URL parsing error
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

impl Error {
    /// Check whether this error came out of a binding's own logic
    pub fn is_binding_failure(&self) -> bool {
        matches!(self, Error::Binding(_))
    }
}

/// Binding execution failure with context
///
/// Carries the qualified name of the component being processed so that a
/// failure deep inside a document can be traced back to the schema.
#[derive(Debug, Clone)]
pub struct BindingError {
    /// Error message
    pub message: String,
    /// Qualified name of the component being parsed or encoded
    pub target: Option<String>,
    /// Path of the element in the instance document
    pub path: Option<String>,
    /// Underlying cause reported by the binding
    pub reason: Option<String>,
}

impl BindingError {
    /// Create a new binding error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            target: None,
            path: None,
            reason: None,
        }
    }

    /// Set the qualified name that was being processed
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Set the instance path
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Set the reason
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

impl fmt::Display for BindingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;

        if let Some(ref target) = self.target {
            write!(f, "\n\nTarget: {}", target)?;
        }

        if let Some(ref reason) = self.reason {
            write!(f, "\n\nReason: {}", reason)?;
        }

        if let Some(ref path) = self.path {
            write!(f, "\n\nPath: {}", path)?;
        }

        Ok(())
    }
}

impl std::error::Error for BindingError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binding_error_display() {
        let err = BindingError::new("Failed to parse element")
            .with_target("{http://example.com}item")
            .with_reason("invalid digit found in string")
            .with_path("/order/item");

        let msg = format!("{}", err);
        assert!(msg.contains("Failed to parse element"));
        assert!(msg.contains("Target: {http://example.com}item"));
        assert!(msg.contains("Reason:"));
        assert!(msg.contains("Path: /order/item"));
    }

    #[test]
    fn test_error_conversion() {
        let err: Error = BindingError::new("boom").into();
        assert!(matches!(err, Error::Binding(_)));
        assert!(err.is_binding_failure());
        assert!(!Error::Strict("x".into()).is_binding_failure());
    }
}
