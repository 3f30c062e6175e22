//! Resource limits
//!
//! The parse driver checks element depth and attribute counts as events
//! arrive. Document and schema sizes are checked before reading, and the
//! schema resolver bounds how deep includes and imports may chain.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Quantity bounded by [`Limits`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Limit {
    /// Open elements in an instance document
    XmlDepth,
    /// Bytes of a document or schema
    XmlSize,
    /// Attributes on one element
    Attributes,
    /// Include and import nesting while loading schemas
    SchemaDepth,
}

impl fmt::Display for Limit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Limit::XmlDepth => "element depth",
            Limit::XmlSize => "document size",
            Limit::Attributes => "attribute count",
            Limit::SchemaDepth => "schema include depth",
        })
    }
}

/// Bounds applied while loading schemas and binding documents
///
/// Deserializes from partial JSON, missing fields keeping their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Maximum element nesting depth
    pub max_xml_depth: usize,
    /// Maximum document or schema size in bytes
    pub max_xml_size: usize,
    /// Maximum attributes per element
    pub max_attributes: usize,
    /// Maximum include/import depth
    pub max_schema_depth: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_xml_depth: 1000,
            max_xml_size: 100 * 1024 * 1024,
            max_attributes: 1000,
            max_schema_depth: 100,
        }
    }
}

impl Limits {
    /// Default limits
    pub fn new() -> Self {
        Self::default()
    }

    /// Limits without any practical bound
    pub fn unbounded() -> Self {
        Self {
            max_xml_depth: usize::MAX,
            max_xml_size: usize::MAX,
            max_attributes: usize::MAX,
            max_schema_depth: usize::MAX,
        }
    }

    /// Configured maximum for a limit
    pub fn maximum(&self, limit: Limit) -> usize {
        match limit {
            Limit::XmlDepth => self.max_xml_depth,
            Limit::XmlSize => self.max_xml_size,
            Limit::Attributes => self.max_attributes,
            Limit::SchemaDepth => self.max_schema_depth,
        }
    }

    /// Fail with [`Error::LimitExceeded`] if `value` is above the limit
    pub fn check(&self, limit: Limit, value: usize) -> Result<()> {
        let maximum = self.maximum(limit);
        if value <= maximum {
            return Ok(());
        }
        Err(Error::LimitExceeded(format!("{} {} above the maximum of {}", limit, value, maximum)))
    }

    /// Check the depth of a newly opened element
    pub fn check_xml_depth(&self, depth: usize) -> Result<()> {
        self.check(Limit::XmlDepth, depth)
    }

    /// Check a document or schema size in bytes
    pub fn check_xml_size(&self, size: usize) -> Result<()> {
        self.check(Limit::XmlSize, size)
    }

    /// Check the attribute count of an element
    pub fn check_attributes(&self, count: usize) -> Result<()> {
        self.check(Limit::Attributes, count)
    }

    /// Check the include depth of a schema being loaded
    pub fn check_schema_depth(&self, depth: usize) -> Result<()> {
        self.check(Limit::SchemaDepth, depth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_are_inclusive() {
        let limits = Limits {
            max_xml_depth: 3,
            ..Limits::default()
        };
        assert!(limits.check_xml_depth(3).is_ok());
        match limits.check_xml_depth(4) {
            Err(Error::LimitExceeded(message)) => assert!(message.starts_with("element depth 4")),
            other => panic!("expected a limit error, got {:?}", other),
        }
    }

    #[test]
    fn test_unbounded() {
        let limits = Limits::unbounded();
        assert!(limits.check_attributes(1 << 20).is_ok());
        assert!(limits.check(Limit::SchemaDepth, usize::MAX).is_ok());
    }

    #[test]
    fn test_limits_from_partial_json() {
        let limits: Limits = serde_json::from_str(r#"{"max_attributes": 7}"#).unwrap();
        assert_eq!(limits.maximum(Limit::Attributes), 7);
        assert_eq!(limits.max_xml_depth, Limits::default().max_xml_depth);
        assert!(limits.check_xml_size(200 * 1024 * 1024).is_err());
    }
}
