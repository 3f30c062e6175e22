//! Schema location resolution
//!
//! `schemaLocation` hints found in instance documents and in
//! `xs:include`/`xs:import` are turned into [`Location`]s here, relative
//! hints being resolved against the location of the referring schema.

use crate::error::Result;
use std::path::{Path, PathBuf};
use url::Url;

/// Resource location - a URL, file path, or in-memory schema text
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Location {
    /// File system path
    Path(PathBuf),
    /// URL (http, https, ...)
    Url(Url),
    /// In-memory schema document
    String(String),
}

impl Location {
    /// Create a location from a hint (auto-detect type)
    pub fn parse(s: &str) -> Result<Self> {
        if let Ok(url) = Url::parse(s) {
            if url.scheme() == "file" {
                if let Ok(path) = url.to_file_path() {
                    return Ok(Location::Path(path));
                }
            } else if url.scheme().len() > 1 {
                // Single letter schemes are Windows drive letters
                return Ok(Location::Url(url));
            }
        }
        Ok(Location::Path(PathBuf::from(s)))
    }

    /// Resolve a (possibly relative) hint against this location
    pub fn join(&self, hint: &str) -> Result<Location> {
        match self {
            Location::Url(base) => Ok(Location::Url(base.join(hint)?)),
            Location::Path(base) => {
                let candidate = Location::parse(hint)?;
                match candidate {
                    Location::Path(rel) if rel.is_relative() => {
                        let dir = base.parent().unwrap_or_else(|| Path::new(""));
                        Ok(Location::Path(dir.join(rel)))
                    }
                    other => Ok(other),
                }
            }
            Location::String(_) => Location::parse(hint),
        }
    }

    /// Get the location as a string
    pub fn as_str(&self) -> String {
        match self {
            Location::Path(p) => p.to_string_lossy().to_string(),
            Location::Url(u) => u.to_string(),
            Location::String(s) => s.clone(),
        }
    }

    /// Check if this is a remote location (URL)
    pub fn is_remote(&self) -> bool {
        matches!(self, Location::Url(_))
    }
}

/// Split an `xsi:schemaLocation` value into (namespace, location) pairs
pub fn parse_schema_location(value: &str) -> Vec<(String, String)> {
    let tokens: Vec<&str> = value.split_whitespace().collect();
    tokens
        .chunks_exact(2)
        .map(|pair| (pair[0].to_string(), pair[1].to_string()))
        .collect()
}
