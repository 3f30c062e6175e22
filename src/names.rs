//! Name checks for schema declarations and type references

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Error, Result};

// Simplified NameStartChar / NameChar ranges
static NCNAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Z_a-z\u{C0}-\u{D6}\u{D8}-\u{F6}\u{F8}-\u{2FF}\u{370}-\u{37D}][A-Z_a-z\u{C0}-\u{D6}\u{D8}-\u{F6}\u{F8}-\u{2FF}\u{370}-\u{37D}\-\.0-9\u{B7}]*$")
        .expect("NCName pattern is valid")
});

/// Check that a declaration name is a non-colonized name
pub fn check_declaration_name(name: &str) -> Result<()> {
    if NCNAME.is_match(name) {
        Ok(())
    } else {
        Err(Error::Name(format!("'{}' is not a valid declaration name", name)))
    }
}

/// Split a `prefix:local` reference, checking both parts
///
/// Surrounding whitespace is ignored.
pub fn parse_reference(reference: &str) -> Result<(Option<&str>, &str)> {
    let reference = reference.trim();
    let (prefix, local) = match reference.split_once(':') {
        Some((prefix, local)) => (Some(prefix), local),
        None => (None, reference),
    };
    let valid = NCNAME.is_match(local) && prefix.map_or(true, |p| NCNAME.is_match(p));
    if !valid {
        return Err(Error::Name(format!("'{}' is not a valid qualified name", reference)));
    }
    Ok((prefix, local))
}
