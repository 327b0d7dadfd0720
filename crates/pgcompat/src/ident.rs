//! Safe SQL identifier handling.
//!
//! Every table or column name that ends up in SQL text goes through this module.
//! Names are validated against `[A-Za-z_][A-Za-z0-9_]*` and rendered double-quoted.
//! No other module concatenates raw names into statements.
//!
//! # Example
//! ```ignore
//! use pgcompat::ident::{quote, validate};
//!
//! assert!(validate("created_at"));
//! assert_eq!(quote("users")?, r#""users""#);
//! assert!(quote("users; DROP TABLE users").is_err());
//! # Ok::<(), pgcompat::CompatError>(())
//! ```

use crate::error::{CompatError, CompatResult};
use std::fmt;

/// Check whether `name` is a safe identifier.
pub fn validate(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

/// Validate and quote an identifier for SQL.
///
/// Returns [`CompatError::InvalidIdentifier`] instead of passing unsafe input through.
pub fn quote(name: &str) -> CompatResult<String> {
    Ident::parse(name).map(|ident| ident.to_sql())
}

/// A validated SQL identifier (table or column name).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Ident(String);

impl Ident {
    /// Parse an identifier, rejecting anything outside `[A-Za-z_][A-Za-z0-9_]*`.
    pub fn parse(s: &str) -> CompatResult<Self> {
        if validate(s) {
            Ok(Self(s.to_string()))
        } else {
            Err(CompatError::InvalidIdentifier(s.to_string()))
        }
    }

    /// The bare (unquoted) name.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Render the identifier as SQL.
    pub fn to_sql(&self) -> String {
        let mut out = String::with_capacity(self.0.len() + 2);
        self.write_sql(&mut out);
        out
    }

    pub(crate) fn write_sql(&self, out: &mut String) {
        // Validation guarantees no embedded quotes.
        out.push('"');
        out.push_str(&self.0);
        out.push('"');
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Convert an input into an [`Ident`].
///
/// This is mainly for ergonomics in builder APIs.
pub trait IntoIdent {
    fn into_ident(self) -> CompatResult<Ident>;
}

impl IntoIdent for Ident {
    fn into_ident(self) -> CompatResult<Ident> {
        Ok(self)
    }
}

impl IntoIdent for &Ident {
    fn into_ident(self) -> CompatResult<Ident> {
        Ok(self.clone())
    }
}

impl IntoIdent for &str {
    fn into_ident(self) -> CompatResult<Ident> {
        Ident::parse(self)
    }
}

impl IntoIdent for String {
    fn into_ident(self) -> CompatResult<Ident> {
        Ident::parse(&self)
    }
}

impl IntoIdent for &String {
    fn into_ident(self) -> CompatResult<Ident> {
        Ident::parse(self)
    }
}
