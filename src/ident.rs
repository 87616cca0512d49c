//! Safe SQL identifier quoting.
//!
//! Every identifier the compiler emits — table names, column/field slugs
//! (which may themselves contain dots, e.g. `"ronin.createdAt"`), aliases —
//! is double-quoted. Unlike a hand-written schema-qualified identifier type,
//! a RONIN field slug's dot is part of the name itself, not a path
//! separator, so [`Ident`] does not split on `.`; dotted *paths* are a
//! separate concept handled by [`crate::flatten`] and by
//! [`crate::model::get_field_from_model`].

use crate::error::CompileError;

/// A single SQL identifier, always rendered double-quoted.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ident(String);

impl Ident {
    /// Validate and wrap a raw identifier.
    pub fn new(name: impl Into<String>) -> Result<Self, CompileError> {
        let name = name.into();
        if name.is_empty() {
            return Err(CompileError::invalid_model_value("identifier cannot be empty"));
        }
        if name.contains('\0') {
            return Err(CompileError::invalid_model_value(
                "identifier cannot contain a NUL character",
            ));
        }
        if name.contains('"') {
            return Err(CompileError::invalid_model_value(format!(
                "identifier cannot contain a double quote: {name}"
            )));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Render as `"name"`.
    pub fn to_sql(&self) -> String {
        let mut out = String::with_capacity(self.0.len() + 2);
        self.write_sql(&mut out);
        out
    }

    pub(crate) fn write_sql(&self, out: &mut String) {
        out.push('"');
        out.push_str(&self.0);
        out.push('"');
    }
}

impl std::fmt::Display for Ident {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_sql())
    }
}

/// Convert an input into an [`Ident`], for builder ergonomics.
pub trait IntoIdent {
    fn into_ident(self) -> Result<Ident, CompileError>;
}

impl IntoIdent for Ident {
    fn into_ident(self) -> Result<Ident, CompileError> {
        Ok(self)
    }
}

impl IntoIdent for &Ident {
    fn into_ident(self) -> Result<Ident, CompileError> {
        Ok(self.clone())
    }
}

impl IntoIdent for &str {
    fn into_ident(self) -> Result<Ident, CompileError> {
        Ident::new(self)
    }
}

impl IntoIdent for String {
    fn into_ident(self) -> Result<Ident, CompileError> {
        Ident::new(self)
    }
}

/// Quote an identifier with an explicit table-alias prefix: `alias."name"`.
///
/// `alias` is assumed already safe (it is either a model's own table alias,
/// derived internally, or a literal like `OLD`/`NEW`) and is not re-quoted.
pub fn qualified(alias: &str, name: &str) -> Result<String, CompileError> {
    let ident = Ident::new(name)?;
    if alias.is_empty() {
        Ok(ident.to_sql())
    } else {
        Ok(format!("{alias}.{}", ident.to_sql()))
    }
}
