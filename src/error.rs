//! Error types for the query compiler.
//!
//! All compiler failures share one taxonomy: a [`CompileError`] variant per
//! machine-readable `code` from the specification, each carrying whatever
//! field/query context was available at the point of failure. The compiler
//! never recovers locally from an invalid construction — it surfaces the
//! error and stops.

use thiserror::Error;

/// Result type alias for compiler operations.
pub type CompileResult<T> = Result<T, CompileError>;

/// Errors produced while compiling a query batch or reshaping results.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CompileError {
    #[error("model not found: {slug}")]
    ModelNotFound { slug: String },

    #[error("field not found: {field} on model {model}")]
    FieldNotFound { model: String, field: String },

    #[error("preset not found: {slug} on model {model}")]
    PresetNotFound { model: String, slug: String },

    #[error("invalid `to` value: {message}")]
    InvalidToValue { message: String },

    #[error("invalid `with` value: {message}")]
    InvalidWithValue { message: String },

    #[error("invalid model value: {message}")]
    InvalidModelValue { message: String },

    #[error("`before`/`after` instruction is invalid here: {message}")]
    InvalidBeforeOrAfterInstruction { message: String },

    #[error("mutually exclusive instructions: {a} and {b}")]
    MutuallyExclusiveInstructions { a: String, b: String },

    #[error("missing instruction: {message}")]
    MissingInstruction { message: String },

    #[error("missing field: {field}")]
    MissingField { field: String },

    #[error("model entity already exists: {kind} {slug} on {model}")]
    ExistingModelEntity {
        model: String,
        kind: String,
        slug: String,
    },

    #[error("required model entity cannot be removed: {slug} on {model}")]
    RequiredModelEntity { model: String, slug: String },

    #[error("index not found: {slug} on {model}")]
    IndexNotFound { model: String, slug: String },

    #[error("trigger not found: {slug} on {model}")]
    TriggerNotFound { model: String, slug: String },
}

impl CompileError {
    /// The stable, machine-readable discriminant for this error.
    pub fn code(&self) -> &'static str {
        match self {
            CompileError::ModelNotFound { .. } => "MODEL_NOT_FOUND",
            CompileError::FieldNotFound { .. } => "FIELD_NOT_FOUND",
            CompileError::PresetNotFound { .. } => "PRESET_NOT_FOUND",
            CompileError::InvalidToValue { .. } => "INVALID_TO_VALUE",
            CompileError::InvalidWithValue { .. } => "INVALID_WITH_VALUE",
            CompileError::InvalidModelValue { .. } => "INVALID_MODEL_VALUE",
            CompileError::InvalidBeforeOrAfterInstruction { .. } => {
                "INVALID_BEFORE_OR_AFTER_INSTRUCTION"
            }
            CompileError::MutuallyExclusiveInstructions { .. } => {
                "MUTUALLY_EXCLUSIVE_INSTRUCTIONS"
            }
            CompileError::MissingInstruction { .. } => "MISSING_INSTRUCTION",
            CompileError::MissingField { .. } => "MISSING_FIELD",
            CompileError::ExistingModelEntity { .. } => "EXISTING_MODEL_ENTITY",
            CompileError::RequiredModelEntity { .. } => "REQUIRED_MODEL_ENTITY",
            CompileError::IndexNotFound { .. } => "INDEX_NOT_FOUND",
            CompileError::TriggerNotFound { .. } => "TRIGGER_NOT_FOUND",
        }
    }

    pub fn model_not_found(slug: impl Into<String>) -> Self {
        Self::ModelNotFound { slug: slug.into() }
    }

    pub fn field_not_found(model: impl Into<String>, field: impl Into<String>) -> Self {
        Self::FieldNotFound {
            model: model.into(),
            field: field.into(),
        }
    }

    pub fn preset_not_found(model: impl Into<String>, slug: impl Into<String>) -> Self {
        Self::PresetNotFound {
            model: model.into(),
            slug: slug.into(),
        }
    }

    pub fn invalid_to_value(message: impl Into<String>) -> Self {
        Self::InvalidToValue {
            message: message.into(),
        }
    }

    pub fn invalid_with_value(message: impl Into<String>) -> Self {
        Self::InvalidWithValue {
            message: message.into(),
        }
    }

    pub fn invalid_model_value(message: impl Into<String>) -> Self {
        Self::InvalidModelValue {
            message: message.into(),
        }
    }

    pub fn invalid_before_or_after(message: impl Into<String>) -> Self {
        Self::InvalidBeforeOrAfterInstruction {
            message: message.into(),
        }
    }

    pub fn mutually_exclusive(a: impl Into<String>, b: impl Into<String>) -> Self {
        Self::MutuallyExclusiveInstructions {
            a: a.into(),
            b: b.into(),
        }
    }

    pub fn missing_instruction(message: impl Into<String>) -> Self {
        Self::MissingInstruction {
            message: message.into(),
        }
    }

    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    pub fn existing_model_entity(
        model: impl Into<String>,
        kind: impl Into<String>,
        slug: impl Into<String>,
    ) -> Self {
        Self::ExistingModelEntity {
            model: model.into(),
            kind: kind.into(),
            slug: slug.into(),
        }
    }

    pub fn required_model_entity(model: impl Into<String>, slug: impl Into<String>) -> Self {
        Self::RequiredModelEntity {
            model: model.into(),
            slug: slug.into(),
        }
    }

    pub fn index_not_found(model: impl Into<String>, slug: impl Into<String>) -> Self {
        Self::IndexNotFound {
            model: model.into(),
            slug: slug.into(),
        }
    }

    pub fn trigger_not_found(model: impl Into<String>, slug: impl Into<String>) -> Self {
        Self::TriggerNotFound {
            model: model.into(),
            slug: slug.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_is_stable_per_variant() {
        assert_eq!(
            CompileError::model_not_found("account").code(),
            "MODEL_NOT_FOUND"
        );
        assert_eq!(
            CompileError::field_not_found("account", "handle").code(),
            "FIELD_NOT_FOUND"
        );
    }
}
