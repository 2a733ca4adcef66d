//! Errors raised while reading and checking `applytrack*.toml` files.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// A source failed to load or the merged tree did not deserialize
    #[error("could not load configuration ({environment}): {error}")]
    LoadError { environment: String, error: String },

    #[error("{context} requires '{field}'")]
    MissingRequiredField { field: String, context: String },

    /// A value parsed but falls outside what the engine accepts
    #[error("{field} = {value} is not accepted: {context}")]
    InvalidValue {
        field: String,
        value: String,
        context: String,
    },
}

impl ConfigurationError {
    pub fn load_error<E: std::fmt::Display>(environment: &str, error: E) -> Self {
        Self::LoadError {
            environment: environment.to_string(),
            error: error.to_string(),
        }
    }

    pub fn missing_required_field<F: Into<String>, C: Into<String>>(field: F, context: C) -> Self {
        Self::MissingRequiredField {
            field: field.into(),
            context: context.into(),
        }
    }

    pub fn invalid_value<F: Into<String>, V: ToString, C: Into<String>>(
        field: F,
        value: V,
        context: C,
    ) -> Self {
        Self::InvalidValue {
            field: field.into(),
            value: value.to_string(),
            context: context.into(),
        }
    }
}

pub type ConfigResult<T> = Result<T, ConfigurationError>;
