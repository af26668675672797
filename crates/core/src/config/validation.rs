use thiserror::Error;

/// Configuration error type
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required field: {field}. {hint}")]
    MissingRequired { field: String, hint: String },

    #[error("Invalid value for field '{field}': '{value}'. Expected: {expected}")]
    InvalidValue {
        field: String,
        value: String,
        expected: String,
    },

    #[error("Environment variable error: {message}")]
    EnvironmentError { message: String },

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ConfigError {
    /// Create a missing required field error
    pub fn missing_required(field: impl Into<String>, hint: impl Into<String>) -> Self {
        Self::MissingRequired {
            field: field.into(),
            hint: hint.into(),
        }
    }

    /// Create an invalid value error
    pub fn invalid_value(
        field: impl Into<String>,
        value: impl Into<String>,
        expected: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            field: field.into(),
            value: value.into(),
            expected: expected.into(),
        }
    }

    /// Create an environment error
    pub fn environment_error(message: impl Into<String>) -> Self {
        Self::EnvironmentError {
            message: message.into(),
        }
    }
}

/// Trait for validating configuration values
pub trait ConfigValidator<T: ?Sized> {
    /// Validate a configuration value
    fn validate(&self, value: &T) -> Result<(), ConfigError>;
}

/// Validator for sharing boundary names
pub struct BoundaryNameValidator {
    pub field: &'static str,
}

impl Default for BoundaryNameValidator {
    fn default() -> Self {
        Self {
            field: "per_request_boundary",
        }
    }
}

impl ConfigValidator<str> for BoundaryNameValidator {
    fn validate(&self, value: &str) -> Result<(), ConfigError> {
        if value.trim().is_empty() {
            return Err(ConfigError::invalid_value(
                self.field,
                value,
                "a non-empty boundary name",
            ));
        }

        if value.chars().any(char::is_whitespace) {
            return Err(ConfigError::invalid_value(
                self.field,
                value,
                "a boundary name without whitespace",
            ));
        }

        Ok(())
    }
}

/// Validator for crate origins treated as internal
pub struct OriginValidator;

impl ConfigValidator<[String]> for OriginValidator {
    fn validate(&self, value: &[String]) -> Result<(), ConfigError> {
        for origin in value {
            if origin.is_empty() || origin.contains("::") {
                return Err(ConfigError::invalid_value(
                    "internal_origins",
                    origin.as_str(),
                    "a crate name without path separators",
                ));
            }
        }
        Ok(())
    }
}
