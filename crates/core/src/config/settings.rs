use crate::config::{
    BoundaryNameValidator, ConfigError, ConfigSource, ConfigValidator, DocumentFormat,
    OriginValidator,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;

/// Name of the sharing boundary carried by request scopes unless configured otherwise
pub const DEFAULT_PER_REQUEST_BOUNDARY: &str = "PerRequest";

const ENV_PER_REQUEST_BOUNDARY: &str = "BOOTWIRE_PER_REQUEST_BOUNDARY";
const ENV_DIAGNOSTICS: &str = "BOOTWIRE_DIAGNOSTICS";
const ENV_REGISTRATION_TASKS: &str = "BOOTWIRE_REGISTRATION_TASKS";
const ENV_INTERNAL_ORIGINS: &str = "BOOTWIRE_INTERNAL_ORIGINS";

/// Loading contract shared by settings types
pub trait SettingsTrait: Sized {
    /// Load settings from environment variables
    fn from_env() -> Result<Self, ConfigError>;

    /// Validate the settings
    fn validate(&self) -> Result<(), ConfigError>;

    /// Get configuration source information for debugging
    fn config_sources(&self) -> HashMap<String, ConfigSource>;
}

/// Tunables of the bootstrapper
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapSettings {
    /// Boundary name carried by request scopes
    pub per_request_boundary: String,
    /// Resolve and initialize `dyn Diagnostics` during initialise
    pub diagnostics_enabled: bool,
    /// Run the temporary container pass that discovers registration tasks
    pub registration_tasks_enabled: bool,
    /// Extra crate names whose parts are never picked up by the module convention
    pub internal_origins: Vec<String>,
    /// Document format these settings were parsed from
    #[serde(skip)]
    document: Option<DocumentFormat>,
}

impl BootstrapSettings {
    /// Create settings with default values
    pub fn new() -> Self {
        Self {
            per_request_boundary: DEFAULT_PER_REQUEST_BOUNDARY.to_string(),
            diagnostics_enabled: true,
            registration_tasks_enabled: true,
            internal_origins: Vec::new(),
            document: None,
        }
    }

    /// Parse and validate settings from a YAML document
    pub fn from_yaml_str(document: &str) -> Result<Self, ConfigError> {
        let mut settings: Self = serde_yaml::from_str(document)?;
        settings.document = Some(DocumentFormat::Yaml);
        settings.validate()?;
        Ok(settings)
    }

    /// Parse and validate settings from a JSON document
    pub fn from_json_str(document: &str) -> Result<Self, ConfigError> {
        let mut settings: Self = serde_json::from_str(document)?;
        settings.document = Some(DocumentFormat::Json);
        settings.validate()?;
        Ok(settings)
    }

    /// Format of the document these settings were parsed from, if any
    pub fn document_format(&self) -> Option<DocumentFormat> {
        self.document
    }

    /// Use a different boundary name for request scopes
    pub fn with_per_request_boundary(mut self, boundary: impl Into<String>) -> Self {
        self.per_request_boundary = boundary.into();
        self
    }

    /// Toggle diagnostics initialization
    pub fn with_diagnostics(mut self, enabled: bool) -> Self {
        self.diagnostics_enabled = enabled;
        self
    }

    /// Toggle registration task discovery
    pub fn with_registration_tasks(mut self, enabled: bool) -> Self {
        self.registration_tasks_enabled = enabled;
        self
    }

    /// Treat another crate as internal
    pub fn with_internal_origin(mut self, origin: impl Into<String>) -> Self {
        self.internal_origins.push(origin.into());
        self
    }
}

impl Default for BootstrapSettings {
    fn default() -> Self {
        Self::new()
    }
}

impl SettingsTrait for BootstrapSettings {
    fn from_env() -> Result<Self, ConfigError> {
        let mut settings = Self::new();

        if let Some(boundary) = read_env(ENV_PER_REQUEST_BOUNDARY)? {
            settings.per_request_boundary = boundary;
        }

        if let Some(value) = read_env(ENV_DIAGNOSTICS)? {
            settings.diagnostics_enabled = parse_flag("diagnostics_enabled", &value)?;
        }

        if let Some(value) = read_env(ENV_REGISTRATION_TASKS)? {
            settings.registration_tasks_enabled = parse_flag("registration_tasks_enabled", &value)?;
        }

        if let Some(value) = read_env(ENV_INTERNAL_ORIGINS)? {
            settings.internal_origins = value
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(str::to_string)
                .collect();
        }

        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        BoundaryNameValidator::default().validate(self.per_request_boundary.as_str())?;
        OriginValidator.validate(self.internal_origins.as_slice())?;
        Ok(())
    }

    fn config_sources(&self) -> HashMap<String, ConfigSource> {
        let defaults = Self::new();
        let mut sources = HashMap::new();

        let entries = [
            (
                "per_request_boundary",
                ENV_PER_REQUEST_BOUNDARY,
                self.per_request_boundary == defaults.per_request_boundary,
            ),
            (
                "diagnostics_enabled",
                ENV_DIAGNOSTICS,
                self.diagnostics_enabled == defaults.diagnostics_enabled,
            ),
            (
                "registration_tasks_enabled",
                ENV_REGISTRATION_TASKS,
                self.registration_tasks_enabled == defaults.registration_tasks_enabled,
            ),
            (
                "internal_origins",
                ENV_INTERNAL_ORIGINS,
                self.internal_origins.is_empty(),
            ),
        ];

        for (field, variable, is_default) in entries {
            let source = if env::var(variable).is_ok() {
                ConfigSource::Environment(variable)
            } else if is_default {
                ConfigSource::Default
            } else if let Some(format) = self.document {
                ConfigSource::Document(format)
            } else {
                ConfigSource::Programmatic
            };
            sources.insert(field.to_string(), source);
        }

        sources
    }
}

fn read_env(variable: &str) -> Result<Option<String>, ConfigError> {
    match env::var(variable) {
        Ok(value) => Ok(Some(value)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(env::VarError::NotUnicode(_)) => Err(ConfigError::environment_error(format!(
            "{} is not valid unicode",
            variable
        ))),
    }
}

fn parse_flag(field: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::invalid_value(field, value, "true or false")),
    }
}
