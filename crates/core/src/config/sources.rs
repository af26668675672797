/// Format of a settings document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentFormat {
    Yaml,
    Json,
}

impl DocumentFormat {
    /// Lowercase format name
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentFormat::Yaml => "yaml",
            DocumentFormat::Json => "json",
        }
    }
}

/// Provenance of one bootstrap setting.
///
/// Resolved per field: an environment override wins, then the built-in
/// default, then the document the settings were parsed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Built-in default
    Default,
    /// `BOOTWIRE_*` variable present in the environment
    Environment(&'static str),
    /// Parsed from a settings document
    Document(DocumentFormat),
    /// Set through the builder methods
    Programmatic,
}

impl ConfigSource {
    /// Check if the value came from the environment
    pub fn is_environment(&self) -> bool {
        matches!(self, ConfigSource::Environment(_))
    }

    /// Check if the built-in default is in effect
    pub fn is_default(&self) -> bool {
        matches!(self, ConfigSource::Default)
    }

    /// Check if the value came from a settings document
    pub fn is_document(&self) -> bool {
        matches!(self, ConfigSource::Document(_))
    }
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Default => write!(f, "default"),
            ConfigSource::Environment(variable) => write!(f, "environment ({})", variable),
            ConfigSource::Document(format) => write!(f, "{} document", format.as_str()),
            ConfigSource::Programmatic => write!(f, "programmatic"),
        }
    }
}
