use crate::config::ConfigError;
use thiserror::Error;

/// Core error type for the composition engine
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Part '{implementation}' is registered with conflicting lifetimes: {lifetimes}")]
    ConflictingLifetime {
        implementation: String,
        lifetimes: String,
    },

    #[error("Invalid convention: {message}")]
    InvalidConvention { message: String },

    #[error("An instance is already registered for contract '{contract}'")]
    DuplicateInstance { contract: String },

    #[error("No export found for contract '{contract}'")]
    ExportNotFound { contract: String },

    #[error("Contract '{contract}' has {count} exports but a single export was requested")]
    AmbiguousExport { contract: String, count: usize },

    #[error("Circular dependency detected: {path} (cycle at: {cycle_part})")]
    CircularDependency { path: String, cycle_part: String },

    #[error("Part '{part}' is shared at boundary '{boundary}' but no enclosing scope carries that boundary")]
    BoundaryNotFound { part: String, boundary: String },

    #[error("Export for contract '{contract}' cannot be used as '{requested}'")]
    TypeMismatch { contract: String, requested: String },

    #[error("Something went wrong when trying to satisfy one of the dependencies of '{contract}' during composition. Make sure every dependency is registered and inspect the source error for details: {source}")]
    DependencyResolutionFailed {
        contract: String,
        source: Box<CoreError>,
    },

    #[error("Bootstrapper is not initialised. Call initialise() before {operation}")]
    NotInitialised { operation: String },

    #[error("Invalid bootstrapper state: expected {expected}, found {actual}")]
    InvalidState { expected: String, actual: String },

    #[error("Container has already been disposed")]
    ContainerDisposed,

    #[error("Disposal of '{component}' failed: {source}")]
    Disposal {
        component: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Lock error on resource: {resource}")]
    LockError { resource: String },
}

impl CoreError {
    /// Create a new invalid configuration error
    pub fn invalid_configuration(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            message: message.into(),
        }
    }

    /// Create a new invalid convention error
    pub fn invalid_convention(message: impl Into<String>) -> Self {
        Self::InvalidConvention {
            message: message.into(),
        }
    }

    /// Create a new export not found error
    pub fn export_not_found(contract: impl Into<String>) -> Self {
        Self::ExportNotFound {
            contract: contract.into(),
        }
    }

    /// Wrap a failure that happened while composing the given contract
    pub fn dependency_resolution_failed(contract: impl Into<String>, source: CoreError) -> Self {
        Self::DependencyResolutionFailed {
            contract: contract.into(),
            source: Box::new(source),
        }
    }

    /// Create a new disposal error
    pub fn disposal(
        component: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Disposal {
            component: component.into(),
            source: source.into(),
        }
    }

    /// Create a new lock error
    pub fn lock(resource: impl Into<String>) -> Self {
        Self::LockError {
            resource: resource.into(),
        }
    }

    /// Check if the error comes from configuration or registration checks
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::InvalidConfiguration { .. }
                | Self::Configuration(_)
                | Self::ConflictingLifetime { .. }
                | Self::InvalidConvention { .. }
                | Self::DuplicateInstance { .. }
        )
    }

    /// Check if the error happened while resolving an export
    pub fn is_resolution(&self) -> bool {
        matches!(
            self,
            Self::ExportNotFound { .. }
                | Self::AmbiguousExport { .. }
                | Self::CircularDependency { .. }
                | Self::BoundaryNotFound { .. }
                | Self::TypeMismatch { .. }
                | Self::DependencyResolutionFailed { .. }
        )
    }

    /// Check if the error is caused by calling operations in the wrong order
    pub fn is_sequencing(&self) -> bool {
        matches!(self, Self::NotInitialised { .. } | Self::InvalidState { .. })
    }

    /// Check if the error only reports that the container is already gone
    pub fn is_container_disposed(&self) -> bool {
        matches!(self, Self::ContainerDisposed)
    }

    /// Innermost error of a chain of dependency resolution failures
    pub fn root_cause(&self) -> &CoreError {
        match self {
            Self::DependencyResolutionFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }
}
