use crate::config::ConfigError;
use serde::{Deserialize, Serialize};

/// How long a composed part instance lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Lifetime {
    /// New instance for every resolution
    Transient,
    /// Single instance shared across the application
    Singleton,
    /// Single instance per request scope
    #[serde(alias = "perrequest", alias = "scoped")]
    PerRequest,
}

impl Lifetime {
    /// Check if the lifetime is transient
    pub fn is_transient(&self) -> bool {
        matches!(self, Lifetime::Transient)
    }

    /// Check if the lifetime is singleton
    pub fn is_singleton(&self) -> bool {
        matches!(self, Lifetime::Singleton)
    }

    /// Check if the lifetime is per request
    pub fn is_per_request(&self) -> bool {
        matches!(self, Lifetime::PerRequest)
    }

    /// Get the lifetime name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            Lifetime::Transient => "transient",
            Lifetime::Singleton => "singleton",
            Lifetime::PerRequest => "per-request",
        }
    }
}

impl Default for Lifetime {
    fn default() -> Self {
        Lifetime::Singleton
    }
}

impl std::fmt::Display for Lifetime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Lifetime {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "transient" => Ok(Lifetime::Transient),
            "singleton" => Ok(Lifetime::Singleton),
            "per-request" | "perrequest" | "per_request" | "scoped" => Ok(Lifetime::PerRequest),
            _ => Err(ConfigError::invalid_value(
                "lifetime",
                s,
                "transient, singleton, or per-request",
            )),
        }
    }
}
