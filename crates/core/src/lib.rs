//! Dependency composition engine for request-driven web frameworks.
//!
//! Parts are composed by an application container built from explicit
//! registrations, discovered registration tasks and naming conventions.
//! Every request gets a child scope in which per-request parts are shared.

pub mod bootstrap;
pub mod config;
pub mod container;
pub mod errors;
pub mod registration;

pub use bootstrap::{
    ApplicationStartup, BootstrapState, Bootstrapper, BootstrapperHooks, Engine,
    InternalConfiguration, ModuleCatalog, Pipelines, RegistrationTask, RequestContext, RequestId,
    RequestModule, RequestStartup,
};
pub use config::{BootstrapSettings, ConfigError, SettingsTrait};
pub use container::{
    CompositionContext, Container, ContainerFactory, ContractSet, Disposable, Part,
    PartDescriptor, ScopeFactory, StaticTypeSource, TypeSource,
};
pub use errors::CoreError;
pub use registration::{
    CollectionTypeRegistration, ContractId, InstanceRegistration, Lifetime, ModuleRegistration,
    TypeRegistration,
};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get library version
pub fn version() -> &'static str {
    VERSION
}
