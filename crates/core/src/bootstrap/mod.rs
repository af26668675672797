//! Bootstrapping of the application container.
//!
//! The [`Bootstrapper`] turns an [`InternalConfiguration`] plus the
//! customizations of a [`BootstrapperHooks`] implementation into a composed
//! application container, and hands out the engine and per-request modules.

pub mod bootstrapper;
pub mod capabilities;
pub mod configuration;
pub mod diagnostics;
pub mod hooks;
pub mod pipelines;
pub mod request;

pub use bootstrapper::{BootstrapState, BootstrapStats, Bootstrapper};
pub use capabilities::{
    ApplicationStartup, Diagnostics, Engine, ModuleCatalog, RegistrationTask, RequestModule,
    RequestStartup,
};
pub use configuration::InternalConfiguration;
pub use diagnostics::{DefaultDiagnostics, DiagnosticsModule};
pub use hooks::BootstrapperHooks;
pub use pipelines::{PipelineHook, Pipelines, RequestPipelinesFactory};
pub use request::{RequestContext, RequestId};
