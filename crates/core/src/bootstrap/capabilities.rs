//! Capabilities the bootstrapper resolves from the container.
//!
//! Applications implement these traits on their parts and export them under
//! the matching trait object contract.

use crate::bootstrap::{Pipelines, RequestContext, RequestPipelinesFactory};
use crate::errors::CoreError;
use crate::registration::{
    CollectionTypeRegistration, ContractId, InstanceRegistration, TypeRegistration,
};
use std::sync::Arc;

/// Request processing engine handed out by the bootstrapper
pub trait Engine: Send + Sync {
    /// Receive the factory that builds the pipelines of each request
    fn set_request_pipelines_factory(&self, factory: RequestPipelinesFactory);
}

impl std::fmt::Debug for dyn Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine").finish_non_exhaustive()
    }
}

/// Unit of request handling, composed per request
pub trait RequestModule: Send + Sync {
    /// Path prefix the module serves
    fn module_path(&self) -> &str {
        "/"
    }

    /// Module name, the implementation's type name by default
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Lookup of request modules within a request
pub trait ModuleCatalog: Send + Sync {
    /// Every request module, composed in the scope of `context`
    fn get_all_modules(
        &self,
        context: &RequestContext,
    ) -> Result<Vec<Arc<dyn RequestModule>>, CoreError>;

    /// The module exported as `contract`, composed in the scope of `context`
    fn get_module_by_id(
        &self,
        contract: &ContractId,
        context: &RequestContext,
    ) -> Result<Arc<dyn RequestModule>, CoreError>;
}

/// Runs once after the application container is built
pub trait ApplicationStartup: Send + Sync {
    /// Add application-wide hooks
    fn initialize(&self, pipelines: &mut Pipelines) -> Result<(), CoreError>;
}

/// Runs for every request while its pipelines are built
pub trait RequestStartup: Send + Sync {
    /// Add hooks for this request only
    fn initialize(&self, pipelines: &mut Pipelines, context: &RequestContext)
        -> Result<(), CoreError>;
}

/// Contributes registrations discovered at bootstrap time
pub trait RegistrationTask: Send + Sync {
    /// Type registrations to add
    fn type_registrations(&self) -> Vec<TypeRegistration> {
        Vec::new()
    }

    /// Collection registrations to add
    fn collection_registrations(&self) -> Vec<CollectionTypeRegistration> {
        Vec::new()
    }

    /// Instance registrations to add
    fn instance_registrations(&self) -> Vec<InstanceRegistration> {
        Vec::new()
    }
}

/// Diagnostics hooked into the application pipelines
pub trait Diagnostics: Send + Sync {
    /// Add diagnostic hooks
    fn initialize(&self, pipelines: &mut Pipelines) -> Result<(), CoreError>;
}
