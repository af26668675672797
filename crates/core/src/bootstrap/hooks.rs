use crate::bootstrap::{InternalConfiguration, Pipelines, RequestContext};
use crate::config::BootstrapSettings;
use crate::container::{
    internal_origin, CatalogTypeSource, Container, ContainerFactory, Conventions,
    ConventionBuilder, ExportProvider, InstanceExportProvider, TypeScanner, TypeSource,
};
use crate::errors::CoreError;
use crate::registration::{CollectionTypeRegistration, InstanceRegistration, TypeRegistration};
use std::sync::Arc;

/// Customization points of the [`Bootstrapper`](crate::bootstrap::Bootstrapper).
///
/// Only [`internal_configuration`](Self::internal_configuration) is required;
/// every other hook has a neutral default.
pub trait BootstrapperHooks: Send + Sync + 'static {
    /// Mandatory framework registrations; `None` fails initialisation
    fn internal_configuration(&self) -> Option<InternalConfiguration>;

    /// Bootstrapper settings
    fn settings(&self) -> BootstrapSettings {
        BootstrapSettings::default()
    }

    /// Type registrations added after the configuration's
    fn additional_type_registrations(&self) -> Vec<TypeRegistration> {
        Vec::new()
    }

    /// Collections added after the startup and registration task collections
    fn application_collections(&self, _scanner: &TypeScanner) -> Vec<CollectionTypeRegistration> {
        Vec::new()
    }

    /// Instance registrations added after the configuration's
    fn instance_registrations(&self) -> Vec<InstanceRegistration> {
        Vec::new()
    }

    /// Register instances directly on the instance provider
    fn configure_instances(&self, _instances: &mut InstanceExportProvider) -> Result<(), CoreError> {
        Ok(())
    }

    /// Adjust the conventions before they are built
    fn configure_conventions(&self, _conventions: &mut ConventionBuilder) {}

    /// Sources enumerating candidate parts; defaults to the link-time
    /// [`PART_CATALOG`](crate::container::PART_CATALOG)
    fn type_sources(&self) -> Vec<Arc<dyn TypeSource>> {
        vec![Arc::new(CatalogTypeSource::new())]
    }

    /// Crates whose parts are never picked up by the module convention
    fn internal_origins(&self) -> Vec<String> {
        vec![internal_origin().to_string()]
    }

    /// Export providers consulted after the instance provider
    fn export_providers(&self) -> Vec<Arc<dyn ExportProvider>> {
        Vec::new()
    }

    /// Build the application container
    fn create_application_container(
        &self,
        conventions: &Conventions,
        sources: &[Arc<dyn TypeSource>],
        providers: Vec<Arc<dyn ExportProvider>>,
    ) -> Result<Container, CoreError> {
        ContainerFactory::create(conventions, sources, providers)
    }

    /// Runs after the application startup tasks
    fn application_startup(
        &self,
        _container: &Container,
        _pipelines: &mut Pipelines,
    ) -> Result<(), CoreError> {
        Ok(())
    }

    /// Runs after the request startup tasks of every request
    fn request_startup(
        &self,
        _container: &Container,
        _pipelines: &mut Pipelines,
        _context: &RequestContext,
    ) -> Result<(), CoreError> {
        Ok(())
    }
}
