use crate::bootstrap::{DefaultDiagnostics, Diagnostics, Engine};
use crate::container::{Part, PartDescriptor};
use crate::registration::{
    CollectionTypeRegistration, ContractId, InstanceRegistration, Lifetime, ModuleRegistration,
    TypeRegistration,
};
use std::sync::Arc;

/// Registrations the bootstrapper cannot run without, plus framework defaults
#[derive(Debug, Clone)]
pub struct InternalConfiguration {
    type_registrations: Vec<TypeRegistration>,
    collection_registrations: Vec<CollectionTypeRegistration>,
    instance_registrations: Vec<InstanceRegistration>,
    module_registrations: Vec<ModuleRegistration>,
    diagnostics: Option<Arc<PartDescriptor>>,
}

impl InternalConfiguration {
    /// Create a configuration with the default diagnostics and nothing else
    pub fn new() -> Self {
        Self {
            type_registrations: Vec::new(),
            collection_registrations: Vec::new(),
            instance_registrations: Vec::new(),
            module_registrations: Vec::new(),
            diagnostics: Some(Arc::new(PartDescriptor::of::<DefaultDiagnostics>())),
        }
    }

    /// Register `E` as the singleton engine
    pub fn with_engine<E: Part>(self) -> Self {
        self.with_type(TypeRegistration::singleton::<dyn Engine, E>())
    }

    /// Add a type registration
    pub fn with_type(mut self, registration: TypeRegistration) -> Self {
        self.type_registrations.push(registration);
        self
    }

    /// Add a collection registration
    pub fn with_collection(mut self, registration: CollectionTypeRegistration) -> Self {
        self.collection_registrations.push(registration);
        self
    }

    /// Add an instance registration
    pub fn with_instance(mut self, registration: InstanceRegistration) -> Self {
        self.instance_registrations.push(registration);
        self
    }

    /// Register the request module `M`
    pub fn with_module<M: Part>(mut self) -> Self {
        self.module_registrations.push(ModuleRegistration::new::<M>());
        self
    }

    /// Replace the default diagnostics with `D`
    pub fn with_diagnostics<D: Part>(mut self) -> Self {
        self.diagnostics = Some(Arc::new(PartDescriptor::of::<D>()));
        self
    }

    /// Register no diagnostics at all
    pub fn without_diagnostics(mut self) -> Self {
        self.diagnostics = None;
        self
    }

    /// Type registrations
    pub fn type_registrations(&self) -> &[TypeRegistration] {
        &self.type_registrations
    }

    /// Collection registrations
    pub fn collection_registrations(&self) -> &[CollectionTypeRegistration] {
        &self.collection_registrations
    }

    /// Instance registrations
    pub fn instance_registrations(&self) -> &[InstanceRegistration] {
        &self.instance_registrations
    }

    /// Module registrations
    pub fn module_registrations(&self) -> &[ModuleRegistration] {
        &self.module_registrations
    }

    /// Singleton registration of the diagnostics, if any
    pub fn diagnostics_registration(&self) -> Option<TypeRegistration> {
        self.diagnostics.as_ref().map(|diagnostics| {
            TypeRegistration::from_parts(
                ContractId::of::<dyn Diagnostics>(),
                diagnostics.clone(),
                Lifetime::Singleton,
            )
        })
    }

    /// Mandatory contracts nothing is registered for
    pub fn missing_exports(&self) -> Vec<&'static str> {
        let mandatory = [ContractId::of::<dyn Engine>()];

        mandatory
            .into_iter()
            .filter(|contract| {
                !self
                    .type_registrations
                    .iter()
                    .any(|registration| &registration.contract == contract)
                    && !self
                        .instance_registrations
                        .iter()
                        .any(|registration| &registration.contract == contract)
            })
            .map(|contract| contract.type_name)
            .collect()
    }

    /// Check if every mandatory contract is registered
    pub fn is_valid(&self) -> bool {
        self.missing_exports().is_empty()
    }
}

impl Default for InternalConfiguration {
    fn default() -> Self {
        Self::new()
    }
}
