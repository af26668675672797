use crate::container::{export_of, ErasedExport};
use crate::errors::CoreError;
use crate::registration::{ContractId, InstanceRegistration};
use std::collections::HashMap;
use std::sync::Arc;

/// Supplies exports that do not come from parts
pub trait ExportProvider: Send + Sync {
    /// Name used in logs and statistics
    fn name(&self) -> &str;

    /// Export for `contract`, or `None` to decline
    fn get_export(&self, contract: &ContractId) -> Option<ErasedExport>;
}

/// Export provider over pre-built instances, one per contract
#[derive(Clone, Default)]
pub struct InstanceExportProvider {
    instances: HashMap<ContractId, ErasedExport>,
    order: Vec<ContractId>,
}

impl InstanceExportProvider {
    /// Create a new, empty provider
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a provider holding the given registrations
    pub fn from_registrations<I>(registrations: I) -> Result<Self, CoreError>
    where
        I: IntoIterator<Item = InstanceRegistration>,
    {
        let mut provider = Self::new();
        for registration in registrations {
            provider.register(registration)?;
        }
        Ok(provider)
    }

    /// Add an instance registration
    pub fn register(&mut self, registration: InstanceRegistration) -> Result<(), CoreError> {
        let contract = registration.contract.clone();
        self.insert(contract, registration.instance().clone())
    }

    /// Register `instance` as the export of contract `C`
    pub fn register_export<C: ?Sized + Send + Sync + 'static>(
        &mut self,
        instance: Arc<C>,
    ) -> Result<(), CoreError> {
        self.insert(ContractId::of::<C>(), export_of(instance))
    }

    fn insert(&mut self, contract: ContractId, export: ErasedExport) -> Result<(), CoreError> {
        if self.instances.contains_key(&contract) {
            return Err(CoreError::DuplicateInstance {
                contract: contract.to_string(),
            });
        }

        tracing::debug!("Registered instance for contract '{}'", contract);
        self.order.push(contract.clone());
        self.instances.insert(contract, export);
        Ok(())
    }

    /// Check if an instance is registered for `contract`
    pub fn contains(&self, contract: &ContractId) -> bool {
        self.instances.contains_key(contract)
    }

    /// Registered contracts, in registration order
    pub fn contracts(&self) -> &[ContractId] {
        &self.order
    }

    /// Number of registered instances
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    /// Check if no instance is registered
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

impl ExportProvider for InstanceExportProvider {
    fn name(&self) -> &str {
        "instances"
    }

    fn get_export(&self, contract: &ContractId) -> Option<ErasedExport> {
        self.instances.get(contract).cloned()
    }
}

impl std::fmt::Debug for InstanceExportProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstanceExportProvider")
            .field(
                "contracts",
                &self.order.iter().map(|contract| contract.type_name).collect::<Vec<_>>(),
            )
            .finish()
    }
}
