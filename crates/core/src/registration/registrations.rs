use crate::bootstrap::RequestModule;
use crate::container::{export_of, ErasedExport, Part, PartDescriptor};
use crate::registration::{ContractId, Lifetime};
use std::sync::Arc;

/// Binds a contract to an implementation part with a lifetime
#[derive(Clone)]
pub struct TypeRegistration {
    pub contract: ContractId,
    pub implementation: Arc<PartDescriptor>,
    pub lifetime: Lifetime,
}

impl TypeRegistration {
    /// Register `T` as the implementation of contract `C`
    pub fn new<C: ?Sized + 'static, T: Part>(lifetime: Lifetime) -> Self {
        Self {
            contract: ContractId::of::<C>(),
            implementation: Arc::new(PartDescriptor::of::<T>()),
            lifetime,
        }
    }

    /// Register `T` under its own type
    pub fn as_self<T: Part>(lifetime: Lifetime) -> Self {
        Self::new::<T, T>(lifetime)
    }

    /// Create a registration from already built parts
    pub fn from_parts(
        contract: ContractId,
        implementation: Arc<PartDescriptor>,
        lifetime: Lifetime,
    ) -> Self {
        Self {
            contract,
            implementation,
            lifetime,
        }
    }

    /// Register `T` as a transient implementation of `C`
    pub fn transient<C: ?Sized + 'static, T: Part>() -> Self {
        Self::new::<C, T>(Lifetime::Transient)
    }

    /// Register `T` as a singleton implementation of `C`
    pub fn singleton<C: ?Sized + 'static, T: Part>() -> Self {
        Self::new::<C, T>(Lifetime::Singleton)
    }

    /// Register `T` as a per-request implementation of `C`
    pub fn per_request<C: ?Sized + 'static, T: Part>() -> Self {
        Self::new::<C, T>(Lifetime::PerRequest)
    }

    /// Check if the registration exports the implementation as itself
    pub fn is_self_registration(&self) -> bool {
        self.contract.type_id == self.implementation.implementation().type_id
    }
}

impl std::fmt::Debug for TypeRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeRegistration")
            .field("contract", &self.contract.type_name)
            .field("implementation", &self.implementation.type_name())
            .field("lifetime", &self.lifetime)
            .finish()
    }
}

/// Ordered set of implementations exported under one contract
#[derive(Clone)]
pub struct CollectionTypeRegistration {
    pub contract: ContractId,
    pub implementations: Vec<Arc<PartDescriptor>>,
    pub lifetime: Lifetime,
}

impl CollectionTypeRegistration {
    /// Create an empty collection for contract `C`
    pub fn new<C: ?Sized + 'static>(lifetime: Lifetime) -> Self {
        Self::from_parts(ContractId::of::<C>(), Vec::new(), lifetime)
    }

    /// Create a collection from already built parts
    pub fn from_parts(
        contract: ContractId,
        implementations: Vec<Arc<PartDescriptor>>,
        lifetime: Lifetime,
    ) -> Self {
        Self {
            contract,
            implementations,
            lifetime,
        }
    }

    /// Append the part `T` to the collection
    pub fn with<T: Part>(mut self) -> Self {
        self.implementations.push(Arc::new(PartDescriptor::of::<T>()));
        self
    }

    /// Number of implementations in the collection
    pub fn len(&self) -> usize {
        self.implementations.len()
    }

    /// Check if the collection has no implementations
    pub fn is_empty(&self) -> bool {
        self.implementations.is_empty()
    }

    /// One type registration per implementation, in order
    pub fn expand(&self) -> Vec<TypeRegistration> {
        self.implementations
            .iter()
            .map(|implementation| {
                TypeRegistration::from_parts(
                    self.contract.clone(),
                    implementation.clone(),
                    self.lifetime,
                )
            })
            .collect()
    }
}

impl std::fmt::Debug for CollectionTypeRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionTypeRegistration")
            .field("contract", &self.contract.type_name)
            .field(
                "implementations",
                &self
                    .implementations
                    .iter()
                    .map(|implementation| implementation.type_name())
                    .collect::<Vec<_>>(),
            )
            .field("lifetime", &self.lifetime)
            .finish()
    }
}

/// A pre-built instance exported under a contract
#[derive(Clone)]
pub struct InstanceRegistration {
    pub contract: ContractId,
    instance: ErasedExport,
}

impl InstanceRegistration {
    /// Register `instance` as the export of contract `C`
    pub fn new<C: ?Sized + Send + Sync + 'static>(instance: Arc<C>) -> Self {
        Self {
            contract: ContractId::of::<C>(),
            instance: export_of(instance),
        }
    }

    /// Type-erased instance
    pub fn instance(&self) -> &ErasedExport {
        &self.instance
    }

    /// Read the instance back as contract `C`
    pub fn get<C: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<C>> {
        self.instance.downcast_ref::<Arc<C>>().cloned()
    }
}

impl std::fmt::Debug for InstanceRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstanceRegistration")
            .field("contract", &self.contract.type_name)
            .finish()
    }
}

/// A request module registered explicitly; always per request
#[derive(Clone)]
pub struct ModuleRegistration {
    pub module: Arc<PartDescriptor>,
}

impl ModuleRegistration {
    /// Register the module type `M`
    pub fn new<M: Part>() -> Self {
        Self {
            module: Arc::new(PartDescriptor::of::<M>()),
        }
    }

    /// Registrations exporting the module as itself and as `dyn RequestModule`
    pub fn expand(&self) -> Vec<TypeRegistration> {
        vec![
            TypeRegistration::from_parts(
                self.module.implementation().clone(),
                self.module.clone(),
                Lifetime::PerRequest,
            ),
            TypeRegistration::from_parts(
                ContractId::of::<dyn RequestModule>(),
                self.module.clone(),
                Lifetime::PerRequest,
            ),
        ]
    }
}

impl std::fmt::Debug for ModuleRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleRegistration")
            .field("module", &self.module.type_name())
            .finish()
    }
}
