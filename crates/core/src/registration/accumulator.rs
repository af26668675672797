use crate::bootstrap::RegistrationTask;
use crate::errors::CoreError;
use crate::registration::{
    CollectionTypeRegistration, Lifetime, ModuleRegistration, TypeRegistration,
};
use std::any::TypeId;
use std::collections::HashMap;

/// Flattened type registrations gathered from every source, in arrival order
#[derive(Debug, Clone, Default)]
pub struct RegistrationSet {
    types: Vec<TypeRegistration>,
}

impl RegistrationSet {
    /// Create an empty registration set
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a single type registration
    pub fn add_type(&mut self, registration: TypeRegistration) -> &mut Self {
        self.types.push(registration);
        self
    }

    /// Append type registrations
    pub fn extend_types<I>(&mut self, registrations: I) -> &mut Self
    where
        I: IntoIterator<Item = TypeRegistration>,
    {
        self.types.extend(registrations);
        self
    }

    /// Append the expansion of a collection registration
    pub fn add_collection(&mut self, collection: &CollectionTypeRegistration) -> &mut Self {
        self.types.extend(collection.expand());
        self
    }

    /// Append the expansion of a module registration
    pub fn add_module(&mut self, module: &ModuleRegistration) -> &mut Self {
        self.types.extend(module.expand());
        self
    }

    /// Append the type and collection contributions of a registration task
    pub fn absorb_task(&mut self, task: &dyn RegistrationTask) -> &mut Self {
        self.extend_types(task.type_registrations());
        for collection in task.collection_registrations() {
            self.add_collection(&collection);
        }
        self
    }

    /// All flattened registrations
    pub fn types(&self) -> &[TypeRegistration] {
        &self.types
    }

    /// Number of flattened registrations
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Check if nothing has been registered
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Fail if any implementation is registered with more than one lifetime
    pub fn validate_lifetimes(&self) -> Result<(), CoreError> {
        let mut seen: HashMap<TypeId, Vec<Lifetime>> = HashMap::new();
        let mut order: Vec<(TypeId, &'static str)> = Vec::new();

        for registration in &self.types {
            let implementation = registration.implementation.implementation();
            let lifetimes = seen.entry(implementation.type_id).or_insert_with(|| {
                order.push((implementation.type_id, implementation.type_name));
                Vec::new()
            });
            if !lifetimes.contains(&registration.lifetime) {
                lifetimes.push(registration.lifetime);
            }
        }

        for (type_id, type_name) in order {
            let lifetimes = &seen[&type_id];
            if lifetimes.len() > 1 {
                return Err(CoreError::ConflictingLifetime {
                    implementation: type_name.to_string(),
                    lifetimes: lifetimes
                        .iter()
                        .map(Lifetime::as_str)
                        .collect::<Vec<_>>()
                        .join(", "),
                });
            }
        }

        Ok(())
    }
}
