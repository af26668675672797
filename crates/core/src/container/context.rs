use crate::container::container::{ContainerStatistics, Scope};
use crate::errors::CoreError;
use crate::registration::ContractId;
use std::sync::Arc;
use uuid::Uuid;

/// Parts currently being composed on this call chain
#[derive(Debug, Clone, Default)]
pub struct ResolutionPath {
    parts: Vec<ContractId>,
}

impl ResolutionPath {
    /// Create a new, empty resolution path
    pub fn new() -> Self {
        Self::default()
    }

    /// Path extended with another part
    pub fn with(&self, part: ContractId) -> Self {
        let mut parts = self.parts.clone();
        parts.push(part);
        Self { parts }
    }

    /// Check if the path contains a part (for cycle detection)
    pub fn contains(&self, part: &ContractId) -> bool {
        self.parts.iter().any(|existing| existing.type_id == part.type_id)
    }

    /// Number of parts on the path
    pub fn depth(&self) -> usize {
        self.parts.len()
    }

    /// Get the path as a string for error messages
    pub fn path_string(&self) -> String {
        self.parts
            .iter()
            .map(|part| part.type_name)
            .collect::<Vec<_>>()
            .join(" -> ")
    }
}

/// Resolution handle given to a part while it is being composed.
///
/// Lookups go through the scope that will own the part, so a singleton only
/// sees application-level exports and a per-request part sees its request
/// scope.
pub struct CompositionContext<'a> {
    scope: &'a Scope,
    path: ResolutionPath,
}

impl<'a> CompositionContext<'a> {
    pub(crate) fn new(scope: &'a Scope, path: ResolutionPath) -> Self {
        Self { scope, path }
    }

    /// Resolve the single export of contract `C`
    pub fn get_export<C: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<C>, CoreError> {
        self.scope
            .resolve_as::<C>(&ContractId::of::<C>(), &self.path)
    }

    /// Resolve the export of contract `C` if one exists
    pub fn try_get_export<C: ?Sized + Send + Sync + 'static>(
        &self,
    ) -> Result<Option<Arc<C>>, CoreError> {
        let contract = ContractId::of::<C>();
        if !self.scope.has_export(&contract) {
            return Ok(None);
        }
        self.scope.resolve_as::<C>(&contract, &self.path).map(Some)
    }

    /// Resolve every export of contract `C`
    pub fn get_exports<C: ?Sized + Send + Sync + 'static>(&self) -> Result<Vec<Arc<C>>, CoreError> {
        self.scope
            .resolve_all_as::<C>(&ContractId::of::<C>(), &self.path)
    }

    /// Resolve the export of contract `C` registered under `name`
    pub fn get_export_named<C: ?Sized + Send + Sync + 'static>(
        &self,
        name: &str,
    ) -> Result<Arc<C>, CoreError> {
        self.scope
            .resolve_as::<C>(&ContractId::named::<C>(name), &self.path)
    }

    /// Resolve the export of `contract` and cast it to `C`
    pub fn get_export_by_id<C: ?Sized + Send + Sync + 'static>(
        &self,
        contract: &ContractId,
    ) -> Result<Arc<C>, CoreError> {
        self.scope.resolve_as::<C>(contract, &self.path)
    }

    /// Check if anything exports `contract`
    pub fn contains(&self, contract: &ContractId) -> bool {
        self.scope.has_export(contract)
    }

    /// Statistics of the scope that owns the part being composed
    pub fn statistics(&self) -> ContainerStatistics {
        self.scope.statistics()
    }

    /// Identity of the scope that owns the part being composed
    pub fn scope_id(&self) -> Uuid {
        self.scope.id()
    }

    /// Parts being composed on this call chain
    pub fn path(&self) -> &ResolutionPath {
        &self.path
    }
}
