use crate::container::{
    downcast_export, export_of, CompositionContext, DisposalTracker, ErasedExport,
    ErasedInstance, ExportProvider, PartDescriptor, ResolutionPath, Sharing,
};
use crate::errors::CoreError;
use crate::registration::ContractId;
use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use uuid::Uuid;

/// A part as it ended up in the graph, with the exports and sharing its rule gave it
pub(crate) struct PartDefinition {
    pub(crate) part: Arc<PartDescriptor>,
    pub(crate) export_self: bool,
    pub(crate) contracts: Vec<ContractId>,
    pub(crate) sharing: Sharing,
    pub(crate) rule: String,
}

impl PartDefinition {
    pub(crate) fn exported_contracts(&self) -> Vec<ContractId> {
        let mut exported = Vec::with_capacity(self.contracts.len() + 1);
        if self.export_self {
            exported.push(self.part.implementation().clone());
        }
        for contract in &self.contracts {
            if !exported.contains(contract) {
                exported.push(contract.clone());
            }
        }
        exported
    }
}

/// Immutable resolution graph shared by a container and all its child scopes
pub(crate) struct CompositionGraph {
    pub(crate) definitions: Vec<PartDefinition>,
    pub(crate) exports: HashMap<ContractId, Vec<usize>>,
    pub(crate) providers: Vec<Arc<dyn ExportProvider>>,
    pub(crate) boundaries: Vec<String>,
}

impl CompositionGraph {
    fn candidates(&self, contract: &ContractId) -> &[usize] {
        self.exports
            .get(contract)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn provided(&self, contract: &ContractId) -> Vec<ErasedExport> {
        self.providers
            .iter()
            .filter_map(|provider| provider.get_export(contract))
            .collect()
    }

    fn knows_boundary(&self, boundary: &str) -> bool {
        self.boundaries.iter().any(|known| known == boundary)
    }
}

enum Selection {
    Part(usize),
    Provided(ErasedExport),
}

/// One level of the container hierarchy: the application root or a child scope
pub(crate) struct Scope {
    id: Uuid,
    this: Weak<Scope>,
    graph: Arc<CompositionGraph>,
    parent: Option<Arc<Scope>>,
    boundaries: Vec<String>,
    slots: Mutex<HashMap<usize, Arc<OnceCell<ErasedInstance>>>>,
    disposables: DisposalTracker,
    disposed: AtomicBool,
    created_at: DateTime<Utc>,
}

impl Scope {
    pub(crate) fn root(graph: Arc<CompositionGraph>) -> Arc<Scope> {
        Self::create(graph, None, Vec::new())
    }

    pub(crate) fn child(parent: Arc<Scope>, boundaries: Vec<String>) -> Arc<Scope> {
        let graph = parent.graph.clone();
        Self::create(graph, Some(parent), boundaries)
    }

    fn create(
        graph: Arc<CompositionGraph>,
        parent: Option<Arc<Scope>>,
        boundaries: Vec<String>,
    ) -> Arc<Scope> {
        Arc::new_cyclic(|this| Scope {
            id: Uuid::new_v4(),
            this: this.clone(),
            graph,
            parent,
            boundaries,
            slots: Mutex::new(HashMap::new()),
            disposables: DisposalTracker::new(),
            disposed: AtomicBool::new(false),
            created_at: Utc::now(),
        })
    }

    pub(crate) fn id(&self) -> Uuid {
        self.id
    }

    fn depth(&self) -> usize {
        self.parent
            .as_ref()
            .map(|parent| parent.depth() + 1)
            .unwrap_or(0)
    }

    fn root_scope(&self) -> &Scope {
        match &self.parent {
            Some(parent) => parent.root_scope(),
            None => self,
        }
    }

    fn nearest_with_boundary(&self, boundary: &str) -> Option<&Scope> {
        if self.boundaries.iter().any(|own| own == boundary) {
            return Some(self);
        }
        self.parent
            .as_ref()
            .and_then(|parent| parent.nearest_with_boundary(boundary))
    }

    /// Fails once this scope or any ancestor is disposed
    fn ensure_live(&self) -> Result<(), CoreError> {
        let mut scope = Some(self);
        while let Some(current) = scope {
            if current.disposed.load(Ordering::SeqCst) {
                return Err(CoreError::ContainerDisposed);
            }
            scope = current.parent.as_deref();
        }
        Ok(())
    }

    pub(crate) fn has_export(&self, contract: &ContractId) -> bool {
        self.scope_factory_boundary(contract).is_some()
            || !self.graph.candidates(contract).is_empty()
            || !self.graph.provided(contract).is_empty()
    }

    pub(crate) fn resolve_as<C: ?Sized + Send + Sync + 'static>(
        &self,
        contract: &ContractId,
        path: &ResolutionPath,
    ) -> Result<Arc<C>, CoreError> {
        self.ensure_live()?;
        let requested = ContractId::of::<C>();

        match self.select(contract)? {
            Selection::Provided(export) => downcast_export::<C>(&export, contract),
            Selection::Part(index) => {
                let definition = &self.graph.definitions[index];
                let instance = self.instance_of(index, path)?;
                let export = definition
                    .part
                    .export(&instance, &requested)
                    .ok_or_else(|| CoreError::TypeMismatch {
                        contract: contract.to_string(),
                        requested: requested.to_string(),
                    })?;
                downcast_export::<C>(&export, &requested)
            }
        }
    }

    pub(crate) fn resolve_all_as<C: ?Sized + Send + Sync + 'static>(
        &self,
        contract: &ContractId,
        path: &ResolutionPath,
    ) -> Result<Vec<Arc<C>>, CoreError> {
        self.ensure_live()?;
        let requested = ContractId::of::<C>();
        let mut exports = Vec::new();

        for &index in self.graph.candidates(contract) {
            let definition = &self.graph.definitions[index];
            let instance = self.instance_of(index, path)?;
            let export = definition
                .part
                .export(&instance, &requested)
                .ok_or_else(|| CoreError::TypeMismatch {
                    contract: contract.to_string(),
                    requested: requested.to_string(),
                })?;
            exports.push(downcast_export::<C>(&export, &requested)?);
        }

        for export in self.graph.provided(contract) {
            exports.push(downcast_export::<C>(&export, contract)?);
        }

        Ok(exports)
    }

    fn scope_factory_boundary<'c>(&self, contract: &'c ContractId) -> Option<&'c str> {
        if !contract.is::<ScopeFactory>() {
            return None;
        }
        contract
            .name
            .as_deref()
            .filter(|boundary| self.graph.knows_boundary(boundary))
    }

    fn select(&self, contract: &ContractId) -> Result<Selection, CoreError> {
        if let Some(boundary) = self.scope_factory_boundary(contract) {
            let this = self.this.upgrade().ok_or(CoreError::ContainerDisposed)?;
            let factory = ScopeFactory {
                parent: this,
                boundaries: vec![boundary.to_string()],
            };
            return Ok(Selection::Provided(export_of(Arc::new(factory))));
        }

        let candidates = self.graph.candidates(contract);
        let mut provided = self.graph.provided(contract);

        match candidates.len() + provided.len() {
            0 => Err(CoreError::export_not_found(contract.to_string())),
            1 => match candidates.first() {
                Some(&index) => Ok(Selection::Part(index)),
                None => Ok(Selection::Provided(provided.remove(0))),
            },
            count => Err(CoreError::AmbiguousExport {
                contract: contract.to_string(),
                count,
            }),
        }
    }

    fn instance_of(&self, index: usize, path: &ResolutionPath) -> Result<ErasedInstance, CoreError> {
        let definition = &self.graph.definitions[index];
        let implementation = definition.part.implementation();

        if path.contains(implementation) {
            let cycle = path.with(implementation.clone());
            return Err(CoreError::CircularDependency {
                path: cycle.path_string(),
                cycle_part: implementation.type_name.to_string(),
            });
        }

        match &definition.sharing {
            Sharing::None => self.construct(index, path),
            Sharing::Application => self.root_scope().shared_instance(index, path),
            Sharing::Boundary(boundary) => self
                .nearest_with_boundary(boundary)
                .ok_or_else(|| CoreError::BoundaryNotFound {
                    part: implementation.type_name.to_string(),
                    boundary: boundary.clone(),
                })?
                .shared_instance(index, path),
        }
    }

    fn shared_instance(&self, index: usize, path: &ResolutionPath) -> Result<ErasedInstance, CoreError> {
        self.ensure_live()?;

        let slot = {
            let mut slots = self
                .slots
                .lock()
                .map_err(|_| CoreError::lock("scope_slots"))?;
            slots
                .entry(index)
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };

        slot.get_or_try_init(|| self.construct(index, path))
            .cloned()
    }

    fn construct(&self, index: usize, path: &ResolutionPath) -> Result<ErasedInstance, CoreError> {
        let definition = &self.graph.definitions[index];
        let implementation = definition.part.implementation();
        tracing::trace!(
            "Composing '{}' in scope {} (depth {})",
            implementation.type_name,
            self.id,
            path.depth()
        );

        let context = CompositionContext::new(self, path.with(implementation.clone()));
        let instance = definition.part.construct(&context)?;

        if let Some(disposable) = definition.part.as_disposable(&instance) {
            self.disposables
                .track(implementation.type_name, disposable)?;
        }

        Ok(instance)
    }

    pub(crate) fn statistics(&self) -> ContainerStatistics {
        let definitions = &self.graph.definitions;
        let cached_instances = self
            .slots
            .lock()
            .map(|slots| slots.values().filter(|slot| slot.get().is_some()).count())
            .unwrap_or_default();

        ContainerStatistics {
            scope_id: self.id,
            created_at: self.created_at,
            depth: self.depth(),
            boundaries: self.boundaries.clone(),
            total_parts: definitions.len(),
            transient_parts: definitions
                .iter()
                .filter(|definition| definition.sharing == Sharing::None)
                .count(),
            application_shared_parts: definitions
                .iter()
                .filter(|definition| definition.sharing == Sharing::Application)
                .count(),
            boundary_shared_parts: definitions
                .iter()
                .filter(|definition| definition.sharing.boundary().is_some())
                .count(),
            exported_contracts: self.graph.exports.len(),
            export_providers: self.graph.providers.len(),
            cached_instances,
            tracked_disposables: self.disposables.len(),
        }
    }

    fn dispose(&self) -> Result<(), CoreError> {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return Err(CoreError::ContainerDisposed);
        }

        tracing::debug!("Disposing scope {} (depth {})", self.id, self.depth());
        let result = self.disposables.dispose_all();

        if let Ok(mut slots) = self.slots.lock() {
            slots.clear();
        }

        result
    }
}

impl Drop for Scope {
    fn drop(&mut self) {
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }
        if let Err(error) = self.dispose() {
            tracing::warn!("Scope {} disposed with errors: {}", self.id, error);
        }
    }
}

/// Counters describing a container and its graph
#[derive(Debug, Clone, Serialize)]
pub struct ContainerStatistics {
    pub scope_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub depth: usize,
    pub boundaries: Vec<String>,
    pub total_parts: usize,
    pub transient_parts: usize,
    pub application_shared_parts: usize,
    pub boundary_shared_parts: usize,
    pub exported_contracts: usize,
    pub export_providers: usize,
    pub cached_instances: usize,
    pub tracked_disposables: usize,
}

/// Built composition graph and the instances it shares at this level.
///
/// Cloning is cheap and yields a handle to the same scope. Registrations can
/// not be added once a container exists; child scopes are created through
/// the [`ScopeFactory`] export named after a sharing boundary.
#[derive(Clone)]
pub struct Container {
    scope: Arc<Scope>,
}

impl Container {
    pub(crate) fn from_scope(scope: Arc<Scope>) -> Self {
        Self { scope }
    }

    /// Unique identity of this scope
    pub fn id(&self) -> Uuid {
        self.scope.id
    }

    /// Sharing boundaries carried by this scope
    pub fn boundaries(&self) -> &[String] {
        &self.scope.boundaries
    }

    /// Check if the scope has been disposed
    pub fn is_disposed(&self) -> bool {
        self.scope.disposed.load(Ordering::SeqCst)
    }

    /// Resolution context rooted at this container
    pub fn context(&self) -> CompositionContext<'_> {
        CompositionContext::new(&self.scope, ResolutionPath::new())
    }

    /// Resolve the single export of contract `C`
    pub fn get_export<C: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<C>, CoreError> {
        self.context().get_export::<C>()
    }

    /// Resolve the export of contract `C` if one exists
    pub fn try_get_export<C: ?Sized + Send + Sync + 'static>(
        &self,
    ) -> Result<Option<Arc<C>>, CoreError> {
        self.context().try_get_export::<C>()
    }

    /// Resolve every export of contract `C`
    pub fn get_exports<C: ?Sized + Send + Sync + 'static>(&self) -> Result<Vec<Arc<C>>, CoreError> {
        self.context().get_exports::<C>()
    }

    /// Resolve the export of contract `C` registered under `name`
    pub fn get_export_named<C: ?Sized + Send + Sync + 'static>(
        &self,
        name: &str,
    ) -> Result<Arc<C>, CoreError> {
        self.context().get_export_named::<C>(name)
    }

    /// Resolve the export of `contract` and cast it to `C`
    pub fn get_export_by_id<C: ?Sized + Send + Sync + 'static>(
        &self,
        contract: &ContractId,
    ) -> Result<Arc<C>, CoreError> {
        self.context().get_export_by_id::<C>(contract)
    }

    /// Check if anything exports `contract`
    pub fn contains(&self, contract: &ContractId) -> bool {
        self.scope.has_export(contract)
    }

    /// Check if anything exports contract `C`
    pub fn contains_contract<C: ?Sized + 'static>(&self) -> bool {
        self.contains(&ContractId::of::<C>())
    }

    /// Get container statistics
    pub fn statistics(&self) -> ContainerStatistics {
        self.scope.statistics()
    }

    /// Dispose the disposable parts this scope created.
    ///
    /// Fails with [`CoreError::ContainerDisposed`] when called twice.
    pub fn dispose(&self) -> Result<(), CoreError> {
        self.scope.dispose()
    }
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("id", &self.scope.id)
            .field("depth", &self.scope.depth())
            .field("boundaries", &self.scope.boundaries)
            .field("parts", &self.scope.graph.definitions.len())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Creates child scopes carrying a sharing boundary.
///
/// Resolved as `get_export_named::<ScopeFactory>(boundary)` for any boundary
/// the graph knows about.
pub struct ScopeFactory {
    parent: Arc<Scope>,
    boundaries: Vec<String>,
}

impl ScopeFactory {
    /// Boundaries given to every scope this factory creates
    pub fn boundaries(&self) -> &[String] {
        &self.boundaries
    }

    /// Create a new child scope
    pub fn create_scope(&self) -> Result<Container, CoreError> {
        self.parent.ensure_live()?;
        let scope = Scope::child(self.parent.clone(), self.boundaries.clone());
        tracing::debug!(
            "Created scope {} with boundaries {:?} under {}",
            scope.id,
            self.boundaries,
            self.parent.id
        );
        Ok(Container::from_scope(scope))
    }
}

impl std::fmt::Debug for ScopeFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopeFactory")
            .field("parent", &self.parent.id)
            .field("boundaries", &self.boundaries)
            .finish()
    }
}
