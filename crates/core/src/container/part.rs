use crate::container::{CompositionContext, Disposable};
use crate::errors::CoreError;
use crate::registration::ContractId;
use std::any::Any;
use std::marker::PhantomData;
use std::sync::Arc;

/// Type-erased part instance, always an `Arc<T>` of the implementation
pub type ErasedInstance = Arc<dyn Any + Send + Sync>;

/// Type-erased export, always an `Arc<Arc<C>>` for the contract it was cast to
pub type ErasedExport = Arc<dyn Any + Send + Sync>;

type Constructor = fn(&CompositionContext<'_>) -> Result<ErasedInstance, CoreError>;
type Caster = Arc<dyn Fn(&ErasedInstance) -> Option<ErasedExport> + Send + Sync>;
type DisposableView = fn(&ErasedInstance) -> Option<Arc<dyn Disposable>>;

/// An implementation type the container can compose.
///
/// `compose` pulls dependencies from the [`CompositionContext`]; `contracts`
/// declares which contracts (usually trait objects) the part may be exported
/// as. Whether a declared contract is actually exported is decided by the
/// registrations and conventions, not by the part itself.
///
/// ```ignore
/// impl Part for SqlUserStore {
///     fn compose(context: &CompositionContext<'_>) -> Result<Self, CoreError> {
///         Ok(Self { pool: context.get_export::<dyn ConnectionPool>()? })
///     }
///
///     fn contracts(exports: &mut ContractSet<Self>) {
///         exports.export::<dyn UserStore>(|store| store as Arc<dyn UserStore>);
///     }
/// }
/// ```
pub trait Part: Send + Sync + Sized + 'static {
    /// Build the part from its dependencies
    fn compose(context: &CompositionContext<'_>) -> Result<Self, CoreError>;

    /// Declare the contracts this part can be exported as
    fn contracts(_exports: &mut ContractSet<Self>) {}
}

/// Contracts declared by a part, with the casts from the concrete part to each
pub struct ContractSet<T> {
    exports: Vec<(ContractId, Caster)>,
    disposable: Option<DisposableView>,
    _part: PhantomData<fn() -> T>,
}

impl<T: Part> ContractSet<T> {
    fn new() -> Self {
        Self {
            exports: Vec::new(),
            disposable: None,
            _part: PhantomData,
        }
    }

    /// Declare that the part can be exported as `C`
    pub fn export<C>(&mut self, cast: fn(Arc<T>) -> Arc<C>) -> &mut Self
    where
        C: ?Sized + Send + Sync + 'static,
    {
        let contract = ContractId::of::<C>();
        if self.exports.iter().any(|(existing, _)| existing == &contract) {
            return self;
        }

        let caster: Caster = Arc::new(move |instance: &ErasedInstance| {
            instance
                .clone()
                .downcast::<T>()
                .ok()
                .map(|part| Arc::new(cast(part)) as ErasedExport)
        });
        self.exports.push((contract, caster));
        self
    }

    /// Have the owning scope dispose instances of this part
    pub fn disposable(&mut self) -> &mut Self
    where
        T: Disposable,
    {
        self.disposable = Some(disposable_view::<T>);
        self
    }
}

/// Composable description of an implementation type
pub struct PartDescriptor {
    implementation: ContractId,
    origin: &'static str,
    constructor: Constructor,
    self_caster: fn(&ErasedInstance) -> Option<ErasedExport>,
    exports: Vec<(ContractId, Caster)>,
    disposable: Option<DisposableView>,
}

impl PartDescriptor {
    /// Create the descriptor of a part type
    pub fn of<T: Part>() -> Self {
        let mut contracts = ContractSet::<T>::new();
        T::contracts(&mut contracts);

        Self {
            implementation: ContractId::of::<T>(),
            origin: origin_of(std::any::type_name::<T>()),
            constructor: construct::<T>,
            self_caster: cast_self::<T>,
            exports: contracts.exports,
            disposable: contracts.disposable,
        }
    }

    /// Contract identifying the implementation type itself
    pub fn implementation(&self) -> &ContractId {
        &self.implementation
    }

    /// Full type name of the implementation
    pub fn type_name(&self) -> &'static str {
        self.implementation.type_name
    }

    /// Crate that defines the implementation
    pub fn origin(&self) -> &'static str {
        self.origin
    }

    /// Check if the part is the contract or declares it
    pub fn declares(&self, contract: &ContractId) -> bool {
        contract.type_id == self.implementation.type_id
            || self
                .exports
                .iter()
                .any(|(declared, _)| declared.type_id == contract.type_id)
    }

    /// Check if the part declares the contract `C`
    pub fn declares_contract<C: ?Sized + 'static>(&self) -> bool {
        self.declares(&ContractId::of::<C>())
    }

    /// Contracts the part declares, excluding itself
    pub fn declared_contracts(&self) -> impl Iterator<Item = &ContractId> + '_ {
        self.exports.iter().map(|(contract, _)| contract)
    }

    /// Check if instances are tracked for disposal
    pub fn is_disposable(&self) -> bool {
        self.disposable.is_some()
    }

    pub(crate) fn construct(
        &self,
        context: &CompositionContext<'_>,
    ) -> Result<ErasedInstance, CoreError> {
        (self.constructor)(context)
    }

    /// Cast a constructed instance to the export of `contract`
    pub(crate) fn export(
        &self,
        instance: &ErasedInstance,
        contract: &ContractId,
    ) -> Option<ErasedExport> {
        if contract.type_id == self.implementation.type_id {
            return (self.self_caster)(instance);
        }

        self.exports
            .iter()
            .find(|(declared, _)| declared.type_id == contract.type_id)
            .and_then(|(_, caster)| caster(instance))
    }

    pub(crate) fn as_disposable(&self, instance: &ErasedInstance) -> Option<Arc<dyn Disposable>> {
        self.disposable.and_then(|view| view(instance))
    }
}

impl std::fmt::Debug for PartDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartDescriptor")
            .field("implementation", &self.implementation.type_name)
            .field("origin", &self.origin)
            .field(
                "contracts",
                &self
                    .exports
                    .iter()
                    .map(|(contract, _)| contract.type_name)
                    .collect::<Vec<_>>(),
            )
            .field("disposable", &self.disposable.is_some())
            .finish()
    }
}

/// Wrap a contract value the way the container hands exports around
pub fn export_of<C: ?Sized + Send + Sync + 'static>(value: Arc<C>) -> ErasedExport {
    Arc::new(value)
}

/// Read a contract value back out of an export
pub fn downcast_export<C: ?Sized + Send + Sync + 'static>(
    export: &ErasedExport,
    contract: &ContractId,
) -> Result<Arc<C>, CoreError> {
    export
        .downcast_ref::<Arc<C>>()
        .cloned()
        .ok_or_else(|| CoreError::TypeMismatch {
            contract: contract.to_string(),
            requested: std::any::type_name::<C>().to_string(),
        })
}

/// First path segment of a type or module path, i.e. the defining crate
pub(crate) fn origin_of(path: &'static str) -> &'static str {
    path.split("::").next().unwrap_or(path)
}

fn construct<T: Part>(context: &CompositionContext<'_>) -> Result<ErasedInstance, CoreError> {
    T::compose(context).map(|part| Arc::new(part) as ErasedInstance)
}

fn cast_self<T: Part>(instance: &ErasedInstance) -> Option<ErasedExport> {
    instance
        .clone()
        .downcast::<T>()
        .ok()
        .map(|part| Arc::new(part) as ErasedExport)
}

fn disposable_view<T: Part + Disposable>(instance: &ErasedInstance) -> Option<Arc<dyn Disposable>> {
    instance
        .clone()
        .downcast::<T>()
        .ok()
        .map(|part| part as Arc<dyn Disposable>)
}
