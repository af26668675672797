pub mod catalog;
#[allow(clippy::module_inception)]
pub mod container;
pub mod context;
pub mod conventions;
pub mod factory;
pub mod instance_provider;
pub mod lifecycle;
pub mod part;
pub mod scope;


pub use catalog::{
    internal_origin, CatalogTypeSource, PartEntry, ScanMode, StaticTypeSource, TypeScanner,
    TypeSource, PART_CATALOG,
};
pub use container::{Container, ContainerStatistics, ScopeFactory};
pub use context::{CompositionContext, ResolutionPath};
pub use conventions::{
    ContractSelection, ConventionBuilder, Conventions, MatchRule, PartPredicate, PartRule,
    Sharing, MODULE_CONVENTION,
};
pub use factory::{ContainerFactory, REGISTRATION_RULE};
pub use instance_provider::{ExportProvider, InstanceExportProvider};
pub use lifecycle::{Disposable, DisposalTracker};
pub use part::{
    downcast_export, export_of, ContractSet, ErasedExport, ErasedInstance, Part, PartDescriptor,
};
pub use scope::RequestScopeManager;
