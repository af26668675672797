//! Part discovery.
//!
//! Parts reach the container either through explicit registrations or by
//! being enumerated from a [`TypeSource`]. Sources are plain lists
//! ([`StaticTypeSource`]) or the link-time [`PART_CATALOG`] that any crate in
//! the binary can contribute to:
//!
//! ```ignore
//! #[linkme::distributed_slice(bootwire_core::container::PART_CATALOG)]
//! static USERS_MODULE: PartEntry = PartEntry {
//!     name: "users",
//!     description: "User management endpoints",
//!     descriptor: PartDescriptor::of::<UsersModule>,
//! };
//! ```

use crate::container::part::origin_of;
use crate::container::{Part, PartDescriptor};
use crate::registration::ContractId;
use std::any::TypeId;
use std::collections::HashSet;
use std::sync::Arc;

/// Crate name of this library; its own parts are internal
pub fn internal_origin() -> &'static str {
    origin_of(module_path!())
}

/// Enumerates candidate parts
pub trait TypeSource: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Parts this source knows about
    fn parts(&self) -> Vec<Arc<PartDescriptor>>;
}

/// Type source backed by an explicit list
#[derive(Debug, Clone)]
pub struct StaticTypeSource {
    name: String,
    parts: Vec<Arc<PartDescriptor>>,
}

impl StaticTypeSource {
    /// Create a new, empty source
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parts: Vec::new(),
        }
    }

    /// Add the part `T`
    pub fn with_part<T: Part>(mut self) -> Self {
        self.add_part(Arc::new(PartDescriptor::of::<T>()));
        self
    }

    /// Add an already built part descriptor
    pub fn add_part(&mut self, part: Arc<PartDescriptor>) {
        self.parts.push(part);
    }

    /// Number of parts in the source
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    /// Check if the source is empty
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

impl TypeSource for StaticTypeSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn parts(&self) -> Vec<Arc<PartDescriptor>> {
        self.parts.clone()
    }
}

/// Registry entry for the link-time part catalog
pub struct PartEntry {
    /// Short, unique name of the part
    pub name: &'static str,
    /// Human-readable description
    pub description: &'static str,
    /// Builds the part descriptor
    pub descriptor: fn() -> PartDescriptor,
}

/// Parts contributed at link time by any crate in the binary
#[linkme::distributed_slice]
pub static PART_CATALOG: [PartEntry] = [..];

/// Type source over [`PART_CATALOG`]
#[derive(Debug, Clone)]
pub struct CatalogTypeSource {
    parts: Vec<Arc<PartDescriptor>>,
}

impl CatalogTypeSource {
    /// Snapshot the catalog
    pub fn new() -> Self {
        let parts: Vec<_> = PART_CATALOG
            .iter()
            .map(|entry| Arc::new((entry.descriptor)()))
            .collect();
        tracing::debug!("Loaded {} parts from the link-time catalog", parts.len());
        Self { parts }
    }

    /// Names of every catalog entry
    pub fn entry_names() -> Vec<&'static str> {
        PART_CATALOG.iter().map(|entry| entry.name).collect()
    }
}

impl Default for CatalogTypeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeSource for CatalogTypeSource {
    fn name(&self) -> &str {
        "part-catalog"
    }

    fn parts(&self) -> Vec<Arc<PartDescriptor>> {
        self.parts.clone()
    }
}

/// Which origins a scan includes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    /// Every part of every source
    All,
    /// Only parts whose origin is not internal
    ExcludeInternal,
}

/// Queries over all type sources
#[derive(Clone)]
pub struct TypeScanner {
    sources: Vec<Arc<dyn TypeSource>>,
    internal_origins: Vec<String>,
}

impl TypeScanner {
    /// Create a scanner over the given sources
    pub fn new(sources: Vec<Arc<dyn TypeSource>>, internal_origins: Vec<String>) -> Self {
        Self {
            sources,
            internal_origins,
        }
    }

    /// Check if a part comes from an internal origin
    pub fn is_internal(&self, part: &PartDescriptor) -> bool {
        self.internal_origins
            .iter()
            .any(|origin| origin == part.origin())
    }

    /// Every part of every source, first occurrence wins
    pub fn all_parts(&self) -> Vec<Arc<PartDescriptor>> {
        let mut seen: HashSet<TypeId> = HashSet::new();
        self.sources
            .iter()
            .flat_map(|source| source.parts())
            .filter(|part| seen.insert(part.implementation().type_id))
            .collect()
    }

    /// Parts declaring `contract`
    pub fn types_of_contract(&self, contract: &ContractId, mode: ScanMode) -> Vec<Arc<PartDescriptor>> {
        self.all_parts()
            .into_iter()
            .filter(|part| part.declares(contract))
            .filter(|part| mode == ScanMode::All || !self.is_internal(part))
            .collect()
    }

    /// Parts declaring contract `C`
    pub fn types_of<C: ?Sized + 'static>(&self, mode: ScanMode) -> Vec<Arc<PartDescriptor>> {
        self.types_of_contract(&ContractId::of::<C>(), mode)
    }
}

impl std::fmt::Debug for TypeScanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeScanner")
            .field(
                "sources",
                &self.sources.iter().map(|source| source.name()).collect::<Vec<_>>(),
            )
            .field("internal_origins", &self.internal_origins)
            .finish()
    }
}
