use crate::bootstrap::RequestModule;
use crate::container::PartDescriptor;
use crate::errors::CoreError;
use crate::registration::{ContractId, Lifetime, TypeRegistration};
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

/// Name of the wildcard rule exporting request modules
pub const MODULE_CONVENTION: &str = "request-modules";

/// Where a composed instance is cached
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sharing {
    /// Not cached; every resolution composes a new instance
    None,
    /// Cached in the application (root) scope
    Application,
    /// Cached in the nearest scope carrying the boundary
    Boundary(String),
}

impl Sharing {
    /// Sharing policy implementing `lifetime`
    pub fn for_lifetime(lifetime: Lifetime, per_request_boundary: &str) -> Self {
        match lifetime {
            Lifetime::Transient => Sharing::None,
            Lifetime::Singleton => Sharing::Application,
            Lifetime::PerRequest => Sharing::Boundary(per_request_boundary.to_string()),
        }
    }

    /// Boundary name, if shared at a boundary
    pub fn boundary(&self) -> Option<&str> {
        match self {
            Sharing::Boundary(boundary) => Some(boundary),
            _ => None,
        }
    }

    /// Check if instances are cached at all
    pub fn is_shared(&self) -> bool {
        !matches!(self, Sharing::None)
    }
}

/// Export rule for one explicitly registered part
#[derive(Debug, Clone)]
pub struct PartRule {
    pub part: Arc<PartDescriptor>,
    pub export_self: bool,
    pub contracts: Vec<ContractId>,
    pub lifetime: Lifetime,
    pub sharing: Sharing,
}

/// Predicate selecting parts for a match rule
pub type PartPredicate = Arc<dyn Fn(&PartDescriptor) -> bool + Send + Sync>;

/// Contracts a match rule exports a part as
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContractSelection {
    /// No contracts beyond the part itself
    None,
    /// Every contract the part declares
    Declared,
    /// The listed contracts the part declares
    Only(Vec<ContractId>),
}

/// Export rule for every part matching a predicate
#[derive(Clone)]
pub struct MatchRule {
    name: String,
    predicate: PartPredicate,
    export_self: bool,
    contracts: ContractSelection,
    sharing: Sharing,
}

impl MatchRule {
    /// Create a rule that matches but exports nothing until configured
    pub fn new<F>(name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&PartDescriptor) -> bool + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            predicate: Arc::new(predicate),
            export_self: false,
            contracts: ContractSelection::None,
            sharing: Sharing::None,
        }
    }

    /// Export matching parts as themselves
    pub fn export_self(&mut self) -> &mut Self {
        self.export_self = true;
        self
    }

    /// Export matching parts as every contract they declare
    pub fn export_declared(&mut self) -> &mut Self {
        self.contracts = ContractSelection::Declared;
        self
    }

    /// Export matching parts as `C` when they declare it
    pub fn export<C: ?Sized + 'static>(&mut self) -> &mut Self {
        let contract = ContractId::of::<C>();
        match &mut self.contracts {
            ContractSelection::Only(contracts) => {
                if !contracts.contains(&contract) {
                    contracts.push(contract);
                }
            }
            ContractSelection::Declared => {}
            ContractSelection::None => self.contracts = ContractSelection::Only(vec![contract]),
        }
        self
    }

    /// Share matching parts across the application
    pub fn shared(&mut self) -> &mut Self {
        self.sharing = Sharing::Application;
        self
    }

    /// Share matching parts within scopes carrying `boundary`
    pub fn shared_at(&mut self, boundary: impl Into<String>) -> &mut Self {
        self.sharing = Sharing::Boundary(boundary.into());
        self
    }

    /// Rule name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sharing given to matching parts
    pub fn sharing(&self) -> &Sharing {
        &self.sharing
    }

    /// Check if matching parts are exported as themselves
    pub fn exports_self(&self) -> bool {
        self.export_self
    }

    /// Check if the rule applies to `part`
    pub fn matches(&self, part: &PartDescriptor) -> bool {
        (self.predicate)(part)
    }

    /// Contracts `part` is exported as under this rule, excluding itself
    pub fn contracts_for(&self, part: &PartDescriptor) -> Vec<ContractId> {
        match &self.contracts {
            ContractSelection::None => Vec::new(),
            ContractSelection::Declared => part.declared_contracts().cloned().collect(),
            ContractSelection::Only(contracts) => contracts
                .iter()
                .filter(|contract| part.declares(contract))
                .cloned()
                .collect(),
        }
    }
}

impl std::fmt::Debug for MatchRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatchRule")
            .field("name", &self.name)
            .field("export_self", &self.export_self)
            .field("contracts", &self.contracts)
            .field("sharing", &self.sharing)
            .finish()
    }
}

/// Collects registrations and match rules, then derives the export conventions
#[derive(Debug, Clone)]
pub struct ConventionBuilder {
    boundary: String,
    registrations: Vec<TypeRegistration>,
    match_rules: Vec<MatchRule>,
}

impl ConventionBuilder {
    /// Create a builder whose per-request parts share at `per_request_boundary`
    pub fn new(per_request_boundary: impl Into<String>) -> Self {
        Self {
            boundary: per_request_boundary.into(),
            registrations: Vec::new(),
            match_rules: Vec::new(),
        }
    }

    /// Per-request boundary name
    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Add a type registration
    pub fn register(&mut self, registration: TypeRegistration) -> &mut Self {
        self.registrations.push(registration);
        self
    }

    /// Add type registrations
    pub fn register_all<I>(&mut self, registrations: I) -> &mut Self
    where
        I: IntoIterator<Item = TypeRegistration>,
    {
        self.registrations.extend(registrations);
        self
    }

    /// Add a rule for every discovered part matching `predicate`
    pub fn for_types_matching<F>(&mut self, name: impl Into<String>, predicate: F) -> &mut MatchRule
    where
        F: Fn(&PartDescriptor) -> bool + Send + Sync + 'static,
    {
        let index = self.match_rules.len();
        self.match_rules.push(MatchRule::new(name, predicate));
        &mut self.match_rules[index]
    }

    /// Add the wildcard rule exporting request modules.
    ///
    /// Matches parts that declare `dyn RequestModule`, are not from an
    /// internal origin and are not listed in `excluded`.
    pub fn with_module_convention(
        &mut self,
        internal_origins: &[String],
        excluded: Vec<ContractId>,
    ) -> &mut Self {
        let internal_origins = internal_origins.to_vec();
        let boundary = self.boundary.clone();

        self.for_types_matching(MODULE_CONVENTION, move |part| {
            part.declares_contract::<dyn RequestModule>()
                && !internal_origins
                    .iter()
                    .any(|origin| origin == part.origin())
                && !excluded
                    .iter()
                    .any(|module| module.type_id == part.implementation().type_id)
        })
        .export_self()
        .export_declared()
        .shared_at(boundary);

        self
    }

    /// Derive the conventions. Does not modify the builder.
    pub fn build(&self) -> Result<Conventions, CoreError> {
        let mut order: Vec<TypeId> = Vec::new();
        let mut groups: HashMap<TypeId, Vec<&TypeRegistration>> = HashMap::new();

        for registration in &self.registrations {
            let implementation = registration.implementation.implementation().type_id;
            groups
                .entry(implementation)
                .or_insert_with(|| {
                    order.push(implementation);
                    Vec::new()
                })
                .push(registration);
        }

        let mut part_rules = Vec::with_capacity(order.len());
        for implementation in order {
            let group = &groups[&implementation];
            part_rules.push(self.part_rule(group)?);
        }

        tracing::debug!(
            "Built conventions: {} part rules, {} match rules, boundary '{}'",
            part_rules.len(),
            self.match_rules.len(),
            self.boundary
        );

        Ok(Conventions {
            boundary: self.boundary.clone(),
            part_rules,
            match_rules: self.match_rules.clone(),
        })
    }

    fn part_rule(&self, group: &[&TypeRegistration]) -> Result<PartRule, CoreError> {
        let part = group[0].implementation.clone();
        let lifetime = group[0].lifetime;

        if let Some(conflict) = group.iter().find(|registration| registration.lifetime != lifetime) {
            return Err(CoreError::ConflictingLifetime {
                implementation: part.type_name().to_string(),
                lifetimes: format!("{}, {}", lifetime, conflict.lifetime),
            });
        }

        let mut export_self = false;
        let mut contracts: Vec<ContractId> = Vec::new();
        for registration in group {
            if registration.is_self_registration() {
                export_self = true;
                continue;
            }

            if !part.declares(&registration.contract) {
                return Err(CoreError::invalid_convention(format!(
                    "'{}' is registered as '{}' but does not declare that contract",
                    part.type_name(),
                    registration.contract
                )));
            }

            if !contracts.contains(&registration.contract) {
                contracts.push(registration.contract.clone());
            }
        }

        tracing::debug!(
            "Part rule for '{}': {} contracts, self export {}, lifetime {}",
            part.type_name(),
            contracts.len(),
            export_self,
            lifetime
        );

        Ok(PartRule {
            sharing: Sharing::for_lifetime(lifetime, &self.boundary),
            part,
            export_self,
            contracts,
            lifetime,
        })
    }
}

/// Immutable export conventions consumed by the container factory
#[derive(Debug, Clone)]
pub struct Conventions {
    boundary: String,
    part_rules: Vec<PartRule>,
    match_rules: Vec<MatchRule>,
}

impl Conventions {
    /// Per-request boundary name
    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Rules for registered parts, in first-registration order
    pub fn part_rules(&self) -> &[PartRule] {
        &self.part_rules
    }

    /// Wildcard rules, in the order they were added
    pub fn match_rules(&self) -> &[MatchRule] {
        &self.match_rules
    }

    /// Rule for the given implementation, if it was registered
    pub fn rule_for(&self, implementation: &ContractId) -> Option<&PartRule> {
        self.part_rules
            .iter()
            .find(|rule| rule.part.implementation().type_id == implementation.type_id)
    }

    /// Every boundary name used by any rule, the per-request boundary first
    pub fn boundaries(&self) -> Vec<String> {
        let mut boundaries = vec![self.boundary.clone()];
        let used = self
            .part_rules
            .iter()
            .map(|rule| &rule.sharing)
            .chain(self.match_rules.iter().map(MatchRule::sharing));

        for sharing in used {
            if let Some(boundary) = sharing.boundary() {
                if !boundaries.iter().any(|known| known == boundary) {
                    boundaries.push(boundary.to_string());
                }
            }
        }
        boundaries
    }
}
