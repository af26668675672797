use crate::container::container::{CompositionGraph, PartDefinition, Scope};
use crate::container::{Container, Conventions, ExportProvider, TypeSource};
use crate::errors::CoreError;
use crate::registration::ContractId;
use std::any::TypeId;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Rule label for parts exported because they were registered
pub const REGISTRATION_RULE: &str = "registration";

/// Builds containers from conventions, type sources and export providers
pub struct ContainerFactory;

impl ContainerFactory {
    /// Build a root container.
    ///
    /// Candidate parts are the registered parts followed by every part the
    /// sources enumerate. A registered part always keeps its own rule; any
    /// other part is exported by the first match rule that accepts it and is
    /// left out of the graph when none does.
    pub fn create(
        conventions: &Conventions,
        sources: &[Arc<dyn TypeSource>],
        providers: Vec<Arc<dyn ExportProvider>>,
    ) -> Result<Container, CoreError> {
        let graph = Self::compose_graph(conventions, sources, providers);

        tracing::info!(
            "Composition graph built: {} parts, {} contracts, {} export providers",
            graph.definitions.len(),
            graph.exports.len(),
            graph.providers.len()
        );

        Ok(Container::from_scope(Scope::root(Arc::new(graph))))
    }

    fn compose_graph(
        conventions: &Conventions,
        sources: &[Arc<dyn TypeSource>],
        providers: Vec<Arc<dyn ExportProvider>>,
    ) -> CompositionGraph {
        let mut definitions = Vec::new();
        let mut seen: HashSet<TypeId> = HashSet::new();

        for rule in conventions.part_rules() {
            seen.insert(rule.part.implementation().type_id);
            definitions.push(PartDefinition {
                part: rule.part.clone(),
                export_self: rule.export_self,
                contracts: rule.contracts.clone(),
                sharing: rule.sharing.clone(),
                rule: REGISTRATION_RULE.to_string(),
            });
        }

        for source in sources {
            for part in source.parts() {
                if !seen.insert(part.implementation().type_id) {
                    continue;
                }

                let Some(rule) = conventions
                    .match_rules()
                    .iter()
                    .find(|rule| rule.matches(&part))
                else {
                    continue;
                };

                let contracts = rule.contracts_for(&part);
                if !rule.exports_self() && contracts.is_empty() {
                    continue;
                }

                tracing::debug!(
                    "Part '{}' from source '{}' exported by rule '{}'",
                    part.type_name(),
                    source.name(),
                    rule.name()
                );

                definitions.push(PartDefinition {
                    part,
                    export_self: rule.exports_self(),
                    contracts,
                    sharing: rule.sharing().clone(),
                    rule: rule.name().to_string(),
                });
            }
        }

        let mut exports: HashMap<ContractId, Vec<usize>> = HashMap::new();
        for (index, definition) in definitions.iter().enumerate() {
            for contract in definition.exported_contracts() {
                exports.entry(contract).or_default().push(index);
            }
        }

        CompositionGraph {
            definitions,
            exports,
            providers,
            boundaries: conventions.boundaries(),
        }
    }
}
