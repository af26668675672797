use crate::bootstrap::{Diagnostics, Pipelines, RequestModule};
use crate::container::{CompositionContext, ContainerStatistics, ContractSet, Part};
use crate::errors::CoreError;
use std::sync::Arc;

/// Diagnostics that trace the start of every request pipeline
pub struct DefaultDiagnostics;

impl Diagnostics for DefaultDiagnostics {
    fn initialize(&self, pipelines: &mut Pipelines) -> Result<(), CoreError> {
        pipelines.add_before_request_to_start(|context| {
            tracing::debug!("Request pipeline started for {}", context.id());
            Ok(())
        });
        Ok(())
    }
}

impl Part for DefaultDiagnostics {
    fn compose(_context: &CompositionContext<'_>) -> Result<Self, CoreError> {
        Ok(DefaultDiagnostics)
    }

    fn contracts(exports: &mut ContractSet<Self>) {
        exports.export::<dyn Diagnostics>(|diagnostics| diagnostics as Arc<dyn Diagnostics>);
    }
}

/// Internal module reporting the statistics of the scope it is composed in.
///
/// Never picked up by the request module convention.
pub struct DiagnosticsModule {
    statistics: ContainerStatistics,
}

impl DiagnosticsModule {
    /// Statistics captured when the module was composed
    pub fn statistics(&self) -> &ContainerStatistics {
        &self.statistics
    }

    /// Statistics as pretty-printed JSON
    pub fn report(&self) -> Result<String, CoreError> {
        Ok(serde_json::to_string_pretty(&self.statistics)?)
    }
}

impl RequestModule for DiagnosticsModule {
    fn module_path(&self) -> &str {
        "/_diagnostics"
    }
}

impl Part for DiagnosticsModule {
    fn compose(context: &CompositionContext<'_>) -> Result<Self, CoreError> {
        Ok(Self {
            statistics: context.statistics(),
        })
    }

    fn contracts(exports: &mut ContractSet<Self>) {
        exports.export::<dyn RequestModule>(|module| module as Arc<dyn RequestModule>);
    }
}
