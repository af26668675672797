use crate::bootstrap::{
    ApplicationStartup, BootstrapperHooks, Diagnostics, DiagnosticsModule, Engine, ModuleCatalog,
    Pipelines, RegistrationTask, RequestContext, RequestModule, RequestStartup,
};
use crate::config::{BootstrapSettings, SettingsTrait};
use crate::container::{
    Container, ContainerFactory, Conventions, ConventionBuilder, ExportProvider,
    InstanceExportProvider, RequestScopeManager, ScanMode, TypeScanner, TypeSource,
};
use crate::errors::CoreError;
use crate::registration::{
    CollectionTypeRegistration, ContractId, Lifetime, RegistrationSet, TypeRegistration,
};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

/// Lifecycle state of a bootstrapper
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BootstrapState {
    Uninitialised = 0,
    Initialising = 1,
    Initialised = 2,
    Disposing = 3,
    Disposed = 4,
}

impl BootstrapState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => BootstrapState::Uninitialised,
            1 => BootstrapState::Initialising,
            2 => BootstrapState::Initialised,
            3 => BootstrapState::Disposing,
            _ => BootstrapState::Disposed,
        }
    }

    /// Get the state name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            BootstrapState::Uninitialised => "uninitialised",
            BootstrapState::Initialising => "initialising",
            BootstrapState::Initialised => "initialised",
            BootstrapState::Disposing => "disposing",
            BootstrapState::Disposed => "disposed",
        }
    }
}

impl std::fmt::Display for BootstrapState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Statistics for one initialisation
#[derive(Debug, Clone)]
pub struct BootstrapStats {
    pub registration_count: usize,
    pub instance_count: usize,
    pub registration_task_count: usize,
    pub application_startup_count: usize,
    pub registration_time: Duration,
    pub task_discovery_time: Duration,
    pub container_build_time: Duration,
    pub startup_time: Duration,
    pub total_time: Duration,
}

impl BootstrapStats {
    /// Create empty stats
    pub fn new() -> Self {
        Self {
            registration_count: 0,
            instance_count: 0,
            registration_task_count: 0,
            application_startup_count: 0,
            registration_time: Duration::ZERO,
            task_discovery_time: Duration::ZERO,
            container_build_time: Duration::ZERO,
            startup_time: Duration::ZERO,
            total_time: Duration::ZERO,
        }
    }
}

impl Default for BootstrapStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Settings and discovery inputs shared by the temporary and final builds
struct CompositionInputs {
    settings: BootstrapSettings,
    internal_origins: Vec<String>,
    sources: Vec<Arc<dyn TypeSource>>,
}

/// Everything that exists while the bootstrapper is initialised
struct Runtime {
    hooks: Arc<dyn BootstrapperHooks>,
    container: Container,
    scopes: RequestScopeManager,
    pipelines: Pipelines,
    has_request_startups: bool,
    stats: BootstrapStats,
}

impl Runtime {
    fn initialize_request_pipelines(&self, context: &RequestContext) -> Result<Pipelines, CoreError> {
        let scope = self.scopes.scope_for(context)?;
        let mut pipelines = self.pipelines.clone();

        if self.has_request_startups {
            for startup in scope.get_exports::<dyn RequestStartup>()? {
                startup.initialize(&mut pipelines, context)?;
            }
        }

        self.hooks.request_startup(&scope, &mut pipelines, context)?;
        Ok(pipelines)
    }
}

/// Composes the application container and serves engines and request modules from it.
///
/// `initialise` accumulates registrations, lets registration tasks found in a
/// temporary container contribute more, builds the application container and
/// runs the startup tasks. Afterwards every request gets its own child scope,
/// created on first use and released when the request context is dropped.
pub struct Bootstrapper {
    hooks: Arc<dyn BootstrapperHooks>,
    state: AtomicU8,
    runtime: RwLock<Option<Arc<Runtime>>>,
}

impl Bootstrapper {
    /// Create a new bootstrapper
    pub fn new<H: BootstrapperHooks>(hooks: H) -> Self {
        Self::with_hooks(Arc::new(hooks))
    }

    /// Create a new bootstrapper from shared hooks
    pub fn with_hooks(hooks: Arc<dyn BootstrapperHooks>) -> Self {
        Self {
            hooks,
            state: AtomicU8::new(BootstrapState::Uninitialised as u8),
            runtime: RwLock::new(None),
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> BootstrapState {
        BootstrapState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Check if the bootstrapper is initialised
    pub fn is_initialised(&self) -> bool {
        self.state() == BootstrapState::Initialised
    }

    /// Compose the application container and run the startup tasks
    pub fn initialise(&self) -> Result<(), CoreError> {
        self.transition(BootstrapState::Uninitialised, BootstrapState::Initialising)?;
        tracing::info!("Initialising bootstrapper...");

        let runtime = match self.compose() {
            Ok(runtime) => runtime,
            Err(error) => {
                self.set_state(BootstrapState::Uninitialised);
                return Err(error);
            }
        };

        let stats = runtime.stats.clone();
        match self.runtime.write() {
            Ok(mut slot) => *slot = Some(Arc::new(runtime)),
            Err(_) => {
                let _ = runtime.container.dispose();
                self.set_state(BootstrapState::Uninitialised);
                return Err(CoreError::lock("bootstrapper_runtime"));
            }
        }
        self.set_state(BootstrapState::Initialised);

        tracing::info!(
            "Bootstrapper initialised in {:?} with {} registrations, {} instances and {} registration tasks",
            stats.total_time,
            stats.registration_count,
            stats.instance_count,
            stats.registration_task_count
        );
        Ok(())
    }

    /// Resolve the engine and hand it the request pipelines factory
    pub fn get_engine(&self) -> Result<Arc<dyn Engine>, CoreError> {
        let runtime = self.runtime("get_engine")?;
        let engine = runtime
            .container
            .get_export::<dyn Engine>()
            .map_err(|error| {
                CoreError::dependency_resolution_failed(ContractId::of::<dyn Engine>().to_string(), error)
            })?;

        let weak = Arc::downgrade(&runtime);
        engine.set_request_pipelines_factory(Arc::new(
            move |context: &RequestContext| -> Result<Pipelines, CoreError> {
                let runtime = weak.upgrade().ok_or(CoreError::ContainerDisposed)?;
                runtime.initialize_request_pipelines(context)
            },
        ));

        Ok(engine)
    }

    /// Resolve the request module `M` in the scope of `context`
    pub fn get_module<M: RequestModule + 'static>(
        &self,
        context: &RequestContext,
    ) -> Result<Arc<M>, CoreError> {
        self.request_scope(context)?.get_export::<M>()
    }

    /// Build the pipelines for `context`
    pub fn initialize_request_pipelines(&self, context: &RequestContext) -> Result<Pipelines, CoreError> {
        self.runtime("initialize_request_pipelines")?
            .initialize_request_pipelines(context)
    }

    /// Child scope serving `context`
    pub fn request_scope(&self, context: &RequestContext) -> Result<Container, CoreError> {
        self.runtime("request_scope")?.scopes.scope_for(context)
    }

    /// The application container
    pub fn application_container(&self) -> Result<Container, CoreError> {
        Ok(self.runtime("application_container")?.container.clone())
    }

    /// Number of request scopes currently alive
    pub fn active_request_scopes(&self) -> usize {
        self.runtime("active_request_scopes")
            .map(|runtime| runtime.scopes.active_scopes())
            .unwrap_or_default()
    }

    /// Statistics of the last successful initialisation
    pub fn stats(&self) -> Option<BootstrapStats> {
        self.runtime("stats").ok().map(|runtime| runtime.stats.clone())
    }

    /// Dispose the live request scopes, then the application container.
    ///
    /// Only an initialised bootstrapper is disposed; calling this again, or
    /// from inside a disposal, does nothing.
    pub fn dispose(&self) -> Result<(), CoreError> {
        if self
            .transition(BootstrapState::Initialised, BootstrapState::Disposing)
            .is_err()
        {
            return Ok(());
        }

        let runtime = self
            .runtime
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        let result = match runtime {
            Some(runtime) => {
                let scopes = runtime.scopes.dispose_all();
                let application = match runtime.container.dispose() {
                    Err(error) if error.is_container_disposed() => Ok(()),
                    other => other,
                };
                scopes.and(application)
            }
            None => Ok(()),
        };

        self.set_state(BootstrapState::Disposed);
        tracing::info!("Bootstrapper disposed");
        result
    }

    fn compose(&self) -> Result<Runtime, CoreError> {
        let started = Instant::now();
        let mut stats = BootstrapStats::new();

        let configuration = self
            .hooks
            .internal_configuration()
            .ok_or_else(|| CoreError::invalid_configuration("configuration cannot be null"))?;
        if !configuration.is_valid() {
            return Err(CoreError::invalid_configuration(format!(
                "configuration is invalid, missing mandatory exports: {}",
                configuration.missing_exports().join(", ")
            )));
        }

        let settings = self.hooks.settings();
        settings.validate()?;

        let mut internal_origins = self.hooks.internal_origins();
        for origin in &settings.internal_origins {
            if !internal_origins.contains(origin) {
                internal_origins.push(origin.clone());
            }
        }
        let sources = self.hooks.type_sources();
        let scanner = TypeScanner::new(sources.clone(), internal_origins.clone());
        let inputs = CompositionInputs {
            settings,
            internal_origins,
            sources,
        };

        let mut registrations = RegistrationSet::new();
        registrations.extend_types(configuration.type_registrations().iter().cloned());
        registrations.extend_types(self.hooks.additional_type_registrations());
        if inputs.settings.diagnostics_enabled {
            if let Some(diagnostics) = configuration.diagnostics_registration() {
                registrations.add_type(diagnostics);
            }
            registrations.add_type(TypeRegistration::as_self::<DiagnosticsModule>(
                Lifetime::PerRequest,
            ));
        }
        for collection in configuration.collection_registrations() {
            registrations.add_collection(collection);
        }
        for collection in self.application_collections(&scanner) {
            registrations.add_collection(&collection);
        }
        for module in configuration.module_registrations() {
            registrations.add_module(module);
        }

        let mut instances = InstanceExportProvider::from_registrations(
            configuration.instance_registrations().iter().cloned(),
        )?;
        for registration in self.hooks.instance_registrations() {
            instances.register(registration)?;
        }
        self.hooks.configure_instances(&mut instances)?;

        registrations.validate_lifetimes()?;
        stats.registration_time = started.elapsed();

        let discovery_started = Instant::now();
        if inputs.settings.registration_tasks_enabled {
            stats.registration_task_count =
                self.run_registration_tasks(&inputs, &mut registrations, &mut instances)?;
        }
        stats.task_discovery_time = discovery_started.elapsed();
        stats.registration_count = registrations.len();
        stats.instance_count = instances.len();

        let build_started = Instant::now();
        let conventions = self.conventions(&inputs, &registrations)?;
        let container = self.hooks.create_application_container(
            &conventions,
            &inputs.sources,
            self.providers(instances),
        )?;
        stats.container_build_time = build_started.elapsed();

        let startup_started = Instant::now();
        let (pipelines, has_request_startups) =
            match self.start(&inputs.settings, &container, &mut stats) {
                Ok(started) => started,
                Err(error) => {
                    if let Err(dispose_error) = container.dispose() {
                        tracing::warn!(
                            "Failed to dispose application container after startup error: {}",
                            dispose_error
                        );
                    }
                    return Err(error);
                }
            };
        stats.startup_time = startup_started.elapsed();
        stats.total_time = started.elapsed();

        let scopes = RequestScopeManager::new(
            container.clone(),
            inputs.settings.per_request_boundary.clone(),
        );

        Ok(Runtime {
            hooks: self.hooks.clone(),
            container,
            scopes,
            pipelines,
            has_request_startups,
            stats,
        })
    }

    fn application_collections(&self, scanner: &TypeScanner) -> Vec<CollectionTypeRegistration> {
        let mut collections = vec![
            CollectionTypeRegistration::from_parts(
                ContractId::of::<dyn RegistrationTask>(),
                scanner.types_of::<dyn RegistrationTask>(ScanMode::All),
                Lifetime::Singleton,
            ),
            CollectionTypeRegistration::from_parts(
                ContractId::of::<dyn ApplicationStartup>(),
                scanner.types_of::<dyn ApplicationStartup>(ScanMode::All),
                Lifetime::Singleton,
            ),
            CollectionTypeRegistration::from_parts(
                ContractId::of::<dyn RequestStartup>(),
                scanner.types_of::<dyn RequestStartup>(ScanMode::All),
                Lifetime::PerRequest,
            ),
        ];
        collections.extend(self.hooks.application_collections(scanner));
        collections
    }

    fn conventions(
        &self,
        inputs: &CompositionInputs,
        registrations: &RegistrationSet,
    ) -> Result<Conventions, CoreError> {
        let mut builder = ConventionBuilder::new(inputs.settings.per_request_boundary.clone());
        builder
            .register_all(registrations.types().iter().cloned())
            .with_module_convention(
                &inputs.internal_origins,
                vec![ContractId::of::<DiagnosticsModule>()],
            );
        self.hooks.configure_conventions(&mut builder);
        builder.build()
    }

    fn providers(&self, instances: InstanceExportProvider) -> Vec<Arc<dyn ExportProvider>> {
        let mut providers: Vec<Arc<dyn ExportProvider>> = vec![Arc::new(instances)];
        providers.extend(self.hooks.export_providers());
        providers
    }

    /// Resolve the registration tasks from a throwaway container and absorb their registrations
    fn run_registration_tasks(
        &self,
        inputs: &CompositionInputs,
        registrations: &mut RegistrationSet,
        instances: &mut InstanceExportProvider,
    ) -> Result<usize, CoreError> {
        let conventions = self.conventions(inputs, registrations)?;
        let temporary = ContainerFactory::create(
            &conventions,
            &inputs.sources,
            self.providers(instances.clone()),
        )?;

        let absorbed = temporary
            .get_exports::<dyn RegistrationTask>()
            .and_then(|tasks| {
                for task in &tasks {
                    registrations.absorb_task(task.as_ref());
                    for registration in task.instance_registrations() {
                        instances.register(registration)?;
                    }
                }
                Ok(tasks.len())
            });

        if let Err(error) = temporary.dispose() {
            if !error.is_container_disposed() {
                tracing::warn!("Temporary container disposed with errors: {}", error);
            }
        }

        let count = absorbed?;
        registrations.validate_lifetimes()?;
        tracing::debug!("{} registration tasks contributed registrations", count);
        Ok(count)
    }

    fn start(
        &self,
        settings: &BootstrapSettings,
        container: &Container,
        stats: &mut BootstrapStats,
    ) -> Result<(Pipelines, bool), CoreError> {
        let mut pipelines = Pipelines::new();

        let startups = container.get_exports::<dyn ApplicationStartup>()?;
        for startup in &startups {
            startup.initialize(&mut pipelines)?;
        }
        stats.application_startup_count = startups.len();

        self.hooks.application_startup(container, &mut pipelines)?;

        let has_request_startups = container.contains_contract::<dyn RequestStartup>();

        if settings.diagnostics_enabled {
            if let Some(diagnostics) = container.try_get_export::<dyn Diagnostics>()? {
                diagnostics.initialize(&mut pipelines)?;
            }
        }

        Ok((pipelines, has_request_startups))
    }

    fn runtime(&self, operation: &str) -> Result<Arc<Runtime>, CoreError> {
        let state = self.state();
        match state {
            BootstrapState::Initialised => {}
            BootstrapState::Uninitialised | BootstrapState::Initialising => {
                return Err(CoreError::NotInitialised {
                    operation: operation.to_string(),
                })
            }
            BootstrapState::Disposing | BootstrapState::Disposed => {
                return Err(CoreError::InvalidState {
                    expected: BootstrapState::Initialised.to_string(),
                    actual: state.to_string(),
                })
            }
        }

        self.runtime
            .read()
            .map_err(|_| CoreError::lock("bootstrapper_runtime"))?
            .clone()
            .ok_or_else(|| CoreError::NotInitialised {
                operation: operation.to_string(),
            })
    }

    fn transition(&self, from: BootstrapState, to: BootstrapState) -> Result<(), CoreError> {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::SeqCst, Ordering::SeqCst)
            .map(|_| ())
            .map_err(|actual| CoreError::InvalidState {
                expected: from.to_string(),
                actual: BootstrapState::from_u8(actual).to_string(),
            })
    }

    fn set_state(&self, state: BootstrapState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }
}

impl ModuleCatalog for Bootstrapper {
    fn get_all_modules(
        &self,
        context: &RequestContext,
    ) -> Result<Vec<Arc<dyn RequestModule>>, CoreError> {
        self.request_scope(context)?
            .get_exports::<dyn RequestModule>()
    }

    fn get_module_by_id(
        &self,
        contract: &ContractId,
        context: &RequestContext,
    ) -> Result<Arc<dyn RequestModule>, CoreError> {
        self.request_scope(context)?
            .get_export_by_id::<dyn RequestModule>(contract)
    }
}

impl Drop for Bootstrapper {
    fn drop(&mut self) {
        if let Err(error) = self.dispose() {
            tracing::warn!("Bootstrapper disposed with errors: {}", error);
        }
    }
}

impl std::fmt::Debug for Bootstrapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bootstrapper")
            .field("state", &self.state())
            .field("active_request_scopes", &self.active_request_scopes())
            .finish()
    }
}
