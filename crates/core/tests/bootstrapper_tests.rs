//! Integration tests for the bootstrapper
//!
//! Drives the full bootstrap: registrations, registration tasks, the module
//! convention, per-request scopes, startup tasks and disposal.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};

use bootwire_core::bootstrap::{
    ApplicationStartup, BootstrapState, Bootstrapper, BootstrapperHooks, DiagnosticsModule, Engine,
    InternalConfiguration, ModuleCatalog, Pipelines, RegistrationTask, RequestContext,
    RequestModule, RequestPipelinesFactory, RequestStartup,
};
use bootwire_core::config::BootstrapSettings;
use bootwire_core::container::{
    CompositionContext, Container, ContractSet, Disposable, Part, StaticTypeSource, TypeSource,
};
use bootwire_core::errors::CoreError;
use bootwire_core::registration::{
    CollectionTypeRegistration, ContractId, InstanceRegistration, Lifetime, TypeRegistration,
};

const SECRET_MESSAGE: &str = "Mah secrat messahhge!";

static NEXT_ID: AtomicUsize = AtomicUsize::new(1);

fn next_id() -> usize {
    NEXT_ID.fetch_add(1, Ordering::SeqCst)
}

struct TransientDependency {
    id: usize,
}

impl Part for TransientDependency {
    fn compose(_context: &CompositionContext<'_>) -> Result<Self, CoreError> {
        Ok(Self { id: next_id() })
    }
}

struct SingletonDependency {
    id: usize,
}

impl Part for SingletonDependency {
    fn compose(_context: &CompositionContext<'_>) -> Result<Self, CoreError> {
        Ok(Self { id: next_id() })
    }
}

struct PerRequestDependency {
    id: usize,
}

impl Part for PerRequestDependency {
    fn compose(_context: &CompositionContext<'_>) -> Result<Self, CoreError> {
        Ok(Self { id: next_id() })
    }
}

struct InstanceDependency {
    secret_message: String,
}

struct FakeModule {
    transient: Arc<TransientDependency>,
    singleton: Arc<SingletonDependency>,
    per_request: Arc<PerRequestDependency>,
    instance: Arc<InstanceDependency>,
}

impl RequestModule for FakeModule {
    fn module_path(&self) -> &str {
        "/fake"
    }
}

impl Part for FakeModule {
    fn compose(context: &CompositionContext<'_>) -> Result<Self, CoreError> {
        Ok(Self {
            transient: context.get_export::<TransientDependency>()?,
            singleton: context.get_export::<SingletonDependency>()?,
            per_request: context.get_export::<PerRequestDependency>()?,
            instance: context.get_export::<InstanceDependency>()?,
        })
    }

    fn contracts(exports: &mut ContractSet<Self>) {
        exports.export::<dyn RequestModule>(|module| module as Arc<dyn RequestModule>);
    }
}

/// Receives the pipelines factory handed to the engine
#[derive(Default)]
struct EngineProbe {
    factory: Mutex<Option<RequestPipelinesFactory>>,
}

impl EngineProbe {
    fn pipelines_for(&self, context: &RequestContext) -> Result<Pipelines, CoreError> {
        let factory = self
            .factory
            .lock()
            .unwrap()
            .clone()
            .expect("engine never received a pipelines factory");
        factory(context)
    }
}

struct FakeEngine {
    probe: Arc<EngineProbe>,
}

impl Engine for FakeEngine {
    fn set_request_pipelines_factory(&self, factory: RequestPipelinesFactory) {
        *self.probe.factory.lock().unwrap() = Some(factory);
    }
}

impl Part for FakeEngine {
    fn compose(context: &CompositionContext<'_>) -> Result<Self, CoreError> {
        Ok(Self {
            probe: context.get_export::<EngineProbe>()?,
        })
    }

    fn contracts(exports: &mut ContractSet<Self>) {
        exports.export::<dyn Engine>(|engine| engine as Arc<dyn Engine>);
    }
}

/// Records pipeline and disposal events in order
#[derive(Default)]
struct Trail {
    events: Mutex<Vec<String>>,
}

impl Trail {
    fn push(&self, event: impl Into<String>) {
        self.events.lock().unwrap().push(event.into());
    }

    fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

struct AuditStartup {
    trail: Arc<Trail>,
}

impl ApplicationStartup for AuditStartup {
    fn initialize(&self, pipelines: &mut Pipelines) -> Result<(), CoreError> {
        let trail = self.trail.clone();
        pipelines.add_before_request(move |_context| {
            trail.push("application");
            Ok(())
        });
        Ok(())
    }
}

impl Part for AuditStartup {
    fn compose(context: &CompositionContext<'_>) -> Result<Self, CoreError> {
        Ok(Self {
            trail: context.get_export::<Trail>()?,
        })
    }

    fn contracts(exports: &mut ContractSet<Self>) {
        exports.export::<dyn ApplicationStartup>(|startup| startup as Arc<dyn ApplicationStartup>);
    }
}

struct RequestAudit {
    trail: Arc<Trail>,
    dependency: Arc<PerRequestDependency>,
}

impl RequestStartup for RequestAudit {
    fn initialize(&self, pipelines: &mut Pipelines, _context: &RequestContext) -> Result<(), CoreError> {
        let trail = self.trail.clone();
        let dependency = self.dependency.id;
        pipelines.add_before_request(move |_context| {
            trail.push(format!("request:{}", dependency));
            Ok(())
        });
        Ok(())
    }
}

impl Part for RequestAudit {
    fn compose(context: &CompositionContext<'_>) -> Result<Self, CoreError> {
        Ok(Self {
            trail: context.get_export::<Trail>()?,
            dependency: context.get_export::<PerRequestDependency>()?,
        })
    }

    fn contracts(exports: &mut ContractSet<Self>) {
        exports.export::<dyn RequestStartup>(|startup| startup as Arc<dyn RequestStartup>);
    }
}

trait Greeter: Send + Sync {
    fn greet(&self) -> String;
}

struct EnglishGreeter {
    instance: Arc<InstanceDependency>,
}

impl Greeter for EnglishGreeter {
    fn greet(&self) -> String {
        format!("hello, {}", self.instance.secret_message)
    }
}

impl Part for EnglishGreeter {
    fn compose(context: &CompositionContext<'_>) -> Result<Self, CoreError> {
        Ok(Self {
            instance: context.get_export::<InstanceDependency>()?,
        })
    }

    fn contracts(exports: &mut ContractSet<Self>) {
        exports.export::<dyn Greeter>(|greeter| greeter as Arc<dyn Greeter>);
    }
}

trait Plugin: Send + Sync {
    fn name(&self) -> &'static str;
}

macro_rules! plugin_part {
    ($name:ident, $label:expr) => {
        struct $name;

        impl Plugin for $name {
            fn name(&self) -> &'static str {
                $label
            }
        }

        impl Part for $name {
            fn compose(_context: &CompositionContext<'_>) -> Result<Self, CoreError> {
                Ok($name)
            }

            fn contracts(exports: &mut ContractSet<Self>) {
                exports.export::<dyn Plugin>(|plugin| plugin as Arc<dyn Plugin>);
            }
        }
    };
}

plugin_part!(AlphaPlugin, "alpha");
plugin_part!(BetaPlugin, "beta");

struct Motd(&'static str);

/// Registration task discovered from the type source
struct ExtraRegistrations;

impl RegistrationTask for ExtraRegistrations {
    fn type_registrations(&self) -> Vec<TypeRegistration> {
        vec![TypeRegistration::singleton::<dyn Greeter, EnglishGreeter>()]
    }

    fn collection_registrations(&self) -> Vec<CollectionTypeRegistration> {
        vec![CollectionTypeRegistration::new::<dyn Plugin>(Lifetime::Transient)
            .with::<AlphaPlugin>()
            .with::<BetaPlugin>()]
    }

    fn instance_registrations(&self) -> Vec<InstanceRegistration> {
        vec![InstanceRegistration::new::<Motd>(Arc::new(Motd("welcome")))]
    }
}

impl Part for ExtraRegistrations {
    fn compose(_context: &CompositionContext<'_>) -> Result<Self, CoreError> {
        Ok(ExtraRegistrations)
    }

    fn contracts(exports: &mut ContractSet<Self>) {
        exports.export::<dyn RegistrationTask>(|task| task as Arc<dyn RegistrationTask>);
    }
}

/// Per-request resource released when its scope goes away
struct RequestConnection {
    id: usize,
    trail: Arc<Trail>,
}

impl Disposable for RequestConnection {
    fn dispose(&self) -> Result<(), CoreError> {
        self.trail.push(format!("closed:{}", self.id));
        Ok(())
    }
}

impl Part for RequestConnection {
    fn compose(context: &CompositionContext<'_>) -> Result<Self, CoreError> {
        Ok(Self {
            id: next_id(),
            trail: context.get_export::<Trail>()?,
        })
    }

    fn contracts(exports: &mut ContractSet<Self>) {
        exports.disposable();
    }
}

struct FakeHooks {
    probe: Arc<EngineProbe>,
    trail: Arc<Trail>,
    settings: BootstrapSettings,
    extra_types: Vec<TypeRegistration>,
    extra_instances: Vec<InstanceRegistration>,
    with_configuration: bool,
}

impl FakeHooks {
    fn new() -> Self {
        Self {
            probe: Arc::new(EngineProbe::default()),
            trail: Arc::new(Trail::default()),
            settings: BootstrapSettings::default(),
            extra_types: Vec::new(),
            extra_instances: Vec::new(),
            with_configuration: true,
        }
    }
}

impl BootstrapperHooks for FakeHooks {
    fn internal_configuration(&self) -> Option<InternalConfiguration> {
        if !self.with_configuration {
            return None;
        }

        Some(
            InternalConfiguration::new()
                .with_engine::<FakeEngine>()
                .with_type(TypeRegistration::as_self::<TransientDependency>(Lifetime::Transient))
                .with_type(TypeRegistration::as_self::<SingletonDependency>(Lifetime::Singleton))
                .with_type(TypeRegistration::as_self::<PerRequestDependency>(Lifetime::PerRequest))
                .with_type(TypeRegistration::as_self::<RequestConnection>(Lifetime::PerRequest))
                .with_instance(InstanceRegistration::new::<InstanceDependency>(Arc::new(
                    InstanceDependency {
                        secret_message: SECRET_MESSAGE.to_string(),
                    },
                ))),
        )
    }

    fn settings(&self) -> BootstrapSettings {
        self.settings.clone()
    }

    fn additional_type_registrations(&self) -> Vec<TypeRegistration> {
        self.extra_types.clone()
    }

    fn instance_registrations(&self) -> Vec<InstanceRegistration> {
        let mut instances = vec![
            InstanceRegistration::new::<EngineProbe>(self.probe.clone()),
            InstanceRegistration::new::<Trail>(self.trail.clone()),
        ];
        instances.extend(self.extra_instances.iter().cloned());
        instances
    }

    fn type_sources(&self) -> Vec<Arc<dyn TypeSource>> {
        vec![Arc::new(
            StaticTypeSource::new("fakes")
                .with_part::<FakeModule>()
                .with_part::<AuditStartup>()
                .with_part::<RequestAudit>()
                .with_part::<ExtraRegistrations>(),
        )]
    }

    fn request_startup(
        &self,
        _container: &Container,
        pipelines: &mut Pipelines,
        _context: &RequestContext,
    ) -> Result<(), CoreError> {
        let trail = self.trail.clone();
        pipelines.add_after_request(move |_context| {
            trail.push("after");
            Ok(())
        });
        Ok(())
    }
}

fn initialised(hooks: FakeHooks) -> Bootstrapper {
    let bootstrapper = Bootstrapper::new(hooks);
    bootstrapper.initialise().unwrap();
    bootstrapper
}

#[test]
fn test_module_dependencies_respect_lifetimes() {
    let bootstrapper = initialised(FakeHooks::new());
    let first_request = RequestContext::new();
    let second_request = RequestContext::new();

    let first = bootstrapper.get_module::<FakeModule>(&first_request).unwrap();
    let again = bootstrapper.get_module::<FakeModule>(&first_request).unwrap();
    let other = bootstrapper.get_module::<FakeModule>(&second_request).unwrap();

    // Modules are shared per request, so transients differ across requests
    assert_ne!(first.transient.id, other.transient.id);
    assert!(Arc::ptr_eq(&first.singleton, &again.singleton));
    assert!(Arc::ptr_eq(&first.singleton, &other.singleton));
    assert!(Arc::ptr_eq(&first.per_request, &again.per_request));
    assert!(!Arc::ptr_eq(&first.per_request, &other.per_request));
    assert!(Arc::ptr_eq(&first.instance, &other.instance));
    assert_eq!(first.instance.secret_message, SECRET_MESSAGE);
    assert_eq!(other.instance.secret_message, SECRET_MESSAGE);
}

#[test]
fn test_transient_dependency_differs_per_resolution() {
    let bootstrapper = initialised(FakeHooks::new());
    let request = RequestContext::new();
    let scope = bootstrapper.request_scope(&request).unwrap();

    let first = scope.get_export::<TransientDependency>().unwrap();
    let second = scope.get_export::<TransientDependency>().unwrap();
    assert_ne!(first.id, second.id);
}

#[test]
fn test_get_all_modules_finds_consumer_modules_only() {
    let bootstrapper = initialised(FakeHooks::new());
    let request = RequestContext::new();

    let modules = bootstrapper.get_all_modules(&request).unwrap();
    assert_eq!(modules.len(), 1);
    assert_eq!(modules[0].module_path(), "/fake");
    assert!(modules[0].name().ends_with("FakeModule"));

    let by_id = bootstrapper
        .get_module_by_id(&ContractId::of::<FakeModule>(), &request)
        .unwrap();
    assert_eq!(by_id.module_path(), "/fake");
}

#[test]
fn test_diagnostics_module_is_available_but_not_listed() {
    let bootstrapper = initialised(FakeHooks::new());
    let request = RequestContext::new();

    let diagnostics = bootstrapper.get_module::<DiagnosticsModule>(&request).unwrap();
    assert_eq!(diagnostics.statistics().depth, 1);
    assert!(diagnostics.report().unwrap().contains("total_parts"));
    assert_eq!(bootstrapper.get_all_modules(&request).unwrap().len(), 1);
}

#[test]
fn test_diagnostics_can_be_disabled() {
    let mut hooks = FakeHooks::new();
    hooks.settings = BootstrapSettings::new().with_diagnostics(false);
    let bootstrapper = initialised(hooks);

    let result = bootstrapper.get_module::<DiagnosticsModule>(&RequestContext::new());
    assert!(matches!(result, Err(CoreError::ExportNotFound { .. })));
}

#[test]
fn test_engine_requires_initialisation() {
    let bootstrapper = Bootstrapper::new(FakeHooks::new());

    let error = bootstrapper.get_engine().unwrap_err();
    assert!(matches!(error, CoreError::NotInitialised { .. }));
    assert!(error.is_sequencing());
    assert!(!error.is_configuration());

    bootstrapper.initialise().unwrap();
    assert!(bootstrapper.get_engine().is_ok());
}

#[test]
fn test_engine_receives_request_pipelines() {
    let hooks = FakeHooks::new();
    let probe = hooks.probe.clone();
    let trail = hooks.trail.clone();
    let bootstrapper = initialised(hooks);
    let _engine = bootstrapper.get_engine().unwrap();

    let request = RequestContext::new();
    let pipelines = probe.pipelines_for(&request).unwrap();
    pipelines.run_before_request(&request).unwrap();
    pipelines.run_after_request(&request).unwrap();

    let module = bootstrapper.get_module::<FakeModule>(&request).unwrap();
    assert_eq!(
        trail.events(),
        vec![
            "application".to_string(),
            format!("request:{}", module.per_request.id),
            "after".to_string(),
        ]
    );
}

#[test]
fn test_request_pipelines_are_built_per_request() {
    let hooks = FakeHooks::new();
    let trail = hooks.trail.clone();
    let bootstrapper = initialised(hooks);

    let first = RequestContext::new();
    let second = RequestContext::new();
    let first_pipelines = bootstrapper.initialize_request_pipelines(&first).unwrap();
    let second_pipelines = bootstrapper.initialize_request_pipelines(&second).unwrap();
    assert_eq!(first_pipelines.len(), second_pipelines.len());

    first_pipelines.run_before_request(&first).unwrap();
    second_pipelines.run_before_request(&second).unwrap();

    let events = trail.events();
    let request_events: Vec<_> = events.iter().filter(|e| e.starts_with("request:")).collect();
    assert_eq!(request_events.len(), 2);
    assert_ne!(request_events[0], request_events[1]);
}

#[test]
fn test_registration_tasks_contribute_registrations() {
    let bootstrapper = initialised(FakeHooks::new());
    let container = bootstrapper.application_container().unwrap();

    let greeter = container.get_export::<dyn Greeter>().unwrap();
    assert_eq!(greeter.greet(), format!("hello, {}", SECRET_MESSAGE));

    let plugins: Vec<_> = container
        .get_exports::<dyn Plugin>()
        .unwrap()
        .iter()
        .map(|plugin| plugin.name())
        .collect();
    assert_eq!(plugins, vec!["alpha", "beta"]);

    assert_eq!(container.get_export::<Motd>().unwrap().0, "welcome");

    let stats = bootstrapper.stats().unwrap();
    assert_eq!(stats.registration_task_count, 1);
    assert_eq!(stats.application_startup_count, 1);
}

#[test]
fn test_registration_tasks_can_be_disabled() {
    let mut hooks = FakeHooks::new();
    hooks.settings = BootstrapSettings::new().with_registration_tasks(false);
    let bootstrapper = initialised(hooks);
    let container = bootstrapper.application_container().unwrap();

    assert!(!container.contains_contract::<dyn Greeter>());
    assert!(container.get_exports::<dyn Plugin>().unwrap().is_empty());
    assert_eq!(bootstrapper.stats().unwrap().registration_task_count, 0);
}

#[test]
fn test_conflicting_lifetimes_fail_initialisation() {
    let mut hooks = FakeHooks::new();
    hooks.extra_types = vec![TypeRegistration::as_self::<TransientDependency>(Lifetime::Singleton)];
    let bootstrapper = Bootstrapper::new(hooks);

    let error = bootstrapper.initialise().unwrap_err();
    assert!(matches!(error, CoreError::ConflictingLifetime { .. }));
    assert!(error.is_configuration());
    assert_eq!(bootstrapper.state(), BootstrapState::Uninitialised);
}

#[test]
fn test_duplicate_instances_fail_initialisation() {
    let mut hooks = FakeHooks::new();
    hooks.extra_instances = vec![InstanceRegistration::new::<InstanceDependency>(Arc::new(
        InstanceDependency {
            secret_message: "another".to_string(),
        },
    ))];
    let bootstrapper = Bootstrapper::new(hooks);

    assert!(matches!(
        bootstrapper.initialise(),
        Err(CoreError::DuplicateInstance { .. })
    ));
}

#[test]
fn test_missing_configuration_fails_initialisation() {
    let mut hooks = FakeHooks::new();
    hooks.with_configuration = false;
    let bootstrapper = Bootstrapper::new(hooks);

    let error = bootstrapper.initialise().unwrap_err();
    assert!(matches!(error, CoreError::InvalidConfiguration { .. }));
    assert_eq!(bootstrapper.state(), BootstrapState::Uninitialised);
    assert!(matches!(
        bootstrapper.get_engine(),
        Err(CoreError::NotInitialised { .. })
    ));
}

#[test]
fn test_initialise_runs_once() {
    let bootstrapper = initialised(FakeHooks::new());

    match bootstrapper.initialise() {
        Err(CoreError::InvalidState { expected, actual }) => {
            assert_eq!(expected, "uninitialised");
            assert_eq!(actual, "initialised");
        }
        other => panic!("expected invalid state, got {:?}", other),
    }
}

struct BrokenEngine;

impl Engine for BrokenEngine {
    fn set_request_pipelines_factory(&self, _factory: RequestPipelinesFactory) {}
}

impl Part for BrokenEngine {
    fn compose(_context: &CompositionContext<'_>) -> Result<Self, CoreError> {
        Err(CoreError::export_not_found("database"))
    }

    fn contracts(exports: &mut ContractSet<Self>) {
        exports.export::<dyn Engine>(|engine| engine as Arc<dyn Engine>);
    }
}

struct BrokenEngineHooks;

impl BootstrapperHooks for BrokenEngineHooks {
    fn internal_configuration(&self) -> Option<InternalConfiguration> {
        Some(InternalConfiguration::new().with_engine::<BrokenEngine>())
    }
}

#[test]
fn test_engine_failure_is_wrapped() {
    let bootstrapper = Bootstrapper::new(BrokenEngineHooks);
    bootstrapper.initialise().unwrap();

    let error = bootstrapper.get_engine().unwrap_err();
    assert!(matches!(error, CoreError::DependencyResolutionFailed { .. }));
    assert!(error.to_string().contains("Something went wrong"));
    assert!(matches!(error.root_cause(), CoreError::ExportNotFound { contract } if contract == "database"));
}

#[test]
fn test_request_scope_is_released_with_its_context() {
    let hooks = FakeHooks::new();
    let trail = hooks.trail.clone();
    let bootstrapper = initialised(hooks);

    let request = RequestContext::new();
    let connection_id = {
        let scope = bootstrapper.request_scope(&request).unwrap();
        let connection = scope.get_export::<RequestConnection>().unwrap();
        assert!(Arc::ptr_eq(
            &connection,
            &scope.get_export::<RequestConnection>().unwrap()
        ));
        connection.id
    };
    assert_eq!(bootstrapper.active_request_scopes(), 1);

    drop(request);
    assert_eq!(bootstrapper.active_request_scopes(), 0);
    assert_eq!(trail.events(), vec![format!("closed:{}", connection_id)]);
}

/// Application-wide resource shared by request parts
struct ConnectionPool {
    trail: Arc<Trail>,
}

impl Disposable for ConnectionPool {
    fn dispose(&self) -> Result<(), CoreError> {
        self.trail.push("singleton-pool");
        Ok(())
    }
}

impl Part for ConnectionPool {
    fn compose(context: &CompositionContext<'_>) -> Result<Self, CoreError> {
        Ok(Self {
            trail: context.get_export::<Trail>()?,
        })
    }

    fn contracts(exports: &mut ContractSet<Self>) {
        exports.disposable();
    }
}

/// Per-request part holding on to the pool
struct PooledSession {
    _pool: Arc<ConnectionPool>,
    trail: Arc<Trail>,
}

impl Disposable for PooledSession {
    fn dispose(&self) -> Result<(), CoreError> {
        self.trail.push("request-session");
        Ok(())
    }
}

impl Part for PooledSession {
    fn compose(context: &CompositionContext<'_>) -> Result<Self, CoreError> {
        Ok(Self {
            _pool: context.get_export::<ConnectionPool>()?,
            trail: context.get_export::<Trail>()?,
        })
    }

    fn contracts(exports: &mut ContractSet<Self>) {
        exports.disposable();
    }
}

#[test]
fn test_dispose_releases_request_scopes_before_singletons() {
    let mut hooks = FakeHooks::new();
    hooks.extra_types = vec![
        TypeRegistration::as_self::<ConnectionPool>(Lifetime::Singleton),
        TypeRegistration::as_self::<PooledSession>(Lifetime::PerRequest),
    ];
    let trail = hooks.trail.clone();
    let bootstrapper = initialised(hooks);

    let request = RequestContext::new();
    let scope = bootstrapper.request_scope(&request).unwrap();
    scope.get_export::<PooledSession>().unwrap();
    assert_eq!(bootstrapper.active_request_scopes(), 1);

    bootstrapper.dispose().unwrap();
    assert!(scope.is_disposed());
    assert_eq!(
        trail.events(),
        vec!["request-session".to_string(), "singleton-pool".to_string()]
    );

    drop(scope);
    drop(request);
    assert_eq!(trail.events().len(), 2);
}

#[test]
fn test_dispose_is_idempotent() {
    let bootstrapper = initialised(FakeHooks::new());

    bootstrapper.dispose().unwrap();
    bootstrapper.dispose().unwrap();
    assert_eq!(bootstrapper.state(), BootstrapState::Disposed);

    let error = bootstrapper.get_engine().unwrap_err();
    assert!(matches!(error, CoreError::InvalidState { .. }));
}

/// Calls back into the bootstrapper while it is being disposed
struct ReentrantCloser {
    handle: Arc<BootstrapperHandle>,
}

#[derive(Default)]
struct BootstrapperHandle {
    bootstrapper: Mutex<Option<Weak<Bootstrapper>>>,
    observed: Mutex<Vec<String>>,
}

impl Disposable for ReentrantCloser {
    fn dispose(&self) -> Result<(), CoreError> {
        let bootstrapper = self
            .handle
            .bootstrapper
            .lock()
            .unwrap()
            .as_ref()
            .and_then(Weak::upgrade);
        if let Some(bootstrapper) = bootstrapper {
            let outcome = bootstrapper.dispose();
            self.handle
                .observed
                .lock()
                .unwrap()
                .push(format!("{:?}:{}", outcome.is_ok(), bootstrapper.state()));
        }
        Ok(())
    }
}

impl Part for ReentrantCloser {
    fn compose(context: &CompositionContext<'_>) -> Result<Self, CoreError> {
        Ok(Self {
            handle: context.get_export::<BootstrapperHandle>()?,
        })
    }

    fn contracts(exports: &mut ContractSet<Self>) {
        exports.disposable();
    }
}

#[test]
fn test_reentrant_dispose_is_a_no_op() {
    let handle = Arc::new(BootstrapperHandle::default());
    let mut hooks = FakeHooks::new();
    hooks.extra_types = vec![TypeRegistration::as_self::<ReentrantCloser>(Lifetime::Singleton)];
    hooks.extra_instances = vec![InstanceRegistration::new::<BootstrapperHandle>(handle.clone())];

    let bootstrapper = Arc::new(Bootstrapper::new(hooks));
    *handle.bootstrapper.lock().unwrap() = Some(Arc::downgrade(&bootstrapper));
    bootstrapper.initialise().unwrap();

    bootstrapper
        .application_container()
        .unwrap()
        .get_export::<ReentrantCloser>()
        .unwrap();

    bootstrapper.dispose().unwrap();
    assert_eq!(bootstrapper.state(), BootstrapState::Disposed);
    assert_eq!(
        handle.observed.lock().unwrap().clone(),
        vec!["true:disposing".to_string()]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_share_singletons_only() {
    let bootstrapper = Arc::new(initialised(FakeHooks::new()));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let bootstrapper = bootstrapper.clone();
        handles.push(tokio::spawn(async move {
            let request = RequestContext::new();
            let first = bootstrapper.get_module::<FakeModule>(&request).unwrap();
            let second = bootstrapper.get_module::<FakeModule>(&request).unwrap();
            assert!(Arc::ptr_eq(&first.per_request, &second.per_request));
            (first.singleton.id, first.per_request.id)
        }));
    }

    let mut singletons = Vec::new();
    let mut per_request = Vec::new();
    for handle in handles {
        let (singleton, request) = handle.await.unwrap();
        singletons.push(singleton);
        per_request.push(request);
    }

    singletons.dedup();
    assert_eq!(singletons.len(), 1);
    per_request.sort_unstable();
    per_request.dedup();
    assert_eq!(per_request.len(), 8);
    assert_eq!(bootstrapper.active_request_scopes(), 0);
}
