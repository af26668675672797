use crate::bootstrap::RequestContext;
use crate::errors::CoreError;
use std::sync::Arc;

/// Hook run for a request
pub type PipelineHook = Arc<dyn Fn(&RequestContext) -> Result<(), CoreError> + Send + Sync>;

/// Builds the pipelines for one request
pub type RequestPipelinesFactory =
    Arc<dyn Fn(&RequestContext) -> Result<Pipelines, CoreError> + Send + Sync>;

/// Ordered request hooks.
///
/// Application startup tasks fill the application-level pipelines once;
/// every request starts from a clone of them.
#[derive(Clone, Default)]
pub struct Pipelines {
    before_request: Vec<PipelineHook>,
    after_request: Vec<PipelineHook>,
}

impl Pipelines {
    /// Create empty pipelines
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a hook run before the request is handled
    pub fn add_before_request<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(&RequestContext) -> Result<(), CoreError> + Send + Sync + 'static,
    {
        self.before_request.push(Arc::new(hook));
        self
    }

    /// Insert a hook that runs before every other before-request hook
    pub fn add_before_request_to_start<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(&RequestContext) -> Result<(), CoreError> + Send + Sync + 'static,
    {
        self.before_request.insert(0, Arc::new(hook));
        self
    }

    /// Append a hook run after the request is handled
    pub fn add_after_request<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(&RequestContext) -> Result<(), CoreError> + Send + Sync + 'static,
    {
        self.after_request.push(Arc::new(hook));
        self
    }

    /// Before-request hooks, in run order
    pub fn before_request(&self) -> &[PipelineHook] {
        &self.before_request
    }

    /// After-request hooks, in run order
    pub fn after_request(&self) -> &[PipelineHook] {
        &self.after_request
    }

    /// Run the before-request hooks, stopping at the first failure
    pub fn run_before_request(&self, context: &RequestContext) -> Result<(), CoreError> {
        self.before_request.iter().try_for_each(|hook| hook(context))
    }

    /// Run the after-request hooks, stopping at the first failure
    pub fn run_after_request(&self, context: &RequestContext) -> Result<(), CoreError> {
        self.after_request.iter().try_for_each(|hook| hook(context))
    }

    /// Total number of hooks
    pub fn len(&self) -> usize {
        self.before_request.len() + self.after_request.len()
    }

    /// Check if no hook is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for Pipelines {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipelines")
            .field("before_request", &self.before_request.len())
            .field("after_request", &self.after_request.len())
            .finish()
    }
}
