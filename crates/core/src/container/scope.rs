use crate::bootstrap::{RequestContext, RequestId};
use crate::container::{Container, ScopeFactory};
use crate::errors::CoreError;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use once_cell::sync::OnceCell;
use std::sync::Arc;

/// Hands out one child scope per request context.
///
/// The scope lives until the request context is dropped: creating a scope
/// registers an end-of-request callback on the context that evicts the cache
/// entry, which disposes the scope once the last handle to it is gone.
pub struct RequestScopeManager {
    application: Container,
    boundary: String,
    factory: OnceCell<Arc<ScopeFactory>>,
    scopes: Arc<DashMap<RequestId, Container>>,
}

impl RequestScopeManager {
    /// Create a manager creating scopes under `boundary` from `application`
    pub fn new(application: Container, boundary: impl Into<String>) -> Self {
        Self {
            application,
            boundary: boundary.into(),
            factory: OnceCell::new(),
            scopes: Arc::new(DashMap::new()),
        }
    }

    /// Boundary carried by every request scope
    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Container request scopes are created from
    pub fn application(&self) -> &Container {
        &self.application
    }

    /// Scope factory for the per-request boundary, fetched on first use
    pub fn scope_factory(&self) -> Result<Arc<ScopeFactory>, CoreError> {
        self.factory
            .get_or_try_init(|| {
                self.application
                    .get_export_named::<ScopeFactory>(&self.boundary)
            })
            .cloned()
    }

    /// Scope for `context`, created on first request
    pub fn scope_for(&self, context: &RequestContext) -> Result<Container, CoreError> {
        let id = context.id();
        if let Some(existing) = self.scopes.get(&id) {
            return Ok(existing.clone());
        }

        let factory = self.scope_factory()?;
        let scope = match self.scopes.entry(id) {
            Entry::Occupied(entry) => return Ok(entry.get().clone()),
            Entry::Vacant(entry) => {
                let scope = factory.create_scope()?;
                entry.insert(scope.clone());
                scope
            }
        };

        let scopes = Arc::downgrade(&self.scopes);
        let registered = context.on_end(move |id| {
            if let Some(scopes) = scopes.upgrade() {
                if scopes.remove(&id).is_some() {
                    tracing::debug!("Released request scope for {}", id);
                }
            }
        });

        if let Err(error) = registered {
            self.scopes.remove(&id);
            return Err(error);
        }

        tracing::debug!("Created request scope {} for {}", scope.id(), id);
        Ok(scope)
    }

    /// Evict the scope of `id` without waiting for the request to end
    pub fn release(&self, id: RequestId) -> Option<Container> {
        self.scopes.remove(&id).map(|(_, scope)| scope)
    }

    /// Number of cached request scopes
    pub fn active_scopes(&self) -> usize {
        self.scopes.len()
    }

    /// Evict and dispose every cached request scope.
    ///
    /// Scopes already disposed are skipped. Every scope is visited even when
    /// one fails; the first failure is returned.
    pub fn dispose_all(&self) -> Result<(), CoreError> {
        let ids: Vec<RequestId> = self.scopes.iter().map(|entry| *entry.key()).collect();
        let mut first_error = None;

        for id in ids {
            let Some((_, scope)) = self.scopes.remove(&id) else {
                continue;
            };
            match scope.dispose() {
                Ok(()) => tracing::debug!("Disposed request scope {} for {}", scope.id(), id),
                Err(error) if error.is_container_disposed() => {}
                Err(error) => {
                    tracing::warn!(
                        "Request scope {} for {} failed to dispose: {}",
                        scope.id(),
                        id,
                        error
                    );
                    first_error.get_or_insert(error);
                }
            }
        }

        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for RequestScopeManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestScopeManager")
            .field("application", &self.application.id())
            .field("boundary", &self.boundary)
            .field("active_scopes", &self.scopes.len())
            .finish()
    }
}
