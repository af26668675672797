use crate::errors::CoreError;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use uuid::Uuid;

/// Stable identity of one request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Create a new random request ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Underlying UUID
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for RequestId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "request-{}", self.0)
    }
}

type EndCallback = Box<dyn FnOnce(RequestId) + Send>;

/// Per-request state handed through the pipelines.
///
/// Dropping the context ends the request: every callback registered with
/// [`RequestContext::on_end`] runs once, in registration order.
pub struct RequestContext {
    id: RequestId,
    items: RwLock<HashMap<String, Arc<dyn Any + Send + Sync>>>,
    end_callbacks: Mutex<Vec<EndCallback>>,
}

impl RequestContext {
    /// Create a new request context with a fresh identity
    pub fn new() -> Self {
        Self::with_id(RequestId::new())
    }

    /// Create a request context with a known identity
    pub fn with_id(id: RequestId) -> Self {
        Self {
            id,
            items: RwLock::new(HashMap::new()),
            end_callbacks: Mutex::new(Vec::new()),
        }
    }

    /// Request identity
    pub fn id(&self) -> RequestId {
        self.id
    }

    /// Store an item under `key`, replacing any previous value
    pub fn set_item<T: Any + Send + Sync>(&self, key: impl Into<String>, value: T) -> Result<(), CoreError> {
        let mut items = self
            .items
            .write()
            .map_err(|_| CoreError::lock("request_items"))?;
        items.insert(key.into(), Arc::new(value));
        Ok(())
    }

    /// Item stored under `key`, if it has type `T`
    pub fn item<T: Any + Send + Sync>(&self, key: &str) -> Result<Option<Arc<T>>, CoreError> {
        let items = self
            .items
            .read()
            .map_err(|_| CoreError::lock("request_items"))?;
        Ok(items
            .get(key)
            .and_then(|item| item.clone().downcast::<T>().ok()))
    }

    /// Remove the item stored under `key`
    pub fn remove_item(&self, key: &str) -> Result<bool, CoreError> {
        let mut items = self
            .items
            .write()
            .map_err(|_| CoreError::lock("request_items"))?;
        Ok(items.remove(key).is_some())
    }

    /// Run `callback` when the request ends
    pub fn on_end<F>(&self, callback: F) -> Result<(), CoreError>
    where
        F: FnOnce(RequestId) + Send + 'static,
    {
        let mut callbacks = self
            .end_callbacks
            .lock()
            .map_err(|_| CoreError::lock("request_end_callbacks"))?;
        callbacks.push(Box::new(callback));
        Ok(())
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for RequestContext {
    fn drop(&mut self) {
        let callbacks = std::mem::take(
            self.end_callbacks
                .get_mut()
                .unwrap_or_else(PoisonError::into_inner),
        );
        for callback in callbacks {
            callback(self.id);
        }
    }
}

impl std::fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let item_count = self.items.read().map(|items| items.len()).unwrap_or_default();
        f.debug_struct("RequestContext")
            .field("id", &self.id)
            .field("items", &item_count)
            .finish()
    }
}
