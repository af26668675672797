use crate::errors::CoreError;
use std::sync::{Arc, Mutex, PoisonError};

/// Trait for parts that need cleanup when their owning scope goes away
pub trait Disposable: Send + Sync {
    /// Dispose of the part and clean up resources
    fn dispose(&self) -> Result<(), CoreError>;
}

/// Disposable instances created by one scope, disposed in reverse creation order.
///
/// Once drained the tracker is closed: instances tracked afterwards are
/// disposed on the spot.
pub struct DisposalTracker {
    state: Mutex<TrackerState>,
}

#[derive(Default)]
struct TrackerState {
    entries: Vec<(&'static str, Arc<dyn Disposable>)>,
    closed: bool,
}

impl std::fmt::Debug for DisposalTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DisposalTracker")
            .field("tracked", &self.len())
            .finish()
    }
}

impl DisposalTracker {
    /// Create a new, empty tracker
    pub fn new() -> Self {
        Self {
            state: Mutex::new(TrackerState::default()),
        }
    }

    /// Track an instance for disposal.
    ///
    /// Fails with [`CoreError::ContainerDisposed`] after disposing the
    /// instance when the tracker was already drained.
    pub fn track(
        &self,
        component: &'static str,
        disposable: Arc<dyn Disposable>,
    ) -> Result<(), CoreError> {
        {
            let mut state = self
                .state
                .lock()
                .map_err(|_| CoreError::lock("disposal_tracker"))?;
            if !state.closed {
                state.entries.push((component, disposable));
                return Ok(());
            }
        }

        tracing::debug!("'{}' created after its scope was disposed", component);
        if let Err(error) = disposable.dispose() {
            tracing::warn!("Failed to dispose '{}': {}", component, error);
        }
        Err(CoreError::ContainerDisposed)
    }

    /// Check if the tracker was drained
    pub fn is_closed(&self) -> bool {
        self.state
            .lock()
            .map(|state| state.closed)
            .unwrap_or(true)
    }

    /// Number of instances awaiting disposal
    pub fn len(&self) -> usize {
        self.state
            .lock()
            .map(|state| state.entries.len())
            .unwrap_or_default()
    }

    /// Check if nothing awaits disposal
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Dispose every tracked instance, newest first.
    ///
    /// All instances are disposed even when some fail; the first failure is
    /// returned and the others are logged.
    pub fn dispose_all(&self) -> Result<(), CoreError> {
        let entries = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            state.closed = true;
            std::mem::take(&mut state.entries)
        };

        let mut first_error = None;
        for (component, disposable) in entries.into_iter().rev() {
            if let Err(error) = disposable.dispose() {
                tracing::warn!("Failed to dispose '{}': {}", component, error);
                if first_error.is_none() {
                    first_error = Some(CoreError::disposal(component, error));
                }
            }
        }

        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

impl Default for DisposalTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Recorder {
        name: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
        fail: bool,
    }

    impl Disposable for Recorder {
        fn dispose(&self) -> Result<(), CoreError> {
            self.log.lock().unwrap().push(self.name);
            if self.fail {
                return Err(CoreError::invalid_configuration("socket already closed"));
            }
            Ok(())
        }
    }

    fn recorder(name: &'static str, log: &Arc<Mutex<Vec<&'static str>>>, fail: bool) -> Arc<dyn Disposable> {
        Arc::new(Recorder {
            name,
            log: log.clone(),
            fail,
        })
    }

    #[test]
    fn test_dispose_all_in_reverse_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let tracker = DisposalTracker::new();
        tracker.track("first", recorder("first", &log, false)).unwrap();
        tracker.track("second", recorder("second", &log, false)).unwrap();
        tracker.track("third", recorder("third", &log, false)).unwrap();

        assert_eq!(tracker.len(), 3);
        tracker.dispose_all().unwrap();

        assert_eq!(*log.lock().unwrap(), vec!["third", "second", "first"]);
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_dispose_all_continues_after_failure() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let tracker = DisposalTracker::new();
        tracker.track("first", recorder("first", &log, false)).unwrap();
        tracker.track("broken", recorder("broken", &log, true)).unwrap();
        tracker.track("last", recorder("last", &log, false)).unwrap();

        let result = tracker.dispose_all();
        assert!(matches!(result, Err(CoreError::Disposal { ref component, .. }) if component == "broken"));
        assert_eq!(*log.lock().unwrap(), vec!["last", "broken", "first"]);

        // Nothing is disposed twice
        assert!(tracker.dispose_all().is_ok());
        assert_eq!(log.lock().unwrap().len(), 3);
    }

    #[test]
    fn test_track_after_drain_disposes_immediately() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let tracker = DisposalTracker::new();
        tracker.track("early", recorder("early", &log, false)).unwrap();
        tracker.dispose_all().unwrap();
        assert!(tracker.is_closed());

        let result = tracker.track("late", recorder("late", &log, false));
        assert!(matches!(result, Err(CoreError::ContainerDisposed)));
        assert_eq!(*log.lock().unwrap(), vec!["early", "late"]);
        assert!(tracker.is_empty());
    }
}
