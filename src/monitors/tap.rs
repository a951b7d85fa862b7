use std::sync::{Arc, Mutex, OnceLock};

use crate::host::{Handler, HostError, InterceptPoint};
use crate::lock;

/// Non-suppressing tap on a host slot
///
/// `install` puts a handler in the slot that first forwards to whatever was
/// there before, then runs the observer. `remove` puts the saved original
/// back. Both are idempotent.
pub(crate) struct Wiretap<E> {
    point: Arc<dyn InterceptPoint<E>>,
    saved: Mutex<Option<Handler<E>>>,
}

impl<E: 'static> Wiretap<E> {
    pub(crate) fn new(point: Arc<dyn InterceptPoint<E>>) -> Self {
        Self {
            point,
            saved: Mutex::new(None),
        }
    }

    /// Returns false when the tap was already installed
    pub(crate) fn install<F>(&self, observer: F) -> Result<bool, HostError>
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let mut saved = lock(&self.saved);
        if saved.is_some() {
            return Ok(false);
        }

        let original: Arc<OnceLock<Handler<E>>> = Arc::new(OnceLock::new());
        let forward_to = Arc::clone(&original);
        let tap: Handler<E> = Arc::new(move |event: &E| {
            if let Some(original) = forward_to.get() {
                original(event);
            }
            observer(event);
        });

        let previous = self.point.replace(tap)?;
        let _ = original.set(Arc::clone(&previous));
        *saved = Some(previous);
        Ok(true)
    }

    /// Restore the handler that was in place before `install`
    pub(crate) fn remove(&self) -> Result<(), HostError> {
        let mut saved = lock(&self.saved);
        if let Some(original) = saved.take()
            && let Err(e) = self.point.replace(Arc::clone(&original))
        {
            // Keep the original so a later remove() can retry
            *saved = Some(original);
            return Err(e);
        }
        Ok(())
    }

    pub(crate) fn is_installed(&self) -> bool {
        lock(&self.saved).is_some()
    }
}

#[cfg(test)]
#[path = "tap_test.rs"]
mod tap_test;
