//! In-process host fed by an external event source
//!
//! The WebDriver bridge drains page-side queues into these types, and tests
//! drive them directly. Each one behaves like the browser facility it stands
//! in for: a slot holding whatever handler is currently installed, an
//! observer registry, a timeline with subscribers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::trace;

use super::{
    ConsoleCall, Handler, HostEnvironment, HostError, InterceptPoint, MutationCallback,
    MutationSource, ObserveOptions, ObserverId, PerformanceEntry, PerformanceTimeline, RawMutation,
    RequestEvent,
};
use crate::lock;

/// Replaceable handler slot
pub struct RelayPoint<E> {
    current: Mutex<Handler<E>>,
}

impl<E: 'static> RelayPoint<E> {
    /// Create a slot whose original behavior is `original`
    pub fn new(original: Handler<E>) -> Self {
        Self {
            current: Mutex::new(original),
        }
    }

    /// Create a slot whose original behavior does nothing
    pub fn silent() -> Self {
        Self::new(Arc::new(|_: &E| {}))
    }

    /// Dispatch an event to whatever handler is installed
    pub fn emit(&self, event: &E) {
        // Clone out so a handler may call replace() without deadlocking
        let handler = Arc::clone(&lock(&self.current));
        handler(event);
    }

    /// Whether `handler` is the one currently installed
    pub fn is_installed(&self, handler: &Handler<E>) -> bool {
        Arc::ptr_eq(&lock(&self.current), handler)
    }
}

impl<E: 'static> InterceptPoint<E> for RelayPoint<E> {
    fn replace(&self, handler: Handler<E>) -> Result<Handler<E>, HostError> {
        Ok(std::mem::replace(&mut *lock(&self.current), handler))
    }
}

/// Observer registry standing in for a mutation observation facility
#[derive(Default)]
pub struct RelayMutations {
    observers: Mutex<Vec<(ObserverId, ObserveOptions, MutationCallback)>>,
    next_id: AtomicU64,
}

impl RelayMutations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver one batch to every connected observer
    pub fn deliver(&self, batch: &[RawMutation]) {
        if batch.is_empty() {
            return;
        }
        let callbacks: Vec<MutationCallback> = lock(&self.observers)
            .iter()
            .map(|(_, _, callback)| Arc::clone(callback))
            .collect();
        trace!(
            "Delivering {} mutations to {} observers",
            batch.len(),
            callbacks.len()
        );
        for callback in callbacks {
            callback(batch);
        }
    }

    pub fn observer_count(&self) -> usize {
        lock(&self.observers).len()
    }
}

impl MutationSource for RelayMutations {
    fn observe(
        &self,
        options: ObserveOptions,
        callback: MutationCallback,
    ) -> Result<ObserverId, HostError> {
        let id = ObserverId(self.next_id.fetch_add(1, Ordering::Relaxed));
        lock(&self.observers).push((id, options, callback));
        Ok(id)
    }

    fn disconnect(&self, id: ObserverId) {
        lock(&self.observers).retain(|(observer, _, _)| *observer != id);
    }
}

/// Performance timeline with change notifications
#[derive(Default)]
pub struct RelayTimeline {
    entries: Mutex<Vec<PerformanceEntry>>,
    subscribers: Mutex<Vec<(ObserverId, Handler<()>)>>,
    next_id: AtomicU64,
}

impl RelayTimeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge entries into the timeline and notify subscribers of changes
    ///
    /// Entries are keyed by type, name and start time. A host that resends its
    /// whole timeline on every poll only updates entries that changed, e.g. a
    /// navigation entry whose `loadEventEnd` arrived late.
    pub fn record(&self, entries: Vec<PerformanceEntry>) {
        let mut changed = false;
        {
            let mut held = lock(&self.entries);
            for entry in entries {
                let existing = held.iter_mut().find(|e| {
                    e.entry_type == entry.entry_type
                        && e.name == entry.name
                        && e.start_time == entry.start_time
                });
                match existing {
                    Some(existing) if *existing == entry => {}
                    Some(existing) => {
                        *existing = entry;
                        changed = true;
                    }
                    None => {
                        held.push(entry);
                        changed = true;
                    }
                }
            }
        }
        if changed {
            self.notify();
        }
    }

    /// Drop every entry, e.g. after a navigation
    pub fn reset(&self) {
        let had_entries = {
            let mut held = lock(&self.entries);
            let had_entries = !held.is_empty();
            held.clear();
            had_entries
        };
        if had_entries {
            self.notify();
        }
    }

    fn notify(&self) {
        let subscribers: Vec<Handler<()>> = lock(&self.subscribers)
            .iter()
            .map(|(_, handler)| Arc::clone(handler))
            .collect();
        for handler in subscribers {
            handler(&());
        }
    }
}

impl PerformanceTimeline for RelayTimeline {
    fn entries(&self) -> Result<Vec<PerformanceEntry>, HostError> {
        Ok(lock(&self.entries).clone())
    }

    fn subscribe(&self, handler: Handler<()>) -> Result<ObserverId, HostError> {
        let id = ObserverId(self.next_id.fetch_add(1, Ordering::Relaxed));
        lock(&self.subscribers).push((id, handler));
        Ok(id)
    }

    fn unsubscribe(&self, id: ObserverId) {
        lock(&self.subscribers).retain(|(subscriber, _)| *subscriber != id);
    }
}

/// One relay of each capability
pub struct RelayHost {
    pub console: Arc<RelayPoint<ConsoleCall>>,
    pub xhr: Arc<RelayPoint<RequestEvent>>,
    pub fetch: Arc<RelayPoint<RequestEvent>>,
    pub mutations: Arc<RelayMutations>,
    pub timeline: Arc<RelayTimeline>,
}

impl RelayHost {
    /// A host whose original console and request behavior is a no-op
    pub fn new() -> Self {
        Self::with_console(RelayPoint::silent())
    }

    /// A host with a custom original console handler
    pub fn with_console(console: RelayPoint<ConsoleCall>) -> Self {
        Self {
            console: Arc::new(console),
            xhr: Arc::new(RelayPoint::silent()),
            fetch: Arc::new(RelayPoint::silent()),
            mutations: Arc::new(RelayMutations::new()),
            timeline: Arc::new(RelayTimeline::new()),
        }
    }

    /// Expose every relay as a host capability
    pub fn environment(&self) -> HostEnvironment {
        HostEnvironment {
            console: Some(self.console.clone()),
            xhr: Some(self.xhr.clone()),
            fetch: Some(self.fetch.clone()),
            mutations: Some(self.mutations.clone()),
            performance: Some(self.timeline.clone()),
        }
    }
}

impl Default for RelayHost {
    fn default() -> Self {
        Self::new()
    }
}
