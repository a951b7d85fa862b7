//! Performance monitor
//!
//! Not a log. Holds exactly one summary derived from the host timeline and
//! overwrites it whenever the timeline reports new entries. Hosts that cannot
//! notify get a lazily computed summary and explicit [`PerformanceMonitor::refresh`].

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use tracing::{debug, warn};

use crate::host::{HostError, ObserverId, PerformanceEntry, PerformanceTimeline};
use crate::lock;

/// Page timing metrics in milliseconds; zero until the host has measured them
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceSummary {
    pub page_load: f64,
    pub ttfb: f64,
    pub first_paint: f64,
    pub first_contentful_paint: f64,
    pub largest_contentful_paint: f64,
    pub first_input_delay: f64,
    /// Unitless layout shift score
    pub cumulative_layout_shift: f64,
    pub resource_count: usize,
}

impl PerformanceSummary {
    /// Derive a summary from raw timeline entries
    pub fn from_entries(entries: &[PerformanceEntry]) -> Self {
        let mut summary = PerformanceSummary::default();

        if let Some(nav) = entries.iter().find(|e| e.entry_type == "navigation") {
            summary.page_load = nav.load_event_end.unwrap_or(0.0).max(0.0);
            if let (Some(request), Some(response)) = (nav.request_start, nav.response_start) {
                summary.ttfb = (response - request).max(0.0);
            }
        }

        for entry in entries.iter().filter(|e| e.entry_type == "paint") {
            match entry.name.as_str() {
                "first-paint" => summary.first_paint = entry.start_time,
                "first-contentful-paint" => summary.first_contentful_paint = entry.start_time,
                _ => {}
            }
        }

        if let Some(lcp) = entries
            .iter()
            .rev()
            .find(|e| e.entry_type == "largest-contentful-paint")
        {
            summary.largest_contentful_paint = lcp
                .render_time
                .filter(|t| *t > 0.0)
                .or(lcp.load_time.filter(|t| *t > 0.0))
                .unwrap_or(lcp.start_time);
        }

        if let Some(input) = entries.iter().find(|e| e.entry_type == "first-input")
            && let Some(processing_start) = input.processing_start
        {
            summary.first_input_delay = (processing_start - input.start_time).max(0.0);
        }

        summary.cumulative_layout_shift = entries
            .iter()
            .filter(|e| e.entry_type == "layout-shift" && e.had_recent_input != Some(true))
            .filter_map(|e| e.value)
            .sum();

        summary.resource_count = entries.iter().filter(|e| e.entry_type == "resource").count();

        summary
    }
}

struct PerformanceState {
    timeline: Option<Arc<dyn PerformanceTimeline>>,
    current: Mutex<Option<PerformanceSummary>>,
}

impl PerformanceState {
    fn refresh(&self) -> PerformanceSummary {
        let summary = match &self.timeline {
            Some(timeline) => match timeline.entries() {
                Ok(entries) => PerformanceSummary::from_entries(&entries),
                Err(e) => {
                    debug!("Performance timeline unreadable: {}", e);
                    PerformanceSummary::default()
                }
            },
            None => PerformanceSummary::default(),
        };
        *lock(&self.current) = Some(summary.clone());
        summary
    }
}

pub struct PerformanceMonitor {
    state: Arc<PerformanceState>,
    subscription: Mutex<Option<ObserverId>>,
    active: AtomicBool,
}

impl PerformanceMonitor {
    pub fn new(timeline: Option<Arc<dyn PerformanceTimeline>>) -> Self {
        Self {
            state: Arc::new(PerformanceState {
                timeline,
                current: Mutex::new(None),
            }),
            subscription: Mutex::new(None),
            active: AtomicBool::new(false),
        }
    }

    pub fn start(&self) {
        let Some(timeline) = &self.state.timeline else {
            warn!("Performance timeline unavailable, performance monitor stays inactive");
            return;
        };
        if self.active.swap(true, Ordering::SeqCst) {
            return;
        }

        let weak: Weak<PerformanceState> = Arc::downgrade(&self.state);
        let on_entries = Arc::new(move |_: &()| {
            if let Some(state) = weak.upgrade() {
                state.refresh();
            }
        });
        match timeline.subscribe(on_entries) {
            Ok(id) => *lock(&self.subscription) = Some(id),
            Err(HostError::Unavailable(what)) => {
                debug!("No {}, performance summary refreshes on demand", what)
            }
            Err(e) => warn!("Could not observe performance timeline: {}", e),
        }

        self.state.refresh();
        debug!("Performance monitor started");
    }

    pub fn stop(&self) {
        if !self.active.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(id) = lock(&self.subscription).take()
            && let Some(timeline) = &self.state.timeline
        {
            timeline.unsubscribe(id);
        }
        debug!("Performance monitor stopped");
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Current snapshot
    ///
    /// Computed on first use. While started against a timeline that cannot
    /// notify, every read recomputes so new entries are picked up.
    pub fn get_summary(&self) -> PerformanceSummary {
        if self.is_active() && lock(&self.subscription).is_none() {
            return self.state.refresh();
        }
        if let Some(summary) = lock(&self.state.current).as_ref() {
            return summary.clone();
        }
        self.state.refresh()
    }

    /// Recompute the snapshot from the timeline now
    pub fn refresh(&self) -> PerformanceSummary {
        self.state.refresh()
    }

    /// Forget the snapshot; the next read recomputes it
    pub fn clear(&self) {
        *lock(&self.state.current) = None;
    }
}

#[cfg(test)]
#[path = "performance_test.rs"]
mod performance_test;
