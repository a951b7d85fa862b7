// Unit tests for the performance monitor

use super::*;
use crate::host::RelayTimeline;
use pretty_assertions::assert_eq;

fn navigation(request_start: f64, response_start: f64, load_event_end: f64) -> PerformanceEntry {
    PerformanceEntry {
        request_start: Some(request_start),
        response_start: Some(response_start),
        load_event_end: Some(load_event_end),
        ..PerformanceEntry::new("navigation", "https://app.local/", 0.0)
    }
}

fn layout_shift(start_time: f64, value: f64, had_recent_input: bool) -> PerformanceEntry {
    PerformanceEntry {
        value: Some(value),
        had_recent_input: Some(had_recent_input),
        ..PerformanceEntry::new("layout-shift", "", start_time)
    }
}

fn full_timeline() -> Vec<PerformanceEntry> {
    vec![
        navigation(20.0, 100.0, 1250.0),
        PerformanceEntry::new("paint", "first-paint", 310.0),
        PerformanceEntry::new("paint", "first-contentful-paint", 340.0),
        PerformanceEntry::new("resource", "https://app.local/app.js", 50.0),
        PerformanceEntry::new("resource", "https://app.local/app.css", 55.0),
        PerformanceEntry {
            render_time: Some(600.0),
            ..PerformanceEntry::new("largest-contentful-paint", "", 600.0)
        },
        PerformanceEntry {
            render_time: Some(0.0),
            load_time: Some(910.0),
            ..PerformanceEntry::new("largest-contentful-paint", "", 905.0)
        },
        PerformanceEntry {
            processing_start: Some(1512.0),
            ..PerformanceEntry::new("first-input", "pointerdown", 1500.0)
        },
        layout_shift(400.0, 0.05, false),
        layout_shift(700.0, 0.02, false),
        layout_shift(1600.0, 0.5, true),
    ]
}

#[test]
fn test_summary_from_entries() {
    let summary = PerformanceSummary::from_entries(&full_timeline());
    assert_eq!(summary.page_load, 1250.0);
    assert_eq!(summary.ttfb, 80.0);
    assert_eq!(summary.first_paint, 310.0);
    assert_eq!(summary.first_contentful_paint, 340.0);
    assert_eq!(summary.largest_contentful_paint, 910.0);
    assert_eq!(summary.first_input_delay, 12.0);
    assert!((summary.cumulative_layout_shift - 0.07).abs() < 1e-9);
    assert_eq!(summary.resource_count, 2);
}

#[test]
fn test_missing_measurements_default_to_zero() {
    assert_eq!(
        PerformanceSummary::from_entries(&[]),
        PerformanceSummary::default()
    );

    let monitor = PerformanceMonitor::new(None);
    monitor.start();
    assert!(!monitor.is_active());
    assert_eq!(monitor.get_summary(), PerformanceSummary::default());
    monitor.stop();
    monitor.stop();
}

#[test]
fn test_lazy_summary_without_start() {
    let timeline = Arc::new(RelayTimeline::new());
    timeline.record(full_timeline());
    let monitor = PerformanceMonitor::new(Some(timeline));

    assert_eq!(monitor.get_summary().resource_count, 2);
}

#[test]
fn test_started_monitor_follows_timeline_updates() {
    let timeline = Arc::new(RelayTimeline::new());
    let monitor = PerformanceMonitor::new(Some(timeline.clone()));
    monitor.start();
    assert!(monitor.is_active());
    assert_eq!(monitor.get_summary().page_load, 0.0);

    timeline.record(vec![navigation(10.0, 60.0, 900.0)]);
    let summary = monitor.get_summary();
    assert_eq!(summary.page_load, 900.0);
    assert_eq!(summary.ttfb, 50.0);

    // After stop the snapshot is no longer refreshed by notifications
    monitor.stop();
    timeline.record(vec![PerformanceEntry::new("resource", "/late.js", 950.0)]);
    assert_eq!(monitor.get_summary().resource_count, 0);
    assert_eq!(monitor.refresh().resource_count, 1);
}

struct PollOnly(Vec<PerformanceEntry>);

impl PerformanceTimeline for PollOnly {
    fn entries(&self) -> Result<Vec<PerformanceEntry>, HostError> {
        Ok(self.0.clone())
    }
}

#[test]
fn test_timeline_without_notifications_still_starts() {
    let monitor = PerformanceMonitor::new(Some(Arc::new(PollOnly(full_timeline()))));
    monitor.start();
    assert!(monitor.is_active());
    assert_eq!(monitor.get_summary().first_paint, 310.0);
}

/// A poll-only timeline whose entries keep arriving after start
struct GrowingTimeline(Mutex<Vec<PerformanceEntry>>);

impl PerformanceTimeline for GrowingTimeline {
    fn entries(&self) -> Result<Vec<PerformanceEntry>, HostError> {
        Ok(self.0.lock().unwrap().clone())
    }
}

#[test]
fn test_poll_only_timeline_picks_up_later_entries() {
    let timeline = Arc::new(GrowingTimeline(Mutex::new(Vec::new())));
    let monitor = PerformanceMonitor::new(Some(timeline.clone()));
    monitor.start();
    assert_eq!(monitor.get_summary(), PerformanceSummary::default());

    timeline.0.lock().unwrap().extend(full_timeline());
    let summary = monitor.get_summary();
    assert_eq!(summary.first_paint, 310.0);
    assert_eq!(summary.resource_count, 2);

    // Once stopped the last snapshot is kept
    monitor.stop();
    timeline
        .0
        .lock()
        .unwrap()
        .push(PerformanceEntry::new("resource", "/late.js", 2000.0));
    assert_eq!(monitor.get_summary().resource_count, 2);
}

#[test]
fn test_timeline_reset_clears_started_summary() {
    let timeline = Arc::new(RelayTimeline::new());
    let monitor = PerformanceMonitor::new(Some(timeline.clone()));
    monitor.start();
    timeline.record(full_timeline());
    assert_eq!(monitor.get_summary().page_load, 1250.0);

    timeline.reset();
    assert_eq!(monitor.get_summary(), PerformanceSummary::default());
}

#[test]
fn test_clear_forces_recompute() {
    let timeline = Arc::new(RelayTimeline::new());
    let monitor = PerformanceMonitor::new(Some(timeline.clone()));
    assert_eq!(monitor.get_summary().resource_count, 0);

    timeline.record(vec![PerformanceEntry::new("resource", "/a.js", 1.0)]);
    assert_eq!(monitor.get_summary().resource_count, 0);
    monitor.clear();
    assert_eq!(monitor.get_summary().resource_count, 1);
}
