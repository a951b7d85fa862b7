// Unit tests for the network monitor

use super::*;
use crate::host::RelayPoint;

struct Fixture {
    xhr: Arc<RelayPoint<RequestEvent>>,
    fetch: Arc<RelayPoint<RequestEvent>>,
    monitor: NetworkMonitor,
}

fn fixture(capacity: usize) -> Fixture {
    let xhr: Arc<RelayPoint<RequestEvent>> = Arc::new(RelayPoint::silent());
    let fetch: Arc<RelayPoint<RequestEvent>> = Arc::new(RelayPoint::silent());
    let monitor = NetworkMonitor::new(Some(xhr.clone()), Some(fetch.clone()), capacity);
    monitor.start();
    Fixture {
        xhr,
        fetch,
        monitor,
    }
}

fn start(key: u64, method: &str, url: &str, at: Option<f64>) -> RequestEvent {
    RequestEvent::Start {
        key,
        method: method.to_string(),
        url: url.to_string(),
        at,
    }
}

fn end(key: u64, status: u16, at: Option<f64>) -> RequestEvent {
    RequestEvent::End {
        key,
        status,
        status_text: "OK".to_string(),
        content_type: Some("application/json".to_string()),
        at,
    }
}

#[test]
fn test_pending_record_visible_before_resolution() {
    let f = fixture(10);
    f.fetch.emit(&start(1, "get", "/api/users", None));

    let requests = f.monitor.get_requests(&RequestFilter::default());
    assert_eq!(requests.len(), 1);
    let record = requests[0].snapshot();
    assert_eq!(record.status, RequestStatus::Pending);
    assert_eq!(record.method, "GET");
    assert_eq!(record.api, RequestApi::Fetch);
    assert_eq!(record.duration, None);
    assert_eq!(record.response, None);
}

#[test]
fn test_resolution_updates_the_same_record() {
    let f = fixture(10);
    f.fetch.emit(&start(1, "GET", "/api/users", Some(100.0)));
    let held = f.monitor.get_requests(&RequestFilter::default())[0].clone();
    let id = held.id();

    f.fetch.emit(&end(1, 200, Some(145.0)));

    // The handle taken while pending sees the update in place
    assert_eq!(held.status(), RequestStatus::Completed);
    let after = f.monitor.get_requests(&RequestFilter::default());
    assert!(after[0].same_record(&held));
    assert_eq!(after[0].id(), id);

    let record = held.snapshot();
    assert_eq!(record.duration, Some(45.0));
    assert_eq!(
        record.response,
        Some(ResponseInfo::Http {
            status: 200,
            status_text: "OK".to_string(),
            content_type: Some("application/json".to_string()),
        })
    );
}

#[test]
fn test_failure_records_error_metadata() {
    let f = fixture(10);
    f.xhr.emit(&start(3, "POST", "/api/login", None));
    f.xhr.emit(&RequestEvent::Error {
        key: 3,
        error: "Network error".to_string(),
        at: None,
    });

    let record = &f.monitor.get_records(&RequestFilter::default())[0];
    assert_eq!(record.status, RequestStatus::Failed);
    assert_eq!(record.api, RequestApi::Xhr);
    assert!(record.duration.unwrap() >= 0.0);
    assert_eq!(
        record.response,
        Some(ResponseInfo::Error {
            message: "Network error".to_string()
        })
    );
}

#[test]
fn test_status_transitions_only_once() {
    let f = fixture(10);
    f.fetch.emit(&start(1, "GET", "/a", Some(0.0)));
    f.fetch.emit(&end(1, 200, Some(10.0)));
    f.fetch.emit(&RequestEvent::Error {
        key: 1,
        error: "late".to_string(),
        at: Some(20.0),
    });
    f.fetch.emit(&end(1, 500, Some(30.0)));

    let record = &f.monitor.get_records(&RequestFilter::default())[0];
    assert_eq!(record.status, RequestStatus::Completed);
    assert_eq!(record.duration, Some(10.0));
}

#[test]
fn test_duration_never_negative() {
    let f = fixture(10);
    f.fetch.emit(&start(1, "GET", "/skewed", Some(50.0)));
    f.fetch.emit(&end(1, 200, Some(20.0)));
    f.fetch.emit(&start(2, "GET", "/local-clock", None));
    f.fetch.emit(&end(2, 200, None));

    for record in f.monitor.get_records(&RequestFilter::default()) {
        assert!(record.duration.unwrap() >= 0.0);
    }
}

#[test]
fn test_primitives_have_separate_key_spaces() {
    let f = fixture(10);
    f.xhr.emit(&start(1, "GET", "/xhr", None));
    f.fetch.emit(&start(1, "GET", "/fetch", None));
    f.fetch.emit(&end(1, 204, None));

    let pending = f
        .monitor
        .get_records(&RequestFilter::status(RequestStatus::Pending));
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].url, "/xhr");
}

#[test]
fn test_unknown_resolution_is_ignored() {
    let f = fixture(10);
    f.fetch.emit(&end(99, 200, None));
    assert!(f.monitor.is_empty());
}

#[test]
fn test_eviction_keeps_newest_and_drops_bookkeeping() {
    let f = fixture(2);
    for key in 1..=3 {
        f.fetch.emit(&start(key, "GET", &format!("/r{}", key), None));
    }
    let urls: Vec<String> = f
        .monitor
        .get_records(&RequestFilter::default())
        .into_iter()
        .map(|r| r.url)
        .collect();
    assert_eq!(urls, vec!["/r2", "/r3"]);

    // The evicted request is no longer tracked
    assert_eq!(f.monitor.state.in_flight.lock().unwrap().len(), 2);
    f.fetch.emit(&end(1, 200, None));
    assert_eq!(
        f.monitor
            .get_records(&RequestFilter::status(RequestStatus::Completed))
            .len(),
        0
    );
}

#[test]
fn test_filter_by_method_and_url() {
    let f = fixture(10);
    f.fetch.emit(&start(1, "GET", "/api/users", None));
    f.fetch.emit(&start(2, "POST", "/api/users", None));
    f.fetch.emit(&start(3, "GET", "/static/app.js", None));

    let filter = RequestFilter {
        method: Some("get".to_string()),
        url_contains: Some("/api".to_string()),
        ..Default::default()
    };
    let records = f.monitor.get_records(&filter);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].url, "/api/users");
    assert_eq!(records[0].method, "GET");
}

#[test]
fn test_stop_restores_both_primitives() {
    let f = fixture(10);
    assert!(f.monitor.is_active());
    f.monitor.stop();
    f.monitor.stop();
    assert!(!f.monitor.is_active());

    f.xhr.emit(&start(1, "GET", "/after-stop", None));
    f.fetch.emit(&start(1, "GET", "/after-stop", None));
    assert!(f.monitor.is_empty());
}

#[test]
fn test_request_started_before_stop_still_resolves() {
    let f = fixture(10);
    f.fetch.emit(&start(1, "GET", "/slow", Some(0.0)));
    f.xhr.emit(&start(4, "POST", "/upload", Some(5.0)));
    f.monitor.stop();
    assert!(!f.monitor.is_active());

    // New requests are not recorded while the old ones settle
    f.fetch.emit(&start(2, "GET", "/after-stop", None));
    f.fetch.emit(&end(2, 200, None));

    f.fetch.emit(&end(1, 200, Some(40.0)));
    f.xhr.emit(&RequestEvent::Error {
        key: 4,
        error: "aborted".to_string(),
        at: Some(9.0),
    });

    let records = f.monitor.get_records(&RequestFilter::default());
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].status, RequestStatus::Completed);
    assert_eq!(records[0].duration, Some(40.0));
    assert_eq!(records[1].status, RequestStatus::Failed);

    // Both primitives are restored once nothing is in flight
    f.fetch.emit(&start(3, "GET", "/later", None));
    f.xhr.emit(&start(5, "GET", "/later", None));
    assert_eq!(f.monitor.len(), 2);

    f.monitor.start();
    assert!(f.monitor.is_active());
    f.fetch.emit(&start(6, "GET", "/again", None));
    assert_eq!(f.monitor.len(), 3);
}

#[test]
fn test_clear_after_stop_releases_waiting_taps() {
    let f = fixture(10);
    f.fetch.emit(&start(1, "GET", "/never", None));
    f.monitor.stop();
    f.monitor.clear();

    f.fetch.emit(&end(1, 200, None));
    f.fetch.emit(&start(2, "GET", "/after", None));
    assert!(f.monitor.is_empty());
}

#[test]
fn test_one_missing_primitive_does_not_block_the_other() {
    let fetch: Arc<RelayPoint<RequestEvent>> = Arc::new(RelayPoint::silent());
    let monitor = NetworkMonitor::new(None, Some(fetch.clone()), 10);
    monitor.start();
    assert!(monitor.is_active());
    fetch.emit(&start(1, "GET", "/only-fetch", None));
    assert_eq!(monitor.len(), 1);

    let none = NetworkMonitor::new(None, None, 10);
    none.start();
    assert!(!none.is_active());
    none.stop();
}

#[test]
fn test_clear_drops_records_and_pending() {
    let f = fixture(10);
    f.fetch.emit(&start(1, "GET", "/a", None));
    f.monitor.clear();
    assert!(f.monitor.is_empty());
    f.fetch.emit(&end(1, 200, None));
    assert!(f.monitor.is_empty());
}
