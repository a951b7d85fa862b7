//! Network monitor
//!
//! Taps both request primitives the host offers. A record is appended as
//! `pending` the moment a request starts and is later resolved in place, so
//! every holder of a [`TrackedRequest`] observes the transition.
//!
//! `stop` restores a primitive immediately when nothing is in flight on it.
//! Otherwise the tap stays in place resolving known requests only, and
//! restores the primitive itself once the last of them settles.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{debug, warn};

use super::Wiretap;
use crate::host::{InterceptPoint, RequestEvent};
use crate::lock;
use crate::ring::RingBuffer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Completed,
    Failed,
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Completed => "completed",
            RequestStatus::Failed => "failed",
        })
    }
}

/// Which request primitive issued a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestApi {
    /// Callback-based (XMLHttpRequest)
    Xhr,
    /// Promise-based (fetch)
    Fetch,
}

/// Response metadata, or the error that ended the request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ResponseInfo {
    Http {
        status: u16,
        status_text: String,
        content_type: Option<String>,
    },
    Error {
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestRecord {
    pub id: u64,
    pub timestamp: DateTime<Utc>,
    pub api: RequestApi,
    pub method: String,
    pub url: String,
    pub status: RequestStatus,
    /// Milliseconds from start to resolution
    pub duration: Option<f64>,
    pub response: Option<ResponseInfo>,
}

/// Shared handle to a request record that is updated in place
#[derive(Debug, Clone)]
pub struct TrackedRequest(Arc<Mutex<RequestRecord>>);

impl TrackedRequest {
    fn new(record: RequestRecord) -> Self {
        Self(Arc::new(Mutex::new(record)))
    }

    pub fn id(&self) -> u64 {
        lock(&self.0).id
    }

    pub fn status(&self) -> RequestStatus {
        lock(&self.0).status
    }

    /// Copy of the record as it is right now
    pub fn snapshot(&self) -> RequestRecord {
        lock(&self.0).clone()
    }

    /// Whether both handles point at the same record instance
    pub fn same_record(&self, other: &TrackedRequest) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// Selects requests; the default matches everything
#[derive(Debug, Clone, Default)]
pub struct RequestFilter {
    pub status: Option<RequestStatus>,
    /// Compared case-insensitively
    pub method: Option<String>,
    pub url_contains: Option<String>,
}

impl RequestFilter {
    pub fn status(status: RequestStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn matches(&self, record: &RequestRecord) -> bool {
        if let Some(status) = self.status
            && record.status != status
        {
            return false;
        }
        if let Some(method) = &self.method
            && !record.method.eq_ignore_ascii_case(method)
        {
            return false;
        }
        if let Some(needle) = &self.url_contains
            && !record.url.contains(needle.as_str())
        {
            return false;
        }
        true
    }
}

struct InFlight {
    request: TrackedRequest,
    started: Instant,
    host_started: Option<f64>,
}

struct NetworkState {
    requests: Mutex<RingBuffer<TrackedRequest>>,
    in_flight: Mutex<HashMap<(RequestApi, u64), InFlight>>,
    next_id: AtomicU64,
    capturing: AtomicBool,
}

impl NetworkState {
    fn has_in_flight(&self, api: RequestApi) -> bool {
        lock(&self.in_flight).keys().any(|(pending, _)| *pending == api)
    }

    fn handle(&self, api: RequestApi, event: &RequestEvent) {
        match event {
            RequestEvent::Start {
                key,
                method,
                url,
                at,
            } => self.begin(api, *key, method, url, *at),
            RequestEvent::End {
                key,
                status,
                status_text,
                content_type,
                at,
            } => self.resolve(
                api,
                *key,
                RequestStatus::Completed,
                ResponseInfo::Http {
                    status: *status,
                    status_text: status_text.clone(),
                    content_type: content_type.clone(),
                },
                *at,
            ),
            RequestEvent::Error { key, error, at } => self.resolve(
                api,
                *key,
                RequestStatus::Failed,
                ResponseInfo::Error {
                    message: error.clone(),
                },
                *at,
            ),
        }
    }

    fn begin(&self, api: RequestApi, key: u64, method: &str, url: &str, at: Option<f64>) {
        let request = TrackedRequest::new(RequestRecord {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            timestamp: Utc::now(),
            api,
            method: method.to_uppercase(),
            url: url.to_string(),
            status: RequestStatus::Pending,
            duration: None,
            response: None,
        });

        let evicted = lock(&self.requests).push(request.clone());

        let mut in_flight = lock(&self.in_flight);
        if let Some(evicted) = evicted {
            in_flight.retain(|_, pending| !pending.request.same_record(&evicted));
        }
        let replaced = in_flight.insert(
            (api, key),
            InFlight {
                request,
                started: Instant::now(),
                host_started: at,
            },
        );
        if replaced.is_some() {
            debug!("Request key {} reused by {:?} before resolving", key, api);
        }
    }

    fn resolve(
        &self,
        api: RequestApi,
        key: u64,
        status: RequestStatus,
        response: ResponseInfo,
        at: Option<f64>,
    ) {
        let Some(pending) = lock(&self.in_flight).remove(&(api, key)) else {
            debug!("Ignoring resolution of unknown {:?} request {}", api, key);
            return;
        };

        let duration = match (pending.host_started, at) {
            (Some(start), Some(end)) => (end - start).max(0.0),
            _ => pending.started.elapsed().as_secs_f64() * 1000.0,
        };

        let mut record = lock(&pending.request.0);
        if record.status != RequestStatus::Pending {
            return;
        }
        record.status = status;
        record.duration = Some(duration);
        record.response = Some(response);
    }
}

/// Records request lifecycles from both request primitives
pub struct NetworkMonitor {
    xhr: Option<Arc<Wiretap<RequestEvent>>>,
    fetch: Option<Arc<Wiretap<RequestEvent>>>,
    state: Arc<NetworkState>,
}

impl NetworkMonitor {
    pub const DEFAULT_CAPACITY: usize = 500;

    pub fn new(
        xhr: Option<Arc<dyn InterceptPoint<RequestEvent>>>,
        fetch: Option<Arc<dyn InterceptPoint<RequestEvent>>>,
        capacity: usize,
    ) -> Self {
        Self {
            xhr: xhr.map(|point| Arc::new(Wiretap::new(point))),
            fetch: fetch.map(|point| Arc::new(Wiretap::new(point))),
            state: Arc::new(NetworkState {
                requests: Mutex::new(RingBuffer::new(capacity)),
                in_flight: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                capturing: AtomicBool::new(false),
            }),
        }
    }

    fn taps(&self) -> impl Iterator<Item = (RequestApi, &Arc<Wiretap<RequestEvent>>)> {
        [(RequestApi::Xhr, &self.xhr), (RequestApi::Fetch, &self.fetch)]
            .into_iter()
            .filter_map(|(api, tap)| tap.as_ref().map(|tap| (api, tap)))
    }

    pub fn start(&self) {
        if self.xhr.is_none() && self.fetch.is_none() {
            warn!("No request primitives available, network monitor stays inactive");
            return;
        }
        self.state.capturing.store(true, Ordering::SeqCst);
        for (api, tap) in self.taps() {
            let state = Arc::clone(&self.state);
            let this_tap = Arc::downgrade(tap);
            let observer = move |event: &RequestEvent| {
                if state.capturing.load(Ordering::SeqCst) {
                    state.handle(api, event);
                    return;
                }
                if matches!(event, RequestEvent::Start { .. }) {
                    return;
                }
                state.handle(api, event);
                if !state.has_in_flight(api)
                    && let Some(tap) = this_tap.upgrade()
                {
                    release(api, &tap);
                }
            };
            match tap.install(observer) {
                Ok(true) => debug!("Network monitor intercepting {:?}", api),
                Ok(false) => {}
                Err(e) => warn!("Could not intercept {:?} requests: {}", api, e),
            }
        }
    }

    pub fn stop(&self) {
        self.state.capturing.store(false, Ordering::SeqCst);
        for (api, tap) in self.taps() {
            if self.state.has_in_flight(api) {
                if tap.is_installed() {
                    debug!("Keeping {:?} tap until in-flight requests settle", api);
                }
                continue;
            }
            release(api, tap);
        }
    }

    /// True while new requests are being recorded
    pub fn is_active(&self) -> bool {
        self.state.capturing.load(Ordering::SeqCst)
            && self.taps().any(|(_, tap)| tap.is_installed())
    }

    /// Retained requests, oldest first, as live handles
    pub fn get_requests(&self, filter: &RequestFilter) -> Vec<TrackedRequest> {
        lock(&self.state.requests)
            .iter()
            .filter(|request| filter.matches(&request.snapshot()))
            .cloned()
            .collect()
    }

    /// Retained requests, oldest first, copied out
    pub fn get_records(&self, filter: &RequestFilter) -> Vec<RequestRecord> {
        lock(&self.state.requests)
            .iter()
            .map(TrackedRequest::snapshot)
            .filter(|record| filter.matches(record))
            .collect()
    }

    pub fn len(&self) -> usize {
        lock(&self.state.requests).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop retained records and pending bookkeeping; interception continues
    pub fn clear(&self) {
        lock(&self.state.requests).clear();
        lock(&self.state.in_flight).clear();
        if !self.state.capturing.load(Ordering::SeqCst) {
            for (api, tap) in self.taps() {
                release(api, tap);
            }
        }
    }
}

fn release(api: RequestApi, tap: &Wiretap<RequestEvent>) {
    if !tap.is_installed() {
        return;
    }
    match tap.remove() {
        Ok(()) => debug!("Restored {:?} requests", api),
        Err(e) => warn!("Could not restore {:?} requests: {}", api, e),
    }
}

#[cfg(test)]
#[path = "network_test.rs"]
mod network_test;
