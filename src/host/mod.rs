//! Host capabilities consumed by the monitors
//!
//! A monitor never touches a real browser global. It receives the capability
//! it observes as a trait object, installs its tap on `start()`, and hands the
//! saved original back on `stop()`. Any capability may be missing, in which
//! case the monitor that needs it stays inactive while the others keep working.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

pub mod relay;

pub use relay::{RelayHost, RelayMutations, RelayPoint, RelayTimeline};

/// Shared callback installed into a host slot
pub type Handler<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// Callback receiving one delivery of mutation records
pub type MutationCallback = Arc<dyn Fn(&[RawMutation]) + Send + Sync>;

/// Errors reported by host capabilities
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("{0} is not available in this environment")]
    Unavailable(&'static str),
    #[error("host rejected the request: {0}")]
    Rejected(String),
}

/// A replaceable global handler slot (console surface, request primitive)
pub trait InterceptPoint<E>: Send + Sync {
    /// Install `handler`, returning the handler it displaced
    fn replace(&self, handler: Handler<E>) -> Result<Handler<E>, HostError>;
}

/// Mutation observation facility
pub trait MutationSource: Send + Sync {
    fn observe(
        &self,
        options: ObserveOptions,
        callback: MutationCallback,
    ) -> Result<ObserverId, HostError>;

    /// Detach an observer. Unknown ids are ignored.
    fn disconnect(&self, id: ObserverId);
}

/// Performance timeline facility
pub trait PerformanceTimeline: Send + Sync {
    /// All entries recorded so far
    fn entries(&self) -> Result<Vec<PerformanceEntry>, HostError>;

    /// Ask to be notified when new entries land
    fn subscribe(&self, _handler: Handler<()>) -> Result<ObserverId, HostError> {
        Err(HostError::Unavailable("performance observer"))
    }

    fn unsubscribe(&self, _id: ObserverId) {}
}

/// Handle identifying an observer registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(pub u64);

/// Bundle of optional host capabilities
#[derive(Clone, Default)]
pub struct HostEnvironment {
    pub console: Option<Arc<dyn InterceptPoint<ConsoleCall>>>,
    /// Callback-based request primitive
    pub xhr: Option<Arc<dyn InterceptPoint<RequestEvent>>>,
    /// Promise-based request primitive
    pub fetch: Option<Arc<dyn InterceptPoint<RequestEvent>>>,
    pub mutations: Option<Arc<dyn MutationSource>>,
    pub performance: Option<Arc<dyn PerformanceTimeline>>,
}

impl HostEnvironment {
    /// An environment that provides nothing
    pub fn empty() -> Self {
        Self::default()
    }
}

impl fmt::Debug for HostEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostEnvironment")
            .field("console", &self.console.is_some())
            .field("xhr", &self.xhr.is_some())
            .field("fetch", &self.fetch.is_some())
            .field("mutations", &self.mutations.is_some())
            .field("performance", &self.performance.is_some())
            .finish()
    }
}

/// Console severities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Log,
    Warn,
    Error,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub const ALL: [LogLevel; 6] = [
        LogLevel::Log,
        LogLevel::Warn,
        LogLevel::Error,
        LogLevel::Info,
        LogLevel::Debug,
        LogLevel::Trace,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Log => "log",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LogLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        LogLevel::ALL
            .into_iter()
            .find(|level| level.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| anyhow::anyhow!("Unknown console level: {}", s))
    }
}

/// One call on the console surface
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsoleCall {
    pub level: LogLevel,
    #[serde(default)]
    pub args: Vec<Value>,
}

impl ConsoleCall {
    pub fn new(level: LogLevel, args: Vec<Value>) -> Self {
        Self { level, args }
    }
}

/// Lifecycle notifications from a request primitive
///
/// `key` identifies the request within one primitive. `at` is the host clock
/// in milliseconds when the host can provide one.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "lowercase")]
pub enum RequestEvent {
    Start {
        key: u64,
        method: String,
        url: String,
        #[serde(default)]
        at: Option<f64>,
    },
    End {
        key: u64,
        status: u16,
        #[serde(default, rename = "statusText")]
        status_text: String,
        #[serde(default, rename = "contentType")]
        content_type: Option<String>,
        #[serde(default)]
        at: Option<f64>,
    },
    Error {
        key: u64,
        error: String,
        #[serde(default)]
        at: Option<f64>,
    },
}

impl RequestEvent {
    pub fn key(&self) -> u64 {
        match self {
            RequestEvent::Start { key, .. }
            | RequestEvent::End { key, .. }
            | RequestEvent::Error { key, .. } => *key,
        }
    }
}

/// What a mutation observer should report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObserveOptions {
    pub child_list: bool,
    pub attributes: bool,
    pub character_data: bool,
    pub subtree: bool,
    pub attribute_old_value: bool,
    pub character_data_old_value: bool,
}

impl ObserveOptions {
    /// Everything under the document body, old values included
    pub fn everything() -> Self {
        Self {
            child_list: true,
            attributes: true,
            character_data: true,
            subtree: true,
            attribute_old_value: true,
            character_data_old_value: true,
        }
    }
}

/// A mutation record as delivered by the host, target left untyped
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMutation {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub target: Value,
    #[serde(default)]
    pub added_nodes: usize,
    #[serde(default)]
    pub removed_nodes: usize,
    #[serde(default)]
    pub attribute_name: Option<String>,
    #[serde(default)]
    pub old_value: Option<String>,
    #[serde(default)]
    pub new_value: Option<String>,
}

/// A performance timeline entry; fields absent for an entry type stay `None`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PerformanceEntry {
    pub name: String,
    pub entry_type: String,
    pub start_time: f64,
    pub duration: f64,
    pub value: Option<f64>,
    pub had_recent_input: Option<bool>,
    pub processing_start: Option<f64>,
    pub render_time: Option<f64>,
    pub load_time: Option<f64>,
    pub request_start: Option<f64>,
    pub response_start: Option<f64>,
    pub load_event_end: Option<f64>,
}

impl PerformanceEntry {
    pub fn new(entry_type: &str, name: &str, start_time: f64) -> Self {
        Self {
            name: name.to_string(),
            entry_type: entry_type.to_string(),
            start_time,
            ..Default::default()
        }
    }
}
