//! Passive browser monitors
//!
//! Each monitor exclusively owns a bounded buffer (or, for performance, a
//! single snapshot). Buffers are only written from host callbacks and only
//! read through the `get_*` accessors, which never wait on host activity.

pub mod console;
pub mod dom;
pub mod network;
pub mod performance;
mod tap;

pub use console::{ConsoleMonitor, LogEntry, LogFilter};
pub use dom::{ChangeFilter, ChangeTarget, ChangeType, DomChange, DomMonitor};
pub use network::{
    NetworkMonitor, RequestApi, RequestFilter, RequestRecord, RequestStatus, ResponseInfo,
    TrackedRequest,
};
pub use performance::{PerformanceMonitor, PerformanceSummary};
pub(crate) use tap::Wiretap;
