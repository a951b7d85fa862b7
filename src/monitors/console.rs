//! Console monitor
//!
//! Wiretaps the host console surface. Every call still reaches the original
//! console; a copy is normalized into an immutable [`LogEntry`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

use super::Wiretap;
use crate::host::{ConsoleCall, InterceptPoint, LogLevel};
use crate::lock;
use crate::ring::RingBuffer;

/// A captured console call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: u64,
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    /// Arguments rendered the way the browser console prints them
    pub formatted: String,
    pub args: Vec<Value>,
}

/// Selects log entries; the default matches everything
#[derive(Debug, Clone, Default)]
pub struct LogFilter {
    pub level: Option<LogLevel>,
    /// Case-sensitive substring of the formatted message
    pub contains: Option<String>,
}

impl LogFilter {
    pub fn level(level: LogLevel) -> Self {
        Self {
            level: Some(level),
            ..Default::default()
        }
    }

    pub fn matches(&self, entry: &LogEntry) -> bool {
        if let Some(level) = self.level
            && entry.level != level
        {
            return false;
        }
        if let Some(needle) = &self.contains
            && !entry.formatted.contains(needle.as_str())
        {
            return false;
        }
        true
    }
}

/// Join console arguments: strings verbatim, everything else as JSON
pub fn format_console_args(args: &[Value]) -> String {
    args.iter()
        .map(|arg| match arg {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

struct ConsoleState {
    entries: Mutex<RingBuffer<LogEntry>>,
    next_id: AtomicU64,
}

impl ConsoleState {
    fn record(&self, call: &ConsoleCall) {
        let entry = LogEntry {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            timestamp: Utc::now(),
            level: call.level,
            formatted: format_console_args(&call.args),
            args: call.args.clone(),
        };
        lock(&self.entries).push(entry);
    }
}

/// Records console output into a bounded buffer
pub struct ConsoleMonitor {
    tap: Option<Wiretap<ConsoleCall>>,
    state: Arc<ConsoleState>,
}

impl ConsoleMonitor {
    pub const DEFAULT_CAPACITY: usize = 1000;

    /// Create a monitor for `surface`; `None` means the host has no console
    pub fn new(surface: Option<Arc<dyn InterceptPoint<ConsoleCall>>>, capacity: usize) -> Self {
        Self {
            tap: surface.map(Wiretap::new),
            state: Arc::new(ConsoleState {
                entries: Mutex::new(RingBuffer::new(capacity)),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn start(&self) {
        let Some(tap) = &self.tap else {
            warn!("Console surface unavailable, console monitor stays inactive");
            return;
        };
        let state = Arc::clone(&self.state);
        match tap.install(move |call: &ConsoleCall| state.record(call)) {
            Ok(true) => debug!("Console monitor started"),
            Ok(false) => {}
            Err(e) => warn!("Could not intercept console: {}", e),
        }
    }

    pub fn stop(&self) {
        if let Some(tap) = &self.tap {
            let was_active = tap.is_installed();
            match tap.remove() {
                Ok(()) if was_active => debug!("Console monitor stopped"),
                Ok(()) => {}
                Err(e) => warn!("Could not restore console: {}", e),
            }
        }
    }

    pub fn is_active(&self) -> bool {
        self.tap.as_ref().is_some_and(|tap| tap.is_installed())
    }

    /// Retained entries, oldest first
    pub fn get_entries(&self, filter: &LogFilter) -> Vec<LogEntry> {
        lock(&self.state.entries)
            .iter()
            .filter(|entry| filter.matches(entry))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        lock(&self.state.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every retained entry; interception continues
    pub fn clear(&self) {
        lock(&self.state.entries).clear();
    }
}

#[cfg(test)]
#[path = "console_test.rs"]
mod console_test;
