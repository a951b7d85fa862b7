//! # pagewatch
#![allow(clippy::uninlined_format_args)]
//!
//! Passive browser telemetry for "chat with your UI" tools.
//!
//! Four monitors (console, network, performance, DOM) sit on a page, keep what
//! they observe in bounded buffers, and a [`MonitorManager`] turns their state
//! into Markdown context blocks an LLM prompt can splice in.
//!
//! ## CLI Usage
//!
//! ```bash
//! # Watch a page for five seconds and print every context block
//! pagewatch watch "https://example.com" --duration 5
//!
//! # Only the blocks a prompt mentions
//! pagewatch watch "https://example.com" --prompt "why does @network fail after @console errors?"
//!
//! # Raw records as JSON
//! pagewatch watch "https://example.com" --format json | jq '.network[] | select(.status == "failed")'
//!
//! # Include components picked in the widget
//! pagewatch watch "https://app.local" --components selected.json --context components
//!
//! # Show the effective configuration
//! pagewatch config
//! ```
//!
//! ## Library Usage
//!
//! Monitors consume host capabilities through traits in [`host`]. The
//! [`host::RelayHost`] implements all of them in-process and is what the
//! WebDriver bridge feeds:
//!
//! ```
//! use pagewatch::host::{ConsoleCall, LogLevel, RelayHost};
//! use pagewatch::{MonitorConfig, MonitorManager};
//!
//! let host = RelayHost::new();
//! let manager = MonitorManager::new(&host.environment(), &MonitorConfig::default());
//! manager.start();
//!
//! host.console.emit(&ConsoleCall::new(LogLevel::Error, vec!["boom".into()]));
//!
//! assert_eq!(manager.get_context("console"), "## Console Logs\n\n[ERROR] boom");
//! assert_eq!(manager.get_context("nope"), "");
//! manager.stop();
//! ```

use std::sync::{Mutex, MutexGuard};

/// Selected UI components supplied by the widget
pub mod components;

/// Settings file and environment overrides
pub mod config;

/// Host capability traits and the in-process relay host
pub mod host;

/// Monitor manager and context block formatting
pub mod manager;

/// Console, network, performance and DOM monitors
pub mod monitors;

/// Bounded FIFO buffer
pub mod ring;

/// Type definitions shared by the CLI
pub mod types;

/// WebDriver page bridge
pub mod webdriver;

pub use components::{ElementRef, HookInfo, SelectedComponent, SourceLocation};
pub use config::{BridgeConfig, MonitorConfig, Settings};
pub use host::{HostEnvironment, HostError, LogLevel};
pub use manager::{ContextKind, ManagerState, MonitorManager, MonitorSnapshot};
pub use monitors::{
    ChangeFilter, ChangeType, ConsoleMonitor, DomChange, DomMonitor, LogEntry, LogFilter,
    NetworkMonitor, PerformanceMonitor, PerformanceSummary, RequestFilter, RequestRecord,
    RequestStatus, TrackedRequest,
};
pub use types::{OutputFormat, ViewportSize};
pub use webdriver::{Browser, BrowserType};

/// Lock a mutex, recovering the data if a panicking holder poisoned it
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
