//! Monitor manager
//!
//! Owns the four monitors and the selected-component snapshot, starts and
//! stops them together, and renders their state as Markdown context blocks
//! for prompt assembly.

use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::sync::Mutex;
use tracing::{debug, info};

use crate::components::SelectedComponent;
use crate::config::MonitorConfig;
use crate::host::HostEnvironment;
use crate::lock;
use crate::monitors::{
    ChangeFilter, ConsoleMonitor, DomChange, DomMonitor, LogEntry, LogFilter, NetworkMonitor,
    PerformanceMonitor, PerformanceSummary, RequestFilter, RequestRecord, RequestStatus,
    ResponseInfo,
};

/// Which subsystem a context block describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ContextKind {
    Console,
    Network,
    Performance,
    Dom,
    Components,
}

impl ContextKind {
    pub const ALL: [ContextKind; 5] = [
        ContextKind::Console,
        ContextKind::Network,
        ContextKind::Performance,
        ContextKind::Dom,
        ContextKind::Components,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContextKind::Console => "console",
            ContextKind::Network => "network",
            ContextKind::Performance => "performance",
            ContextKind::Dom => "dom",
            ContextKind::Components => "components",
        }
    }

    /// Context kinds mentioned as `@kind` in a prompt, in order of first mention
    pub fn mentions(prompt: &str) -> Vec<ContextKind> {
        let mut found = Vec::new();
        for (index, _) in prompt.match_indices('@') {
            // `@` inside a word, as in an email address, is not a mention
            if prompt[..index]
                .chars()
                .next_back()
                .is_some_and(|c| c.is_alphanumeric())
            {
                continue;
            }
            let word: String = prompt[index + 1..]
                .chars()
                .take_while(|c| c.is_ascii_alphanumeric())
                .collect();
            if let Ok(kind) = word.parse::<ContextKind>()
                && !found.contains(&kind)
            {
                found.push(kind);
            }
        }
        found
    }
}

impl std::fmt::Display for ContextKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ContextKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        ContextKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| anyhow::anyhow!("Unknown context kind: {}", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManagerState {
    Stopped,
    Started,
}

/// Every raw record the monitors hold, for machine consumers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorSnapshot {
    pub state: ManagerState,
    pub console: Vec<LogEntry>,
    pub network: Vec<RequestRecord>,
    pub performance: PerformanceSummary,
    pub dom: Vec<DomChange>,
    pub components: Vec<SelectedComponent>,
}

pub struct MonitorManager {
    console: ConsoleMonitor,
    network: NetworkMonitor,
    performance: PerformanceMonitor,
    dom: DomMonitor,
    selected: Mutex<Vec<SelectedComponent>>,
    state: Mutex<ManagerState>,
    entry_limit: Option<usize>,
}

impl MonitorManager {
    /// Build all four monitors over `host`
    pub fn new(host: &HostEnvironment, config: &MonitorConfig) -> Self {
        Self {
            console: ConsoleMonitor::new(host.console.clone(), config.console_capacity),
            network: NetworkMonitor::new(
                host.xhr.clone(),
                host.fetch.clone(),
                config.network_capacity,
            ),
            performance: PerformanceMonitor::new(host.performance.clone()),
            dom: DomMonitor::new(host.mutations.clone(), Some(config.dom_max_changes)),
            selected: Mutex::new(Vec::new()),
            state: Mutex::new(ManagerState::Stopped),
            entry_limit: config.context_entry_limit,
        }
    }

    pub fn start(&self) {
        let mut state = lock(&self.state);
        self.console.start();
        self.network.start();
        self.performance.start();
        self.dom.start();
        if *state == ManagerState::Stopped {
            info!("Monitoring started");
        }
        *state = ManagerState::Started;
    }

    pub fn stop(&self) {
        let mut state = lock(&self.state);
        self.console.stop();
        self.network.stop();
        self.performance.stop();
        self.dom.stop();
        if *state == ManagerState::Started {
            info!("Monitoring stopped");
        }
        *state = ManagerState::Stopped;
    }

    pub fn state(&self) -> ManagerState {
        *lock(&self.state)
    }

    pub fn console(&self) -> &ConsoleMonitor {
        &self.console
    }

    pub fn network(&self) -> &NetworkMonitor {
        &self.network
    }

    pub fn performance(&self) -> &PerformanceMonitor {
        &self.performance
    }

    pub fn dom(&self) -> &DomMonitor {
        &self.dom
    }

    /// Replace the selected-component snapshot
    pub fn set_selected_components(&self, components: Vec<SelectedComponent>) {
        debug!("{} components selected", components.len());
        *lock(&self.selected) = components;
    }

    pub fn selected_components(&self) -> Vec<SelectedComponent> {
        lock(&self.selected).clone()
    }

    /// Markdown block for `kind`, or an empty string for unknown kinds
    pub fn get_context(&self, kind: &str) -> String {
        match kind.parse::<ContextKind>() {
            Ok(kind) => self.context(kind),
            Err(_) => String::new(),
        }
    }

    pub fn context(&self, kind: ContextKind) -> String {
        match kind {
            ContextKind::Console => self.console_context(),
            ContextKind::Network => self.network_context(),
            ContextKind::Performance => self.performance_context(),
            ContextKind::Dom => self.dom_context(),
            ContextKind::Components => self.components_context(),
        }
    }

    /// Blocks for every `@kind` mentioned in `prompt`, separated by blank lines
    pub fn context_for_prompt(&self, prompt: &str) -> String {
        ContextKind::mentions(prompt)
            .into_iter()
            .map(|kind| self.context(kind))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    pub fn snapshot(&self) -> MonitorSnapshot {
        MonitorSnapshot {
            state: self.state(),
            console: self.console.get_entries(&LogFilter::default()),
            network: self.network.get_records(&RequestFilter::default()),
            performance: self.performance.get_summary(),
            dom: self.dom.get_changes(&ChangeFilter::default()),
            components: self.selected_components(),
        }
    }

    fn list_block(&self, heading: &str, empty: &str, lines: Vec<String>) -> String {
        let mut out = format!("## {}\n\n", heading);
        if lines.is_empty() {
            out.push_str(empty);
            return out;
        }
        let skip = match self.entry_limit {
            Some(limit) if lines.len() > limit => lines.len() - limit,
            _ => 0,
        };
        if skip > 0 {
            let _ = writeln!(out, "({} earlier entries omitted)", skip);
        }
        out.push_str(&lines[skip..].join("\n"));
        out
    }

    fn console_context(&self) -> String {
        let lines = self
            .console
            .get_entries(&LogFilter::default())
            .iter()
            .map(|entry| {
                format!(
                    "[{}] {}",
                    entry.level.as_str().to_uppercase(),
                    entry.formatted
                )
            })
            .collect();
        self.list_block("Console Logs", "No console logs captured", lines)
    }

    fn network_context(&self) -> String {
        let lines = self
            .network
            .get_records(&RequestFilter::default())
            .iter()
            .map(format_request)
            .collect();
        self.list_block("Network Requests", "No network requests captured", lines)
    }

    fn performance_context(&self) -> String {
        let summary = self.performance.get_summary();
        let cls = (summary.cumulative_layout_shift * 1000.0).round() / 1000.0;
        [
            "## Performance Metrics".to_string(),
            String::new(),
            format!("Page Load: {}ms", millis(summary.page_load)),
            format!("TTFB: {}ms", millis(summary.ttfb)),
            format!("First Paint: {}ms", millis(summary.first_paint)),
            format!(
                "First Contentful Paint: {}ms",
                millis(summary.first_contentful_paint)
            ),
            format!(
                "Largest Contentful Paint: {}ms",
                millis(summary.largest_contentful_paint)
            ),
            format!("First Input Delay: {}ms", millis(summary.first_input_delay)),
            format!("Cumulative Layout Shift: {}", cls),
            format!("Resources: {}", summary.resource_count),
        ]
        .join("\n")
    }

    fn dom_context(&self) -> String {
        let lines = self
            .dom
            .get_changes(&ChangeFilter::default())
            .iter()
            .map(|change| format!("{}: {}", change.change_type, change.target.path))
            .collect();
        self.list_block("DOM Changes", "No DOM changes captured", lines)
    }

    fn components_context(&self) -> String {
        let selected = lock(&self.selected);
        let mut out = String::from("## Selected Components\n\n");
        if selected.is_empty() {
            out.push_str("No components currently selected");
            return out;
        }
        let sections: Vec<String> = selected
            .iter()
            .enumerate()
            .map(|(index, component)| format_component(index + 1, component))
            .collect();
        out.push_str(&sections.join("\n\n"));
        out
    }
}

fn millis(value: f64) -> String {
    format!("{}", value.max(0.0).round())
}

fn format_request(record: &RequestRecord) -> String {
    let head = format!("{} {}", record.method, record.url);
    let duration = record
        .duration
        .map(|d| format!(" ({}ms)", millis(d)))
        .unwrap_or_default();
    match (&record.status, &record.response) {
        (RequestStatus::Pending, _) => format!("{} - PENDING", head),
        (RequestStatus::Completed, Some(ResponseInfo::Http { status, .. })) => {
            format!("{} - {}{}", head, status, duration)
        }
        (RequestStatus::Failed, Some(ResponseInfo::Error { message })) => {
            format!("{} - FAILED: {}{}", head, message, duration)
        }
        (status, _) => format!("{} - {}{}", head, status.to_string().to_uppercase(), duration),
    }
}

fn format_component(number: usize, component: &SelectedComponent) -> String {
    let mut out = format!("### Component {}: {}\n", number, component.name);
    let _ = writeln!(out, "ID: {}", component.id);
    let _ = writeln!(
        out,
        "DOM Element: <{}>",
        component.dom_element.tag_name.to_lowercase()
    );
    if let Some(source) = &component.source_location {
        let _ = writeln!(out, "Source: {}:{}", source.file_name, source.line_number);
    }
    let props = serde_json::to_string(&component.props).unwrap_or_else(|_| "{}".to_string());
    let _ = writeln!(out, "Props: {}", props);
    if let Some(state) = &component.state {
        let _ = writeln!(out, "State: {}", state);
    }
    if !component.hooks.is_empty() {
        out.push_str("Hooks:\n");
        for (index, hook) in component.hooks.iter().enumerate() {
            let _ = writeln!(out, "{}. {}", index + 1, hook.name);
        }
    }
    out.truncate(out.trim_end().len());
    out
}

#[cfg(test)]
#[path = "manager_test.rs"]
mod manager_test;
