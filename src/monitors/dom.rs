//! DOM mutation monitor
//!
//! Observes the whole document body. Each delivered batch is expanded into one
//! [`DomChange`] per mutation, in delivery order, and appended to a ring buffer
//! of `max_changes` records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, trace, warn};

use crate::host::{MutationSource, ObserveOptions, ObserverId, RawMutation};
use crate::lock;
use crate::ring::RingBuffer;

/// Guards path computation against absurdly deep (or malformed) ancestor chains
const MAX_PATH_DEPTH: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChangeType {
    ChildList,
    Attributes,
    CharacterData,
}

impl ChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::ChildList => "childList",
            ChangeType::Attributes => "attributes",
            ChangeType::CharacterData => "characterData",
        }
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ChangeType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "childList" => Ok(ChangeType::ChildList),
            "attributes" => Ok(ChangeType::Attributes),
            "characterData" => Ok(ChangeType::CharacterData),
            _ => anyhow::bail!("Unknown mutation type: {}", s),
        }
    }
}

/// The element a change happened on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeTarget {
    pub tag_name: String,
    pub id: Option<String>,
    pub class_name: Option<String>,
    /// Ancestor chain, root first, e.g. `BODY > FORM#login > BUTTON.btn`
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomChange {
    pub id: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub change_type: ChangeType,
    pub target: ChangeTarget,
    pub added_nodes: Option<usize>,
    pub removed_nodes: Option<usize>,
    pub attribute_name: Option<String>,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
}

/// Selects changes; the default matches everything
#[derive(Debug, Clone, Default)]
pub struct ChangeFilter {
    pub change_type: Option<ChangeType>,
}

impl ChangeFilter {
    pub fn of_type(change_type: ChangeType) -> Self {
        Self {
            change_type: Some(change_type),
        }
    }

    pub fn matches(&self, change: &DomChange) -> bool {
        self.change_type.is_none_or(|t| t == change.change_type)
    }
}

fn non_empty_str<'a>(node: &'a Value, key: &str) -> Option<&'a str> {
    node.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn tag_name(node: &Value) -> String {
    non_empty_str(node, "tagName")
        .or_else(|| non_empty_str(node, "nodeName"))
        .unwrap_or("UNKNOWN")
        .to_string()
}

/// Render one level: `TAG`, then `#id`, then `.class` per class name
fn path_segment(node: &Value) -> String {
    let mut segment = tag_name(node);
    if let Some(id) = non_empty_str(node, "id") {
        segment.push('#');
        segment.push_str(id);
    }
    // SVG elements report className as an object; only plain strings count
    if let Some(classes) = non_empty_str(node, "className") {
        for class in classes.split_whitespace() {
            segment.push('.');
            segment.push_str(class);
        }
    }
    segment
}

/// Walk `parentElement` links up to the root and join the levels top-down
pub fn element_path(target: &Value) -> String {
    let mut segments = Vec::new();
    let mut node = Some(target);
    while let Some(current) = node {
        if !current.is_object() || segments.len() >= MAX_PATH_DEPTH {
            break;
        }
        segments.push(path_segment(current));
        node = current.get("parentElement").filter(|parent| !parent.is_null());
    }
    if segments.is_empty() {
        return "UNKNOWN".to_string();
    }
    segments.reverse();
    segments.join(" > ")
}

/// Normalize an untyped mutation target
pub fn describe_target(target: &Value) -> ChangeTarget {
    ChangeTarget {
        tag_name: tag_name(target),
        id: non_empty_str(target, "id").map(str::to_string),
        class_name: non_empty_str(target, "className").map(str::to_string),
        path: element_path(target),
    }
}

struct DomState {
    changes: Mutex<RingBuffer<DomChange>>,
    next_id: AtomicU64,
}

impl DomState {
    fn ingest(&self, batch: &[RawMutation]) {
        let normalized: Vec<DomChange> = batch
            .iter()
            .filter_map(|raw| self.normalize(raw))
            .collect();
        trace!("Recording {} DOM changes", normalized.len());

        let mut changes = lock(&self.changes);
        for change in normalized {
            changes.push(change);
        }
    }

    fn normalize(&self, raw: &RawMutation) -> Option<DomChange> {
        let change_type = match raw.kind.parse::<ChangeType>() {
            Ok(change_type) => change_type,
            Err(e) => {
                debug!("Skipping mutation: {}", e);
                return None;
            }
        };

        let mut change = DomChange {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            timestamp: Utc::now(),
            change_type,
            target: describe_target(&raw.target),
            added_nodes: None,
            removed_nodes: None,
            attribute_name: None,
            old_value: None,
            new_value: None,
        };

        match change_type {
            ChangeType::ChildList => {
                change.added_nodes = Some(raw.added_nodes);
                change.removed_nodes = Some(raw.removed_nodes);
            }
            ChangeType::Attributes => {
                change.attribute_name = raw.attribute_name.clone();
                change.old_value = raw.old_value.clone();
                change.new_value = raw.new_value.clone();
            }
            ChangeType::CharacterData => {
                change.old_value = raw.old_value.clone();
                change.new_value = raw.new_value.clone();
            }
        }
        Some(change)
    }
}

pub struct DomMonitor {
    source: Option<Arc<dyn MutationSource>>,
    state: Arc<DomState>,
    observer: Mutex<Option<ObserverId>>,
}

impl DomMonitor {
    pub const DEFAULT_MAX_CHANGES: usize = 100;

    /// `max_changes` defaults to [`Self::DEFAULT_MAX_CHANGES`]
    pub fn new(source: Option<Arc<dyn MutationSource>>, max_changes: Option<usize>) -> Self {
        Self {
            source,
            state: Arc::new(DomState {
                changes: Mutex::new(RingBuffer::new(
                    max_changes.unwrap_or(Self::DEFAULT_MAX_CHANGES),
                )),
                next_id: AtomicU64::new(1),
            }),
            observer: Mutex::new(None),
        }
    }

    pub fn start(&self) {
        let Some(source) = &self.source else {
            warn!("Mutation observation unavailable, DOM monitor stays inactive");
            return;
        };
        let mut observer = lock(&self.observer);
        if observer.is_some() {
            return;
        }

        let state = Arc::clone(&self.state);
        let callback = Arc::new(move |batch: &[RawMutation]| state.ingest(batch));
        match source.observe(ObserveOptions::everything(), callback) {
            Ok(id) => {
                *observer = Some(id);
                debug!("DOM monitor started");
            }
            Err(e) => warn!("Could not observe DOM mutations: {}", e),
        }
    }

    pub fn stop(&self) {
        if let Some(id) = lock(&self.observer).take()
            && let Some(source) = &self.source
        {
            source.disconnect(id);
            debug!("DOM monitor stopped");
        }
    }

    pub fn is_active(&self) -> bool {
        lock(&self.observer).is_some()
    }

    /// Retained changes, oldest first
    pub fn get_changes(&self, filter: &ChangeFilter) -> Vec<DomChange> {
        lock(&self.state.changes)
            .iter()
            .filter(|change| filter.matches(change))
            .cloned()
            .collect()
    }

    pub fn max_changes(&self) -> usize {
        lock(&self.state.changes).capacity()
    }

    pub fn len(&self) -> usize {
        lock(&self.state.changes).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every retained change; observation continues
    pub fn clear(&self) {
        lock(&self.state.changes).clear();
    }
}

#[cfg(test)]
#[path = "dom_test.rs"]
mod dom_test;
